pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use trailhead_core::config::ConfigOverrides;

#[derive(Debug, Parser)]
#[command(
    name = "trailhead",
    about = "Trailhead customer service assistant CLI",
    long_about = "Talk to the assistant, inspect registered tools and effective configuration, \
                  and check catalog readiness.",
    after_help = "Examples:\n  trailhead chat\n  trailhead ask \"where is order #W001?\" \"my email is jo@example.com\"\n  trailhead doctor --json"
)]
pub struct Cli {
    #[command(flatten)]
    runtime: RuntimeArgs,
    #[command(subcommand)]
    command: Command,
}

/// Flags layered over file and environment configuration.
#[derive(Debug, Clone, Default, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, help = "Directory holding CustomerOrders.json and ProductCatalog.json")]
    pub data_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Log level (trace, debug, info, warn, error)")]
    pub log_level: Option<String>,
    #[arg(long, global = true, help = "Ask the language model to pick actions before the rule table")]
    pub model_override: bool,
}

impl RuntimeArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            data_dir: self.data_dir.clone(),
            log_level: self.log_level.clone(),
            llm_enabled: self.model_override.then_some(true),
            model_override: self.model_override.then_some(true),
            ..ConfigOverrides::default()
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive conversation (help, reset, plan, quit)")]
    Chat,
    #[command(about = "Run each message as one turn of a fresh session and print the outcomes")]
    Ask {
        #[arg(required = true, help = "Customer messages, one turn each")]
        messages: Vec<String>,
    },
    #[command(about = "List registered business tools and their required parameters")]
    Tools,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, catalog data, and language model readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    commands::init_tracing(&cli.runtime);

    let result = match cli.command {
        Command::Chat => commands::chat::run(&cli.runtime),
        Command::Ask { messages } => commands::ask::run(&cli.runtime, &messages),
        Command::Tools => commands::tools::run(&cli.runtime),
        Command::Config => commands::CommandResult {
            exit_code: 0,
            output: commands::config::run(&cli.runtime),
        },
        Command::Doctor { json } => commands::doctor::run(&cli.runtime, json),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}

use std::process::ExitCode;

fn main() -> ExitCode {
    trailhead_cli::run()
}

use crate::commands::{build_engine, escape_json, CommandResult};
use crate::RuntimeArgs;

pub fn run(runtime: &RuntimeArgs) -> CommandResult {
    let engine = match build_engine("tools", runtime) {
        Ok(engine) => engine,
        Err(result) => return result,
    };

    let descriptors = engine.registry().describe();
    let human = descriptors
        .iter()
        .map(|tool| {
            let params = if tool.required_params.is_empty() {
                "none".to_string()
            } else {
                tool.required_params.join(", ")
            };
            format!("- {} (requires: {params}): {}", tool.name, tool.description)
        })
        .collect::<Vec<_>>()
        .join("\n");
    let machine = serde_json::to_string(&descriptors).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"tools\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    });

    CommandResult { exit_code: 0, output: format!("{human}\n{machine}") }
}

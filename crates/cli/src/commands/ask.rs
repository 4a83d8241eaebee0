use serde::Serialize;
use trailhead_agent::TurnOutcome;

use crate::commands::{async_runtime, build_engine, escape_json, CommandResult};
use crate::RuntimeArgs;

#[derive(Debug, Serialize)]
struct AskTurn {
    message: String,
    outcome: TurnOutcome,
    reply: String,
}

#[derive(Debug, Serialize)]
struct AskReport {
    command: &'static str,
    status: &'static str,
    session_id: String,
    plan_id: String,
    turns: Vec<AskTurn>,
}

/// Replies go first, one per line; the final line is the JSON report.
pub fn run(runtime: &RuntimeArgs, messages: &[String]) -> CommandResult {
    let engine = match build_engine("ask", runtime) {
        Ok(engine) => engine,
        Err(result) => return result,
    };
    let rt = match async_runtime("ask") {
        Ok(rt) => rt,
        Err(result) => return result,
    };

    let report = rt.block_on(async {
        let session_id = engine.create_session().await;
        let mut turns = Vec::with_capacity(messages.len());
        let mut plan_id = engine.plan_snapshot(&session_id).await?.plan_id;
        for message in messages {
            let report = engine.submit_turn(&session_id, message).await?;
            plan_id = report.plan_id;
            turns.push(AskTurn {
                message: message.clone(),
                outcome: report.outcome,
                reply: report.reply,
            });
        }
        Ok::<_, trailhead_core::ApplicationError>(AskReport {
            command: "ask",
            status: "ok",
            session_id: session_id.to_string(),
            plan_id,
            turns,
        })
    });

    let report = match report {
        Ok(report) => report,
        Err(error) => return CommandResult::failure("ask", "turn_failed", error.to_string(), 6),
    };

    let human = report.turns.iter().map(|turn| turn.reply.as_str()).collect::<Vec<_>>().join("\n");
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"ask\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    });

    CommandResult { exit_code: 0, output: format!("{human}\n{machine}") }
}

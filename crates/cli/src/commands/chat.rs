use std::io::{self, BufRead, Write};

use anyhow::Result;
use trailhead_agent::{Engine, SessionId};

use crate::commands::{async_runtime, build_engine, CommandResult};
use crate::RuntimeArgs;

const GREETING: &str = "Trailhead assistant. Type `help` for commands, `quit` to leave.";
const HELP: &str = "Commands:\n  help   show this message\n  reset  forget everything said so far\n  plan   show the current plan\n  quit   end the conversation";

pub fn run(runtime: &RuntimeArgs) -> CommandResult {
    let engine = match build_engine("chat", runtime) {
        Ok(engine) => engine,
        Err(result) => return result,
    };
    let rt = match async_runtime("chat") {
        Ok(rt) => rt,
        Err(result) => return result,
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    match rt.block_on(converse(&engine, stdin.lock(), stdout.lock())) {
        Ok(()) => CommandResult { exit_code: 0, output: String::new() },
        Err(error) => CommandResult::failure("chat", "io", error.to_string(), 5),
    }
}

/// Reads one message per line until `quit` or end of input.
pub async fn converse<R, W>(engine: &Engine, input: R, mut output: W) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut session = engine.create_session().await;
    writeln!(output, "{GREETING}")?;

    for line in input.lines() {
        let line = line?;
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        match message.to_ascii_lowercase().as_str() {
            "help" => writeln!(output, "{HELP}")?,
            "reset" => {
                engine.reset_session(&session).await?;
                writeln!(output, "Starting over. How can I help?")?;
            }
            "plan" => writeln!(output, "{}", describe_plan(engine, &session).await?)?,
            "quit" | "exit" => break,
            _ => {
                let report = engine.submit_turn(&session, message).await?;
                writeln!(output, "{}", report.reply)?;
                if report.complete {
                    writeln!(output, "Thanks for stopping by. Happy trails!")?;
                    engine.end_session(&session).await?;
                    session = engine.create_session().await;
                }
            }
        }
        output.flush()?;
    }

    engine.end_session(&session).await?;
    Ok(())
}

async fn describe_plan(engine: &Engine, session: &SessionId) -> Result<String> {
    let plan = engine.plan_snapshot(session).await?;
    let mut lines = vec![
        format!("plan {} ({:?}), {} turn(s)", plan.plan_id, plan.status, plan.turn_count),
        format!("context: {}", plan.context.summary()),
    ];
    for step in &plan.history {
        let marker = if step.success { "ok" } else { "fail" };
        lines.push(format!("- [{marker}] {}", step.action));
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use trailhead_agent::catalog_tools::catalog_registry;
    use trailhead_agent::Engine;
    use trailhead_core::catalog::Catalog;

    use super::converse;

    const ORDERS: &str = r##"[
        {"CustomerName": "Jo Park", "Email": "jo@example.com", "OrderNumber": "#W001",
         "ProductsOrdered": ["SOBP001"], "Status": "delivered", "TrackingNumber": "TRK100"}
    ]"##;
    const PRODUCTS: &str = r#"[
        {"ProductName": "Summit Backpack 45L", "SKU": "SOBP001", "Inventory": 4,
         "Description": "A rugged pack.", "Tags": ["Backpack", "Hiking"]}
    ]"#;

    fn engine() -> Engine {
        let catalog = Catalog::from_json(ORDERS, PRODUCTS).expect("fixture parses");
        Engine::new(catalog_registry(Arc::new(catalog)))
    }

    #[tokio::test]
    async fn conversation_asks_then_answers_then_shows_the_plan() {
        let engine = engine();
        let input = Cursor::new("where is my order?\njo@example.com #W001\nplan\nquit\n");
        let mut output = Vec::new();

        converse(&engine, input, &mut output).await.expect("loop runs");

        let transcript = String::from_utf8(output).expect("utf8 output");
        assert!(transcript.contains("I need your email address and order number"));
        assert!(transcript.contains("Order #W001 for Jo Park is currently delivered."));
        assert!(transcript.contains("- [ok] get_order_status"));
        assert_eq!(engine.session_count().await, 0);
    }

    #[tokio::test]
    async fn closing_starts_a_fresh_session() {
        let engine = engine();
        let input = Cursor::new("jo@example.com\nthat's all, bye\nplan\n");
        let mut output = Vec::new();

        converse(&engine, input, &mut output).await.expect("loop runs");

        let transcript = String::from_utf8(output).expect("utf8 output");
        assert!(transcript.contains("Happy trails!"));
        assert!(transcript.contains("0 turn(s)"));
    }
}

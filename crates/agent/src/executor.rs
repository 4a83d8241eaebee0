use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::plan::PlanState;
use crate::tools::{ToolData, ToolParams, ToolRegistry, ToolResult};

const MAX_ERROR_CHARS: usize = 200;

/// One invocation attempt. Appended to plan history and never changed afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedStep {
    pub action: String,
    pub input_snapshot: String,
    pub parameters: ToolParams,
    pub success: bool,
    pub result: Option<ToolData>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct StepExecutor {
    registry: Arc<ToolRegistry>,
}

impl StepExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Runs `action` with exactly `params`, records the attempt, and merges successes into context.
    pub async fn run(
        &self,
        plan: &mut PlanState,
        action: &str,
        params: ToolParams,
        input_snapshot: &str,
    ) -> ToolResult {
        let result = self.invoke(action, &params).await;

        if result.success {
            info!(
                event_name = "engine.tool.succeeded",
                plan_id = %plan.plan_id,
                action,
                data_kind = result.data.kind(),
                "tool invocation succeeded"
            );
        } else {
            warn!(
                event_name = "engine.tool.failed",
                plan_id = %plan.plan_id,
                action,
                error = result.error.as_deref().unwrap_or_default(),
                "tool invocation failed"
            );
        }

        plan.history.push(ExecutedStep {
            action: action.to_string(),
            input_snapshot: input_snapshot.to_string(),
            parameters: params,
            success: result.success,
            result: result.success.then(|| result.data.clone()),
            error: result.error.clone(),
            timestamp: Utc::now(),
        });

        plan.context.update_from_result(&result);
        result
    }

    async fn invoke(&self, action: &str, params: &ToolParams) -> ToolResult {
        let Some(tool) = self.registry.get(action) else {
            return ToolResult::failure(format!(
                "Tool '{action}' not found. Available tools: [{}]",
                self.registry.names().join(", ")
            ));
        };

        match AssertUnwindSafe(tool.invoke(params)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(error)) => ToolResult::failure(sanitize_error(&error.to_string())),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    event_name = "engine.tool.panicked",
                    action,
                    panic = %message,
                    "tool panicked"
                );
                ToolResult::failure(sanitize_error(&format!("tool panicked: {message}")))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}

/// Single line, collapsed whitespace, bounded length.
pub fn sanitize_error(raw: &str) -> String {
    let first_line = raw.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("");
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "tool failed without a message".to_string();
    }
    if collapsed.chars().count() <= MAX_ERROR_CHARS {
        return collapsed;
    }
    let mut truncated = collapsed.chars().take(MAX_ERROR_CHARS).collect::<String>();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::anyhow;
    use serde_json::json;

    use super::{sanitize_error, StepExecutor};
    use crate::context::tests::sample_order;
    use crate::plan::PlanState;
    use crate::tools::{ToolData, ToolParams, ToolRegistry, ToolResult};

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register_fn("get_order_status", &["email", "order_number"], |_| {
            Ok(ToolResult::ok(ToolData::Order(sample_order())))
        });
        registry.register_fn("explode", Vec::<String>::new(), |_| {
            Err(anyhow!("connection reset\n    at catalog.rs:42\n    at tool.rs:7"))
        });
        registry
    }

    #[tokio::test]
    async fn success_is_recorded_and_merged() {
        let executor = StepExecutor::new(Arc::new(registry()));
        let mut plan = PlanState::new();
        let mut params = ToolParams::new();
        params.insert("email".to_string(), json!("alex@example.com"));
        params.insert("order_number".to_string(), json!("#W002"));

        let result = executor.run(&mut plan, "get_order_status", params.clone(), "order #W002").await;

        assert!(result.success);
        assert_eq!(plan.history.len(), 1);
        assert_eq!(plan.history[0].parameters, params);
        assert_eq!(plan.history[0].input_snapshot, "order #W002");
        assert!(plan.history[0].result.is_some());
        assert_eq!(plan.context.current_order, Some(sample_order()));
    }

    #[tokio::test]
    async fn tool_errors_become_sanitized_failures() {
        let executor = StepExecutor::new(Arc::new(registry()));
        let mut plan = PlanState::new();
        let before = plan.context.clone();

        let result = executor.run(&mut plan, "explode", ToolParams::new(), "boom").await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("connection reset"));
        assert_eq!(plan.context, before);
        assert_eq!(plan.history.len(), 1);
        assert!(!plan.history[0].success);
        assert!(plan.history[0].result.is_none());
    }

    #[tokio::test]
    async fn panicking_tools_become_failures_and_the_executor_stays_usable() {
        let mut registry = registry();
        registry.register_fn("unstable", ["sku"], |_| -> anyhow::Result<ToolResult> {
            panic!("inventory index out of range")
        });
        let executor = StepExecutor::new(Arc::new(registry));
        let mut plan = PlanState::new();
        let before = plan.context.clone();

        let result = executor.run(&mut plan, "unstable", ToolParams::new(), "boom").await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("tool panicked: inventory index out of range"));
        assert_eq!(plan.context, before);
        assert_eq!(plan.history.len(), 1);

        let mut params = ToolParams::new();
        params.insert("email".to_string(), json!("alex@example.com"));
        params.insert("order_number".to_string(), json!("#W002"));
        let next = executor.run(&mut plan, "get_order_status", params, "order #W002").await;
        assert!(next.success);
    }

    #[tokio::test]
    async fn unknown_actions_list_available_tools_and_are_recorded() {
        let executor = StepExecutor::new(Arc::new(registry()));
        let mut plan = PlanState::new();

        let result = executor.run(&mut plan, "refund_order", ToolParams::new(), "refund").await;

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Tool 'refund_order' not found. Available tools: [explode, get_order_status]")
        );
        assert_eq!(plan.history.len(), 1);
        assert_eq!(plan.history[0].action, "refund_order");
    }

    #[test]
    fn sanitizing_bounds_length_and_lines() {
        assert_eq!(sanitize_error("  \n  first   line \nsecond"), "first line");
        assert_eq!(sanitize_error(""), "tool failed without a message");
        let long = "x".repeat(500);
        let sanitized = sanitize_error(&long);
        assert_eq!(sanitized.chars().count(), 203);
        assert!(sanitized.ends_with("..."));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::{is_missing, ConversationContext};
use crate::executor::{ExecutedStep, StepExecutor};
use crate::selector::{ActionSelector, Selection, SelectionDecision};
use crate::tools::ToolResult;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    AwaitingAction,
    Complete,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    NoAction,
    InsufficientParams { action: String, missing_fields: Vec<String> },
    Executed { action: String, result: ToolResult },
}

impl TurnOutcome {
    pub fn action(&self) -> Option<&str> {
        match self {
            Self::NoAction => None,
            Self::InsufficientParams { action, .. } | Self::Executed { action, .. } => Some(action),
        }
    }
}

/// What one turn produced. `decision` is `None` when the plan was already complete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnStep {
    pub outcome: TurnOutcome,
    pub decision: Option<SelectionDecision>,
}

/// The evolving plan for one conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanState {
    pub plan_id: String,
    pub original_request: Option<String>,
    pub context: ConversationContext,
    pub history: Vec<ExecutedStep>,
    pub status: PlanStatus,
    pub turn_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Default for PlanState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn new_plan_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("plan_{}", &hex[..8])
}

impl PlanState {
    pub fn new() -> Self {
        Self {
            plan_id: new_plan_id(),
            original_request: None,
            context: ConversationContext::new(),
            history: Vec::new(),
            status: PlanStatus::AwaitingAction,
            turn_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == PlanStatus::Complete
    }

    /// Processes one user turn from text extraction through execution.
    pub async fn advance(
        &mut self,
        text: &str,
        selector: &ActionSelector,
        executor: &StepExecutor,
    ) -> TurnOutcome {
        self.step(text, selector, executor).await.outcome
    }

    /// Like [`PlanState::advance`], also returning the selector's decision.
    pub async fn step(
        &mut self,
        text: &str,
        selector: &ActionSelector,
        executor: &StepExecutor,
    ) -> TurnStep {
        if self.is_complete() {
            debug!(
                event_name = "engine.turn.plan_complete",
                plan_id = %self.plan_id,
                "plan is complete, ignoring turn"
            );
            return TurnStep { outcome: TurnOutcome::NoAction, decision: None };
        }

        if self.original_request.is_none() {
            self.original_request = Some(text.to_string());
        }
        self.turn_count += 1;

        self.context.update_from_text(text);

        let decision = selector.select(text, &self.context).await;
        info!(
            event_name = "engine.turn.selected",
            plan_id = %self.plan_id,
            turn = self.turn_count,
            source = %decision.source,
            selection = ?decision.selection,
            "action selected"
        );

        let action = match &decision.selection {
            Selection::Invoke(action) => action.clone(),
            Selection::Conversational => {
                return TurnStep { outcome: TurnOutcome::NoAction, decision: Some(decision) };
            }
            Selection::Close => {
                self.status = PlanStatus::Complete;
                info!(event_name = "engine.plan.completed", plan_id = %self.plan_id, "plan closed");
                return TurnStep { outcome: TurnOutcome::NoAction, decision: Some(decision) };
            }
        };

        let params = self.context.resolve_params(&action);
        let mut missing_fields = self.context.missing_fields(&action, &params);
        for required in executor.registry().required_params(&action) {
            if is_missing(params.get(required.as_str())) && !missing_fields.contains(&required) {
                missing_fields.push(required);
            }
        }
        if !missing_fields.is_empty() {
            return TurnStep {
                outcome: TurnOutcome::InsufficientParams { action, missing_fields },
                decision: Some(decision),
            };
        }

        let result = executor.run(self, &action, params, text).await;
        TurnStep { outcome: TurnOutcome::Executed { action, result }, decision: Some(decision) }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::anyhow;

    use super::{PlanState, PlanStatus, TurnOutcome};
    use crate::actions::{GET_ORDER_STATUS, GET_PRODUCT_DETAILS, SEARCH_PRODUCTS};
    use crate::context::tests::{sample_order, sample_product};
    use crate::executor::StepExecutor;
    use crate::selector::ActionSelector;
    use crate::tools::{ToolData, ToolParams, ToolRegistry, ToolResult};

    fn executor_with(registry: ToolRegistry) -> StepExecutor {
        StepExecutor::new(Arc::new(registry))
    }

    fn order_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register_fn(GET_ORDER_STATUS, &["email", "order_number"], |_| {
            Ok(ToolResult::ok(ToolData::Order(sample_order())))
        });
        registry.register_fn(GET_PRODUCT_DETAILS, &["skus"], |params: &ToolParams| {
            let skus = params
                .get("skus")
                .and_then(|value| value.as_array())
                .map(|items| items.iter().filter_map(|sku| sku.as_str()).collect::<Vec<_>>())
                .unwrap_or_default();
            Ok(ToolResult::ok(ToolData::ProductList(
                skus.into_iter().map(sample_product).collect(),
            )))
        });
        registry.register_fn(SEARCH_PRODUCTS, &["query"], |_| {
            Ok(ToolResult::ok(ToolData::ProductList(vec![sample_product("SOCP003")])))
        });
        registry
    }

    #[test]
    fn plan_ids_have_eight_hex_characters() {
        let plan = PlanState::new();
        let suffix = plan.plan_id.strip_prefix("plan_").expect("plan_ prefix");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(plan.plan_id, PlanState::new().plan_id);
    }

    #[tokio::test]
    async fn first_turn_looks_up_the_order() {
        let selector = ActionSelector::rules_only();
        let executor = executor_with(order_registry());
        let mut plan = PlanState::new();

        let outcome = plan.advance("check order #W002 for alex@example.com", &selector, &executor).await;

        assert_eq!(plan.context.customer_email.as_deref(), Some("alex@example.com"));
        assert_eq!(plan.context.order_number.as_deref(), Some("#W002"));
        assert!(matches!(
            outcome,
            TurnOutcome::Executed { ref action, ref result } if action == GET_ORDER_STATUS && result.success
        ));
        assert_eq!(plan.context.current_order, Some(sample_order()));
        assert_eq!(plan.original_request.as_deref(), Some("check order #W002 for alex@example.com"));
        assert_eq!(plan.turn_count, 1);
    }

    #[tokio::test]
    async fn second_turn_uses_order_skus_without_reextraction() {
        let selector = ActionSelector::rules_only();
        let executor = executor_with(order_registry());
        let mut plan = PlanState::new();
        plan.advance("check order #W002 for alex@example.com", &selector, &executor).await;

        let outcome = plan.advance("what products are in my order?", &selector, &executor).await;

        match outcome {
            TurnOutcome::Executed { action, result } => {
                assert_eq!(action, GET_PRODUCT_DETAILS);
                assert!(result.success);
            }
            other => panic!("expected executed outcome, got {other:?}"),
        }
        let last = plan.history.last().expect("history recorded");
        assert_eq!(last.parameters.get("skus"), Some(&serde_json::json!(["SOBP001", "SOHK002"])));
        assert_eq!(plan.context.found_products.len(), 2);
        assert_eq!(plan.original_request.as_deref(), Some("check order #W002 for alex@example.com"));
    }

    #[tokio::test]
    async fn missing_identifiers_are_reported_without_running_the_tool() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let mut registry = ToolRegistry::new();
        registry.register_fn(GET_ORDER_STATUS, &["email", "order_number"], move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(ToolResult::ok(ToolData::Empty))
        });
        let selector = ActionSelector::rules_only();
        let executor = executor_with(registry);
        let mut plan = PlanState::new();

        let outcome = plan.advance("track my order", &selector, &executor).await;

        assert_eq!(
            outcome,
            TurnOutcome::InsufficientParams {
                action: GET_ORDER_STATUS.to_string(),
                missing_fields: vec!["email".to_string(), "order_number".to_string()],
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(plan.history.is_empty());

        // supplying the fields later re-runs the selector with the remembered email
        plan.advance("my email is alex@example.com", &selector, &executor).await;
        let outcome = plan.advance("it's order #W002", &selector, &executor).await;
        assert!(matches!(outcome, TurnOutcome::Executed { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn registry_declared_params_extend_the_gate() {
        let mut registry = ToolRegistry::new();
        registry.register_fn(SEARCH_PRODUCTS, &["query", "category"], |_| {
            Ok(ToolResult::ok(ToolData::Empty))
        });
        let selector = ActionSelector::rules_only();
        let executor = executor_with(registry);
        let mut plan = PlanState::new();

        let outcome = plan.advance("search for tents", &selector, &executor).await;

        assert_eq!(
            outcome,
            TurnOutcome::InsufficientParams {
                action: SEARCH_PRODUCTS.to_string(),
                missing_fields: vec!["category".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn failing_tool_keeps_context_and_records_history() {
        let mut registry = ToolRegistry::new();
        registry.register_fn(GET_ORDER_STATUS, &["email", "order_number"], |_| {
            Err(anyhow!("order book unavailable"))
        });
        let selector = ActionSelector::rules_only();
        let executor = executor_with(registry);
        let mut plan = PlanState::new();
        plan.context.update_from_text("alex@example.com #W002");
        let before = plan.context.clone();

        let outcome = plan.advance("check order #W002 for alex@example.com", &selector, &executor).await;

        match outcome {
            TurnOutcome::Executed { action, result } => {
                assert_eq!(action, GET_ORDER_STATUS);
                assert!(!result.success);
                assert_eq!(result.error.as_deref(), Some("order book unavailable"));
            }
            other => panic!("expected executed outcome, got {other:?}"),
        }
        assert_eq!(plan.context, before);
        assert_eq!(plan.history.len(), 1);
        assert!(!plan.history[0].success);
    }

    #[tokio::test]
    async fn unknown_selected_action_fails_softly_and_session_continues() {
        let selector = ActionSelector::rules_only();
        let executor = executor_with(ToolRegistry::new());
        let mut plan = PlanState::new();

        let outcome = plan.advance("search for tents", &selector, &executor).await;
        assert!(matches!(
            outcome,
            TurnOutcome::Executed { ref result, .. } if !result.success
        ));

        let outcome = plan.advance("hello", &selector, &executor).await;
        assert_eq!(outcome, TurnOutcome::NoAction);
        assert_eq!(plan.status, PlanStatus::AwaitingAction);
    }

    #[tokio::test]
    async fn steps_expose_the_selection_behind_the_outcome() {
        let selector = ActionSelector::rules_only();
        let executor = executor_with(order_registry());
        let mut plan = PlanState::new();

        let step = plan.step("search for tents", &selector, &executor).await;
        let decision = step.decision.expect("selector ran");
        assert_eq!(decision.source, "rules:product_search");
        assert!(matches!(step.outcome, TurnOutcome::Executed { .. }));

        plan.status = PlanStatus::Complete;
        let step = plan.step("search for tents", &selector, &executor).await;
        assert_eq!(step.outcome, TurnOutcome::NoAction);
        assert!(step.decision.is_none());
    }

    #[tokio::test]
    async fn closing_completes_the_plan() {
        let selector = ActionSelector::rules_only();
        let executor = executor_with(order_registry());
        let mut plan = PlanState::new();

        assert_eq!(plan.advance("that's all, bye", &selector, &executor).await, TurnOutcome::NoAction);
        assert!(plan.is_complete());

        let outcome = plan.advance("check order #W002 for alex@example.com", &selector, &executor).await;
        assert_eq!(outcome, TurnOutcome::NoAction);
        assert!(plan.history.is_empty());
        assert!(plan.context.customer_email.is_none());
    }
}

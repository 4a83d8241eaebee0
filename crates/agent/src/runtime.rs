use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use trailhead_core::audit::{
    AuditCategory, AuditContext, AuditOutcome, AuditSink, TracingAuditSink,
};
use trailhead_core::catalog::Catalog;
use trailhead_core::config::AppConfig;
use trailhead_core::errors::ApplicationError;
use uuid::Uuid;

use crate::catalog_tools::catalog_registry;
use crate::executor::StepExecutor;
use crate::llm::client_from_config;
use crate::plan::{PlanState, TurnOutcome};
use crate::reply::ReplyComposer;
use crate::selector::{ActionSelector, ModelSelector, Selection};
use crate::session::{SessionId, SessionRegistry};
use crate::tools::ToolRegistry;

const AUDIT_ACTOR: &str = "engine";

/// A turn's outcome with the phrased reply and the plan position it was taken from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TurnReport {
    pub session_id: SessionId,
    pub plan_id: String,
    pub turn: u64,
    pub complete: bool,
    pub outcome: TurnOutcome,
    pub reply: String,
}

/// Application root: owns the tool registry, the selector and every live session.
pub struct Engine {
    sessions: SessionRegistry,
    selector: ActionSelector,
    executor: StepExecutor,
    replies: ReplyComposer,
    audit: Arc<dyn AuditSink>,
}

impl Engine {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            selector: ActionSelector::rules_only(),
            executor: StepExecutor::new(Arc::new(registry)),
            replies: ReplyComposer::deterministic(),
            audit: Arc::new(TracingAuditSink),
        }
    }

    /// Wires the catalog tools and, when `llm.enabled` is set, model-phrased replies.
    /// `selector.model_override` additionally routes selection through the model.
    pub fn from_config(config: &AppConfig, catalog: Arc<Catalog>) -> Result<Self, ApplicationError> {
        let registry = catalog_registry(catalog);
        let mut engine = Self::new(registry);

        let client = client_from_config(&config.llm)
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;

        if let Some(client) = &client {
            engine.replies = ReplyComposer::with_model(Arc::clone(client));
            info!(
                event_name = "engine.reply.model_enabled",
                provider = config.llm.provider.as_str(),
                model = %config.llm.thinking_model,
                "model replies enabled"
            );
        }

        if config.selector.model_override {
            let client = client.ok_or_else(|| {
                ApplicationError::Configuration(
                    "selector.model_override requires llm.enabled = true".to_string(),
                )
            })?;
            let strategy = ModelSelector::new(client, engine.registry().describe());
            engine.selector = ActionSelector::with_override(Box::new(strategy));
            info!(
                event_name = "engine.selector.model_override",
                provider = config.llm.provider.as_str(),
                model = %config.llm.model,
                "model selector enabled"
            );
        }

        engine.audit.emit(
            AuditContext::new(None, None, Uuid::new_v4().to_string(), AUDIT_ACTOR)
                .event("engine.system.ready", AuditCategory::System, AuditOutcome::Success)
                .with_metadata("tool_count", engine.registry().len().to_string())
                .with_metadata("model_override", engine.selector.has_override().to_string())
                .with_metadata("model_replies", engine.replies.uses_model().to_string()),
        );

        Ok(engine)
    }

    pub fn with_selector(mut self, selector: ActionSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_replies(mut self, replies: ReplyComposer) -> Self {
        self.replies = replies;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    pub fn selector(&self) -> &ActionSelector {
        &self.selector
    }

    pub fn replies(&self) -> &ReplyComposer {
        &self.replies
    }

    pub async fn create_session(&self) -> SessionId {
        let session_id = self.sessions.create().await;
        info!(event_name = "engine.session.created", session_id = %session_id, "session created");
        self.audit.emit(
            self.audit_context(&session_id, None).event(
                "engine.session.created",
                AuditCategory::Session,
                AuditOutcome::Success,
            ),
        );
        session_id
    }

    /// Runs one turn. An id the engine has not seen starts a new session.
    pub async fn handle_turn(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<TurnOutcome, ApplicationError> {
        let shared = self.sessions.get_or_create(session_id).await;
        let mut plan = shared.lock().await;
        Ok(self.run_turn(session_id, &mut plan, text).await)
    }

    /// [`Engine::handle_turn`] plus the customer reply, all taken under the session's lock.
    pub async fn submit_turn(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<TurnReport, ApplicationError> {
        let shared = self.sessions.get_or_create(session_id).await;
        let mut plan = shared.lock().await;
        let outcome = self.run_turn(session_id, &mut plan, text).await;
        let reply = self.replies.compose(text, &plan.context, &outcome).await;

        Ok(TurnReport {
            session_id: session_id.clone(),
            plan_id: plan.plan_id.clone(),
            turn: plan.turn_count,
            complete: plan.is_complete(),
            outcome,
            reply,
        })
    }

    async fn run_turn(&self, session_id: &SessionId, plan: &mut PlanState, text: &str) -> TurnOutcome {
        let audit = self.audit_context(session_id, Some(plan.plan_id.clone()));

        info!(
            event_name = "engine.turn.received",
            session_id = %session_id,
            plan_id = %plan.plan_id,
            chars = text.chars().count(),
            "turn received"
        );

        let step = plan.step(text, &self.selector, &self.executor).await;
        let outcome = step.outcome;

        if let Some(decision) = &step.decision {
            let selected = match &decision.selection {
                Selection::Invoke(action) => action.as_str(),
                Selection::Conversational => "conversational",
                Selection::Close => "close",
            };
            self.audit.emit(
                audit
                    .event("engine.turn.selected", AuditCategory::Selection, AuditOutcome::Success)
                    .with_metadata("turn", plan.turn_count.to_string())
                    .with_metadata("source", decision.source.clone())
                    .with_metadata("selection", selected),
            );
        }

        let (event_type, category, audit_outcome) = match &outcome {
            TurnOutcome::NoAction => {
                ("engine.turn.no_action", AuditCategory::Turn, AuditOutcome::Success)
            }
            TurnOutcome::InsufficientParams { .. } => {
                ("engine.turn.insufficient_params", AuditCategory::Turn, AuditOutcome::Deferred)
            }
            TurnOutcome::Executed { result, .. } if result.success => {
                ("engine.tool.executed", AuditCategory::Tool, AuditOutcome::Success)
            }
            TurnOutcome::Executed { .. } => {
                ("engine.tool.executed", AuditCategory::Tool, AuditOutcome::Failed)
            }
        };
        let mut event = audit
            .event(event_type, category, audit_outcome)
            .with_metadata("turn", plan.turn_count.to_string());
        if let Some(action) = outcome.action() {
            event = event.with_metadata("action", action);
        }
        if let TurnOutcome::InsufficientParams { missing_fields, .. } = &outcome {
            event = event.with_metadata("missing_fields", missing_fields.join(","));
        }
        self.audit.emit(event);

        info!(
            event_name = "engine.turn.completed",
            session_id = %session_id,
            plan_id = %plan.plan_id,
            action = outcome.action().unwrap_or("none"),
            audit_event = event_type,
            "turn completed"
        );

        outcome
    }

    pub async fn reset_session(&self, session_id: &SessionId) -> Result<(), ApplicationError> {
        self.sessions.reset(session_id).await?;
        info!(event_name = "engine.session.reset", session_id = %session_id, "session reset");
        self.audit.emit(self.audit_context(session_id, None).event(
            "engine.session.reset",
            AuditCategory::Session,
            AuditOutcome::Success,
        ));
        Ok(())
    }

    pub async fn end_session(&self, session_id: &SessionId) -> Result<(), ApplicationError> {
        self.sessions.remove(session_id).await?;
        info!(event_name = "engine.session.ended", session_id = %session_id, "session ended");
        self.audit.emit(self.audit_context(session_id, None).event(
            "engine.session.ended",
            AuditCategory::Session,
            AuditOutcome::Success,
        ));
        Ok(())
    }

    /// A copy of the session's plan as it stands between turns.
    pub async fn plan_snapshot(&self, session_id: &SessionId) -> Result<PlanState, ApplicationError> {
        let shared = self.sessions.get(session_id).await?;
        let plan = shared.lock().await;
        Ok(plan.clone())
    }

    pub async fn cleanup_completed(&self) -> usize {
        let removed = self.sessions.cleanup_completed().await;
        if removed > 0 {
            info!(event_name = "engine.session.cleanup", removed, "completed plans evicted");
            self.audit.emit(
                AuditContext::new(None, None, Uuid::new_v4().to_string(), AUDIT_ACTOR)
                    .event("engine.session.cleanup", AuditCategory::System, AuditOutcome::Success)
                    .with_metadata("removed", removed.to_string()),
            );
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.len().await
    }

    fn audit_context(&self, session_id: &SessionId, plan_id: Option<String>) -> AuditContext {
        AuditContext::new(
            Some(session_id.to_string()),
            plan_id,
            Uuid::new_v4().to_string(),
            AUDIT_ACTOR,
        )
    }
}

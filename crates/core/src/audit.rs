use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Session,
    Turn,
    Selection,
    Tool,
    System,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Deferred,
    Failed,
}

/// Identifiers shared by every event emitted while serving one turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub session_id: Option<String>,
    pub plan_id: Option<String>,
    pub correlation_id: String,
    pub actor: String,
}

impl AuditContext {
    pub fn new(
        session_id: Option<String>,
        plan_id: Option<String>,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self { session_id, plan_id, correlation_id: correlation_id.into(), actor: actor.into() }
    }

    pub fn event(
        &self,
        event_type: impl Into<String>,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> AuditEvent {
        AuditEvent::new(
            self.session_id.clone(),
            self.plan_id.clone(),
            self.correlation_id.clone(),
            event_type,
            category,
            self.actor.clone(),
            outcome,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub session_id: Option<String>,
    pub plan_id: Option<String>,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        session_id: Option<String>,
        plan_id: Option<String>,
        correlation_id: impl Into<String>,
        event_type: impl Into<String>,
        category: AuditCategory,
        actor: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            session_id,
            plan_id,
            correlation_id: correlation_id.into(),
            event_type: event_type.into(),
            category,
            actor: actor.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Writes each event to the `trailhead::audit` tracing target, so the audit trail follows
/// the process's log format and level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let session_id = event.session_id.as_deref().unwrap_or("-");
        let plan_id = event.plan_id.as_deref().unwrap_or("-");
        match event.outcome {
            AuditOutcome::Failed => warn!(
                target: "trailhead::audit",
                event_name = %event.event_type,
                event_id = %event.event_id,
                category = ?event.category,
                outcome = ?event.outcome,
                session_id,
                plan_id,
                correlation_id = %event.correlation_id,
                actor = %event.actor,
                metadata = ?event.metadata,
                "audit event"
            ),
            AuditOutcome::Success | AuditOutcome::Deferred => info!(
                target: "trailhead::audit",
                event_name = %event.event_type,
                event_id = %event.event_id,
                category = ?event.category,
                outcome = ?event.outcome,
                session_id,
                plan_id,
                correlation_id = %event.correlation_id,
                actor = %event.actor,
                metadata = ?event.metadata,
                "audit event"
            ),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|event| event.event_type == event_type).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use crate::audit::{
        AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
        TracingAuditSink,
    };

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            self.0
                .lock()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .map_err(|_| io::Error::other("log buffer poisoned"))?
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn tracing_sink_writes_events_to_the_audit_target() {
        let logs = CapturedLogs::default();
        let subscriber =
            tracing_subscriber::fmt().with_writer(logs.clone()).with_ansi(false).finish();
        let context = AuditContext::new(Some("session-7".to_owned()), None, "turn-1", "engine");

        tracing::subscriber::with_default(subscriber, || {
            TracingAuditSink.emit(
                context
                    .event("engine.turn.selected", AuditCategory::Selection, AuditOutcome::Success)
                    .with_metadata("source", "rules:order_lookup"),
            );
        });

        let output = logs.contents();
        assert!(output.contains("trailhead::audit"), "output: {output}");
        assert!(output.contains("engine.turn.selected"));
        assert!(output.contains("session-7"));
        assert!(output.contains("rules:order_lookup"));
    }

    #[test]
    fn in_memory_sink_records_events_with_correlation_fields() {
        let sink = InMemoryAuditSink::default();
        sink.emit(
            AuditEvent::new(
                Some("session-1".to_owned()),
                Some("plan_1a2b3c4d".to_owned()),
                "req-123",
                "engine.tool.invoked",
                AuditCategory::Tool,
                "engine",
                AuditOutcome::Success,
            )
            .with_metadata("action", "get_order_status"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-123");
        assert_eq!(events[0].session_id.as_deref(), Some("session-1"));
        assert_eq!(events[0].plan_id.as_deref(), Some("plan_1a2b3c4d"));
        assert_eq!(events[0].metadata.get("action").map(String::as_str), Some("get_order_status"));
    }

    #[test]
    fn context_stamps_shared_identifiers_on_events() {
        let sink = InMemoryAuditSink::default();
        let context = AuditContext::new(Some("s-9".to_owned()), None, "turn-4", "cli");

        sink.emit(context.event("engine.turn.received", AuditCategory::Turn, AuditOutcome::Success));
        sink.emit(context.event(
            "engine.turn.insufficient_params",
            AuditCategory::Turn,
            AuditOutcome::Deferred,
        ));

        let deferred = sink.events_of_type("engine.turn.insufficient_params");
        assert_eq!(deferred.len(), 1);
        assert_eq!(deferred[0].actor, "cli");
        assert_eq!(deferred[0].session_id.as_deref(), Some("s-9"));
        assert_eq!(sink.events().len(), 2);
    }
}

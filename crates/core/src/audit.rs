use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::selection::SessionId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Wizard,
    Pricing,
    Payment,
    Persistence,
    System,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

/// Identifies who is emitting: the session, a correlation id carried across
/// calls, and the component name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub session_id: Option<SessionId>,
    pub correlation_id: String,
    pub component: String,
}

impl AuditContext {
    pub fn new(
        session_id: Option<SessionId>,
        correlation_id: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        Self { session_id, correlation_id: correlation_id.into(), component: component.into() }
    }

    pub fn event(
        &self,
        event_type: impl Into<String>,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> AuditEvent {
        AuditEvent {
            event_id: Uuid::new_v4().simple().to_string(),
            session_id: self.session_id.clone(),
            correlation_id: self.correlation_id.clone(),
            event_type: event_type.into(),
            category,
            component: self.component.clone(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub session_id: Option<SessionId>,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub component: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn emit(&self, _event: AuditEvent) {}
}

/// Keeps every event in emission order. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.buffer().clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.buffer().iter().map(|event| event.event_type.clone()).collect()
    }

    /// Most recent event with the given type.
    pub fn last_of(&self, event_type: &str) -> Option<AuditEvent> {
        self.buffer().iter().rev().find(|event| event.event_type == event_type).cloned()
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<AuditEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        self.buffer().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditCategory, AuditContext, AuditOutcome, AuditSink, InMemoryAuditSink};
    use crate::domain::selection::SessionId;

    #[test]
    fn events_inherit_the_context_fields() {
        let sink = InMemoryAuditSink::default();
        let context =
            AuditContext::new(Some(SessionId("S-2026-0042".to_owned())), "req-123", "wizard");
        sink.emit(
            context
                .event("wizard.transition_applied", AuditCategory::Wizard, AuditOutcome::Success)
                .with_metadata("from", "EventBasics")
                .with_metadata("to", "VenueChoice"),
        );

        let event = sink.last_of("wizard.transition_applied").expect("event recorded");
        assert_eq!(event.correlation_id, "req-123");
        assert_eq!(event.component, "wizard");
        assert_eq!(event.session_id, Some(SessionId("S-2026-0042".to_owned())));
        assert_eq!(event.metadata.get("to").map(String::as_str), Some("VenueChoice"));
        assert_eq!(event.event_id.len(), 32);
    }

    #[test]
    fn clones_share_one_buffer_in_emission_order() {
        let sink = InMemoryAuditSink::default();
        let handle = sink.clone();
        let context = AuditContext::new(None, "req-9", "payment");

        handle.emit(context.event(
            "payment.order_created",
            AuditCategory::Payment,
            AuditOutcome::Success,
        ));
        sink.emit(context.event("payment.failed", AuditCategory::Payment, AuditOutcome::Failed));

        assert_eq!(sink.event_types(), vec!["payment.order_created", "payment.failed"]);
        assert!(sink.last_of("payment.verified").is_none());
    }
}

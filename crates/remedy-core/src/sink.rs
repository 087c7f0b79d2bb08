//! Persistence collaborator for enforcement runs
//!
//! The enforcer hands every execution result and status transition to a
//! [`RemediationSink`] as soon as it happens. Sink failures are logged by the
//! enforcer and never change the enforcement outcome.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use remedy_model::{ExecutionResult, Incident, IncidentId, IncidentStatus};
use serde::{Deserialize, Serialize};

/// Sink could not persist a record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// Backing store rejected or dropped the write
    #[error("sink backend error: {0}")]
    Backend(String),
}

/// Receives results and transitions of enforcement runs
#[async_trait]
pub trait RemediationSink: Send + Sync {
    /// Incident moved from `from` to `to`
    async fn record_transition(
        &self,
        incident: &Incident,
        from: IncidentStatus,
        to: IncidentStatus,
    ) -> Result<(), SinkError>;

    /// One attempt of one action finished
    async fn record_result(&self, result: &ExecutionResult) -> Result<(), SinkError>;
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl RemediationSink for NoopSink {
    async fn record_transition(
        &self,
        _incident: &Incident,
        _from: IncidentStatus,
        _to: IncidentStatus,
    ) -> Result<(), SinkError> {
        Ok(())
    }

    async fn record_result(&self, _result: &ExecutionResult) -> Result<(), SinkError> {
        Ok(())
    }
}

/// One record kept by [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkRecord {
    /// Status transition
    Transition {
        /// Incident that moved
        incident_id: IncidentId,
        /// Previous status
        from: IncidentStatus,
        /// New status
        to: IncidentStatus,
        /// When the transition was recorded
        at: DateTime<Utc>,
    },
    /// Execution result
    Result(ExecutionResult),
}

/// Append-only in-memory sink
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<SinkRecord>>,
}

impl MemorySink {
    /// Create empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, oldest first
    #[must_use]
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().clone()
    }

    /// Recorded execution results, oldest first
    #[must_use]
    pub fn results(&self) -> Vec<ExecutionResult> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match r {
                SinkRecord::Result(result) => Some(result.clone()),
                SinkRecord::Transition { .. } => None,
            })
            .collect()
    }

    /// Recorded `(from, to)` transitions for one incident, oldest first
    #[must_use]
    pub fn transitions(&self, incident_id: IncidentId) -> Vec<(IncidentStatus, IncidentStatus)> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match r {
                SinkRecord::Transition {
                    incident_id: id,
                    from,
                    to,
                    ..
                } if *id == incident_id => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl RemediationSink for MemorySink {
    async fn record_transition(
        &self,
        incident: &Incident,
        from: IncidentStatus,
        to: IncidentStatus,
    ) -> Result<(), SinkError> {
        self.records.lock().push(SinkRecord::Transition {
            incident_id: incident.id,
            from,
            to,
            at: incident.updated_at,
        });
        Ok(())
    }

    async fn record_result(&self, result: &ExecutionResult) -> Result<(), SinkError> {
        self.records.lock().push(SinkRecord::Result(result.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remedy_model::{ActionOutcome, AffectedResource, PlanId, Severity};

    #[tokio::test]
    async fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        let mut incident = Incident::new(AffectedResource::unknown(), "Unknown", "", Severity::Low);

        let from = incident.transition_to(IncidentStatus::Remediating).unwrap();
        sink.record_transition(&incident, from, IncidentStatus::Remediating)
            .await
            .unwrap();
        let result = ExecutionResult::record(PlanId::new(), "a".into(), 1, ActionOutcome::success("ok"));
        sink.record_result(&result).await.unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(
            sink.transitions(incident.id),
            [(IncidentStatus::Open, IncidentStatus::Remediating)]
        );
        assert_eq!(sink.results(), [result]);
        assert!(sink.transitions(IncidentId::new()).is_empty());
    }

    #[test]
    fn records_serialize_tagged() {
        let record = SinkRecord::Transition {
            incident_id: IncidentId::new(),
            from: IncidentStatus::Remediating,
            to: IncidentStatus::Resolved,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "transition");
        assert_eq!(json["to"], "resolved");
    }
}

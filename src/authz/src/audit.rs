//! Audit trail for authorization decisions
//!
//! Every decision produces exactly one [`AuditRecord`], handed synchronously
//! to the [`AuditSink`] the engine was built with.

use crate::principal::{Principal, Principals};
use crate::types::{PolicyId, Request};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

/// Maximum number of records kept by [`MemoryAuditSink`]
const MEMORY_SINK_CAPACITY: usize = 10_000;

/// Records dropped at once when the memory sink is full
const MEMORY_SINK_DRAIN: usize = 1_000;

/// One authorization decision
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,

    pub audience: String,

    pub allowed: bool,

    /// Principal that was granted access; absent for denials
    pub subject: Option<Principal>,

    /// Every principal that was tried, in order
    pub principals: Principals,

    pub resource: String,

    pub action: String,

    /// Granting policies for allows, denying policies for denials
    #[serde(rename = "matchedPolicyIDs")]
    pub matched_policies: Vec<PolicyId>,
}

impl AuditRecord {
    pub fn new(
        audience: &str,
        request: &Request,
        allowed: bool,
        subject: Option<Principal>,
        matched_policies: Vec<PolicyId>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            audience: audience.to_string(),
            allowed,
            subject,
            principals: request.principals.clone(),
            resource: request.resource.clone(),
            action: request.action.clone(),
            matched_policies,
        }
    }
}

/// Receives audit records
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Emits each record as a structured `tracing` event on target `warden::audit`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        info!(
            target: "warden::audit",
            allowed = record.allowed,
            audience = %record.audience,
            subject = record.subject.as_ref().map(Principal::as_str).unwrap_or(""),
            principals = ?record.principals,
            resource = %record.resource,
            action = %record.action,
            policies = ?record.matched_policies,
            "authorization decision"
        );
    }
}

/// Bounded in-memory audit buffer
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    buffer: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the buffered records, oldest first
    pub fn records(&self) -> Vec<AuditRecord> {
        self.buffer.lock().clone()
    }

    /// Most recent record
    pub fn last(&self) -> Option<AuditRecord> {
        self.buffer.lock().last().cloned()
    }

    /// Most recent records granted to `subject`, newest first
    pub fn query_by_subject(&self, subject: &str, limit: usize) -> Vec<AuditRecord> {
        self.buffer
            .lock()
            .iter()
            .rev()
            .filter(|r| r.subject.as_ref().is_some_and(|s| s == subject))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> AuditStats {
        let buffer = self.buffer.lock();
        let allowed = buffer.iter().filter(|r| r.allowed).count();

        AuditStats {
            total_decisions: buffer.len(),
            allowed_decisions: allowed,
            denied_decisions: buffer.len() - allowed,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        let mut buffer = self.buffer.lock();
        buffer.push(record);

        if buffer.len() > MEMORY_SINK_CAPACITY {
            buffer.drain(0..MEMORY_SINK_DRAIN);
        }
    }
}

/// Audit statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditStats {
    pub total_decisions: usize,
    pub allowed_decisions: usize,
    pub denied_decisions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request {
        Request::new("doc:1", "read").with_principals(["userid:42", "group:staff"])
    }

    #[test]
    fn test_record_serialization() {
        let record = AuditRecord::new("svc1", &request(), true, Some(Principal::userid("42")), vec!["p1".into()]);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["allowed"], true);
        assert_eq!(json["subject"], "userid:42");
        assert_eq!(json["resource"], "doc:1");
        assert_eq!(json["action"], "read");
        assert_eq!(json["matchedPolicyIDs"], serde_json::json!(["p1"]));
        assert_eq!(json["principals"], serde_json::json!(["userid:42", "group:staff"]));
    }

    #[test]
    fn test_memory_sink_stats_and_query() {
        let sink = MemoryAuditSink::new();
        sink.record(AuditRecord::new("svc1", &request(), true, Some(Principal::userid("42")), vec![]));
        sink.record(AuditRecord::new("svc1", &request(), false, None, vec![]));
        sink.record(AuditRecord::new("svc1", &request(), true, Some(Principal::group("staff")), vec![]));

        assert_eq!(
            sink.stats(),
            AuditStats {
                total_decisions: 3,
                allowed_decisions: 2,
                denied_decisions: 1,
            }
        );
        assert_eq!(sink.query_by_subject("userid:42", 10).len(), 1);
        assert_eq!(sink.last().unwrap().subject, Some(Principal::group("staff")));
    }

    #[test]
    fn test_memory_sink_is_bounded() {
        let sink = MemoryAuditSink::new();
        for _ in 0..=MEMORY_SINK_CAPACITY {
            sink.record(AuditRecord::new("svc1", &request(), false, None, vec![]));
        }
        assert_eq!(sink.len(), MEMORY_SINK_CAPACITY + 1 - MEMORY_SINK_DRAIN);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_tracing_sink_accepts_records() {
        TracingAuditSink.record(AuditRecord::new("svc1", &request(), false, None, vec![]));
    }
}

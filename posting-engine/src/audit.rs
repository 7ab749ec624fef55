//! Before/after records for the audit trail
//!
//! The engine only builds these records. Persisting or shipping them is up
//! to the caller.

use crate::{
    actor::PostingOutcome,
    types::{CompanyId, Operation, TransactionId},
    Error, Result,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Audit entry for one committed posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Correlation id of the posting request
    pub request_id: Uuid,
    /// Operation that produced the change
    pub operation: Operation,
    /// Tenant
    pub company_id: CompanyId,
    /// Changed transaction
    pub transaction_id: TransactionId,
    /// When the record was built
    pub recorded_at: DateTime<Utc>,
    /// Stored state before the change (`None` on create)
    pub before: Option<Value>,
    /// Stored state after the change
    pub after: Value,
}

impl AuditRecord {
    /// Build the record from a worker outcome
    pub fn from_outcome(request_id: Uuid, operation: Operation, outcome: &PostingOutcome) -> Result<Self> {
        let after = to_json(&outcome.transaction)?;
        let before = outcome.previous.as_ref().map(to_json).transpose()?;

        Ok(Self {
            request_id,
            operation,
            company_id: outcome.transaction.company_id,
            transaction_id: outcome.transaction.id,
            recorded_at: Utc::now(),
            before,
            after,
        })
    }

    /// Top-level fields whose value differs between before and after
    pub fn changed_fields(&self) -> Vec<String> {
        let (Some(Value::Object(before)), Value::Object(after)) = (&self.before, &self.after) else {
            return Vec::new();
        };
        after
            .iter()
            .filter(|(key, value)| before.get(key.as_str()) != Some(*value))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Other(format!("audit serialization: {}", e)))
}

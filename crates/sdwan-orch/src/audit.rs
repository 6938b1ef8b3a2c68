//! Audit logging for tunnel lifecycle events.
//!
//! Every change to provisioned network state (application activation, tunnel
//! creation, rollback and teardown) emits one structured [`AuditRecord`]
//! through `tracing` on the `audit` target. The record is also rendered as a
//! single JSON document so log shippers can forward it unchanged.
//!
//! | Outcome | Level |
//! |---------|-------|
//! | Success | info |
//! | InProgress | debug |
//! | Failure | warn |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Audit event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    /// Application registration and shutdown
    SystemLifecycle,
    /// Tunnel creation
    ResourceCreate,
    /// Tunnel teardown
    ResourceDelete,
    /// Compensating actions after a partial failure
    Rollback,
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditCategory::SystemLifecycle => write!(f, "SYSTEM_LIFECYCLE"),
            AuditCategory::ResourceCreate => write!(f, "RESOURCE_CREATE"),
            AuditCategory::ResourceDelete => write!(f, "RESOURCE_DELETE"),
            AuditCategory::Rollback => write!(f, "ROLLBACK"),
        }
    }
}

/// Outcome of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
    InProgress,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Failure => write!(f, "failure"),
            AuditOutcome::InProgress => write!(f, "in_progress"),
        }
    }
}

/// Structured audit record.
///
/// Built with the `with_*` methods and handed to [`audit_log!`](crate::audit_log).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub category: AuditCategory,
    /// Component emitting the record, e.g. `SdwanOrch`.
    pub source: String,
    pub action: String,
    pub outcome: AuditOutcome,
    /// Tenant name for tunnel events, application name for lifecycle events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    /// Creates a record stamped with the current time. The outcome starts
    /// as `InProgress`.
    pub fn new(
        category: AuditCategory,
        source: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            source: source.into(),
            action: action.into(),
            outcome: AuditOutcome::InProgress,
            object_id: None,
            object_type: None,
            details: None,
            error: None,
        }
    }

    pub fn with_outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    pub fn with_object_type(mut self, obj_type: impl Into<String>) -> Self {
        self.object_type = Some(obj_type.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Sets the error message and marks the outcome as `Failure`.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.outcome = AuditOutcome::Failure;
        self
    }

    /// Serializes the record as a single-line JSON document.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
    }

    /// Logs the record on the `audit` target at the level its outcome maps
    /// to.
    pub fn emit(&self) {
        let json = self.to_json();
        match self.outcome {
            AuditOutcome::Success => {
                info!(target: "audit", audit_json = %json, "{}", self.summary())
            }
            AuditOutcome::InProgress => {
                debug!(target: "audit", audit_json = %json, "{}", self.summary())
            }
            AuditOutcome::Failure => warn!(
                target: "audit",
                error = self.error.as_deref().unwrap_or(""),
                audit_json = %json,
                "{}",
                self.summary()
            ),
        }
    }

    fn summary(&self) -> String {
        format!(
            "{} {} {} -> {}",
            self.category, self.source, self.action, self.outcome
        )
    }
}

/// Emits an [`AuditRecord`] on the `audit` tracing target.
#[macro_export]
macro_rules! audit_log {
    ($record:expr) => {
        $crate::audit::AuditRecord::emit(&$record)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults_in_progress() {
        let record = AuditRecord::new(AuditCategory::ResourceCreate, "SdwanOrch", "create_vpn");
        assert_eq!(record.outcome, AuditOutcome::InProgress);
        assert!(record.error.is_none());
    }

    #[test]
    fn test_with_error_marks_failure() {
        let record = AuditRecord::new(AuditCategory::ResourceDelete, "SdwanOrch", "teardown_vpn")
            .with_outcome(AuditOutcome::Success)
            .with_error("device rejected removal");
        assert_eq!(record.outcome, AuditOutcome::Failure);
        assert_eq!(record.error.as_deref(), Some("device rejected removal"));
    }

    #[test]
    fn test_json_skips_empty_fields() {
        let record = AuditRecord::new(AuditCategory::Rollback, "SdwanOrch", "withdraw_forward")
            .with_outcome(AuditOutcome::Success)
            .with_object_id("ACME")
            .with_details(serde_json::json!({ "label": 42 }));
        let json = record.to_json();
        assert!(json.contains("\"category\":\"ROLLBACK\""));
        assert!(json.contains("\"outcome\":\"success\""));
        assert!(json.contains("\"object_id\":\"ACME\""));
        assert!(json.contains("\"label\":42"));
        assert!(!json.contains("object_type"));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_display() {
        assert_eq!(AuditCategory::SystemLifecycle.to_string(), "SYSTEM_LIFECYCLE");
        assert_eq!(AuditOutcome::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn test_summary() {
        let record = AuditRecord::new(AuditCategory::Rollback, "SdwanOrch", "create_vpn")
            .with_error("device unreachable");
        assert_eq!(record.summary(), "ROLLBACK SdwanOrch create_vpn -> failure");
    }

    #[test]
    fn test_macro_accepts_record() {
        audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "test", "activate")
            .with_outcome(AuditOutcome::Success));
    }
}

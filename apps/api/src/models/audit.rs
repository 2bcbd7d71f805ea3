use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::string_enum;

string_enum! {
    pub enum ActionType {
        Create => "create",
        Read => "read",
        Update => "update",
        Delete => "delete",
        Login => "login",
        Logout => "logout",
        Export => "export",
        Download => "download",
    }
}

string_enum! {
    pub enum Severity {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

string_enum! {
    pub enum AccessType {
        View => "view",
        Export => "export",
        Download => "download",
    }
}

string_enum! {
    pub enum BiasType {
        Gender => "gender",
        Age => "age",
        Nationality => "nationality",
        Education => "education",
        Location => "location",
        Name => "name",
        Experience => "experience",
        Other => "other",
    }
}

string_enum! {
    pub enum BiasStatus {
        Pending => "pending",
        Reviewing => "reviewing",
        Addressed => "addressed",
        Dismissed => "dismissed",
        FalsePositive => "false_positive",
    }
}

impl BiasStatus {
    /// Statuses a reviewer may set; `addressed` goes through the address action.
    pub fn is_review_outcome(&self) -> bool {
        matches!(
            self,
            BiasStatus::Reviewing | BiasStatus::Dismissed | BiasStatus::FalsePositive
        )
    }
}

string_enum! {
    pub enum CheckType {
        Gdpr => "gdpr",
        EqualOpportunity => "equal_opportunity",
        DataRetention => "data_retention",
        Consent => "consent",
        Transparency => "transparency",
        BiasDetection => "bias_detection",
        Privacy => "privacy",
    }
}

string_enum! {
    pub enum CheckStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Passed => "passed",
        Failed => "failed",
        Warning => "warning",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_email: String,
    pub user_role: String,
    pub action_type: String,
    pub resource_type: String,
    pub resource_id: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub request_method: String,
    pub request_path: String,
    pub request_params: Value,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub changes: Option<Value>,
    pub status_code: i32,
    pub response_time_ms: i64,
    pub severity: String,
    pub is_suspicious: bool,
    pub is_success: bool,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BiasReportRow {
    pub id: Uuid,
    pub bias_type: String,
    pub severity: String,
    pub status: String,
    pub target_type: String,
    pub target_id: String,
    pub description: String,
    pub evidence: Value,
    pub confidence_score: Option<f64>,
    pub detected_by: String,
    pub reported_by: Option<Uuid>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: String,
    pub action_taken: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ComplianceCheckRow {
    pub id: Uuid,
    pub check_type: String,
    pub status: String,
    pub target_type: String,
    pub target_id: String,
    pub result_summary: String,
    pub findings: Value,
    pub compliance_score: Option<f64>,
    pub checked_by: Option<Uuid>,
    pub checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_outcomes_exclude_addressed() {
        assert!(BiasStatus::Dismissed.is_review_outcome());
        assert!(BiasStatus::FalsePositive.is_review_outcome());
        assert!(!BiasStatus::Addressed.is_review_outcome());
        assert!(!BiasStatus::Pending.is_review_outcome());
    }
}

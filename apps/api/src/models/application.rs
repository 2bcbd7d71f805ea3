use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::string_enum;

string_enum! {
    pub enum ApplicationStatus {
        Draft => "draft",
        Submitted => "submitted",
        Screening => "screening",
        Interview => "interview",
        Offer => "offer",
        Accepted => "accepted",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
}

impl ApplicationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    /// Forward-only pipeline; any open stage may reject or withdraw.
    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (*self, next) {
            (Draft, Rejected) => false,
            (_, Rejected | Withdrawn) => true,
            (Draft, Submitted)
            | (Submitted, Screening)
            | (Screening, Interview)
            | (Interview, Offer)
            | (Offer, Accepted) => true,
            _ => false,
        }
    }
}

string_enum! {
    pub enum InterviewType {
        Phone => "phone",
        Video => "video",
        Onsite => "onsite",
        Technical => "technical",
        Hr => "hr",
        Final => "final",
    }
}

string_enum! {
    pub enum InterviewResult {
        Pending => "pending",
        Completed => "completed",
        Passed => "passed",
        Failed => "failed",
        OnHold => "on_hold",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub job_id: Uuid,
    pub status: String,
    pub applied_at: DateTime<Utc>,
    pub cover_letter: String,
    pub matching_score: Option<f64>,
    pub ai_recommendation: String,
    pub screening_notes: String,
    pub interview_count: i32,
    pub last_interview_at: Option<DateTime<Utc>>,
    pub offer_at: Option<DateTime<Utc>>,
    pub offer_salary: Option<i32>,
    pub offer_notes: String,
    pub assigned_recruiter_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Application row with the candidate and job fields list views need.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationSummaryRow {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub candidate_name: String,
    pub candidate_email: String,
    pub job_id: Uuid,
    pub job_title: String,
    pub job_code: String,
    pub status: String,
    pub matching_score: Option<f64>,
    pub applied_at: DateTime<Utc>,
    pub cover_letter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterviewRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub interview_type: String,
    pub round_number: i32,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub interviewer_ids: Vec<Uuid>,
    pub result: String,
    pub technical_score: Option<i32>,
    pub communication_score: Option<i32>,
    pub cultural_fit_score: Option<i32>,
    pub overall_score: Option<i32>,
    pub feedback: String,
    pub strengths: String,
    pub weaknesses: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

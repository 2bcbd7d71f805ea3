use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::string_enum;

string_enum! {
    pub enum JobStatus {
        Draft => "draft",
        Active => "active",
        Paused => "paused",
        Closed => "closed",
        Filled => "filled",
    }
}

impl JobStatus {
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (*self, next),
            (Draft, Active | Closed)
                | (Active, Paused | Closed | Filled)
                | (Paused, Active | Closed)
                | (Closed, Active)
        )
    }
}

string_enum! {
    pub enum EmploymentType {
        FullTime => "full_time",
        Contract => "contract",
        PartTime => "part_time",
        Internship => "internship",
        Temporary => "temporary",
    }
}

string_enum! {
    pub enum ExperienceLevel {
        Entry => "entry",
        Junior => "junior",
        Mid => "mid",
        Senior => "senior",
        Lead => "lead",
    }
}

impl ExperienceLevel {
    /// Inclusive band of years of experience; `None` upper bound is open.
    pub fn years_band(&self) -> (u32, Option<u32>) {
        match self {
            ExperienceLevel::Entry => (0, Some(1)),
            ExperienceLevel::Junior => (1, Some(3)),
            ExperienceLevel::Mid => (3, Some(7)),
            ExperienceLevel::Senior => (7, None),
            ExperienceLevel::Lead => (10, None),
        }
    }
}

string_enum! {
    pub enum RequirementType {
        Required => "required",
        Preferred => "preferred",
        NiceToHave => "nice_to_have",
    }
}

string_enum! {
    pub enum SkillRequirementLevel {
        Required => "required",
        Preferred => "preferred",
    }
}

string_enum! {
    pub enum RecommendationLevel {
        HighlyRecommended => "highly_recommended",
        Recommended => "recommended",
        Consider => "consider",
        NotRecommended => "not_recommended",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub job_code: String,
    pub title: String,
    pub department: String,
    pub location: String,
    pub remote_work_option: String,
    pub employment_type: String,
    pub experience_level: String,
    pub minimum_degree: Option<String>,
    pub description: String,
    pub responsibilities: String,
    pub qualifications: String,
    pub preferred_qualifications: String,
    pub salary_min: i32,
    pub salary_max: i32,
    pub salary_currency: String,
    pub benefits: String,
    pub number_of_positions: i32,
    pub deadline: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub status: String,
    pub is_featured: bool,
    pub priority: i32,
    pub hiring_manager_id: Option<Uuid>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRow {
    /// Open for applications: active and not past the deadline.
    pub fn is_open_on(&self, today: NaiveDate) -> bool {
        self.status == JobStatus::Active.as_str() && self.deadline.map_or(true, |d| d >= today)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRequirementRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub requirement_type: String,
    pub category: String,
    pub description: String,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Job skill joined with the skill master row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobSkillRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub skill_id: Uuid,
    pub skill_name: String,
    pub requirement_level: String,
    pub minimum_proficiency: String,
    pub minimum_years: i32,
    pub weight: i32,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchingResultRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub candidate_id: Uuid,
    pub overall_score: f64,
    pub skill_match_score: f64,
    pub experience_match_score: f64,
    pub education_match_score: f64,
    pub matched_skills: Value,
    pub missing_skills: Value,
    pub extra_skills: Value,
    pub recommendation_level: String,
    pub calculation_method: String,
    pub calculated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_lifecycle_transitions() {
        assert!(JobStatus::Draft.can_transition_to(JobStatus::Active));
        assert!(JobStatus::Active.can_transition_to(JobStatus::Closed));
        assert!(JobStatus::Closed.can_transition_to(JobStatus::Active));
        assert!(!JobStatus::Filled.can_transition_to(JobStatus::Active));
        assert!(!JobStatus::Draft.can_transition_to(JobStatus::Filled));
        assert!(!JobStatus::Active.can_transition_to(JobStatus::Active));
    }

    #[test]
    fn test_open_bands_for_senior_levels() {
        assert_eq!(ExperienceLevel::Senior.years_band(), (7, None));
        assert_eq!(ExperienceLevel::Mid.years_band(), (3, Some(7)));
    }
}

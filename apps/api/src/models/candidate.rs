use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::string_enum;

string_enum! {
    pub enum SkillCategory {
        Programming => "programming",
        Framework => "framework",
        Database => "database",
        Cloud => "cloud",
        Tool => "tool",
        SoftSkill => "soft_skill",
        Language => "language",
        Other => "other",
    }
}

string_enum! {
    pub enum CandidateStatus {
        Active => "active",
        Inactive => "inactive",
        Hired => "hired",
        Withdrawn => "withdrawn",
    }
}

string_enum! {
    /// Ordered from weakest to strongest; see `rank`.
    pub enum Proficiency {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
        Expert => "expert",
    }
}

impl Proficiency {
    pub fn rank(&self) -> u8 {
        match self {
            Proficiency::Beginner => 1,
            Proficiency::Intermediate => 2,
            Proficiency::Advanced => 3,
            Proficiency::Expert => 4,
        }
    }
}

string_enum! {
    pub enum Degree {
        HighSchool => "high_school",
        Associate => "associate",
        Bachelor => "bachelor",
        Master => "master",
        Doctorate => "doctorate",
        Other => "other",
    }
}

impl Degree {
    /// `Other` ranks with high school: unknown programmes earn no extra credit.
    pub fn rank(&self) -> u8 {
        match self {
            Degree::HighSchool | Degree::Other => 1,
            Degree::Associate => 2,
            Degree::Bachelor => 3,
            Degree::Master => 4,
            Degree::Doctorate => 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SkillRow {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String,
    pub nationality: String,
    pub address: String,
    pub postal_code: String,
    pub current_position: String,
    pub years_of_experience: i32,
    pub status: String,
    pub available_date: Option<NaiveDate>,
    pub expected_salary: Option<i32>,
    pub resume_s3_key: Option<String>,
    pub portfolio_url: String,
    pub linkedin_url: String,
    pub github_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateProfileRow {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub summary: String,
    pub career_objective: String,
    pub technical_skills_summary: String,
    pub soft_skills_summary: String,
    pub preferred_work_style: String,
    pub preferred_location: String,
    pub willing_to_relocate: bool,
    pub remote_work_preference: String,
    pub japanese_level: String,
    pub english_level: String,
    pub other_languages: String,
    pub certifications: String,
    pub awards: String,
    pub publications: String,
    pub ai_summary: String,
    pub strengths: String,
    pub improvement_areas: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Candidate skill joined with the skill master row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateSkillRow {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub skill_id: Uuid,
    pub skill_name: String,
    pub skill_category: String,
    pub proficiency_level: String,
    pub years_of_experience: i32,
    pub last_used_date: Option<NaiveDate>,
    pub is_primary: bool,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EducationRow {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub institution_name: String,
    pub degree: String,
    pub field_of_study: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub gpa: Option<f64>,
    pub description: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkExperienceRow {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub company_name: String,
    pub position: String,
    pub employment_type: String,
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub description: String,
    pub achievements: String,
    pub technologies_used: String,
    pub team_size: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkExperienceRow {
    /// Whole months between start and end (or `today` for current roles).
    pub fn duration_months(&self, today: NaiveDate) -> i32 {
        let end = self.end_date.unwrap_or(today);
        (end.year() - self.start_date.year()) * 12 + end.month() as i32
            - self.start_date.month() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_proficiency_ranks_are_ordered() {
        let ranks: Vec<u8> = Proficiency::ALL.iter().map(|p| p.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_degree_other_ranks_lowest() {
        assert_eq!(Degree::Other.rank(), Degree::HighSchool.rank());
        assert!(Degree::Doctorate.rank() > Degree::Master.rank());
    }

    #[test]
    fn test_duration_months() {
        let exp = WorkExperienceRow {
            id: Uuid::new_v4(),
            candidate_id: Uuid::new_v4(),
            company_name: "Acme".to_string(),
            position: "Engineer".to_string(),
            employment_type: String::new(),
            location: String::new(),
            start_date: date(2020, 4, 1),
            end_date: Some(date(2022, 1, 31)),
            is_current: false,
            description: String::new(),
            achievements: String::new(),
            technologies_used: String::new(),
            team_size: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(exp.duration_months(date(2030, 1, 1)), 21);
    }

    #[test]
    fn test_snake_case_wire_names() {
        assert_eq!(SkillCategory::SoftSkill.as_str(), "soft_skill");
        assert_eq!(
            serde_json::to_string(&Degree::HighSchool).unwrap(),
            "\"high_school\""
        );
        assert_eq!("expert".parse::<Proficiency>().unwrap(), Proficiency::Expert);
    }
}

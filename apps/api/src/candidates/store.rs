use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::candidate::{
    CandidateProfileRow, CandidateRow, CandidateSkillRow, CandidateStatus, Degree, EducationRow,
    Proficiency, SkillCategory, SkillRow, WorkExperienceRow,
};

// ────────────────────────────────────────────────────────────────────────────
// Skills
// ────────────────────────────────────────────────────────────────────────────

pub async fn list_skills(
    pool: &PgPool,
    category: Option<&str>,
    search: Option<&str>,
) -> Result<Vec<SkillRow>, AppError> {
    Ok(sqlx::query_as::<_, SkillRow>(
        r#"
        SELECT * FROM skills
        WHERE ($1::text IS NULL OR category = $1)
          AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%' OR description ILIKE '%' || $2 || '%')
        ORDER BY category, name
        "#,
    )
    .bind(category)
    .bind(search)
    .fetch_all(pool)
    .await?)
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewSkill {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    pub category: SkillCategory,
    #[serde(default)]
    pub description: String,
}

pub async fn insert_skill(pool: &PgPool, skill: &NewSkill) -> Result<SkillRow, AppError> {
    Ok(sqlx::query_as::<_, SkillRow>(
        "INSERT INTO skills (name, category, description) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(skill.name.trim())
    .bind(skill.category.as_str())
    .bind(&skill.description)
    .fetch_one(pool)
    .await?)
}

// ────────────────────────────────────────────────────────────────────────────
// Candidates
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CandidateSummaryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub current_position: String,
    pub years_of_experience: i32,
    pub status: String,
    pub expected_salary: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// `user_id` set restricts the list to that user's own record.
#[derive(Debug, Default)]
pub struct CandidateFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<CandidateStatus>,
    pub search: Option<String>,
}

pub async fn list_candidates(
    pool: &PgPool,
    filter: &CandidateFilter,
) -> Result<Vec<CandidateSummaryRow>, AppError> {
    Ok(sqlx::query_as::<_, CandidateSummaryRow>(
        r#"
        SELECT c.id, c.user_id, TRIM(u.first_name || ' ' || u.last_name) AS full_name, u.email,
               c.current_position, c.years_of_experience, c.status, c.expected_salary, c.created_at
        FROM candidates c
        JOIN users u ON u.id = c.user_id
        WHERE ($1::uuid IS NULL OR c.user_id = $1)
          AND ($2::text IS NULL OR c.status = $2)
          AND ($3::text IS NULL
               OR u.email ILIKE '%' || $3 || '%'
               OR u.first_name ILIKE '%' || $3 || '%'
               OR u.last_name ILIKE '%' || $3 || '%'
               OR c.current_position ILIKE '%' || $3 || '%')
        ORDER BY c.created_at DESC
        "#,
    )
    .bind(filter.user_id)
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.search.as_deref())
    .fetch_all(pool)
    .await?)
}

pub async fn get_candidate(pool: &PgPool, id: Uuid) -> Result<CandidateRow, AppError> {
    sqlx::query_as::<_, CandidateRow>("SELECT * FROM candidates WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Candidate {id}")))
}

pub async fn candidate_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<CandidateRow>, AppError> {
    Ok(
        sqlx::query_as::<_, CandidateRow>("SELECT * FROM candidates WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Create and partial-update payload; absent fields keep their value.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CandidateInput {
    /// Staff only: the user the record belongs to.
    pub user_id: Option<Uuid>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 20))]
    pub gender: Option<String>,
    #[validate(length(max = 100))]
    pub nationality: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 10))]
    pub postal_code: Option<String>,
    #[validate(length(max = 200))]
    pub current_position: Option<String>,
    #[validate(range(min = 0, max = 80, message = "years_of_experience must be between 0 and 80"))]
    pub years_of_experience: Option<i32>,
    pub status: Option<CandidateStatus>,
    pub available_date: Option<NaiveDate>,
    #[validate(range(min = 0))]
    pub expected_salary: Option<i32>,
    #[validate(url)]
    pub portfolio_url: Option<String>,
    #[validate(url)]
    pub linkedin_url: Option<String>,
    #[validate(url)]
    pub github_url: Option<String>,
}

pub async fn insert_candidate(
    pool: &PgPool,
    user_id: Uuid,
    input: &CandidateInput,
) -> Result<CandidateRow, AppError> {
    Ok(sqlx::query_as::<_, CandidateRow>(
        r#"
        INSERT INTO candidates
            (user_id, date_of_birth, gender, nationality, address, postal_code,
             current_position, years_of_experience, status, available_date, expected_salary,
             portfolio_url, linkedin_url, github_url)
        VALUES ($1, $2, COALESCE($3, ''), COALESCE($4, ''), COALESCE($5, ''), COALESCE($6, ''),
                COALESCE($7, ''), COALESCE($8, 0), COALESCE($9, 'active'), $10, $11,
                COALESCE($12, ''), COALESCE($13, ''), COALESCE($14, ''))
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(input.date_of_birth)
    .bind(input.gender.as_deref())
    .bind(input.nationality.as_deref())
    .bind(input.address.as_deref())
    .bind(input.postal_code.as_deref())
    .bind(input.current_position.as_deref())
    .bind(input.years_of_experience)
    .bind(input.status.map(|s| s.as_str()))
    .bind(input.available_date)
    .bind(input.expected_salary)
    .bind(input.portfolio_url.as_deref())
    .bind(input.linkedin_url.as_deref())
    .bind(input.github_url.as_deref())
    .fetch_one(pool)
    .await?)
}

pub async fn update_candidate(
    pool: &PgPool,
    id: Uuid,
    input: &CandidateInput,
) -> Result<CandidateRow, AppError> {
    Ok(sqlx::query_as::<_, CandidateRow>(
        r#"
        UPDATE candidates SET
            date_of_birth       = COALESCE($2, date_of_birth),
            gender              = COALESCE($3, gender),
            nationality         = COALESCE($4, nationality),
            address             = COALESCE($5, address),
            postal_code         = COALESCE($6, postal_code),
            current_position    = COALESCE($7, current_position),
            years_of_experience = COALESCE($8, years_of_experience),
            status              = COALESCE($9, status),
            available_date      = COALESCE($10, available_date),
            expected_salary     = COALESCE($11, expected_salary),
            portfolio_url       = COALESCE($12, portfolio_url),
            linkedin_url        = COALESCE($13, linkedin_url),
            github_url          = COALESCE($14, github_url),
            updated_at          = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(input.date_of_birth)
    .bind(input.gender.as_deref())
    .bind(input.nationality.as_deref())
    .bind(input.address.as_deref())
    .bind(input.postal_code.as_deref())
    .bind(input.current_position.as_deref())
    .bind(input.years_of_experience)
    .bind(input.status.map(|s| s.as_str()))
    .bind(input.available_date)
    .bind(input.expected_salary)
    .bind(input.portfolio_url.as_deref())
    .bind(input.linkedin_url.as_deref())
    .bind(input.github_url.as_deref())
    .fetch_one(pool)
    .await?)
}

pub async fn delete_candidate(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM candidates WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_resume_key(pool: &PgPool, id: Uuid, key: &str) -> Result<CandidateRow, AppError> {
    Ok(sqlx::query_as::<_, CandidateRow>(
        "UPDATE candidates SET resume_s3_key = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(key)
    .fetch_one(pool)
    .await?)
}

// ────────────────────────────────────────────────────────────────────────────
// Profile
// ────────────────────────────────────────────────────────────────────────────

pub async fn get_profile(
    pool: &PgPool,
    candidate_id: Uuid,
) -> Result<Option<CandidateProfileRow>, AppError> {
    Ok(sqlx::query_as::<_, CandidateProfileRow>(
        "SELECT * FROM candidate_profiles WHERE candidate_id = $1",
    )
    .bind(candidate_id)
    .fetch_optional(pool)
    .await?)
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileInput {
    pub summary: Option<String>,
    pub career_objective: Option<String>,
    pub technical_skills_summary: Option<String>,
    pub soft_skills_summary: Option<String>,
    #[validate(length(max = 50))]
    pub preferred_work_style: Option<String>,
    #[validate(length(max = 200))]
    pub preferred_location: Option<String>,
    pub willing_to_relocate: Option<bool>,
    #[validate(length(max = 20))]
    pub remote_work_preference: Option<String>,
    #[validate(length(max = 20))]
    pub japanese_level: Option<String>,
    #[validate(length(max = 20))]
    pub english_level: Option<String>,
    pub other_languages: Option<String>,
    pub certifications: Option<String>,
    pub awards: Option<String>,
    pub publications: Option<String>,
    pub ai_summary: Option<String>,
    pub strengths: Option<String>,
    pub improvement_areas: Option<String>,
}

/// Creates the profile on first use, then applies the given fields.
pub async fn upsert_profile(
    pool: &PgPool,
    candidate_id: Uuid,
    input: &ProfileInput,
) -> Result<CandidateProfileRow, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO candidate_profiles (candidate_id) VALUES ($1) ON CONFLICT (candidate_id) DO NOTHING",
    )
    .bind(candidate_id)
    .execute(&mut *tx)
    .await?;

    let profile = sqlx::query_as::<_, CandidateProfileRow>(
        r#"
        UPDATE candidate_profiles SET
            summary                  = COALESCE($2, summary),
            career_objective         = COALESCE($3, career_objective),
            technical_skills_summary = COALESCE($4, technical_skills_summary),
            soft_skills_summary      = COALESCE($5, soft_skills_summary),
            preferred_work_style     = COALESCE($6, preferred_work_style),
            preferred_location       = COALESCE($7, preferred_location),
            willing_to_relocate      = COALESCE($8, willing_to_relocate),
            remote_work_preference   = COALESCE($9, remote_work_preference),
            japanese_level           = COALESCE($10, japanese_level),
            english_level            = COALESCE($11, english_level),
            other_languages          = COALESCE($12, other_languages),
            certifications           = COALESCE($13, certifications),
            awards                   = COALESCE($14, awards),
            publications             = COALESCE($15, publications),
            ai_summary               = COALESCE($16, ai_summary),
            strengths                = COALESCE($17, strengths),
            improvement_areas        = COALESCE($18, improvement_areas),
            updated_at               = now()
        WHERE candidate_id = $1
        RETURNING *
        "#,
    )
    .bind(candidate_id)
    .bind(input.summary.as_deref())
    .bind(input.career_objective.as_deref())
    .bind(input.technical_skills_summary.as_deref())
    .bind(input.soft_skills_summary.as_deref())
    .bind(input.preferred_work_style.as_deref())
    .bind(input.preferred_location.as_deref())
    .bind(input.willing_to_relocate)
    .bind(input.remote_work_preference.as_deref())
    .bind(input.japanese_level.as_deref())
    .bind(input.english_level.as_deref())
    .bind(input.other_languages.as_deref())
    .bind(input.certifications.as_deref())
    .bind(input.awards.as_deref())
    .bind(input.publications.as_deref())
    .bind(input.ai_summary.as_deref())
    .bind(input.strengths.as_deref())
    .bind(input.improvement_areas.as_deref())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(profile)
}

// ────────────────────────────────────────────────────────────────────────────
// Skills held, education, work history
// ────────────────────────────────────────────────────────────────────────────

pub async fn list_candidate_skills(
    pool: &PgPool,
    candidate_id: Uuid,
) -> Result<Vec<CandidateSkillRow>, AppError> {
    Ok(sqlx::query_as::<_, CandidateSkillRow>(
        r#"
        SELECT cs.id, cs.candidate_id, cs.skill_id, s.name AS skill_name,
               s.category AS skill_category, cs.proficiency_level, cs.years_of_experience,
               cs.last_used_date, cs.is_primary, cs.notes, cs.created_at, cs.updated_at
        FROM candidate_skills cs
        JOIN skills s ON s.id = cs.skill_id
        WHERE cs.candidate_id = $1
        ORDER BY cs.is_primary DESC, cs.years_of_experience DESC, s.name
        "#,
    )
    .bind(candidate_id)
    .fetch_all(pool)
    .await?)
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewCandidateSkill {
    pub skill_id: Uuid,
    pub proficiency_level: Proficiency,
    #[validate(range(min = 0, max = 80))]
    #[serde(default)]
    pub years_of_experience: i32,
    pub last_used_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub notes: String,
}

pub async fn add_candidate_skill(
    pool: &PgPool,
    candidate_id: Uuid,
    skill: &NewCandidateSkill,
) -> Result<CandidateSkillRow, AppError> {
    Ok(sqlx::query_as::<_, CandidateSkillRow>(
        r#"
        WITH inserted AS (
            INSERT INTO candidate_skills
                (candidate_id, skill_id, proficiency_level, years_of_experience,
                 last_used_date, is_primary, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
        )
        SELECT i.id, i.candidate_id, i.skill_id, s.name AS skill_name,
               s.category AS skill_category, i.proficiency_level, i.years_of_experience,
               i.last_used_date, i.is_primary, i.notes, i.created_at, i.updated_at
        FROM inserted i
        JOIN skills s ON s.id = i.skill_id
        "#,
    )
    .bind(candidate_id)
    .bind(skill.skill_id)
    .bind(skill.proficiency_level.as_str())
    .bind(skill.years_of_experience)
    .bind(skill.last_used_date)
    .bind(skill.is_primary)
    .bind(&skill.notes)
    .fetch_one(pool)
    .await?)
}

pub async fn list_educations(
    pool: &PgPool,
    candidate_id: Uuid,
) -> Result<Vec<EducationRow>, AppError> {
    Ok(sqlx::query_as::<_, EducationRow>(
        "SELECT * FROM educations WHERE candidate_id = $1 ORDER BY start_date DESC",
    )
    .bind(candidate_id)
    .fetch_all(pool)
    .await?)
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewEducation {
    #[validate(length(min = 1, max = 200, message = "institution_name must be 1-200 characters"))]
    pub institution_name: String,
    pub degree: Degree,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub field_of_study: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_current: bool,
    #[validate(range(min = 0.0, max = 5.0, message = "gpa must be between 0 and 5"))]
    pub gpa: Option<f64>,
    #[serde(default)]
    pub description: String,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub location: String,
}

pub async fn add_education(
    pool: &PgPool,
    candidate_id: Uuid,
    e: &NewEducation,
) -> Result<EducationRow, AppError> {
    Ok(sqlx::query_as::<_, EducationRow>(
        r#"
        INSERT INTO educations
            (candidate_id, institution_name, degree, field_of_study, start_date, end_date,
             is_current, gpa, description, location)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(candidate_id)
    .bind(&e.institution_name)
    .bind(e.degree.as_str())
    .bind(&e.field_of_study)
    .bind(e.start_date)
    .bind(e.end_date)
    .bind(e.is_current)
    .bind(e.gpa)
    .bind(&e.description)
    .bind(&e.location)
    .fetch_one(pool)
    .await?)
}

pub async fn list_work_experiences(
    pool: &PgPool,
    candidate_id: Uuid,
) -> Result<Vec<WorkExperienceRow>, AppError> {
    Ok(sqlx::query_as::<_, WorkExperienceRow>(
        "SELECT * FROM work_experiences WHERE candidate_id = $1 ORDER BY start_date DESC",
    )
    .bind(candidate_id)
    .fetch_all(pool)
    .await?)
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewWorkExperience {
    #[validate(length(min = 1, max = 200, message = "company_name must be 1-200 characters"))]
    pub company_name: String,
    #[validate(length(min = 1, max = 200, message = "position must be 1-200 characters"))]
    pub position: String,
    #[validate(length(max = 20))]
    #[serde(default)]
    pub employment_type: String,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub achievements: String,
    #[serde(default)]
    pub technologies_used: String,
    #[validate(range(min = 1, message = "team_size must be at least 1"))]
    pub team_size: Option<i32>,
}

pub async fn add_work_experience(
    pool: &PgPool,
    candidate_id: Uuid,
    w: &NewWorkExperience,
) -> Result<WorkExperienceRow, AppError> {
    Ok(sqlx::query_as::<_, WorkExperienceRow>(
        r#"
        INSERT INTO work_experiences
            (candidate_id, company_name, position, employment_type, location, start_date,
             end_date, is_current, description, achievements, technologies_used, team_size)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(candidate_id)
    .bind(&w.company_name)
    .bind(&w.position)
    .bind(&w.employment_type)
    .bind(&w.location)
    .bind(w.start_date)
    .bind(w.end_date)
    .bind(w.is_current)
    .bind(&w.description)
    .bind(&w.achievements)
    .bind(&w.technologies_used)
    .bind(w.team_size)
    .fetch_one(pool)
    .await?)
}

/// End date, when given, must not precede the start date.
pub fn check_date_range(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), AppError> {
    match end {
        Some(end) if end < start => Err(AppError::Validation(
            "end_date cannot be earlier than start_date".to_string(),
        )),
        _ => Ok(()),
    }
}

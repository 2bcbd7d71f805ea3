use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::candidate::{Degree, Proficiency};
use crate::models::job::{
    EmploymentType, ExperienceLevel, JobRequirementRow, JobRow, JobSkillRow, JobStatus,
    RequirementType, SkillRequirementLevel,
};

#[derive(Debug, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub location: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub experience_level: Option<ExperienceLevel>,
    /// Jobs whose `salary_max` reaches at least this much.
    pub min_salary: Option<i32>,
    /// Jobs whose `salary_min` is at most this much.
    pub max_salary: Option<i32>,
    pub search: Option<String>,
    pub skill_ids: Option<Vec<Uuid>>,
}

pub async fn list_jobs(pool: &PgPool, f: &JobFilter) -> Result<Vec<JobRow>, AppError> {
    Ok(sqlx::query_as::<_, JobRow>(
        r#"
        SELECT * FROM jobs j
        WHERE ($1::text IS NULL OR j.status = $1)
          AND ($2::text IS NULL OR j.location ILIKE '%' || $2 || '%')
          AND ($3::text IS NULL OR j.employment_type = $3)
          AND ($4::text IS NULL OR j.experience_level = $4)
          AND ($5::int IS NULL OR j.salary_max >= $5)
          AND ($6::int IS NULL OR j.salary_min <= $6)
          AND ($7::text IS NULL
               OR j.title ILIKE '%' || $7 || '%'
               OR j.description ILIKE '%' || $7 || '%'
               OR j.job_code ILIKE '%' || $7 || '%')
          AND ($8::uuid[] IS NULL OR EXISTS (
               SELECT 1 FROM job_skills js WHERE js.job_id = j.id AND js.skill_id = ANY($8)))
        ORDER BY j.is_featured DESC, j.priority DESC, j.created_at DESC
        "#,
    )
    .bind(f.status.map(|s| s.as_str()))
    .bind(f.location.as_deref())
    .bind(f.employment_type.map(|e| e.as_str()))
    .bind(f.experience_level.map(|e| e.as_str()))
    .bind(f.min_salary)
    .bind(f.max_salary)
    .bind(f.search.as_deref())
    .bind(f.skill_ids.as_deref())
    .fetch_all(pool)
    .await?)
}

pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<JobRow, AppError> {
    sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Job {id}")))
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewJob {
    #[validate(length(min = 1, max = 50, message = "job_code must be 1-50 characters"))]
    pub job_code: String,
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub department: String,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub location: String,
    #[validate(length(max = 20))]
    #[serde(default)]
    pub remote_work_option: String,
    pub employment_type: EmploymentType,
    pub experience_level: ExperienceLevel,
    pub minimum_degree: Option<Degree>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub responsibilities: String,
    #[serde(default)]
    pub qualifications: String,
    #[serde(default)]
    pub preferred_qualifications: String,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub salary_min: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub salary_max: i32,
    #[validate(length(min = 3, max = 3))]
    #[serde(default = "default_currency")]
    pub salary_currency: String,
    #[serde(default)]
    pub benefits: String,
    #[validate(range(min = 1))]
    #[serde(default = "default_positions")]
    pub number_of_positions: i32,
    pub deadline: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_featured: bool,
    #[validate(range(min = 0, max = 10))]
    #[serde(default)]
    pub priority: i32,
}

fn default_currency() -> String {
    "JPY".to_string()
}

fn default_positions() -> i32 {
    1
}

/// `salary_min` may not exceed `salary_max` once both are known.
pub fn check_salary_range(min: i32, max: i32) -> Result<(), AppError> {
    if max > 0 && min > max {
        return Err(AppError::Validation(
            "salary_min cannot exceed salary_max".to_string(),
        ));
    }
    Ok(())
}

/// New jobs always start as drafts.
pub async fn insert_job(pool: &PgPool, j: &NewJob, hiring_manager_id: Uuid) -> Result<JobRow, AppError> {
    Ok(sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO jobs
            (job_code, title, department, location, remote_work_option, employment_type,
             experience_level, minimum_degree, description, responsibilities, qualifications,
             preferred_qualifications, salary_min, salary_max, salary_currency, benefits,
             number_of_positions, deadline, start_date, is_featured, priority, hiring_manager_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22)
        RETURNING *
        "#,
    )
    .bind(j.job_code.trim())
    .bind(j.title.trim())
    .bind(&j.department)
    .bind(&j.location)
    .bind(&j.remote_work_option)
    .bind(j.employment_type.as_str())
    .bind(j.experience_level.as_str())
    .bind(j.minimum_degree.map(|d| d.as_str()))
    .bind(&j.description)
    .bind(&j.responsibilities)
    .bind(&j.qualifications)
    .bind(&j.preferred_qualifications)
    .bind(j.salary_min)
    .bind(j.salary_max)
    .bind(&j.salary_currency)
    .bind(&j.benefits)
    .bind(j.number_of_positions)
    .bind(j.deadline)
    .bind(j.start_date)
    .bind(j.is_featured)
    .bind(j.priority)
    .bind(hiring_manager_id)
    .fetch_one(pool)
    .await?)
}

/// Partial update; status changes go through `set_status`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct JobUpdate {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 20))]
    pub remote_work_option: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub experience_level: Option<ExperienceLevel>,
    pub minimum_degree: Option<Degree>,
    pub description: Option<String>,
    pub responsibilities: Option<String>,
    pub qualifications: Option<String>,
    pub preferred_qualifications: Option<String>,
    #[validate(range(min = 0))]
    pub salary_min: Option<i32>,
    #[validate(range(min = 0))]
    pub salary_max: Option<i32>,
    pub benefits: Option<String>,
    #[validate(range(min = 1))]
    pub number_of_positions: Option<i32>,
    pub deadline: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub is_featured: Option<bool>,
    #[validate(range(min = 0, max = 10))]
    pub priority: Option<i32>,
    pub hiring_manager_id: Option<Uuid>,
}

pub async fn update_job(pool: &PgPool, id: Uuid, u: &JobUpdate) -> Result<JobRow, AppError> {
    Ok(sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs SET
            title                    = COALESCE($2, title),
            department               = COALESCE($3, department),
            location                 = COALESCE($4, location),
            remote_work_option       = COALESCE($5, remote_work_option),
            employment_type          = COALESCE($6, employment_type),
            experience_level         = COALESCE($7, experience_level),
            minimum_degree           = COALESCE($8, minimum_degree),
            description              = COALESCE($9, description),
            responsibilities         = COALESCE($10, responsibilities),
            qualifications           = COALESCE($11, qualifications),
            preferred_qualifications = COALESCE($12, preferred_qualifications),
            salary_min               = COALESCE($13, salary_min),
            salary_max               = COALESCE($14, salary_max),
            benefits                 = COALESCE($15, benefits),
            number_of_positions      = COALESCE($16, number_of_positions),
            deadline                 = COALESCE($17, deadline),
            start_date               = COALESCE($18, start_date),
            is_featured              = COALESCE($19, is_featured),
            priority                 = COALESCE($20, priority),
            hiring_manager_id        = COALESCE($21, hiring_manager_id),
            updated_at               = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(u.title.as_deref())
    .bind(u.department.as_deref())
    .bind(u.location.as_deref())
    .bind(u.remote_work_option.as_deref())
    .bind(u.employment_type.map(|e| e.as_str()))
    .bind(u.experience_level.map(|e| e.as_str()))
    .bind(u.minimum_degree.map(|d| d.as_str()))
    .bind(u.description.as_deref())
    .bind(u.responsibilities.as_deref())
    .bind(u.qualifications.as_deref())
    .bind(u.preferred_qualifications.as_deref())
    .bind(u.salary_min)
    .bind(u.salary_max)
    .bind(u.benefits.as_deref())
    .bind(u.number_of_positions)
    .bind(u.deadline)
    .bind(u.start_date)
    .bind(u.is_featured)
    .bind(u.priority)
    .bind(u.hiring_manager_id)
    .fetch_one(pool)
    .await?)
}

pub async fn delete_job(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Stamps `published_at` the first time the job becomes active.
pub async fn set_status(pool: &PgPool, id: Uuid, status: JobStatus) -> Result<JobRow, AppError> {
    Ok(sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs SET
            status       = $2,
            published_at = CASE WHEN $2 = 'active' AND published_at IS NULL
                                THEN now() ELSE published_at END,
            updated_at   = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .fetch_one(pool)
    .await?)
}

// ────────────────────────────────────────────────────────────────────────────
// Skills and requirements
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct NewJobSkill {
    pub skill_id: Uuid,
    #[serde(default = "default_requirement_level")]
    pub requirement_level: SkillRequirementLevel,
    #[serde(default = "default_minimum_proficiency")]
    pub minimum_proficiency: Proficiency,
    #[validate(range(min = 0, max = 50))]
    #[serde(default)]
    pub minimum_years: i32,
    #[validate(range(min = 1, max = 10, message = "weight must be between 1 and 10"))]
    #[serde(default = "default_weight")]
    pub weight: i32,
    #[serde(default)]
    pub notes: String,
}

fn default_requirement_level() -> SkillRequirementLevel {
    SkillRequirementLevel::Required
}

fn default_minimum_proficiency() -> Proficiency {
    Proficiency::Intermediate
}

fn default_weight() -> i32 {
    1
}

pub async fn add_job_skill(pool: &PgPool, job_id: Uuid, s: &NewJobSkill) -> Result<JobSkillRow, AppError> {
    Ok(sqlx::query_as::<_, JobSkillRow>(
        r#"
        WITH inserted AS (
            INSERT INTO job_skills
                (job_id, skill_id, requirement_level, minimum_proficiency, minimum_years, weight, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
        )
        SELECT i.id, i.job_id, i.skill_id, s.name AS skill_name, i.requirement_level,
               i.minimum_proficiency, i.minimum_years, i.weight, i.notes,
               i.created_at, i.updated_at
        FROM inserted i
        JOIN skills s ON s.id = i.skill_id
        "#,
    )
    .bind(job_id)
    .bind(s.skill_id)
    .bind(s.requirement_level.as_str())
    .bind(s.minimum_proficiency.as_str())
    .bind(s.minimum_years)
    .bind(s.weight)
    .bind(&s.notes)
    .fetch_one(pool)
    .await?)
}

pub async fn list_requirements(
    pool: &PgPool,
    job_id: Uuid,
    requirement_type: Option<RequirementType>,
) -> Result<Vec<JobRequirementRow>, AppError> {
    Ok(sqlx::query_as::<_, JobRequirementRow>(
        r#"
        SELECT * FROM job_requirements
        WHERE job_id = $1 AND ($2::text IS NULL OR requirement_type = $2)
        ORDER BY priority DESC, created_at
        "#,
    )
    .bind(job_id)
    .bind(requirement_type.map(|r| r.as_str()))
    .fetch_all(pool)
    .await?)
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewRequirement {
    pub requirement_type: RequirementType,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub category: String,
    #[validate(length(min = 1, message = "description cannot be empty"))]
    pub description: String,
    #[validate(range(min = 0, max = 10, message = "priority must be between 0 and 10"))]
    #[serde(default)]
    pub priority: i32,
}

pub async fn add_requirement(
    pool: &PgPool,
    job_id: Uuid,
    r: &NewRequirement,
) -> Result<JobRequirementRow, AppError> {
    Ok(sqlx::query_as::<_, JobRequirementRow>(
        r#"
        INSERT INTO job_requirements (job_id, requirement_type, category, description, priority)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(job_id)
    .bind(r.requirement_type.as_str())
    .bind(&r.category)
    .bind(&r.description)
    .bind(r.priority)
    .fetch_one(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_salary_range() {
        assert!(check_salary_range(4_000_000, 6_000_000).is_ok());
        assert!(check_salary_range(4_000_000, 0).is_ok());
        assert!(matches!(
            check_salary_range(7_000_000, 6_000_000),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_new_job_defaults() {
        let job: NewJob = serde_json::from_value(json!({
            "job_code": "ENG-042",
            "title": "Platform Engineer",
            "employment_type": "full_time",
            "experience_level": "senior"
        }))
        .unwrap();
        assert_eq!(job.salary_currency, "JPY");
        assert_eq!(job.number_of_positions, 1);
        assert!(job.minimum_degree.is_none());
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_job_skill_defaults_and_weight_bounds() {
        let skill: NewJobSkill =
            serde_json::from_value(json!({ "skill_id": Uuid::nil() })).unwrap();
        assert_eq!(skill.requirement_level, SkillRequirementLevel::Required);
        assert_eq!(skill.minimum_proficiency, Proficiency::Intermediate);
        assert_eq!(skill.weight, 1);

        let heavy: NewJobSkill =
            serde_json::from_value(json!({ "skill_id": Uuid::nil(), "weight": 11 })).unwrap();
        assert!(heavy.validate().is_err());
    }

    #[test]
    fn test_unknown_employment_type_is_rejected() {
        let result = serde_json::from_value::<NewJob>(json!({
            "job_code": "X",
            "title": "Y",
            "employment_type": "gig",
            "experience_level": "mid"
        }));
        assert!(result.is_err());
    }
}

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::auth::permissions::ApplicationAccess;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::application::{
    ApplicationRow, ApplicationStatus, ApplicationSummaryRow, InterviewResult, InterviewRow,
    InterviewType,
};
use crate::models::user::Role;

/// Which rows a caller may list. Each set field narrows the result.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RowScope {
    pub candidate_user_id: Option<Uuid>,
    pub recruiter_id: Option<Uuid>,
    pub interviewer_id: Option<Uuid>,
}

impl RowScope {
    pub fn for_user(user: &AuthUser) -> Self {
        let me = Some(user.id());
        match user.role {
            Role::Admin => Self::default(),
            Role::Candidate => Self {
                candidate_user_id: me,
                ..Default::default()
            },
            Role::Recruiter => Self {
                recruiter_id: me,
                ..Default::default()
            },
            Role::Interviewer => Self {
                interviewer_id: me,
                ..Default::default()
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Applications
// ────────────────────────────────────────────────────────────────────────────

pub struct NewApplication<'a> {
    pub candidate_id: Uuid,
    pub job_id: Uuid,
    pub status: ApplicationStatus,
    pub cover_letter: &'a str,
    pub matching_score: Option<f64>,
    pub assigned_recruiter_id: Option<Uuid>,
}

pub async fn exists(pool: &PgPool, candidate_id: Uuid, job_id: Uuid) -> Result<bool, AppError> {
    Ok(sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM applications WHERE candidate_id = $1 AND job_id = $2)",
    )
    .bind(candidate_id)
    .bind(job_id)
    .fetch_one(pool)
    .await?)
}

pub async fn insert_application(
    pool: &PgPool,
    a: &NewApplication<'_>,
) -> Result<ApplicationRow, AppError> {
    Ok(sqlx::query_as::<_, ApplicationRow>(
        r#"
        INSERT INTO applications
            (candidate_id, job_id, status, cover_letter, matching_score, assigned_recruiter_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(a.candidate_id)
    .bind(a.job_id)
    .bind(a.status.as_str())
    .bind(a.cover_letter)
    .bind(a.matching_score)
    .bind(a.assigned_recruiter_id)
    .fetch_one(pool)
    .await?)
}

#[derive(Debug, Default)]
pub struct ApplicationFilter {
    pub scope: RowScope,
    pub candidate_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub status: Option<ApplicationStatus>,
    pub search: Option<String>,
}

pub async fn list_applications(
    pool: &PgPool,
    f: &ApplicationFilter,
) -> Result<Vec<ApplicationSummaryRow>, AppError> {
    Ok(sqlx::query_as::<_, ApplicationSummaryRow>(
        r#"
        SELECT a.id, a.candidate_id,
               TRIM(u.first_name || ' ' || u.last_name) AS candidate_name,
               u.email AS candidate_email,
               a.job_id, j.title AS job_title, j.job_code,
               a.status, a.matching_score, a.applied_at, LEFT(a.cover_letter, 200) AS cover_letter
        FROM applications a
        JOIN candidates c ON c.id = a.candidate_id
        JOIN users u ON u.id = c.user_id
        JOIN jobs j ON j.id = a.job_id
        WHERE ($1::uuid IS NULL OR c.user_id = $1)
          AND ($2::uuid IS NULL OR a.assigned_recruiter_id = $2 OR j.hiring_manager_id = $2)
          AND ($3::uuid IS NULL OR EXISTS (
               SELECT 1 FROM interviews i WHERE i.application_id = a.id AND $3 = ANY(i.interviewer_ids)))
          AND ($4::uuid IS NULL OR a.candidate_id = $4)
          AND ($5::uuid IS NULL OR a.job_id = $5)
          AND ($6::text IS NULL OR a.status = $6)
          AND ($7::text IS NULL
               OR u.email ILIKE '%' || $7 || '%'
               OR j.title ILIKE '%' || $7 || '%'
               OR j.job_code ILIKE '%' || $7 || '%')
        ORDER BY a.matching_score DESC NULLS LAST, a.applied_at DESC
        "#,
    )
    .bind(f.scope.candidate_user_id)
    .bind(f.scope.recruiter_id)
    .bind(f.scope.interviewer_id)
    .bind(f.candidate_id)
    .bind(f.job_id)
    .bind(f.status.map(|s| s.as_str()))
    .bind(f.search.as_deref())
    .fetch_all(pool)
    .await?)
}

pub async fn get_application(pool: &PgPool, id: Uuid) -> Result<ApplicationRow, AppError> {
    sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Application {id}")))
}

#[derive(FromRow)]
struct AccessRow {
    candidate_user_id: Uuid,
    hiring_manager_id: Option<Uuid>,
    interviewer_ids: Vec<Uuid>,
}

/// Loads the people attached to an application for permission checks.
pub async fn access_for(pool: &PgPool, app: &ApplicationRow) -> Result<ApplicationAccess, AppError> {
    let row = sqlx::query_as::<_, AccessRow>(
        r#"
        SELECT c.user_id AS candidate_user_id, j.hiring_manager_id,
               COALESCE((SELECT array_agg(DISTINCT x)
                         FROM interviews i, unnest(i.interviewer_ids) AS x
                         WHERE i.application_id = $1), '{}') AS interviewer_ids
        FROM candidates c, jobs j
        WHERE c.id = $2 AND j.id = $3
        "#,
    )
    .bind(app.id)
    .bind(app.candidate_id)
    .bind(app.job_id)
    .fetch_one(pool)
    .await?;

    Ok(ApplicationAccess {
        candidate_user_id: row.candidate_user_id,
        assigned_recruiter_id: app.assigned_recruiter_id,
        hiring_manager_id: row.hiring_manager_id,
        interviewer_ids: row.interviewer_ids,
    })
}

/// Entering `offer` stamps `offer_at`; notes are appended to screening notes.
pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: ApplicationStatus,
    notes: Option<&str>,
) -> Result<ApplicationRow, AppError> {
    Ok(sqlx::query_as::<_, ApplicationRow>(
        r#"
        UPDATE applications SET
            status          = $2,
            offer_at        = CASE WHEN $2 = 'offer' THEN now() ELSE offer_at END,
            screening_notes = CASE WHEN $3::text IS NULL OR $3 = '' THEN screening_notes
                                   WHEN screening_notes = '' THEN $3
                                   ELSE screening_notes || E'\n' || $3 END,
            updated_at      = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(notes)
    .fetch_one(pool)
    .await?)
}

pub async fn delete_application(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM applications WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Interviews
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InterviewFilter {
    pub scope: RowScope,
    pub application_id: Option<Uuid>,
    pub interview_type: Option<InterviewType>,
    pub result: Option<InterviewResult>,
    /// Only pending interviews scheduled from now on, soonest first.
    pub upcoming: bool,
}

pub async fn list_interviews(
    pool: &PgPool,
    f: &InterviewFilter,
) -> Result<Vec<InterviewRow>, AppError> {
    Ok(sqlx::query_as::<_, InterviewRow>(
        r#"
        SELECT i.* FROM interviews i
        JOIN applications a ON a.id = i.application_id
        JOIN candidates c ON c.id = a.candidate_id
        JOIN jobs j ON j.id = a.job_id
        WHERE ($1::uuid IS NULL OR c.user_id = $1)
          AND ($2::uuid IS NULL OR a.assigned_recruiter_id = $2 OR j.hiring_manager_id = $2)
          AND ($3::uuid IS NULL OR $3 = ANY(i.interviewer_ids))
          AND ($4::uuid IS NULL OR i.application_id = $4)
          AND ($5::text IS NULL OR i.interview_type = $5)
          AND ($6::text IS NULL OR i.result = $6)
          AND (NOT $7 OR (i.scheduled_at >= now() AND i.result = 'pending'))
        ORDER BY CASE WHEN $7 THEN i.scheduled_at END ASC,
                 i.scheduled_at DESC
        "#,
    )
    .bind(f.scope.candidate_user_id)
    .bind(f.scope.recruiter_id)
    .bind(f.scope.interviewer_id)
    .bind(f.application_id)
    .bind(f.interview_type.map(|t| t.as_str()))
    .bind(f.result.map(|r| r.as_str()))
    .bind(f.upcoming)
    .fetch_all(pool)
    .await?)
}

pub async fn get_interview(pool: &PgPool, id: Uuid) -> Result<InterviewRow, AppError> {
    sqlx::query_as::<_, InterviewRow>("SELECT * FROM interviews WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Interview {id}")))
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewInterview {
    pub application_id: Uuid,
    pub interview_type: InterviewType,
    #[validate(range(min = 1, message = "round_number must be at least 1"))]
    #[serde(default = "default_round")]
    pub round_number: i32,
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 1, max = 480))]
    #[serde(default = "default_duration")]
    pub duration_minutes: i32,
    #[serde(default)]
    pub interviewer_ids: Vec<Uuid>,
    #[serde(default)]
    pub notes: String,
}

fn default_round() -> i32 {
    1
}

fn default_duration() -> i32 {
    60
}

/// Inserts the interview and bumps the application's interview counters.
pub async fn insert_interview(pool: &PgPool, n: &NewInterview) -> Result<InterviewRow, AppError> {
    let mut tx = pool.begin().await?;

    let interview = sqlx::query_as::<_, InterviewRow>(
        r#"
        INSERT INTO interviews
            (application_id, interview_type, round_number, scheduled_at, duration_minutes,
             interviewer_ids, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(n.application_id)
    .bind(n.interview_type.as_str())
    .bind(n.round_number)
    .bind(n.scheduled_at)
    .bind(n.duration_minutes)
    .bind(&n.interviewer_ids)
    .bind(&n.notes)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE applications SET
            interview_count   = interview_count + 1,
            last_interview_at = GREATEST(COALESCE(last_interview_at, $2), $2),
            updated_at        = now()
        WHERE id = $1
        "#,
    )
    .bind(n.application_id)
    .bind(n.scheduled_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(interview)
}

/// Scheduling edits and feedback share one partial-update payload.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct InterviewUpdate {
    pub interview_type: Option<InterviewType>,
    #[validate(range(min = 1))]
    pub round_number: Option<i32>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 480))]
    pub duration_minutes: Option<i32>,
    pub interviewer_ids: Option<Vec<Uuid>>,
    pub result: Option<InterviewResult>,
    #[validate(range(min = 1, max = 5, message = "scores range from 1 to 5"))]
    pub technical_score: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "scores range from 1 to 5"))]
    pub communication_score: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "scores range from 1 to 5"))]
    pub cultural_fit_score: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "scores range from 1 to 5"))]
    pub overall_score: Option<i32>,
    pub feedback: Option<String>,
    pub strengths: Option<String>,
    pub weaknesses: Option<String>,
    pub notes: Option<String>,
}

impl InterviewUpdate {
    /// True when only evaluation fields are set.
    pub fn is_feedback_only(&self) -> bool {
        self.interview_type.is_none()
            && self.round_number.is_none()
            && self.scheduled_at.is_none()
            && self.duration_minutes.is_none()
            && self.interviewer_ids.is_none()
    }
}

pub async fn update_interview(
    pool: &PgPool,
    id: Uuid,
    u: &InterviewUpdate,
) -> Result<InterviewRow, AppError> {
    Ok(sqlx::query_as::<_, InterviewRow>(
        r#"
        UPDATE interviews SET
            interview_type      = COALESCE($2, interview_type),
            round_number        = COALESCE($3, round_number),
            scheduled_at        = COALESCE($4, scheduled_at),
            duration_minutes    = COALESCE($5, duration_minutes),
            interviewer_ids     = COALESCE($6, interviewer_ids),
            result              = COALESCE($7, result),
            technical_score     = COALESCE($8, technical_score),
            communication_score = COALESCE($9, communication_score),
            cultural_fit_score  = COALESCE($10, cultural_fit_score),
            overall_score       = COALESCE($11, overall_score),
            feedback            = COALESCE($12, feedback),
            strengths           = COALESCE($13, strengths),
            weaknesses          = COALESCE($14, weaknesses),
            notes               = COALESCE($15, notes),
            updated_at          = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(u.interview_type.map(|t| t.as_str()))
    .bind(u.round_number)
    .bind(u.scheduled_at)
    .bind(u.duration_minutes)
    .bind(u.interviewer_ids.as_deref())
    .bind(u.result.map(|r| r.as_str()))
    .bind(u.technical_score)
    .bind(u.communication_score)
    .bind(u.cultural_fit_score)
    .bind(u.overall_score)
    .bind(u.feedback.as_deref())
    .bind(u.strengths.as_deref())
    .bind(u.weaknesses.as_deref())
    .bind(u.notes.as_deref())
    .fetch_one(pool)
    .await?)
}

pub async fn delete_interview(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM interviews WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Stores submitted answers as JSON notes and marks the interview completed.
pub async fn record_answers(
    pool: &PgPool,
    id: Uuid,
    answers: &Value,
    feedback: Option<&str>,
) -> Result<InterviewRow, AppError> {
    Ok(sqlx::query_as::<_, InterviewRow>(
        r#"
        UPDATE interviews SET
            notes      = $2,
            feedback   = COALESCE($3, feedback),
            result     = 'completed',
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(answers.to_string())
    .bind(feedback)
    .fetch_one(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::auth_user;

    #[test]
    fn test_scope_per_role() {
        assert_eq!(RowScope::for_user(&auth_user(Role::Admin)), RowScope::default());

        let candidate = auth_user(Role::Candidate);
        let scope = RowScope::for_user(&candidate);
        assert_eq!(scope.candidate_user_id, Some(candidate.id()));
        assert!(scope.recruiter_id.is_none() && scope.interviewer_id.is_none());

        let recruiter = auth_user(Role::Recruiter);
        assert_eq!(RowScope::for_user(&recruiter).recruiter_id, Some(recruiter.id()));

        let interviewer = auth_user(Role::Interviewer);
        assert_eq!(
            RowScope::for_user(&interviewer).interviewer_id,
            Some(interviewer.id())
        );
    }

    #[test]
    fn test_feedback_only_update() {
        let feedback: InterviewUpdate = serde_json::from_value(serde_json::json!({
            "result": "passed",
            "technical_score": 4,
            "feedback": "Solid system design answers"
        }))
        .unwrap();
        assert!(feedback.is_feedback_only());
        assert!(feedback.validate().is_ok());

        let reschedule = InterviewUpdate {
            scheduled_at: Some(Utc::now()),
            ..Default::default()
        };
        assert!(!reschedule.is_feedback_only());
    }

    #[test]
    fn test_scores_are_bounded() {
        let update = InterviewUpdate {
            overall_score: Some(6),
            ..Default::default()
        };
        let errors = update.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("overall_score"));
    }

    #[test]
    fn test_new_interview_defaults() {
        let interview: NewInterview = serde_json::from_value(serde_json::json!({
            "application_id": Uuid::nil(),
            "interview_type": "technical",
            "scheduled_at": "2026-11-02T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(interview.round_number, 1);
        assert_eq!(interview.duration_minutes, 60);
        assert!(interview.interviewer_ids.is_empty());
    }
}

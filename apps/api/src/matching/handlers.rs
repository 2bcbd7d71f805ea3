use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::applications::store::{self as applications, NewApplication};
use crate::audit::AuditChange;
use crate::auth::permissions::{can_manage_jobs, ensure, require_roles};
use crate::auth::AuthUser;
use crate::candidates::store as candidates;
use crate::db::is_unique_violation;
use crate::errors::AppError;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::jobs::store as jobs;
use crate::matching::service::{self, CandidateMatch, ResultScope};
use crate::models::application::{ApplicationRow, ApplicationStatus};
use crate::models::job::MatchingResultRow;
use crate::models::user::Role;
use crate::state::AppState;

const ALREADY_APPLIED: &str = "You have already applied to this job";

/// A concurrent duplicate that slipped past the existence check hits the
/// unique index; it is reported the same way as the checked case.
fn duplicate_as_validation(err: AppError) -> AppError {
    match err {
        AppError::Database(e) if is_unique_violation(&e) => {
            AppError::Validation(ALREADY_APPLIED.to_string())
        }
        other => other,
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub cover_letter: String,
}

/// POST /api/jobs/:id/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(job_id): AppPath<Uuid>,
    body: Option<AppJson<ApplyRequest>>,
) -> Result<(StatusCode, AuditChange, Json<ApplicationRow>), AppError> {
    require_roles(&user, &[Role::Candidate])?;
    let req = body.map(|AppJson(b)| b).unwrap_or_default();

    let candidate = candidates::candidate_for_user(&state.db, user.id())
        .await?
        .ok_or_else(|| {
            AppError::Validation("Create your candidate profile before applying".to_string())
        })?;
    let job = jobs::get_job(&state.db, job_id).await?;
    if !job.is_open_on(Utc::now().date_naive()) {
        return Err(AppError::Validation(
            "This job is not accepting applications".to_string(),
        ));
    }
    if applications::exists(&state.db, candidate.id, job.id).await? {
        return Err(AppError::Validation(ALREADY_APPLIED.to_string()));
    }

    let breakdown =
        service::score_candidate(&state.db, candidate.id, candidate.years_of_experience, &job)
            .await?;

    let application = applications::insert_application(
        &state.db,
        &NewApplication {
            candidate_id: candidate.id,
            job_id: job.id,
            status: ApplicationStatus::Submitted,
            cover_letter: &req.cover_letter,
            matching_score: Some(breakdown.overall),
            assigned_recruiter_id: job.hiring_manager_id,
        },
    )
    .await
    .map_err(duplicate_as_validation)?;
    info!(
        "Candidate {} applied to job {} (match {:.2})",
        candidate.id, job.id, breakdown.overall
    );

    Ok((
        StatusCode::CREATED,
        AuditChange::created("applications", application.id, &application),
        Json(application),
    ))
}

/// GET /api/jobs/:id/matching_candidates
pub async fn handle_matching_candidates(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(job_id): AppPath<Uuid>,
) -> Result<Json<Vec<CandidateMatch>>, AppError> {
    ensure(can_manage_jobs(&user), "Only recruiters and administrators can search candidates")?;
    let job = jobs::get_job(&state.db, job_id).await?;
    Ok(Json(service::matching_candidates(&state.db, &job).await?))
}

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    pub candidate_id: Uuid,
}

/// POST /api/jobs/:id/calculate_matching
pub async fn handle_calculate_matching(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(job_id): AppPath<Uuid>,
    AppJson(req): AppJson<CalculateRequest>,
) -> Result<(AuditChange, Json<MatchingResultRow>), AppError> {
    ensure(can_manage_jobs(&user), "Only recruiters and administrators can calculate matches")?;
    let job = jobs::get_job(&state.db, job_id).await?;
    let candidate = candidates::get_candidate(&state.db, req.candidate_id).await?;

    let breakdown =
        service::score_candidate(&state.db, candidate.id, candidate.years_of_experience, &job)
            .await?;
    let result =
        service::upsert_matching_result(&state.db, job.id, candidate.id, &breakdown, user.id())
            .await?;

    Ok((
        AuditChange::created("matching_results", result.id, &result),
        Json(result),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub min_score: Option<f64>,
}

/// GET /api/jobs/matching-results
pub async fn handle_list_matching_results(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(q): AppQuery<ResultsQuery>,
) -> Result<Json<Vec<MatchingResultRow>>, AppError> {
    let mut scope = ResultScope {
        min_score: q.min_score,
        ..Default::default()
    };
    match user.role {
        Role::Admin => {}
        Role::Recruiter => scope.hiring_manager_id = Some(user.id()),
        Role::Candidate => {
            match candidates::candidate_for_user(&state.db, user.id()).await? {
                Some(candidate) => scope.candidate_id = Some(candidate.id),
                None => return Ok(Json(Vec::new())),
            }
        }
        Role::Interviewer => {
            return Err(AppError::forbidden("Interviewers cannot read matching results"))
        }
    }
    Ok(Json(service::list_matching_results(&state.db, &scope).await?))
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;
    use crate::db::test_support::sql_error;

    #[test]
    fn test_racing_duplicate_apply_is_a_validation_error() {
        let err = duplicate_as_validation(AppError::Database(sql_error("23505")));
        assert!(matches!(&err, AppError::Validation(msg) if msg == ALREADY_APPLIED));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_other_failures_pass_through() {
        let err = duplicate_as_validation(AppError::Database(sql_error("23503")));
        assert!(matches!(err, AppError::Database(_)));
        let err = duplicate_as_validation(AppError::not_found("Job"));
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::prompts::QuestionSpec;
use crate::agent::services::{self, AgentTaskResponse};
use crate::applications::store::{
    self, ApplicationFilter, InterviewFilter, InterviewUpdate, NewApplication, NewInterview,
    RowScope,
};
use crate::audit::{self, AuditChange, Deleted};
use crate::auth::permissions::{
    can_evaluate_interviews, can_schedule_interviews, can_set_application_status,
    can_view_application, ensure, is_staff, require_roles, ApplicationAccess,
};
use crate::auth::AuthUser;
use crate::candidates::store as candidates;
use crate::errors::{validate_body, AppError};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::jobs::store as jobs;
use crate::matching::service;
use crate::models::application::{
    ApplicationRow, ApplicationStatus, ApplicationSummaryRow, InterviewResult, InterviewRow,
    InterviewType,
};
use crate::models::job::JobRow;
use crate::models::user::Role;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Applications
// ────────────────────────────────────────────────────────────────────────────

/// Loads an application with its access record. Rows outside the caller's
/// scope read as missing.
async fn visible_application(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> Result<(ApplicationRow, ApplicationAccess), AppError> {
    let application = store::get_application(&state.db, id).await?;
    let access = store::access_for(&state.db, &application).await?;
    if can_view_application(user, &access) {
        Ok((application, access))
    } else {
        Err(AppError::not_found(format!("Application {id}")))
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplicationQuery {
    pub status: Option<ApplicationStatus>,
    pub job_id: Option<Uuid>,
    pub candidate_id: Option<Uuid>,
    pub search: Option<String>,
}

/// GET /api/candidates/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(q): AppQuery<ApplicationQuery>,
) -> Result<Json<Vec<ApplicationSummaryRow>>, AppError> {
    let filter = ApplicationFilter {
        scope: RowScope::for_user(&user),
        candidate_id: q.candidate_id,
        job_id: q.job_id,
        status: q.status,
        search: q.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    };
    Ok(Json(store::list_applications(&state.db, &filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    /// Staff pick the candidate; candidates always apply as themselves.
    pub candidate_id: Option<Uuid>,
    pub job_id: Uuid,
    #[serde(default)]
    pub cover_letter: String,
    pub status: Option<ApplicationStatus>,
}

/// Only drafts and fresh submissions may be created directly.
fn initial_status(requested: Option<ApplicationStatus>) -> Result<ApplicationStatus, AppError> {
    match requested.unwrap_or(ApplicationStatus::Submitted) {
        status @ (ApplicationStatus::Draft | ApplicationStatus::Submitted) => Ok(status),
        other => Err(AppError::Validation(format!(
            "New applications cannot start as {other}"
        ))),
    }
}

/// POST /api/candidates/applications
pub async fn handle_create_application(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<CreateApplicationRequest>,
) -> Result<(StatusCode, AuditChange, Json<ApplicationRow>), AppError> {
    require_roles(&user, &[Role::Candidate, Role::Recruiter, Role::Admin])?;
    let status = initial_status(req.status)?;

    let candidate = if user.role == Role::Candidate {
        candidates::candidate_for_user(&state.db, user.id())
            .await?
            .ok_or_else(|| {
                AppError::Validation("Create your candidate profile before applying".to_string())
            })?
    } else {
        let id = req
            .candidate_id
            .ok_or_else(|| AppError::Validation("candidate_id is required".to_string()))?;
        candidates::get_candidate(&state.db, id).await?
    };

    let job = jobs::get_job(&state.db, req.job_id).await?;
    if !job.is_open_on(Utc::now().date_naive()) {
        return Err(AppError::Validation(
            "This job is not accepting applications".to_string(),
        ));
    }
    if store::exists(&state.db, candidate.id, job.id).await? {
        return Err(AppError::Conflict(
            "An application for this candidate and job already exists".to_string(),
        ));
    }

    let breakdown =
        service::score_candidate(&state.db, candidate.id, candidate.years_of_experience, &job)
            .await?;
    let recruiter = match user.role {
        Role::Recruiter => Some(user.id()),
        _ => job.hiring_manager_id,
    };
    let application = store::insert_application(
        &state.db,
        &NewApplication {
            candidate_id: candidate.id,
            job_id: job.id,
            status,
            cover_letter: &req.cover_letter,
            matching_score: Some(breakdown.overall),
            assigned_recruiter_id: recruiter,
        },
    )
    .await?;
    info!(
        "Application {} created for candidate {} on job {}",
        application.id, candidate.id, job.id
    );

    Ok((
        StatusCode::CREATED,
        AuditChange::created("applications", application.id, &application),
        Json(application),
    ))
}

/// GET /api/candidates/applications/my_applications
pub async fn handle_my_applications(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ApplicationSummaryRow>>, AppError> {
    let candidate = candidates::candidate_for_user(&state.db, user.id())
        .await?
        .ok_or_else(|| AppError::not_found("Candidate profile"))?;
    let filter = ApplicationFilter {
        candidate_id: Some(candidate.id),
        ..Default::default()
    };
    Ok(Json(store::list_applications(&state.db, &filter).await?))
}

/// GET /api/candidates/applications/:id
pub async fn handle_get_application(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<ApplicationRow>, AppError> {
    let (application, _) = visible_application(&state, &user, id).await?;
    Ok(Json(application))
}

/// DELETE /api/candidates/applications/:id
pub async fn handle_delete_application(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Deleted, AppError> {
    let (application, _) = visible_application(&state, &user, id).await?;
    ensure(is_staff(&user), "Only recruiters and administrators can delete applications")?;
    store::delete_application(&state.db, id).await?;
    Ok(audit::deleted("applications", id, &application))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ApplicationStatus,
    pub notes: Option<String>,
}

/// POST /api/candidates/applications/:id/update_status
pub async fn handle_update_status(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateStatusRequest>,
) -> Result<(AuditChange, Json<ApplicationRow>), AppError> {
    let (before, access) = visible_application(&state, &user, id).await?;
    ensure(
        can_set_application_status(&user, &access, req.status),
        "You cannot set this application status",
    )?;
    let current: ApplicationStatus = before
        .status
        .parse()
        .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))?;
    if !current.can_transition_to(req.status) {
        return Err(AppError::Validation(format!(
            "Cannot move an application from {current} to {}",
            req.status
        )));
    }

    let after = store::update_status(&state.db, id, req.status, req.notes.as_deref()).await?;
    info!("Application {id} moved {current} -> {}", req.status);
    Ok((
        AuditChange::updated("applications", id, &before, &after),
        Json(after),
    ))
}

/// GET /api/candidates/applications/:id/interviews
pub async fn handle_application_interviews(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Vec<InterviewRow>>, AppError> {
    let (application, _) = visible_application(&state, &user, id).await?;
    let filter = InterviewFilter {
        scope: RowScope::for_user(&user),
        application_id: Some(application.id),
        ..Default::default()
    };
    Ok(Json(store::list_interviews(&state.db, &filter).await?))
}

// ────────────────────────────────────────────────────────────────────────────
// Interviews
// ────────────────────────────────────────────────────────────────────────────

struct InterviewContext {
    interview: InterviewRow,
    application: ApplicationRow,
    access: ApplicationAccess,
}

async fn visible_interview(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> Result<InterviewContext, AppError> {
    let interview = store::get_interview(&state.db, id).await?;
    let application = store::get_application(&state.db, interview.application_id).await?;
    let access = store::access_for(&state.db, &application).await?;
    if can_view_application(user, &access) {
        Ok(InterviewContext {
            interview,
            application,
            access,
        })
    } else {
        Err(AppError::not_found(format!("Interview {id}")))
    }
}

#[derive(Debug, Deserialize)]
pub struct InterviewQuery {
    pub application_id: Option<Uuid>,
    pub interview_type: Option<InterviewType>,
    pub result: Option<InterviewResult>,
}

/// GET /api/candidates/interviews
pub async fn handle_list_interviews(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(q): AppQuery<InterviewQuery>,
) -> Result<Json<Vec<InterviewRow>>, AppError> {
    let filter = InterviewFilter {
        scope: RowScope::for_user(&user),
        application_id: q.application_id,
        interview_type: q.interview_type,
        result: q.result,
        upcoming: false,
    };
    Ok(Json(store::list_interviews(&state.db, &filter).await?))
}

/// GET /api/candidates/interviews/upcoming
pub async fn handle_upcoming_interviews(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<InterviewRow>>, AppError> {
    let filter = InterviewFilter {
        scope: RowScope::for_user(&user),
        upcoming: true,
        ..Default::default()
    };
    Ok(Json(store::list_interviews(&state.db, &filter).await?))
}

/// POST /api/candidates/interviews
pub async fn handle_create_interview(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<NewInterview>,
) -> Result<(StatusCode, AuditChange, Json<InterviewRow>), AppError> {
    validate_body(&req)?;
    let application = store::get_application(&state.db, req.application_id).await?;
    let access = store::access_for(&state.db, &application).await?;
    ensure(
        can_schedule_interviews(&user, &access),
        "Only the hiring team can schedule interviews for this application",
    )?;

    let interview = store::insert_interview(&state.db, &req).await?;
    info!(
        "Interview {} ({}) scheduled for application {}",
        interview.id, interview.interview_type, application.id
    );
    Ok((
        StatusCode::CREATED,
        AuditChange::created("interviews", interview.id, &interview),
        Json(interview),
    ))
}

/// GET /api/candidates/interviews/:id
pub async fn handle_get_interview(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<InterviewRow>, AppError> {
    Ok(Json(visible_interview(&state, &user, id).await?.interview))
}

/// Schedulers may change anything; assigned interviewers only the evaluation.
fn may_update_interview(user: &AuthUser, ctx: &InterviewContext, update: &InterviewUpdate) -> bool {
    if can_schedule_interviews(user, &ctx.access) {
        return true;
    }
    update.is_feedback_only()
        && user.role == Role::Interviewer
        && ctx.interview.interviewer_ids.contains(&user.id())
}

/// PUT /api/candidates/interviews/:id
pub async fn handle_update_interview(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<InterviewUpdate>,
) -> Result<(AuditChange, Json<InterviewRow>), AppError> {
    validate_body(&req)?;
    let ctx = visible_interview(&state, &user, id).await?;
    ensure(
        may_update_interview(&user, &ctx, &req),
        "You cannot change this interview",
    )?;
    let after = store::update_interview(&state.db, id, &req).await?;
    Ok((
        AuditChange::updated("interviews", id, &ctx.interview, &after),
        Json(after),
    ))
}

/// DELETE /api/candidates/interviews/:id
pub async fn handle_delete_interview(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Deleted, AppError> {
    let ctx = visible_interview(&state, &user, id).await?;
    ensure(
        can_schedule_interviews(&user, &ctx.access),
        "Only the hiring team can cancel interviews",
    )?;
    store::delete_interview(&state.db, id).await?;
    Ok(audit::deleted("interviews", id, &ctx.interview))
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub result: Option<InterviewResult>,
    pub technical_score: Option<i32>,
    pub communication_score: Option<i32>,
    pub cultural_fit_score: Option<i32>,
    pub overall_score: Option<i32>,
    pub feedback: Option<String>,
    pub strengths: Option<String>,
    pub weaknesses: Option<String>,
}

impl From<FeedbackRequest> for InterviewUpdate {
    fn from(f: FeedbackRequest) -> Self {
        InterviewUpdate {
            result: f.result,
            technical_score: f.technical_score,
            communication_score: f.communication_score,
            cultural_fit_score: f.cultural_fit_score,
            overall_score: f.overall_score,
            feedback: f.feedback,
            strengths: f.strengths,
            weaknesses: f.weaknesses,
            ..Default::default()
        }
    }
}

/// POST /api/candidates/interviews/:id/submit_feedback
pub async fn handle_submit_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<FeedbackRequest>,
) -> Result<(AuditChange, Json<InterviewRow>), AppError> {
    ensure(
        can_evaluate_interviews(&user),
        "Only interviewers, recruiters and administrators can submit feedback",
    )?;
    let update = InterviewUpdate::from(req);
    validate_body(&update)?;
    let ctx = visible_interview(&state, &user, id).await?;

    let after = store::update_interview(&state.db, id, &update).await?;
    info!("Feedback recorded for interview {id} by {}", user.user.email);
    Ok((
        AuditChange::updated("interviews", id, &ctx.interview, &after),
        Json(after),
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Interview practice with the agent
// ────────────────────────────────────────────────────────────────────────────

/// One question session per interview and user, so answers resume it.
fn question_session_id(interview_id: Uuid, user_id: Uuid) -> String {
    format!("interview-{interview_id}-{user_id}")
}

fn job_context(job: &JobRow, interview: &InterviewRow) -> Value {
    json!({
        "job_title": job.title,
        "description": job.description,
        "experience_level": job.experience_level,
        "interview_type": interview.interview_type,
        "round_number": interview.round_number,
    })
}

#[derive(Debug, Deserialize)]
pub struct GenerateQuestionsQuery {
    pub difficulty: Option<String>,
    pub count: Option<u32>,
}

/// GET /api/candidates/interviews/:id/generate_questions
pub async fn handle_generate_questions(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppQuery(q): AppQuery<GenerateQuestionsQuery>,
) -> Result<Json<AgentTaskResponse>, AppError> {
    let ctx = visible_interview(&state, &user, id).await?;
    let count = q.count.unwrap_or(5);
    if count == 0 || count > 20 {
        return Err(AppError::Validation("count must be between 1 and 20".to_string()));
    }
    let job = jobs::get_job(&state.db, ctx.application.job_id).await?;

    let difficulty = q.difficulty.unwrap_or_else(|| "medium".to_string());
    let spec = QuestionSpec {
        job_title: &job.title,
        interview_type: &ctx.interview.interview_type,
        difficulty: &difficulty,
        count,
    };
    let session_id = question_session_id(ctx.interview.id, user.id());
    Ok(Json(
        services::generate_questions(
            &state,
            user.id(),
            &spec,
            job_context(&job, &ctx.interview),
            Some(session_id),
        )
        .await,
    ))
}

#[derive(Debug, Deserialize)]
pub struct EvaluateAnswerRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

/// POST /api/candidates/interviews/:id/evaluate_answer
pub async fn handle_evaluate_answer(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<EvaluateAnswerRequest>,
) -> Result<Json<AgentTaskResponse>, AppError> {
    ensure(
        can_evaluate_interviews(&user),
        "Only interviewers, recruiters and administrators can evaluate answers",
    )?;
    let (question, answer) = (req.question.trim(), req.answer.trim());
    if question.is_empty() || answer.is_empty() {
        return Err(AppError::Validation(
            "question and answer are both required".to_string(),
        ));
    }
    let ctx = visible_interview(&state, &user, id).await?;
    let job = jobs::get_job(&state.db, ctx.application.job_id).await?;

    Ok(Json(
        services::evaluate_answer(
            &state,
            user.id(),
            question,
            answer,
            job_context(&job, &ctx.interview),
        )
        .await,
    ))
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    #[serde(default)]
    pub answers: Map<String, Value>,
    #[serde(default)]
    pub questions: Vec<Value>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitAnswersResponse {
    pub message: String,
    pub interview_id: Uuid,
    pub session_id: Option<String>,
    pub result: String,
    pub has_feedback: bool,
}

/// POST /api/candidates/interviews/:id/submit_answers
/// Evaluation is best effort: answers are stored even when the agent fails.
pub async fn handle_submit_answers(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<SubmitAnswersRequest>,
) -> Result<(AuditChange, Json<SubmitAnswersResponse>), AppError> {
    if req.answers.is_empty() {
        return Err(AppError::Validation("answers cannot be empty".to_string()));
    }
    let ctx = visible_interview(&state, &user, id).await?;
    let session_id = req.session_id.filter(|s| !s.trim().is_empty());

    let feedback = match &session_id {
        Some(sid) => {
            let job = jobs::get_job(&state.db, ctx.application.job_id).await?;
            let qa_text = services::format_qa(&req.questions, &req.answers);
            let reply =
                services::evaluate_session(&state, user.id(), sid.clone(), &qa_text, &job.title)
                    .await;
            if let Some(reason) = &reply.fallback_reason {
                warn!("Interview {id} evaluated without the agent: {reason}");
            }
            Some(reply.completion)
        }
        None => None,
    };

    let stored = json!({
        "questions": req.questions,
        "answers": req.answers,
        "submitted_at": Utc::now(),
    });
    let after = store::record_answers(&state.db, id, &stored, feedback.as_deref()).await?;
    info!("Answers submitted for interview {id}");

    Ok((
        AuditChange::updated("interviews", id, &ctx.interview, &after),
        Json(SubmitAnswersResponse {
            message: "Answers submitted".to_string(),
            interview_id: id,
            session_id,
            result: after.result,
            has_feedback: feedback.is_some(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::auth_user;

    fn interview_with(interviewers: Vec<Uuid>) -> InterviewRow {
        InterviewRow {
            id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
            interview_type: "technical".to_string(),
            round_number: 1,
            scheduled_at: Utc::now(),
            duration_minutes: 60,
            interviewer_ids: interviewers,
            result: "pending".to_string(),
            technical_score: None,
            communication_score: None,
            cultural_fit_score: None,
            overall_score: None,
            feedback: String::new(),
            strengths: String::new(),
            weaknesses: String::new(),
            notes: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn application_for(candidate: Uuid) -> ApplicationRow {
        ApplicationRow {
            id: Uuid::new_v4(),
            candidate_id: candidate,
            job_id: Uuid::new_v4(),
            status: "interview".to_string(),
            applied_at: Utc::now(),
            cover_letter: String::new(),
            matching_score: None,
            ai_recommendation: String::new(),
            screening_notes: String::new(),
            interview_count: 1,
            last_interview_at: None,
            offer_at: None,
            offer_salary: None,
            offer_notes: String::new(),
            assigned_recruiter_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(initial_status(None).unwrap(), ApplicationStatus::Submitted);
        assert_eq!(
            initial_status(Some(ApplicationStatus::Draft)).unwrap(),
            ApplicationStatus::Draft
        );
        assert!(matches!(
            initial_status(Some(ApplicationStatus::Offer)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_assigned_interviewer_may_only_record_feedback() {
        let interviewer = auth_user(Role::Interviewer);
        let ctx = InterviewContext {
            interview: interview_with(vec![interviewer.id()]),
            application: application_for(Uuid::new_v4()),
            access: ApplicationAccess {
                interviewer_ids: vec![interviewer.id()],
                ..Default::default()
            },
        };

        let feedback = InterviewUpdate {
            overall_score: Some(4),
            ..Default::default()
        };
        assert!(may_update_interview(&interviewer, &ctx, &feedback));

        let reschedule = InterviewUpdate {
            scheduled_at: Some(Utc::now()),
            ..Default::default()
        };
        assert!(!may_update_interview(&interviewer, &ctx, &reschedule));

        let stranger = auth_user(Role::Interviewer);
        assert!(!may_update_interview(&stranger, &ctx, &feedback));
    }

    #[test]
    fn test_admin_may_reschedule() {
        let admin = auth_user(Role::Admin);
        let ctx = InterviewContext {
            interview: interview_with(Vec::new()),
            application: application_for(Uuid::new_v4()),
            access: ApplicationAccess::default(),
        };
        let reschedule = InterviewUpdate {
            duration_minutes: Some(90),
            ..Default::default()
        };
        assert!(may_update_interview(&admin, &ctx, &reschedule));
    }

    #[test]
    fn test_feedback_request_maps_to_evaluation_fields() {
        let req: FeedbackRequest = serde_json::from_value(json!({
            "result": "passed",
            "overall_score": 5,
            "strengths": "Clear communicator"
        }))
        .unwrap();
        let update = InterviewUpdate::from(req);
        assert!(update.is_feedback_only());
        assert_eq!(update.result, Some(InterviewResult::Passed));
        assert_eq!(update.overall_score, Some(5));
    }

    #[test]
    fn test_question_session_is_stable_per_user() {
        let interview = Uuid::new_v4();
        let user = Uuid::new_v4();
        assert_eq!(
            question_session_id(interview, user),
            question_session_id(interview, user)
        );
        assert_ne!(
            question_session_id(interview, user),
            question_session_id(interview, Uuid::new_v4())
        );
    }
}

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::agent::prompts::QuestionSpec;
use crate::agent::services::{self, AgentTaskResponse};
use crate::applications::store::{self as applications, ApplicationFilter};
use crate::audit::{self, AuditChange, Deleted};
use crate::auth::permissions::{can_edit_job, can_manage_jobs, ensure, is_staff, require_roles};
use crate::auth::AuthUser;
use crate::errors::{validate_body, AppError};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::jobs::store::{
    self, check_salary_range, JobFilter, JobUpdate, NewJob, NewJobSkill, NewRequirement,
};
use crate::matching::service::job_skills;
use crate::models::application::{ApplicationStatus, ApplicationSummaryRow};
use crate::models::job::{
    EmploymentType, ExperienceLevel, JobRequirementRow, JobRow, JobSkillRow, JobStatus,
    RequirementType,
};
use crate::models::user::Role;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JobQuery {
    pub status: Option<JobStatus>,
    pub location: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub experience_level: Option<ExperienceLevel>,
    pub min_salary: Option<i32>,
    pub max_salary: Option<i32>,
    pub search: Option<String>,
    /// Comma-separated skill ids; a job matches when it lists any of them.
    pub skills: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_skill_ids(raw: &str) -> Result<Vec<Uuid>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Uuid>()
                .map_err(|_| AppError::Validation(format!("'{s}' is not a valid skill id")))
        })
        .collect()
}

/// Staff see every status; everyone else only sees active postings.
fn effective_status(user: Option<&AuthUser>, requested: Option<JobStatus>) -> Option<JobStatus> {
    match user {
        Some(user) if is_staff(user) => requested,
        _ => Some(JobStatus::Active),
    }
}

/// GET /api/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    AppQuery(q): AppQuery<JobQuery>,
) -> Result<Json<Vec<JobRow>>, AppError> {
    let skill_ids = match non_empty(q.skills) {
        Some(raw) => Some(parse_skill_ids(&raw)?).filter(|ids| !ids.is_empty()),
        None => None,
    };
    let filter = JobFilter {
        status: effective_status(user.as_ref(), q.status),
        location: non_empty(q.location),
        employment_type: q.employment_type,
        experience_level: q.experience_level,
        min_salary: q.min_salary,
        max_salary: q.max_salary,
        search: non_empty(q.search),
        skill_ids,
    };
    Ok(Json(store::list_jobs(&state.db, &filter).await?))
}

/// POST /api/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<NewJob>,
) -> Result<(StatusCode, AuditChange, Json<JobRow>), AppError> {
    ensure(can_manage_jobs(&user), "Only recruiters and administrators can post jobs")?;
    validate_body(&req)?;
    check_salary_range(req.salary_min, req.salary_max)?;

    let job = store::insert_job(&state.db, &req, user.id()).await?;
    info!("Job {} ({}) created by {}", job.job_code, job.id, user.user.email);
    Ok((
        StatusCode::CREATED,
        AuditChange::created("jobs", job.id, &job),
        Json(job),
    ))
}

/// Loads a job the caller may read. Non-active postings are hidden from
/// everyone but staff.
async fn visible_job(state: &AppState, user: Option<&AuthUser>, id: Uuid) -> Result<JobRow, AppError> {
    let job = store::get_job(&state.db, id).await?;
    let staff = user.map_or(false, is_staff);
    if staff || job.status == JobStatus::Active.as_str() {
        Ok(job)
    } else {
        Err(AppError::not_found(format!("Job {id}")))
    }
}

async fn editable_job(state: &AppState, user: &AuthUser, id: Uuid) -> Result<JobRow, AppError> {
    let job = store::get_job(&state.db, id).await?;
    ensure(
        can_edit_job(user, &job),
        "Only the hiring manager or an administrator can change this job",
    )?;
    Ok(job)
}

/// GET /api/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    Ok(Json(visible_job(&state, user.as_ref(), id).await?))
}

/// PUT /api/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<JobUpdate>,
) -> Result<(AuditChange, Json<JobRow>), AppError> {
    validate_body(&req)?;
    let before = editable_job(&state, &user, id).await?;
    check_salary_range(
        req.salary_min.unwrap_or(before.salary_min),
        req.salary_max.unwrap_or(before.salary_max),
    )?;

    let after = store::update_job(&state.db, id, &req).await?;
    Ok((AuditChange::updated("jobs", id, &before, &after), Json(after)))
}

/// DELETE /api/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Deleted, AppError> {
    let job = editable_job(&state, &user, id).await?;
    store::delete_job(&state.db, id).await?;
    info!("Job {} deleted by {}", job.job_code, user.user.email);
    Ok(audit::deleted("jobs", id, &job))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: JobStatus,
}

/// POST /api/jobs/:id/status
pub async fn handle_set_status(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<StatusRequest>,
) -> Result<(AuditChange, Json<JobRow>), AppError> {
    let before = editable_job(&state, &user, id).await?;
    let current: JobStatus = before
        .status
        .parse()
        .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))?;
    if !current.can_transition_to(req.status) {
        return Err(AppError::Validation(format!(
            "Cannot move a job from {current} to {}",
            req.status
        )));
    }

    let after = store::set_status(&state.db, id, req.status).await?;
    info!("Job {} moved {} -> {}", after.job_code, current, req.status);
    Ok((AuditChange::updated("jobs", id, &before, &after), Json(after)))
}

// ────────────────────────────────────────────────────────────────────────────
// Skills and requirements
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/jobs/:id/skills
pub async fn handle_job_skills(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Vec<JobSkillRow>>, AppError> {
    let job = visible_job(&state, user.as_ref(), id).await?;
    Ok(Json(job_skills(&state.db, job.id).await?))
}

/// POST /api/jobs/:id/add_skill
pub async fn handle_add_job_skill(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<NewJobSkill>,
) -> Result<(StatusCode, AuditChange, Json<JobSkillRow>), AppError> {
    validate_body(&req)?;
    let job = editable_job(&state, &user, id).await?;
    let skill = store::add_job_skill(&state.db, job.id, &req).await?;
    Ok((
        StatusCode::CREATED,
        AuditChange::created("job_skills", skill.id, &skill),
        Json(skill),
    ))
}

#[derive(Debug, Deserialize)]
pub struct RequirementQuery {
    #[serde(rename = "type")]
    pub requirement_type: Option<RequirementType>,
}

/// GET /api/jobs/:id/requirements
pub async fn handle_requirements(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    AppPath(id): AppPath<Uuid>,
    AppQuery(q): AppQuery<RequirementQuery>,
) -> Result<Json<Vec<JobRequirementRow>>, AppError> {
    let job = visible_job(&state, user.as_ref(), id).await?;
    Ok(Json(
        store::list_requirements(&state.db, job.id, q.requirement_type).await?,
    ))
}

/// POST /api/jobs/:id/add_requirement
pub async fn handle_add_requirement(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<NewRequirement>,
) -> Result<(StatusCode, AuditChange, Json<JobRequirementRow>), AppError> {
    validate_body(&req)?;
    let job = editable_job(&state, &user, id).await?;
    let requirement = store::add_requirement(&state.db, job.id, &req).await?;
    Ok((
        StatusCode::CREATED,
        AuditChange::created("job_requirements", requirement.id, &requirement),
        Json(requirement),
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Applications and interview preparation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct JobApplicationsQuery {
    pub status: Option<ApplicationStatus>,
}

/// GET /api/jobs/:id/applications
/// Best match first.
pub async fn handle_job_applications(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppQuery(q): AppQuery<JobApplicationsQuery>,
) -> Result<Json<Vec<ApplicationSummaryRow>>, AppError> {
    let job = store::get_job(&state.db, id).await?;
    ensure(
        can_edit_job(&user, &job) || can_manage_jobs(&user),
        "Only the hiring team can list applications for this job",
    )?;
    let filter = ApplicationFilter {
        job_id: Some(job.id),
        status: q.status,
        ..Default::default()
    };
    Ok(Json(applications::list_applications(&state.db, &filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    #[serde(default = "default_interview_type")]
    pub interview_type: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default = "default_count")]
    pub count: u32,
}

impl Default for QuestionRequest {
    fn default() -> Self {
        Self {
            interview_type: default_interview_type(),
            difficulty: default_difficulty(),
            count: default_count(),
        }
    }
}

fn default_interview_type() -> String {
    "general".to_string()
}

fn default_difficulty() -> String {
    "medium".to_string()
}

fn default_count() -> u32 {
    5
}

const MAX_QUESTIONS: u32 = 20;

/// POST /api/jobs/:id/generate_interview_questions
pub async fn handle_generate_interview_questions(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    body: Option<AppJson<QuestionRequest>>,
) -> Result<Json<AgentTaskResponse>, AppError> {
    require_roles(&user, &[Role::Recruiter, Role::Interviewer, Role::Admin])?;
    let req = body.map(|AppJson(b)| b).unwrap_or_default();
    if req.count == 0 || req.count > MAX_QUESTIONS {
        return Err(AppError::Validation(format!(
            "count must be between 1 and {MAX_QUESTIONS}"
        )));
    }

    let job = store::get_job(&state.db, id).await?;
    let (skills, requirements) = tokio::try_join!(
        async { job_skills(&state.db, job.id).await.map_err(AppError::from) },
        store::list_requirements(&state.db, job.id, None),
    )?;
    let job_context = json!({
        "job_title": job.title,
        "description": job.description,
        "experience_level": job.experience_level,
        "skills": skills.iter().map(|s| s.skill_name.as_str()).collect::<Vec<_>>(),
        "requirements": requirements.iter().map(|r| r.description.as_str()).collect::<Vec<_>>(),
    });

    let spec = QuestionSpec {
        job_title: &job.title,
        interview_type: &req.interview_type,
        difficulty: &req.difficulty,
        count: req.count,
    };
    Ok(Json(
        services::generate_questions(&state, user.id(), &spec, job_context, None).await,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::auth_user;

    #[test]
    fn test_parse_skill_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = parse_skill_ids(&format!("{a}, {b},")).unwrap();
        assert_eq!(ids, vec![a, b]);
        assert!(matches!(
            parse_skill_ids("not-a-uuid"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_non_staff_only_list_active_jobs() {
        let candidate = auth_user(Role::Candidate);
        assert_eq!(
            effective_status(Some(&candidate), Some(JobStatus::Draft)),
            Some(JobStatus::Active)
        );
        assert_eq!(effective_status(None, None), Some(JobStatus::Active));

        let recruiter = auth_user(Role::Recruiter);
        assert_eq!(effective_status(Some(&recruiter), None), None);
        assert_eq!(
            effective_status(Some(&recruiter), Some(JobStatus::Paused)),
            Some(JobStatus::Paused)
        );
    }

    #[test]
    fn test_question_request_defaults() {
        let req: QuestionRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.interview_type, "general");
        assert_eq!(req.difficulty, "medium");
        assert_eq!(req.count, 5);
    }

    #[test]
    fn test_blank_filters_are_dropped() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(" Tokyo ".to_string())), Some("Tokyo".to_string()));
    }
}

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::services::{self, AgentTaskResponse};
use crate::audit::{self, AuditChange, Deleted};
use crate::auth::permissions::{can_edit_candidate, can_view_candidate, ensure, is_staff};
use crate::auth::AuthUser;
use crate::candidates::resume::{check_upload, is_pdf_key, pdf_text};
use crate::candidates::store::{
    self, CandidateFilter, CandidateInput, CandidateSummaryRow, NewCandidateSkill, NewEducation,
    NewSkill, NewWorkExperience, ProfileInput,
};
use crate::errors::{validate_body, AppError};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::jobs::store::{self as jobs, JobFilter};
use crate::models::candidate::{
    CandidateProfileRow, CandidateRow, CandidateSkillRow, CandidateStatus, EducationRow,
    SkillCategory, SkillRow, WorkExperienceRow,
};
use crate::models::job::JobStatus;
use crate::models::user::Role;
use crate::state::AppState;
use crate::storage::resume_key;

// ────────────────────────────────────────────────────────────────────────────
// Skills catalogue
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SkillQuery {
    pub category: Option<SkillCategory>,
    pub search: Option<String>,
}

/// GET /api/candidates/skills
pub async fn handle_list_skills(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(q): AppQuery<SkillQuery>,
) -> Result<Json<Vec<SkillRow>>, AppError> {
    let category = q.category.map(|c| c.as_str());
    let search = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    Ok(Json(store::list_skills(&state.db, category, search).await?))
}

/// POST /api/candidates/skills
pub async fn handle_create_skill(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<NewSkill>,
) -> Result<(StatusCode, AuditChange, Json<SkillRow>), AppError> {
    ensure(is_staff(&user), "Only recruiters and administrators can add skills")?;
    validate_body(&req)?;
    let skill = store::insert_skill(&state.db, &req).await?;
    Ok((
        StatusCode::CREATED,
        AuditChange::created("skills", skill.id, &skill),
        Json(skill),
    ))
}

#[derive(Serialize)]
pub struct Choice {
    pub value: &'static str,
    pub label: String,
}

fn label(wire: &str) -> String {
    wire.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// GET /api/candidates/skills/categories
pub async fn handle_skill_categories(_user: AuthUser) -> Json<Vec<Choice>> {
    Json(
        SkillCategory::ALL
            .iter()
            .map(|c| Choice {
                value: c.as_str(),
                label: label(c.as_str()),
            })
            .collect(),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Candidates
// ────────────────────────────────────────────────────────────────────────────

/// Loads a candidate the caller may see. Out-of-scope rows read as missing.
async fn visible_candidate(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> Result<CandidateRow, AppError> {
    let candidate = store::get_candidate(&state.db, id).await?;
    if can_view_candidate(user, &candidate) {
        Ok(candidate)
    } else {
        Err(AppError::not_found(format!("Candidate {id}")))
    }
}

async fn editable_candidate(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> Result<CandidateRow, AppError> {
    let candidate = visible_candidate(state, user, id).await?;
    ensure(
        can_edit_candidate(user, &candidate),
        "You can only change your own candidate record",
    )?;
    Ok(candidate)
}

#[derive(Debug, Deserialize)]
pub struct CandidateQuery {
    pub status: Option<CandidateStatus>,
    pub search: Option<String>,
}

/// GET /api/candidates/candidates
pub async fn handle_list_candidates(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(q): AppQuery<CandidateQuery>,
) -> Result<Json<Vec<CandidateSummaryRow>>, AppError> {
    let filter = CandidateFilter {
        user_id: (user.role == Role::Candidate).then(|| user.id()),
        status: q.status,
        search: q.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    };
    Ok(Json(store::list_candidates(&state.db, &filter).await?))
}

/// POST /api/candidates/candidates
/// Candidates create their own record; staff may create one for `user_id`.
pub async fn handle_create_candidate(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<CandidateInput>,
) -> Result<(StatusCode, AuditChange, Json<CandidateRow>), AppError> {
    validate_body(&req)?;
    let owner = match (req.user_id, is_staff(&user)) {
        (Some(owner), true) => owner,
        (None, _) => user.id(),
        (Some(owner), false) if owner == user.id() => owner,
        (Some(_), false) => {
            return Err(AppError::forbidden(
                "Only staff can create candidate records for other users",
            ))
        }
    };
    if store::candidate_for_user(&state.db, owner).await?.is_some() {
        return Err(AppError::Conflict(
            "This user already has a candidate record".to_string(),
        ));
    }

    let candidate = store::insert_candidate(&state.db, owner, &req).await?;
    info!("Created candidate {} for user {}", candidate.id, owner);
    Ok((
        StatusCode::CREATED,
        AuditChange::created("candidates", candidate.id, &candidate),
        Json(candidate),
    ))
}

#[derive(Serialize)]
pub struct CandidateDetail {
    #[serde(flatten)]
    pub candidate: CandidateRow,
    pub profile: Option<CandidateProfileRow>,
    pub skills: Vec<CandidateSkillRow>,
    pub educations: Vec<EducationRow>,
    pub work_experiences: Vec<WorkExperienceRow>,
}

async fn candidate_detail(state: &AppState, candidate: CandidateRow) -> Result<CandidateDetail, AppError> {
    let (profile, skills, educations, work_experiences) = tokio::try_join!(
        store::get_profile(&state.db, candidate.id),
        store::list_candidate_skills(&state.db, candidate.id),
        store::list_educations(&state.db, candidate.id),
        store::list_work_experiences(&state.db, candidate.id),
    )?;
    Ok(CandidateDetail {
        candidate,
        profile,
        skills,
        educations,
        work_experiences,
    })
}

/// GET /api/candidates/candidates/me
pub async fn handle_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CandidateDetail>, AppError> {
    let candidate = store::candidate_for_user(&state.db, user.id())
        .await?
        .ok_or_else(|| AppError::not_found("Candidate profile"))?;
    Ok(Json(candidate_detail(&state, candidate).await?))
}

/// GET /api/candidates/candidates/:id
pub async fn handle_get_candidate(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<CandidateDetail>, AppError> {
    let candidate = visible_candidate(&state, &user, id).await?;
    Ok(Json(candidate_detail(&state, candidate).await?))
}

/// PUT|PATCH /api/candidates/candidates/:id
pub async fn handle_update_candidate(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<CandidateInput>,
) -> Result<(AuditChange, Json<CandidateRow>), AppError> {
    validate_body(&req)?;
    let before = editable_candidate(&state, &user, id).await?;
    let after = store::update_candidate(&state.db, id, &req).await?;
    Ok((AuditChange::updated("candidates", id, &before, &after), Json(after)))
}

/// DELETE /api/candidates/candidates/:id
pub async fn handle_delete_candidate(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Deleted, AppError> {
    let before = editable_candidate(&state, &user, id).await?;
    store::delete_candidate(&state.db, id).await?;
    info!("Deleted candidate {id}");
    Ok(audit::deleted("candidates", id, &before))
}

// ────────────────────────────────────────────────────────────────────────────
// Profile and sub-resources
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/candidates/candidates/:id/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<CandidateProfileRow>, AppError> {
    let candidate = visible_candidate(&state, &user, id).await?;
    store::get_profile(&state.db, candidate.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Profile"))
}

/// POST|PUT /api/candidates/candidates/:id/update_profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<ProfileInput>,
) -> Result<(AuditChange, Json<CandidateProfileRow>), AppError> {
    validate_body(&req)?;
    let candidate = editable_candidate(&state, &user, id).await?;
    let before = store::get_profile(&state.db, candidate.id).await?;
    let after = store::upsert_profile(&state.db, candidate.id, &req).await?;
    let change = match before {
        Some(before) => AuditChange::updated("candidate_profiles", after.id, &before, &after),
        None => AuditChange::created("candidate_profiles", after.id, &after),
    };
    Ok((change, Json(after)))
}

/// GET /api/candidates/candidates/:id/skills
pub async fn handle_candidate_skills(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Vec<CandidateSkillRow>>, AppError> {
    let candidate = visible_candidate(&state, &user, id).await?;
    Ok(Json(store::list_candidate_skills(&state.db, candidate.id).await?))
}

/// POST /api/candidates/candidates/:id/add_skill
pub async fn handle_add_skill(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<NewCandidateSkill>,
) -> Result<(StatusCode, AuditChange, Json<CandidateSkillRow>), AppError> {
    validate_body(&req)?;
    let candidate = editable_candidate(&state, &user, id).await?;
    let skill = store::add_candidate_skill(&state.db, candidate.id, &req).await?;
    Ok((
        StatusCode::CREATED,
        AuditChange::created("candidate_skills", skill.id, &skill),
        Json(skill),
    ))
}

/// GET /api/candidates/candidates/:id/educations
pub async fn handle_educations(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Vec<EducationRow>>, AppError> {
    let candidate = visible_candidate(&state, &user, id).await?;
    Ok(Json(store::list_educations(&state.db, candidate.id).await?))
}

/// POST /api/candidates/candidates/:id/add_education
pub async fn handle_add_education(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<NewEducation>,
) -> Result<(StatusCode, AuditChange, Json<EducationRow>), AppError> {
    validate_body(&req)?;
    store::check_date_range(req.start_date, req.end_date)?;
    let candidate = editable_candidate(&state, &user, id).await?;
    let education = store::add_education(&state.db, candidate.id, &req).await?;
    Ok((
        StatusCode::CREATED,
        AuditChange::created("educations", education.id, &education),
        Json(education),
    ))
}

/// GET /api/candidates/candidates/:id/work_experiences
pub async fn handle_work_experiences(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Vec<WorkExperienceRow>>, AppError> {
    let candidate = visible_candidate(&state, &user, id).await?;
    Ok(Json(store::list_work_experiences(&state.db, candidate.id).await?))
}

/// POST /api/candidates/candidates/:id/add_work_experience
pub async fn handle_add_work_experience(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<NewWorkExperience>,
) -> Result<(StatusCode, AuditChange, Json<WorkExperienceRow>), AppError> {
    validate_body(&req)?;
    store::check_date_range(req.start_date, req.end_date)?;
    let candidate = editable_candidate(&state, &user, id).await?;
    let work = store::add_work_experience(&state.db, candidate.id, &req).await?;
    Ok((
        StatusCode::CREATED,
        AuditChange::created("work_experiences", work.id, &work),
        Json(work),
    ))
}

/// POST /api/candidates/candidates/:id/resume
/// Multipart upload; the file goes in a field named `file` or `resume`.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    mut multipart: Multipart,
) -> Result<(AuditChange, Json<CandidateRow>), AppError> {
    let before = editable_candidate(&state, &user, id).await?;
    let resumes = state
        .resumes
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("Résumé storage is not configured".to_string()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" | "resume" => {
                let file_name = field.file_name().unwrap_or("resume").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
                upload = Some((file_name, data));
            }
            _ => {}
        }
    }
    let (file_name, data) =
        upload.ok_or_else(|| AppError::Validation("A résumé file is required".to_string()))?;

    let content_type = check_upload(&file_name, data.len())?;
    let key = resume_key(id, &file_name);
    resumes.upload(&key, data.to_vec(), content_type).await?;

    let after = store::set_resume_key(&state.db, id, &key).await?;
    Ok((AuditChange::updated("candidates", id, &before, &after), Json(after)))
}

// ────────────────────────────────────────────────────────────────────────────
// Agent actions
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ParseSkillsRequest {
    #[serde(default)]
    pub resume_text: String,
}

/// Falls back to the stored PDF when no text was sent.
async fn resume_text(
    state: &AppState,
    candidate: &CandidateRow,
    sent: &str,
) -> Result<String, AppError> {
    let sent = sent.trim();
    if !sent.is_empty() {
        return Ok(sent.to_string());
    }
    let missing = || AppError::Validation("resume_text is required".to_string());
    let key = candidate.resume_s3_key.as_deref().ok_or_else(missing)?;
    if !is_pdf_key(key) {
        return Err(missing());
    }
    let Some(resumes) = state.resumes.as_ref() else {
        warn!("Candidate {} has a stored résumé but storage is not configured", candidate.id);
        return Err(missing());
    };
    let text = pdf_text(resumes.download(key).await?).await?;
    if text.is_empty() {
        return Err(missing());
    }
    Ok(text)
}

/// POST /api/candidates/candidates/:id/parse_skills
pub async fn handle_parse_skills(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    body: Option<AppJson<ParseSkillsRequest>>,
) -> Result<Json<AgentTaskResponse>, AppError> {
    let req = body.map(|AppJson(b)| b).unwrap_or_default();
    let candidate = editable_candidate(&state, &user, id).await?;
    let text = resume_text(&state, &candidate, &req.resume_text).await?;
    Ok(Json(services::parse_skills(&state, user.id(), &text).await))
}

#[derive(Debug, Deserialize)]
pub struct CareerAdviceRequest {
    #[serde(default)]
    pub question: String,
}

/// POST /api/candidates/candidates/:id/career_advice
pub async fn handle_career_advice(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<CareerAdviceRequest>,
) -> Result<Json<AgentTaskResponse>, AppError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("question is required".to_string()));
    }
    let candidate = visible_candidate(&state, &user, id).await?;
    let today = chrono::Utc::now().date_naive();
    let history: Vec<Value> = store::list_work_experiences(&state.db, candidate.id)
        .await?
        .into_iter()
        .map(|w| {
            json!({
                "company_name": w.company_name,
                "position": w.position,
                "start_date": w.start_date,
                "end_date": w.end_date,
                "duration_months": w.duration_months(today),
                "description": w.description,
            })
        })
        .collect();
    Ok(Json(
        services::career_advice(&state, user.id(), question, Value::Array(history)).await,
    ))
}

/// POST /api/candidates/candidates/:id/match_jobs
pub async fn handle_match_jobs(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<AgentTaskResponse>, AppError> {
    let candidate = visible_candidate(&state, &user, id).await?;
    let (profile, skills) = tokio::try_join!(
        store::get_profile(&state.db, candidate.id),
        store::list_candidate_skills(&state.db, candidate.id),
    )?;
    let owner = sqlx::query_as::<_, (String, String, String)>(
        "SELECT first_name, last_name, email FROM users WHERE id = $1",
    )
    .bind(candidate.user_id)
    .fetch_optional(&state.db)
    .await?
    .unwrap_or_default();

    let candidate_profile = json!({
        "id": candidate.id,
        "name": format!("{} {}", owner.0, owner.1).trim(),
        "email": owner.2,
        "current_position": candidate.current_position,
        "years_of_experience": candidate.years_of_experience,
        "skills": skills.iter().map(|s| json!({
            "name": s.skill_name,
            "proficiency_level": s.proficiency_level,
            "years_of_experience": s.years_of_experience,
        })).collect::<Vec<_>>(),
        "expected_salary": candidate.expected_salary,
        "location_preference": profile.map(|p| p.preferred_location),
    });

    let active = jobs::list_jobs(
        &state.db,
        &JobFilter {
            status: Some(JobStatus::Active),
            ..Default::default()
        },
    )
    .await?;
    let available: Vec<Value> = active
        .iter()
        .map(|j| {
            json!({
                "id": j.id,
                "job_code": j.job_code,
                "title": j.title,
                "description": j.description,
                "responsibilities": j.responsibilities,
                "qualifications": j.qualifications,
                "preferred_qualifications": j.preferred_qualifications,
                "salary_min": j.salary_min,
                "salary_max": j.salary_max,
                "location": j.location,
                "employment_type": j.employment_type,
                "experience_level": j.experience_level,
            })
        })
        .collect();

    Ok(Json(
        services::match_jobs(&state, user.id(), candidate_profile, Value::Array(available)).await,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels() {
        assert_eq!(label("soft_skill"), "Soft Skill");
        assert_eq!(label("programming"), "Programming");
    }

    #[tokio::test]
    async fn test_categories_cover_every_variant() {
        let user = crate::auth::test_support::auth_user(Role::Candidate);
        let Json(choices) = handle_skill_categories(user).await;
        assert_eq!(choices.len(), SkillCategory::ALL.len());
        assert_eq!(choices[0].value, "programming");
    }
}

use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::application::ApplicationStatus;
use crate::models::candidate::CandidateRow;
use crate::models::job::JobRow;
use crate::models::user::Role;

pub fn require_roles(user: &AuthUser, roles: &[Role]) -> Result<(), AppError> {
    if roles.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "This action is not available to the {} role",
            user.role
        )))
    }
}

/// Fails with 403 unless `allowed` holds.
pub fn ensure(allowed: bool, reason: &str) -> Result<(), AppError> {
    if allowed {
        Ok(())
    } else {
        Err(AppError::forbidden(reason))
    }
}

pub fn is_staff(user: &AuthUser) -> bool {
    matches!(user.role, Role::Recruiter | Role::Admin)
}

pub fn can_manage_jobs(user: &AuthUser) -> bool {
    is_staff(user)
}

/// Admins edit any job; recruiters only the ones they manage.
pub fn can_edit_job(user: &AuthUser, job: &JobRow) -> bool {
    match user.role {
        Role::Admin => true,
        Role::Recruiter => job.hiring_manager_id == Some(user.id()),
        _ => false,
    }
}

/// Candidates see themselves only; every staff role may read profiles.
pub fn can_view_candidate(user: &AuthUser, candidate: &CandidateRow) -> bool {
    match user.role {
        Role::Candidate => candidate.user_id == user.id(),
        _ => true,
    }
}

pub fn can_edit_candidate(user: &AuthUser, candidate: &CandidateRow) -> bool {
    candidate.user_id == user.id() || is_staff(user)
}

/// The people attached to one application, loaded once per check.
#[derive(Debug, Clone, Default)]
pub struct ApplicationAccess {
    pub candidate_user_id: Uuid,
    pub assigned_recruiter_id: Option<Uuid>,
    pub hiring_manager_id: Option<Uuid>,
    pub interviewer_ids: Vec<Uuid>,
}

pub fn can_view_application(user: &AuthUser, access: &ApplicationAccess) -> bool {
    let me = user.id();
    match user.role {
        Role::Admin => true,
        Role::Candidate => access.candidate_user_id == me,
        Role::Recruiter => {
            access.assigned_recruiter_id == Some(me) || access.hiring_manager_id == Some(me)
        }
        Role::Interviewer => access.interviewer_ids.contains(&me),
    }
}

/// Candidates may only withdraw their own application; staff move it along.
pub fn can_set_application_status(
    user: &AuthUser,
    access: &ApplicationAccess,
    next: ApplicationStatus,
) -> bool {
    match user.role {
        Role::Candidate => {
            access.candidate_user_id == user.id() && next == ApplicationStatus::Withdrawn
        }
        Role::Interviewer => false,
        Role::Recruiter | Role::Admin => can_view_application(user, access),
    }
}

pub fn can_schedule_interviews(user: &AuthUser, access: &ApplicationAccess) -> bool {
    is_staff(user) && can_view_application(user, access)
}

pub fn can_evaluate_interviews(user: &AuthUser) -> bool {
    matches!(user.role, Role::Interviewer | Role::Recruiter | Role::Admin)
}

pub fn can_view_audit_logs(user: &AuthUser) -> bool {
    user.is_admin()
}

pub fn can_review_bias(user: &AuthUser) -> bool {
    is_staff(user)
}

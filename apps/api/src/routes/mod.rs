pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::agent::handlers as agents;
use crate::applications::handlers as applications;
use crate::audit::{handlers as audit, middleware::audit_requests};
use crate::auth::{handlers as auth, identify};
use crate::candidates::{handlers as candidates, resume::MAX_RESUME_BYTES};
use crate::jobs::handlers as jobs;
use crate::matching::handlers as matching;
use crate::state::AppState;

/// Multipart framing on top of the largest accepted résumé.
const RESUME_BODY_LIMIT: usize = MAX_RESUME_BYTES + 64 * 1024;

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::handle_register))
        .route("/login", post(auth::handle_login))
        .route("/logout", post(auth::handle_logout))
        .route(
            "/user",
            get(auth::handle_current_user).patch(auth::handle_update_user),
        )
}

fn candidate_routes() -> Router<AppState> {
    Router::new()
        // Skills catalogue
        .route(
            "/skills",
            get(candidates::handle_list_skills).post(candidates::handle_create_skill),
        )
        .route("/skills/categories", get(candidates::handle_skill_categories))
        // Candidates
        .route(
            "/candidates",
            get(candidates::handle_list_candidates).post(candidates::handle_create_candidate),
        )
        .route("/candidates/me", get(candidates::handle_me))
        .route(
            "/candidates/:id",
            get(candidates::handle_get_candidate)
                .put(candidates::handle_update_candidate)
                .patch(candidates::handle_update_candidate)
                .delete(candidates::handle_delete_candidate),
        )
        .route("/candidates/:id/profile", get(candidates::handle_get_profile))
        .route(
            "/candidates/:id/update_profile",
            post(candidates::handle_update_profile).put(candidates::handle_update_profile),
        )
        .route("/candidates/:id/skills", get(candidates::handle_candidate_skills))
        .route("/candidates/:id/add_skill", post(candidates::handle_add_skill))
        .route("/candidates/:id/educations", get(candidates::handle_educations))
        .route(
            "/candidates/:id/add_education",
            post(candidates::handle_add_education),
        )
        .route(
            "/candidates/:id/work_experiences",
            get(candidates::handle_work_experiences),
        )
        .route(
            "/candidates/:id/add_work_experience",
            post(candidates::handle_add_work_experience),
        )
        .route(
            "/candidates/:id/resume",
            post(candidates::handle_upload_resume).layer(DefaultBodyLimit::max(RESUME_BODY_LIMIT)),
        )
        .route(
            "/candidates/:id/parse_skills",
            post(candidates::handle_parse_skills),
        )
        .route(
            "/candidates/:id/career_advice",
            post(candidates::handle_career_advice),
        )
        .route("/candidates/:id/match_jobs", post(candidates::handle_match_jobs))
        // Applications
        .route(
            "/applications",
            get(applications::handle_list_applications)
                .post(applications::handle_create_application),
        )
        .route(
            "/applications/my_applications",
            get(applications::handle_my_applications),
        )
        .route(
            "/applications/:id",
            get(applications::handle_get_application)
                .delete(applications::handle_delete_application),
        )
        .route(
            "/applications/:id/update_status",
            post(applications::handle_update_status),
        )
        .route(
            "/applications/:id/interviews",
            get(applications::handle_application_interviews),
        )
        // Interviews
        .route(
            "/interviews",
            get(applications::handle_list_interviews).post(applications::handle_create_interview),
        )
        .route(
            "/interviews/upcoming",
            get(applications::handle_upcoming_interviews),
        )
        .route(
            "/interviews/:id",
            get(applications::handle_get_interview)
                .put(applications::handle_update_interview)
                .patch(applications::handle_update_interview)
                .delete(applications::handle_delete_interview),
        )
        .route(
            "/interviews/:id/submit_feedback",
            post(applications::handle_submit_feedback),
        )
        .route(
            "/interviews/:id/generate_questions",
            get(applications::handle_generate_questions),
        )
        .route(
            "/interviews/:id/evaluate_answer",
            post(applications::handle_evaluate_answer),
        )
        .route(
            "/interviews/:id/submit_answers",
            post(applications::handle_submit_answers),
        )
}

fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::handle_list_jobs).post(jobs::handle_create_job))
        .route(
            "/matching-results",
            get(matching::handle_list_matching_results),
        )
        .route(
            "/:id",
            get(jobs::handle_get_job)
                .put(jobs::handle_update_job)
                .patch(jobs::handle_update_job)
                .delete(jobs::handle_delete_job),
        )
        .route("/:id/status", post(jobs::handle_set_status))
        .route("/:id/skills", get(jobs::handle_job_skills))
        .route("/:id/add_skill", post(jobs::handle_add_job_skill))
        .route("/:id/requirements", get(jobs::handle_requirements))
        .route("/:id/add_requirement", post(jobs::handle_add_requirement))
        .route("/:id/applications", get(jobs::handle_job_applications))
        .route("/:id/apply", post(matching::handle_apply))
        .route(
            "/:id/matching_candidates",
            get(matching::handle_matching_candidates),
        )
        .route(
            "/:id/calculate_matching",
            post(matching::handle_calculate_matching),
        )
        .route(
            "/:id/generate_interview_questions",
            post(jobs::handle_generate_interview_questions),
        )
}

fn agent_routes() -> Router<AppState> {
    Router::new()
        .route("/concierge", post(agents::handle_concierge))
        .route("/sessions/:session_id", get(agents::handle_get_session))
}

fn audit_routes() -> Router<AppState> {
    Router::new()
        .route("/logs", get(audit::handle_list_logs))
        .route(
            "/bias-reports",
            get(audit::handle_list_bias_reports).post(audit::handle_create_bias_report),
        )
        .route(
            "/bias-reports/:id/review",
            post(audit::handle_review_bias_report),
        )
        .route(
            "/bias-reports/:id/address",
            post(audit::handle_address_bias_report),
        )
        .route(
            "/compliance-checks",
            get(audit::handle_list_compliance_checks).post(audit::handle_create_compliance_check),
        )
}

/// Identification runs first so the audit layer sees the acting user.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api/auth", auth_routes())
        .nest("/api/candidates", candidate_routes())
        .nest("/api/jobs", job_routes())
        .nest("/api/agents", agent_routes())
        .nest("/api/audit", audit_routes())
        .layer(from_fn_with_state(state.audit.clone(), audit_requests))
        .layer(from_fn_with_state(state.clone(), identify))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::audit::sink::memory::MemoryAuditSink;
    use crate::state::test_support::test_state;

    async fn call(method: Method, uri: String) -> (StatusCode, Value) {
        let app = build_router(test_state(Arc::new(MemoryAuditSink::default())));
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn assert_delete_requires_login(path: &str) {
        let (status, body) = call(Method::DELETE, format!("{path}/{}", Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{path}");
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_delete_job_route() {
        assert_delete_requires_login("/api/jobs").await;
    }

    #[tokio::test]
    async fn test_delete_candidate_route() {
        assert_delete_requires_login("/api/candidates/candidates").await;
    }

    #[tokio::test]
    async fn test_delete_application_route() {
        assert_delete_requires_login("/api/candidates/applications").await;
    }

    #[tokio::test]
    async fn test_delete_interview_route() {
        assert_delete_requires_login("/api/candidates/interviews").await;
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, _) = call(Method::GET, "/api/nowhere".to_string()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

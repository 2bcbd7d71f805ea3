use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, Query, Request, State},
    http::{header::CONTENT_TYPE, header::USER_AGENT, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::audit::classify::{self, MAX_TEXT_LEN};
use crate::audit::sink::{AuditRecord, AuditSink, DataAccessRecord};
use crate::audit::AuditChange;
use crate::auth::AuthUser;
use crate::errors::AppError;

/// Same ceiling axum's `Json` extractor applies.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub async fn audit_requests(
    State(sink): State<Arc<dyn AuditSink>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    if classify::is_excluded(&method, &path) {
        return next.run(request).await;
    }

    let started = Instant::now();
    let actor = request.extensions().get::<AuthUser>().cloned();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip_address = classify::client_ip(request.headers(), peer);
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| classify::truncate(ua, MAX_TEXT_LEN))
        .unwrap_or_default();

    let mut params = Map::new();
    if let Ok(Query(query)) = Query::<HashMap<String, String>>::try_from_uri(request.uri()) {
        if !query.is_empty() {
            params.insert("query_params".to_string(), classify::sanitize(&json!(query)));
        }
    }

    let response = match capture_json_body(request).await {
        Ok((request, body)) => {
            if let Some(body) = body {
                params.insert("body".to_string(), classify::sanitize(&body));
            }
            next.run(request).await
        }
        Err(err) => err.into_response(),
    };

    let status = response.status().as_u16();
    let (mut response, error_message) = if status >= 400 {
        capture_error_body(response).await
    } else {
        (response, String::new())
    };
    let change = response.extensions_mut().remove::<AuditChange>();

    let (mut resource_type, mut resource_id) = classify::resource_info(&path);
    let (old_values, new_values, changes) = match change {
        Some(change) => {
            resource_type = change.resource_type;
            if !change.resource_id.is_empty() {
                resource_id = change.resource_id;
            }
            let changes = classify::field_diff(change.old_values.as_ref(), change.new_values.as_ref());
            (change.old_values, change.new_values, changes)
        }
        None => (None, None, None),
    };

    let action_type = classify::action_type(&method, &path);
    let role = actor.as_ref().map(|a| a.role);
    let actor_label = actor
        .as_ref()
        .map(|a| a.user.email.clone())
        .unwrap_or_else(|| "Anonymous".to_string());

    let record = AuditRecord {
        user_id: actor.as_ref().map(|a| a.id()),
        user_email: actor.as_ref().map(|a| a.user.email.clone()).unwrap_or_default(),
        user_role: role.map(|r| r.to_string()).unwrap_or_default(),
        action_type,
        description: format!("{actor_label} {action_type} {resource_type}"),
        resource_type,
        resource_id,
        ip_address: ip_address.clone(),
        user_agent: user_agent.clone(),
        request_method: method.to_string(),
        request_path: classify::truncate(&path, MAX_TEXT_LEN),
        request_params: Value::Object(params),
        old_values,
        new_values,
        changes,
        status_code: status,
        response_time_ms: started.elapsed().as_millis() as i64,
        severity: classify::severity(&method, &path, status, role),
        is_suspicious: classify::is_suspicious(&path, status),
        is_success: classify::is_success(status),
        error_message,
    };

    let access = match &actor {
        Some(actor)
            if method == Method::GET
                && (200..300).contains(&status)
                && classify::is_personal_data_path(&path) =>
        {
            Some(DataAccessRecord {
                user_id: actor.id(),
                access_type: classify::access_type(&path),
                request_path: classify::truncate(&path, MAX_TEXT_LEN),
                ip_address,
                user_agent,
            })
        }
        _ => None,
    };

    tokio::spawn(async move {
        if let Err(e) = sink.record(record).await {
            warn!("Failed to write audit log: {e:#}");
        }
        if let Some(access) = access {
            if let Err(e) = sink.record_access(access).await {
                warn!("Failed to write data access log: {e:#}");
            }
        }
    });

    response
}

/// Buffers JSON write bodies so they can be both audited and handled.
async fn capture_json_body(request: Request) -> Result<(Request, Option<Value>), AppError> {
    let is_write = matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH);
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_write || !is_json {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| AppError::Validation("Request body is too large or unreadable".to_string()))?;
    let parsed = serde_json::from_slice::<Value>(&bytes).ok();
    Ok((Request::from_parts(parts, Body::from(bytes)), parsed))
}

async fn capture_error_body(response: Response) -> (Response, String) {
    let (parts, body) = response.into_parts();
    match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => {
            let message = classify::truncate(&String::from_utf8_lossy(&bytes), MAX_TEXT_LEN);
            (Response::from_parts(parts, Body::from(bytes)), message)
        }
        Err(e) => {
            warn!("Could not buffer error response for audit: {e}");
            (Response::from_parts(parts, Body::empty()), String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::{get, post},
        Json, Router,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::audit::sink::memory::{FailingAuditSink, MemoryAuditSink};
    use crate::auth::test_support::auth_user;
    use crate::models::audit::{ActionType, Severity};
    use crate::models::user::Role;

    const JOB_ID: &str = "7f1d3c1e-2b8a-4c55-9f7e-3a0c7d9e1b42";

    async fn create_job(Json(body): Json<Value>) -> (StatusCode, AuditChange, Json<Value>) {
        let created = json!({"id": JOB_ID, "title": body["title"], "status": "draft"});
        (
            StatusCode::CREATED,
            AuditChange::created("jobs", JOB_ID, &created),
            Json(created),
        )
    }

    async fn update_job() -> (AuditChange, Json<Value>) {
        let old = json!({"id": JOB_ID, "status": "draft"});
        let new = json!({"id": JOB_ID, "status": "active"});
        (AuditChange::updated("jobs", JOB_ID, &old, &new), Json(new))
    }

    async fn forbidden() -> Result<Json<Value>, AppError> {
        Err(AppError::forbidden("Recruiters only"))
    }

    fn app(sink: Arc<dyn AuditSink>, actor: Option<AuthUser>) -> Router {
        let router = Router::new()
            .route("/api/jobs/", post(create_job))
            .route("/api/jobs/:id/status", post(update_job))
            .route("/api/jobs/secret", get(forbidden))
            .route("/api/candidates/candidates/", get(|| async { "[]" }))
            .route("/health", get(|| async { "ok" }))
            .layer(from_fn_with_state(sink, audit_requests));
        match actor {
            Some(actor) => router.layer(axum::Extension(actor)),
            None => router,
        }
    }

    async fn wait_for(sink: &MemoryAuditSink, count: usize) -> Vec<AuditRecord> {
        for _ in 0..100 {
            {
                let records = sink.records.lock().unwrap();
                if records.len() >= count {
                    return records.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        sink.records.lock().unwrap().clone()
    }

    fn json_post(uri: &str, body: Value) -> HttpRequest<Body> {
        HttpRequest::post(uri)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, "audit-test/1.0")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_one_row_per_state_changing_request() {
        let sink = Arc::new(MemoryAuditSink::default());
        let actor = auth_user(Role::Recruiter);
        let response = app(sink.clone(), Some(actor.clone()))
            .oneshot(json_post(
                "/api/jobs/",
                json!({"title": "Backend Engineer", "api_token": "abc", "password": "x"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let records = wait_for(&sink, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sink.records.lock().unwrap().len(), 1);

        let record = &records[0];
        assert_eq!(record.user_id, Some(actor.id()));
        assert_eq!(record.user_role, "recruiter");
        assert_eq!(record.action_type, ActionType::Create);
        assert_eq!(record.resource_type, "jobs");
        assert_eq!(record.resource_id, JOB_ID);
        assert_eq!(record.status_code, 201);
        assert!(record.is_success);
        assert_eq!(record.severity, Severity::Low);
        assert_eq!(record.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(record.user_agent, "audit-test/1.0");
        assert_eq!(record.request_params["body"]["title"], "Backend Engineer");
        assert_eq!(record.request_params["body"]["api_token"], classify::REDACTED);
        assert_eq!(record.request_params["body"]["password"], classify::REDACTED);
        assert!(record.old_values.is_none());
        assert_eq!(record.new_values.as_ref().unwrap()["status"], "draft");
    }

    #[tokio::test]
    async fn test_update_records_field_diff() {
        let sink = Arc::new(MemoryAuditSink::default());
        let uri = format!("/api/jobs/{JOB_ID}/status");
        app(sink.clone(), Some(auth_user(Role::Admin)))
            .oneshot(json_post(&uri, json!({"status": "active"})))
            .await
            .unwrap();

        let records = wait_for(&sink, 1).await;
        let record = &records[0];
        assert_eq!(
            record.changes,
            Some(json!({"status": {"old": "draft", "new": "active"}}))
        );
        assert_eq!(record.severity, Severity::High);
    }

    #[tokio::test]
    async fn test_error_responses_are_flagged() {
        let sink = Arc::new(MemoryAuditSink::default());
        let response = app(sink.clone(), None)
            .oneshot(HttpRequest::get("/api/jobs/secret").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let records = wait_for(&sink, 1).await;
        let record = &records[0];
        assert!(record.is_suspicious);
        assert!(!record.is_success);
        assert_eq!(record.severity, Severity::Medium);
        assert!(record.error_message.contains("Recruiters only"));
        assert_eq!(record.user_id, None);
        assert!(record.description.starts_with("Anonymous"));
    }

    #[tokio::test]
    async fn test_excluded_paths_are_not_logged() {
        let sink = Arc::new(MemoryAuditSink::default());
        let router = app(sink.clone(), None);
        router
            .clone()
            .oneshot(HttpRequest::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        router
            .oneshot(
                HttpRequest::options("/api/jobs/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_personal_data_reads_write_access_log() {
        let sink = Arc::new(MemoryAuditSink::default());
        let actor = auth_user(Role::Recruiter);
        app(sink.clone(), Some(actor.clone()))
            .oneshot(
                HttpRequest::get("/api/candidates/candidates/?status=active")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let records = wait_for(&sink, 1).await;
        assert_eq!(records[0].request_params["query_params"]["status"], "active");
        for _ in 0..100 {
            if !sink.accesses.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let accesses = sink.accesses.lock().unwrap();
        assert_eq!(accesses.len(), 1);
        assert_eq!(accesses[0].user_id, actor.id());
    }

    #[tokio::test]
    async fn test_query_params_are_redacted() {
        let sink = Arc::new(MemoryAuditSink::default());
        app(sink.clone(), Some(auth_user(Role::Admin)))
            .oneshot(
                HttpRequest::get("/api/candidates/candidates/?status=active&access_token=abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let records = wait_for(&sink, 1).await;
        let query = &records[0].request_params["query_params"];
        assert_eq!(query["status"], "active");
        assert_eq!(query["access_token"], classify::REDACTED);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_affect_response() {
        let response = app(Arc::new(FailingAuditSink), Some(auth_user(Role::Recruiter)))
            .oneshot(json_post("/api/jobs/", json!({"title": "Designer"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["title"], "Designer");
    }
}

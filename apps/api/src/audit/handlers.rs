use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::audit::store::{self, AuditLogFilter, NewBiasReport, NewComplianceCheck};
use crate::audit::AuditChange;
use crate::auth::permissions::{can_review_bias, can_view_audit_logs, ensure};
use crate::auth::AuthUser;
use crate::errors::{validate_body, AppError};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::models::audit::{
    AuditLogRow, BiasReportRow, BiasStatus, BiasType, CheckStatus, CheckType, ComplianceCheckRow,
    Severity,
};
use crate::state::AppState;

const DEFAULT_LOG_LIMIT: i64 = 100;
const MAX_LOG_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    pub action_type: Option<String>,
    pub user_id: Option<Uuid>,
    pub suspicious: Option<bool>,
    pub limit: Option<i64>,
}

/// GET /api/audit/logs
pub async fn handle_list_logs(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(q): AppQuery<AuditLogQuery>,
) -> Result<Json<Vec<AuditLogRow>>, AppError> {
    ensure(can_view_audit_logs(&user), "Only administrators can read audit logs")?;
    let filter = AuditLogFilter {
        action_type: q.action_type,
        user_id: q.user_id,
        suspicious: q.suspicious,
        limit: q.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT),
    };
    Ok(Json(store::list_audit_logs(&state.db, &filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<BiasStatus>,
}

/// GET /api/audit/bias-reports
pub async fn handle_list_bias_reports(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(q): AppQuery<StatusQuery>,
) -> Result<Json<Vec<BiasReportRow>>, AppError> {
    ensure(can_review_bias(&user), "Only recruiters and administrators can read bias reports")?;
    let status = q.status.map(|s| s.as_str());
    Ok(Json(store::list_bias_reports(&state.db, status).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBiasReportRequest {
    pub bias_type: BiasType,
    pub severity: Severity,
    #[validate(length(min = 1, max = 100))]
    pub target_type: String,
    #[serde(default)]
    pub target_id: String,
    #[validate(length(min = 1, message = "description cannot be empty"))]
    pub description: String,
    #[serde(default)]
    pub evidence: Value,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub detected_by: Option<String>,
}

/// POST /api/audit/bias-reports
pub async fn handle_create_bias_report(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<CreateBiasReportRequest>,
) -> Result<(StatusCode, AuditChange, Json<BiasReportRow>), AppError> {
    ensure(can_review_bias(&user), "Only recruiters and administrators can file bias reports")?;
    validate_body(&req)?;

    let evidence = if req.evidence.is_null() {
        Value::Object(Default::default())
    } else {
        req.evidence.clone()
    };
    let report = store::insert_bias_report(
        &state.db,
        NewBiasReport {
            bias_type: req.bias_type.as_str(),
            severity: req.severity.as_str(),
            target_type: &req.target_type,
            target_id: &req.target_id,
            description: &req.description,
            evidence: &evidence,
            confidence_score: req.confidence_score,
            detected_by: req.detected_by.as_deref().unwrap_or("manual"),
            reported_by: user.id(),
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        AuditChange::created("bias_reports", report.id, &report),
        Json(report),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub status: BiasStatus,
    #[serde(default)]
    pub review_notes: String,
}

/// POST /api/audit/bias-reports/:id/review
pub async fn handle_review_bias_report(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<ReviewRequest>,
) -> Result<(AuditChange, Json<BiasReportRow>), AppError> {
    ensure(can_review_bias(&user), "Only recruiters and administrators can review bias reports")?;
    if !req.status.is_review_outcome() {
        return Err(AppError::Validation(format!(
            "'{}' is not a review outcome; use reviewing, dismissed or false_positive",
            req.status
        )));
    }

    let before = store::get_bias_report(&state.db, id).await?;
    let after =
        store::review_bias_report(&state.db, id, req.status.as_str(), &req.review_notes, user.id())
            .await?;
    Ok((AuditChange::updated("bias_reports", id, &before, &after), Json(after)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddressRequest {
    #[validate(length(min = 1, message = "action_taken cannot be empty"))]
    pub action_taken: String,
}

/// POST /api/audit/bias-reports/:id/address
pub async fn handle_address_bias_report(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<AddressRequest>,
) -> Result<(AuditChange, Json<BiasReportRow>), AppError> {
    ensure(can_review_bias(&user), "Only recruiters and administrators can address bias reports")?;
    validate_body(&req)?;

    let before = store::get_bias_report(&state.db, id).await?;
    let after = store::address_bias_report(&state.db, id, &req.action_taken, user.id()).await?;
    Ok((AuditChange::updated("bias_reports", id, &before, &after), Json(after)))
}

#[derive(Debug, Deserialize)]
pub struct CheckTypeQuery {
    pub check_type: Option<CheckType>,
}

/// GET /api/audit/compliance-checks
pub async fn handle_list_compliance_checks(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(q): AppQuery<CheckTypeQuery>,
) -> Result<Json<Vec<ComplianceCheckRow>>, AppError> {
    ensure(user.is_admin(), "Only administrators can read compliance checks")?;
    let check_type = q.check_type.map(|c| c.as_str());
    Ok(Json(store::list_compliance_checks(&state.db, check_type).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateComplianceCheckRequest {
    pub check_type: CheckType,
    pub status: Option<CheckStatus>,
    #[validate(length(min = 1, max = 100))]
    pub target_type: String,
    #[serde(default)]
    pub target_id: String,
    #[validate(length(min = 1, message = "result_summary cannot be empty"))]
    pub result_summary: String,
    #[serde(default)]
    pub findings: Value,
    #[validate(range(min = 0.0, max = 100.0))]
    pub compliance_score: Option<f64>,
}

/// POST /api/audit/compliance-checks
pub async fn handle_create_compliance_check(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<CreateComplianceCheckRequest>,
) -> Result<(StatusCode, AuditChange, Json<ComplianceCheckRow>), AppError> {
    ensure(user.is_admin(), "Only administrators can record compliance checks")?;
    validate_body(&req)?;

    let findings = if req.findings.is_null() {
        Value::Array(vec![])
    } else {
        req.findings.clone()
    };
    let check = store::insert_compliance_check(
        &state.db,
        NewComplianceCheck {
            check_type: req.check_type.as_str(),
            status: req.status.unwrap_or(CheckStatus::Pending).as_str(),
            target_type: &req.target_type,
            target_id: &req.target_id,
            result_summary: &req.result_summary,
            findings: &findings,
            compliance_score: req.compliance_score,
            checked_by: user.id(),
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        AuditChange::created("compliance_checks", check.id, &check),
        Json(check),
    ))
}

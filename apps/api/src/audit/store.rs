use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::audit::{AuditLogRow, BiasReportRow, ComplianceCheckRow};

#[derive(Debug, Default)]
pub struct AuditLogFilter {
    pub action_type: Option<String>,
    pub user_id: Option<Uuid>,
    pub suspicious: Option<bool>,
    pub limit: i64,
}

pub async fn list_audit_logs(pool: &PgPool, filter: &AuditLogFilter) -> Result<Vec<AuditLogRow>, AppError> {
    Ok(sqlx::query_as::<_, AuditLogRow>(
        r#"
        SELECT * FROM audit_logs
        WHERE ($1::text IS NULL OR action_type = $1)
          AND ($2::uuid IS NULL OR user_id = $2)
          AND ($3::bool IS NULL OR is_suspicious = $3)
        ORDER BY created_at DESC
        LIMIT $4
        "#,
    )
    .bind(&filter.action_type)
    .bind(filter.user_id)
    .bind(filter.suspicious)
    .bind(filter.limit)
    .fetch_all(pool)
    .await?)
}

pub async fn list_bias_reports(
    pool: &PgPool,
    status: Option<&str>,
) -> Result<Vec<BiasReportRow>, AppError> {
    Ok(sqlx::query_as::<_, BiasReportRow>(
        r#"
        SELECT * FROM bias_reports
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY created_at DESC
        "#,
    )
    .bind(status)
    .fetch_all(pool)
    .await?)
}

pub async fn get_bias_report(pool: &PgPool, id: Uuid) -> Result<BiasReportRow, AppError> {
    sqlx::query_as::<_, BiasReportRow>("SELECT * FROM bias_reports WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Bias report {id}")))
}

pub struct NewBiasReport<'a> {
    pub bias_type: &'a str,
    pub severity: &'a str,
    pub target_type: &'a str,
    pub target_id: &'a str,
    pub description: &'a str,
    pub evidence: &'a Value,
    pub confidence_score: Option<f64>,
    pub detected_by: &'a str,
    pub reported_by: Uuid,
}

pub async fn insert_bias_report(
    pool: &PgPool,
    report: NewBiasReport<'_>,
) -> Result<BiasReportRow, AppError> {
    Ok(sqlx::query_as::<_, BiasReportRow>(
        r#"
        INSERT INTO bias_reports
            (bias_type, severity, target_type, target_id, description, evidence,
             confidence_score, detected_by, reported_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(report.bias_type)
    .bind(report.severity)
    .bind(report.target_type)
    .bind(report.target_id)
    .bind(report.description)
    .bind(report.evidence)
    .bind(report.confidence_score)
    .bind(report.detected_by)
    .bind(report.reported_by)
    .fetch_one(pool)
    .await?)
}

pub async fn review_bias_report(
    pool: &PgPool,
    id: Uuid,
    status: &str,
    notes: &str,
    reviewer: Uuid,
) -> Result<BiasReportRow, AppError> {
    sqlx::query_as::<_, BiasReportRow>(
        r#"
        UPDATE bias_reports
        SET status = $2, review_notes = $3, reviewed_by = $4, reviewed_at = now(), updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(notes)
    .bind(reviewer)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found(format!("Bias report {id}")))
}

pub async fn address_bias_report(
    pool: &PgPool,
    id: Uuid,
    action_taken: &str,
    reviewer: Uuid,
) -> Result<BiasReportRow, AppError> {
    sqlx::query_as::<_, BiasReportRow>(
        r#"
        UPDATE bias_reports
        SET status = 'addressed', action_taken = $2,
            reviewed_by = COALESCE(reviewed_by, $3), reviewed_at = COALESCE(reviewed_at, now()),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(action_taken)
    .bind(reviewer)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found(format!("Bias report {id}")))
}

pub async fn list_compliance_checks(
    pool: &PgPool,
    check_type: Option<&str>,
) -> Result<Vec<ComplianceCheckRow>, AppError> {
    Ok(sqlx::query_as::<_, ComplianceCheckRow>(
        r#"
        SELECT * FROM compliance_checks
        WHERE ($1::text IS NULL OR check_type = $1)
        ORDER BY created_at DESC
        "#,
    )
    .bind(check_type)
    .fetch_all(pool)
    .await?)
}

pub struct NewComplianceCheck<'a> {
    pub check_type: &'a str,
    pub status: &'a str,
    pub target_type: &'a str,
    pub target_id: &'a str,
    pub result_summary: &'a str,
    pub findings: &'a Value,
    pub compliance_score: Option<f64>,
    pub checked_by: Uuid,
}

pub async fn insert_compliance_check(
    pool: &PgPool,
    check: NewComplianceCheck<'_>,
) -> Result<ComplianceCheckRow, AppError> {
    Ok(sqlx::query_as::<_, ComplianceCheckRow>(
        r#"
        INSERT INTO compliance_checks
            (check_type, status, target_type, target_id, result_summary, findings,
             compliance_score, checked_by, checked_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                CASE WHEN $2 IN ('passed', 'failed', 'warning') THEN now() END)
        RETURNING *
        "#,
    )
    .bind(check.check_type)
    .bind(check.status)
    .bind(check.target_type)
    .bind(check.target_id)
    .bind(check.result_summary)
    .bind(check.findings)
    .bind(check.compliance_score)
    .bind(check.checked_by)
    .fetch_one(pool)
    .await?)
}

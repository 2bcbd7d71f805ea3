use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::audit::{AccessType, ActionType, Severity};

/// One audited request, ready to persist.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub user_id: Option<Uuid>,
    pub user_email: String,
    pub user_role: String,
    pub action_type: ActionType,
    pub resource_type: String,
    pub resource_id: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub request_method: String,
    pub request_path: String,
    pub request_params: Value,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub changes: Option<Value>,
    pub status_code: u16,
    pub response_time_ms: i64,
    pub severity: Severity,
    pub is_suspicious: bool,
    pub is_success: bool,
    pub error_message: String,
}

#[derive(Debug, Clone)]
pub struct DataAccessRecord {
    pub user_id: Uuid,
    pub access_type: AccessType,
    pub request_path: String,
    pub ip_address: Option<String>,
    pub user_agent: String,
}

/// Destination for audit rows. Postgres in production, memory in tests.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditRecord) -> Result<()>;

    async fn record_access(&self, entry: DataAccessRecord) -> Result<()>;
}

pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, e: AuditRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (user_id, user_email, user_role, action_type, resource_type, resource_id,
                 description, ip_address, user_agent, request_method, request_path,
                 request_params, old_values, new_values, changes, status_code,
                 response_time_ms, severity, is_suspicious, is_success, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21)
            "#,
        )
        .bind(e.user_id)
        .bind(&e.user_email)
        .bind(&e.user_role)
        .bind(e.action_type.as_str())
        .bind(&e.resource_type)
        .bind(&e.resource_id)
        .bind(&e.description)
        .bind(&e.ip_address)
        .bind(&e.user_agent)
        .bind(&e.request_method)
        .bind(&e.request_path)
        .bind(&e.request_params)
        .bind(&e.old_values)
        .bind(&e.new_values)
        .bind(&e.changes)
        .bind(e.status_code as i32)
        .bind(e.response_time_ms)
        .bind(e.severity.as_str())
        .bind(e.is_suspicious)
        .bind(e.is_success)
        .bind(&e.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_access(&self, e: DataAccessRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO data_access_logs (user_id, access_type, request_path, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(e.user_id)
        .bind(e.access_type.as_str())
        .bind(&e.request_path)
        .bind(&e.ip_address)
        .bind(&e.user_agent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemoryAuditSink {
        pub records: Mutex<Vec<AuditRecord>>,
        pub accesses: Mutex<Vec<DataAccessRecord>>,
    }

    #[async_trait]
    impl AuditSink for MemoryAuditSink {
        async fn record(&self, entry: AuditRecord) -> Result<()> {
            self.records.lock().unwrap().push(entry);
            Ok(())
        }

        async fn record_access(&self, entry: DataAccessRecord) -> Result<()> {
            self.accesses.lock().unwrap().push(entry);
            Ok(())
        }
    }

    pub struct FailingAuditSink;

    #[async_trait]
    impl AuditSink for FailingAuditSink {
        async fn record(&self, _entry: AuditRecord) -> Result<()> {
            anyhow::bail!("audit store unavailable")
        }

        async fn record_access(&self, _entry: DataAccessRecord) -> Result<()> {
            anyhow::bail!("audit store unavailable")
        }
    }
}

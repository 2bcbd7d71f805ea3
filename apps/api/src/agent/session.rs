use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::agent::{AgentConversationRow, AgentSessionRow, AgentTask};

/// Number of previous turns replayed to the agent when a session resumes.
pub const RECENT_INTERACTIONS: i64 = 5;

pub struct Interaction<'a> {
    pub session_id: &'a str,
    pub user_id: Option<Uuid>,
    pub task: AgentTask,
    pub prompt: &'a str,
    pub response: &'a str,
    pub context: Option<&'a Value>,
    pub is_mock: bool,
    pub success: bool,
    pub attempts: u32,
    pub latency_ms: i64,
    pub error_message: &'a str,
}

/// Writes the session (if new), the conversation turn and the action row.
pub async fn record_interaction(pool: &PgPool, i: &Interaction<'_>) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    // A session owned by someone else is left untouched and the turn is dropped.
    let owned: Option<String> = sqlx::query_scalar(
        r#"
        INSERT INTO agent_sessions (session_id, user_id, agent_type)
        VALUES ($1, $2, $3)
        ON CONFLICT (session_id) DO UPDATE SET updated_at = now()
            WHERE agent_sessions.user_id IS NOT DISTINCT FROM EXCLUDED.user_id
        RETURNING session_id
        "#,
    )
    .bind(i.session_id)
    .bind(i.user_id)
    .bind(i.task.agent_type().as_str())
    .fetch_optional(&mut *tx)
    .await?;
    if owned.is_none() {
        return Err(sqlx::Error::RowNotFound);
    }

    sqlx::query(
        r#"
        INSERT INTO agent_conversations (session_id, prompt, response, context, is_mock)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(i.session_id)
    .bind(i.prompt)
    .bind(i.response)
    .bind(i.context)
    .bind(i.is_mock)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO agent_actions
            (session_id, task, attempts, is_mock, success, latency_ms, error_message)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(i.session_id)
    .bind(i.task.as_str())
    .bind(i.attempts as i32)
    .bind(i.is_mock)
    .bind(i.success)
    .bind(i.latency_ms)
    .bind(i.error_message)
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

/// Most recent turns, oldest first, shaped for prompt context.
pub async fn recent_interactions(pool: &PgPool, session_id: &str) -> Result<Value, sqlx::Error> {
    let mut rows = sqlx::query_as::<_, AgentConversationRow>(
        r#"
        SELECT * FROM agent_conversations
        WHERE session_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(session_id)
    .bind(RECENT_INTERACTIONS)
    .fetch_all(pool)
    .await?;
    rows.reverse();

    Ok(Value::Array(
        rows.into_iter()
            .map(|r| {
                json!({
                    "user_input": r.prompt,
                    "agent_response": r.response,
                    "timestamp": r.created_at,
                })
            })
            .collect(),
    ))
}

pub async fn find_session(
    pool: &PgPool,
    session_id: &str,
) -> Result<Option<AgentSessionRow>, sqlx::Error> {
    sqlx::query_as::<_, AgentSessionRow>("SELECT * FROM agent_sessions WHERE session_id = $1")
        .bind(session_id)
        .fetch_optional(pool)
        .await
}

pub async fn get_session(pool: &PgPool, session_id: &str) -> Result<AgentSessionRow, AppError> {
    find_session(pool, session_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Agent session {session_id}")))
}

pub async fn list_conversations(
    pool: &PgPool,
    session_id: &str,
) -> Result<Vec<AgentConversationRow>, AppError> {
    Ok(sqlx::query_as::<_, AgentConversationRow>(
        "SELECT * FROM agent_conversations WHERE session_id = $1 ORDER BY created_at",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?)
}

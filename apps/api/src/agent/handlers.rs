use axum::{
    extract::State,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::services::{self, AgentTaskResponse};
use crate::agent::session;
use crate::auth::permissions::ensure;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::{AppJson, AppPath};
use crate::models::agent::{AgentConversationRow, AgentSessionRow};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConciergeRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// POST /api/agents/concierge
/// Anonymous callers are allowed but always start a fresh session.
pub async fn handle_concierge(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    AppJson(req): AppJson<ConciergeRequest>,
) -> Result<Json<AgentTaskResponse>, AppError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("query is required".to_string()));
    }
    let context = req.context.filter(|c| !c.is_null());
    let reply = services::concierge(
        &state,
        user.as_ref().map(AuthUser::id),
        query,
        context,
        req.session_id,
    )
    .await;
    Ok(Json(reply))
}

#[derive(Serialize)]
pub struct SessionHistoryResponse {
    pub session: AgentSessionRow,
    pub conversations: Vec<AgentConversationRow>,
}

/// GET /api/agents/sessions/:session_id
pub async fn handle_get_session(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(session_id): AppPath<String>,
) -> Result<Json<SessionHistoryResponse>, AppError> {
    let agent_session = session::get_session(&state.db, &session_id).await?;
    ensure(
        user.is_admin() || agent_session.user_id == Some(user.id()),
        "You can only read your own agent sessions",
    )?;
    let conversations = session::list_conversations(&state.db, &session_id).await?;
    Ok(Json(SessionHistoryResponse {
        session: agent_session,
        conversations,
    }))
}

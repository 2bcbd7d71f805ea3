//! Task-level agent calls used by the HTTP handlers.
//!
//! Every call goes through `run`, which picks or resumes a session, replays
//! recent turns, invokes the gateway and records the interaction.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::agent::parse::{parse_structured, unwrap_result_field};
use crate::agent::prompts::{self, QuestionSpec};
use crate::agent::session::{self, Interaction};
use crate::agent::{new_session_id, AgentReply};
use crate::models::agent::AgentTask;
use crate::state::AppState;

/// JSON body returned by every agent-backed endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AgentTaskResponse {
    pub message: String,
    pub result: Value,
    pub session_id: String,
    pub is_mock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl AgentTaskResponse {
    pub fn new(message: &str, result: Value, reply: AgentReply) -> Self {
        Self {
            message: message.to_string(),
            result,
            session_id: reply.session_id,
            is_mock: reply.is_mock,
            fallback_reason: reply.fallback_reason,
        }
    }

    pub fn text(message: &str, reply: AgentReply) -> Self {
        let result = Value::String(reply.completion.clone());
        Self::new(message, result, reply)
    }
}

/// Inserts `recent_interactions` into the context object.
fn merge_history(context: Option<Value>, history: Value) -> Option<Value> {
    if history.as_array().map_or(true, |h| h.is_empty()) {
        return context;
    }
    let mut map = match context {
        Some(Value::Object(map)) => map,
        Some(other) => {
            let mut map = Map::new();
            map.insert("context".to_string(), other);
            map
        }
        None => Map::new(),
    };
    map.insert("recent_interactions".to_string(), history);
    Some(Value::Object(map))
}

/// What a caller may do with a session id they supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionUse {
    /// Their own session: history is replayed and the turn appended.
    Resume,
    /// Unknown id: it becomes theirs.
    Claim,
    /// Someone else's session, or an anonymous caller: a fresh id is used.
    Refuse,
}

/// `existing_owner` is `None` when no session has that id yet.
fn session_use(caller: Option<Uuid>, existing_owner: Option<Option<Uuid>>) -> SessionUse {
    match (caller, existing_owner) {
        (None, _) => SessionUse::Refuse,
        (Some(_), None) => SessionUse::Claim,
        (Some(caller), Some(Some(owner))) if caller == owner => SessionUse::Resume,
        (Some(_), Some(_)) => SessionUse::Refuse,
    }
}

async fn pick_session(
    state: &AppState,
    user_id: Option<Uuid>,
    task: AgentTask,
    requested: Option<String>,
) -> (String, bool) {
    let fresh = || {
        let owner = user_id.map_or_else(|| "anonymous".to_string(), |id| id.to_string());
        new_session_id(&owner, task.agent_type())
    };
    let Some(requested) = requested.filter(|s| !s.trim().is_empty()) else {
        return (fresh(), false);
    };
    let existing_owner = if user_id.is_some() {
        match session::find_session(&state.db, &requested).await {
            Ok(found) => found.map(|s| s.user_id),
            Err(e) => {
                warn!("Could not load agent session {requested}: {e}");
                return (fresh(), false);
            }
        }
    } else {
        None
    };
    match session_use(user_id, existing_owner) {
        SessionUse::Resume => (requested, true),
        SessionUse::Claim => (requested, false),
        SessionUse::Refuse => {
            warn!("Ignoring agent session {requested} not owned by the caller");
            (fresh(), false)
        }
    }
}

pub async fn run(
    state: &AppState,
    user_id: Option<Uuid>,
    task: AgentTask,
    prompt: &str,
    context: Option<Value>,
    session_id: Option<String>,
) -> AgentReply {
    let (session_id, resumed) = pick_session(state, user_id, task, session_id).await;

    let context = if resumed {
        match session::recent_interactions(&state.db, &session_id).await {
            Ok(history) => merge_history(context, history),
            Err(e) => {
                warn!("Could not load agent history for {session_id}: {e}");
                context
            }
        }
    } else {
        context
    };

    let full_prompt = prompts::with_context(prompt, context.as_ref());
    let reply = state.agent.invoke(task, &full_prompt, &session_id).await;

    let interaction = Interaction {
        session_id: &reply.session_id,
        user_id,
        task,
        prompt,
        response: &reply.completion,
        context: context.as_ref(),
        is_mock: reply.is_mock,
        success: reply.fallback_reason.is_none(),
        attempts: reply.attempts,
        latency_ms: reply.latency_ms,
        error_message: reply.fallback_reason.as_deref().unwrap_or(""),
    };
    if let Err(e) = session::record_interaction(&state.db, &interaction).await {
        warn!("Failed to record agent interaction for {}: {e}", reply.session_id);
    }

    reply
}

pub async fn parse_skills(state: &AppState, user_id: Uuid, resume_text: &str) -> AgentTaskResponse {
    let reply = run(
        state,
        Some(user_id),
        AgentTask::ParseSkills,
        &prompts::parse_skills(resume_text),
        None,
        None,
    )
    .await;
    AgentTaskResponse::text("Skill analysis complete", reply)
}

pub async fn career_advice(
    state: &AppState,
    user_id: Uuid,
    question: &str,
    career_history: Value,
) -> AgentTaskResponse {
    let has_history = career_history.as_array().is_some_and(|h| !h.is_empty());
    let context = has_history.then(|| json!({ "career_history": career_history }));
    let reply = run(
        state,
        Some(user_id),
        AgentTask::CareerAdvice,
        &prompts::career_advice(question),
        context,
        None,
    )
    .await;
    AgentTaskResponse::text("Career advice generated", reply)
}

pub async fn match_jobs(
    state: &AppState,
    user_id: Uuid,
    candidate_profile: Value,
    jobs: Value,
) -> AgentTaskResponse {
    let context = json!({ "candidate": candidate_profile, "jobs": jobs });
    let reply = run(
        state,
        Some(user_id),
        AgentTask::MatchJobs,
        &prompts::match_jobs(),
        Some(context),
        None,
    )
    .await;
    let data = parse_structured(&reply.completion);
    AgentTaskResponse::new("Job matching complete", data, reply)
}

pub async fn generate_questions(
    state: &AppState,
    user_id: Uuid,
    spec: &QuestionSpec<'_>,
    job_context: Value,
    session_id: Option<String>,
) -> AgentTaskResponse {
    let reply = run(
        state,
        Some(user_id),
        AgentTask::GenerateQuestions,
        &prompts::generate_questions(spec),
        Some(job_context),
        session_id,
    )
    .await;
    let questions = parse_structured(&reply.completion);
    AgentTaskResponse::new("Interview questions generated", questions, reply)
}

pub async fn evaluate_answer(
    state: &AppState,
    user_id: Uuid,
    question: &str,
    answer: &str,
    job_context: Value,
) -> AgentTaskResponse {
    let reply = run(
        state,
        Some(user_id),
        AgentTask::EvaluateAnswer,
        &prompts::evaluate_answer(question, answer),
        Some(job_context),
        None,
    )
    .await;
    AgentTaskResponse::text("Answer evaluated", reply)
}

/// Returns the raw reply; callers store the completion as interview feedback.
pub async fn evaluate_session(
    state: &AppState,
    user_id: Uuid,
    session_id: String,
    qa_text: &str,
    job_title: &str,
) -> AgentReply {
    run(
        state,
        Some(user_id),
        AgentTask::EvaluateSession,
        &prompts::evaluate_session(job_title, qa_text),
        None,
        Some(session_id),
    )
    .await
}

pub async fn concierge(
    state: &AppState,
    user_id: Option<Uuid>,
    query: &str,
    candidate_info: Option<Value>,
    session_id: Option<String>,
) -> AgentTaskResponse {
    let mut reply = run(
        state,
        user_id,
        AgentTask::Concierge,
        &prompts::concierge(query),
        candidate_info,
        session_id,
    )
    .await;
    reply.completion = unwrap_result_field(&reply.completion);
    AgentTaskResponse::text("Concierge reply", reply)
}

/// Formats question/answer pairs as `Qn: ...\nAn: ...` blocks.
pub fn format_qa(questions: &[Value], answers: &Map<String, Value>) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let text = q
                .get("question_text")
                .and_then(Value::as_str)
                .or_else(|| q.as_str())
                .unwrap_or("");
            let answer = match answers.get(&i.to_string()) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            format!("Q{n}: {text}\nA{n}: {answer}", n = i + 1)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_resume_only_for_their_owner() {
        let me = Uuid::new_v4();
        let someone_else = Uuid::new_v4();
        assert_eq!(session_use(Some(me), Some(Some(me))), SessionUse::Resume);
        assert_eq!(session_use(Some(me), None), SessionUse::Claim);
        assert_eq!(session_use(Some(me), Some(Some(someone_else))), SessionUse::Refuse);
        assert_eq!(session_use(Some(me), Some(None)), SessionUse::Refuse);
    }

    #[test]
    fn test_anonymous_callers_never_reuse_a_session() {
        let owner = Uuid::new_v4();
        assert_eq!(session_use(None, Some(Some(owner))), SessionUse::Refuse);
        assert_eq!(session_use(None, Some(None)), SessionUse::Refuse);
        assert_eq!(session_use(None, None), SessionUse::Refuse);
    }

    #[test]
    fn test_format_qa_pairs_by_index() {
        let questions = vec![
            json!({"question_text": "Why Rust?"}),
            json!({"question_text": "Tell us about a failure."}),
            json!("Plain string question"),
        ];
        let answers = json!({"0": "Safety", "2": 42}).as_object().unwrap().clone();
        let qa = format_qa(&questions, &answers);
        assert_eq!(
            qa,
            "Q1: Why Rust?\nA1: Safety\n\nQ2: Tell us about a failure.\nA2: \n\nQ3: Plain string question\nA3: 42"
        );
    }

    #[test]
    fn test_history_merges_into_context() {
        let history = json!([{"user_input": "hi", "agent_response": "hello"}]);
        let merged = merge_history(Some(json!({"title": "Engineer"})), history.clone()).unwrap();
        assert_eq!(merged["title"], "Engineer");
        assert_eq!(merged["recent_interactions"], history);

        let wrapped = merge_history(Some(json!("free text")), history.clone()).unwrap();
        assert_eq!(wrapped["context"], "free text");

        assert_eq!(merge_history(None, json!([])), None);
    }

    #[test]
    fn test_task_response_carries_mock_flag() {
        let reply = AgentReply {
            completion: "[MOCK] Processed: hi".to_string(),
            session_id: "u-concierge-0123".to_string(),
            is_mock: true,
            fallback_reason: Some("Agent returned status 503: down".to_string()),
            attempts: 3,
            latency_ms: 12,
        };
        let body = serde_json::to_value(AgentTaskResponse::text("ok", reply)).unwrap();
        assert_eq!(body["is_mock"], true);
        assert_eq!(body["result"], "[MOCK] Processed: hi");
        assert_eq!(body["fallback_reason"], "Agent returned status 503: down");
    }
}

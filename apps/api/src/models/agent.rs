use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::string_enum;

string_enum! {
    /// Which agent persona a session talks to.
    pub enum AgentType {
        Concierge => "concierge",
        SkillParser => "skill_parser",
        JobMatcher => "job_matcher",
        InterviewerCopilot => "interviewer_copilot",
    }
}

string_enum! {
    pub enum AgentTask {
        ParseSkills => "parse_skills",
        CareerAdvice => "career_advice",
        MatchJobs => "match_jobs",
        GenerateQuestions => "generate_questions",
        EvaluateAnswer => "evaluate_answer",
        EvaluateSession => "evaluate_session",
        Concierge => "concierge",
    }
}

impl AgentTask {
    pub fn agent_type(&self) -> AgentType {
        match self {
            AgentTask::ParseSkills => AgentType::SkillParser,
            AgentTask::CareerAdvice | AgentTask::Concierge => AgentType::Concierge,
            AgentTask::MatchJobs => AgentType::JobMatcher,
            AgentTask::GenerateQuestions
            | AgentTask::EvaluateAnswer
            | AgentTask::EvaluateSession => AgentType::InterviewerCopilot,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentSessionRow {
    pub id: Uuid,
    pub session_id: String,
    pub user_id: Option<Uuid>,
    pub agent_type: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentConversationRow {
    pub id: Uuid,
    pub session_id: String,
    pub prompt: String,
    pub response: String,
    pub context: Option<Value>,
    pub is_mock: bool,
    pub created_at: DateTime<Utc>,
}

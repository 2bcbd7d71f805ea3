//! Prompt templates per agent task, and the synthetic completions returned in
//! mock mode.

use serde_json::{json, Value};

use crate::models::agent::AgentTask;

pub fn parse_skills(resume_text: &str) -> String {
    format!(
        r#"Extract the skills and experience from the following resume.

[Resume]
{resume_text}

Organise the result as:
1. Technical skills (programming languages, frameworks, databases, cloud)
2. Soft skills (communication, leadership, ...)
3. Experience level (proficiency and years for each skill)
4. Certifications

Also include the result as JSON."#
    )
}

pub fn career_advice(question: &str) -> String {
    format!(
        r#"This is a career consultation from a candidate.

[Question]
{question}

Please provide kind and practical advice."#
    )
}

pub fn concierge(query: &str) -> String {
    format!(
        r#"This is an inquiry from a candidate. Please provide kind and specific advice.

[Inquiry]
{query}"#
    )
}

pub fn match_jobs() -> String {
    r#"You are a recruiting match assistant. Compare the candidate profile with each job
in the context and rate them on:
1. Skill match (0-100)
2. Experience match (0-100)
3. Salary match (0-100)
4. Overall match (0-100)
5. A short reason for the match
6. Any concerns

Respond ONLY with JSON in this shape:
{
  "recommended_jobs": [
    {
      "job_id": "the job's id field",
      "job_title": "title",
      "skill_match": 85,
      "experience_match": 90,
      "salary_match": 80,
      "overall_match": 85,
      "match_reason": "Strong Python and data analysis background",
      "concerns": "Prefers remote work"
    }
  ],
  "summary": "N strong matches found"
}"#
    .to_string()
}

pub struct QuestionSpec<'a> {
    pub job_title: &'a str,
    pub interview_type: &'a str,
    pub difficulty: &'a str,
    pub count: u32,
}

pub fn generate_questions(spec: &QuestionSpec<'_>) -> String {
    let QuestionSpec {
        job_title,
        interview_type,
        difficulty,
        count,
    } = spec;
    format!(
        r#"You are an excellent interviewer. Generate {count} interview questions for a {interview_type} interview for the "{job_title}" position described in the context.

[Requirements]
- Difficulty: {difficulty}
- Number of questions: {count}
- Interview type: {interview_type}

Return ONLY valid JSON, without markdown code fences or any other text:
{{
  "questions": [
    {{
      "id": 1,
      "question_text": "Please tell us about your work experience.",
      "question_type": "{interview_type}",
      "difficulty": "{difficulty}",
      "order": 1,
      "expected_answer": "Specific experience and achievements",
      "evaluation_criteria": "Specificity, logic, communication skills"
    }}
  ]
}}"#
    )
}

pub fn evaluate_answer(question: &str, answer: &str) -> String {
    format!(
        r#"Evaluate the following interview answer.

Question: {question}
Answer: {answer}

Score each from 1 to 10:
1. Completeness
2. Specificity
3. Relevance
4. Communication

Point out strengths and areas to improve."#
    )
}

pub fn evaluate_session(job_title: &str, qa_text: &str) -> String {
    format!(
        r#"The interview for the {job_title} position is complete. Evaluate the questions and answers below as a whole.

[Questions and answers]
{qa_text}

Score each from 1 to 10: technical depth, communication, problem solving, motivation, culture fit.

Respond ONLY with JSON, without markdown code fences:
{{
  "evaluation_report": {{
    "overall_score": 7,
    "strengths": ["..."],
    "areas_for_improvement": ["..."],
    "recommendation": "pass | fail | hold",
    "comment": "Overall feedback"
  }}
}}"#
    )
}

/// Appends caller context as pretty JSON.
pub fn with_context(prompt: &str, context: Option<&Value>) -> String {
    match context {
        Some(ctx) if !ctx.is_null() && ctx.as_object().map_or(true, |m| !m.is_empty()) => {
            let pretty = serde_json::to_string_pretty(ctx).unwrap_or_else(|_| ctx.to_string());
            format!("{prompt}\n\n[Context Information]\n{pretty}")
        }
        _ => prompt.to_string(),
    }
}

/// Deterministic stand-in completion used when no agent back-end is
/// configured or every attempt failed. Structured tasks get JSON in the
/// same shape the real agent is asked for.
pub fn mock_completion(task: AgentTask, prompt: &str) -> String {
    match task {
        AgentTask::GenerateQuestions => json!({
            "questions": [
                {
                    "id": 1,
                    "question_text": "Please tell us about your most relevant work experience.",
                    "question_type": "general",
                    "difficulty": "medium",
                    "order": 1,
                    "expected_answer": "Concrete projects, responsibilities and outcomes",
                    "evaluation_criteria": "Specificity, relevance, communication"
                },
                {
                    "id": 2,
                    "question_text": "Describe a difficult problem you solved and how you approached it.",
                    "question_type": "general",
                    "difficulty": "medium",
                    "order": 2,
                    "expected_answer": "A structured approach with a measurable result",
                    "evaluation_criteria": "Problem solving, logic"
                }
            ]
        })
        .to_string(),
        AgentTask::MatchJobs => json!({
            "recommended_jobs": [],
            "summary": "Job matching is running in mock mode; no recommendations were generated."
        })
        .to_string(),
        AgentTask::EvaluateSession => json!({
            "evaluation_report": {
                "overall_score": 0,
                "strengths": [],
                "areas_for_improvement": [],
                "recommendation": "hold",
                "comment": "Automatic evaluation is unavailable in mock mode."
            }
        })
        .to_string(),
        _ => {
            let preview: String = prompt.trim().chars().take(200).collect();
            format!("[MOCK] Processed: {preview}")
        }
    }
}

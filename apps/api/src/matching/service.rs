use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::scoring::{compute_match, CandidateSkill, JobSkill, MatchBreakdown, MatchInput};
use crate::matching::{SUGGESTION_LIMIT, SUGGESTION_THRESHOLD};
use crate::models::candidate::{CandidateSkillRow, Degree, Proficiency};
use crate::models::job::{ExperienceLevel, JobRow, JobSkillRow, MatchingResultRow, SkillRequirementLevel};
use crate::models::parse_or;

// ────────────────────────────────────────────────────────────────────────────
// Row → scorer input conversion
// ────────────────────────────────────────────────────────────────────────────

pub fn candidate_skill(row: &CandidateSkillRow) -> CandidateSkill {
    CandidateSkill {
        skill_id: row.skill_id,
        name: row.skill_name.clone(),
        proficiency: parse_or(&row.proficiency_level, Proficiency::Beginner),
        years: row.years_of_experience.max(0) as u32,
    }
}

pub fn job_skill(row: &JobSkillRow) -> JobSkill {
    JobSkill {
        skill_id: row.skill_id,
        name: row.skill_name.clone(),
        level: parse_or(&row.requirement_level, SkillRequirementLevel::Required),
        minimum_proficiency: parse_or(&row.minimum_proficiency, Proficiency::Beginner),
        minimum_years: row.minimum_years.max(0) as u32,
        weight: row.weight.max(1) as u32,
    }
}

/// Builds the scorer input. Unknown stored enum values are treated as absent.
pub fn match_input(
    candidate_years: i32,
    job: &JobRow,
    candidate_skills: &[CandidateSkillRow],
    job_skills: &[JobSkillRow],
    degrees: &[String],
) -> MatchInput {
    MatchInput {
        candidate_skills: candidate_skills.iter().map(candidate_skill).collect(),
        job_skills: job_skills.iter().map(job_skill).collect(),
        degrees: degrees.iter().filter_map(|d| d.parse::<Degree>().ok()).collect(),
        candidate_years: u32::try_from(candidate_years).ok(),
        experience_level: job.experience_level.parse::<ExperienceLevel>().ok(),
        minimum_degree: job
            .minimum_degree
            .as_deref()
            .and_then(|d| d.parse::<Degree>().ok()),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Loaders
// ────────────────────────────────────────────────────────────────────────────

const CANDIDATE_SKILL_SELECT: &str = r#"
    SELECT cs.id, cs.candidate_id, cs.skill_id, s.name AS skill_name,
           s.category AS skill_category, cs.proficiency_level, cs.years_of_experience,
           cs.last_used_date, cs.is_primary, cs.notes, cs.created_at, cs.updated_at
    FROM candidate_skills cs
    JOIN skills s ON s.id = cs.skill_id
"#;

async fn skills_for_candidates(
    pool: &PgPool,
    candidate_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<CandidateSkillRow>>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CandidateSkillRow>(&format!(
        "{CANDIDATE_SKILL_SELECT} WHERE cs.candidate_id = ANY($1)"
    ))
    .bind(candidate_ids)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<CandidateSkillRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.candidate_id).or_default().push(row);
    }
    Ok(grouped)
}

#[derive(FromRow)]
struct DegreeRow {
    candidate_id: Uuid,
    degree: String,
}

async fn degrees_for_candidates(
    pool: &PgPool,
    candidate_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<String>>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DegreeRow>(
        "SELECT candidate_id, degree FROM educations WHERE candidate_id = ANY($1)",
    )
    .bind(candidate_ids)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<String>> = HashMap::new();
    for row in rows {
        grouped.entry(row.candidate_id).or_default().push(row.degree);
    }
    Ok(grouped)
}

pub async fn job_skills(pool: &PgPool, job_id: Uuid) -> Result<Vec<JobSkillRow>, sqlx::Error> {
    sqlx::query_as::<_, JobSkillRow>(
        r#"
        SELECT js.id, js.job_id, js.skill_id, s.name AS skill_name, js.requirement_level,
               js.minimum_proficiency, js.minimum_years, js.weight, js.notes,
               js.created_at, js.updated_at
        FROM job_skills js
        JOIN skills s ON s.id = js.skill_id
        WHERE js.job_id = $1
        ORDER BY js.weight DESC, s.name
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
}

/// Scores one candidate against one job.
pub async fn score_candidate(
    pool: &PgPool,
    candidate_id: Uuid,
    candidate_years: i32,
    job: &JobRow,
) -> Result<MatchBreakdown, AppError> {
    let ids = [candidate_id];
    let mut skills = skills_for_candidates(pool, &ids).await?;
    let mut degrees = degrees_for_candidates(pool, &ids).await?;
    let required = job_skills(pool, job.id).await?;

    let input = match_input(
        candidate_years,
        job,
        &skills.remove(&candidate_id).unwrap_or_default(),
        &required,
        &degrees.remove(&candidate_id).unwrap_or_default(),
    );
    Ok(compute_match(&input))
}

// ────────────────────────────────────────────────────────────────────────────
// Suggestions
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, FromRow)]
struct PoolCandidate {
    id: Uuid,
    full_name: String,
    email: String,
    current_position: String,
    years_of_experience: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateMatch {
    pub candidate_id: Uuid,
    pub candidate_name: String,
    pub email: String,
    pub current_position: String,
    pub years_of_experience: i32,
    #[serde(flatten)]
    pub breakdown: MatchBreakdown,
}

/// Keeps matches at or above the threshold, best first, capped at the limit.
pub fn rank_matches(mut matches: Vec<CandidateMatch>) -> Vec<CandidateMatch> {
    matches.retain(|m| m.breakdown.overall >= SUGGESTION_THRESHOLD);
    matches.sort_by(|a, b| b.breakdown.overall.total_cmp(&a.breakdown.overall));
    matches.truncate(SUGGESTION_LIMIT);
    matches
}

/// Active candidates who have not applied to `job`, scored and ranked.
pub async fn matching_candidates(pool: &PgPool, job: &JobRow) -> Result<Vec<CandidateMatch>, AppError> {
    let candidates = sqlx::query_as::<_, PoolCandidate>(
        r#"
        SELECT c.id, TRIM(u.first_name || ' ' || u.last_name) AS full_name, u.email,
               c.current_position, c.years_of_experience
        FROM candidates c
        JOIN users u ON u.id = c.user_id
        WHERE c.status = 'active'
          AND NOT EXISTS (
              SELECT 1 FROM applications a WHERE a.candidate_id = c.id AND a.job_id = $1
          )
        "#,
    )
    .bind(job.id)
    .fetch_all(pool)
    .await?;

    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
    let mut skills = skills_for_candidates(pool, &ids).await?;
    let mut degrees = degrees_for_candidates(pool, &ids).await?;
    let required = job_skills(pool, job.id).await?;

    let matches = candidates
        .into_iter()
        .map(|c| {
            let input = match_input(
                c.years_of_experience,
                job,
                &skills.remove(&c.id).unwrap_or_default(),
                &required,
                &degrees.remove(&c.id).unwrap_or_default(),
            );
            CandidateMatch {
                candidate_id: c.id,
                candidate_name: c.full_name,
                email: c.email,
                current_position: c.current_position,
                years_of_experience: c.years_of_experience,
                breakdown: compute_match(&input),
            }
        })
        .collect();

    Ok(rank_matches(matches))
}

// ────────────────────────────────────────────────────────────────────────────
// Stored results
// ────────────────────────────────────────────────────────────────────────────

pub async fn upsert_matching_result(
    pool: &PgPool,
    job_id: Uuid,
    candidate_id: Uuid,
    breakdown: &MatchBreakdown,
    calculated_by: Uuid,
) -> Result<MatchingResultRow, AppError> {
    let row = sqlx::query_as::<_, MatchingResultRow>(
        r#"
        INSERT INTO matching_results
            (job_id, candidate_id, overall_score, skill_match_score, experience_match_score,
             education_match_score, matched_skills, missing_skills, extra_skills,
             recommendation_level, calculation_method, calculated_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'weighted', $11)
        ON CONFLICT (job_id, candidate_id) DO UPDATE SET
            overall_score          = EXCLUDED.overall_score,
            skill_match_score      = EXCLUDED.skill_match_score,
            experience_match_score = EXCLUDED.experience_match_score,
            education_match_score  = EXCLUDED.education_match_score,
            matched_skills         = EXCLUDED.matched_skills,
            missing_skills         = EXCLUDED.missing_skills,
            extra_skills           = EXCLUDED.extra_skills,
            recommendation_level   = EXCLUDED.recommendation_level,
            calculated_by          = EXCLUDED.calculated_by,
            updated_at             = now()
        RETURNING *
        "#,
    )
    .bind(job_id)
    .bind(candidate_id)
    .bind(breakdown.overall)
    .bind(breakdown.skill)
    .bind(breakdown.experience)
    .bind(breakdown.education)
    .bind(json!(breakdown.matched_skills))
    .bind(json!(breakdown.missing_skills))
    .bind(json!(breakdown.extra_skills))
    .bind(breakdown.recommendation.as_str())
    .bind(calculated_by)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Row filter for `list_matching_results`; `None` fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct ResultScope {
    pub candidate_id: Option<Uuid>,
    pub hiring_manager_id: Option<Uuid>,
    pub min_score: Option<f64>,
}

pub async fn list_matching_results(
    pool: &PgPool,
    scope: &ResultScope,
) -> Result<Vec<MatchingResultRow>, AppError> {
    Ok(sqlx::query_as::<_, MatchingResultRow>(
        r#"
        SELECT mr.* FROM matching_results mr
        JOIN jobs j ON j.id = mr.job_id
        WHERE ($1::uuid IS NULL OR mr.candidate_id = $1)
          AND ($2::uuid IS NULL OR j.hiring_manager_id = $2)
          AND ($3::float8 IS NULL OR mr.overall_score >= $3)
        ORDER BY mr.overall_score DESC, mr.updated_at DESC
        "#,
    )
    .bind(scope.candidate_id)
    .bind(scope.hiring_manager_id)
    .bind(scope.min_score)
    .fetch_all(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::job::RecommendationLevel;

    fn job(level: &str, minimum_degree: Option<&str>) -> JobRow {
        JobRow {
            id: Uuid::new_v4(),
            job_code: "ENG-001".to_string(),
            title: "Backend Engineer".to_string(),
            department: "Engineering".to_string(),
            location: "Tokyo".to_string(),
            remote_work_option: String::new(),
            employment_type: "full_time".to_string(),
            experience_level: level.to_string(),
            minimum_degree: minimum_degree.map(str::to_string),
            description: String::new(),
            responsibilities: String::new(),
            qualifications: String::new(),
            preferred_qualifications: String::new(),
            salary_min: 0,
            salary_max: 0,
            salary_currency: "JPY".to_string(),
            benefits: String::new(),
            number_of_positions: 1,
            deadline: None,
            start_date: None,
            status: "active".to_string(),
            is_featured: false,
            priority: 0,
            hiring_manager_id: None,
            published_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn held(skill_id: Uuid, name: &str, level: &str, years: i32) -> CandidateSkillRow {
        CandidateSkillRow {
            id: Uuid::new_v4(),
            candidate_id: Uuid::new_v4(),
            skill_id,
            skill_name: name.to_string(),
            skill_category: "programming".to_string(),
            proficiency_level: level.to_string(),
            years_of_experience: years,
            last_used_date: None,
            is_primary: false,
            notes: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn wanted(skill_id: Uuid, name: &str, minimum: &str) -> JobSkillRow {
        JobSkillRow {
            id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            skill_id,
            skill_name: name.to_string(),
            requirement_level: "required".to_string(),
            minimum_proficiency: minimum.to_string(),
            minimum_years: 0,
            weight: 1,
            notes: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_rows_convert_into_scorer_input() {
        let python = Uuid::new_v4();
        let input = match_input(
            5,
            &job("mid", Some("bachelor")),
            &[held(python, "Python", "expert", 5)],
            &[wanted(python, "Python", "intermediate")],
            &["master".to_string(), "unknown".to_string()],
        );
        assert_eq!(input.candidate_skills[0].proficiency, Proficiency::Expert);
        assert_eq!(input.job_skills[0].minimum_proficiency, Proficiency::Intermediate);
        assert_eq!(input.degrees, vec![Degree::Master]);
        assert_eq!(input.candidate_years, Some(5));
        assert_eq!(input.experience_level, Some(ExperienceLevel::Mid));
        assert_eq!(input.minimum_degree, Some(Degree::Bachelor));

        let breakdown = compute_match(&input);
        assert_eq!(breakdown.overall, 100.0);
        assert_eq!(breakdown.recommendation, RecommendationLevel::HighlyRecommended);
    }

    #[test]
    fn test_unknown_stored_values_are_lenient() {
        let input = match_input(-1, &job("principal", None), &[], &[], &[]);
        assert_eq!(input.candidate_years, None);
        assert_eq!(input.experience_level, None);
        assert_eq!(input.minimum_degree, None);
    }

    fn scored(overall: f64) -> CandidateMatch {
        CandidateMatch {
            candidate_id: Uuid::new_v4(),
            candidate_name: "Test".to_string(),
            email: "t@example.com".to_string(),
            current_position: String::new(),
            years_of_experience: 0,
            breakdown: MatchBreakdown {
                overall,
                skill: 0.0,
                experience: 0.0,
                education: 0.0,
                matched_skills: vec![],
                missing_skills: vec![],
                extra_skills: vec![],
                recommendation: crate::matching::scoring::recommendation_for(overall),
            },
        }
    }

    #[test]
    fn test_rank_filters_sorts_and_caps() {
        let mut pool: Vec<CandidateMatch> = (0..30).map(|i| scored(50.0 + i as f64)).collect();
        pool.push(scored(49.99));
        pool.push(scored(10.0));

        let ranked = rank_matches(pool);
        assert_eq!(ranked.len(), SUGGESTION_LIMIT);
        assert_eq!(ranked[0].breakdown.overall, 79.0);
        assert!(ranked
            .windows(2)
            .all(|w| w[0].breakdown.overall >= w[1].breakdown.overall));
        assert!(ranked.iter().all(|m| m.breakdown.overall >= SUGGESTION_THRESHOLD));
    }

    #[test]
    fn test_candidate_match_flattens_breakdown() {
        let body = serde_json::to_value(scored(72.5)).unwrap();
        assert_eq!(body["overall"], 72.5);
        assert_eq!(body["recommendation"], "recommended");
        assert!(body.get("breakdown").is_none());
    }
}

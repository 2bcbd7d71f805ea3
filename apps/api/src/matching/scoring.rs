//! Candidate ↔ job matching score.
//!
//! Pure and deterministic: callers load rows, convert them into the input
//! structs below and get a `MatchBreakdown` back. Nothing here touches the
//! database or the clock.
//!
//! overall = 0.5 · skill + 0.3 · experience + 0.2 · education

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::candidate::{Degree, Proficiency};
use crate::models::job::{ExperienceLevel, RecommendationLevel, SkillRequirementLevel};

pub const SKILL_WEIGHT: f64 = 0.5;
pub const EXPERIENCE_WEIGHT: f64 = 0.3;
pub const EDUCATION_WEIGHT: f64 = 0.2;

/// Skill component reported for a job that lists no skills.
pub const NO_SKILLS_DEFAULT: f64 = 0.0;

/// Experience score for candidates above the band's upper bound.
const OVERQUALIFIED_SCORE: f64 = 80.0;
/// Points lost per year below the band's lower bound.
const SHORTFALL_PENALTY_PER_YEAR: f64 = 25.0;

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CandidateSkill {
    pub skill_id: Uuid,
    pub name: String,
    pub proficiency: Proficiency,
    pub years: u32,
}

#[derive(Debug, Clone)]
pub struct JobSkill {
    pub skill_id: Uuid,
    pub name: String,
    pub level: SkillRequirementLevel,
    pub minimum_proficiency: Proficiency,
    pub minimum_years: u32,
    pub weight: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MatchInput {
    pub candidate_skills: Vec<CandidateSkill>,
    pub job_skills: Vec<JobSkill>,
    pub degrees: Vec<Degree>,
    pub candidate_years: Option<u32>,
    pub experience_level: Option<ExperienceLevel>,
    pub minimum_degree: Option<Degree>,
}

// ────────────────────────────────────────────────────────────────────────────
// Output
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchBreakdown {
    pub overall: f64,
    pub skill: f64,
    pub experience: f64,
    pub education: f64,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub extra_skills: Vec<String>,
    pub recommendation: RecommendationLevel,
}

pub fn recommendation_for(overall: f64) -> RecommendationLevel {
    if overall >= 80.0 {
        RecommendationLevel::HighlyRecommended
    } else if overall >= 65.0 {
        RecommendationLevel::Recommended
    } else if overall >= 50.0 {
        RecommendationLevel::Consider
    } else {
        RecommendationLevel::NotRecommended
    }
}

pub fn compute_match(input: &MatchInput) -> MatchBreakdown {
    let skill = skill_score(&input.candidate_skills, &input.job_skills);
    let experience = experience_score(input.candidate_years, input.experience_level);
    let education = education_score(&input.degrees, input.minimum_degree);

    let overall = (SKILL_WEIGHT * skill + EXPERIENCE_WEIGHT * experience + EDUCATION_WEIGHT * education)
        .clamp(0.0, 100.0);

    let job_ids: HashSet<Uuid> = input.job_skills.iter().map(|s| s.skill_id).collect();
    let held: HashSet<Uuid> = input.candidate_skills.iter().map(|s| s.skill_id).collect();

    let (matched, missing): (Vec<&JobSkill>, Vec<&JobSkill>) = input
        .job_skills
        .iter()
        .partition(|s| held.contains(&s.skill_id));

    let extra_skills = input
        .candidate_skills
        .iter()
        .filter(|s| !job_ids.contains(&s.skill_id))
        .map(|s| s.name.clone())
        .collect();

    let overall = round2(overall);
    MatchBreakdown {
        overall,
        skill: round2(skill),
        experience: round2(experience),
        education: round2(education),
        matched_skills: matched.into_iter().map(|s| s.name.clone()).collect(),
        missing_skills: missing.into_iter().map(|s| s.name.clone()).collect(),
        extra_skills,
        recommendation: recommendation_for(overall),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Components
// ────────────────────────────────────────────────────────────────────────────

fn effective_weight(skill: &JobSkill) -> f64 {
    let factor = match skill.level {
        SkillRequirementLevel::Required => 1.0,
        SkillRequirementLevel::Preferred => 0.5,
    };
    skill.weight as f64 * factor
}

/// Credit in [0, 1] for one job skill given what the candidate holds.
fn skill_credit(held: Option<&CandidateSkill>, wanted: &JobSkill) -> f64 {
    let Some(held) = held else {
        return 0.0;
    };
    let mut credit =
        (held.proficiency.rank() as f64 / wanted.minimum_proficiency.rank() as f64).min(1.0);
    if wanted.minimum_years > 0 && held.years < wanted.minimum_years {
        credit *= 0.5 + 0.5 * held.years as f64 / wanted.minimum_years as f64;
    }
    credit
}

pub fn skill_score(candidate: &[CandidateSkill], job: &[JobSkill]) -> f64 {
    let mut total_weight = 0.0;
    let mut earned = 0.0;

    for wanted in job {
        let w = effective_weight(wanted);
        let held = candidate.iter().find(|c| c.skill_id == wanted.skill_id);
        total_weight += w;
        earned += w * skill_credit(held, wanted);
    }

    if total_weight <= 0.0 {
        return NO_SKILLS_DEFAULT;
    }
    100.0 * earned / total_weight
}

pub fn experience_score(years: Option<u32>, level: Option<ExperienceLevel>) -> f64 {
    let (Some(years), Some(level)) = (years, level) else {
        return 0.0;
    };
    let (low, high) = level.years_band();
    if years < low {
        let gap = (low - years) as f64;
        return (100.0 - SHORTFALL_PENALTY_PER_YEAR * gap).max(0.0);
    }
    match high {
        Some(high) if years > high => OVERQUALIFIED_SCORE,
        _ => 100.0,
    }
}

pub fn education_score(degrees: &[Degree], minimum: Option<Degree>) -> f64 {
    let Some(highest) = degrees.iter().map(Degree::rank).max() else {
        return 0.0;
    };
    match minimum {
        None => 100.0,
        Some(min) => 100.0 * (highest as f64 / min.rank() as f64).min(1.0),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(id: Uuid, name: &str, proficiency: Proficiency, years: u32) -> CandidateSkill {
        CandidateSkill {
            skill_id: id,
            name: name.to_string(),
            proficiency,
            years,
        }
    }

    fn wanted(id: Uuid, name: &str, minimum: Proficiency, years: u32, weight: u32) -> JobSkill {
        JobSkill {
            skill_id: id,
            name: name.to_string(),
            level: SkillRequirementLevel::Required,
            minimum_proficiency: minimum,
            minimum_years: years,
            weight,
        }
    }

    #[test]
    fn test_expert_python_against_intermediate_requirement() {
        let python = Uuid::new_v4();
        let input = MatchInput {
            candidate_skills: vec![held(python, "Python", Proficiency::Expert, 5)],
            job_skills: vec![wanted(python, "Python", Proficiency::Intermediate, 0, 1)],
            ..Default::default()
        };
        let result = compute_match(&input);
        assert_eq!(result.skill, 100.0);
        assert_eq!(result.experience, 0.0);
        assert_eq!(result.education, 0.0);
        assert_eq!(result.overall, 50.0);
        assert_eq!(result.matched_skills, vec!["Python".to_string()]);
        assert_eq!(result.recommendation, RecommendationLevel::Consider);
    }

    #[test]
    fn test_job_without_skills_uses_default() {
        let input = MatchInput {
            candidate_skills: vec![held(Uuid::new_v4(), "Go", Proficiency::Advanced, 3)],
            candidate_years: Some(4),
            experience_level: Some(ExperienceLevel::Mid),
            degrees: vec![Degree::Bachelor],
            ..Default::default()
        };
        let result = compute_match(&input);
        assert_eq!(result.skill, NO_SKILLS_DEFAULT);
        assert_eq!(result.overall, 50.0);
        assert_eq!(result.extra_skills, vec!["Go".to_string()]);
    }

    #[test]
    fn test_more_matched_required_skills_never_lowers_score() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let job_skills: Vec<JobSkill> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| wanted(*id, &format!("s{i}"), Proficiency::Advanced, 2, i as u32 + 1))
            .collect();

        let mut previous = -1.0;
        for n in 0..=ids.len() {
            let input = MatchInput {
                candidate_skills: ids[..n]
                    .iter()
                    .map(|id| held(*id, "x", Proficiency::Intermediate, 1))
                    .collect(),
                job_skills: job_skills.clone(),
                ..Default::default()
            };
            let overall = compute_match(&input).overall;
            assert!(overall >= previous, "{n} matched: {overall} < {previous}");
            previous = overall;
        }
    }

    #[test]
    fn test_preferred_skill_counts_half() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut preferred = wanted(b, "Docker", Proficiency::Beginner, 0, 2);
        preferred.level = SkillRequirementLevel::Preferred;
        let job = vec![wanted(a, "Rust", Proficiency::Beginner, 0, 1), preferred];

        // Only the preferred skill held: 1 / (1 + 1)
        let score = skill_score(&[held(b, "Docker", Proficiency::Expert, 9)], &job);
        assert!((score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_years_shortfall_scales_credit() {
        let id = Uuid::new_v4();
        let job = vec![wanted(id, "SQL", Proficiency::Beginner, 4, 1)];
        let score = skill_score(&[held(id, "SQL", Proficiency::Beginner, 2)], &job);
        assert!((score - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_lower_proficiency_gets_partial_credit() {
        let id = Uuid::new_v4();
        let job = vec![wanted(id, "K8s", Proficiency::Expert, 0, 1)];
        let score = skill_score(&[held(id, "K8s", Proficiency::Intermediate, 3)], &job);
        assert!((score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_experience_bands() {
        assert_eq!(experience_score(Some(5), Some(ExperienceLevel::Mid)), 100.0);
        assert_eq!(experience_score(Some(1), Some(ExperienceLevel::Mid)), 50.0);
        assert_eq!(experience_score(Some(0), Some(ExperienceLevel::Lead)), 0.0);
        assert_eq!(experience_score(Some(9), Some(ExperienceLevel::Junior)), 80.0);
        assert_eq!(experience_score(Some(30), Some(ExperienceLevel::Senior)), 100.0);
        assert_eq!(experience_score(None, Some(ExperienceLevel::Mid)), 0.0);
        assert_eq!(experience_score(Some(3), None), 0.0);
    }

    #[test]
    fn test_education_uses_highest_degree() {
        assert_eq!(education_score(&[], Some(Degree::Bachelor)), 0.0);
        assert_eq!(education_score(&[Degree::HighSchool], None), 100.0);
        assert_eq!(
            education_score(&[Degree::HighSchool, Degree::Master], Some(Degree::Bachelor)),
            100.0
        );
        assert!((education_score(&[Degree::Associate], Some(Degree::Master)) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_recommendation_thresholds() {
        assert_eq!(recommendation_for(80.0), RecommendationLevel::HighlyRecommended);
        assert_eq!(recommendation_for(79.99), RecommendationLevel::Recommended);
        assert_eq!(recommendation_for(65.0), RecommendationLevel::Recommended);
        assert_eq!(recommendation_for(50.0), RecommendationLevel::Consider);
        assert_eq!(recommendation_for(49.9), RecommendationLevel::NotRecommended);
    }

    #[test]
    fn test_missing_skills_listed() {
        let a = Uuid::new_v4();
        let input = MatchInput {
            job_skills: vec![wanted(a, "Terraform", Proficiency::Beginner, 0, 3)],
            ..Default::default()
        };
        let result = compute_match(&input);
        assert_eq!(result.missing_skills, vec!["Terraform".to_string()]);
        assert!(result.matched_skills.is_empty());
        assert_eq!(result.overall, 0.0);
    }
}

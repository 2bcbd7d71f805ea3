//! Candidate ↔ job matching: the pure scorer plus the loaders and endpoints
//! that feed it from the database.

pub mod handlers;
pub mod scoring;
pub mod service;

/// Candidates scoring below this are left out of job suggestions.
pub const SUGGESTION_THRESHOLD: f64 = 50.0;
/// Maximum number of suggested candidates per job.
pub const SUGGESTION_LIMIT: usize = 20;

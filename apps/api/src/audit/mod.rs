//! Request auditing.
//!
//! `middleware::audit_requests` writes one `audit_logs` row per request.
//! Handlers that change a resource return an `AuditChange` as a response part
//! so the row carries the before/after state and a per-field diff.

pub mod classify;
pub mod handlers;
pub mod middleware;
pub mod sink;
pub mod store;

use axum::http::StatusCode;
use axum::response::{IntoResponseParts, ResponseParts};
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;

#[derive(Debug, Clone, PartialEq)]
pub struct AuditChange {
    pub resource_type: String,
    pub resource_id: String,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
}

impl AuditChange {
    pub fn created(resource_type: &str, id: impl ToString, new: &impl Serialize) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            resource_id: id.to_string(),
            old_values: None,
            new_values: serde_json::to_value(new).ok(),
        }
    }

    pub fn updated(
        resource_type: &str,
        id: impl ToString,
        old: &impl Serialize,
        new: &impl Serialize,
    ) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            resource_id: id.to_string(),
            old_values: serde_json::to_value(old).ok(),
            new_values: serde_json::to_value(new).ok(),
        }
    }

    pub fn deleted(resource_type: &str, id: impl ToString, old: &impl Serialize) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            resource_id: id.to_string(),
            old_values: serde_json::to_value(old).ok(),
            new_values: None,
        }
    }
}

/// Empty 204 carrying the removed resource's last state.
pub type Deleted = (StatusCode, AuditChange, ());

pub fn deleted(resource_type: &str, id: impl ToString, old: &impl Serialize) -> Deleted {
    (
        StatusCode::NO_CONTENT,
        AuditChange::deleted(resource_type, id, old),
        (),
    )
}

impl IntoResponseParts for AuditChange {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        res.extensions_mut().insert(self);
        Ok(res)
    }
}

//! Pure helpers that turn a request/response pair into audit fields.

use std::net::SocketAddr;

use axum::http::{HeaderMap, Method};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::audit::{AccessType, ActionType, Severity};
use crate::models::user::Role;

pub const REDACTED: &str = "***REDACTED***";
pub const MAX_TEXT_LEN: usize = 500;

const EXCLUDED_PREFIXES: &[&str] = &["/static/", "/media/", "/favicon.ico", "/health"];
const SENSITIVE_KEYS: &[&str] = &["password", "token", "secret", "api_key", "credit_card"];
const PERSONAL_DATA_PREFIXES: &[&str] = &["/api/candidates/"];

pub fn is_excluded(method: &Method, path: &str) -> bool {
    method == Method::OPTIONS || EXCLUDED_PREFIXES.iter().any(|p| path.starts_with(p))
}

pub fn is_personal_data_path(path: &str) -> bool {
    PERSONAL_DATA_PREFIXES.iter().any(|p| path.starts_with(p))
}

pub fn action_type(method: &Method, path: &str) -> ActionType {
    let path = path.to_ascii_lowercase();
    if path.contains("login") {
        return ActionType::Login;
    }
    if path.contains("logout") {
        return ActionType::Logout;
    }
    if path.contains("export") {
        return ActionType::Export;
    }
    if path.contains("download") {
        return ActionType::Download;
    }
    match *method {
        Method::POST => ActionType::Create,
        Method::PUT | Method::PATCH => ActionType::Update,
        Method::DELETE => ActionType::Delete,
        _ => ActionType::Read,
    }
}

pub fn access_type(path: &str) -> AccessType {
    let path = path.to_ascii_lowercase();
    if path.contains("export") {
        AccessType::Export
    } else if path.contains("download") {
        AccessType::Download
    } else {
        AccessType::View
    }
}

/// `(resource_type, resource_id)` from `/api/<...>/<type>/<uuid>/...`.
///
/// The resource type is the segment just before the first UUID; without a
/// UUID it is the second segment under `/api/` (or the first when alone).
pub fn resource_info(path: &str) -> (String, String) {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    match parts.as_slice() {
        [] => ("root".to_string(), String::new()),
        ["api", rest @ ..] if !rest.is_empty() => {
            if let Some(i) = rest.iter().position(|p| Uuid::parse_str(p).is_ok()) {
                if i > 0 {
                    return (rest[i - 1].to_string(), rest[i].to_string());
                }
            }
            let kind = rest.get(1).unwrap_or(&rest[0]);
            (kind.to_string(), String::new())
        }
        [first, ..] => (first.to_string(), String::new()),
    }
}

pub fn severity(method: &Method, path: &str, status: u16, role: Option<Role>) -> Severity {
    if status >= 500 {
        return Severity::Critical;
    }
    if status >= 400 {
        return Severity::Medium;
    }
    let is_write = matches!(*method, Method::POST | Method::DELETE);
    let lowered = path.to_ascii_lowercase();
    if is_write && (role == Some(Role::Admin) || lowered.contains("admin")) {
        return Severity::High;
    }
    if lowered.contains("export") || lowered.contains("download") {
        return Severity::High;
    }
    Severity::Low
}

pub fn is_suspicious(path: &str, status: u16) -> bool {
    (path.to_ascii_lowercase().contains("login") && status >= 400) || status == 401 || status == 403
}

pub fn is_success(status: u16) -> bool {
    (200..400).contains(&status)
}

/// First hop of `X-Forwarded-For`, else the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// Truncates on a char boundary.
pub fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|s| key.contains(s))
}

/// Replaces the value of every sensitive key, at any depth.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if is_sensitive_key(k) {
                        Value::String(REDACTED.to_string())
                    } else {
                        sanitize(v)
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        other => other.clone(),
    }
}

/// `{field: {old, new}}` for every top-level field whose value changed.
pub fn field_diff(old: Option<&Value>, new: Option<&Value>) -> Option<Value> {
    let empty = Map::new();
    let old_map = old.and_then(Value::as_object).unwrap_or(&empty);
    let new_map = new.and_then(Value::as_object).unwrap_or(&empty);
    if old_map.is_empty() && new_map.is_empty() {
        return None;
    }

    let mut diff = Map::new();
    for (key, new_value) in new_map {
        let old_value = old_map.get(key).unwrap_or(&Value::Null);
        if old_value != new_value {
            diff.insert(key.clone(), serde_json::json!({ "old": old_value, "new": new_value }));
        }
    }
    for (key, old_value) in old_map {
        if !new_map.contains_key(key) {
            diff.insert(key.clone(), serde_json::json!({ "old": old_value, "new": null }));
        }
    }
    Some(Value::Object(diff))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exclusions() {
        assert!(is_excluded(&Method::OPTIONS, "/api/jobs/"));
        assert!(is_excluded(&Method::GET, "/static/app.css"));
        assert!(is_excluded(&Method::GET, "/health"));
        assert!(is_excluded(&Method::GET, "/favicon.ico"));
        assert!(!is_excluded(&Method::GET, "/api/jobs/"));
    }

    #[test]
    fn test_action_type_prefers_path_keywords() {
        assert_eq!(action_type(&Method::POST, "/api/auth/login"), ActionType::Login);
        assert_eq!(action_type(&Method::POST, "/api/auth/logout"), ActionType::Logout);
        assert_eq!(action_type(&Method::GET, "/api/reports/export"), ActionType::Export);
        assert_eq!(action_type(&Method::POST, "/api/jobs/"), ActionType::Create);
        assert_eq!(action_type(&Method::PATCH, "/api/jobs/x"), ActionType::Update);
        assert_eq!(action_type(&Method::PUT, "/api/jobs/x"), ActionType::Update);
        assert_eq!(action_type(&Method::DELETE, "/api/jobs/x"), ActionType::Delete);
        assert_eq!(action_type(&Method::GET, "/api/jobs/"), ActionType::Read);
    }

    #[test]
    fn test_resource_info() {
        let id = Uuid::new_v4().to_string();
        assert_eq!(
            resource_info(&format!("/api/jobs/{id}/apply")),
            ("jobs".to_string(), id.clone())
        );
        assert_eq!(
            resource_info(&format!("/api/candidates/applications/{id}")),
            ("applications".to_string(), id)
        );
        assert_eq!(
            resource_info("/api/candidates/skills/"),
            ("skills".to_string(), String::new())
        );
        assert_eq!(resource_info("/api/jobs"), ("jobs".to_string(), String::new()));
        assert_eq!(resource_info("/"), ("root".to_string(), String::new()));
    }

    #[test]
    fn test_severity() {
        assert_eq!(severity(&Method::GET, "/api/jobs", 503, None), Severity::Critical);
        assert_eq!(severity(&Method::GET, "/api/jobs", 404, None), Severity::Medium);
        assert_eq!(
            severity(&Method::DELETE, "/api/jobs/x", 204, Some(Role::Admin)),
            Severity::High
        );
        assert_eq!(
            severity(&Method::GET, "/api/candidates/x/download", 200, None),
            Severity::High
        );
        assert_eq!(
            severity(&Method::POST, "/api/jobs/", 201, Some(Role::Recruiter)),
            Severity::Low
        );
    }

    #[test]
    fn test_suspicious_activity() {
        assert!(is_suspicious("/api/auth/login", 401));
        assert!(is_suspicious("/api/auth/login", 400));
        assert!(is_suspicious("/api/jobs/", 403));
        assert!(!is_suspicious("/api/jobs/", 404));
        assert!(!is_suspicious("/api/auth/login", 200));
    }

    #[test]
    fn test_sanitize_is_recursive() {
        let body = json!({
            "email": "a@example.com",
            "password": "hunter2",
            "profile": {"API_KEY": "k", "bio": "hi"},
            "cards": [{"credit_card_number": "4111"}, "plain"],
            "refresh_token": null
        });
        let clean = sanitize(&body);
        assert_eq!(clean["email"], "a@example.com");
        assert_eq!(clean["password"], REDACTED);
        assert_eq!(clean["profile"]["API_KEY"], REDACTED);
        assert_eq!(clean["profile"]["bio"], "hi");
        assert_eq!(clean["cards"][0]["credit_card_number"], REDACTED);
        assert_eq!(clean["cards"][1], "plain");
        assert_eq!(clean["refresh_token"], REDACTED);
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), Some("10.0.0.9".to_string()));
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, Some(peer)), Some("203.0.113.7".to_string()));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("日本語テキスト", 3), "日本語");
        assert_eq!(truncate("short", MAX_TEXT_LEN), "short");
    }

    #[test]
    fn test_field_diff() {
        let old = json!({"title": "Engineer", "status": "draft", "salary_min": 1});
        let new = json!({"title": "Engineer", "status": "active", "salary_min": 1});
        let diff = field_diff(Some(&old), Some(&new)).unwrap();
        assert_eq!(diff, json!({"status": {"old": "draft", "new": "active"}}));

        let created = field_diff(None, Some(&json!({"title": "x"}))).unwrap();
        assert_eq!(created, json!({"title": {"old": null, "new": "x"}}));

        assert!(field_diff(None, None).is_none());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{parse_or, string_enum};

string_enum! {
    /// Access role carried by every user.
    pub enum Role {
        Candidate => "candidate",
        Recruiter => "recruiter",
        Interviewer => "interviewer",
        Admin => "admin",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub phone: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        parse_or(&self.role, Role::Candidate)
    }

    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str, role: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: "sato@example.com".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            role: role.to_string(),
            phone: String::new(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_name_falls_back_to_email() {
        assert_eq!(user("", "", "candidate").full_name(), "sato@example.com");
        assert_eq!(user("Aiko", "Sato", "candidate").full_name(), "Aiko Sato");
    }

    #[test]
    fn test_unknown_role_is_least_privileged() {
        assert_eq!(user("a", "b", "superuser").role(), Role::Candidate);
        assert_eq!(user("a", "b", "admin").role(), Role::Admin);
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        assert!("owner".parse::<Role>().is_err());
    }
}

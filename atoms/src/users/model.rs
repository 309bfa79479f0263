use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::borrows::BorrowEntry;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub user_role: String, // stored as provided; see Role::resolve
    pub student_id: Option<String>,
    pub level: Option<String>,
    pub department: Option<String>,
    #[serde(default)]
    pub borrows: Vec<BorrowEntry>,
    pub user_created_at: String,
}

impl UserProfile {
    /// Profile created on first sign-in: name defaults to the email local part.
    pub fn first_sign_in(user_id: &str, email: &str, role: Role) -> Self {
        Self {
            user_id: user_id.to_string(),
            user_name: default_name(email),
            user_email: email.to_string(),
            user_role: role.as_str().to_string(),
            student_id: None,
            level: None,
            department: None,
            borrows: Vec::new(),
            user_created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

pub fn default_name(email: &str) -> String {
    email.split('@').next().filter(|s| !s.is_empty()).unwrap_or("User").to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }

    /// Case-insensitive parse of a stored role; unknown values are `None`.
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "staff" => Some(Role::Staff),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Effective role: the allow-list supersedes whatever is stored.
    pub fn resolve(stored: Option<&str>, email: &str, allow_list: &AdminAllowList) -> Role {
        if allow_list.contains(email) {
            return Role::Admin;
        }
        stored.and_then(Role::parse).unwrap_or(Role::User)
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emails that always resolve to `admin`. Matching is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowList(BTreeSet<String>);

impl AdminAllowList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        )
    }

    /// Parse a comma separated list, e.g. the `ADMIN_EMAILS` variable.
    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn contains(&self, email: &str) -> bool {
        self.0.contains(&email.trim().to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Profile as returned to clients, with the effective role next to the stored one.
#[derive(Debug, Serialize, Clone)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub effective_role: Role,
}

/// Fields submitted at registration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RegistrationDetails {
    pub user_name: String,
    pub student_id: Option<String>,
    pub level: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateUserPayload {
    pub user_name: Option<String>,
    pub student_id: Option<String>,
    pub level: Option<String>,
    pub department: Option<String>,
}

impl UpdateUserPayload {
    pub fn is_empty(&self) -> bool {
        self.user_name.is_none()
            && self.student_id.is_none()
            && self.level.is_none()
            && self.department.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRolePayload {
    pub user_role: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("STAFF"), Some(Role::Staff));
        assert_eq!(Role::parse(" Admin "), Some(Role::Admin));
        assert_eq!(Role::parse("builder"), None);
    }

    #[test]
    fn allow_list_overrides_stored_role() {
        let allow = AdminAllowList::from_csv("admin@gmail.com, Head@College.ac.th ,");
        assert_eq!(allow.len(), 2);
        assert_eq!(Role::resolve(Some("user"), "ADMIN@gmail.com", &allow), Role::Admin);
        assert_eq!(Role::resolve(None, "head@college.ac.th", &allow), Role::Admin);
        assert_eq!(Role::resolve(Some("Staff"), "someone@x.com", &allow), Role::Staff);
        assert_eq!(Role::resolve(Some("???"), "someone@x.com", &allow), Role::User);
        assert_eq!(Role::resolve(None, "someone@x.com", &allow), Role::User);
    }

    #[test]
    fn first_sign_in_defaults_name_from_email() {
        let p = UserProfile::first_sign_in("u1", "somchai@college.ac.th", Role::User);
        assert_eq!(p.user_name, "somchai");
        assert_eq!(p.user_role, "user");
        assert!(p.borrows.is_empty());
        assert_eq!(default_name("@nowhere"), "User");
    }
}

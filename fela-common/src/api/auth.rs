//! Auth collaborator contract
//!
//! Login, logout and cookie handling belong to an external collaborator.
//! The intake pipeline only needs to know who is signed in, whether that user
//! may edit, and which credentials to pass through on each backend request.
//! It never generates or inspects the CSRF token.

use serde::{Deserialize, Serialize};

pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const CSRF_COOKIE: &str = "csrftoken";
pub const SESSION_COOKIE: &str = "sessionid";

/// User as reported by `GET /auth/user/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

/// Session cookie and CSRF token carried on every backend request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionCredentials {
    pub session_id: Option<String>,
    pub csrf_token: Option<String>,
}

impl SessionCredentials {
    pub fn new(session_id: Option<String>, csrf_token: Option<String>) -> Self {
        Self {
            session_id: session_id.filter(|s| !s.is_empty()),
            csrf_token: csrf_token.filter(|s| !s.is_empty()),
        }
    }

    /// `Cookie` header value, or `None` when there is nothing to send
    pub fn cookie_header(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(session) = &self.session_id {
            parts.push(format!("{}={}", SESSION_COOKIE, session));
        }
        if let Some(csrf) = &self.csrf_token {
            parts.push(format!("{}={}", CSRF_COOKIE, csrf));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }

    /// Value for the `X-CSRFToken` header (empty when absent)
    pub fn csrf_header(&self) -> &str {
        self.csrf_token.as_deref().unwrap_or("")
    }
}

/// Auth collaborator interface
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Option<CurrentUser>;

    fn credentials(&self) -> SessionCredentials;

    /// Only approved users may create or edit records
    fn can_edit(&self) -> bool {
        self.current_user().map(|u| u.is_approved).unwrap_or(false)
    }
}

/// Fixed user and credentials, resolved once at startup
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    user: Option<CurrentUser>,
    credentials: SessionCredentials,
}

impl StaticAuth {
    pub fn new(user: Option<CurrentUser>, credentials: SessionCredentials) -> Self {
        Self { user, credentials }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<CurrentUser> {
        self.user.clone()
    }

    fn credentials(&self) -> SessionCredentials {
        self.credentials.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(approved: bool) -> CurrentUser {
        CurrentUser {
            id: Some(1),
            username: "editor".to_string(),
            is_approved: approved,
            is_superuser: false,
        }
    }

    #[test]
    fn test_can_edit_requires_approved_user() {
        let creds = SessionCredentials::default();
        assert!(!StaticAuth::anonymous().can_edit());
        assert!(!StaticAuth::new(Some(user(false)), creds.clone()).can_edit());
        assert!(StaticAuth::new(Some(user(true)), creds).can_edit());
    }

    #[test]
    fn test_cookie_header() {
        let creds = SessionCredentials::new(Some("abc".to_string()), Some("tok".to_string()));
        assert_eq!(
            creds.cookie_header().as_deref(),
            Some("sessionid=abc; csrftoken=tok")
        );
        assert_eq!(creds.csrf_header(), "tok");

        let empty = SessionCredentials::new(Some(String::new()), None);
        assert_eq!(empty.cookie_header(), None);
        assert_eq!(empty.csrf_header(), "");
    }

    #[test]
    fn test_current_user_defaults() {
        let user: CurrentUser = serde_json::from_str(r#"{"username":"ana"}"#).unwrap();
        assert!(!user.is_approved);
        assert_eq!(user.id, None);
    }
}

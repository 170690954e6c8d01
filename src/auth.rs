use std::fmt::{Debug, Formatter};

use crate::error::{PublishError, Result};
use crate::session::{SessionAuthenticator, SessionToken};

/// Operator credentials. When either one is empty, authentication is off and
/// every route is open.
#[derive(Clone, Default)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Credentials {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn matches(&self, username: &str, password: &str) -> bool {
        // Hash comparison is constant time, so the compare can't leak a prefix.
        let user_ok = blake3::hash(username.as_bytes()) == blake3::hash(self.username.as_bytes());
        let pass_ok = blake3::hash(password.as_bytes()) == blake3::hash(self.password.as_bytes());
        user_ok & pass_ok
    }
}

/// Decides who gets through to the admin routes.
pub struct AccessGate {
    credentials: Credentials,
    sessions: SessionAuthenticator,
}

impl AccessGate {
    pub fn new(credentials: Credentials, sessions: SessionAuthenticator) -> AccessGate {
        AccessGate { credentials, sessions }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// A protected route is open when authentication is off or the caller
    /// presents a valid session token.
    pub fn is_open(&self, token: Option<&str>) -> bool {
        if !self.credentials.is_enabled() {
            return true;
        }
        token.is_some_and(|token| self.sessions.validate(token))
    }

    pub fn login(&self, username: &str, password: &str) -> Result<SessionToken> {
        if !self.credentials.matches(username, password) {
            return Err(PublishError::Auth);
        }
        self.sessions.issue()
    }
}

#[cfg(test)]
mod tests {
    use crate::session::SessionKeys;

    use super::*;

    fn gate(username: &str, password: &str) -> AccessGate {
        let sessions = SessionAuthenticator::new(SessionKeys::generate().unwrap());
        AccessGate::new(Credentials::new(username, password), sessions)
    }

    #[test]
    fn test_disabled_when_any_credential_empty() {
        assert!(!Credentials::new("", "").is_enabled());
        assert!(!Credentials::new("admin", "").is_enabled());
        assert!(!Credentials::new("", "secret").is_enabled());
        assert!(Credentials::new("admin", "secret").is_enabled());
    }

    #[test]
    fn test_open_without_credentials() {
        let gate = gate("", "");
        assert!(gate.is_open(None));
        assert!(gate.is_open(Some("garbage")));
    }

    #[test]
    fn test_closed_without_token() {
        let gate = gate("admin", "secret");
        assert!(!gate.is_open(None));
        assert!(!gate.is_open(Some("garbage")));
    }

    #[test]
    fn test_login() {
        let gate = gate("admin", "secret");
        let token = gate.login("admin", "secret").unwrap();
        assert!(gate.is_open(Some(&token.value)));
    }

    #[test]
    fn test_login_mismatch() {
        let gate = gate("admin", "secret");
        assert!(matches!(gate.login("admin", "wrong"), Err(PublishError::Auth)));
        assert!(matches!(gate.login("root", "secret"), Err(PublishError::Auth)));
        assert!(matches!(gate.login("", ""), Err(PublishError::Auth)));
    }

    #[test]
    fn test_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("admin", "secret"));
        assert!(debug.contains("admin"));
        assert!(!debug.contains("secret"));
    }
}

//! Credential masking for log lines and error messages.

use std::fmt;

/// A user name / password pair passed to the platform on the command line.
///
/// Anything built from these values must go through [`Credentials::redact`]
/// before it is logged or put into an error.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.password.is_empty()
    }

    /// Replace the password with `pass***` and the user with `user***`, one
    /// `*` per original character. The password is masked first so a user
    /// name contained in it cannot leave a fragment behind.
    pub fn redact(&self, text: &str) -> String {
        let mut redacted = text.to_string();
        if !self.password.is_empty() {
            redacted = redacted.replace(&self.password, &mask("pass", &self.password));
        }
        if !self.user.is_empty() {
            redacted = redacted.replace(&self.user, &mask("user", &self.user));
        }
        redacted
    }
}

fn mask(prefix: &str, secret: &str) -> String {
    format!("{}{}", prefix, "*".repeat(secret.chars().count()))
}

/// Apply every credential set in turn.
pub fn redact_all(credentials: &[Credentials], text: &str) -> String {
    credentials
        .iter()
        .fold(text.to_string(), |acc, creds| creds.redact(&acc))
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &mask("pass", &self.password))
            .finish()
    }
}

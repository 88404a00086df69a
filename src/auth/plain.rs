//! SASL PLAIN mechanism
//!
//! Implements the single-step PLAIN mechanism (RFC 4616) used by Impala
//! daemons configured for LDAP authentication. The initial response is
//! `authzid NUL authcid NUL passwd`; the server either completes the
//! exchange or rejects it, so any challenge is a protocol violation.

use std::fmt;

/// PLAIN mechanism error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlainError {
    /// A credential contains a NUL byte and cannot be framed
    InvalidCredential(String),
    /// Server sent a challenge after the initial response
    UnexpectedChallenge(usize),
}

impl fmt::Display for PlainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlainError::InvalidCredential(field) => {
                write!(f, "{} must not contain NUL bytes", field)
            }
            PlainError::UnexpectedChallenge(len) => write!(
                f,
                "PLAIN is single-step but server sent a {} byte challenge",
                len
            ),
        }
    }
}

impl std::error::Error for PlainError {}

/// SASL PLAIN client
#[derive(Clone)]
pub struct PlainClient {
    authorization_id: Option<String>,
    username: String,
    password: String,
}

impl PlainClient {
    /// Create a new PLAIN client
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            authorization_id: None,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Act on behalf of another identity
    pub fn authorization_id(mut self, authzid: impl Into<String>) -> Self {
        self.authorization_id = Some(authzid.into());
        self
    }

    /// Authentication identity
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Build the initial response message
    pub fn initial_response(&self) -> Result<Vec<u8>, PlainError> {
        let authzid = self.authorization_id.as_deref().unwrap_or("");
        for (field, value) in [
            ("authorization id", authzid),
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ] {
            if value.as_bytes().contains(&0) {
                return Err(PlainError::InvalidCredential(field.to_string()));
            }
        }

        let len = authzid.len() + self.username.len() + self.password.len() + 2;
        let mut msg = Vec::with_capacity(len);
        msg.extend_from_slice(authzid.as_bytes());
        msg.push(0);
        msg.extend_from_slice(self.username.as_bytes());
        msg.push(0);
        msg.extend_from_slice(self.password.as_bytes());
        Ok(msg)
    }

    /// Respond to a server challenge
    pub fn evaluate_challenge(&self, challenge: &[u8]) -> Result<Vec<u8>, PlainError> {
        Err(PlainError::UnexpectedChallenge(challenge.len()))
    }
}

impl fmt::Debug for PlainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlainClient")
            .field("authorization_id", &self.authorization_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

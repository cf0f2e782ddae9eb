//! Credential extraction and verification.
//!
//! # Responsibilities
//! - Decode `Authorization: Basic <base64(user:pass)>`
//! - Compare presented credentials against the configured set
//!
//! # Design Decisions
//! - Stateless: every request authenticates on its own
//! - Constant-time comparison, no early exit over the configured set
//! - Passwords are redacted from `Debug` output

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::{Choice, ConstantTimeEq};

/// A username/password pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decode an `Authorization` header value using the Basic scheme.
    pub fn from_basic_header(value: &str) -> Option<Credential> {
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Credential::new(username, password))
    }

    /// Encode as an `Authorization` header value.
    pub fn to_basic_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(raw))
    }

    /// Parse `user:pass` entries separated by commas.
    pub fn parse_list(list: &str) -> Result<Vec<Credential>, String> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry
                    .split_once(':')
                    .map(|(u, p)| Credential::new(u, p))
                    .ok_or_else(|| "credential entries must look like user:password".to_string())
            })
            .collect()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Verifies credentials against an immutable configured set.
#[derive(Clone)]
pub struct CredentialVerifier {
    allowed: Vec<Credential>,
}

impl CredentialVerifier {
    pub fn new(allowed: Vec<Credential>) -> Self {
        Self { allowed }
    }

    /// Returns true when the pair matches a configured credential.
    ///
    /// Empty input is a plain negative outcome, not an error.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        if username.is_empty() || password.is_empty() {
            return false;
        }
        let mut matched = Choice::from(0u8);
        for c in &self.allowed {
            let user_eq = c.username.as_bytes().ct_eq(username.as_bytes());
            let pass_eq = c.password.as_bytes().ct_eq(password.as_bytes());
            matched |= user_eq & pass_eq;
        }
        matched.into()
    }

    pub fn verify_credential(&self, credential: &Credential) -> bool {
        self.verify(&credential.username, &credential.password)
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

impl fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("credentials", &self.allowed.len())
            .finish()
    }
}

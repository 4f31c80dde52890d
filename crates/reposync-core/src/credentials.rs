//! Credentials for remote repositories.
//!
//! A repository is accessed either with a bearer token, a basic
//! username/password pair, or without credentials (SSH keys from the
//! environment, public HTTPS remotes, local paths).

use std::collections::HashMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Resolved credentials for a remote.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// HTTP bearer token.
    Bearer { token: String },
    /// HTTP basic authentication.
    Basic { username: String, password: String },
    /// No credentials.
    #[default]
    None,
}

impl Credentials {
    /// Creates bearer credentials.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Creates basic credentials.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns true if there is nothing to authenticate with.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Value for an HTTP `Authorization` header.
    pub fn authorization_header(&self) -> Option<String> {
        match self {
            Self::Bearer { token } => Some(format!("Bearer {}", token)),
            Self::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{}:{}", username, password));
                Some(format!("Basic {}", encoded))
            },
            Self::None => None,
        }
    }

    /// Secret strings that must never appear in logs or error messages.
    pub fn secrets(&self) -> Vec<&str> {
        match self {
            Self::Bearer { token } => vec![token.as_str()],
            Self::Basic { password, .. } => vec![password.as_str()],
            Self::None => Vec::new(),
        }
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect()
    }

    /// Replaces every secret in `text` with `***`.
    pub fn redact(&self, text: &str) -> String {
        self.secrets()
            .into_iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret, "***"))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::None => f.write_str("None"),
        }
    }
}

/// Resolves a record's credential reference into [`Credentials`].
///
/// Implementations are called from blocking worker threads right before a
/// clone or pull, so rotated secrets are picked up without recloning.
pub trait CredentialProvider: Send + Sync {
    /// Resolves `reference`. `None` means the record has no credentials.
    fn resolve(&self, reference: Option<&str>) -> Result<Credentials>;
}

/// Provider backed by a fixed map of reference to credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticCredentials {
    entries: HashMap<String, Credentials>,
}

impl StaticCredentials {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds credentials under `reference`.
    pub fn with(mut self, reference: impl Into<String>, credentials: Credentials) -> Self {
        self.entries.insert(reference.into(), credentials);
        self
    }

    /// Inserts or replaces credentials under `reference`.
    pub fn insert(&mut self, reference: impl Into<String>, credentials: Credentials) {
        self.entries.insert(reference.into(), credentials);
    }

    /// Number of known references.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no references are known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialProvider for StaticCredentials {
    fn resolve(&self, reference: Option<&str>) -> Result<Credentials> {
        match reference {
            None => Ok(Credentials::None),
            Some(reference) => self
                .entries
                .get(reference)
                .cloned()
                .ok_or_else(|| CoreError::credentials(reference, "unknown credential reference")),
        }
    }
}

/// Provider that never has credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn resolve(&self, _reference: Option<&str>) -> Result<Credentials> {
        Ok(Credentials::None)
    }
}

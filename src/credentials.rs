// src/credentials.rs

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Comma-separated list of keys; takes precedence over [`SINGLE_KEY_VAR`].
pub const MULTI_KEY_VAR: &str = "GEMINI_API_KEYS";
/// Primary key. In the combined shape it is also parsed as a comma list.
pub const SINGLE_KEY_VAR: &str = "GEMINI_API_KEY";
/// Backup keys used by the discrete shape, tried after the primary.
pub const BACKUP_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY_BACKUP_1", "GEMINI_API_KEY_BACKUP_2"];

/// Ordered, immutable list of API keys.
///
/// Duplicates are preserved: a key listed twice is tried twice.
#[derive(Clone, Default)]
pub struct CredentialSet {
    keys: Vec<SecretString>,
}

impl CredentialSet {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|k| SecretString::new(k.into()))
                .collect(),
        }
    }

    /// Parses a comma-separated list: entries are trimmed and empty ones dropped.
    pub fn parse_list(raw: &str) -> Self {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
        )
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SecretString> {
        self.keys.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SecretString> {
        self.keys.iter()
    }

    /// Previews of all keys, in order. Safe to log or print.
    pub fn previews(&self) -> Vec<String> {
        self.keys.iter().map(preview).collect()
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("keys", &self.previews())
            .finish()
    }
}

/// Short, non-reversible rendering of a key for logs.
pub fn preview(key: &SecretString) -> String {
    preview_str(key.expose_secret())
}

pub fn preview_str(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}

/// Supplies the credential list on first use.
pub trait CredentialProvider: Send + Sync {
    fn load(&self) -> CredentialSet;
}

impl CredentialProvider for CredentialSet {
    fn load(&self) -> CredentialSet {
        self.clone()
    }
}

/// Which environment variables hold the keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    /// `GEMINI_API_KEYS` (comma list) if non-empty, else `GEMINI_API_KEY`.
    #[default]
    Combined,
    /// `GEMINI_API_KEY`, `GEMINI_API_KEY_BACKUP_1`, `GEMINI_API_KEY_BACKUP_2`.
    Discrete,
}

impl CredentialSource {
    /// Reads the keys from the process environment.
    pub fn from_env(&self) -> CredentialSet {
        self.load_with(|name| std::env::var(name).ok())
    }

    /// Reads the keys through `lookup`, which maps a variable name to its value.
    pub fn load_with<F>(&self, lookup: F) -> CredentialSet
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = match self {
            Self::Combined => {
                let raw = lookup(MULTI_KEY_VAR)
                    .filter(|v| !v.is_empty())
                    .or_else(|| lookup(SINGLE_KEY_VAR))
                    .unwrap_or_default();
                CredentialSet::parse_list(&raw)
            }
            Self::Discrete => CredentialSet::new(
                std::iter::once(SINGLE_KEY_VAR)
                    .chain(BACKUP_KEY_VARS)
                    .filter_map(|name| lookup(name))
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty()),
            ),
        };
        debug!(source = ?self, keys = set.len(), "Loaded Gemini API keys");
        set
    }
}

impl CredentialProvider for CredentialSource {
    fn load(&self) -> CredentialSet {
        self.from_env()
    }
}

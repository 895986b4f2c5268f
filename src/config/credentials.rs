//! Where the API key comes from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ColloquyError;

/// Environment variable consulted when nothing else is configured.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Source of the service API key.
///
/// Resolution happens when a service is created, so an `Env` source picks up
/// the variable's value at that moment.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CredentialSource {
    Explicit(String),
    /// Name of the environment variable holding the key.
    Env(String),
    None,
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self::Env(DEFAULT_API_KEY_ENV.to_string())
    }
}

impl CredentialSource {
    /// Resolve the key, looking environment variables up through `lookup`.
    pub fn resolve_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ColloquyError> {
        match self {
            Self::Explicit(key) if !key.trim().is_empty() => Ok(key.clone()),
            Self::Explicit(_) => Err(ColloquyError::MissingCredential(
                "explicit API key is empty".into(),
            )),
            Self::Env(var) => lookup(var).filter(|k| !k.trim().is_empty()).ok_or_else(|| {
                ColloquyError::MissingCredential(format!(
                    "environment variable {var} is not set; \
                     export it or configure an explicit API key"
                ))
            }),
            Self::None => Err(ColloquyError::MissingCredential(
                "no API key source configured".into(),
            )),
        }
    }

    pub fn resolve(&self) -> Result<String, ColloquyError> {
        self.resolve_with(|var| std::env::var(var).ok())
    }
}

// Keys never appear in logs.
impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(_) => f.write_str("Explicit(***)"),
            Self::Env(var) => f.debug_tuple("Env").field(var).finish(),
            Self::None => f.write_str("None"),
        }
    }
}

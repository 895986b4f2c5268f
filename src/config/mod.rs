//! Configuration system (layered: explicit setters > env > config file).

pub mod credentials;

pub use credentials::{CredentialSource, DEFAULT_API_KEY_ENV};

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::ColloquyError;

/// Service connection settings.
///
/// Conversation behavior (model choice per chat, temperature, streaming)
/// lives in [`ChatOptions`](crate::types::ChatOptions); `model` here is only
/// the default picked up by the CLI and `Chat::new`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColloquyConfig {
    credential: CredentialSource,
    base_url: Option<String>,
    organization: Option<String>,
    model: Option<String>,
}

/// On-disk shape of `config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_key: Option<String>,
    api_key_env: Option<String>,
    base_url: Option<String>,
    organization: Option<String>,
    model: Option<String>,
}

impl ColloquyConfig {
    /// Config reading the key from `OPENAI_API_KEY` and nothing else set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables (and `.env` if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::new().overlay_env(|var| std::env::var(var).ok())
    }

    /// Load a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ColloquyError> {
        let text = fs::read_to_string(path.as_ref())?;
        let file: FileConfig = toml::from_str(&text)?;

        let credential = match (file.api_key, file.api_key_env) {
            (Some(key), _) => CredentialSource::Explicit(key),
            (None, Some(var)) => CredentialSource::Env(var),
            (None, None) => CredentialSource::default(),
        };
        Ok(Self {
            credential,
            base_url: file.base_url,
            organization: file.organization,
            model: file.model,
        })
    }

    /// Default location of the config file: `<config dir>/colloquy/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("colloquy").join("config.toml"))
    }

    /// Config file (if present) overlaid by the environment.
    pub fn load() -> Result<Self, ColloquyError> {
        Self::load_from(Self::default_path().as_deref())
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self, ColloquyError> {
        let base = match path {
            Some(p) if p.exists() => {
                debug!(path = %p.display(), "loading config file");
                Self::from_file(p)?
            }
            _ => Self::new(),
        };
        let _ = dotenvy::dotenv();
        Ok(base.overlay_env(|var| std::env::var(var).ok()))
    }

    /// Apply environment overrides read through `lookup`.
    pub fn overlay_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if lookup(DEFAULT_API_KEY_ENV).is_some() {
            self.credential = CredentialSource::Env(DEFAULT_API_KEY_ENV.to_string());
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(org) = lookup("OPENAI_ORG_ID") {
            self.organization = Some(org);
        }
        if let Some(model) = lookup("COLLOQUY_MODEL") {
            self.model = Some(model);
        }
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.credential = CredentialSource::Explicit(key.into());
        self
    }

    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.credential = CredentialSource::Env(var.into());
        self
    }

    pub fn with_credential(mut self, credential: CredentialSource) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn credential(&self) -> &CredentialSource {
        &self.credential
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Resolve the API key; fails with `MissingCredential` when none is available.
    pub fn resolve_api_key(&self) -> Result<String, ColloquyError> {
        self.credential.resolve()
    }

    pub fn has_credentials(&self) -> bool {
        self.resolve_api_key().is_ok()
    }
}

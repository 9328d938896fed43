use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::auth::CredentialStore;
use crate::constants::{defaults, endpoints, storage};
use crate::error::AiboxError;
use crate::history::HistoryLog;
use crate::llm::CompletionClient;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Overrides the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: endpoints::DEFAULT_COMPLETIONS_URL.to_string(),
            model: defaults::MODEL.to_string(),
            api_key_env: defaults::API_KEY_ENV.to_string(),
            max_tokens: defaults::MAX_TOKENS,
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(defaults::APP_DIR)
            .join("config.toml")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Read settings from `path`, falling back to defaults when the file is
    /// missing or does not parse.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("ignoring unparsable config {}: {e}", path.display()),
                },
                Err(e) => tracing::warn!("cannot read config {}: {e}", path.display()),
            }
        }
        Self::default()
    }

    pub fn save(&self) -> Result<(), AiboxError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AiboxError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AiboxError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Root directory for the user store and history tree.
    pub fn data_dir(&self) -> PathBuf {
        self.storage.data_dir.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(defaults::APP_DIR)
        })
    }

    pub fn users_file(&self) -> PathBuf {
        self.data_dir().join(storage::USERS_FILE)
    }

    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(self.users_file())
    }

    pub fn history_log(&self, username: &str) -> HistoryLog {
        HistoryLog::new(self.data_dir(), username)
    }

    /// Get the API key from the environment variable specified in settings.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Build the completion client from the current settings.
    pub fn build_client(&self) -> Result<CompletionClient, AiboxError> {
        let api_key = self.api_key().ok_or_else(|| {
            AiboxError::Config(format!(
                "no API token: set the {} environment variable",
                self.llm.api_key_env
            ))
        })?;
        Ok(CompletionClient::new(api_key)
            .with_endpoint(&self.llm.endpoint)
            .with_model(&self.llm.model)
            .with_max_tokens(self.llm.max_tokens))
    }
}

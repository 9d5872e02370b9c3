//! Layered application settings.
//!
//! Sources, lowest priority first: built-in defaults, `pagewise.toml` (or the
//! file named by `PAGEWISE_CONFIG`), then `PAGEWISE_*` environment variables
//! with `__` separating nested keys, e.g. `PAGEWISE_CHAT__MODEL=gpt-4o-mini`.

use crate::application::use_cases::page_virtualizer::ViewerConfig;
use crate::application::use_cases::recent_files::RecentFilesConfig;
use crate::application::use_cases::text_extraction::ExtractionConfig;
use crate::domain::error::Result;
use crate::domain::llm_config::{LLMConfig, LLMProvider};
use crate::infrastructure::pdf::PdfToolsConfig;
use crate::infrastructure::security::KeyringManager;
use crate::infrastructure::storage::StorageConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const CONFIG_PATH_ENV: &str = "PAGEWISE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "pagewise.toml";
const ENV_PREFIX: &str = "PAGEWISE_";
const KEYRING_SERVICE: &str = "pagewise";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            max_upload_bytes: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSection {
    #[serde(flatten)]
    pub pipeline: ExtractionConfig,
    #[serde(flatten)]
    pub tools: PdfToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub viewer: ViewerConfig,
    pub extraction: ExtractionSection,
    pub chat: LLMConfig,
    pub notes: LLMConfig,
    pub storage: StorageConfig,
    pub recent_files: RecentFilesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            viewer: ViewerConfig::default(),
            extraction: ExtractionSection::default(),
            chat: LLMConfig::default(),
            notes: LLMConfig {
                temperature: Some(0.3),
                max_tokens: Some(2048),
                ..LLMConfig::default()
            },
            storage: StorageConfig::default(),
            recent_files: RecentFilesConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load `.env`, then the layered sources.
    pub fn load() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            debug!(error = %e, "No .env file loaded");
        }
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let config: AppConfig = Self::figment(&path).extract()?;
        debug!(path = %path, port = config.server.port, "Configuration loaded");
        Ok(config)
    }
}

/// Fills API keys that are not set in configuration from the OS keyring.
pub struct ConfigService {
    keyring: KeyringManager,
}

impl ConfigService {
    pub fn new() -> Self {
        Self {
            keyring: KeyringManager::new(KEYRING_SERVICE),
        }
    }

    pub fn get_api_key(&self, provider: LLMProvider) -> Result<Option<String>> {
        self.keyring.get_secret(provider.key_name())
    }

    pub fn resolve_llm_config(&self, config: &LLMConfig) -> LLMConfig {
        let mut resolved = config.clone();
        let has_key = resolved
            .api_key
            .as_deref()
            .map_or(false, |k| !k.trim().is_empty());
        if has_key || resolved.provider == LLMProvider::Local {
            return resolved;
        }

        match self.get_api_key(resolved.provider) {
            Ok(Some(key)) => resolved.api_key = Some(key),
            Ok(None) => warn!(provider = ?resolved.provider, "No API key configured or stored"),
            Err(e) => warn!(provider = ?resolved.provider, error = %e, "Keyring lookup failed"),
        }
        resolved
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

use anyhow::{Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::corpus::LoaderConfig;
use crate::prompt::PersonaTemplate;
use crate::quota::{DEFAULT_MAX_REQUESTS, QuotaScope};
use crate::relay::DEFAULT_REQUEST_TIMEOUT_MS;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_DATA_PATH: &str = "data_rag";
pub const DEFAULT_USAGE_FILE: &str = "propchat_usage.log";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_ASSETS_DIR: &str = "assets";

const CONFIG_DIR_NAME: &str = "propchat";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub request_timeout: Duration,
    pub data: DataConfig,
    pub quota: QuotaConfig,
    pub server: ServerConfig,
    pub persona: PersonaTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConfig {
    pub path: PathBuf,
    pub loader: LoaderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaConfig {
    pub file: PathBuf,
    pub max_requests: u32,
    pub scope: QuotaScope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub assets_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            data: DataConfig {
                path: PathBuf::from(DEFAULT_DATA_PATH),
                loader: LoaderConfig::default(),
            },
            quota: QuotaConfig {
                file: PathBuf::from(DEFAULT_USAGE_FILE),
                max_requests: DEFAULT_MAX_REQUESTS,
                scope: QuotaScope::Global,
            },
            server: ServerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
                assets_dir: PathBuf::from(DEFAULT_ASSETS_DIR),
            },
            persona: PersonaTemplate::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFileConfig {
    gemini_api_key: Option<String>,
    gemini_model: Option<String>,
    gemini_base_url: Option<String>,
    request_timeout_ms: Option<u64>,
    data: Option<RawDataConfig>,
    quota: Option<RawQuotaConfig>,
    server: Option<RawServerConfig>,
    persona: Option<RawPersonaConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDataConfig {
    path: Option<PathBuf>,
    extension: Option<String>,
    max_sources: Option<usize>,
    max_source_bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawQuotaConfig {
    file: Option<PathBuf>,
    max_requests: Option<u32>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawServerConfig {
    host: Option<String>,
    port: Option<u16>,
    assets_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPersonaConfig {
    name: Option<String>,
    language_rule: Option<String>,
    persona: Option<String>,
    verbosity: Option<String>,
    max_results: Option<u8>,
    emoji_policy: Option<String>,
    off_topic_policy: Option<String>,
    field_rule: Option<String>,
    image_rule: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// An explicit path must exist; the discovered default path is optional.
    pub fn load_with_path(explicit: Option<&Path>) -> Result<Self> {
        let file_config = match explicit {
            Some(path) => {
                if !path.is_file() {
                    bail!("Failed to load config {}: file not found", path.display());
                }
                load_file_config(path)?.map(|raw| (raw, path.to_path_buf()))
            }
            None => {
                let path = discover_config_path()?;
                load_file_config(&path)?.map(|raw| (raw, path))
            }
        };

        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Some((raw, path)) = file_config {
            config.apply_file(raw, &path)?;
        }

        if let Some(key) = env_non_empty("GEMINI_API_KEY") {
            config.gemini_api_key = Some(key);
        }
        if let Some(model) = env_non_empty("GEMINI_MODEL") {
            config.gemini_model = model;
        }
        if let Some(base_url) = env_non_empty("GEMINI_BASE_URL") {
            config.gemini_base_url = base_url;
        }

        Ok(config)
    }

    fn apply_file(&mut self, raw: RawFileConfig, config_path: &Path) -> Result<()> {
        if let Some(key) = raw.gemini_api_key.as_deref().and_then(non_empty) {
            self.gemini_api_key = Some(key.to_string());
        }
        if let Some(model) = raw.gemini_model.as_deref().and_then(non_empty) {
            self.gemini_model = model.to_string();
        }
        if let Some(base_url) = raw.gemini_base_url.as_deref().and_then(non_empty) {
            self.gemini_base_url = base_url.to_string();
        }
        if let Some(ms) = raw.request_timeout_ms {
            if ms == 0 {
                return Err(config_error(config_path, "request_timeout_ms", "must be > 0"));
            }
            self.request_timeout = Duration::from_millis(ms);
        }

        if let Some(data) = raw.data {
            if let Some(path) = data.path {
                self.data.path = path;
            }
            if let Some(extension) = data.extension {
                let extension = extension.trim().trim_start_matches('.');
                if extension.is_empty() {
                    return Err(config_error(config_path, "data.extension", "must not be empty"));
                }
                self.data.loader.extension = extension.to_string();
            }
            if let Some(max_sources) = data.max_sources {
                if max_sources == 0 {
                    return Err(config_error(config_path, "data.max_sources", "must be >= 1"));
                }
                self.data.loader.max_sources = max_sources;
            }
            self.data.loader.max_source_bytes = data.max_source_bytes;
        }

        if let Some(quota) = raw.quota {
            if let Some(file) = quota.file {
                self.quota.file = file;
            }
            if let Some(max_requests) = quota.max_requests {
                if max_requests == 0 {
                    return Err(config_error(config_path, "quota.max_requests", "must be >= 1"));
                }
                self.quota.max_requests = max_requests;
            }
            if let Some(scope) = quota.scope {
                self.quota.scope = QuotaScope::from_str(&scope)
                    .map_err(|reason| config_error(config_path, "quota.scope", &reason))?;
            }
        }

        if let Some(server) = raw.server {
            if let Some(host) = server.host.as_deref().and_then(non_empty) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(assets_dir) = server.assets_dir {
                self.server.assets_dir = assets_dir;
            }
        }

        if let Some(persona) = raw.persona {
            apply_persona(&mut self.persona, persona);
        }

        Ok(())
    }
}

fn apply_persona(template: &mut PersonaTemplate, raw: RawPersonaConfig) {
    let slots = [
        (&mut template.name, raw.name),
        (&mut template.language_rule, raw.language_rule),
        (&mut template.persona, raw.persona),
        (&mut template.verbosity, raw.verbosity),
        (&mut template.emoji_policy, raw.emoji_policy),
        (&mut template.off_topic_policy, raw.off_topic_policy),
        (&mut template.field_rule, raw.field_rule),
        (&mut template.image_rule, raw.image_rule),
    ];
    for (slot, value) in slots {
        if let Some(value) = value.as_deref().and_then(non_empty) {
            *slot = value.to_string();
        }
    }
    if let Some(max_results) = raw.max_results {
        template.max_results = max_results;
    }
}

fn discover_config_path() -> Result<PathBuf> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if trimmed.is_empty() {
            bail!("Failed to resolve config path: XDG_CONFIG_HOME is set but empty");
        }

        return Ok(PathBuf::from(trimmed)
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| anyhow!("Failed to resolve config path: HOME directory is unavailable"))?;

    Ok(home
        .join(".config")
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

fn load_file_config(config_path: &Path) -> Result<Option<RawFileConfig>> {
    if !config_path.is_file() {
        return Ok(None);
    }

    let config_text = fs::read_to_string(config_path).map_err(|err| {
        anyhow!(
            "Failed to load config {}: unable to read file: {err}",
            config_path.display()
        )
    })?;

    toml::from_str(&config_text)
        .map(Some)
        .map_err(|err| anyhow!("Failed to load config {}: {err}", config_path.display()))
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|value| non_empty(&value).map(ToOwned::to_owned))
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn config_error(config_path: &Path, key_path: &str, reason: &str) -> anyhow::Error {
    anyhow!(
        "Failed to load config {}: {key_path}: {reason}",
        config_path.display()
    )
}

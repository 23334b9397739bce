use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use lovegate_channels::telegram::{TelegramAdapter, DEFAULT_GREETING, DEFAULT_WEB_APP_URL};
use lovegate_provider::ProviderConfig;
use lovegate_story::CharacterId;
use serde::Deserialize;

pub const DEFAULT_MAIN_YAML: &str = include_str!("../../../config/main.yaml");

#[derive(Debug, Clone, Deserialize)]
pub struct LovegateConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub personas: HashMap<CharacterId, String>,
    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bot_token")]
    pub token: String,
    #[serde(default = "default_web_app_url")]
    pub web_app_url: String,
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: default_bot_token(),
            web_app_url: default_web_app_url(),
            greeting: default_greeting(),
        }
    }
}

impl TelegramConfig {
    /// The resolved bot token; an unset `BOT_TOKEN` is an error.
    pub fn require_token(&self) -> Result<&str> {
        let token = self.token.trim();
        if token.is_empty() {
            bail!("BOT_TOKEN is not set (telegram.token resolved to an empty string)");
        }
        Ok(token)
    }

    pub fn adapter(&self) -> Result<TelegramAdapter> {
        TelegramAdapter::new(&self.web_app_url, self.greeting.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    /// Relative paths are resolved against the config root.
    #[serde(default = "default_state_dir")]
    pub dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
        }
    }
}

impl StateConfig {
    pub fn state_file(&self, root: &Path) -> PathBuf {
        let dir = if self.dir.is_absolute() {
            self.dir.clone()
        } else {
            root.join(&self.dir)
        };
        dir.join("state.json")
    }
}

fn default_app_name() -> String {
    "lovegate".to_string()
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_true() -> bool {
    true
}

fn default_bot_token() -> String {
    "${BOT_TOKEN}".to_string()
}

fn default_web_app_url() -> String {
    DEFAULT_WEB_APP_URL.to_string()
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Replaces every `${VAR}` with the variable's value (empty when unset).
pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let Some(end) = tail.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };
        output.push_str(&std::env::var(&tail[..end]).unwrap_or_default());
        rest = &tail[end + 1..];
    }

    output.push_str(rest);
    output
}

fn resolve_env(config: &mut LovegateConfig) {
    config.server.bind = resolve_env_var(&config.server.bind);
    config.telegram.token = resolve_env_var(&config.telegram.token);
    config.telegram.web_app_url = resolve_env_var(&config.telegram.web_app_url);
    if let Some(key) = config.provider.api_key.as_mut() {
        *key = resolve_env_var(key);
    }
    if let Some(url) = config.provider.base_url.as_mut() {
        *url = resolve_env_var(url);
    }
}

/// Loads `main.yaml` from `dir`, resolves placeholders and validates it.
pub fn load_config(dir: &Path) -> Result<LovegateConfig> {
    let mut config: LovegateConfig = read_yaml_file(&dir.join("main.yaml"))?;
    resolve_env(&mut config);
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &LovegateConfig) -> Result<()> {
    config
        .server
        .bind
        .parse::<SocketAddr>()
        .map_err(|e| anyhow!("invalid server.bind {:?}: {e}", config.server.bind))?;

    if config.provider.model.trim().is_empty() {
        bail!("provider.model must not be empty");
    }
    if config.provider.timeout_secs == 0 {
        bail!("provider.timeout_secs must be positive");
    }

    for (id, persona) in &config.personas {
        if persona.trim().is_empty() {
            bail!("empty persona override for {id}");
        }
    }

    if config.telegram.greeting.trim().is_empty() {
        bail!("telegram.greeting must not be empty");
    }
    config.telegram.adapter().context("telegram.web_app_url")?;
    Ok(())
}

/// Writes the default `config/main.yaml` under `root` when none exists yet.
pub fn ensure_skeleton_config(root: &Path) -> Result<()> {
    let dir = root.join("config");
    let path = dir.join("main.yaml");
    if path.exists() {
        return Ok(());
    }
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    fs::write(&path, DEFAULT_MAIN_YAML).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!("wrote default config to {}", path.display());
    Ok(())
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

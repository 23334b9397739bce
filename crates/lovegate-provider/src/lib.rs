pub mod openai;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::OpenAiProvider;
pub use types::*;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;
    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_MODEL: &str = "deepseek-chat";
pub const DEEPSEEK_API_KEY_ENV: &str = "DEEPSEEK_API_KEY";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[default]
    DeepSeek,
    OpenAI,
    /// Any other OpenAI-compatible endpoint; needs `base_url`.
    Custom,
    /// Offline echo provider.
    Stub,
}

/// Upstream language-model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type", default)]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_key_env() -> String {
    DEEPSEEK_API_KEY_ENV.to_string()
}

fn default_model() -> String {
    DEEPSEEK_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    openai::DEFAULT_TIMEOUT.as_secs()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: ProviderType::default(),
            api_key: None,
            api_key_env: default_api_key_env(),
            base_url: None,
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Explicit key first, then the configured environment variable.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.clone());
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("{} is not set", self.api_key_env))
    }
}

pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider_type {
        ProviderType::DeepSeek => {
            let base_url = config.base_url.as_deref().unwrap_or(DEEPSEEK_BASE_URL);
            Arc::new(OpenAiProvider::with_timeout(config.resolve_api_key()?, base_url, config.timeout())?)
        }
        ProviderType::OpenAI => {
            let base_url = config.base_url.as_deref().unwrap_or("https://api.openai.com/v1");
            Arc::new(OpenAiProvider::with_timeout(config.resolve_api_key()?, base_url, config.timeout())?)
        }
        ProviderType::Custom => {
            let base_url = config
                .base_url
                .as_deref()
                .ok_or_else(|| anyhow!("custom provider requires base_url"))?;
            Arc::new(OpenAiProvider::with_timeout(config.resolve_api_key()?, base_url, config.timeout())?)
        }
        ProviderType::Stub => Arc::new(StubProvider),
    };
    tracing::info!(provider = ?config.provider_type, model = %config.model, "chat provider ready");
    Ok(provider)
}

/// Echoes the last user message; used offline and in tests.
pub struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let last = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(LlmResponse {
            text: format!("[stub:{}] {last}", request.model),
            input_tokens: None,
            output_tokens: None,
            stop_reason: Some("stop".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_target_deepseek() {
        let config: ProviderConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(config.provider_type, ProviderType::DeepSeek);
        assert_eq!(config.model, "deepseek-chat");
        assert_eq!(config.api_key_env, "DEEPSEEK_API_KEY");
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn explicit_key_wins_over_env() {
        let config = ProviderConfig {
            api_key_env: "LOVEGATE_UNSET_KEY".into(),
            ..ProviderConfig::default()
        }
        .with_api_key("sk-inline");
        assert_eq!(config.resolve_api_key().unwrap(), "sk-inline");
    }

    #[test]
    fn missing_key_names_the_variable() {
        std::env::remove_var("LOVEGATE_UNSET_KEY");
        let config = ProviderConfig {
            api_key_env: "LOVEGATE_UNSET_KEY".into(),
            ..ProviderConfig::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("LOVEGATE_UNSET_KEY"));
    }

    #[test]
    fn custom_requires_base_url() {
        let config = ProviderConfig {
            provider_type: ProviderType::Custom,
            ..ProviderConfig::default()
        }
        .with_api_key("k");
        assert!(create_provider(&config).is_err());
        assert!(create_provider(&config.with_base_url("http://localhost:1")).is_ok());
    }

    #[tokio::test]
    async fn stub_echoes_last_user_turn() {
        let resp = StubProvider
            .chat(LlmRequest::simple("m", Some("sys".into()), "привет"))
            .await
            .unwrap();
        assert_eq!(resp.text, "[stub:m] привет");
    }
}

use std::collections::HashMap;
use std::path::Path;
use std::sync::Once;

use serde::Serialize;
use serde_json::{json, Value};

use crate::db::DbError;
use crate::llm::{LlmConfig, LlmError};
use crate::store;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MODELS: [&str; 4] = ["gpt-4o-mini", "gpt-4o", "gpt-4-turbo", "gpt-3.5-turbo"];
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an AI agent with a lot of tools. Call the right one according to user instructions.";
pub const DEFAULT_DATA_DUMP_FILE: &str = "ai_stream_dump.json";
pub const API_KEY_ENV_VARS: [&str; 2] = ["AI_STREAM_API_KEY", "OPENAI_API_KEY"];

/// Settings resolved from the `settings` table with defaults filled in.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppConfig {
    pub provider_name: String,
    pub base_url: String,
    pub model: String,
    pub models: Vec<String>,
    pub temperature: f64,
    pub max_tokens: i64,
    pub extra_headers: Value,
    pub system_prompt: String,
    pub data_dump_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_settings(&HashMap::new())
    }
}

impl AppConfig {
    pub fn from_settings(settings: &HashMap<String, String>) -> Self {
        let get = |key: &str| settings.get(key).filter(|v| !v.trim().is_empty()).cloned();

        let models = get("models")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODELS.iter().map(|m| m.to_string()).collect());

        AppConfig {
            provider_name: get("provider_name").unwrap_or_else(|| "openai".into()),
            base_url: get("base_url").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            model: get("model").unwrap_or_else(|| DEFAULT_MODEL.into()),
            models,
            temperature: get("temperature").and_then(|s| s.parse().ok()).unwrap_or(0.7),
            max_tokens: get("max_tokens").and_then(|s| s.parse().ok()).unwrap_or(4000),
            extra_headers: get("extra_headers_json")
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_else(|| json!({})),
            system_prompt: get("system_prompt").unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.into()),
            data_dump_file: get("data_dump_file").unwrap_or_else(|| DEFAULT_DATA_DUMP_FILE.into()),
        }
    }

    pub fn load(db_path: &Path) -> Result<Self, DbError> {
        Ok(Self::from_settings(&store::get_settings_map(db_path)?))
    }

    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            provider_name: self.provider_name.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            top_p: None,
            max_tokens: self.max_tokens,
            extra_headers: self.extra_headers.clone(),
        }
    }
}

/// The `api_key` setting first, then the environment.
pub fn api_key(settings: &HashMap<String, String>) -> Result<String, LlmError> {
    api_key_with(settings, |name| std::env::var(name).ok())
}

fn api_key_with(
    settings: &HashMap<String, String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, LlmError> {
    if let Some(key) = settings.get("api_key") {
        if !key.trim().is_empty() {
            return Ok(key.trim().to_string());
        }
    }
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| env(name))
        .find(|key| !key.trim().is_empty())
        .ok_or(LlmError::MissingApiKey)
}

static TRACING: Once = Once::new();

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    TRACING.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("ai_stream=info,ai_stream_lib=info"));
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .try_init();
    });
}

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_FILE_CHARS: usize = 20_000;
pub const DEFAULT_TOOL_CACHE_TTL_SECS: u64 = 300;

/// Top-level config (taskflow.toml + TASKFLOW_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskflowConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Sampling temperature used when the request does not carry one.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Attempts per provider before a pre-stream failure is reported.
    /// Failures after the first streamed byte are never retried.
    #[serde(default)]
    pub max_retries: u32,
    /// Longest wait for the next skill chunk. `None` disables the timeout.
    #[serde(default)]
    pub step_timeout_secs: Option<u64>,
    /// File attachments are truncated to this many characters before being
    /// folded into the prompt.
    #[serde(default = "default_max_file_chars")]
    pub max_file_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_retries: 0,
            step_timeout_secs: None,
            max_file_chars: DEFAULT_MAX_FILE_CHARS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// Text-only chat completions backend.
    pub text: Option<ProviderConfig>,
    /// Multimodal backend, used when a request carries images.
    pub vision: Option<ProviderConfig>,
}

/// One OpenAI-compatible upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    pub model: Option<String>,
}

impl ProviderConfig {
    /// A provider without a non-empty API key is treated as absent.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Full chat completions endpoint URL.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.chat_path)
    }
}

impl ProvidersConfig {
    pub fn text_model(&self) -> String {
        self.text
            .as_ref()
            .and_then(|p| p.model.clone())
            .unwrap_or_else(|| "gpt-4o-mini".to_string())
    }

    pub fn vision_model(&self) -> String {
        self.vision
            .as_ref()
            .and_then(|p| p.model.clone())
            .unwrap_or_else(|| "gpt-4o".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_ttl_secs: DEFAULT_TOOL_CACHE_TTL_SECS,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}
fn default_max_file_chars() -> usize {
    DEFAULT_MAX_FILE_CHARS
}
fn default_cache_ttl() -> u64 {
    DEFAULT_TOOL_CACHE_TTL_SECS
}
fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_chat_path() -> String {
    "/v1/chat/completions".to_string()
}

impl TaskflowConfig {
    /// Load config from a TOML file with TASKFLOW_* env var overrides.
    ///
    /// Nested keys use a double underscore:
    /// `TASKFLOW_PROVIDERS__TEXT__API_KEY=sk-...`.
    /// A missing file is not an error; every section has defaults.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let mut config: TaskflowConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("TASKFLOW_").split("__"))
            .extract()
            .map_err(|e| crate::error::TaskflowError::Config(e.to_string()))?;

        config.apply_env_fallbacks();
        Ok(config)
    }

    /// Fill the text provider from `OPENAI_API_KEY` when no key is configured.
    fn apply_env_fallbacks(&mut self) {
        let configured = self.providers.text.as_ref().is_some_and(|p| p.is_configured());
        if configured {
            return;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if key.trim().is_empty() {
                return;
            }
            tracing::debug!("using OPENAI_API_KEY for the text provider");
            match self.providers.text.as_mut() {
                Some(text) => text.api_key = Some(key),
                None => {
                    self.providers.text = Some(ProviderConfig {
                        api_key: Some(key),
                        base_url: default_base_url(),
                        chat_path: default_chat_path(),
                        model: None,
                    })
                }
            }
        }
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.taskflow/taskflow.toml", home)
}

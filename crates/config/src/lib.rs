//! Configuration loading, validation, and management for RoomScout.
//!
//! Loads configuration from `~/.roomscout/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use roomscout_core::AgentConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.roomscout/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Anthropic API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Messages API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Tool server (MCP) settings
    #[serde(default)]
    pub mcp: McpServerConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_api_url() -> String {
    "https://api.anthropic.com".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("agent", &self.agent)
            .field("mcp", &self.mcp)
            .field("gateway", &self.gateway)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_model")]
    pub model: String,

    /// Sent as the top-level system prompt; empty sends none.
    #[serde(default)]
    pub system_prompt: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,

    /// Seconds to wait after the second and later tool calls, before the next LLM call
    #[serde(default = "default_inter_call_delay")]
    pub inter_call_delay_secs: u64,

    /// Seconds to wait before each follow-up LLM call
    #[serde(default = "default_llm_call_delay")]
    pub llm_call_delay_secs: u64,

    /// Seconds to wait before retrying a failed LLM call
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,

    /// Optional wall-clock limit for a whole run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
}

/// Written, commented out, into the sample config.
pub const SAMPLE_SYSTEM_PROMPT: &str = "\
You are a travel assistant AI specializing in finding accommodations.
You MUST use the provided tools for any booking-related questions.
For ANY travel query, use the airbnb_search tool FIRST with the location, dates, and number of guests from the query.
Then use the airbnb_listing_details tool with the ID of at least one listing from the search results to get detailed information.
Present a helpful summary of options including prices, ratings, and amenities, with direct booking links.";

fn default_model() -> String {
    "claude-3-7-sonnet-20250219".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_max_tool_calls() -> u32 {
    5
}
fn default_inter_call_delay() -> u64 {
    3
}
fn default_llm_call_delay() -> u64 {
    2
}
fn default_retry_backoff() -> u64 {
    5
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            system_prompt: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_tool_calls: default_max_tool_calls(),
            inter_call_delay_secs: default_inter_call_delay(),
            llm_call_delay_secs: default_llm_call_delay(),
            retry_backoff_secs: default_retry_backoff(),
            run_timeout_secs: None,
        }
    }
}

/// How to launch the tool server subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    #[serde(default = "default_mcp_command")]
    pub command: String,

    #[serde(default = "default_mcp_args")]
    pub args: Vec<String>,

    /// Extra environment variables for the child process
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_mcp_command() -> String {
    "npx".into()
}
fn default_mcp_args() -> Vec<String> {
    vec![
        "-y".into(),
        "@openbnb/mcp-server-airbnb".into(),
        "--ignore-robots-txt".into(),
    ]
}
fn default_request_timeout() -> u64 {
    60
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            command: default_mcp_command(),
            args: default_mcp_args(),
            env: HashMap::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Refuse a new search while another one is running
    #[serde(default = "default_true")]
    pub single_flight: bool,
}

fn default_port() -> u16 {
    5000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_true() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            single_flight: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.roomscout/config.toml).
    ///
    /// Also checks environment variables:
    /// - `ROOMSCOUT_API_KEY` (highest priority)
    /// - `ANTHROPIC_API_KEY`
    /// - `ROOMSCOUT_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.api_key.is_none() {
            config.api_key = std::env::var("ROOMSCOUT_API_KEY")
                .ok()
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("ROOMSCOUT_MODEL") {
            config.agent.model = model;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".roomscout")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.agent.temperature) {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 1.0".into(),
            ));
        }

        if self.agent.max_tool_calls == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_calls must be at least 1".into(),
            ));
        }

        if self.agent.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("agent.model must not be empty".into()));
        }

        if self.mcp.command.trim().is_empty() {
            return Err(ConfigError::ValidationError("mcp.command must not be empty".into()));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The loop knobs for a single run.
    pub fn agent_config(&self) -> AgentConfig {
        let a = &self.agent;
        AgentConfig {
            model: a.model.clone(),
            system_prompt: a.system_prompt.clone(),
            temperature: a.temperature,
            max_tokens: a.max_tokens,
            max_tool_calls: a.max_tool_calls,
            inter_call_delay: Duration::from_secs(a.inter_call_delay_secs),
            llm_call_delay: Duration::from_secs(a.llm_call_delay_secs),
            retry_backoff: Duration::from_secs(a.retry_backoff_secs),
            run_timeout: a.run_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        let rendered = toml::to_string_pretty(&config).unwrap_or_default();
        let sample: Vec<String> = SAMPLE_SYSTEM_PROMPT.lines().map(|l| format!("# {l}")).collect();
        rendered.replacen(
            "system_prompt = \"\"",
            &format!("# system_prompt = \"\"\"\n{}\n# \"\"\"\nsystem_prompt = \"\"", sample.join("\n")),
            1,
        )
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            agent: AgentSettings::default(),
            mcp: McpServerConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.model, "claude-3-7-sonnet-20250219");
        assert_eq!(config.gateway.port, 5000);
        assert_eq!(config.mcp.command, "npx");
        assert!(config.mcp.args.iter().any(|a| a == "@openbnb/mcp-server-airbnb"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.agent.max_tool_calls, config.agent.max_tool_calls);
        assert_eq!(parsed.mcp.args, config.mcp.args);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.agent.temperature = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_tool_budget_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_tool_calls = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_tool_calls"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.agent.max_tool_calls, 5);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
api_key = "sk-ant-test"

[agent]
max_tool_calls = 2
run_timeout_secs = 120

[mcp]
command = "node"
args = ["server.js"]
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!(config.has_api_key());
        assert_eq!(config.agent.max_tool_calls, 2);
        assert_eq!(config.agent.temperature, 0.2);
        assert_eq!(config.mcp.command, "node");
        assert_eq!(config.mcp.request_timeout_secs, 60);

        let agent = config.agent_config();
        assert_eq!(agent.max_tool_calls, 2);
        assert_eq!(agent.run_timeout, Some(Duration::from_secs(120)));
        assert_eq!(agent.retry_backoff, Duration::from_secs(5));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent\nmodel = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-ant-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-ant-secret"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("claude-3-7-sonnet-20250219"));
        assert!(toml_str.contains("5000"));
    }

    #[test]
    fn system_prompt_defaults_to_empty() {
        assert!(AppConfig::default().agent.system_prompt.is_empty());
        assert!(AppConfig::default().agent_config().system_prompt.is_empty());

        let parsed: AppConfig = toml::from_str("[agent]\nmodel = \"claude-3-7-sonnet-20250219\"\n").unwrap();
        assert!(parsed.agent.system_prompt.is_empty());
    }

    #[test]
    fn default_toml_offers_sample_prompt_commented_out() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("# system_prompt = \"\"\""));
        assert!(toml_str.contains("# You are a travel assistant AI"));

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert!(parsed.agent.system_prompt.is_empty());
    }
}

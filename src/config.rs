//! Configuration management for the assistant service.
//!
//! Configuration is read from environment variables (a `.env` file is loaded
//! first by `main` when present):
//! - `HUGGINGFACEHUB_API_TOKEN` - Required. Token for the hosted model endpoint.
//! - `MODEL_ENDPOINT` - Optional. Text-generation endpoint URL. Defaults to Mixtral-8x7B-Instruct.
//! - `TEMPERATURE`, `MAX_NEW_TOKENS`, `TOP_P`, `REPETITION_PENALTY` - Optional sampling knobs.
//! - `STOP_SEQUENCES` - Optional. Comma separated. Defaults to `Human:,Assistant:,Observation:`.
//! - `HOST` - Optional. Server host. Defaults to `0.0.0.0`.
//! - `PORT` - Optional. Server port. Defaults to `8080`.
//! - `MAX_ITERATIONS` - Optional. Maximum agent loop iterations. Defaults to `15`.
//! - `MAX_EXECUTION_SECS` - Optional. Wall-clock limit for one agent run.
//! - `PARSER_MODE` - Optional. `strict` or `flexible` (default).
//! - `PROMPTS_PATH` - Optional. YAML prompt templates. Defaults to `prompts.yaml`.
//! - `MEMORY_WINDOW` - Optional. Conversation turns remembered per thread. Defaults to `5`.
//! - `MEMORY_MAX_THREADS` - Optional. Threads kept before the least recently used is dropped. Defaults to `1000`.
//! - `FEEDBACK_DIR` - Optional. Feedback storage directory. Defaults to `data/feedback`.
//! - `PYTHON_BIN` / `PYTHON_TIMEOUT_SECS` - Optional. Python sandbox interpreter and timeout.
//! - `SERPAPI_API_KEY` - Optional. Enables the job search tool.
//! - `GOOGLE_CALENDAR_TOKEN` / `GOOGLE_CALENDAR_ID` - Optional. Enables the calendar tool.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::parser::ParserMode;

pub const DEFAULT_MODEL_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/mistralai/Mixtral-8x7B-Instruct-v0.1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_new_tokens: u32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    /// Stop sequences applied in addition to the agent's own `\nObservation`.
    pub stop: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_new_tokens: 1024,
            top_p: 0.95,
            repetition_penalty: 1.1,
            stop: vec![
                "Human:".to_string(),
                "Assistant:".to_string(),
                "Observation:".to_string(),
            ],
        }
    }
}

/// Credentials and knobs for the external tools.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    /// Interpreter used by the Python sandbox
    pub python_bin: String,

    /// Timeout for one sandboxed Python run
    pub python_timeout: Duration,

    /// SerpAPI key (job search is disabled without it)
    pub serpapi_api_key: Option<String>,

    /// Google Calendar OAuth access token (calendar tool is disabled without it)
    pub calendar_token: Option<String>,

    /// Calendar to insert events into
    pub calendar_id: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            python_bin: "python3".to_string(),
            python_timeout: Duration::from_secs(30),
            serpapi_api_key: None,
            calendar_token: None,
            calendar_id: "primary".to_string(),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Token for the hosted model endpoint
    pub api_token: String,

    /// Text-generation endpoint URL
    pub model_endpoint: String,

    /// Sampling parameters
    pub generation: GenerationConfig,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum iterations for the agent loop
    pub max_iterations: usize,

    /// Optional wall-clock limit for one agent run
    pub max_execution_time: Option<Duration>,

    /// Which output parser the agent uses
    pub parser_mode: ParserMode,

    /// YAML file holding the prompt templates
    pub prompts_path: PathBuf,

    /// Conversation turns remembered per thread
    pub memory_window: usize,

    /// Conversation threads kept in memory at once
    pub memory_max_threads: usize,

    /// Directory feedback files are written to
    pub feedback_dir: PathBuf,

    /// Tool settings
    pub tools: ToolsConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `HUGGINGFACEHUB_API_TOKEN` is not set,
    /// and `ConfigError::InvalidValue` for anything that fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_token = std::env::var("HUGGINGFACEHUB_API_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("HUGGINGFACEHUB_API_TOKEN".to_string()))?;

        let model_endpoint = std::env::var("MODEL_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_MODEL_ENDPOINT.to_string());

        let defaults = GenerationConfig::default();
        let generation = GenerationConfig {
            temperature: env_parse("TEMPERATURE", defaults.temperature)?,
            max_new_tokens: env_parse("MAX_NEW_TOKENS", defaults.max_new_tokens)?,
            top_p: env_parse("TOP_P", defaults.top_p)?,
            repetition_penalty: env_parse("REPETITION_PENALTY", defaults.repetition_penalty)?,
            stop: std::env::var("STOP_SEQUENCES")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.stop),
        };

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env_parse("PORT", 8080u16)?;
        let max_iterations = env_parse("MAX_ITERATIONS", 15usize)?;
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let max_execution_time = std::env::var("MAX_EXECUTION_SECS")
            .ok()
            .map(|v| {
                v.trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| ConfigError::InvalidValue("MAX_EXECUTION_SECS".to_string(), e.to_string()))
            })
            .transpose()?;

        let parser_mode = std::env::var("PARSER_MODE")
            .ok()
            .map(|v| {
                v.parse::<ParserMode>()
                    .map_err(|e| ConfigError::InvalidValue("PARSER_MODE".to_string(), e))
            })
            .transpose()?
            .unwrap_or_default();

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("prompts.yaml"));

        let memory_window = env_parse("MEMORY_WINDOW", 5usize)?;
        let memory_max_threads = env_parse("MEMORY_MAX_THREADS", 1000usize)?;
        if memory_max_threads == 0 {
            return Err(ConfigError::InvalidValue(
                "MEMORY_MAX_THREADS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let feedback_dir = std::env::var("FEEDBACK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/feedback"));

        let tool_defaults = ToolsConfig::default();
        let tools = ToolsConfig {
            python_bin: std::env::var("PYTHON_BIN").unwrap_or(tool_defaults.python_bin),
            python_timeout: Duration::from_secs(env_parse("PYTHON_TIMEOUT_SECS", 30u64)?),
            serpapi_api_key: non_empty_var("SERPAPI_API_KEY"),
            calendar_token: non_empty_var("GOOGLE_CALENDAR_TOKEN"),
            calendar_id: std::env::var("GOOGLE_CALENDAR_ID").unwrap_or(tool_defaults.calendar_id),
        };

        Ok(Self {
            api_token,
            model_endpoint,
            generation,
            host,
            port,
            max_iterations,
            max_execution_time,
            parser_mode,
            prompts_path,
            memory_window,
            memory_max_threads,
            feedback_dir,
            tools,
        })
    }

    /// Create a config with default values (useful for testing).
    pub fn new(api_token: String) -> Self {
        Self {
            api_token,
            model_endpoint: DEFAULT_MODEL_ENDPOINT.to_string(),
            generation: GenerationConfig::default(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_iterations: 15,
            max_execution_time: None,
            parser_mode: ParserMode::default(),
            prompts_path: PathBuf::from("prompts.yaml"),
            memory_window: 5,
            memory_max_threads: 1000,
            feedback_dir: PathBuf::from("data/feedback"),
            tools: ToolsConfig::default(),
        }
    }
}

fn env_parse<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_skips_blank_entries() {
        assert_eq!(
            parse_list("Human:, ,Observation: ,"),
            vec!["Human:".to_string(), "Observation:".to_string()]
        );
    }

    #[test]
    fn new_config_uses_defaults() {
        let config = Config::new("token".to_string());
        assert_eq!(config.max_iterations, 15);
        assert_eq!(config.generation.max_new_tokens, 1024);
        assert_eq!(config.generation.stop.len(), 3);
        assert_eq!(config.parser_mode, ParserMode::Flexible);
        assert_eq!(config.tools.calendar_id, "primary");
    }

    #[test]
    fn env_parse_reports_variable_name() {
        std::env::set_var("REACT_ASSISTANT_TEST_PORT", "not-a-port");
        let err = env_parse("REACT_ASSISTANT_TEST_PORT", 1u16).unwrap_err();
        assert!(err.to_string().contains("REACT_ASSISTANT_TEST_PORT"));
        std::env::remove_var("REACT_ASSISTANT_TEST_PORT");
    }
}

//! Parsing of ReAct-format model completions.
//!
//! A completion is turned into an [`AgentStep`]: either a tool invocation or a
//! final answer. Two parsers are provided:
//! - [`ReActOutputParser`] follows the ReAct grammar exactly and reports
//!   violations as [`ParseError`]s.
//! - [`FlexibleOutputParser`] falls back to line-based recovery when the
//!   strict grammar fails, and always produces a step.
//!
//! [`clean_llm_response`] turns a final answer into the user-facing text.

mod cleanup;
mod flexible;
mod react;

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

pub use cleanup::clean_llm_response;
pub use flexible::FlexibleOutputParser;
pub use react::ReActOutputParser;

pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

/// The decision extracted from one model completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStep {
    /// Invoke `tool` with `tool_input`.
    Action {
        tool: String,
        tool_input: String,
        log: String,
    },
    /// Stop and return `output` to the user.
    Finish { output: String, log: String },
}

impl AgentStep {
    /// The raw completion this step was parsed from.
    pub fn log(&self) -> &str {
        match self {
            Self::Action { log, .. } | Self::Finish { log, .. } => log,
        }
    }

    pub(crate) fn finish(output: impl Into<String>, log: impl Into<String>) -> Self {
        Self::Finish {
            output: output.into(),
            log: log.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Parsing LLM output produced both a final answer and a parse-able action: {0}")]
    ActionAndFinalAnswer(String),

    #[error("Invalid Format: Missing 'Action:' after 'Thought:'")]
    MissingAction(String),

    #[error("Invalid Format: Missing 'Action Input:' after 'Action:'")]
    MissingActionInput(String),

    #[error("Could not parse LLM output: `{0}`")]
    Unparseable(String),
}

impl ParseError {
    /// The completion that failed to parse.
    pub fn llm_output(&self) -> &str {
        match self {
            Self::ActionAndFinalAnswer(s)
            | Self::MissingAction(s)
            | Self::MissingActionInput(s)
            | Self::Unparseable(s) => s,
        }
    }
}

/// Turns a raw completion into an [`AgentStep`].
pub trait OutputParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<AgentStep, ParseError>;
}

/// Which parser the agent loop uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParserMode {
    Strict,
    #[default]
    Flexible,
}

impl ParserMode {
    pub fn build(self) -> Box<dyn OutputParser> {
        match self {
            Self::Strict => Box::new(ReActOutputParser),
            Self::Flexible => Box::new(FlexibleOutputParser),
        }
    }
}

impl FromStr for ParserMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" | "react" => Ok(Self::Strict),
            "flexible" | "lenient" => Ok(Self::Flexible),
            other => Err(format!("expected 'strict' or 'flexible', got: {}", other)),
        }
    }
}

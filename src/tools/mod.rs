//! Tools the agent can invoke.
//!
//! Each tool takes the model's single free-text `Action Input` and returns a
//! plain-text observation. Failures surface as `Err` and are turned into
//! `Error: ...` observations by the agent loop, so the model can react to them.

mod calendar;
mod jobs;
mod python;
mod time;
mod web;
mod wikipedia;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::ToolsConfig;

pub use calendar::CreateCalendarEvent;
pub use jobs::GoogleJobSearch;
pub use python::RunPythonCode;
pub use time::CurrentDateAndTime;
pub use web::{InternetSearch, VisitWebpage};
pub use wikipedia::WikipediaSearch;

/// Name of the tool the model can call to end the run explicitly.
pub const FINAL_ANSWER_TOOL: &str = "final_answer";

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (compatible; ReactAssistant/0.1)";

/// A capability the model can request by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// One-line description rendered into the prompt.
    fn description(&self) -> &str;

    async fn execute(&self, input: &str) -> anyhow::Result<String>;
}

/// Name and description of a registered tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Ordered collection of tools, looked up by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard tool set. Job search and calendar tools are only
    /// registered when their credentials are configured.
    pub fn from_config(config: &ToolsConfig) -> anyhow::Result<Self> {
        let http = http_client(Duration::from_secs(30))?;

        let mut registry = Self::new();
        registry.register(Arc::new(CurrentDateAndTime));
        registry.register(Arc::new(InternetSearch::new(http.clone())));
        registry.register(Arc::new(VisitWebpage::new(http_client(Duration::from_secs(20))?)));
        registry.register(Arc::new(WikipediaSearch::new(http.clone())));
        registry.register(Arc::new(RunPythonCode::new(
            config.python_bin.clone(),
            config.python_timeout,
        )));

        match &config.serpapi_api_key {
            Some(key) => registry.register(Arc::new(GoogleJobSearch::new(http.clone(), key.clone()))),
            None => tracing::info!("SERPAPI_API_KEY not set, job search tool disabled"),
        }

        match &config.calendar_token {
            Some(token) => registry.register(Arc::new(CreateCalendarEvent::new(
                http,
                token.clone(),
                config.calendar_id.clone(),
            ))),
            None => tracing::info!("GOOGLE_CALENDAR_TOKEN not set, calendar tool disabled"),
        }

        registry.register(Arc::new(FinalAnswer));
        Ok(registry)
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&i) => self.tools[i] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

/// Returns its input unchanged; the agent loop ends the run when it is called.
pub struct FinalAnswer;

#[async_trait]
impl Tool for FinalAnswer {
    fn name(&self) -> &str {
        FINAL_ANSWER_TOOL
    }

    fn description(&self) -> &str {
        "Provides a final answer to the given problem. Input is the answer itself."
    }

    async fn execute(&self, input: &str) -> anyhow::Result<String> {
        Ok(input.to_string())
    }
}

pub(crate) fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?)
}

/// Truncate to at most `max_chars` characters, appending `suffix` when cut.
pub(crate) fn truncate_chars(s: &str, max_chars: usize, suffix: &str) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{}", &s[..idx], suffix),
        None => s.to_string(),
    }
}

//! Prompt templates for the agent.
//!
//! Templates come from a YAML file with two keys, `system_prompt` and
//! `template`. The template uses `{name}` placeholders (`{{` and `}}` for
//! literal braces) and must reference the ReAct variables `tools`,
//! `tool_names`, `input` and `agent_scratchpad`.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::StepRecord;
use crate::tools::ToolRegistry;

const BUILTIN_PROMPTS: &str = include_str!("../../prompts.yaml");

/// Variables the ReAct template has to reference.
pub const REQUIRED_VARIABLES: [&str; 4] = ["tools", "tool_names", "input", "agent_scratchpad"];

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read prompt templates from {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid prompt templates: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("malformed template at byte {0}: unmatched brace")]
    UnmatchedBrace(usize),

    #[error("template is missing required variables: {0:?}")]
    MissingVariables(Vec<String>),

    #[error("no value supplied for template variable '{0}'")]
    MissingVariable(String),
}

/// Raw templates as stored on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplates {
    #[serde(default)]
    pub system_prompt: String,
    pub template: String,
}

impl PromptTemplates {
    pub fn from_yaml(yaml: &str) -> Result<Self, PromptError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// The templates shipped with the crate.
    pub fn builtin() -> Result<Self, PromptError> {
        Self::from_yaml(BUILTIN_PROMPTS)
    }

    /// Load from `path`, falling back to the built-in templates when the
    /// file does not exist.
    pub fn load_or_builtin(path: &Path) -> Result<Self, PromptError> {
        if !path.exists() {
            tracing::info!(
                "No prompt file at {}, using built-in templates",
                path.display()
            );
            return Self::builtin();
        }

        let yaml = std::fs::read_to_string(path).map_err(|source| PromptError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let templates = Self::from_yaml(&yaml)?;
        tracing::info!("Loaded prompt templates from {}", path.display());
        Ok(templates)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed `{variable}` template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn from_template(template: &str) -> Result<Self, PromptError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, ch)) if ch.is_alphanumeric() || ch == '_' => name.push(ch),
                            _ => return Err(PromptError::UnmatchedBrace(pos)),
                        }
                    }
                    if name.is_empty() {
                        return Err(PromptError::UnmatchedBrace(pos));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Variable(name));
                }
                '}' => return Err(PromptError::UnmatchedBrace(pos)),
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Distinct variable names in order of first use.
    pub fn input_variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Variable(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    pub fn format(&self, values: &HashMap<&str, &str>) -> Result<String, PromptError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = values
                        .get(name.as_str())
                        .ok_or_else(|| PromptError::MissingVariable(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Everything that varies between prompts of one run.
pub struct PromptContext<'a> {
    pub input: &'a str,
    pub chat_history: &'a str,
    pub steps: &'a [StepRecord],
}

/// The validated ReAct prompt.
#[derive(Debug, Clone)]
pub struct ReActPrompt {
    system_prompt: String,
    template: PromptTemplate,
}

impl ReActPrompt {
    pub fn new(templates: &PromptTemplates) -> Result<Self, PromptError> {
        let template = PromptTemplate::from_template(&templates.template)?;
        let present = template.input_variables();
        let missing: Vec<String> = REQUIRED_VARIABLES
            .iter()
            .filter(|v| !present.contains(v))
            .map(|v| v.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PromptError::MissingVariables(missing));
        }

        Ok(Self {
            system_prompt: templates.system_prompt.trim().to_string(),
            template,
        })
    }

    pub fn render(&self, tools: &ToolRegistry, ctx: &PromptContext<'_>) -> Result<String, PromptError> {
        let tool_descriptions = render_tools(tools);
        let tool_names = tools.names().join(", ");
        let scratchpad = format_scratchpad(ctx.steps);
        let chat_history = if ctx.chat_history.trim().is_empty() {
            "(none)"
        } else {
            ctx.chat_history
        };

        let values = HashMap::from([
            ("system_prompt", self.system_prompt.as_str()),
            ("tools", tool_descriptions.as_str()),
            ("tool_names", tool_names.as_str()),
            ("input", ctx.input),
            ("chat_history", chat_history),
            ("agent_scratchpad", scratchpad.as_str()),
        ]);
        self.template.format(&values)
    }
}

/// One `name: description` line per tool.
pub fn render_tools(tools: &ToolRegistry) -> String {
    tools
        .list_tools()
        .iter()
        .map(|t| format!("{}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prior steps as the model should see them: its own text followed by the
/// observation, then a fresh `Thought:` cue.
pub fn format_scratchpad(steps: &[StepRecord]) -> String {
    let mut thoughts = String::new();
    for step in steps {
        thoughts.push_str(&step.log);
        thoughts.push_str("\nObservation: ");
        thoughts.push_str(&step.observation);
        thoughts.push_str("\nThought: ");
    }
    thoughts
}

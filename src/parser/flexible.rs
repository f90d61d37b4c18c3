//! Recovering parser for completions that break the ReAct grammar.
//!
//! Hosted models regularly answer a greeting without any ReAct keywords,
//! emit an action and a final answer in the same turn, spread an action input
//! over several lines, or leave a dangling `Observation` behind. This parser
//! tries the strict grammar first and otherwise reconstructs the most likely
//! step from the individual lines. It never fails: the whole completion is
//! the answer of last resort.

use std::sync::LazyLock;

use regex::Regex;

use super::react::ReActOutputParser;
use super::{AgentStep, OutputParser, ParseError, FINAL_ANSWER_MARKER};

const REACT_KEYWORDS: [&str; 3] = ["Thought:", "Action:", FINAL_ANSWER_MARKER];

/// Line prefixes that end a multi-line action input.
const SECTION_PREFIXES: [&str; 4] = ["Thought:", "Action:", FINAL_ANSWER_MARKER, "Observation"];

static TRAILING_OBSERVATION_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\nObservation\s*$").unwrap());

static TRAILING_OBSERVATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Observation\s*$").unwrap());

static INPUT_OBSERVATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*Observation\s*$").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct FlexibleOutputParser;

impl OutputParser for FlexibleOutputParser {
    fn parse(&self, text: &str) -> Result<AgentStep, ParseError> {
        let trimmed = text.trim();
        let text = TRAILING_OBSERVATION_LINE_RE.replace(trimmed, "");
        let text = TRAILING_OBSERVATION_RE.replace(&text, "").trim_end().to_string();

        if !REACT_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            return Ok(AgentStep::finish(text.clone(), text));
        }

        if text.starts_with(FINAL_ANSWER_MARKER) {
            let output = text.replace(FINAL_ANSWER_MARKER, "").trim().to_string();
            return Ok(AgentStep::finish(output, text));
        }

        match ReActOutputParser.parse(&text) {
            Ok(step) => Ok(step),
            Err(e) => {
                tracing::debug!("Standard ReAct parsing failed, recovering: {}", e);
                Ok(recover_malformed(&text))
            }
        }
    }
}

/// Line-based reconstruction of a step from malformed ReAct text.
fn recover_malformed(text: &str) -> AgentStep {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut action = String::new();
    let mut action_input = String::new();
    let mut final_answer = String::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        if let Some(rest) = line.strip_prefix("Action Input:") {
            action_input = rest.trim().to_string();
            let mut j = i + 1;
            while j < lines.len() && !starts_section(lines[j]) {
                action_input.push(' ');
                action_input.push_str(lines[j]);
                j += 1;
            }
            i = j;
            continue;
        } else if let Some(rest) = line.strip_prefix("Action:") {
            action = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix(FINAL_ANSWER_MARKER) {
            final_answer = rest.trim().to_string();
            for extra in &lines[i + 1..] {
                final_answer.push(' ');
                final_answer.push_str(extra);
            }
            break;
        }

        i += 1;
    }

    let action_input = INPUT_OBSERVATION_RE
        .replace(&action_input, "")
        .trim()
        .to_string();

    if !action.is_empty() && !action_input.is_empty() {
        tracing::debug!("Recovered action {} with input {}", action, action_input);
        return AgentStep::Action {
            tool: action,
            tool_input: action_input,
            log: text.to_string(),
        };
    }

    if !final_answer.is_empty() {
        return AgentStep::finish(final_answer, text);
    }

    AgentStep::finish(text, text)
}

fn starts_section(line: &str) -> bool {
    SECTION_PREFIXES.iter().any(|p| line.starts_with(p))
}

//! Strict ReAct grammar.

use std::sync::LazyLock;

use regex::Regex;

use super::{AgentStep, OutputParser, ParseError, FINAL_ANSWER_MARKER};

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
        .unwrap()
});

static ACTION_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)").unwrap());

static ACTION_INPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)").unwrap());

/// Parses `Thought / Action / Action Input` or `Final Answer` completions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReActOutputParser;

impl OutputParser for ReActOutputParser {
    fn parse(&self, text: &str) -> Result<AgentStep, ParseError> {
        let includes_answer = text.contains(FINAL_ANSWER_MARKER);

        if let Some(caps) = ACTION_RE.captures(text) {
            if includes_answer {
                return Err(ParseError::ActionAndFinalAnswer(text.to_string()));
            }
            let tool = caps[1].trim().to_string();
            let tool_input = caps[2].trim_matches(' ').trim_matches('"').to_string();
            return Ok(AgentStep::Action {
                tool,
                tool_input,
                log: text.to_string(),
            });
        }

        if includes_answer {
            let output = text
                .rsplit(FINAL_ANSWER_MARKER)
                .next()
                .unwrap_or_default()
                .trim();
            return Ok(AgentStep::finish(output, text));
        }

        if !ACTION_ONLY_RE.is_match(text) {
            Err(ParseError::MissingAction(text.to_string()))
        } else if !ACTION_INPUT_RE.is_match(text) {
            Err(ParseError::MissingActionInput(text.to_string()))
        } else {
            Err(ParseError::Unparseable(text.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<AgentStep, ParseError> {
        ReActOutputParser.parse(text)
    }

    #[test]
    fn parses_action_and_input() {
        let text = "Thought: I need the time\nAction: current_date_and_time\nAction Input: \"Europe/Athens\"";
        match parse(text).unwrap() {
            AgentStep::Action {
                tool, tool_input, ..
            } => {
                assert_eq!(tool, "current_date_and_time");
                assert_eq!(tool_input, "Europe/Athens");
            }
            other => panic!("expected action, got {:?}", other),
        }
    }

    #[test]
    fn numbered_action_labels_are_accepted() {
        let text = "Action 1: internet_search\nAction 1 Input: rust async";
        let step = parse(text).unwrap();
        assert!(matches!(step, AgentStep::Action { ref tool, .. } if tool == "internet_search"));
    }

    #[test]
    fn multi_line_input_is_kept() {
        let text = "Action: run_python_code\nAction Input: x = 2\nprint(x * 21)";
        match parse(text).unwrap() {
            AgentStep::Action { tool_input, .. } => assert_eq!(tool_input, "x = 2\nprint(x * 21)"),
            other => panic!("expected action, got {:?}", other),
        }
    }

    #[test]
    fn final_answer_uses_last_marker() {
        let text = "Thought: done\nFinal Answer: first\nFinal Answer: second ";
        assert_eq!(
            parse(text).unwrap(),
            AgentStep::finish("second", text)
        );
    }

    #[test]
    fn action_with_final_answer_is_rejected() {
        let text = "Action: internet_search\nAction Input: weather\nFinal Answer: sunny";
        assert!(matches!(parse(text), Err(ParseError::ActionAndFinalAnswer(_))));
    }

    #[test]
    fn missing_action_and_missing_input_are_distinguished() {
        assert!(matches!(
            parse("Thought: just thinking"),
            Err(ParseError::MissingAction(_))
        ));
        let err = parse("Thought: hmm\nAction: wikipedia_search").unwrap_err();
        assert!(matches!(err, ParseError::MissingActionInput(_)));
        assert_eq!(err.llm_output(), "Thought: hmm\nAction: wikipedia_search");
    }
}

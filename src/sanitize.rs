//! Input sanitizing for text the model hands to tools.
//!
//! Models leak chat-template tokens (`<|eot_id|>` and friends) and keep
//! writing the next ReAct section into an argument. Everything passed to a
//! tool goes through [`clean_input`] first.

use std::sync::LazyLock;

use regex::Regex;

/// Keywords that mark the end of a tool argument.
pub const STOP_PATTERNS: [&str; 6] = [
    "Observation:",
    "Human:",
    "Assistant:",
    "Thought:",
    "Action:",
    "Action Input:",
];

static SPECIAL_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<\|.*?\|>").unwrap());

/// Opening fence; the language tag only counts as a whole word right after backticks.
static FENCE_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:`+(?:(?i:python3?|py)\b)?[ \t]*\r?\n?)?").unwrap()
});

static FENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\s|`)*$").unwrap());

/// Strip special tokens and cut the text at the first stop keyword.
pub fn clean_input(input: &str) -> String {
    let without_tokens = input.replace("<|eom_id|>", "").replace("<|eot_id|>", "");
    let mut cleaned = SPECIAL_TOKEN_RE
        .replace_all(&without_tokens, "")
        .trim()
        .to_string();

    for pattern in STOP_PATTERNS {
        if let Some(idx) = cleaned.find(pattern) {
            cleaned = cleaned[..idx].trim().to_string();
        }
    }

    cleaned
}

/// Remove markdown code fences (and the `python` tag of an opening fence) around code.
pub fn strip_code_fences(code: &str) -> String {
    let head = FENCE_START_RE.replace(code, "");
    FENCE_END_RE.replace(&head, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_special_tokens() {
        assert_eq!(clean_input("Europe/Athens<|eot_id|>"), "Europe/Athens");
        assert_eq!(clean_input("<|start_header_id|>query<|eom_id|>"), "query");
    }

    #[test]
    fn truncates_at_stop_patterns() {
        assert_eq!(
            clean_input("rust jobs in Berlin\nObservation: none yet"),
            "rust jobs in Berlin"
        );
        assert_eq!(
            clean_input("  America/New_York \nThought: I now know"),
            "America/New_York"
        );
    }

    #[test]
    fn leaves_plain_input_alone() {
        assert_eq!(clean_input("  Alan Turing  "), "Alan Turing");
        assert_eq!(clean_input(""), "");
    }

    #[test]
    fn strips_python_fences() {
        assert_eq!(strip_code_fences("```python\nprint(1)\n```"), "print(1)");
        assert_eq!(strip_code_fences("```\nx = 2\nprint(x)\n```\n"), "x = 2\nprint(x)");
        assert_eq!(strip_code_fences("print('hi')"), "print('hi')");
        assert_eq!(strip_code_fences("```py\nprint(2)\n```"), "print(2)");
        assert_eq!(strip_code_fences("`print(3)`"), "print(3)");
    }

    #[test]
    fn identifiers_starting_with_python_survive() {
        assert_eq!(
            strip_code_fences("pythonic = 1\nprint(pythonic)"),
            "pythonic = 1\nprint(pythonic)"
        );
        assert_eq!(
            strip_code_fences("python_version = 3\nprint(python_version)"),
            "python_version = 3\nprint(python_version)"
        );
        assert_eq!(
            strip_code_fences("```\npythonic = 1\n```"),
            "pythonic = 1"
        );
    }
}

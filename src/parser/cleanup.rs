//! Cleanup of the text shown to the user.

use super::FINAL_ANSWER_MARKER;

/// Extract the user-facing part of a model response.
///
/// Keeps only what follows the last `Final Answer:` when there is one;
/// otherwise drops empty lines and lines that read like the model talking to
/// itself ("Let's ...", "I should ...", "instead", "attempt").
pub fn clean_llm_response(output: &str) -> String {
    let output = output.split("<|eot_id|>").next().unwrap_or_default();

    if let Some(idx) = output.rfind(FINAL_ANSWER_MARKER) {
        let answer = output[idx + FINAL_ANSWER_MARKER.len()..].trim();
        let answer = answer.split("Human:").next().unwrap_or_default();
        return answer.trim().to_string();
    }

    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_internal_note(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn is_internal_note(line: &str) -> bool {
    let lower = line.to_lowercase();
    line.starts_with("Let's")
        || lower.contains("instead")
        || lower.contains("attempt")
        || lower.contains("should")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_text_after_last_final_answer() {
        let raw = "Thought: x\nFinal Answer: draft\nFinal Answer: The answer is 42.\nHuman: thanks";
        assert_eq!(clean_llm_response(raw), "The answer is 42.");
    }

    #[test]
    fn cuts_at_end_of_turn_token() {
        assert_eq!(
            clean_llm_response("Sure thing.<|eot_id|>Final Answer: leaked"),
            "Sure thing."
        );
    }

    #[test]
    fn drops_internal_notes() {
        let raw = "Let's think about it.\nThe capital of France is Paris.\n\nI should double check.\nAn attempt was made.\nIt has 2.1M residents.";
        assert_eq!(
            clean_llm_response(raw),
            "The capital of France is Paris.\nIt has 2.1M residents."
        );
    }
}

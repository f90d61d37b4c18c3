//! Core agent loop implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::llm::{HuggingFaceEndpoint, LlmClient, LlmError};
use crate::parser::{AgentStep, OutputParser, ParserMode};
use crate::tools::{ToolRegistry, FINAL_ANSWER_TOOL};

use super::prompt::{format_scratchpad, PromptContext, PromptError, PromptTemplates, ReActPrompt};

/// Observation fed back when a completion could not be parsed.
pub const INVALID_RESPONSE_OBSERVATION: &str = "Invalid or incomplete response";

/// Output returned when the loop runs out of iterations or time.
pub const EARLY_STOP_OUTPUT: &str = "Agent stopped due to iteration limit or time limit.";

/// Stop sequence that keeps the model from inventing its own observations.
const OBSERVATION_STOP: &str = "\nObservation";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("request was cancelled")]
    Cancelled,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    FinalAnswer,
    IterationLimit,
    TimeLimit,
}

/// One tool invocation and what it returned.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub tool: String,
    pub tool_input: String,
    /// The completion the action was parsed from.
    pub log: String,
    pub observation: String,
}

/// Input for one run.
#[derive(Debug, Clone, Default)]
pub struct AgentRequest {
    pub input: String,
    /// Rendered prior turns of the conversation, possibly empty.
    pub chat_history: String,
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRun {
    pub output: String,
    pub steps: Vec<StepRecord>,
    pub iterations: usize,
    pub stop_reason: StopReason,
    /// The completion that produced the final answer.
    #[serde(skip)]
    pub final_log: String,
}

impl AgentRun {
    /// The reasoning trace shown to the user, or `None` when the model
    /// answered straight away without any visible reasoning.
    pub fn thought_process(&self) -> Option<String> {
        let mut trace = format_scratchpad(&self.steps);
        let final_log = self.final_log.trim();
        if !final_log.is_empty() {
            trace.push_str(final_log);
        }
        let trace = trace.trim();

        if trace.is_empty() || (self.steps.is_empty() && trace == self.output.trim()) {
            None
        } else {
            Some(trace.to_string())
        }
    }
}

/// Iteration and wall-clock bounds for one run.
#[derive(Debug, Clone, Copy)]
pub struct AgentLimits {
    pub max_iterations: usize,
    pub max_execution_time: Option<Duration>,
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            max_execution_time: None,
        }
    }
}

/// The ReAct agent.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    prompt: ReActPrompt,
    parser: Box<dyn OutputParser>,
    limits: AgentLimits,
    stop: Vec<String>,
}

impl Agent {
    /// Create an agent with the flexible parser and default limits.
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolRegistry, prompt: ReActPrompt) -> Self {
        Self {
            llm,
            tools,
            prompt,
            parser: ParserMode::default().build(),
            limits: AgentLimits::default(),
            stop: vec![OBSERVATION_STOP.to_string()],
        }
    }

    /// Build the agent described by `config`: hosted model, standard tools
    /// and the configured prompt file.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let llm = Arc::new(HuggingFaceEndpoint::new(
            config.model_endpoint.clone(),
            config.api_token.clone(),
            config.generation.clone(),
        ));
        let tools = ToolRegistry::from_config(&config.tools)?;
        let templates = PromptTemplates::load_or_builtin(&config.prompts_path)?;
        let prompt = ReActPrompt::new(&templates)?;

        Ok(Self::new(llm, tools, prompt)
            .with_parser(config.parser_mode)
            .with_limits(AgentLimits {
                max_iterations: config.max_iterations,
                max_execution_time: config.max_execution_time,
            })
            .with_stop_sequences(config.generation.stop.clone()))
    }

    pub fn with_parser(mut self, mode: ParserMode) -> Self {
        self.parser = mode.build();
        self
    }

    pub fn with_limits(mut self, limits: AgentLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Extra stop sequences, on top of the observation stop.
    pub fn with_stop_sequences(mut self, stop: Vec<String>) -> Self {
        for s in stop {
            if !s.is_empty() && !self.stop.contains(&s) {
                self.stop.push(s);
            }
        }
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run the loop until the model answers, a limit is hit, or `cancel`
    /// fires.
    pub async fn run(
        &self,
        request: &AgentRequest,
        cancel: &CancellationToken,
    ) -> Result<AgentRun, AgentError> {
        let started = Instant::now();
        let mut steps: Vec<StepRecord> = Vec::new();
        let mut iterations = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            if iterations >= self.limits.max_iterations {
                tracing::warn!("Agent hit iteration limit ({})", self.limits.max_iterations);
                return Ok(stopped(steps, iterations, StopReason::IterationLimit));
            }
            if self
                .limits
                .max_execution_time
                .is_some_and(|limit| started.elapsed() >= limit)
            {
                tracing::warn!("Agent hit time limit after {:?}", started.elapsed());
                return Ok(stopped(steps, iterations, StopReason::TimeLimit));
            }

            iterations += 1;
            tracing::debug!("Agent iteration {}", iterations);

            let prompt = self.prompt.render(
                &self.tools,
                &PromptContext {
                    input: &request.input,
                    chat_history: &request.chat_history,
                    steps: &steps,
                },
            )?;

            let completion = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                result = self.llm.generate(&prompt, &self.stop) => result?,
            };
            tracing::debug!("Model output: {}", truncate_for_log(&completion, 500));

            let step = match self.parser.parse(&completion) {
                Ok(step) => step,
                Err(e) => {
                    tracing::warn!("Could not parse model output: {}", e);
                    steps.push(StepRecord {
                        tool: "_Exception".to_string(),
                        tool_input: INVALID_RESPONSE_OBSERVATION.to_string(),
                        log: completion,
                        observation: INVALID_RESPONSE_OBSERVATION.to_string(),
                    });
                    continue;
                }
            };

            let (tool, tool_input, log) = match step {
                AgentStep::Finish { output, log } => {
                    tracing::info!("Agent finished after {} iterations", iterations);
                    return Ok(AgentRun {
                        output,
                        steps,
                        iterations,
                        stop_reason: StopReason::FinalAnswer,
                        final_log: log,
                    });
                }
                AgentStep::Action {
                    tool,
                    tool_input,
                    log,
                } => (normalize_tool_name(&tool), tool_input, log),
            };

            if tool == FINAL_ANSWER_TOOL {
                tracing::info!("Agent called {} after {} iterations", FINAL_ANSWER_TOOL, iterations);
                return Ok(AgentRun {
                    output: tool_input,
                    steps,
                    iterations,
                    stop_reason: StopReason::FinalAnswer,
                    final_log: log,
                });
            }

            let observation = match self.tools.get(&tool) {
                None => {
                    tracing::warn!("Model requested unknown tool '{}'", tool);
                    format!(
                        "{} is not a valid tool, try one of [{}].",
                        tool,
                        self.tools.names().join(", ")
                    )
                }
                Some(handler) => {
                    tracing::info!("Calling tool: {} with input: {}", tool, truncate_for_log(&tool_input, 200));
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                        result = handler.execute(&tool_input) => result,
                    };
                    match result {
                        Ok(output) => output,
                        Err(e) => {
                            tracing::warn!("Tool {} failed: {}", tool, e);
                            format!("Error: {}", e)
                        }
                    }
                }
            };
            tracing::debug!("Observation: {}", truncate_for_log(&observation, 1000));

            steps.push(StepRecord {
                tool,
                tool_input,
                log,
                observation,
            });
        }
    }
}

fn stopped(steps: Vec<StepRecord>, iterations: usize, stop_reason: StopReason) -> AgentRun {
    AgentRun {
        output: EARLY_STOP_OUTPUT.to_string(),
        steps,
        iterations,
        stop_reason,
        final_log: String::new(),
    }
}

/// Models sometimes decorate the tool name: `` `wikipedia_search` ``,
/// `[internet_search]`, `Internet_Search.`.
fn normalize_tool_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | '[' | ']' | '.' | '*') || c.is_whitespace())
        .to_lowercase()
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}... [truncated]", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FinalAnswer, Tool};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned completions and records the prompts it saw.
    struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(&self, prompt: &str, stop: &[String]) -> Result<String, LlmError> {
            assert!(stop.iter().any(|s| s == OBSERVATION_STOP));
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(LlmError::Empty)
        }
    }

    /// Never answers.
    struct HangingLlm;

    #[async_trait]
    impl LlmClient for HangingLlm {
        async fn generate(&self, _prompt: &str, _stop: &[String]) -> Result<String, LlmError> {
            std::future::pending().await
        }
    }

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Uppercases its input."
        }

        async fn execute(&self, input: &str) -> anyhow::Result<String> {
            if input.is_empty() {
                anyhow::bail!("nothing to uppercase");
            }
            Ok(input.to_uppercase())
        }
    }

    fn tools() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(Upper));
        tools.register(Arc::new(FinalAnswer));
        tools
    }

    fn agent(llm: Arc<dyn LlmClient>) -> Agent {
        let prompt = ReActPrompt::new(&PromptTemplates::builtin().unwrap()).unwrap();
        Agent::new(llm, tools(), prompt)
    }

    fn request(input: &str) -> AgentRequest {
        AgentRequest {
            input: input.to_string(),
            chat_history: String::new(),
        }
    }

    #[tokio::test]
    async fn direct_final_answer() {
        let llm = ScriptedLlm::new(&[" I know this.\nFinal Answer: Paris"]);
        let run = agent(llm.clone())
            .run(&request("Capital of France?"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.output, "Paris");
        assert_eq!(run.iterations, 1);
        assert_eq!(run.stop_reason, StopReason::FinalAnswer);
        assert!(run.steps.is_empty());
        assert!(llm.prompts()[0].contains("Question: Capital of France?"));
    }

    #[tokio::test]
    async fn tool_observation_is_fed_back() {
        let llm = ScriptedLlm::new(&[
            " I should shout.\nAction: upper\nAction Input: hello",
            " I now know the final answer\nFinal Answer: HELLO",
        ]);
        let run = agent(llm.clone())
            .run(&request("Shout hello"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.output, "HELLO");
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].observation, "HELLO");
        assert!(llm.prompts()[1].ends_with(
            "Thought:I should shout.\nAction: upper\nAction Input: hello\nObservation: HELLO\nThought: "
        ));

        let trace = run.thought_process().unwrap();
        assert!(trace.contains("Observation: HELLO"));
        assert!(trace.ends_with("Final Answer: HELLO"));
    }

    #[tokio::test]
    async fn unknown_tool_and_tool_errors_become_observations() {
        let llm = ScriptedLlm::new(&[
            "Action: `Shout`\nAction Input: hi",
            "Action: upper\nAction Input: ",
            "Final Answer: gave up",
        ]);
        let run = agent(llm)
            .run(&request("x"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            run.steps[0].observation,
            "shout is not a valid tool, try one of [upper, final_answer]."
        );
        assert_eq!(run.steps[1].observation, "Error: nothing to uppercase");
        assert_eq!(run.output, "gave up");
    }

    #[tokio::test]
    async fn final_answer_tool_ends_the_run() {
        let llm = ScriptedLlm::new(&["Thought: done\nAction: final_answer\nAction Input: 42"]);
        let run = agent(llm)
            .run(&request("x"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(run.output, "42");
        assert_eq!(run.stop_reason, StopReason::FinalAnswer);
    }

    #[tokio::test]
    async fn strict_parse_failures_are_retried() {
        let llm = ScriptedLlm::new(&["I am not following the format", "Final Answer: ok"]);
        let run = agent(llm.clone())
            .with_parser(ParserMode::Strict)
            .run(&request("x"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.output, "ok");
        assert_eq!(run.steps[0].observation, INVALID_RESPONSE_OBSERVATION);
        assert!(llm.prompts()[1].contains("Observation: Invalid or incomplete response"));
    }

    #[tokio::test]
    async fn iteration_limit_stops_the_loop() {
        let llm = ScriptedLlm::new(&[
            "Action: upper\nAction Input: a",
            "Action: upper\nAction Input: b",
            "Action: upper\nAction Input: c",
        ]);
        let run = agent(llm)
            .with_limits(AgentLimits {
                max_iterations: 2,
                max_execution_time: None,
            })
            .run(&request("x"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.output, EARLY_STOP_OUTPUT);
        assert_eq!(run.stop_reason, StopReason::IterationLimit);
        assert_eq!(run.iterations, 2);
    }

    #[tokio::test]
    async fn time_limit_stops_the_loop() {
        let llm = ScriptedLlm::new(&["Action: upper\nAction Input: a"]);
        let run = agent(llm)
            .with_limits(AgentLimits {
                max_iterations: 10,
                max_execution_time: Some(Duration::ZERO),
            })
            .run(&request("x"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(run.stop_reason, StopReason::TimeLimit);
        assert_eq!(run.iterations, 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_pending_model_call() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = agent(Arc::new(HangingLlm))
            .run(&request("x"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }

    #[tokio::test]
    async fn model_failure_is_an_error() {
        let llm = ScriptedLlm::new(&[]);
        let err = agent(llm)
            .run(&request("x"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Llm(LlmError::Empty)));
    }

    #[test]
    fn stop_sequences_are_deduplicated() {
        let agent = agent(ScriptedLlm::new(&[])).with_stop_sequences(vec![
            "Human:".to_string(),
            "\nObservation".to_string(),
            String::new(),
        ]);
        assert_eq!(agent.stop, vec!["\nObservation".to_string(), "Human:".to_string()]);
    }

    #[test]
    fn thought_process_is_hidden_for_bare_answers() {
        let run = AgentRun {
            output: "Paris".to_string(),
            steps: Vec::new(),
            iterations: 1,
            stop_reason: StopReason::FinalAnswer,
            final_log: "Paris".to_string(),
        };
        assert!(run.thought_process().is_none());
    }

    #[test]
    fn tool_names_are_normalized() {
        assert_eq!(normalize_tool_name(" `Wikipedia_Search`. "), "wikipedia_search");
        assert_eq!(normalize_tool_name("[internet_search]"), "internet_search");
    }

    #[test]
    fn log_truncation_respects_char_boundaries() {
        assert_eq!(truncate_for_log("ααααα", 2), "αα... [truncated]");
    }
}

//! Agent module - the ReAct reasoning loop.
//!
//! The agent alternates between the model and the tools:
//! 1. Render the prompt with the question, history and scratchpad
//! 2. Ask the model for the next Thought/Action, stopping before it can
//!    write its own Observation
//! 3. Parse the completion; run the requested tool and append the result
//! 4. Repeat until a final answer, a limit, or cancellation

mod agent_loop;
mod prompt;

pub use agent_loop::{
    Agent, AgentError, AgentLimits, AgentRequest, AgentRun, StepRecord, StopReason,
    EARLY_STOP_OUTPUT, INVALID_RESPONSE_OBSERVATION,
};
pub use prompt::{
    format_scratchpad, render_tools, PromptContext, PromptError, PromptTemplate, PromptTemplates,
    ReActPrompt, REQUIRED_VARIABLES,
};

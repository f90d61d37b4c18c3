//! # React Assistant
//!
//! A conversational assistant that answers questions with a ReAct agent
//! running on a hosted text-generation model.
//!
//! This library provides:
//! - An HTTP API for chat queries, cancellation and feedback
//! - A ReAct loop that alternates model calls and tool invocations
//! - Recovery parsing for completions that break the ReAct format
//! - Web search, Wikipedia, Python, date/time, job search and calendar tools
//!
//! ## Architecture
//!
//! 1. A query arrives via the API with an optional conversation thread
//! 2. The prompt is assembled from the template, tool list, history and
//!    scratchpad
//! 3. The model's completion is parsed into an action or a final answer
//! 4. Actions run a tool and feed the observation back, until the model
//!    answers or a limit is hit
//!
//! ## Example
//!
//! ```rust,ignore
//! use react_assistant::{agent::{Agent, AgentRequest}, config::Config};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = Config::from_env()?;
//! let agent = Agent::from_config(&config)?;
//! let request = AgentRequest { input: "What time is it in Tokyo?".into(), ..Default::default() };
//! let run = agent.run(&request, &CancellationToken::new()).await?;
//! println!("{}", run.output);
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod feedback;
pub mod llm;
pub mod memory;
pub mod parser;
pub mod sanitize;
pub mod tools;

pub use config::Config;

//! API request and response types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::StopReason;
use crate::memory::Turn;

/// Request to ask the agent a question.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// The user's question
    pub query: String,

    /// Conversation to continue; a new one is started when absent
    #[serde(default)]
    pub thread_id: Option<String>,

    /// Client-chosen id used to cancel this request
    #[serde(default)]
    pub request_id: Option<Uuid>,

    /// Free-form client context (accepted for compatibility, currently unused)
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

/// Outcome of a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Success,
    Cancelled,
}

/// Response to a query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub status: QueryStatus,

    pub thread_id: String,

    pub request_id: Uuid,

    /// Cleaned answer text
    pub response: String,

    /// Reasoning trace, when the model produced one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_thought_process: Option<String>,

    /// Model calls made
    pub iterations: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

/// Response to a cancellation request.
#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub status: String,
    pub request_id: Uuid,
}

/// Remembered turns of a thread.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadResponse {
    pub thread_id: String,
    pub turns: Vec<Turn>,
}

/// Response to clearing a thread.
#[derive(Debug, Clone, Serialize)]
pub struct ClearThreadResponse {
    pub thread_id: String,
    /// Whether the thread had any history
    pub cleared: bool,
}

/// User feedback submission.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub feedback: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Registered tool count
    pub tools: usize,

    /// Queries currently running
    pub in_flight: usize,
}

/// FastAPI-style error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

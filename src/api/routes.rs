//! HTTP routes and handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::inflight::InFlightRequests;
use super::types::{
    CancelResponse, ClearThreadResponse, ErrorResponse, FeedbackRequest, HealthResponse,
    QueryRequest, QueryResponse, QueryStatus, ThreadResponse,
};
use crate::agent::{Agent, AgentError, AgentRequest, AgentRun, StopReason};
use crate::config::Config;
use crate::feedback::{FeedbackError, FeedbackReceipt, FeedbackStore};
use crate::memory::ConversationMemory;
use crate::parser::{clean_llm_response, FINAL_ANSWER_MARKER};
use crate::tools::ToolInfo;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub agent: Agent,
    pub memory: ConversationMemory,
    pub feedback: FeedbackStore,
    pub in_flight: InFlightRequests,
}

impl AppState {
    pub fn new(config: Config, agent: Agent) -> Self {
        let memory = ConversationMemory::new(config.memory_window, config.memory_max_threads);
        let feedback = FeedbackStore::new(config.feedback_dir.clone());
        Self {
            config,
            agent,
            memory,
            feedback,
            in_flight: InFlightRequests::new(),
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/agent/query", post(query_agent))
        .route("/agent/cancel/:request_id", post(cancel_request))
        .route("/agent/threads/:thread_id", get(get_thread).delete(clear_thread))
        .route("/feedback", post(submit_feedback))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
        .into_response()
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tools: state.agent.tools().len(),
        in_flight: state.in_flight.len(),
    })
}

async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolInfo>> {
    Json(state.agent.tools().list_tools())
}

/// Run the agent on one question within a conversation thread.
async fn query_agent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, Response> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Query must not be empty"));
    }

    let thread_id = req
        .thread_id
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let request_id = req.request_id.unwrap_or_else(Uuid::new_v4);

    let Some(guard) = state.in_flight.register(request_id) else {
        return Err(error_response(
            StatusCode::CONFLICT,
            format!("Request {} is already running", request_id),
        ));
    };

    tracing::info!("Query {} on thread {}: {}", request_id, thread_id, query);

    let request = AgentRequest {
        input: query.to_string(),
        chat_history: state.memory.render(&thread_id).await,
    };

    match state.agent.run(&request, guard.token()).await {
        Ok(run) => {
            let response = user_facing_answer(&run);
            state.memory.append(&thread_id, query, &response).await;

            Ok(Json(QueryResponse {
                status: QueryStatus::Success,
                thread_id,
                request_id,
                full_thought_process: run.thought_process(),
                response,
                iterations: run.iterations,
                stop_reason: Some(run.stop_reason),
            }))
        }
        Err(AgentError::Cancelled) => {
            tracing::info!("Query {} was cancelled", request_id);
            Ok(Json(QueryResponse {
                status: QueryStatus::Cancelled,
                thread_id,
                request_id,
                response: "Request was cancelled.".to_string(),
                full_thought_process: None,
                iterations: 0,
                stop_reason: None,
            }))
        }
        Err(e) => {
            tracing::error!("Query {} failed: {}", request_id, e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error processing query: {}", e),
            ))
        }
    }
}

/// The answer text shown to the user and remembered for the thread.
///
/// A `Final Answer:` completion is cleaned from the raw text so the answer
/// keeps all its lines. Only bare replies without ReAct markup get the
/// internal-note filter; `final_answer` tool inputs and early stops are
/// returned as they are.
fn user_facing_answer(run: &AgentRun) -> String {
    let output = run.output.trim();
    if run.stop_reason != StopReason::FinalAnswer {
        return output.to_string();
    }

    let cleaned = if run.final_log.contains(FINAL_ANSWER_MARKER) {
        clean_llm_response(&run.final_log)
    } else if run.final_log.trim() == output {
        clean_llm_response(output)
    } else {
        output.to_string()
    };

    if cleaned.is_empty() {
        output.to_string()
    } else {
        cleaned
    }
}

async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<CancelResponse>, Response> {
    if state.in_flight.cancel(request_id) {
        tracing::info!("Cancellation requested for {}", request_id);
        Ok(Json(CancelResponse {
            status: "cancelling".to_string(),
            request_id,
        }))
    } else {
        Err(error_response(
            StatusCode::NOT_FOUND,
            format!("No running request with id {}", request_id),
        ))
    }
}

async fn get_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Json<ThreadResponse> {
    let turns = state.memory.history(&thread_id).await;
    Json(ThreadResponse { thread_id, turns })
}

async fn clear_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Json<ClearThreadResponse> {
    let cleared = state.memory.clear(&thread_id).await;
    tracing::info!("Cleared thread {} (had history: {})", thread_id, cleared);
    Json(ClearThreadResponse { thread_id, cleared })
}

async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackReceipt>, Response> {
    match state.feedback.store(&req.contact, &req.feedback).await {
        Ok(receipt) => Ok(Json(receipt)),
        Err(FeedbackError::Validation(msg)) => Err(error_response(StatusCode::BAD_REQUEST, msg)),
        Err(e) => {
            tracing::error!("Failed to store feedback: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error saving feedback: {}", e),
            ))
        }
    }
}

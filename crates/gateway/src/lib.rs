//! HTTP API gateway for SmartDay.
//!
//! Exposes the chat endpoint the web front end calls, plus health, tool
//! catalog and session management routes.
//!
//! Built on Axum.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode, header},
    response::Json,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use smartday_agent::{ChatInput, ChatService};
use smartday_config::{AppConfig, GatewayConfig};
use smartday_core::message::SessionId;
use smartday_core::tool::ToolDescriptor;

/// Request body size limit.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub chat: ChatService,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS restricted to `gateway.allowed_origins`
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/tools", get(list_tools_handler))
        .route("/chatbot/chat-api", post(chat_handler))
        .route("/chatbot/sessions/{id}", delete(delete_session_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(&gateway.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
///
/// Provider, tools and sessions are built once and shared by every request.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let router = smartday_providers::build_from_config(&config);
    let provider = router
        .default_provider()
        .ok_or_else(|| format!("provider '{}' is not configured", config.default_provider))?;
    if !config.has_api_key() {
        warn!("No API key configured; every reply will be the service apology");
    }

    let tools = Arc::new(smartday_tools::default_registry(&config.tools));
    let state = Arc::new(GatewayState {
        chat: ChatService::from_config(provider, tools, &config),
    });
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, model = %config.models.basic, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolDescriptor>,
    count: usize,
}

async fn list_tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    let tools = state.chat.tools().descriptors();
    Json(ToolListResponse {
        count: tools.len(),
        tools,
    })
}

#[derive(Deserialize)]
struct ChatRequest {
    request_message: String,
    #[serde(default)]
    preference: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response_message: String,
    session_id: String,
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    if payload.request_message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "request_message must not be empty".into(),
            }),
        ));
    }

    info!(
        message_len = payload.request_message.len(),
        has_preference = payload.preference.is_some(),
        "Chat request received"
    );

    let mut input = ChatInput::new(payload.request_message);
    input.preference = payload.preference;
    let session = payload
        .session_id
        .filter(|s| !s.trim().is_empty())
        .map(|s| SessionId::from(&s));

    let reply = state.chat.chat(session, input).await;
    Ok(Json(ChatResponse {
        response_message: reply.text,
        session_id: reply.session_id.to_string(),
    }))
}

async fn delete_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.chat.sessions().remove(&SessionId::from(&id)).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{future, SinkExt, StreamExt};
use portfolio_pulse_core::errors::CoreError;
use portfolio_pulse_core::hub::{run_session, InboundFrame};
use portfolio_pulse_core::models::analytics::{
    AllocationBreakdown, PerformancePeriod, PerformanceResult, RiskMetrics, WhatIfRequest,
    WhatIfResult,
};
use portfolio_pulse_core::PortfolioPulse;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;

pub type AppState = Arc<PortfolioPulse>;

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route(
            "/api/users/:user_id/analytics/performance",
            get(performance),
        )
        .route("/api/users/:user_id/analytics/risk", get(risk))
        .route("/api/users/:user_id/analytics/allocation", get(allocation))
        .route("/api/users/:user_id/analytics/what-if", post(what_if))
        .with_state(state)
}

// ── WebSocket ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WsParams {
    user: Option<String>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let owner = params.user.filter(|u| !u.trim().is_empty());
    ws.on_upgrade(move |socket| handle_socket(socket, state, owner))
}

async fn handle_socket(socket: WebSocket, state: AppState, owner: Option<String>) {
    let (sender, receiver) = socket.split();
    let sink = sender.with(|text: String| future::ready(Ok::<_, axum::Error>(Message::Text(text))));
    let stream = receiver.map(|item| {
        item.map(|message| match message {
            Message::Text(text) => InboundFrame::Text(text),
            Message::Close(_) => InboundFrame::Close,
            _ => InboundFrame::Other,
        })
    });
    run_session(state.hub().clone(), owner, sink, stream).await;
}

// ── Analytics ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PerformanceParams {
    period: Option<String>,
}

async fn performance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<PerformanceParams>,
) -> ApiResult<Json<PerformanceResult>> {
    let period = match params.period.as_deref() {
        Some(p) => p.parse::<PerformancePeriod>()?,
        None => PerformancePeriod::default(),
    };
    Ok(Json(state.performance(&user_id, period).await?))
}

async fn risk(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<RiskMetrics>> {
    Ok(Json(state.risk(&user_id).await?))
}

async fn allocation(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<AllocationBreakdown>> {
    Ok(Json(state.allocation(&user_id).await?))
}

async fn what_if(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<WhatIfRequest>, JsonRejection>,
) -> ApiResult<Json<WhatIfResult>> {
    let Json(request) = payload.map_err(|e| CoreError::InvalidTrade(e.body_text()))?;
    Ok(Json(state.what_if(&user_id, &request).await?))
}

// ── Health ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    viewers: usize,
    cached_quotes: usize,
    quote_source: bool,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        viewers: state.hub().viewer_count(),
        cached_quotes: state.quote_book().len(),
        quote_source: state.has_quote_source(),
    })
}

//! HTTP carrier for RPC calls.
//!
//! `POST /rpc/{service}/{endpoint}` with a JSON body; request headers become
//! call metadata, so the credential travels in the configured metadata entry.


use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use rpcguard_application::{RpcCall, RpcMetadata, RpcReply};
use rpcguard_core::{AppError, AppResult};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::dispatch::{DispatchHarness, HarnessState};
use crate::error::ApiResult;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    state: String,
}

pub fn build_router(harness: Arc<DispatchHarness>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/rpc/{service}/{endpoint}", post(rpc_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(harness)
}

/// Serves until the harness reaches a terminal state.
///
/// `Stopped` drains in-flight requests; `ForceShutdown` drops them.
pub async fn serve(harness: Arc<DispatchHarness>, listener: TcpListener) -> AppResult<()> {
    let mut graceful = harness.subscribe();
    let mut forced = harness.subscribe();
    let app = build_router(harness);

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        if reached(&mut graceful, HarnessState::is_terminal).await {
            info!("draining in-flight calls");
        }
    });

    tokio::select! {
        result = server => {
            result.map_err(|error| AppError::Internal(format!("rpc server error: {error}")))
        }
        true = reached(&mut forced, |state| state == HarnessState::ForceShutdown) => {
            warn!("abandoning in-flight calls");
            Ok(())
        }
    }
}

/// False when the harness was dropped before reaching the state.
async fn reached(
    states: &mut watch::Receiver<HarnessState>,
    predicate: impl Fn(HarnessState) -> bool,
) -> bool {
    states.wait_for(|state| predicate(*state)).await.is_ok()
}

async fn health_handler(State(harness): State<Arc<DispatchHarness>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        state: harness.state().to_string(),
    })
}

async fn rpc_handler(
    State(harness): State<Arc<DispatchHarness>>,
    Path((service, endpoint)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<RpcReply>> {
    let call = RpcCall {
        service,
        endpoint,
        metadata: metadata_from_headers(&headers),
        payload: payload_from_body(&body)?,
        caller: None,
    };

    let reply = harness.dispatch(call).await?;
    Ok(Json(reply))
}

/// Copies UTF-8 header values into call metadata; other values are skipped.
pub(crate) fn metadata_from_headers(headers: &HeaderMap) -> RpcMetadata {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str(), value.to_owned()))
        })
        .collect()
}

/// An empty body is a `null` payload.
pub(crate) fn payload_from_body(body: &[u8]) -> AppResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    serde_json::from_slice(body)
        .map_err(|error| AppError::Validation(format!("request payload is not valid JSON: {error}")))
}

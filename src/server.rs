//! WebSocket server for relay sessions.
//!
//! Endpoint paths fix the session mode:
//! - `/ws/batch` — silence-gated batch translation
//! - `/ws/pipeline` — incremental draft/refine translation
//! - `/ws/duplex` — fixed-rate full-duplex stepping
//!
//! `/health` reports engine residency. Each connection gets one controller
//! task and a writer task; outbound messages funnel through an unbounded
//! channel so workers never block on the socket.

use crate::config::Config;
use crate::engines::EngineSlots;
use crate::session::controller::{SessionController, SessionSettings};
use crate::session::protocol::ServerMessage;
use crate::session::SessionMode;
use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Shared server state.
pub struct AppState {
    pub settings: SessionSettings,
    pub slots: Arc<EngineSlots>,
    /// Inbound receive timeout used as the idle-flush trigger.
    pub idle_timeout: Duration,
}

/// Builds the relay router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws/batch", get(ws_batch))
        .route("/ws/pipeline", get(ws_pipeline))
        .route("/ws/duplex", get(ws_duplex))
        .with_state(state)
}

/// Binds the configured address and serves until shutdown.
pub async fn serve(config: Config, slots: Arc<EngineSlots>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState {
        settings: SessionSettings::from_config(&config),
        slots,
        idle_timeout: Duration::from_secs(config.pipeline.idle_refine_secs),
    });
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "relay listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let residency = state.slots.residency().await;
    Json(serde_json::json!({
        "status": "ok",
        "engines": {
            "pipeline": residency.pipeline,
            "duplex": residency.duplex,
        },
    }))
}

async fn ws_batch(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, SessionMode::BatchTranslate))
}

async fn ws_pipeline(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, SessionMode::IncrementalPipeline))
}

async fn ws_duplex(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, SessionMode::FullDuplex))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, mode: SessionMode) {
    tracing::info!(mode = mode.as_str(), "session connected");
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Writer task: the only place that touches the outbound socket half
    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            match message.to_json() {
                Ok(text) => {
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "failed to serialize outbound message");
                }
            }
        }
    });

    let mut controller =
        SessionController::new(mode, state.settings.clone(), state.slots.clone(), out_tx);
    if controller.start().await.is_ok() {
        run_session(&mut controller, &mut ws_rx, state.idle_timeout).await;
    }
    controller.shutdown().await;

    // Dropping the controller releases the last outbound sender so the
    // writer drains and exits.
    drop(controller);
    let _ = writer.await;
    tracing::info!(mode = mode.as_str(), "session closed");
}

async fn run_session(
    controller: &mut SessionController,
    ws_rx: &mut futures_util::stream::SplitStream<WebSocket>,
    idle_timeout: Duration,
) {
    loop {
        match tokio::time::timeout(idle_timeout, ws_rx.next()).await {
            // No inbound traffic: a progress nudge, not a failure
            Err(_) => controller.on_idle().await,
            Ok(None) => break,
            Ok(Some(Err(error))) => {
                tracing::info!(%error, "websocket receive failed, closing session");
                break;
            }
            Ok(Some(Ok(Message::Text(text)))) => {
                if !controller.handle_raw(text.as_str()).await {
                    break;
                }
            }
            Ok(Some(Ok(Message::Close(_)))) => break,
            // Binary frames and pings are not part of the protocol
            Ok(Some(Ok(_))) => {}
        }
    }
}

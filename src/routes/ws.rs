// WebSocket handler: every new sample is pushed to subscribers as JSON.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::Sample;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Decrements ws_samples connection count on drop (connect = +1, drop = -1).
struct WsSampleGuard(Arc<AtomicUsize>);

impl Drop for WsSampleGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
    }
}

async fn send_text(socket: &mut WebSocket, text: String) -> bool {
    matches!(
        timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(text.into()))).await,
        Ok(Ok(()))
    )
}

pub(super) async fn ws_samples(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let tx = state.sample_tx.clone();
    let conn_count = state.ws_sample_connections.clone();
    let registry_len = state.registry.len();
    ws.on_upgrade(move |socket| async move {
        let mut rx = tx.subscribe();
        if let Err(e) = stream_samples(socket, &mut rx, conn_count, registry_len).await {
            tracing::info!("Sample stream error: {}", e);
        }
    })
}

async fn stream_samples(
    mut socket: WebSocket,
    rx: &mut broadcast::Receiver<Sample>,
    conn_count: Arc<AtomicUsize>,
    registry_len: usize,
) -> anyhow::Result<()> {
    conn_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let _guard = WsSampleGuard(conn_count);
    tracing::info!("Client connected to sample stream");

    let welcome = serde_json::json!({ "type": "info", "metrics": registry_len });
    if !send_text(&mut socket, serde_json::to_string(&welcome)?).await {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(sample) => {
                        let json = serde_json::to_string(&sample)?;
                        if !send_text(&mut socket, json).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket /ws/samples client lagged, skipped {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if !matches!(r, Ok(Ok(()))) {
                    break;
                }
            }
        }
    }
    Ok(())
}

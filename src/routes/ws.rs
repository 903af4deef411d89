// WebSocket stream of cycle reports

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::CycleReport;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect = +1, drop = -1.
struct WsConnectionGuard(Arc<AtomicUsize>);

impl Drop for WsConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

pub(super) async fn ws_volumes(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        // Subscribe before reading the latest reports so no cycle falls in between.
        let mut rx = state.hub.subscribe();
        let initial = state.hub.latest_all();
        if let Err(e) =
            stream_volumes(socket, &mut rx, initial, state.ws_volume_connections.clone()).await
        {
            tracing::info!(error = %e, "volume stream error");
        }
    })
}

async fn send_text(socket: &mut WebSocket, json: String) -> bool {
    matches!(
        timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await,
        Ok(Ok(()))
    )
}

async fn stream_volumes(
    mut socket: WebSocket,
    rx: &mut broadcast::Receiver<CycleReport>,
    initial: Vec<CycleReport>,
    conn_count: Arc<AtomicUsize>,
) -> anyhow::Result<()> {
    let connections = conn_count.fetch_add(1, Ordering::Relaxed) + 1;
    let _guard = WsConnectionGuard(conn_count);
    tracing::info!(connections, "client connected to volume stream");

    let welcome = serde_json::json!({ "type": "snapshot", "reports": initial });
    if !send_text(&mut socket, serde_json::to_string(&welcome)?).await {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval_at(
        tokio::time::Instant::now() + WS_PING_INTERVAL,
        WS_PING_INTERVAL,
    );
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(report) => {
                        let msg = serde_json::json!({ "type": "report", "report": report });
                        if !send_text(&mut socket, serde_json::to_string(&msg)?).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "volume stream client lagged");
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

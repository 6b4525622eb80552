//! Live reading streams: Server-Sent Events and WebSocket.
//!
//! Both transports subscribe to the shared broadcaster for the lifetime of
//! the connection. Closing the connection drops the subscription, which
//! removes it from the broadcaster.

use crate::web::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Response;
use futures_util::{SinkExt, Stream, StreamExt};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Interval of SSE keep-alive comments
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// SSE name of a reading event
pub const READING_EVENT: &str = "reading";

/// Stream every newly collected reading as an SSE `reading` event.
pub async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let client_id = uuid::Uuid::new_v4();
    let subscription = state.broadcaster.subscribe();
    info!(
        "SSE client connected: {} (subscriber {})",
        client_id,
        subscription.id()
    );

    let mut shutdown = state.shutdown.clone();
    let events = subscription
        .take_until(async move {
            let _ = shutdown.changed().await;
        })
        .map(|reading| Event::default().event(READING_EVENT).json_data(&*reading));

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

/// WebSocket upgrade handler.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Forward readings to one WebSocket client until either side goes away.
async fn handle_websocket(socket: WebSocket, state: AppState) {
    let client_id = uuid::Uuid::new_v4().to_string();
    let mut subscription = state.broadcaster.subscribe();
    let mut shutdown = state.shutdown.clone();
    info!(
        "WebSocket client connected: {} (subscriber {})",
        client_id,
        subscription.id()
    );

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            reading = subscription.recv() => {
                let Some(reading) = reading else { break };
                let text = match serde_json::to_string(&*reading) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize reading for client {}: {}", client_id, e);
                        continue;
                    }
                };
                if let Err(e) = sender.send(Message::Text(text)).await {
                    warn!("Failed to send message to client {}: {}", client_id, e);
                    break;
                }
            }
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Text(text))) => {
                    debug!("Ignoring message from {}: {}", client_id, text);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error for client {}: {}", client_id, e);
                    break;
                }
            },
            _ = shutdown.changed() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    info!("WebSocket client disconnected: {}", client_id);
}

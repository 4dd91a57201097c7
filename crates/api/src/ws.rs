//! Push channel
//!
//! One WebSocket per dashboard client. The socket maps onto a hub session:
//! a writer task drains the session's bounded queue to the socket, the
//! reader loop handles `join`/`leave`/`ping` frames. The hub never touches
//! the socket directly.

use crate::auth::MaybePrincipal;
use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use subscription_hub::{ClientFrame, ServerEvent, Session};
use tracing::{debug, info, warn};

/// GET /tracking/ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    MaybePrincipal(principal): MaybePrincipal,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, principal))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    principal: Option<tracking_model::Principal>,
) {
    let session = state.hub.connect(principal);
    let session_id = session.id;
    let (mut sink, mut stream) = socket.split();

    // Writer: the only task that touches the outbound socket half.
    let writer_session = Arc::clone(&session);
    let mut writer = tokio::spawn(async move {
        while let Some(event) = writer_session.next_event().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    warn!(session_id = %writer_session.id, %err, "failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            _ = &mut writer => break,
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    session.mark_seen(Instant::now());
                    handle_frame(&state, &session, &text).await;
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    session.mark_seen(Instant::now());
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(%session_id, %err, "socket error");
                    break;
                }
            }
        }
    }

    state.hub.disconnect(session_id, None);
    // Disconnect closes the queue, which ends the writer; abort covers the
    // case where the writer is mid-send on a dead socket.
    writer.abort();
    info!(%session_id, "push channel closed");
}

async fn handle_frame(state: &Arc<AppState>, session: &Arc<Session>, text: &str) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            debug!(session_id = %session.id, %err, "unparseable client frame");
            return;
        }
    };
    match frame {
        ClientFrame::Join { room } => {
            if let Err(err) = state.hub.join(session, &room).await {
                debug!(session_id = %session.id, %room, %err, "join rejected");
            }
        }
        ClientFrame::Leave { room } => state.hub.leave(session, &room),
        ClientFrame::Ping => session.send(ServerEvent::Pong),
    }
}

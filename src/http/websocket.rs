//! Persistent channel transport (`/ws`).
//!
//! # Responsibilities
//! - Complete the upgrade handshake
//! - Feed inbound frames to the session one at a time
//! - Write replies and close frames back
//!
//! # Data Flow
//! ```text
//! Client ──text frame──→ Session::handle_text ──Outcome──→ reply / close
//! ```
//!
//! # Design Decisions
//! - One task per connection; frames are never processed concurrently
//! - Ping/pong control frames are answered by the transport itself
//! - A failed write ends the session

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::session::{Outcome, Session, SessionId};

pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let session = Session::new(state.proxy.clone(), state.sessions.clone());
    ws.on_upgrade(move |socket| run_session(socket, session))
}

async fn run_session(mut socket: WebSocket, mut session: Session) {
    let id = session.id();
    metrics::ws_session_opened();
    tracing::info!(session = %id, "Channel session opened");

    while let Some(frame) = socket.recv().await {
        let outcome = match frame {
            Ok(Message::Text(text)) => session.handle_text(text.as_str()).await,
            Ok(Message::Binary(_)) => session.handle_binary(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(session = %id, error = %e, "Channel read failed");
                break;
            }
        };
        if !deliver(&mut socket, id, outcome).await {
            break;
        }
    }

    metrics::ws_session_closed();
    tracing::info!(session = %id, state = ?session.state(), "Channel session closed");
}

/// Write an outcome; false when the session must end.
async fn deliver(socket: &mut WebSocket, id: SessionId, outcome: Outcome) -> bool {
    match outcome {
        Outcome::Silent => true,
        Outcome::Reply(frame) | Outcome::Error(frame) => send(socket, id, Message::Text(frame.into())).await,
        Outcome::Close { reply, code, reason } => {
            if send(socket, id, Message::Text(reply.into())).await {
                let close = CloseFrame {
                    code,
                    reason: reason.into(),
                };
                send(socket, id, Message::Close(Some(close))).await;
            }
            false
        }
    }
}

async fn send(socket: &mut WebSocket, id: SessionId, message: Message) -> bool {
    match socket.send(message).await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(session = %id, error = %e, "Channel write failed");
            false
        }
    }
}

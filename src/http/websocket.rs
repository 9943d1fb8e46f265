//! WebSocket transport for channel sessions.
//!
//! # Responsibilities
//! - Complete the upgrade handshake and bound concurrent sockets
//! - Translate JSON frames into session connect/disconnect requests
//! - Deliver channel acknowledgements and rejections back to the client
//!
//! # Data Flow
//! ```text
//! Client ──{"type":"connect","nsp":"/x"}──▶ reader loop ──▶ Session::connect
//! Client ◀──{"type":"connected","nsp":"/x"}── writer task ◀── WsConnection (mpsc)
//! ```
//!
//! # Design Decisions
//! - Outgoing packets go through an unbounded queue so channel code never awaits
//! - The Host header is the connection's host
//! - Socket close or server shutdown detaches every channel

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, OwnedSemaphorePermit};

use crate::http::server::AppState;
use crate::namespace::ChannelError;
use crate::net::{Connection, ConnectionGuard, ConnectionId, Session};

/// Frame sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientPacket {
    Connect { nsp: String },
    Disconnect { nsp: String },
}

/// Frame sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerPacket {
    Connected { nsp: String },
    Error { nsp: String, data: String },
}

/// A WebSocket client as seen by the channel layer.
pub struct WsConnection {
    id: ConnectionId,
    host: Option<String>,
    outgoing: mpsc::UnboundedSender<ServerPacket>,
}

impl WsConnection {
    pub fn new(id: ConnectionId, host: Option<String>, outgoing: mpsc::UnboundedSender<ServerPacket>) -> Self {
        Self { id, host, outgoing }
    }

    fn send(&self, packet: ServerPacket) {
        if self.outgoing.send(packet).is_err() {
            tracing::trace!(connection_id = %self.id, "Dropping packet for closed socket");
        }
    }
}

impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn host(&self) -> Option<String> {
        self.host.clone()
    }

    fn send_connect(&self, channel: &str) {
        self.send(ServerPacket::Connected { nsp: channel.to_string() });
    }

    fn send_error(&self, channel: &str, message: &str) {
        self.send(ServerPacket::Error {
            nsp: channel.to_string(),
            data: message.to_string(),
        });
    }
}

/// `GET /ws`
pub async fn ws_handler(headers: HeaderMap, ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let Ok(permit) = Arc::clone(&state.connection_limit).try_acquire_owned() else {
        tracing::warn!("Connection limit reached, refusing WebSocket upgrade");
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    ws.on_upgrade(move |socket| handle_socket(socket, host, state, permit))
}

async fn handle_socket(socket: WebSocket, host: Option<String>, state: AppState, _permit: OwnedSemaphorePermit) {
    let guard: ConnectionGuard = state.tracker.track();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerPacket>();

    let writer = tokio::spawn(async move {
        while let Some(packet) = rx.recv().await {
            let text = match serde_json::to_string(&packet) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode packet");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    let connection: Arc<dyn Connection> = Arc::new(WsConnection::new(guard.id(), host, tx.clone()));
    tracing::debug!(connection_id = %guard.id(), host = ?connection.host(), "WebSocket connected");

    match state.directory.on_connection_arrived(connection) {
        Ok(mut session) => {
            let mut shutdown = state.shutdown.subscribe();
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    frame = stream.next() => match frame {
                        Some(Ok(Message::Text(text))) => handle_frame(&mut session, text.as_str()),
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!(connection_id = %guard.id(), error = %e, "WebSocket read error");
                            break;
                        }
                    },
                }
            }
            session.close();
        }
        Err(e) => {
            tracing::error!(connection_id = %guard.id(), error = %e, "Failed to onboard connection");
        }
    }

    drop(tx);
    let _ = writer.await;
    tracing::debug!(connection_id = %guard.id(), "WebSocket disconnected");
}

fn handle_frame(session: &mut Session, text: &str) {
    let packet = match serde_json::from_str::<ClientPacket>(text) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::debug!(connection_id = %session.connection().id(), error = %e, "Ignoring malformed frame");
            return;
        }
    };
    match packet {
        ClientPacket::Connect { nsp } => {
            if let Err(e) = session.connect(&nsp) {
                tracing::error!(connection_id = %session.connection().id(), nsp = %nsp, error = %e, "Channel join failed");
                let message = match e {
                    ChannelError::Expired(_) => "Namespace expired".to_string(),
                    other => other.to_string(),
                };
                session.connection().send_error(&nsp, &message);
            }
        }
        ClientPacket::Disconnect { nsp } => {
            session.disconnect(&nsp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packets_use_type_tag() {
        let packet: ClientPacket = serde_json::from_str(r#"{"type":"connect","nsp":"/a"}"#).unwrap();
        assert_eq!(packet, ClientPacket::Connect { nsp: "/a".to_string() });

        let error = ServerPacket::Error {
            nsp: "/x".to_string(),
            data: "Invalid namespace".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&error).unwrap(),
            r#"{"type":"error","nsp":"/x","data":"Invalid namespace"}"#
        );
    }

    #[tokio::test]
    async fn connection_queues_packets() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = WsConnection::new(ConnectionId::new(), Some("a.com".to_string()), tx);
        conn.send_connect("/");
        conn.send_error("/x", "Invalid namespace");

        assert_eq!(rx.recv().await, Some(ServerPacket::Connected { nsp: "/".to_string() }));
        assert!(matches!(rx.recv().await, Some(ServerPacket::Error { nsp, .. }) if nsp == "/x"));
    }
}

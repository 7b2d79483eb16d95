//! The two activities that run while a session is active: the
//! client-to-upstream relay and the upstream demultiplexer.
//!
//! Exactly one reader owns each connection's read side. The demultiplexer
//! is the sole reader of the upstream socket: it routes `tool_call` frames
//! to the dispatch engine (whose responses go back upstream, never to the
//! client) and relays every other frame to the client verbatim. Tool calls
//! run as short-lived tasks in a `JoinSet`; when the bridge winds down the
//! set is dropped and any in-flight handlers are aborted with it.

use crate::ws::protocol::UpstreamEvent;
use crate::ws::tools::ToolDispatcher;
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};
use tracing::{debug, error, info, warn};

pub type UpstreamStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type UpstreamSink = SplitSink<UpstreamStream, tungstenite::Message>;
pub type ClientSink = SplitSink<WebSocket, Message>;

/// Why the bridge stopped. Drives the close code and reason both sides see.
#[derive(Debug)]
pub enum SessionEnd {
    ClientClosed,
    UpstreamClosed,
    ClientTransport(axum::Error),
    UpstreamTransport(tungstenite::Error),
    /// An upstream frame could not be classified by its `type` field.
    Protocol(String),
    Internal(String),
}

impl SessionEnd {
    /// Whether the client side is already gone and cannot receive a close
    /// frame anymore.
    pub fn client_gone(&self) -> bool {
        matches!(self, SessionEnd::ClientClosed | SessionEnd::ClientTransport(_))
    }

    pub fn close_code(&self) -> u16 {
        match self {
            SessionEnd::ClientClosed | SessionEnd::ClientTransport(_) => close_code::NORMAL,
            SessionEnd::Protocol(_) => close_code::PROTOCOL,
            SessionEnd::UpstreamClosed
            | SessionEnd::UpstreamTransport(_)
            | SessionEnd::Internal(_) => close_code::ERROR,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            SessionEnd::ClientClosed => "Client closed the connection".to_string(),
            SessionEnd::UpstreamClosed => "Upstream connection closed".to_string(),
            SessionEnd::ClientTransport(e) => format!("Connection error: {e}"),
            SessionEnd::UpstreamTransport(e) => format!("Connection error: {e}"),
            SessionEnd::Protocol(detail) => format!("Protocol error: {detail}"),
            SessionEnd::Internal(detail) => format!("Internal error: {detail}"),
        }
    }
}

/// Runs the relay and the demultiplexer until either side terminates, then
/// cancels the survivor along with any tool handlers still in flight.
pub async fn run(
    client_rx: SplitStream<WebSocket>,
    client_tx: Arc<Mutex<ClientSink>>,
    upstream_rx: SplitStream<UpstreamStream>,
    upstream_tx: Arc<Mutex<UpstreamSink>>,
    dispatcher: Arc<ToolDispatcher>,
) -> SessionEnd {
    let mut relay = tokio::spawn(relay_client_to_upstream(client_rx, upstream_tx.clone()));
    let mut demux = tokio::spawn(demux_upstream(
        upstream_rx,
        client_tx,
        upstream_tx,
        dispatcher,
    ));

    tokio::select! {
        outcome = &mut relay => {
            demux.abort();
            flatten(outcome)
        }
        outcome = &mut demux => {
            relay.abort();
            flatten(outcome)
        }
    }
}

fn flatten(outcome: Result<SessionEnd, JoinError>) -> SessionEnd {
    outcome.unwrap_or_else(|e| SessionEnd::Internal(format!("session activity panicked: {e}")))
}

/// Forwards client text frames to the upstream socket without inspection.
async fn relay_client_to_upstream(
    mut client_rx: SplitStream<WebSocket>,
    upstream_tx: Arc<Mutex<UpstreamSink>>,
) -> SessionEnd {
    while let Some(frame) = client_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let forward = tungstenite::Message::Text(text.as_str().into());
                if let Err(e) = upstream_tx.lock().await.send(forward).await {
                    return SessionEnd::UpstreamTransport(e);
                }
            }
            Ok(Message::Close(_)) => return SessionEnd::ClientClosed,
            Ok(Message::Binary(_)) => {
                // The wire contract is JSON text frames; audio travels
                // base64-encoded inside them.
                warn!("Dropping unexpected binary frame from client");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => return SessionEnd::ClientTransport(e),
        }
    }
    SessionEnd::ClientClosed
}

/// The single owner of the upstream read side. Classifies each frame and
/// either hands it to tool dispatch or relays it to the client.
async fn demux_upstream(
    mut upstream_rx: SplitStream<UpstreamStream>,
    client_tx: Arc<Mutex<ClientSink>>,
    upstream_tx: Arc<Mutex<UpstreamSink>>,
    dispatcher: Arc<ToolDispatcher>,
) -> SessionEnd {
    let mut tool_tasks: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            frame = upstream_rx.next() => {
                let Some(frame) = frame else {
                    return SessionEnd::UpstreamClosed;
                };
                match frame {
                    Ok(tungstenite::Message::Text(text)) => {
                        match serde_json::from_str::<UpstreamEvent>(&text) {
                            Ok(UpstreamEvent::ToolCall(request)) => {
                                debug!(tool = %request.name, call_id = %request.id,
                                    "Intercepted tool call frame");
                                let dispatcher = dispatcher.clone();
                                let upstream_tx = upstream_tx.clone();
                                tool_tasks.spawn(async move {
                                    let response = dispatcher.dispatch(request).await;
                                    match serde_json::to_string(&response) {
                                        Ok(json) => {
                                            let message = tungstenite::Message::Text(json.into());
                                            if let Err(e) =
                                                upstream_tx.lock().await.send(message).await
                                            {
                                                warn!(error = %e,
                                                    "Failed to send tool response upstream");
                                            }
                                        }
                                        Err(e) => {
                                            error!(error = %e, "Failed to encode tool response");
                                        }
                                    }
                                });
                            }
                            Ok(UpstreamEvent::Passthrough) => {
                                let forward = Message::Text(text.as_str().into());
                                if let Err(e) = client_tx.lock().await.send(forward).await {
                                    return SessionEnd::ClientTransport(e);
                                }
                            }
                            Err(e) => {
                                return SessionEnd::Protocol(format!(
                                    "unclassifiable upstream frame: {e}"
                                ));
                            }
                        }
                    }
                    Ok(tungstenite::Message::Close(_)) => return SessionEnd::UpstreamClosed,
                    Ok(tungstenite::Message::Binary(_)) => {
                        warn!("Dropping unexpected binary frame from upstream");
                    }
                    Ok(_) => {}
                    Err(e) => return SessionEnd::UpstreamTransport(e),
                }
            }
            Some(finished) = tool_tasks.join_next(), if !tool_tasks.is_empty() => {
                if let Err(e) = finished {
                    if !e.is_cancelled() {
                        error!(error = %e, "Tool handler task failed");
                    }
                }
            }
        }
    }
}

/// Sends a close frame to the client; failures are expected when the peer
/// is already gone.
pub async fn close_client(client_tx: &Arc<Mutex<ClientSink>>, code: u16, reason: String) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    if let Err(e) = client_tx
        .lock()
        .await
        .send(Message::Close(Some(frame)))
        .await
    {
        debug!(error = %e, "Client close frame not delivered");
    }
}

/// Closes the upstream socket; failures are expected when the peer is gone.
pub async fn close_upstream(upstream_tx: &Arc<Mutex<UpstreamSink>>) {
    let mut sink = upstream_tx.lock().await;
    if let Err(e) = sink.send(tungstenite::Message::Close(None)).await {
        debug!(error = %e, "Upstream close frame not delivered");
    }
    if let Err(e) = sink.close().await {
        debug!(error = %e, "Upstream socket close failed");
    }
    info!("Upstream connection closed");
}

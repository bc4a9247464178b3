//! WebSocket viewer endpoint
//!
//! Handles the TCP accept loop, the WebSocket upgrade, and the per-session
//! plumbing between the relay registry and each connected browser.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::relay::registry::{SessionId, ViewerFrame, ViewerRegistry};
use crate::server::protocol::{self, ClientMessage, ServerMessage};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// WebSocket bridge server
pub struct BridgeServer {
    config: BridgeConfig,
    registry: Arc<ViewerRegistry>,
}

impl BridgeServer {
    /// Create a server over an existing registry
    ///
    /// The registry is shared with the event pump, which feeds it from the
    /// dongle side.
    pub fn new(config: BridgeConfig, registry: Arc<ViewerRegistry>) -> Self {
        Self { config, registry }
    }

    /// Get a reference to the viewer registry
    pub fn registry(&self) -> &Arc<ViewerRegistry> {
        &self.registry
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Viewer endpoint listening");

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Viewer endpoint listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            if let Err(e) = run_session(socket, peer_addr, registry).await {
                tracing::debug!(peer = %peer_addr, error = %e, "Session ended with error");
            }
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }

        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

/// Complete lifecycle of one viewer session
async fn run_session(
    socket: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<ViewerRegistry>,
) -> Result<()> {
    let ws_stream = tokio_tungstenite::accept_async(socket).await?;

    let (session_id, mut frames) = registry.register().await;
    tracing::debug!(session_id, peer = %peer_addr, "WebSocket session established");

    let (mut sink, mut stream) = ws_stream.split();
    let result = session_loop(&mut sink, &mut stream, session_id, &mut frames, &registry).await;

    registry.unregister(session_id).await;
    result
}

async fn session_loop(
    sink: &mut WsSink,
    stream: &mut WsSource,
    session_id: SessionId,
    frames: &mut mpsc::UnboundedReceiver<ViewerFrame>,
    registry: &ViewerRegistry,
) -> Result<()> {
    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                let message = encode_frame(frame)?;
                if let Err(e) = sink.send(message).await {
                    tracing::debug!(session_id, error = %e, "Viewer send failed");
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(message)) => {
                        if !handle_client_message(message, session_id, registry).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::debug!(session_id, error = %e, "Viewer receive error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    Ok(())
}

fn encode_frame(frame: ViewerFrame) -> Result<Message> {
    Ok(match frame {
        ViewerFrame::Video(data) => {
            Message::Binary(protocol::encode_binary(protocol::FRAME_VIDEO, &data))
        }
        ViewerFrame::Audio(data) => {
            Message::Binary(protocol::encode_binary(protocol::FRAME_AUDIO, &data))
        }
        ViewerFrame::Status(status) => {
            Message::Text(protocol::encode_text(&ServerMessage::Status(status))?)
        }
    })
}

/// Route one inbound frame; returns false when the session should end
async fn handle_client_message(
    message: Message,
    session_id: SessionId,
    registry: &ViewerRegistry,
) -> bool {
    match message {
        Message::Text(text) => {
            match protocol::decode_text(&text) {
                Ok(ClientMessage::Click(payload)) => {
                    registry.route_touch(session_id, payload.touch()).await;
                }
                Ok(ClientMessage::EnableSimulation) => {
                    registry.enable_simulation(session_id).await;
                }
                Err(e) => {
                    // One malformed message is not worth the session
                    tracing::warn!(session_id, error = %e, "Invalid viewer message");
                }
            }
            true
        }
        Message::Binary(data) => {
            match protocol::decode_binary(&data) {
                Some((protocol::FRAME_VIDEO, chunk)) => {
                    registry.send_simulated_video(session_id, chunk).await;
                }
                Some((tag, _)) => {
                    tracing::warn!(session_id, tag, "Unexpected binary frame tag");
                }
                None => {
                    tracing::warn!(session_id, "Empty binary frame");
                }
            }
            true
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => true,
        Message::Close(_) => {
            tracing::debug!(session_id, "Close frame received");
            false
        }
    }
}

//! TCP pull server.
//!
//! One tokio task per connection; frames are decoded, opened against the
//! session selected by the declared peer id, dispatched to the handler
//! and the response sealed back. Failures that cannot be sealed (no
//! session) go out as plaintext transport errors so the client knows to
//! re-handshake.

use crate::protocol::{self, PullRequest, PullResponse, WireMessage, WireStream};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use pl_core::error::ErrorCode;
use pl_core::ids::PeerId;
use pl_core::session::SessionError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

use crate::session_manager::SessionManager;

/// Application-side request dispatch, implemented by the engine.
#[async_trait]
pub trait PullHandler: Send + Sync {
    async fn handle(&self, peer_id: &PeerId, request: PullRequest) -> PullResponse;
}

pub struct PullServer {
    sessions: Arc<SessionManager>,
    handler: Arc<dyn PullHandler>,
}

fn session_error_code(err: &SessionError) -> ErrorCode {
    match err {
        SessionError::RequiresHandshake => ErrorCode::RequiresHandshake,
        SessionError::IdentityMismatch { .. } => ErrorCode::IdentityMismatch,
        _ => ErrorCode::DecryptFail,
    }
}

impl PullServer {
    pub fn new(sessions: Arc<SessionManager>, handler: Arc<dyn PullHandler>) -> Self {
        Self { sessions, handler }
    }

    /// Bind the configured listen port. Returns the bound address so
    /// callers (and tests) can use an ephemeral port 0.
    pub async fn bind(port: u16) -> Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("bind pull server on port {port}"))?;
        let addr = listener.local_addr().context("read bound address")?;
        info!("pull server listening on {addr}");
        Ok((listener, addr))
    }

    /// Accept loop; runs until the listener is dropped.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    debug!("accepted connection from {remote}");
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(err) = server.handle_connection(stream).await {
                            warn!("connection from {remote} ended with error: {err:#}");
                        }
                    });
                }
                Err(err) => {
                    warn!("accept failed: {err}");
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let mut framed = protocol::framed(stream);

        while let Some(frame) = framed.next().await {
            let frame = frame.context("read frame")?;
            let message: WireMessage = protocol::decode(&frame)?;

            match message {
                WireMessage::HandshakeInit(init) => {
                    let reply = match self.sessions.respond_handshake(&init) {
                        Ok(ack) => WireMessage::HandshakeAck(ack),
                        Err(err) => WireMessage::Error {
                            code: err.code,
                            message: err.message,
                        },
                    };
                    framed.send(protocol::encode(&reply)?).await?;
                }
                WireMessage::Sealed(envelope) => {
                    let peer_id = envelope.header.peer_id.clone();
                    self.handle_sealed(&mut framed, &peer_id, envelope).await?;
                }
                WireMessage::HandshakeAck(_) | WireMessage::Error { .. } => {
                    warn!("unexpected client-bound frame; dropping");
                }
            }
        }

        Ok(())
    }

    async fn handle_sealed(
        &self,
        framed: &mut WireStream,
        peer_id: &PeerId,
        envelope: pl_core::session::Envelope,
    ) -> Result<()> {
        let plaintext = match self.sessions.open(&envelope).await {
            Ok(plaintext) => plaintext,
            Err(err) => {
                let reply = WireMessage::Error {
                    code: session_error_code(&err),
                    message: err.to_string(),
                };
                framed.send(protocol::encode(&reply)?).await?;
                return Ok(());
            }
        };

        let request: PullRequest = protocol::decode(&plaintext)?;
        debug!("request from {peer_id}: {request:?}");
        let response = self.handler.handle(peer_id, request).await;

        let reply = match self.sessions.seal(peer_id, &protocol::encode(&response)?).await {
            Ok(sealed) => WireMessage::Sealed(sealed),
            Err(err) => WireMessage::Error {
                code: session_error_code(&err),
                message: err.to_string(),
            },
        };
        framed.send(protocol::encode(&reply)?).await?;
        Ok(())
    }
}

//! Pull client: one request/response exchange per call.
//!
//! Every network wait is bounded by the configured timeout. Crypto
//! trouble (decrypt failure, handshake demanded by the peer) resets the
//! session and retries exactly once with a fresh handshake; a second
//! failure is terminal.

use crate::protocol::{self, PullRequest, PullResponse, WireMessage, WireStream};
use crate::session_manager::SessionManager;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use pl_core::content::ContentIndex;
use pl_core::error::{ErrorCode, SyncError};
use pl_core::hash::ContentFingerprint;
use pl_core::ids::{PasteId, PeerId};
use pl_core::ports::PullClientPort;
use pl_core::session::SessionError;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

pub struct PullClient {
    sessions: Arc<SessionManager>,
    request_timeout: Duration,
}

fn io_error(err: std::io::Error) -> SyncError {
    let code = match err.kind() {
        std::io::ErrorKind::TimedOut => ErrorCode::SyncTimeout,
        std::io::ErrorKind::ConnectionRefused => ErrorCode::ConnectionRefused,
        _ => ErrorCode::UnknownError,
    };
    SyncError::new(code, err.to_string())
}

fn session_error(err: SessionError) -> SyncError {
    let code = match err {
        SessionError::RequiresHandshake => ErrorCode::RequiresHandshake,
        SessionError::IdentityMismatch { .. } => ErrorCode::IdentityMismatch,
        SessionError::ReplayedOrOutOfOrder { .. } | SessionError::DecryptFailed => {
            ErrorCode::DecryptFail
        }
        SessionError::EncryptFailed => ErrorCode::UnknownError,
    };
    SyncError::new(code, err.to_string())
}

impl PullClient {
    pub fn new(sessions: Arc<SessionManager>, request_timeout: Duration) -> Self {
        Self {
            sessions,
            request_timeout,
        }
    }

    async fn request(
        &self,
        host: &str,
        port: u16,
        peer_id: &PeerId,
        request: &PullRequest,
    ) -> Result<PullResponse, SyncError> {
        match self.request_once(host, port, peer_id, request).await {
            Err(err) if err.code.kind() == pl_core::error::ErrorKind::ProtocolCrypto => {
                warn!("crypto failure toward {peer_id} ({err}); resetting session and retrying");
                self.sessions.reset(peer_id);
                self.request_once(host, port, peer_id, request).await
            }
            other => other,
        }
    }

    async fn request_once(
        &self,
        host: &str,
        port: u16,
        peer_id: &PeerId,
        request: &PullRequest,
    ) -> Result<PullResponse, SyncError> {
        self.sessions.ensure_allowed(peer_id)?;

        let addr = format!("{host}:{port}");
        let stream = timeout(self.request_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| SyncError::new(ErrorCode::SyncTimeout, format!("connect to {addr}")))?
            .map_err(io_error)?;
        let mut framed = protocol::framed(stream);

        if !self.sessions.has_session(peer_id) {
            self.handshake(&mut framed, peer_id).await?;
        }

        let plaintext = protocol::encode(request).map_err(io_error)?;
        let envelope = match self.sessions.seal(peer_id, &plaintext).await {
            Ok(envelope) => envelope,
            // Session vanished between the check and the seal.
            Err(SessionError::RequiresHandshake) => {
                self.handshake(&mut framed, peer_id).await?;
                self.sessions
                    .seal(peer_id, &plaintext)
                    .await
                    .map_err(session_error)?
            }
            Err(err) => return Err(session_error(err)),
        };

        framed
            .send(protocol::encode(&WireMessage::Sealed(envelope)).map_err(io_error)?)
            .await
            .map_err(io_error)?;

        let frame = self.next_frame(&mut framed).await?;
        match protocol::decode::<WireMessage>(&frame).map_err(io_error)? {
            WireMessage::Sealed(envelope) => {
                let plaintext = self
                    .sessions
                    .open(&envelope)
                    .await
                    .map_err(session_error)?;
                let response: PullResponse = protocol::decode(&plaintext).map_err(io_error)?;
                debug!("response from {peer_id}: ok");
                Ok(response)
            }
            WireMessage::Error { code, message } => Err(SyncError::new(code, message)),
            _ => Err(SyncError::new(
                ErrorCode::UnknownError,
                "unexpected frame from peer",
            )),
        }
    }

    async fn handshake(&self, framed: &mut WireStream, peer_id: &PeerId) -> Result<(), SyncError> {
        let (initiator, init) = self.sessions.init_handshake(peer_id)?;
        framed
            .send(protocol::encode(&WireMessage::HandshakeInit(init)).map_err(io_error)?)
            .await
            .map_err(io_error)?;

        let frame = self.next_frame(framed).await?;
        match protocol::decode::<WireMessage>(&frame).map_err(io_error)? {
            WireMessage::HandshakeAck(ack) => {
                if &ack.peer_id != peer_id {
                    return Err(SyncError::new(
                        ErrorCode::IdentityMismatch,
                        format!("expected {peer_id}, peer declared {}", ack.peer_id),
                    ));
                }
                self.sessions.complete_handshake(initiator, &ack)
            }
            WireMessage::Error { code, message } => Err(SyncError::new(code, message)),
            _ => Err(SyncError::new(
                ErrorCode::UnknownError,
                "unexpected frame during handshake",
            )),
        }
    }

    async fn next_frame(&self, framed: &mut WireStream) -> Result<Vec<u8>, SyncError> {
        let frame = timeout(self.request_timeout, framed.next())
            .await
            .map_err(|_| SyncError::new(ErrorCode::SyncTimeout, "awaiting peer response"))?
            .ok_or_else(|| {
                SyncError::new(ErrorCode::PeerUnreachable, "peer closed the connection")
            })?
            .map_err(io_error)?;
        Ok(frame.to_vec())
    }
}

#[async_trait]
impl PullClientPort for PullClient {
    async fn pull_icon(
        &self,
        host: &str,
        port: u16,
        peer_id: &PeerId,
        source: &str,
    ) -> Result<Vec<u8>, SyncError> {
        let request = PullRequest::Icon {
            source: source.to_string(),
        };
        match self.request(host, port, peer_id, &request).await? {
            PullResponse::Icon(bytes) => Ok(bytes),
            PullResponse::NotFound => Err(SyncError::new(
                ErrorCode::IconNotFound,
                format!("icon {source} absent on {peer_id}"),
            )),
            PullResponse::Error { code, message } => Err(SyncError::new(code, message)),
            _ => Err(SyncError::new(
                ErrorCode::UnknownError,
                "mismatched response kind",
            )),
        }
    }

    async fn pull_index(
        &self,
        host: &str,
        port: u16,
        peer_id: &PeerId,
        paste_id: PasteId,
    ) -> Result<ContentIndex, SyncError> {
        let request = PullRequest::Index { paste_id };
        match self.request(host, port, peer_id, &request).await? {
            PullResponse::Index(index) => Ok(index),
            PullResponse::NotFound => Err(SyncError::new(
                ErrorCode::EntryNotFound,
                format!("paste {paste_id} absent on {peer_id}"),
            )),
            PullResponse::Error { code, message } => Err(SyncError::new(code, message)),
            _ => Err(SyncError::new(
                ErrorCode::UnknownError,
                "mismatched response kind",
            )),
        }
    }

    async fn pull_chunk(
        &self,
        host: &str,
        port: u16,
        peer_id: &PeerId,
        fingerprint: ContentFingerprint,
    ) -> Result<Vec<u8>, SyncError> {
        let request = PullRequest::Chunk { fingerprint };
        match self.request(host, port, peer_id, &request).await? {
            PullResponse::Chunk(bytes) => Ok(bytes),
            PullResponse::NotFound => Err(SyncError::new(
                ErrorCode::ChunkNotFound,
                format!("chunk {fingerprint} absent on {peer_id}"),
            )),
            PullResponse::Error { code, message } => Err(SyncError::new(code, message)),
            _ => Err(SyncError::new(
                ErrorCode::UnknownError,
                "mismatched response kind",
            )),
        }
    }
}

//! Wire message types and framing.
//!
//! Frames are length-delimited bincode. Application payloads travel as
//! opaque encrypted envelopes; only the handshake and transport-level
//! errors are plaintext.

use bytes::Bytes;
use pl_core::content::ContentIndex;
use pl_core::error::ErrorCode;
use pl_core::hash::ContentFingerprint;
use pl_core::ids::PasteId;
use pl_core::session::{Envelope, HandshakeAck, HandshakeInit};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Frames above this size are rejected by the codec.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Top-level frame on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireMessage {
    HandshakeInit(HandshakeInit),
    HandshakeAck(HandshakeAck),
    /// An encrypted request or response.
    Sealed(Envelope),
    /// Transport-level failure that cannot be sealed (e.g. the receiver
    /// has no session for the declared peer).
    Error { code: ErrorCode, message: String },
}

/// Decrypted request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PullRequest {
    /// Pull icon bytes by favicon source key.
    Icon { source: String },
    /// Pull the content index of a paste entry.
    Index { paste_id: PasteId },
    /// Pull one chunk by fingerprint.
    Chunk { fingerprint: ContentFingerprint },
}

/// Decrypted response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PullResponse {
    Icon(Vec<u8>),
    Index(ContentIndex),
    Chunk(Vec<u8>),
    /// 404-equivalent: the resource is absent, distinct from failure.
    NotFound,
    Error { code: ErrorCode, message: String },
}

pub type WireStream = Framed<TcpStream, LengthDelimitedCodec>;

pub fn framed(stream: TcpStream) -> WireStream {
    let mut codec = LengthDelimitedCodec::new();
    codec.set_max_frame_length(MAX_FRAME_BYTES);
    Framed::new(stream, codec)
}

pub fn encode<T: Serialize>(value: &T) -> std::io::Result<Bytes> {
    bincode::serialize(value)
        .map(Bytes::from)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> std::io::Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pl_core::hash::fingerprint;

    #[test]
    fn test_request_roundtrip() {
        let requests = [
            PullRequest::Icon {
                source: "example.com".into(),
            },
            PullRequest::Index {
                paste_id: PasteId(7),
            },
            PullRequest::Chunk {
                fingerprint: fingerprint(b"chunk"),
            },
        ];
        for request in requests {
            let bytes = encode(&request).unwrap();
            let back: PullRequest = decode(&bytes).unwrap();
            assert_eq!(back, request);
        }
    }

    #[test]
    fn test_not_found_is_distinct_from_error() {
        let bytes = encode(&PullResponse::NotFound).unwrap();
        let back: PullResponse = decode(&bytes).unwrap();
        assert!(matches!(back, PullResponse::NotFound));
    }
}

//! Error codes shared between task executors, the wire protocol and
//! user-facing notifications.
//!
//! Every failure an executor reports is classified into one of these
//! codes before the task engine sees it. The kind drives retry policy;
//! the stable numeric code travels over the wire and into task history.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad failure category, used for retry policy and UI wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Timeout, connection refused: worth retrying.
    TransientNetwork,
    /// Decrypt failure, identity mismatch: session reset territory.
    ProtocolCrypto,
    /// Peer offline or data not present remotely.
    ResourceAbsent,
    /// Disk full, permissions: never retried.
    LocalIo,
    /// Unclassified fault inside the engine.
    Internal,
}

/// Stable error codes, modeled after the origin system's standard codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ErrorCode {
    #[error("unknown error")]
    UnknownError,
    #[error("sync request timed out")]
    SyncTimeout,
    #[error("connection refused by peer")]
    ConnectionRefused,
    #[error("cannot resolve connect address for peer")]
    CantGetSyncAddress,
    #[error("peer is not reachable")]
    PeerUnreachable,
    #[error("decrypt failed")]
    DecryptFail,
    #[error("peer identity mismatch")]
    IdentityMismatch,
    #[error("session requires a fresh handshake")]
    RequiresHandshake,
    #[error("requested chunk not found on peer")]
    ChunkNotFound,
    #[error("requested icon not found on peer")]
    IconNotFound,
    #[error("paste entry not found")]
    EntryNotFound,
    #[error("content digest mismatch")]
    DigestMismatch,
    #[error("local i/o error")]
    LocalIoError,
    #[error("task abandoned: paste entry deleted")]
    TaskAbandoned,
    #[error("peer is blacklisted")]
    PeerBlacklisted,
}

impl ErrorCode {
    /// Stable numeric value carried in task history and wire errors.
    pub fn code(self) -> u16 {
        match self {
            ErrorCode::UnknownError => 0,
            ErrorCode::SyncTimeout => 1000,
            ErrorCode::ConnectionRefused => 1001,
            ErrorCode::CantGetSyncAddress => 1002,
            ErrorCode::PeerUnreachable => 1003,
            ErrorCode::DecryptFail => 2000,
            ErrorCode::IdentityMismatch => 2001,
            ErrorCode::RequiresHandshake => 2002,
            ErrorCode::ChunkNotFound => 3000,
            ErrorCode::IconNotFound => 3001,
            ErrorCode::EntryNotFound => 3002,
            ErrorCode::DigestMismatch => 3003,
            ErrorCode::LocalIoError => 4000,
            ErrorCode::TaskAbandoned => 5000,
            ErrorCode::PeerBlacklisted => 5001,
        }
    }

    pub fn kind(self) -> ErrorKind {
        match self {
            ErrorCode::SyncTimeout | ErrorCode::ConnectionRefused => ErrorKind::TransientNetwork,
            ErrorCode::CantGetSyncAddress | ErrorCode::PeerUnreachable => {
                ErrorKind::ResourceAbsent
            }
            ErrorCode::DecryptFail | ErrorCode::IdentityMismatch | ErrorCode::RequiresHandshake => {
                ErrorKind::ProtocolCrypto
            }
            ErrorCode::ChunkNotFound | ErrorCode::IconNotFound | ErrorCode::EntryNotFound => {
                ErrorKind::ResourceAbsent
            }
            ErrorCode::DigestMismatch => ErrorKind::ProtocolCrypto,
            ErrorCode::LocalIoError => ErrorKind::LocalIo,
            ErrorCode::UnknownError | ErrorCode::TaskAbandoned | ErrorCode::PeerBlacklisted => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether a task failure with this code is worth another attempt.
    ///
    /// Transient network trouble and an unreachable peer are retried.
    /// Crypto failures are retried once by the transport (with a fresh
    /// handshake), not by the task engine. Local I/O never retries.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCode::SyncTimeout
                | ErrorCode::ConnectionRefused
                | ErrorCode::CantGetSyncAddress
                | ErrorCode::PeerUnreachable
        )
    }
}

/// A classified failure: code plus human-readable context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct SyncError {
    pub code: ErrorCode,
    pub message: String,
}

impl SyncError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_follows_kind() {
        assert!(ErrorCode::SyncTimeout.is_retryable());
        assert!(ErrorCode::CantGetSyncAddress.is_retryable());
        assert!(!ErrorCode::LocalIoError.is_retryable());
        assert!(!ErrorCode::DecryptFail.is_retryable());
        assert!(!ErrorCode::ChunkNotFound.is_retryable());
    }

    #[test]
    fn test_offline_and_corrupt_are_distinct() {
        // The UI must be able to say "device offline" vs "corrupt data".
        assert_ne!(
            ErrorCode::PeerUnreachable.code(),
            ErrorCode::DigestMismatch.code()
        );
        assert_ne!(
            ErrorCode::PeerUnreachable.kind(),
            ErrorCode::DigestMismatch.kind()
        );
    }

    #[test]
    fn test_codes_are_stable_and_unique() {
        let all = [
            ErrorCode::UnknownError,
            ErrorCode::SyncTimeout,
            ErrorCode::ConnectionRefused,
            ErrorCode::CantGetSyncAddress,
            ErrorCode::PeerUnreachable,
            ErrorCode::DecryptFail,
            ErrorCode::IdentityMismatch,
            ErrorCode::RequiresHandshake,
            ErrorCode::ChunkNotFound,
            ErrorCode::IconNotFound,
            ErrorCode::EntryNotFound,
            ErrorCode::DigestMismatch,
            ErrorCode::LocalIoError,
            ErrorCode::TaskAbandoned,
            ErrorCode::PeerBlacklisted,
        ];
        let mut codes: Vec<u16> = all.iter().map(|c| c.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}

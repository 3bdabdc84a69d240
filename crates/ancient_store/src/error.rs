//! Error types for ancient store operations.

use crate::category::Category;
use std::io;
use thiserror::Error;

/// Result type for ancient store operations.
pub type AncientResult<T> = Result<T, AncientError>;

/// Errors that can occur while using an ancient store.
///
/// In-process engines and the remote client report the same variants, so
/// callers can match on them without knowing which implementation they use.
#[derive(Debug, Error)]
pub enum AncientError {
    /// The requested number is not below the frozen count.
    #[error("ancient {category} #{number} not found (frozen {frozen})")]
    NotFound {
        /// Requested category.
        category: Category,
        /// Requested sequence number.
        number: u64,
        /// Frozen count observed by the lookup.
        frozen: u64,
    },

    /// The append number does not equal the frozen count.
    #[error("out-of-order append: expected {expected}, got {got}")]
    OutOfOrderAppend {
        /// The frozen count at the time of the call.
        expected: u64,
        /// The number the caller tried to append.
        got: u64,
    },

    /// The truncate target exceeds the frozen count.
    #[error("invalid truncate target {target}: only {frozen} items frozen")]
    InvalidTruncateTarget {
        /// Requested item count.
        target: u64,
        /// Frozen count at the time of the call.
        frozen: u64,
    },

    /// A textual payload was not a valid binary envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The category name is not known to the store.
    #[error("unknown ancient category: {0}")]
    UnknownCategory(String),

    /// The store has been closed.
    #[error("ancient store is closed")]
    Closed,

    /// Another process holds the store directory.
    #[error("ancient store directory is locked: {0}")]
    Locked(String),

    /// The transport failed to reach or talk to the remote store.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote peer sent a response that does not follow the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The remote store reports a protocol version this side cannot speak.
    #[error("protocol version mismatch: local={local}, remote={remote}")]
    VersionMismatch {
        /// Version spoken locally.
        local: String,
        /// Version reported by the peer.
        remote: String,
    },

    /// The call was canceled by its caller.
    #[error("call canceled")]
    Canceled,

    /// The call's deadline passed before it completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// On-disk data is inconsistent beyond what repair can fix.
    #[error("ancient data corrupted: {0}")]
    Corrupted(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Opaque failure reported by a (remote) engine.
    #[error("engine error: {0}")]
    Engine(String),
}

impl AncientError {
    /// Returns true if the error was produced by the transport rather than
    /// by the engine behind it.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AncientError::Transport(_)
                | AncientError::Protocol(_)
                | AncientError::VersionMismatch { .. }
                | AncientError::Canceled
                | AncientError::DeadlineExceeded
        )
    }

    /// Returns true if the caller sent a request the store refused.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AncientError::NotFound { .. }
                | AncientError::OutOfOrderAppend { .. }
                | AncientError::InvalidTruncateTarget { .. }
                | AncientError::MalformedEnvelope(_)
                | AncientError::UnknownCategory(_)
        )
    }
}

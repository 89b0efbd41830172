//! Error types for TangleDB core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in TangleDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Block log error.
    #[error("log error: {0}")]
    Storage(#[from] tangledb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON codec error.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A message failed the admission pipeline.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Cryptographic operation failed.
    #[error("crypto error: {message}")]
    Crypto {
        /// Description of the failure.
        message: String,
    },

    /// Message not found in the database.
    #[error("message not found: {id}")]
    MessageNotFound {
        /// The message id that was looked up.
        id: String,
    },

    /// A message URI could not be parsed.
    #[error("invalid message URI: {uri}")]
    InvalidUri {
        /// The offending URI.
        uri: String,
    },
}

impl CoreError {
    /// Creates a crypto error.
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Creates a message-not-found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::MessageNotFound { id: id.into() }
    }
}

/// One cause per stage of the admission pipeline.
///
/// Every rejected message is attributable to a specific rule; there is no
/// generic "invalid message" case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("missing required field: {field}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// The metadata version does not match the expected protocol version.
    #[error("metadata version {actual} does not match protocol version {expected}")]
    WrongVersion {
        /// Expected protocol version.
        expected: u16,
        /// Version declared in metadata.
        actual: u16,
    },

    /// The signing key is not a valid base-encoded key.
    #[error("invalid signing key: {reason}")]
    InvalidSigningKey {
        /// Description of the defect.
        reason: String,
    },

    /// The payload is neither null, an object, nor a string.
    #[error("payload should have been an object, a string, or null")]
    InvalidPayloadShape,

    /// The recomputed payload hash differs from the declared one.
    #[error("payload hash does not match the payload")]
    PayloadHashMismatch,

    /// The recomputed payload size differs from the declared one.
    #[error("payload size {actual} does not match declared size {declared}")]
    PayloadSizeMismatch {
        /// Declared size in metadata.
        declared: u64,
        /// Recomputed size.
        actual: u64,
    },

    /// The label violates the label-format rule.
    #[error("label should have been 3-100 alphanumeric or underscore characters")]
    InvalidLabel,

    /// The signing key is not authorized for the declared causal group.
    #[error("signing key is not authorized for causal group {group}")]
    UnauthorizedKey {
        /// The causal group that rejected the key.
        group: String,
    },

    /// The message carries no tangle entry for the tangle it was checked
    /// against.
    #[error("tangle entry for root {root} is missing")]
    MissingTangle {
        /// The tangle root id.
        root: String,
    },

    /// The tangle entry's prev is null.
    #[error("prev should have been an array")]
    PrevNotArray,

    /// The tangle entry's prev is empty.
    #[error("prev should not have been empty")]
    PrevEmpty,

    /// A prev entry is a full URI instead of a raw id.
    #[error("prev item is a URI: {item}")]
    PrevItemUri {
        /// The offending item.
        item: String,
    },

    /// prev is not strictly sorted ascending and duplicate-free.
    #[error("prev should have been alphabetically sorted and duplicate-free")]
    PrevUnsorted,

    /// The declared depth is not a positive integer.
    #[error("depth should have been a positive integer, got {depth}")]
    InvalidDepth {
        /// The declared depth.
        depth: u64,
    },

    /// A known prev has depth at or above the message's own depth.
    #[error("prev {id} has depth {prev_depth}, not lower than {depth}")]
    PrevDepthNotLower {
        /// The prev id.
        id: String,
        /// Depth of the prev.
        prev_depth: u64,
        /// Depth declared by the message.
        depth: u64,
    },

    /// All prev entries are known and the depth is not exactly max+1.
    #[error("depth should have been {expected}, got {actual}")]
    WrongDepth {
        /// Required depth.
        expected: u64,
        /// Declared depth.
        actual: u64,
    },

    /// Every prev id is locally unknown; the message cannot be trusted.
    #[error("all prev are locally unknown")]
    AllPrevUnknown,

    /// A message claiming to be a tangle root has a different id.
    #[error("message id {id} does not match tangle root {root}")]
    RootIdMismatch {
        /// Computed id of the message.
        id: String,
        /// Declared tangle root.
        root: String,
    },

    /// A tangle root carries a self-referential tangle entry.
    #[error("tangle root should not reference itself")]
    RootSelfReference,

    /// A referenced tangle root id is not a well-formed message id.
    #[error("malformed tangle root id: {id}")]
    MalformedRootId {
        /// The offending id.
        id: String,
    },

    /// The signature does not verify over the canonical metadata.
    #[error("invalid signature")]
    BadSignature,
}

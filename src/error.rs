//! Error types for the codec, the chain transport, checkpoint storage and scan passes.

use thiserror::Error;

/// Reasons an encoded address fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("address too short: {len} characters")]
    TooShort { len: usize },

    #[error("unsupported version marker '{0}'")]
    VersionMarker(char),

    #[error("invalid base58: {0}")]
    InvalidBase58(String),

    #[error("address value does not fit in {max} bytes")]
    Overflow { max: usize },

    #[error("checksum mismatch")]
    Checksum,

    #[error("padding mismatch: {padding} padding characters, {zero_bytes} leading zero bytes")]
    Padding { padding: usize, zero_bytes: usize },
}

/// Failures talking to the node.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("node returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed response for {method}: {reason}")]
    Malformed { method: String, reason: String },
}

/// Failures reading or writing checkpoint documents.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Why a scan pass stopped before persisting its checkpoint.
#[derive(Debug, Error)]
pub enum PassError {
    #[error("could not read chain height: {0}")]
    Height(#[source] ChainError),

    #[error("could not fetch block {height}: {source}")]
    Block {
        height: u64,
        #[source]
        source: ChainError,
    },

    #[error("could not persist checkpoint: {0}")]
    Persist(#[from] StoreError),
}

//! Error types for the block storage core.

use thiserror::Error;

/// Result type alias using our `Error` type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the block storage core.
///
/// Every variant corresponds to one of the error kinds the core contract
/// distinguishes: construction errors, decode/recovery errors, on-disk
/// validation failures, and async I/O failures. The core never retries or
/// repairs in place; every error is surfaced verbatim to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// Codec constructed with `k`/`m` out of range, or `k + m > 255`.
    #[error("invalid shard count: {0}")]
    InvalidShardCount(String),

    /// Gauss-Jordan inversion failed on a singular matrix.
    #[error("matrix not invertible: {0}")]
    NotInvertible(String),

    /// Fewer than `k` shards were available to decode or generically code.
    #[error("insufficient shards: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    /// `offset_to_block` was asked for a shard id not present on this volume.
    #[error("shard {shard_id} is not present on this volume")]
    UnknownShard { shard_id: u8 },

    /// A block failed checksum or layout validation.
    #[error("invalid block at stripe {stripe_no}, shard {shard_id}: {reason}")]
    InvalidBlock {
        stripe_no: u64,
        shard_id: u8,
        reason: String,
    },

    /// A volume header failed checksum or layout validation.
    #[error("invalid volume header: {0}")]
    InvalidHeader(String),

    /// Submitting an async I/O request failed.
    #[error("io submit ({op}) failed for fd {fd} at page {start_page}: {reason}")]
    IoSubmit {
        op: &'static str,
        fd: i32,
        start_page: u64,
        reason: String,
    },

    /// A completed async I/O request reported failure.
    #[error("io complete failed: {reason}")]
    IoComplete { reason: String },

    /// Page-aligned buffer allocation failed.
    #[error("aligned buffer allocation failed for size {size}: {reason}")]
    AllocationFailed { size: usize, reason: String },
}

use std::io;

use thiserror::Error;

/// Every way the generation pipeline can fail.
///
/// None of these are recoverable inside a worker. Transient conditions (signal interruption,
/// a momentarily full pipe) are retried where they occur and never show up here.
#[derive(Error, Debug)]
pub enum Error {
    /// The OS entropy facility could not supply bytes.
    #[error("entropy unavailable: {0}")]
    EntropyUnavailable(#[source] rand::Error),

    /// Seeding kept producing the all-zero permutation state.
    #[error("entropy source produced a degenerate all-zero seed")]
    DegenerateSeed,

    /// The destination rejected a write.
    #[error("write failed: {0}")]
    WriteFailure(#[source] io::Error),

    /// The kernel refused the page donation.
    #[error("page donation failed: {0}")]
    DonationFailure(#[source] io::Error),

    /// Mapping (or remapping) the batch buffer failed.
    #[error("memory mapping failed: {0}")]
    MemoryMapFailure(#[source] io::Error),

    /// A batch of this many lines does not fit in memory.
    #[error("cannot allocate a batch of {lines} lines")]
    BatchTooLarge { lines: usize },

    /// The zero-copy sink was pointed at something that is not a pipe.
    #[error("zero-copy output requires the destination to be a pipe")]
    NotAPipe,

    /// A startup setting could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidConfig { key: &'static str, value: String },

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

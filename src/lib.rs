//! Emits an endless stream of random version-4 UUIDs, one per line, as fast as the consumer
//! takes them.
//!
//! Each [`Worker`] owns a [`Generator`], a [`BatchBuffer`] and a [`Sink`]. It encodes blocks into
//! the batch until it is full and then flushes it, either with plain writes or by gifting the
//! pages to a pipe. Workers share nothing but the destination descriptor.
//!
//! ```no_run
//! use uuidflood::{Config, Destination, Pool};
//!
//! let destination = Destination::stdout()?;
//! match Pool::new(Config::default(), destination).run()? {}
//! # Ok::<(), uuidflood::Error>(())
//! ```

pub mod buffer;
pub mod chacha;
pub mod config;
pub mod encode;
pub mod entropy;
pub mod error;
pub mod rng;
pub mod sink;
pub mod tracer;
pub mod worker;

pub use buffer::BatchBuffer;
pub use config::Config;
pub use error::{Error, Result};
pub use rng::{Engine, EngineKind, Generator};
pub use sink::{Destination, Sink, SinkKind};
pub use worker::{Pool, Worker};

/// Bytes in one random block.
pub const BLOCK_LEN: usize = 16;

/// Bytes in one encoded line: 36 characters and a newline.
pub const LINE_LEN: usize = 37;

/// The raw 128 bits behind one UUID.
pub type Block = [u8; BLOCK_LEN];

#[cfg(test)]
mod bench;

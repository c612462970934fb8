use std::{env, num::NonZeroUsize};

use crate::{
    error::{Error, Result},
    rng::EngineKind,
    sink::SinkKind,
};

pub const ENV_ENGINE: &str = "UUIDFLOOD_ENGINE";
pub const ENV_SINK: &str = "UUIDFLOOD_SINK";
pub const ENV_WORKERS: &str = "UUIDFLOOD_WORKERS";
pub const ENV_BATCH_SIZE: &str = "UUIDFLOOD_BATCH_SIZE";

/// Lines per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(2000) {
    Some(lines) => lines,
    None => panic!("zero default"),
};

/// Workers unless configured otherwise: two spawned threads plus the calling thread.
pub const DEFAULT_WORKERS: NonZeroUsize = match NonZeroUsize::new(3) {
    Some(workers) => workers,
    None => panic!("zero default"),
};

/// The largest batch whose bytes fit in a single allocation.
pub const MAX_BATCH_SIZE: usize = isize::MAX as usize / crate::LINE_LEN;

/// The most lines one flush may carry when several workers share a pipe. A write of at most
/// `PIPE_BUF` bytes, or a donation confined to one page, reaches the pipe in one piece.
pub const PIPE_ATOMIC_LINES: NonZeroUsize =
    match NonZeroUsize::new(libc::PIPE_BUF / crate::LINE_LEN) {
        Some(lines) => lines,
        None => panic!("PIPE_BUF holds less than one line"),
    };

/// Startup settings. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub engine: EngineKind,
    pub sink: SinkKind,
    pub workers: NonZeroUsize,
    /// Lines per batch.
    pub batch_size: NonZeroUsize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            sink: SinkKind::default(),
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Config {
    /// Reads the settings from the `UUIDFLOOD_*` environment variables, falling back to the
    /// defaults for unset ones.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_ENGINE) {
            config.engine = value.parse()?;
        }
        if let Some(value) = lookup(ENV_SINK) {
            config.sink = value.parse()?;
        }
        if let Some(value) = lookup(ENV_WORKERS) {
            config.workers = positive(ENV_WORKERS, &value)?;
        }
        if let Some(value) = lookup(ENV_BATCH_SIZE) {
            config.batch_size = positive(ENV_BATCH_SIZE, &value)?;
            if config.batch_size.get() > MAX_BATCH_SIZE {
                return Err(Error::InvalidConfig {
                    key: ENV_BATCH_SIZE,
                    value,
                });
            }
        }
        Ok(config)
    }
}

fn positive(key: &'static str, value: &str) -> Result<NonZeroUsize> {
    value
        .trim()
        .parse::<NonZeroUsize>()
        .map_err(|_| Error::InvalidConfig {
            key,
            value: value.to_string(),
        })
}

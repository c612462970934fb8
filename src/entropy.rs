use rand::{rngs::OsRng, RngCore};

use crate::error::{Error, Result};

/// A supplier of cryptographically strong bytes, used to seed and rekey the engines.
pub trait EntropySource {
    /// Fills `dest` completely or fails.
    fn fill(&mut self, dest: &mut [u8]) -> Result<()>;
}

/// The operating system's CSPRNG (`getrandom(2)` on Linux).
///
/// Interrupted reads are retried by the underlying implementation; anything else is reported as
/// [`Error::EntropyUnavailable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&mut self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(Error::EntropyUnavailable)
    }
}

impl<F> EntropySource for F
where
    F: FnMut(&mut [u8]) -> Result<()>,
{
    fn fill(&mut self, dest: &mut [u8]) -> Result<()> {
        self(dest)
    }
}

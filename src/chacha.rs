use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use crate::{
    entropy::EntropySource,
    error::Result,
    rng::Generator,
    Block, BLOCK_LEN,
};

/// Size of one ChaCha20 keystream block.
pub const KEYSTREAM_LEN: usize = 64;

/// Size of the secret key.
pub const KEY_LEN: usize = 32;

/// A generator that reads blocks out of the ChaCha20 keystream.
///
/// Each keystream block is the first 64 bytes of the stream selected by the current 64-bit
/// nonce and yields four UUID blocks. The nonce advances once per keystream block; before it
/// would wrap around, the generator draws a new key from its entropy source, so a
/// `(key, nonce)` pair is never used twice.
pub struct ChaChaStream<E> {
    entropy: E,
    cipher: ChaCha20Rng,
    nonce: u64,
    keystream: [u8; KEYSTREAM_LEN],
    cursor: usize,
}

impl<E: EntropySource> ChaChaStream<E> {
    /// Creates a generator keyed from `entropy`.
    pub fn seed(mut entropy: E) -> Result<Self> {
        let mut key = [0; KEY_LEN];
        entropy.fill(&mut key)?;
        Ok(Self::with_key(entropy, key, 0))
    }

    /// Creates a generator with an explicit `key`, starting at `nonce`. `entropy` is only used
    /// for rekeying.
    pub fn with_key(entropy: E, key: [u8; KEY_LEN], nonce: u64) -> Self {
        Self {
            entropy,
            cipher: ChaCha20Rng::from_seed(key),
            nonce,
            keystream: [0; KEYSTREAM_LEN],
            cursor: KEYSTREAM_LEN,
        }
    }

    /// Returns the nonce the next keystream block will be generated with.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    fn refill(&mut self) -> Result<()> {
        self.cipher.set_stream(self.nonce);
        self.cipher.set_word_pos(0);
        self.cipher.fill_bytes(&mut self.keystream);
        self.cursor = 0;
        match self.nonce.checked_add(1) {
            Some(nonce) => self.nonce = nonce,
            None => self.rekey()?,
        }
        Ok(())
    }

    fn rekey(&mut self) -> Result<()> {
        let mut key = [0; KEY_LEN];
        self.entropy.fill(&mut key)?;
        self.cipher = ChaCha20Rng::from_seed(key);
        self.nonce = 0;
        debug!("nonce space exhausted, rekeyed stream cipher");
        Ok(())
    }
}

impl<E: EntropySource> Generator for ChaChaStream<E> {
    #[inline]
    fn generate(&mut self) -> Result<Block> {
        if self.cursor == KEYSTREAM_LEN {
            self.refill()?;
        }
        let mut block = [0; BLOCK_LEN];
        block.copy_from_slice(&self.keystream[self.cursor..self.cursor + BLOCK_LEN]);
        self.cursor += BLOCK_LEN;
        Ok(block)
    }
}

impl<E> std::fmt::Debug for ChaChaStream<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaChaStream")
            .field("nonce", &self.nonce)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

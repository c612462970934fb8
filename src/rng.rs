use std::{fmt, str::FromStr};

use tracing::debug;

use crate::{
    buffer::zeroed,
    chacha::ChaChaStream,
    entropy::{EntropySource, OsEntropy},
    error::{Error, Result},
    Block, BLOCK_LEN,
};

/// How many times seeding may draw an all-zero permutation state before giving up. Each draw is
/// 128 fresh bits, so hitting the limit means the entropy source is broken.
const SEED_ATTEMPTS: usize = 8;

/// A source of 16-byte blocks.
pub trait Generator {
    /// Returns the next block of the sequence.
    fn generate(&mut self) -> Result<Block>;
}

/// A fast permutation generator with 128 bits of state, based on the xoroshiro128 recurrence
/// (rotation 55, shift 14, rotation 36).
///
/// Every step outputs the whole new state, so one step yields one block. The output is not
/// cryptographically unpredictable; it is only used where uniqueness is what matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xoroshiro {
    /// The current state of the RNG. Never all zero.
    state: [u64; 2],
}

impl Xoroshiro {
    /// Seeds a new generator from `entropy`, redrawing if the state comes out all zero.
    ///
    /// # Example
    /// ```
    /// # use uuidflood::{entropy::OsEntropy, rng::{Generator, Xoroshiro}};
    /// let mut rng = Xoroshiro::seed(&mut OsEntropy).unwrap();
    /// let block = rng.generate().unwrap();
    /// assert_eq!(block.len(), 16);
    /// ```
    pub fn seed<E: EntropySource>(entropy: &mut E) -> Result<Self> {
        for _ in 0..SEED_ATTEMPTS {
            let mut seed = [0; BLOCK_LEN];
            entropy.fill(&mut seed)?;
            let (low, high) = seed.split_at(8);
            let state = [word(low), word(high)];
            if let Ok(rng) = Self::from_state(state) {
                return Ok(rng);
            }
            debug!("discarding all-zero permutation seed");
        }
        Err(Error::DegenerateSeed)
    }

    /// Initializes the generator with an explicit `state`. The all-zero state is a fixed point of
    /// the recurrence and is rejected.
    pub fn from_state(state: [u64; 2]) -> Result<Self> {
        if state == [0, 0] {
            return Err(Error::DegenerateSeed);
        }
        Ok(Self { state })
    }

    /// Returns the current state.
    pub fn state(&self) -> [u64; 2] {
        self.state
    }

    #[inline(always)]
    fn step(&mut self) -> [u64; 2] {
        let [s0, mut s1] = self.state;
        s1 ^= s0;
        self.state = [s0.rotate_left(55) ^ s1 ^ (s1 << 14), s1.rotate_left(36)];
        self.state
    }
}

impl Generator for Xoroshiro {
    #[inline]
    fn generate(&mut self) -> Result<Block> {
        let [s0, s1] = self.step();
        let mut block = [0; BLOCK_LEN];
        block[..8].copy_from_slice(&s0.to_le_bytes());
        block[8..].copy_from_slice(&s1.to_le_bytes());
        Ok(block)
    }
}

#[inline]
fn word(bytes: &[u8]) -> u64 {
    let mut buf = [0; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

/// Blocks read straight from an entropy source.
///
/// Reading one block per call would cost one syscall per UUID, so the generator reads
/// `blocks` blocks at once and hands them out one by one.
#[derive(Debug)]
pub struct OsBlocks<E> {
    entropy: E,
    pool: Vec<u8>,
    cursor: usize,
}

impl<E: EntropySource> OsBlocks<E> {
    /// Creates a generator that refills `blocks` blocks per read and performs the first read
    /// immediately, so an unavailable source is reported at construction.
    pub fn seed(mut entropy: E, blocks: usize) -> Result<Self> {
        let mut pool = zeroed(blocks.max(1), BLOCK_LEN)?;
        entropy.fill(&mut pool)?;
        Ok(Self {
            entropy,
            pool,
            cursor: 0,
        })
    }
}

impl<E: EntropySource> Generator for OsBlocks<E> {
    fn generate(&mut self) -> Result<Block> {
        if self.cursor == self.pool.len() {
            self.entropy.fill(&mut self.pool)?;
            self.cursor = 0;
        }
        let mut block = [0; BLOCK_LEN];
        block.copy_from_slice(&self.pool[self.cursor..self.cursor + BLOCK_LEN]);
        self.cursor += BLOCK_LEN;
        Ok(block)
    }
}

/// The engine strategies a worker can be built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    /// Fresh OS entropy for every block, read once per batch.
    OsEntropy,
    /// ChaCha20 keystream under an OS-seeded key.
    StreamCipher,
    /// xoroshiro-class permutation seeded once.
    #[default]
    Permutation,
}

impl FromStr for EngineKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "os-entropy" | "os" => Ok(Self::OsEntropy),
            "stream-cipher" | "chacha20" => Ok(Self::StreamCipher),
            "permutation" | "xoroshiro" => Ok(Self::Permutation),
            _ => Err(Error::InvalidConfig {
                key: "engine",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::OsEntropy => "os-entropy",
            Self::StreamCipher => "stream-cipher",
            Self::Permutation => "permutation",
        })
    }
}

/// A seeded engine of any kind.
#[derive(Debug)]
pub enum Engine {
    OsEntropy(OsBlocks<OsEntropy>),
    StreamCipher(ChaChaStream<OsEntropy>),
    Permutation(Xoroshiro),
}

impl Engine {
    /// Seeds an engine of the given `kind` from the OS. `batch_lines` sizes the entropy reads of
    /// [`EngineKind::OsEntropy`] so there is one read per batch.
    pub fn seed(kind: EngineKind, batch_lines: usize) -> Result<Self> {
        Ok(match kind {
            EngineKind::OsEntropy => Self::OsEntropy(OsBlocks::seed(OsEntropy, batch_lines)?),
            EngineKind::StreamCipher => Self::StreamCipher(ChaChaStream::seed(OsEntropy)?),
            EngineKind::Permutation => Self::Permutation(Xoroshiro::seed(&mut OsEntropy)?),
        })
    }
}

impl Generator for Engine {
    #[inline]
    fn generate(&mut self) -> Result<Block> {
        match self {
            Self::OsEntropy(rng) => rng.generate(),
            Self::StreamCipher(rng) => rng.generate(),
            Self::Permutation(rng) => rng.generate(),
        }
    }
}

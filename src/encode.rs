//! Text form of a version-4 UUID.
//!
//! A line is 36 characters of lowercase hex and hyphens followed by `\n`:
//!
//! ```text
//! xxxxxxxx-xxxx-4xxx-Vxxx-xxxxxxxxxxxx\n
//! ```
//!
//! where `V` is one of `8`, `9`, `a` or `b`.

use crate::{Block, LINE_LEN};

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Position of the first hex digit of each block byte within a line.
const DIGITS: [usize; 16] = [0, 2, 4, 6, 9, 11, 14, 16, 19, 21, 24, 26, 28, 30, 32, 34];

const HYPHENS: [usize; 4] = [8, 13, 18, 23];

/// Index of the byte that carries the version nibble.
const VERSION_BYTE: usize = 6;

/// Index of the byte that carries the variant bits.
const VARIANT_BYTE: usize = 8;

/// Forces the version and variant bits of byte `index`; every other byte passes through.
#[inline(always)]
fn stamp(index: usize, value: u8) -> u8 {
    match index {
        VERSION_BYTE => (value & 0x0F) | 0x40,
        VARIANT_BYTE => (value & 0x3F) | 0x80,
        _ => value,
    }
}

/// Writes the line for `block` into `buf[cursor..cursor + LINE_LEN]` and returns the cursor just
/// past it.
///
/// # Panics
/// If fewer than `LINE_LEN` bytes are available at `cursor`.
///
/// # Example
/// ```
/// # use uuidflood::{encode::encode_at, LINE_LEN};
/// let mut buf = [0; LINE_LEN];
/// let end = encode_at(&[0; 16], &mut buf, 0);
/// assert_eq!(end, LINE_LEN);
/// assert_eq!(&buf, b"00000000-0000-4000-8000-000000000000\n");
/// ```
#[inline]
pub fn encode_at(block: &Block, buf: &mut [u8], cursor: usize) -> usize {
    let end = cursor + LINE_LEN;
    let line = &mut buf[cursor..end];
    for (index, (&value, &at)) in block.iter().zip(DIGITS.iter()).enumerate() {
        let value = stamp(index, value);
        line[at] = HEX[(value >> 4) as usize];
        line[at + 1] = HEX[(value & 0x0F) as usize];
    }
    for at in HYPHENS {
        line[at] = b'-';
    }
    line[LINE_LEN - 1] = b'\n';
    end
}

/// Returns the line for `block`.
pub fn encode(block: &Block) -> [u8; LINE_LEN] {
    let mut line = [0; LINE_LEN];
    encode_at(block, &mut line, 0);
    line
}

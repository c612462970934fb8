use std::{io, ptr::NonNull, slice};

use crate::{
    encode::encode_at,
    error::{Error, Result},
    Block, LINE_LEN,
};

/// Memory a batch can be staged in.
pub trait Storage {
    fn bytes(&self) -> &[u8];
    fn bytes_mut(&mut self) -> &mut [u8];
}

impl Storage for Box<[u8]> {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}

/// A fixed number of encoded lines staged in `S` until the batch is flushed.
///
/// The capacity is a whole number of lines, so a full batch never ends in a partial line.
#[derive(Debug)]
pub struct BatchBuffer<S> {
    storage: S,
    offset: usize,
    capacity: usize,
}

impl<S: Storage> BatchBuffer<S> {
    /// Wraps `storage` as an empty batch of `lines` lines.
    ///
    /// # Panics
    /// If `storage` is smaller than `lines * LINE_LEN` bytes.
    pub fn new(storage: S, lines: usize) -> Self {
        let capacity = lines.saturating_mul(LINE_LEN);
        assert!(
            storage.bytes().len() >= capacity,
            "storage too small for {lines} lines"
        );
        Self {
            storage,
            offset: 0,
            capacity,
        }
    }

    /// Returns `true` if one more line fits.
    #[inline]
    pub fn has_room(&self) -> bool {
        self.capacity - self.offset >= LINE_LEN
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.offset == self.capacity
    }

    /// Encodes `block` as the next line.
    ///
    /// # Panics
    /// If the batch is already full.
    #[inline]
    pub fn append(&mut self, block: &Block) {
        assert!(self.has_room(), "append to a full batch");
        self.offset = encode_at(block, self.storage.bytes_mut(), self.offset);
    }

    /// The bytes written so far.
    pub fn filled(&self) -> &[u8] {
        &self.storage.bytes()[..self.offset]
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn lines(&self) -> usize {
        self.capacity / LINE_LEN
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Gives up the batch, returning its storage.
    pub fn into_storage(self) -> S {
        self.storage
    }
}

/// Allocates `count` zeroed units of `size` bytes on the heap.
///
/// Sizes that overflow or that the allocator refuses are reported as
/// [`Error::BatchTooLarge`] rather than aborting the process.
pub fn zeroed(count: usize, size: usize) -> Result<Vec<u8>> {
    let too_large = || Error::BatchTooLarge { lines: count };
    let len = count.checked_mul(size).ok_or_else(too_large)?;
    let mut bytes = Vec::new();
    bytes.try_reserve_exact(len).map_err(|_| too_large())?;
    bytes.resize(len, 0);
    Ok(bytes)
}

/// A private anonymous read/write mapping, always starting on a page boundary.
#[derive(Debug)]
pub struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the mapping is exclusively owned; nothing else holds its address.
unsafe impl Send for Mapping {}

impl Mapping {
    /// Maps `len` bytes of zeroed memory.
    pub fn anonymous(len: usize) -> Result<Self> {
        // SAFETY: a fresh mapping with no address hint cannot alias anything we own.
        unsafe { map(std::ptr::null_mut(), len, 0) }
    }

    /// Marks the pages as handed to the kernel. The returned value keeps the address range
    /// reserved but gives no access to its contents.
    pub fn donate(self) -> Donated {
        let donated = Donated {
            ptr: self.ptr,
            len: self.len,
        };
        std::mem::forget(self);
        donated
    }
}

impl Storage for Mapping {
    fn bytes(&self) -> &[u8] {
        // SAFETY: `ptr` points to `len` readable bytes for as long as `self` lives.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: the range was mapped by us and is unmapped exactly once.
        unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) };
    }
}

/// An address range whose pages were given away to the kernel.
///
/// The old pages may still be read by the consumer of the pipe, so the range must not be
/// written until [`Donated::remap`] has put fresh pages behind it.
#[derive(Debug)]
pub struct Donated {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: see `Mapping`.
unsafe impl Send for Donated {}

impl Donated {
    /// Maps fresh zeroed pages at the same address and returns them as a writable mapping.
    pub fn remap(self) -> Result<Mapping> {
        let (ptr, len) = (self.ptr, self.len);
        std::mem::forget(self);
        // SAFETY: the range is still reserved by this process and nothing else refers to it;
        // MAP_FIXED atomically replaces the donated pages.
        unsafe { map(ptr.as_ptr(), len, libc::MAP_FIXED) }
    }
}

impl Drop for Donated {
    fn drop(&mut self) {
        // SAFETY: the address range is still ours even though its pages were gifted.
        unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) };
    }
}

/// # Safety
/// With `MAP_FIXED` in `flags`, `addr..addr + len` must be a range this process owns and no live
/// reference may point into it.
unsafe fn map(addr: *mut u8, len: usize, flags: libc::c_int) -> Result<Mapping> {
    let ptr = libc::mmap(
        addr.cast(),
        len,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | flags,
        -1,
        0,
    );
    if ptr == libc::MAP_FAILED {
        return Err(Error::MemoryMapFailure(io::Error::last_os_error()));
    }
    NonNull::new(ptr.cast::<u8>())
        .map(|ptr| Mapping { ptr, len })
        .ok_or_else(|| {
            Error::MemoryMapFailure(io::Error::new(
                io::ErrorKind::Other,
                "kernel returned a null mapping",
            ))
        })
}

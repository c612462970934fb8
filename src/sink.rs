use std::{
    fmt,
    fs::File,
    io::{self, Write},
    os::{
        fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd},
        unix::fs::FileTypeExt,
    },
    str::FromStr,
};

use crate::{
    buffer::{zeroed, BatchBuffer, Mapping, Storage},
    error::{Error, Result},
    LINE_LEN,
};

/// The descriptor the stream is written to.
///
/// Every worker gets its own duplicate, all sharing one open file description.
#[derive(Debug)]
pub struct Destination {
    fd: OwnedFd,
}

impl Destination {
    /// A duplicate of the process's standard output.
    pub fn stdout() -> Result<Self> {
        let fd = io::stdout()
            .as_fd()
            .try_clone_to_owned()
            .map_err(Error::WriteFailure)?;
        Ok(Self { fd })
    }

    pub fn try_clone(&self) -> Result<Self> {
        let fd = self.fd.try_clone().map_err(Error::WriteFailure)?;
        Ok(Self { fd })
    }

    /// Returns `true` if the descriptor refers to a pipe (FIFO).
    pub fn is_pipe(&self) -> Result<bool> {
        let file = File::from(self.fd.try_clone().map_err(Error::WriteFailure)?);
        let metadata = file.metadata().map_err(Error::WriteFailure)?;
        Ok(metadata.file_type().is_fifo())
    }
}

impl From<OwnedFd> for Destination {
    fn from(fd: OwnedFd) -> Self {
        Self { fd }
    }
}

/// Where full batches go.
///
/// `flush` takes the batch by value and hands back the one to fill next. For sinks that give the
/// memory away this is a different buffer, even if it lives at the same address.
pub trait Sink {
    type Storage: Storage;

    /// Allocates an empty batch of `lines` lines suited to this sink.
    fn allocate(&self, lines: usize) -> Result<BatchBuffer<Self::Storage>>;

    /// Transmits every filled byte of `batch` and returns an empty batch of the same capacity.
    fn flush(&mut self, batch: BatchBuffer<Self::Storage>) -> Result<BatchBuffer<Self::Storage>>;
}

/// Copies each batch into the destination with ordinary `write(2)` calls and reuses the memory.
#[derive(Debug)]
pub struct BlockingWrite {
    file: File,
}

impl BlockingWrite {
    pub fn new(destination: Destination) -> Self {
        Self {
            file: File::from(destination.fd),
        }
    }
}

impl Sink for BlockingWrite {
    type Storage = Box<[u8]>;

    fn allocate(&self, lines: usize) -> Result<BatchBuffer<Self::Storage>> {
        let storage = zeroed(lines, LINE_LEN)?.into_boxed_slice();
        Ok(BatchBuffer::new(storage, lines))
    }

    fn flush(
        &mut self,
        mut batch: BatchBuffer<Self::Storage>,
    ) -> Result<BatchBuffer<Self::Storage>> {
        let data = batch.filled();
        let mut written = 0;
        while written < data.len() {
            match self.file.write(&data[written..]) {
                Ok(0) => {
                    return Err(Error::WriteFailure(io::Error::from(
                        io::ErrorKind::WriteZero,
                    )))
                }
                Ok(count) => written += count,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    wait_writable(self.file.as_fd()).map_err(Error::WriteFailure)?;
                }
                Err(err) => return Err(Error::WriteFailure(err)),
            }
        }
        batch.reset();
        Ok(batch)
    }
}

/// Blocks until `fd` accepts more data. Needed when the destination was opened `O_NONBLOCK`.
fn wait_writable(fd: BorrowedFd<'_>) -> io::Result<()> {
    let mut poll = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLOUT,
        revents: 0,
    };
    loop {
        // SAFETY: `poll` is a single valid entry that outlives the call.
        if unsafe { libc::poll(&mut poll, 1, -1) } >= 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Gifts the pages of each batch to a pipe with `vmsplice(2)` instead of copying them.
///
/// After the gift the pipe may still reference the pages, so the batch is consumed and fresh
/// pages are mapped at the same address before the next fill.
#[cfg(target_os = "linux")]
#[derive(Debug)]
pub struct Splice {
    pipe: OwnedFd,
}

#[cfg(target_os = "linux")]
impl Splice {
    /// Fails with [`Error::NotAPipe`] unless `destination` is a pipe.
    pub fn new(destination: Destination) -> Result<Self> {
        if !destination.is_pipe()? {
            return Err(Error::NotAPipe);
        }
        Ok(Self {
            pipe: destination.fd,
        })
    }

    fn donate(&self, data: &[u8]) -> Result<()> {
        let mut iov = libc::iovec {
            iov_base: data.as_ptr() as *mut libc::c_void,
            iov_len: data.len(),
        };
        while iov.iov_len > 0 {
            // SAFETY: `iov` describes initialized memory that stays mapped for the whole call.
            let count =
                unsafe { libc::vmsplice(self.pipe.as_raw_fd(), &iov, 1, libc::SPLICE_F_GIFT) };
            if count < 0 {
                let err = io::Error::last_os_error();
                match err.kind() {
                    io::ErrorKind::Interrupted => continue,
                    io::ErrorKind::WouldBlock => {
                        wait_writable(self.pipe.as_fd()).map_err(Error::DonationFailure)?;
                        continue;
                    }
                    _ => return Err(Error::DonationFailure(err)),
                }
            }
            if count == 0 {
                return Err(Error::DonationFailure(io::Error::from(
                    io::ErrorKind::WriteZero,
                )));
            }
            let count = count as usize;
            // SAFETY: the kernel reports at most `iov_len` bytes, so the base stays in bounds.
            iov.iov_base = unsafe { iov.iov_base.cast::<u8>().add(count).cast() };
            iov.iov_len -= count;
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
impl Sink for Splice {
    type Storage = Mapping;

    fn allocate(&self, lines: usize) -> Result<BatchBuffer<Self::Storage>> {
        let len = lines
            .checked_mul(LINE_LEN)
            .ok_or(Error::BatchTooLarge { lines })?;
        Ok(BatchBuffer::new(Mapping::anonymous(len)?, lines))
    }

    fn flush(&mut self, batch: BatchBuffer<Self::Storage>) -> Result<BatchBuffer<Self::Storage>> {
        let lines = batch.lines();
        self.donate(batch.filled())?;
        let fresh = batch.into_storage().donate().remap()?;
        Ok(BatchBuffer::new(fresh, lines))
    }
}

/// The output strategies a worker can be built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    /// Zero-copy when the destination is a pipe, blocking write otherwise.
    #[default]
    Auto,
    BlockingWrite,
    ZeroCopy,
}

impl SinkKind {
    /// Picks the concrete strategy for `destination`.
    pub fn resolve(self, destination: &Destination) -> Result<Self> {
        match self {
            Self::Auto if cfg!(target_os = "linux") && destination.is_pipe()? => Ok(Self::ZeroCopy),
            Self::Auto => Ok(Self::BlockingWrite),
            kind => Ok(kind),
        }
    }
}

impl FromStr for SinkKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "blocking-write" | "write" => Ok(Self::BlockingWrite),
            "zero-copy" | "vmsplice" => Ok(Self::ZeroCopy),
            _ => Err(Error::InvalidConfig {
                key: "sink",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Auto => "auto",
            Self::BlockingWrite => "blocking-write",
            Self::ZeroCopy => "zero-copy",
        })
    }
}

use std::{io, os::fd::RawFd};

/// Direction a request waits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Interest {
    Read,
    Write,
}

impl Interest {
    /// The `poll(2)` event bits that mean "ready" for this direction.
    pub(crate) fn poll_events(self) -> libc::c_short {
        match self {
            Interest::Read => libc::POLLIN,
            Interest::Write => libc::POLLOUT,
        }
    }
}

/// Outcome of a single non-blocking attempt.
#[derive(Debug)]
pub(crate) enum Attempt {
    /// The syscall finished, successfully or not. Errors are terminal for the request.
    Complete(io::Result<usize>),

    /// The descriptor was not ready; nothing was transferred.
    WouldBlock,
}

/// One non-blocking read or write on a descriptor.
///
/// The request only borrows the buffer through a raw pointer. The [`Op`](super::op::Op) that
/// created it owns the buffer and outlives the request: it deregisters the request before the
/// buffer can be dropped.
#[derive(Debug)]
pub(crate) struct IoRequest {
    fd: RawFd,
    interest: Interest,
    ptr: *mut u8,
    len: usize,
}

impl IoRequest {
    /// # Safety
    ///
    /// `ptr` must be valid for writes of `len` bytes for as long as the request exists.
    pub(crate) unsafe fn read(fd: RawFd, ptr: *mut u8, len: usize) -> Self {
        Self {
            fd,
            interest: Interest::Read,
            ptr,
            len,
        }
    }

    /// # Safety
    ///
    /// `ptr` must be valid for reads of `len` bytes for as long as the request exists.
    pub(crate) unsafe fn write(fd: RawFd, ptr: *const u8, len: usize) -> Self {
        Self {
            fd,
            interest: Interest::Write,
            ptr: ptr as *mut u8,
            len,
        }
    }

    pub(crate) fn fd(&self) -> RawFd {
        self.fd
    }

    pub(crate) fn interest(&self) -> Interest {
        self.interest
    }

    /// Performs exactly one read or write, retrying only when interrupted by a signal.
    pub(crate) fn attempt(&mut self) -> Attempt {
        loop {
            // Safety: pointer validity is guaranteed by the constructor's contract.
            let n = unsafe {
                match self.interest {
                    Interest::Read => libc::read(self.fd, self.ptr.cast(), self.len),
                    Interest::Write => libc::write(self.fd, self.ptr as *const libc::c_void, self.len),
                }
            };

            if n >= 0 {
                return Attempt::Complete(Ok(n as usize));
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => {
                    tracing::trace!(fd = self.fd, interest = ?self.interest, "would block");
                    return Attempt::WouldBlock;
                }
                _ => return Attempt::Complete(Err(err)),
            }
        }
    }

    /// Attempts the request again after the descriptor was reported ready.
    ///
    /// Returns `None` on a spurious wakeup, in which case the request stays parked.
    pub(crate) fn retry(&mut self) -> Option<io::Result<usize>> {
        match self.attempt() {
            Attempt::Complete(result) => Some(result),
            Attempt::WouldBlock => None,
        }
    }
}

//! Descriptor setup for the scheduler: non-blocking pipes and periodic timers.
//!
//! The scheduler itself only sees raw descriptors, these helpers create ones that are already in
//! non-blocking mode.

use std::{
    io,
    os::fd::{FromRawFd, OwnedFd, RawFd},
    time::Duration,
};

/// How a pipe delivers data to its reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipeMode {
    /// A plain byte stream. Reads return whatever is buffered.
    Stream,

    /// Every write is a packet and every read returns at most one packet (`O_DIRECT`).
    Packet,
}

/// Creates a non-blocking pipe and returns its `(read, write)` ends.
pub fn pipe(mode: PipeMode) -> io::Result<(OwnedFd, OwnedFd)> {
    let mut flags = libc::O_NONBLOCK | libc::O_CLOEXEC;
    if mode == PipeMode::Packet {
        flags |= libc::O_DIRECT;
    }

    let mut fds: [RawFd; 2] = [-1; 2];
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), flags) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: pipe2 succeeded, so both descriptors are open and owned by nobody else
    let ends = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    Ok(ends)
}

/// Creates a non-blocking timer descriptor that expires every `interval`, starting one
/// `interval` from now.
///
/// Reading the descriptor yields the number of expirations since the last read as a native
/// endian `u64`.
pub fn timer(interval: Duration) -> io::Result<OwnedFd> {
    if interval.is_zero() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "timer interval must be non-zero",
        ));
    }

    let raw = unsafe {
        libc::timerfd_create(
            libc::CLOCK_MONOTONIC,
            libc::TFD_NONBLOCK | libc::TFD_CLOEXEC,
        )
    };
    if raw < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: timerfd_create returned a fresh descriptor
    let fd = unsafe { OwnedFd::from_raw_fd(raw) };

    let spec = timespec(interval);
    let value = libc::itimerspec {
        it_interval: spec,
        it_value: spec,
    };
    let rc = unsafe { libc::timerfd_settime(raw, 0, &value, std::ptr::null_mut()) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    tracing::debug!(fd = raw, ?interval, "armed periodic timer");
    Ok(fd)
}

fn timespec(duration: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: duration.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    }
}

/// Writes `bytes` to `fd` once, outside of any scheduler.
pub fn write_raw(fd: RawFd, bytes: &[u8]) -> io::Result<usize> {
    let rc = unsafe { libc::write(fd, bytes.as_ptr().cast(), bytes.len()) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc as usize)
    }
}

#[cfg(test)]
mod test {
    use std::os::fd::AsRawFd;

    use super::*;

    fn read_raw(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
        let rc = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(rc as usize)
        }
    }

    #[test]
    fn pipes_are_non_blocking() {
        let (rx, _tx) = pipe(PipeMode::Stream).unwrap();
        let mut buf = [0u8; 4];
        let err = read_raw(rx.as_raw_fd(), &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn packet_pipe_keeps_message_boundaries() {
        let (rx, tx) = pipe(PipeMode::Packet).unwrap();
        write_raw(tx.as_raw_fd(), b"Tick1").unwrap();
        write_raw(tx.as_raw_fd(), b"Fizz").unwrap();

        let mut buf = [0u8; 64];
        let n = read_raw(rx.as_raw_fd(), &mut buf).unwrap();
        assert_eq!(&buf[..n], b"Tick1");
        let n = read_raw(rx.as_raw_fd(), &mut buf).unwrap();
        assert_eq!(&buf[..n], b"Fizz");
    }

    #[test]
    fn zero_interval_timer_is_rejected() {
        let err = timer(Duration::ZERO).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn timer_is_not_ready_before_its_first_expiration() {
        let fd = timer(Duration::from_secs(60)).unwrap();
        let mut buf = [0u8; 8];
        let err = read_raw(fd.as_raw_fd(), &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }
}

use alloc::rc::Rc;
use std::{cell::RefCell, io, os::fd::RawFd, task::Waker, time::Duration};

use self::{
    op::{Ops, OpsKey},
    request::IoRequest,
    table::ReadinessTable,
};
use crate::Result;

mod lifecycle;
pub(super) mod op;
pub(super) mod request;
mod table;

scoped_tls::scoped_thread_local!(pub(super) static CURRENT: InnerHandle);

/// A request parked on `fd` by the operation `key`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Parking {
    pub(crate) fd: RawFd,
    key: OpsKey,
}

pub(crate) struct DriverInner {
    ops: Ops,
    table: ReadinessTable,

    // Most recent registration, consumed by the executor to tell which descriptor a task
    // suspended on
    last_registered: Option<Parking>,
}

impl DriverInner {
    /// Parks `request` until its descriptor is ready.
    fn register(&mut self, request: IoRequest, waker: &Waker) -> Result<OpsKey> {
        let fd = request.fd();
        if self.table.contains(fd) {
            tracing::debug!(fd, "conflicting request on parked descriptor");
            return Err(crate::Error::ConflictingRequest { fd });
        }

        let key = self.ops.insert(waker);
        if let Err(err) = self.table.insert(key, request) {
            self.ops.remove(key);
            return Err(err);
        }
        self.last_registered = Some(Parking { fd, key });
        tracing::trace!(fd, parked = self.table.len(), "parked request");
        Ok(key)
    }

    /// Forgets the operation `key`, parked or completed.
    fn deregister(&mut self, fd: RawFd, key: OpsKey) {
        if self.table.remove_if_owned(fd, key) {
            tracing::trace!(fd, "unparked dropped request");
        }
        self.ops.remove(key);
    }

    /// Retries the parked request of every descriptor that `poll(2)` reported.
    ///
    /// Entries are removed and their wakers collected for completed requests. Nothing is woken
    /// here: the caller wakes once the table is consistent.
    fn retry_ready(&mut self, polls: &[libc::pollfd]) -> Vec<Waker> {
        let mut wakers = Vec::new();

        for poll in polls.iter().filter(|p| p.revents != 0) {
            let fd = poll.fd;
            let parked = match self.table.get_mut(fd) {
                Some(parked) => parked,
                None => continue,
            };

            let result = match parked.request.retry() {
                Some(result) => result,
                None => {
                    tracing::trace!(fd, revents = poll.revents, "spurious readiness");
                    continue;
                }
            };

            let key = parked.key;
            self.table.remove(fd);
            if let Some(waker) = self.ops.complete(key, result) {
                wakers.push(waker);
            }
        }

        wakers
    }
}

pub(crate) type InnerHandle = Rc<RefCell<DriverInner>>;

/// Readiness driver over `poll(2)`.
pub(crate) struct PollDriver {
    inner: InnerHandle,
}

impl PollDriver {
    pub(crate) fn new() -> Self {
        let inner = Rc::new(RefCell::new(DriverInner {
            ops: Ops::new(),
            table: ReadinessTable::new(),
            last_registered: None,
        }));

        Self { inner }
    }

    /// Runs `f` with this driver as the one requests park with.
    pub(crate) fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        CURRENT.set(&self.inner, f)
    }

    /// Waits until at least one parked descriptor is ready, then retries the ready ones.
    ///
    /// Returns the wakers of the completed requests, in ascending descriptor order.
    pub(crate) fn park(&self) -> io::Result<Vec<Waker>> {
        self.inner_park(None)
    }

    pub(crate) fn park_timeout(&self, duration: Duration) -> io::Result<Vec<Waker>> {
        self.inner_park(Some(duration))
    }

    pub(crate) fn parked_descriptors(&self) -> Vec<RawFd> {
        self.inner.borrow().table.descriptors().collect()
    }

    pub(crate) fn num_parked(&self) -> usize {
        self.inner.borrow().table.len()
    }

    #[cfg(test)]
    pub(crate) fn num_operations(&self) -> usize {
        self.inner.borrow().ops.len()
    }

    pub(crate) fn take_last_registered(&self) -> Option<Parking> {
        self.replace_last_registered(None)
    }

    pub(crate) fn replace_last_registered(&self, parking: Option<Parking>) -> Option<Parking> {
        std::mem::replace(&mut self.inner.borrow_mut().last_registered, parking)
    }

    /// Returns `true` while the request of `parking` is still waiting in the table.
    pub(crate) fn is_parked(&self, parking: Parking) -> bool {
        self.inner.borrow().table.is_owned(parking.fd, parking.key)
    }

    fn inner_park(&self, timeout: Option<Duration>) -> io::Result<Vec<Waker>> {
        let mut polls = self.inner.borrow().table.interests();
        let timeout_ms = match timeout {
            None => -1,
            Some(duration) => duration.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
        };

        if timeout.is_none() && self.inner.borrow().table.is_empty() {
            tracing::warn!("nothing is parked; waiting indefinitely");
        }

        // No borrow of the driver is held while blocked.
        let rc = unsafe { libc::poll(polls.as_mut_ptr(), polls.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                tracing::trace!("readiness wait interrupted");
                return Ok(Vec::new());
            }
            return Err(err);
        }
        if rc == 0 {
            return Ok(Vec::new());
        }

        Ok(self.inner.borrow_mut().retry_ready(&polls))
    }
}

#[cfg(test)]
mod test {
    use std::{
        future::Future,
        os::fd::AsRawFd,
        pin::pin,
        task::{Context, Poll, Wake, Waker},
    };

    use super::*;
    use crate::{
        driver::{request_read, request_write},
        sys::{self, PipeMode},
        Error,
    };

    struct Noop;

    impl Wake for Noop {
        fn wake(self: std::sync::Arc<Self>) {}
    }

    fn noop_waker() -> Waker {
        Waker::from(std::sync::Arc::new(Noop))
    }

    #[test]
    fn ready_request_never_touches_the_table() {
        let (_rx, tx) = sys::pipe(PipeMode::Stream).unwrap();
        let driver = PollDriver::new();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        driver.with(|| {
            let mut op = pin!(request_write(tx.as_raw_fd(), "AB"));
            match op.as_mut().poll(&mut cx) {
                Poll::Ready((res, buf)) => {
                    assert_eq!(res.unwrap(), 2);
                    assert_eq!(buf, "AB");
                }
                Poll::Pending => panic!("write should not suspend"),
            }
        });
        assert_eq!(driver.num_parked(), 0);
        assert_eq!(driver.num_operations(), 0);
    }

    #[test]
    fn park_retry_and_pick_up_result() {
        let (rx, tx) = sys::pipe(PipeMode::Stream).unwrap();
        let driver = PollDriver::new();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        driver.with(|| {
            let mut op = pin!(request_read(rx.as_raw_fd(), Vec::<u8>::with_capacity(8)));
            assert!(op.as_mut().poll(&mut cx).is_pending());
            assert_eq!(driver.parked_descriptors(), [rx.as_raw_fd()]);
            let parking = driver.take_last_registered().unwrap();
            assert_eq!(parking.fd, rx.as_raw_fd());
            assert!(driver.is_parked(parking));

            sys::write_raw(tx.as_raw_fd(), b"XY").unwrap();
            let wakers = driver.park().unwrap();
            assert_eq!(wakers.len(), 1);
            assert_eq!(driver.num_parked(), 0);
            assert!(!driver.is_parked(parking));

            match op.as_mut().poll(&mut cx) {
                Poll::Ready((res, buf)) => {
                    assert_eq!(res.unwrap(), 2);
                    assert_eq!(buf, b"XY");
                }
                Poll::Pending => panic!("completed request should be ready"),
            }
        });
        assert_eq!(driver.num_operations(), 0);
    }

    #[test]
    fn second_request_on_parked_descriptor_conflicts() {
        let (rx, _tx) = sys::pipe(PipeMode::Stream).unwrap();
        let driver = PollDriver::new();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        driver.with(|| {
            let mut first = pin!(request_read(rx.as_raw_fd(), Vec::<u8>::with_capacity(8)));
            assert!(first.as_mut().poll(&mut cx).is_pending());

            let mut second = pin!(request_read(rx.as_raw_fd(), Vec::<u8>::with_capacity(8)));
            match second.as_mut().poll(&mut cx) {
                Poll::Ready((Err(Error::ConflictingRequest { fd }), _)) => {
                    assert_eq!(fd, rx.as_raw_fd())
                }
                _ => panic!("expected a conflicting request error"),
            }
            assert_eq!(driver.num_parked(), 1);
        });
    }

    #[test]
    fn dropping_a_parked_request_unparks_it() {
        let (rx, _tx) = sys::pipe(PipeMode::Stream).unwrap();
        let driver = PollDriver::new();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        driver.with(|| {
            let mut op = Box::pin(request_read(rx.as_raw_fd(), Vec::<u8>::with_capacity(8)));
            assert!(op.as_mut().poll(&mut cx).is_pending());
            assert_eq!(driver.num_parked(), 1);
            drop(op);
        });
        assert_eq!(driver.num_parked(), 0);
        assert_eq!(driver.num_operations(), 0);
    }

    #[test]
    fn would_block_without_a_driver_is_an_error() {
        let (rx, _tx) = sys::pipe(PipeMode::Stream).unwrap();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut op = pin!(request_read(rx.as_raw_fd(), Vec::<u8>::with_capacity(8)));
        match op.as_mut().poll(&mut cx) {
            Poll::Ready((Err(Error::NoScheduler), buf)) => assert!(buf.is_empty()),
            _ => panic!("expected NoScheduler"),
        }
    }

    #[test]
    fn timeout_with_nothing_ready_resumes_nothing() {
        let (rx, _tx) = sys::pipe(PipeMode::Stream).unwrap();
        let driver = PollDriver::new();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        driver.with(|| {
            let mut op = pin!(request_read(rx.as_raw_fd(), Vec::<u8>::with_capacity(8)));
            assert!(op.as_mut().poll(&mut cx).is_pending());
            let wakers = driver.park_timeout(Duration::from_millis(1)).unwrap();
            assert!(wakers.is_empty());
            assert_eq!(driver.num_parked(), 1);
        });
    }

    #[test]
    fn spurious_readiness_leaves_the_request_parked() {
        let (rx, _tx) = sys::pipe(PipeMode::Stream).unwrap();
        let driver = PollDriver::new();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        driver.with(|| {
            let mut op = pin!(request_read(rx.as_raw_fd(), Vec::<u8>::with_capacity(8)));
            assert!(op.as_mut().poll(&mut cx).is_pending());

            // Report the empty pipe as readable
            let mut polls = driver.inner.borrow().table.interests();
            for poll in polls.iter_mut() {
                poll.revents = libc::POLLIN;
            }
            let wakers = driver.inner.borrow_mut().retry_ready(&polls);

            assert!(wakers.is_empty());
            assert_eq!(driver.parked_descriptors(), [rx.as_raw_fd()]);
            assert!(op.as_mut().poll(&mut cx).is_pending());
        });
        assert_eq!(driver.num_parked(), 0);
    }
}

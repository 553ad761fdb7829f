use std::{
    future::Future,
    io,
    os::fd::RawFd,
    pin::Pin,
    task::{Context, Poll, Waker},
};

use slotmap::{new_key_type, SlotMap};

use super::{
    lifecycle::Lifecycle,
    request::{Attempt, IoRequest},
    InnerHandle,
};
use crate::{
    buf::{IoBuf, IoBufMut},
    Error, Result,
};

/// Result of a request together with the buffer it was issued with.
///
/// On success the result is the number of bytes transferred; the buffer is handed back either
/// way.
pub type BufResult<B> = (Result<usize>, B);

new_key_type! {
    /// Key for ops
    pub(crate) struct OpsKey;
}

pub(super) struct Ops {
    slot: SlotMap<OpsKey, Lifecycle>,
}

impl Ops {
    pub(super) fn new() -> Self {
        Ops {
            slot: SlotMap::with_capacity_and_key(64),
        }
    }

    pub(super) fn insert(&mut self, waker: &Waker) -> OpsKey {
        self.slot.insert(Lifecycle::Waiting(waker.clone()))
    }

    pub(super) fn remove(&mut self, key: OpsKey) {
        self.slot.remove(key);
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.slot.len()
    }

    /// Records the result of a completed retry and returns the waker to resume.
    pub(super) fn complete(&mut self, key: OpsKey, result: io::Result<usize>) -> Option<Waker> {
        self.slot.get_mut(key)?.complete(result)
    }

    fn poll(&mut self, key: OpsKey, cx: &mut Context<'_>) -> Poll<io::Result<usize>> {
        let lifecycle = self.slot.get_mut(key).expect("invalid internal state");
        if let Lifecycle::Waiting(waker) = lifecycle {
            if !waker.will_wake(cx.waker()) {
                *waker = cx.waker().clone();
            }
            return Poll::Pending;
        }

        match self.slot.remove(key) {
            Some(Lifecycle::Completed(result)) => Poll::Ready(result),
            _ => unreachable!("invalid operation state"),
        }
    }
}

/// Where a request that would block got parked.
struct Registration {
    driver: InnerHandle,
    key: OpsKey,
}

/// A read or write request, returned by [`request_read`] and [`request_write`].
///
/// The first poll attempts the I/O right away. If the descriptor is not ready the request is
/// parked with the scheduler running on this thread and the awaiting task is suspended until a
/// pump retries it successfully. Dropping a parked `Op` unparks it.
#[must_use = "requests do nothing unless awaited"]
pub struct Op<B: 'static> {
    fd: RawFd,

    // Per-operation buffer
    data: Option<B>,

    // Builds the raw request over the buffer's storage
    prepare: fn(&mut B, RawFd) -> IoRequest,

    // Called with the number of bytes transferred once the request succeeds
    finish: fn(&mut B, usize),

    registration: Option<Registration>,
}

/// Reads from `fd` into `buf`, suspending the calling task until the descriptor is readable.
///
/// The read fills `buf` from its start, up to its total capacity. Use
/// [`IoBuf::slice`](crate::buf::IoBuf::slice) to read into part of a buffer.
pub fn request_read<B: IoBufMut>(fd: RawFd, buf: B) -> Op<B> {
    Op {
        fd,
        data: Some(buf),
        prepare: |buf, fd| {
            // Safety: the buffer lives in the `Op`, which unparks the request before dropping it
            unsafe { IoRequest::read(fd, buf.write_ptr(), buf.bytes_total()) }
        },
        finish: |buf, n| unsafe { buf.set_init(n) },
        registration: None,
    }
}

/// Writes the initialized bytes of `buf` to `fd`, suspending the calling task until the
/// descriptor is writable.
pub fn request_write<B: IoBuf>(fd: RawFd, buf: B) -> Op<B> {
    Op {
        fd,
        data: Some(buf),
        prepare: |buf, fd| {
            // Safety: see `request_read`
            unsafe { IoRequest::write(fd, buf.read_ptr(), buf.bytes_init()) }
        },
        finish: |_, _| {},
        registration: None,
    }
}

impl<B: 'static> Op<B> {
    /// The descriptor this request targets.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    fn complete(&mut self, result: Result<usize>) -> BufResult<B> {
        let mut buf = self.data.take().expect("unexpected operation state");
        if let Ok(n) = result {
            (self.finish)(&mut buf, n);
        }
        (result, buf)
    }

    fn park(&mut self, request: IoRequest, cx: &mut Context<'_>) -> Poll<BufResult<B>> {
        if !super::CURRENT.is_set() {
            return Poll::Ready(self.complete(Err(Error::NoScheduler)));
        }

        let registered = super::CURRENT.with(|handle| -> Result<Registration> {
            let key = handle.borrow_mut().register(request, cx.waker())?;
            Ok(Registration {
                driver: handle.clone(),
                key,
            })
        });

        match registered {
            Ok(registration) => {
                self.registration = Some(registration);
                Poll::Pending
            }
            Err(err) => Poll::Ready(self.complete(Err(err))),
        }
    }
}

impl<B: Unpin + 'static> Future for Op<B> {
    type Output = BufResult<B>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let me = self.get_mut();

        match me.registration.take() {
            None => {
                let data = me.data.as_mut().expect("unexpected operation state");
                let mut request = (me.prepare)(data, me.fd);
                match request.attempt() {
                    Attempt::Complete(result) => Poll::Ready(me.complete(result.map_err(Error::from))),
                    Attempt::WouldBlock => me.park(request, cx),
                }
            }
            Some(registration) => {
                let poll = registration.driver.borrow_mut().ops.poll(registration.key, cx);
                match poll {
                    Poll::Pending => {
                        me.registration = Some(registration);
                        Poll::Pending
                    }
                    Poll::Ready(result) => Poll::Ready(me.complete(result.map_err(Error::from))),
                }
            }
        }
    }
}

impl<B: 'static> Drop for Op<B> {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration
                .driver
                .borrow_mut()
                .deregister(self.fd, registration.key);
        }
    }
}

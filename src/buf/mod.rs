//! Owned buffers for requests that may be parked.
//!
//! A request that would block is retried later by the scheduler, long after the task that issued
//! it was suspended. The buffer therefore travels with the request and is handed back together
//! with the result.

mod io_buf;
mod io_buf_mut;
mod slice;

pub use io_buf::IoBuf;
pub use io_buf_mut::IoBufMut;
pub use slice::Slice;

pub(crate) fn deref(buf: &impl IoBuf) -> &[u8] {
    // Safety: The `IoBuf` trait is marked as unsafe and is expected to be
    // implemented correctly
    unsafe { std::slice::from_raw_parts(buf.read_ptr(), buf.bytes_init()) }
}

pub(crate) fn deref_mut(buf: &mut impl IoBufMut) -> &mut [u8] {
    // Safety: The `IoBufMut` trait is marked as unsafe and is expected to be
    // implemented correctly
    unsafe { std::slice::from_raw_parts_mut(buf.write_ptr(), buf.bytes_init()) }
}

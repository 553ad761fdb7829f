//! Readiness driver.
//!
//! The driver owns the readiness table: at most one parked request per descriptor. Requests are
//! created by [`request_read`] and [`request_write`], attempted immediately, and only reach the
//! driver when the descriptor is not ready.

mod poll;

pub use poll::op::{request_read, request_write, BufResult, Op};
pub(crate) use poll::{Parking, PollDriver};

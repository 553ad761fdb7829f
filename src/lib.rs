//! A single-threaded, readiness-driven task scheduler.
//!
//! Tasks are plain futures. Every read or write a task issues is attempted right away on a
//! non-blocking descriptor; only when the attempt would block is the request parked in the
//! scheduler's readiness table and the task suspended. [`Scheduler::pump_events`] waits on the
//! parked descriptors with `poll(2)`, retries the ready ones and resumes their tasks.
//!
//! ```no_run
//! use std::os::fd::AsRawFd;
//!
//! use readyio::{request_read, sys, Scheduler};
//!
//! let (rx, tx) = sys::pipe(sys::PipeMode::Stream).unwrap();
//! let scheduler = Scheduler::new();
//! let reader = scheduler.spawn(async move {
//!     let (res, buf) = request_read(rx.as_raw_fd(), Vec::<u8>::with_capacity(16)).await;
//!     res.map(|n| buf[..n].to_vec())
//! });
//! sys::write_raw(tx.as_raw_fd(), b"hi").unwrap();
//! let bytes = scheduler.run_until(&reader).unwrap();
//! ```

extern crate alloc;

pub mod buf;
pub mod config;
pub mod driver;
mod error;
pub mod executor;
pub mod fizzbuzz;
pub mod sys;
pub mod task;
pub(crate) mod utils;

pub use driver::{request_read, request_write, BufResult, Op};
pub use error::{Error, Result};
pub use executor::{spawn, Scheduler};
pub use task::{yield_now, JoinHandle, TaskId, TaskState};

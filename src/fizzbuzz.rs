//! Periodic producer/consumer demo.
//!
//! Two producers write short messages to packet pipes as fast as the pipes accept them. A
//! consumer wakes on a periodic timer and, for every expiration, reads one message from each
//! pipe. A tick on which a producer delivered its marker prints the markers, any other tick
//! prints its number. With the default configuration this prints FizzBuzz.

use std::os::fd::{AsRawFd, RawFd};

use crate::{
    config::{DemoConfig, ProducerConfig},
    request_read, request_write,
    sys::{self, PipeMode},
    Error, Result, Scheduler,
};

/// Largest message a consumer reads in one go.
const MESSAGE_CAPACITY: usize = 64;

/// Writes `config`'s message cycle to `fd` forever.
///
/// Only returns on a write error. The pipe filling up suspends the producer until the consumer
/// catches up.
pub async fn producer(fd: RawFd, config: ProducerConfig) -> Result<()> {
    let mut messages: Vec<Vec<u8>> = config
        .messages()
        .into_iter()
        .map(String::into_bytes)
        .collect();

    loop {
        for message in messages.iter_mut() {
            let buf = std::mem::take(message);
            let (res, buf) = request_write(fd, buf).await;
            *message = buf;

            let n = res?;
            if n != message.len() {
                tracing::warn!(fd, n, len = message.len(), "short write");
            }
        }
    }
}

/// A pipe the consumer reads from, and the message that counts as a hit.
#[derive(Clone, Debug)]
pub struct Source {
    pub fd: RawFd,
    pub marker: String,
}

/// Emits one line per timer expiration until `ticks` lines were emitted, and returns them.
///
/// Each line concatenates the markers of the sources that delivered their marker for that
/// tick, in `sources` order, or is the tick number (starting at 1) when none did.
pub async fn consumer(
    timer: RawFd,
    sources: Vec<Source>,
    ticks: usize,
    mut emit: impl FnMut(&str),
) -> Result<Vec<String>> {
    let mut lines = Vec::with_capacity(ticks);
    if ticks == 0 {
        return Ok(lines);
    }

    let mut expirations = Vec::<u8>::with_capacity(8);
    let mut message = Vec::<u8>::with_capacity(MESSAGE_CAPACITY);
    let mut tick = 1;

    loop {
        expirations.clear();
        let (res, buf) = request_read(timer, expirations).await;
        expirations = buf;
        let count = decode_expirations(res?, &expirations)?;
        tracing::trace!(count, "timer expired");

        for _ in 0..count {
            let mut line = String::new();
            for source in &sources {
                message.clear();
                let (res, buf) = request_read(source.fd, message).await;
                message = buf;
                res?;

                if message == source.marker.as_bytes() {
                    line.push_str(&source.marker);
                }
            }
            if line.is_empty() {
                line = tick.to_string();
            }

            emit(&line);
            lines.push(line);
            if tick == ticks {
                return Ok(lines);
            }
            tick += 1;
        }
    }
}

fn decode_expirations(n: usize, buf: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = buf.get(..n).and_then(|b| b.try_into().ok()).ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("timer read returned {} bytes", n),
        ))
    })?;
    Ok(u64::from_ne_bytes(bytes))
}

/// Runs the demo to completion on a fresh scheduler and returns the emitted lines.
pub fn run(config: &DemoConfig, emit: impl FnMut(&str) + 'static) -> Result<Vec<String>> {
    // Descriptors outlive the scheduler, whose tasks may still have requests parked on them
    let (fizz_rx, fizz_tx) = sys::pipe(PipeMode::Packet)?;
    let (buzz_rx, buzz_tx) = sys::pipe(PipeMode::Packet)?;
    let timer = sys::timer(config.tick_interval)?;

    let scheduler = Scheduler::new();
    for (fd, producer_config) in [
        (fizz_tx.as_raw_fd(), config.fizz.clone()),
        (buzz_tx.as_raw_fd(), config.buzz.clone()),
    ] {
        scheduler.spawn(async move {
            if let Err(err) = producer(fd, producer_config).await {
                tracing::error!(fd, %err, "producer stopped");
            }
        });
    }

    let sources = vec![
        Source {
            fd: fizz_rx.as_raw_fd(),
            marker: config.fizz.marker.clone(),
        },
        Source {
            fd: buzz_rx.as_raw_fd(),
            marker: config.buzz.marker.clone(),
        },
    ];
    let done = scheduler.spawn(consumer(timer.as_raw_fd(), sources, config.ticks, emit));

    scheduler.run_until(&done)?
}

//! Configuration of the periodic producer/consumer demo.

use std::{env, time::Duration};

/// Environment variable holding the timer interval in milliseconds.
pub const TICK_MS_VAR: &str = "READYIO_TICK_MS";

/// Environment variable holding the number of ticks to run for.
pub const TICKS_VAR: &str = "READYIO_TICKS";

/// One producer: it writes `filler1` up to `filler{period - 1}`, then `marker`, forever.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProducerConfig {
    pub filler: String,
    pub marker: String,
    pub period: usize,
}

impl ProducerConfig {
    pub fn new(filler: impl Into<String>, marker: impl Into<String>, period: usize) -> Self {
        Self {
            filler: filler.into(),
            marker: marker.into(),
            period,
        }
    }

    /// One cycle of messages. A period of zero or one yields only the marker.
    pub fn messages(&self) -> Vec<String> {
        let mut messages: Vec<String> = (1..self.period)
            .map(|n| format!("{}{}", self.filler, n))
            .collect();
        messages.push(self.marker.clone());
        messages
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemoConfig {
    pub tick_interval: Duration,
    pub ticks: usize,
    pub fizz: ProducerConfig,
    pub buzz: ProducerConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            ticks: 20,
            fizz: ProducerConfig::new("Tick", "Fizz", 3),
            buzz: ProducerConfig::new("Tock", "Buzz", 5),
        }
    }
}

impl DemoConfig {
    /// The default configuration, with [`TICK_MS_VAR`] and [`TICKS_VAR`] applied on top.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`DemoConfig::from_env`], reading variables through `lookup`.
    ///
    /// Values that are not positive integers are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(ms) = positive(&lookup, TICK_MS_VAR) {
            config.tick_interval = Duration::from_millis(ms as u64);
        }
        if let Some(ticks) = positive(&lookup, TICKS_VAR) {
            config.ticks = ticks;
        }

        config
    }
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let raw = lookup(key)?;
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            tracing::warn!(key, value = %raw, "ignoring invalid value; using the default");
            None
        }
    }
}

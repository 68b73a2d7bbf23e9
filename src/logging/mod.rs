//! Logging statistics from rollouts and relabeling
mod display;

pub use display::{DisplayLogger, Summary};

use thiserror::Error;

/// A value that can be logged.
#[derive(Debug, Clone, PartialEq)]
pub enum Loggable {
    /// Nothing. No data to log.
    /// Logging Nothing data may still produce a placeholder entry for the name.
    Nothing,
    /// A scalar value. Aggregate by taking means.
    Scalar(f64),
    /// Increment a counter. Aggregate by summing.
    CounterIncrement(u64),
    /// A sample from a distribution over `0 .. size`.
    IndexSample { value: usize, size: usize },
}

impl From<f64> for Loggable {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<f32> for Loggable {
    #[inline]
    fn from(value: f32) -> Self {
        Self::Scalar(value.into())
    }
}

/// Error logging a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LogError {
    #[error("\"{name}\": incompatible value {value:?}, expected {expected}")]
    IncompatibleValue {
        name: &'static str,
        value: Loggable,
        expected: &'static str,
    },
}

/// Log named statistics.
pub trait StatsLogger {
    /// Log a value.
    ///
    /// # Args
    /// * `name`  - The name that identifies this value.
    /// * `value` - The value to log.
    ///
    /// # Returns
    /// May return an error if the logged value is structurally incompatible
    /// with previous values logged under the same name.
    fn log(&mut self, name: &'static str, value: Loggable) -> Result<(), LogError>;

    /// Log a scalar value.
    #[inline]
    fn log_scalar(&mut self, name: &'static str, value: f64) -> Result<(), LogError> {
        self.log(name, Loggable::Scalar(value))
    }

    /// Increment a counter.
    #[inline]
    fn log_counter_increment(
        &mut self,
        name: &'static str,
        increment: u64,
    ) -> Result<(), LogError> {
        self.log(name, Loggable::CounterIncrement(increment))
    }

    /// Write any buffered summaries.
    fn flush(&mut self) {}
}

/// Logger that does nothing
impl StatsLogger for () {
    #[inline]
    fn log(&mut self, _: &'static str, _: Loggable) -> Result<(), LogError> {
        Ok(())
    }
}

impl<L: StatsLogger + ?Sized> StatsLogger for &'_ mut L {
    #[inline]
    fn log(&mut self, name: &'static str, value: Loggable) -> Result<(), LogError> {
        L::log(self, name, value)
    }
    #[inline]
    fn flush(&mut self) {
        L::flush(self)
    }
}

impl<L: StatsLogger + ?Sized> StatsLogger for Box<L> {
    #[inline]
    fn log(&mut self, name: &'static str, value: Loggable) -> Result<(), LogError> {
        L::log(self, name, value)
    }
    #[inline]
    fn flush(&mut self) {
        L::flush(self)
    }
}

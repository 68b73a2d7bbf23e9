//! Command-line logger
use super::{LogError, Loggable, StatsLogger};
use coarsetime::{Duration as CDuration, Instant as CInstant};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use yansi::Paint;

/// Logger that displays summaries of logged values to standard output.
///
/// Values are aggregated per name and displayed (then cleared) at most once per display period.
#[derive(Debug)]
pub struct DisplayLogger {
    aggregators: BTreeMap<&'static str, Aggregator>,
    // Coarse time because the clock is checked on every log call.
    display_period: CDuration,
    last_display: CInstant,
}

impl DisplayLogger {
    #[must_use]
    pub fn new(display_period: Duration) -> Self {
        Self {
            aggregators: BTreeMap::new(),
            display_period: CDuration::new(
                display_period.as_secs(),
                display_period.subsec_nanos(),
            ),
            last_display: CInstant::now(),
        }
    }

    /// The current aggregate for `name`, if anything has been logged since the last display.
    #[must_use]
    pub fn summary(&self, name: &str) -> Option<Summary> {
        self.aggregators.get(name).map(Aggregator::summary)
    }

    /// Display the summary and clear all stored data.
    pub fn display(&mut self) {
        if self.aggregators.is_empty() {
            return;
        }
        println!();
        for (name, aggregator) in &self.aggregators {
            println!("{:<24} {}", Paint::fixed(35, name), aggregator.summary());
        }
        self.aggregators.clear();
        self.last_display = CInstant::now();
    }
}

impl Default for DisplayLogger {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl StatsLogger for DisplayLogger {
    fn log(&mut self, name: &'static str, value: Loggable) -> Result<(), LogError> {
        let incompatible =
            |(value, expected): (Loggable, &'static str)| LogError::IncompatibleValue {
                name,
                value,
                expected,
            };
        if let Some(aggregator) = self.aggregators.get_mut(name) {
            aggregator.update(value).map_err(incompatible)?;
        } else {
            let aggregator = Aggregator::new(value).map_err(incompatible)?;
            self.aggregators.insert(name, aggregator);
        }
        if self.last_display.elapsed() > self.display_period {
            self.display();
        }
        Ok(())
    }

    fn flush(&mut self) {
        self.display();
    }
}

impl Drop for DisplayLogger {
    fn drop(&mut self) {
        // Ensure everything is flushed.
        self.display();
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Aggregator {
    Nothing,
    Scalar { count: u64, sum: f64, sum_sq: f64 },
    Counter { total: u64 },
    Index { counts: Vec<u64> },
}

impl Aggregator {
    /// A new aggregator holding `value`.
    ///
    /// Fails for an [`Loggable::IndexSample`] whose value is out of range.
    fn new(value: Loggable) -> Result<Self, (Loggable, &'static str)> {
        let mut aggregator = match &value {
            Loggable::Nothing => return Ok(Self::Nothing),
            Loggable::Scalar(_) => Self::Scalar {
                count: 0,
                sum: 0.0,
                sum_sq: 0.0,
            },
            Loggable::CounterIncrement(_) => Self::Counter { total: 0 },
            Loggable::IndexSample { size, .. } => Self::Index {
                counts: vec![0; *size],
            },
        };
        aggregator.update(value)?;
        Ok(aggregator)
    }

    /// Update with a logged value.
    ///
    /// Returns `Err((value, expected))` if the value is incompatible with this aggregator.
    fn update(&mut self, value: Loggable) -> Result<(), (Loggable, &'static str)> {
        match (self, value) {
            (Self::Nothing, Loggable::Nothing) => {}
            (Self::Scalar { count, sum, sum_sq }, Loggable::Scalar(x)) => {
                *count += 1;
                *sum += x;
                *sum_sq += x * x;
            }
            (Self::Counter { total }, Loggable::CounterIncrement(increment)) => *total += increment,
            (Self::Index { counts }, Loggable::IndexSample { value, size })
                if size == counts.len() && value < size =>
            {
                counts[value] += 1
            }
            (aggregator, value) => return Err((value, aggregator.expected())),
        }
        Ok(())
    }

    const fn expected(&self) -> &'static str {
        match self {
            Self::Nothing => "Nothing",
            Self::Scalar { .. } => "Scalar",
            Self::Counter { .. } => "CounterIncrement",
            Self::Index { .. } => "IndexSample of the same size",
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn summary(&self) -> Summary {
        match self {
            Self::Nothing => Summary::Nothing,
            Self::Scalar { count, sum, sum_sq } => {
                let n = *count as f64;
                let mean = sum / n;
                Summary::Scalar {
                    count: *count,
                    mean,
                    stddev: (sum_sq / n - mean * mean).max(0.0).sqrt(),
                }
            }
            Self::Counter { total } => Summary::Counter { total: *total },
            Self::Index { counts } => Summary::Index {
                counts: counts.clone(),
            },
        }
    }
}

/// Aggregate of the values logged under one name.
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    Nothing,
    Scalar { count: u64, mean: f64, stddev: f64 },
    Counter { total: u64 },
    Index { counts: Vec<u64> },
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Nothing => Ok(()),
            Self::Scalar {
                count,
                mean,
                stddev,
            } => {
                write!(f, "{:.3}", mean)?;
                if *count > 1 {
                    write!(f, " {}", Paint::fixed(8, format!("(σ {:.3})", stddev)))?;
                }
                Ok(())
            }
            Self::Counter { total } => write!(f, "{}", total),
            Self::Index { counts } => {
                let n: u64 = counts.iter().sum();
                write!(f, "(n {})  [", n)?;
                for (i, c) in counts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", c * 100 / n.max(1))?;
                }
                write!(f, "]%")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger() -> DisplayLogger {
        // Long period so nothing is displayed (and cleared) during the test
        DisplayLogger::new(Duration::from_secs(3600))
    }

    #[test]
    fn scalar_mean() {
        let mut logger = logger();
        logger.log_scalar("x", 1.0).unwrap();
        logger.log_scalar("x", 3.0).unwrap();
        assert_eq!(
            logger.summary("x"),
            Some(Summary::Scalar {
                count: 2,
                mean: 2.0,
                stddev: 1.0
            })
        );
    }

    #[test]
    fn counter_total() {
        let mut logger = logger();
        logger.log_counter_increment("steps", 4).unwrap();
        logger.log_counter_increment("steps", 5).unwrap();
        assert_eq!(logger.summary("steps"), Some(Summary::Counter { total: 9 }));
    }

    #[test]
    fn index_counts() {
        let mut logger = logger();
        logger
            .log("i", Loggable::IndexSample { value: 1, size: 3 })
            .unwrap();
        logger
            .log("i", Loggable::IndexSample { value: 1, size: 3 })
            .unwrap();
        assert_eq!(
            logger.summary("i"),
            Some(Summary::Index {
                counts: vec![0, 2, 0]
            })
        );
    }

    #[test]
    fn index_out_of_range_first() {
        let mut logger = logger();
        let sample = Loggable::IndexSample { value: 5, size: 3 };
        assert_eq!(
            logger.log("i", sample.clone()),
            Err(LogError::IncompatibleValue {
                name: "i",
                value: sample,
                expected: "IndexSample of the same size",
            })
        );
        assert_eq!(logger.summary("i"), None);
        logger
            .log("i", Loggable::IndexSample { value: 2, size: 3 })
            .unwrap();
        assert_eq!(
            logger.summary("i"),
            Some(Summary::Index {
                counts: vec![0, 0, 1]
            })
        );
    }

    #[test]
    fn nothing_placeholder() {
        let mut logger = logger();
        logger.log("empty", Loggable::Nothing).unwrap();
        assert_eq!(logger.summary("empty"), Some(Summary::Nothing));
        assert!(logger.log_scalar("empty", 1.0).is_err());
    }

    #[test]
    fn incompatible_value() {
        let mut logger = logger();
        logger.log_scalar("x", 1.0).unwrap();
        assert_eq!(
            logger.log_counter_increment("x", 1),
            Err(LogError::IncompatibleValue {
                name: "x",
                value: Loggable::CounterIncrement(1),
                expected: "Scalar",
            })
        );
    }

    #[test]
    fn display_clears() {
        let mut logger = logger();
        logger.log_scalar("x", 1.0).unwrap();
        logger.flush();
        assert_eq!(logger.summary("x"), None);
    }

    #[test]
    fn summary_display_index() {
        let summary = Summary::Index {
            counts: vec![1, 3],
        };
        assert_eq!(summary.to_string(), "(n 4)  [25 75]%");
    }
}

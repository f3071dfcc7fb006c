//! Key Ranker
//!
//! Picks the best key and, when it is a close call, an alternate from a
//! [`KeyCorrelationTable`].

use thiserror::Error;

use crate::key_profile::{KeyCorrelation, KeyCorrelationTable};

/// Default share of the best correlation an alternate has to exceed.
pub const DEFAULT_ALTERNATE_RATIO: f64 = 0.9;

/// Errors when ranking keys.
#[derive(Debug, Error, PartialEq)]
pub enum RankError {
    /// There was nothing to rank.
    #[error("correlation table is empty")]
    EmptyTable,

    /// An invalid argument was provided to the ranker.
    #[error("invalid argument `{arg}`: {msg}")]
    InvalidArgument {
        /// The name of the invalid argument.
        arg: &'static str,
        /// A description of the invalid argument.
        msg: String,
    },
}

/// Best key, plus a runner-up when it scores almost as well.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct KeyEstimate {
    /// Highest-scoring key.
    pub best: KeyCorrelation,
    /// Second-highest key, only if it clears the alternate threshold.
    pub alternate: Option<KeyCorrelation>,
}

/// Builder for `KeyRanker` to customize the alternate threshold
pub struct KeyRankerBuilder {
    alternate_ratio: f64,
}

impl KeyRankerBuilder {
    /// Create a new builder with default alternate ratio = 0.9
    pub fn new() -> Self {
        KeyRankerBuilder {
            alternate_ratio: DEFAULT_ALTERNATE_RATIO,
        }
    }

    /// Set the ratio of the best correlation the runner-up must exceed (0.0..=1.0]
    pub fn alternate_ratio(mut self, value: f64) -> Self {
        self.alternate_ratio = value;
        self
    }

    /// Build the `KeyRanker`
    pub fn build(self) -> Result<KeyRanker, RankError> {
        if !self.alternate_ratio.is_finite()
            || self.alternate_ratio <= 0.0
            || self.alternate_ratio > 1.0
        {
            return Err(RankError::InvalidArgument {
                arg: "alternate_ratio",
                msg: format!("must be in (0, 1], got {}", self.alternate_ratio),
            });
        }
        Ok(KeyRanker {
            alternate_ratio: self.alternate_ratio,
        })
    }
}

impl Default for KeyRankerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Selects best and alternate keys from a correlation table.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct KeyRanker {
    alternate_ratio: f64,
}

impl KeyRanker {
    /// Return a builder to customize the alternate threshold
    pub fn builder() -> KeyRankerBuilder {
        KeyRankerBuilder::new()
    }

    /// Create a ranker with the default alternate ratio.
    pub fn new() -> Self {
        KeyRanker {
            alternate_ratio: DEFAULT_ALTERNATE_RATIO,
        }
    }

    /// Ratio the alternate must exceed.
    pub fn alternate_ratio(&self) -> f64 {
        self.alternate_ratio
    }

    /// Rank a table.
    ///
    /// The best key is the first entry holding the maximum correlation. The
    /// alternate is the first entry holding the maximum among the rest, kept
    /// only if its correlation is strictly greater than
    /// `alternate_ratio × best`.
    ///
    /// Returns `Err(RankError::EmptyTable)` for a table without entries.
    pub fn rank(&self, table: &KeyCorrelationTable) -> Result<KeyEstimate, RankError> {
        let best_idx = first_max(table.entries(), None).ok_or(RankError::EmptyTable)?;
        let best = table.entries()[best_idx];

        let threshold = self.alternate_ratio * best.correlation;
        let alternate = first_max(table.entries(), Some(best_idx))
            .map(|idx| table.entries()[idx])
            .filter(|runner_up| runner_up.correlation > threshold);

        log::debug!(
            "best key {} ({:.3}), alternate {:?}",
            best.key,
            best.correlation,
            alternate.map(|a| a.key.to_string())
        );

        Ok(KeyEstimate { best, alternate })
    }
}

impl Default for KeyRanker {
    fn default() -> Self {
        KeyRanker::new()
    }
}

/// Index of the first maximal entry, optionally skipping one index.
fn first_max(entries: &[KeyCorrelation], skip: Option<usize>) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, entry) in entries.iter().enumerate() {
        if Some(idx) == skip {
            continue;
        }
        match best {
            Some(b) if entries[b].correlation >= entry.correlation => {}
            _ => best = Some(idx),
        }
    }
    best
}

//! Key Analyzer
//!
//! Runs the whole pipeline: segment → chroma → pitch-class energy → key
//! correlations → ranked estimate → display result.

use thiserror::Error;

use crate::chroma::{aggregate, ChromaExtractor, ChromaOutcome};
use crate::key_profile::correlate;
use crate::key_ranker::{KeyRanker, RankError, DEFAULT_ALTERNATE_RATIO};
use crate::pitch_class::PitchClassVector;
use crate::result::KeyAnalysis;
use crate::segment::{AudioSegment, SegmentError};

#[cfg(feature = "chromagram")]
use crate::chromagram::{Chromagram, ChromagramError};

/// Errors surfaced by a key analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The requested window does not select any audio. Caused by client input.
    #[error("invalid segment: {0}")]
    InvalidSegment(#[from] SegmentError),

    /// Anything else went wrong; `source` holds the original cause.
    #[error("analysis failed: {source}")]
    Failed {
        /// Underlying error.
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl AnalysisError {
    fn failed<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AnalysisError::Failed {
            source: Box::new(err),
        }
    }

    /// Whether the caller supplied input that can never be analyzed.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AnalysisError::InvalidSegment(_))
    }
}

impl From<RankError> for AnalysisError {
    fn from(err: RankError) -> Self {
        AnalysisError::failed(err)
    }
}

#[cfg(feature = "chromagram")]
impl From<ChromagramError> for AnalysisError {
    fn from(err: ChromagramError) -> Self {
        AnalysisError::failed(err)
    }
}

/// Builder for `KeyAnalyzer`
pub struct KeyAnalyzerBuilder {
    alternate_ratio: f64,
}

impl KeyAnalyzerBuilder {
    /// Create a new builder with default alternate ratio = 0.9
    pub fn new() -> Self {
        KeyAnalyzerBuilder {
            alternate_ratio: DEFAULT_ALTERNATE_RATIO,
        }
    }

    /// Set the ratio of the best correlation an alternate key must exceed
    pub fn alternate_ratio(mut self, value: f64) -> Self {
        self.alternate_ratio = value;
        self
    }

    /// Build an analyzer around `extractor`
    pub fn build<E: ChromaExtractor>(self, extractor: E) -> Result<KeyAnalyzer<E>, AnalysisError> {
        let ranker = KeyRanker::builder()
            .alternate_ratio(self.alternate_ratio)
            .build()?;
        Ok(KeyAnalyzer { extractor, ranker })
    }
}

impl Default for KeyAnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Estimates the key of audio excerpts.
///
/// Holds only immutable configuration, so a single analyzer can be shared
/// between threads when its extractor allows it.
#[derive(Debug, Clone)]
pub struct KeyAnalyzer<E> {
    extractor: E,
    ranker: KeyRanker,
}

impl KeyAnalyzer<()> {
    /// Return a builder to customize the analyzer
    pub fn builder() -> KeyAnalyzerBuilder {
        KeyAnalyzerBuilder::new()
    }
}

#[cfg(feature = "chromagram")]
impl KeyAnalyzer<Chromagram> {
    /// Analyzer backed by the built-in chromagram with default settings.
    pub fn with_default_chromagram() -> Result<Self, AnalysisError> {
        Ok(KeyAnalyzer::new(Chromagram::builder().build()?))
    }
}

impl<E: ChromaExtractor> KeyAnalyzer<E> {
    /// Analyzer with the default ranker.
    pub fn new(extractor: E) -> Self {
        KeyAnalyzer {
            extractor,
            ranker: KeyRanker::new(),
        }
    }

    /// The chroma extractor in use.
    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Estimate the key of `samples[start..end]` (times in seconds).
    ///
    /// Returns `Err(AnalysisError::InvalidSegment)` if the window is empty.
    /// An extractor failure does not fail the analysis; it is logged and the
    /// excerpt is treated as silence.
    ///
    /// Extractors must report failure by returning `Err`. A panic inside
    /// the extractor is not caught and unwinds out of `analyze`.
    pub fn analyze(
        &self,
        samples: &[f32],
        sample_rate: u32,
        start: Option<f64>,
        end: Option<f64>,
    ) -> Result<KeyAnalysis, AnalysisError> {
        let segment = AudioSegment::extract(samples, sample_rate, start, end)?;
        let outcome = ChromaOutcome::from(self.extractor.extract(&segment));
        self.analyze_chroma(&outcome)
    }

    /// Estimate the key from an extractor outcome.
    pub fn analyze_chroma(&self, outcome: &ChromaOutcome) -> Result<KeyAnalysis, AnalysisError> {
        self.analyze_pitch_classes(&aggregate(outcome))
    }

    /// Estimate the key from aggregated pitch-class energy.
    pub fn analyze_pitch_classes(
        &self,
        chroma: &PitchClassVector,
    ) -> Result<KeyAnalysis, AnalysisError> {
        analyze_with(chroma, &self.ranker)
    }
}

/// Estimate the key of a pitch-class vector with the default ranker.
pub fn estimate_key(chroma: &PitchClassVector) -> Result<KeyAnalysis, AnalysisError> {
    analyze_with(chroma, &KeyRanker::new())
}

fn analyze_with(
    chroma: &PitchClassVector,
    ranker: &KeyRanker,
) -> Result<KeyAnalysis, AnalysisError> {
    let table = correlate(chroma);
    let estimate = ranker.rank(&table)?;
    Ok(KeyAnalysis::assemble(chroma, &table, estimate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chroma::{ChromaMatrix, ExtractError};

    #[derive(Debug)]
    struct Fixed(Vec<Vec<f32>>);

    impl ChromaExtractor for Fixed {
        fn extract(&self, _: &AudioSegment<'_>) -> Result<ChromaMatrix, ExtractError> {
            Ok(ChromaMatrix::from_rows(self.0.clone()))
        }
    }

    #[test]
    fn empty_window_is_client_error() {
        let analyzer = KeyAnalyzer::new(Fixed(vec![]));
        let err = analyzer
            .analyze(&[0.0; 100], 100, Some(0.5), Some(0.2))
            .unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().starts_with("invalid segment"));
    }

    #[test]
    fn builder_errors_become_analysis_failed() {
        let err = KeyAnalyzer::builder()
            .alternate_ratio(2.0)
            .build(Fixed(vec![]))
            .unwrap_err();
        assert!(!err.is_client_error());
        assert!(err.to_string().starts_with("analysis failed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn custom_ratio_is_applied() {
        let mut rows = vec![vec![1.0]; 12];
        for pc in [0, 2, 4, 5, 7, 9, 11] {
            rows[pc] = vec![2.0];
        }
        let loose = KeyAnalyzer::new(Fixed(rows.clone()));
        let strict = KeyAnalyzer::builder()
            .alternate_ratio(1.0)
            .build(Fixed(rows))
            .unwrap();

        let samples = [0.0; 10];
        assert!(loose.analyze(&samples, 10, None, None).unwrap().alternate_key.is_some());
        assert!(strict.analyze(&samples, 10, None, None).unwrap().alternate_key.is_none());
    }
}

//! Chroma aggregation
//!
//! The seam between the key estimator and whatever computes chroma features,
//! plus the reduction of a chroma matrix to a single [`PitchClassVector`].

use crate::pitch_class::{PitchClassVector, SEMITONES};
use crate::segment::AudioSegment;

/// Boxed failure reported by a chroma extractor.
pub type ExtractError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Chroma features over time: one row per pitch class, one column per frame.
///
/// Nothing forces the shape; extractors may return more or fewer than 12
/// rows, or rows of different lengths.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChromaMatrix {
    rows: Vec<Vec<f32>>,
}

impl ChromaMatrix {
    /// Wrap row-major data as returned by an extractor.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Self {
        ChromaMatrix { rows }
    }

    /// Transpose a sequence of 12-bin frames into a 12-row matrix.
    pub fn from_frames(frames: &[[f32; SEMITONES]]) -> Self {
        let rows = (0..SEMITONES)
            .map(|pc| frames.iter().map(|frame| frame[pc]).collect())
            .collect();
        ChromaMatrix { rows }
    }

    /// Rows in pitch-class order.
    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Length of the longest row.
    pub fn num_frames(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// What an extractor produced for one segment.
#[derive(Debug)]
pub enum ChromaOutcome {
    /// Features were computed.
    Extracted(ChromaMatrix),
    /// The extractor gave up; the cause is kept for diagnostics.
    Failed(ExtractError),
}

impl From<Result<ChromaMatrix, ExtractError>> for ChromaOutcome {
    fn from(result: Result<ChromaMatrix, ExtractError>) -> Self {
        match result {
            Ok(matrix) => ChromaOutcome::Extracted(matrix),
            Err(cause) => ChromaOutcome::Failed(cause),
        }
    }
}

/// Computes chroma features for an audio segment.
///
/// Implementations take `&self` and allocate working state per call, so one
/// extractor can serve several analyses at once.
pub trait ChromaExtractor {
    /// Compute a pitch-class × frame matrix over `segment`.
    fn extract(&self, segment: &AudioSegment<'_>) -> Result<ChromaMatrix, ExtractError>;
}

/// Sum each pitch-class row over time.
///
/// A failed extraction yields the silent vector. A matrix with the wrong row
/// count is zero-padded or truncated to 12 rows. Both cases are logged and
/// analysis carries on with the degraded input.
pub fn aggregate(outcome: &ChromaOutcome) -> PitchClassVector {
    let matrix = match outcome {
        ChromaOutcome::Extracted(matrix) => matrix,
        ChromaOutcome::Failed(cause) => {
            log::warn!("chroma extraction failed, using silence: {cause}");
            return PitchClassVector::zeros();
        }
    };

    if matrix.num_rows() != SEMITONES {
        log::warn!(
            "chroma matrix has {} rows, expected {}; padding/truncating",
            matrix.num_rows(),
            SEMITONES
        );
    }

    let mut energy = [0.0; SEMITONES];
    for (pc, row) in matrix.rows().iter().take(SEMITONES).enumerate() {
        let sum: f32 = row.iter().sum();
        energy[pc] = if sum.is_finite() && sum >= 0.0 {
            sum
        } else {
            log::warn!("discarding invalid energy {sum} for pitch class {pc}");
            0.0
        };
    }

    log::debug!(
        "aggregated {} frames into pitch-class energy {:?}",
        matrix.num_frames(),
        energy
    );
    PitchClassVector::from_sanitized(energy)
}

//! Analysis result
//!
//! Display-ready output of a key analysis. The serialized field names and
//! ordering are consumed directly by API clients.

use serde::Serialize;

use crate::key_profile::{KeyCorrelation, KeyCorrelationTable};
use crate::key_ranker::KeyEstimate;
use crate::pitch_class::{PitchClass, PitchClassVector};

/// Relative intensity of one pitch class, 1.0 for the strongest.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ChromaValue {
    /// Pitch class.
    pub pitch: PitchClass,
    /// Energy divided by the strongest pitch class, in [0, 1].
    pub intensity: f32,
}

/// Final key estimate for one excerpt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAnalysis {
    /// Best matching key.
    pub main_key: KeyCorrelation,
    /// Runner-up, serialized as `null` when the call was not close.
    pub alternate_key: Option<KeyCorrelation>,
    /// Per pitch class intensity, C..B.
    pub chroma_values: Vec<ChromaValue>,
    /// All candidate keys, highest correlation first.
    pub correlations: Vec<KeyCorrelation>,
}

impl KeyAnalysis {
    /// Assemble the result from the pipeline stages.
    ///
    /// Intensities are scaled by the strongest pitch class (silence stays at
    /// zero) and the table is sorted descending, ties in table order.
    pub fn assemble(
        chroma: &PitchClassVector,
        table: &KeyCorrelationTable,
        estimate: KeyEstimate,
    ) -> Self {
        KeyAnalysis {
            main_key: estimate.best,
            alternate_key: estimate.alternate,
            chroma_values: display_chroma(chroma),
            correlations: table.sorted(),
        }
    }

    /// The `n` strongest candidates.
    pub fn top_correlations(&self, n: usize) -> &[KeyCorrelation] {
        &self.correlations[..n.min(self.correlations.len())]
    }
}

fn display_chroma(chroma: &PitchClassVector) -> Vec<ChromaValue> {
    let max = chroma.max();
    let scale = if max > 0.0 { max } else { 1.0 };
    PitchClass::ALL
        .iter()
        .map(|&pitch| ChromaValue {
            pitch,
            intensity: chroma.get(pitch) / scale,
        })
        .collect()
}

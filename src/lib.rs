//! # key_detector
//!
//! Estimate the musical key of an audio excerpt with the Krumhansl-Schmuckler
//! method: aggregate 12-bin chroma into pitch-class energy, correlate it with
//! the 24 major/minor key profiles and rank the candidates.
//!
//! ## Example
//! ```rust
//! use key_detector::{KeyAnalyzer, PitchClassVector};
//!
//! fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1) Straight from pitch-class energy
//!     let chroma = PitchClassVector::new([
//!         1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0,
//!     ])?;
//!     let result = key_detector::estimate_key(&chroma)?;
//!     assert_eq!(result.main_key.key.to_string(), "C major");
//!
//!     // 2) From samples, through the built-in chromagram
//!     let analyzer = KeyAnalyzer::with_default_chromagram()?;
//!     let samples: Vec<f32> = vec![0.0; 44_100]; // fill with decoded audio
//!     let result = analyzer.analyze(&samples, 44_100, Some(0.0), None)?;
//!     println!(
//!         "Detected {} with correlation {:.3}",
//!         result.main_key.key,
//!         result.main_key.correlation
//!     );
//!
//!     Ok(())
//! }
//! # run().unwrap();
//! ```
//!
//! ## Features
//! - `chromagram` (default): enables the FFT‐based chromagram extractor via `rustfft`

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rust_2018_idioms)]
#![deny(clippy::all)]

/// Pipeline entry points.
pub use analyzer::{estimate_key, AnalysisError, KeyAnalyzer, KeyAnalyzerBuilder};

/// Chroma extraction seam and aggregation.
pub use chroma::{aggregate, ChromaExtractor, ChromaMatrix, ChromaOutcome, ExtractError};

/// Streaming chromagram extractor.
#[cfg(feature = "chromagram")]
pub use chromagram::{ChromaStream, Chromagram, ChromagramBuilder, ChromagramError};

/// Key templates and correlation.
pub use key_profile::{
    correlate, KeyCorrelation, KeyCorrelationTable, KeyLabel, KeyProfile, Mode, MAJOR_PROFILE,
    MINOR_PROFILE, NUM_KEYS,
};

/// Best/alternate key selection.
pub use key_ranker::{KeyEstimate, KeyRanker, KeyRankerBuilder, RankError};

/// Pitch classes and energy vectors.
pub use pitch_class::{ParseKeyError, PitchClass, PitchClassError, PitchClassVector, SEMITONES};

/// Display-ready result.
pub use result::{ChromaValue, KeyAnalysis};

/// Analysis windows.
pub use segment::{AudioSegment, SegmentError};

/// Full analysis pipeline.
pub mod analyzer;

/// Chroma aggregation module.
pub mod chroma;

/// Chromagram computation module.
#[cfg(feature = "chromagram")]
pub mod chromagram;

/// Key profile correlation module.
pub mod key_profile;

/// Key ranking module.
pub mod key_ranker;

/// Pitch class module.
pub mod pitch_class;

/// Result module.
pub mod result;

/// Segment extraction module.
pub mod segment;

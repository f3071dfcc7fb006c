//! Pitch classes
//!
//! The twelve chromatic pitch classes and the 12-bin energy vector the key
//! estimator works on.

use std::{fmt::Display, str::FromStr};

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Number of pitch classes in an octave.
pub const SEMITONES: usize = 12;

/// Twelve chromatic pitch classes, in ascending order from C.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    /// C
    C,
    /// C sharp / D flat
    Cs,
    /// D
    D,
    /// D sharp / E flat
    Ds,
    /// E
    E,
    /// F
    F,
    /// F sharp / G flat
    Fs,
    /// G
    G,
    /// G sharp / A flat
    Gs,
    /// A
    A,
    /// A sharp / B flat
    As,
    /// B
    B,
}

impl PitchClass {
    /// All pitch classes in order C..B.
    pub const ALL: [PitchClass; SEMITONES] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    /// Pitch class at semitone `idx` above C, wrapping every octave.
    pub const fn from_index(idx: usize) -> PitchClass {
        Self::ALL[idx % SEMITONES]
    }

    /// Semitone offset from C (0..=11).
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Sharp spelling, e.g. `"C#"`.
    pub const fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }

    /// This pitch class moved up by `semitones` (negative moves down).
    pub fn transpose(self, semitones: i32) -> PitchClass {
        let idx = (self.index() as i32 + semitones).rem_euclid(SEMITONES as i32);
        Self::from_index(idx as usize)
    }
}

impl Display for PitchClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for PitchClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Error returned when a pitch class or key name cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized {what}: `{input}`")]
pub struct ParseKeyError {
    /// What was being parsed ("pitch class", "mode" or "key").
    pub what: &'static str,
    /// The offending input.
    pub input: String,
}

impl FromStr for PitchClass {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pc = match s.trim() {
            "C" | "B#" => PitchClass::C,
            "C#" | "Db" => PitchClass::Cs,
            "D" => PitchClass::D,
            "D#" | "Eb" => PitchClass::Ds,
            "E" | "Fb" => PitchClass::E,
            "F" | "E#" => PitchClass::F,
            "F#" | "Gb" => PitchClass::Fs,
            "G" => PitchClass::G,
            "G#" | "Ab" => PitchClass::Gs,
            "A" => PitchClass::A,
            "A#" | "Bb" => PitchClass::As,
            "B" | "Cb" => PitchClass::B,
            other => {
                return Err(ParseKeyError {
                    what: "pitch class",
                    input: other.to_string(),
                })
            }
        };
        Ok(pc)
    }
}

/// Errors when building a [`PitchClassVector`] from raw values.
#[derive(Debug, Error, PartialEq)]
pub enum PitchClassError {
    /// The input did not have one value per pitch class.
    #[error("expected {expected} pitch-class values, got {got}")]
    InvalidLength {
        /// Always 12.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },

    /// A value was negative, NaN or infinite.
    #[error("pitch class {pitch} has invalid energy {value}")]
    InvalidEnergy {
        /// Pitch class holding the bad value.
        pitch: PitchClass,
        /// The rejected value.
        value: f32,
    },
}

/// Aggregated energy per pitch class, C..B.
///
/// Every value is finite and non-negative. The all-zero vector is valid and
/// stands for silence.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct PitchClassVector([f32; SEMITONES]);

impl PitchClassVector {
    /// Validate and wrap 12 energy values.
    pub fn new(values: [f32; SEMITONES]) -> Result<Self, PitchClassError> {
        for (idx, &value) in values.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(PitchClassError::InvalidEnergy {
                    pitch: PitchClass::from_index(idx),
                    value,
                });
            }
        }
        Ok(PitchClassVector(values))
    }

    /// The silent vector.
    pub const fn zeros() -> Self {
        PitchClassVector([0.0; SEMITONES])
    }

    /// Build from values the caller has already sanitized.
    pub(crate) const fn from_sanitized(values: [f32; SEMITONES]) -> Self {
        PitchClassVector(values)
    }

    /// Raw values in pitch-class order.
    pub fn values(&self) -> &[f32; SEMITONES] {
        &self.0
    }

    /// Energy of a single pitch class.
    pub fn get(&self, pitch: PitchClass) -> f32 {
        self.0[pitch.index()]
    }

    /// Sum of all energies, accumulated in `f64` so large energies stay finite.
    pub fn total(&self) -> f64 {
        self.0.iter().map(|&v| v as f64).sum()
    }

    /// Largest energy, 0 for silence.
    pub fn max(&self) -> f32 {
        self.0.iter().copied().fold(0.0, f32::max)
    }

    /// Whether every pitch class is zero.
    pub fn is_silent(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }

    /// Scale to unit sum. A silent vector becomes uniform (1/12 each).
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if total > 0.0 {
            PitchClassVector(self.0.map(|v| (v as f64 / total) as f32))
        } else {
            PitchClassVector([1.0 / SEMITONES as f32; SEMITONES])
        }
    }

    /// Move every energy up by `semitones`: the value at C ends up at
    /// `C + semitones`.
    pub fn transposed(&self, semitones: i32) -> Self {
        let mut out = [0.0; SEMITONES];
        for pitch in PitchClass::ALL {
            out[pitch.transpose(semitones).index()] = self.0[pitch.index()];
        }
        PitchClassVector(out)
    }
}

impl TryFrom<&[f32]> for PitchClassVector {
    type Error = PitchClassError;

    fn try_from(values: &[f32]) -> Result<Self, Self::Error> {
        let arr: [f32; SEMITONES] =
            values
                .try_into()
                .map_err(|_| PitchClassError::InvalidLength {
                    expected: SEMITONES,
                    got: values.len(),
                })?;
        Self::new(arr)
    }
}

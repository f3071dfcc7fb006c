//! Key Profiles
//!
//! Krumhansl-Schmuckler key finding: a pitch-class distribution is rotated
//! through every tonic and correlated against fixed major and minor
//! templates.

use std::{fmt::Display, str::FromStr};

use serde::{Serialize, Serializer};

use crate::pitch_class::{ParseKeyError, PitchClass, PitchClassVector, SEMITONES};

/// Number of candidate keys (12 tonics × 2 modes).
pub const NUM_KEYS: usize = SEMITONES * 2;

/// Krumhansl-Kessler major profile, semitones above the tonic.
pub const MAJOR_PROFILE: KeyProfile = KeyProfile([
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
]);

/// Krumhansl-Kessler minor profile, semitones above the tonic.
pub const MINOR_PROFILE: KeyProfile = KeyProfile([
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
]);

/// Major or minor tonality.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mode {
    /// Major key
    Major,
    /// Minor key
    Minor,
}

impl Mode {
    /// Both modes in table order.
    pub const ALL: [Mode; 2] = [Mode::Major, Mode::Minor];

    /// Reference template for this mode.
    pub const fn profile(self) -> &'static KeyProfile {
        match self {
            Mode::Major => &MAJOR_PROFILE,
            Mode::Minor => &MINOR_PROFILE,
        }
    }

    /// Lower-case name used in key labels.
    pub const fn name(self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A 12-element template of expected pitch-class emphasis, tonic first.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct KeyProfile([f32; SEMITONES]);

impl KeyProfile {
    /// Template weights.
    pub fn weights(&self) -> &[f32; SEMITONES] {
        &self.0
    }
}

/// One of the 24 candidate keys, e.g. `F# minor`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct KeyLabel {
    /// Tonic pitch class.
    pub tonic: PitchClass,
    /// Tonality.
    pub mode: Mode,
}

impl KeyLabel {
    /// Create a label.
    pub const fn new(tonic: PitchClass, mode: Mode) -> Self {
        KeyLabel { tonic, mode }
    }

    /// Position in table order: majors C..B, then minors C..B.
    pub const fn ordinal(self) -> usize {
        self.mode as usize * SEMITONES + self.tonic.index()
    }

    /// Label at a table-order position.
    pub const fn from_ordinal(idx: usize) -> Self {
        let mode = if (idx % NUM_KEYS) < SEMITONES {
            Mode::Major
        } else {
            Mode::Minor
        };
        KeyLabel::new(PitchClass::from_index(idx), mode)
    }

    /// All 24 labels in table order.
    pub fn all() -> impl Iterator<Item = KeyLabel> {
        (0..NUM_KEYS).map(KeyLabel::from_ordinal)
    }

    /// Relative key sharing the same key signature (C major ⇄ A minor).
    pub fn relative(self) -> KeyLabel {
        match self.mode {
            Mode::Major => KeyLabel::new(self.tonic.transpose(-3), Mode::Minor),
            Mode::Minor => KeyLabel::new(self.tonic.transpose(3), Mode::Major),
        }
    }
}

impl Display for KeyLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

impl Serialize for KeyLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for KeyLabel {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(tonic), Some(mode), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ParseKeyError {
                what: "key",
                input: s.to_string(),
            });
        };
        let mode = match mode.to_ascii_lowercase().as_str() {
            "major" | "maj" => Mode::Major,
            "minor" | "min" => Mode::Minor,
            _ => {
                return Err(ParseKeyError {
                    what: "mode",
                    input: mode.to_string(),
                })
            }
        };
        Ok(KeyLabel::new(tonic.parse()?, mode))
    }
}

/// A key paired with its correlation score.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct KeyCorrelation {
    /// Candidate key.
    pub key: KeyLabel,
    /// Pearson correlation in [-1, 1], rounded to 3 decimals.
    pub correlation: f64,
}

/// Correlation of every candidate key, in a fixed order.
///
/// The order is part of the meaning: ties are always resolved in favour of
/// the earlier entry.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCorrelationTable {
    entries: Vec<KeyCorrelation>,
}

impl KeyCorrelationTable {
    /// Build a table from entries scored elsewhere. Order is kept as given.
    pub fn from_entries(entries: Vec<KeyCorrelation>) -> Self {
        KeyCorrelationTable { entries }
    }

    /// Entries in table order.
    pub fn entries(&self) -> &[KeyCorrelation] {
        &self.entries
    }

    /// Iterate entries in table order.
    pub fn iter(&self) -> std::slice::Iter<'_, KeyCorrelation> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Correlation recorded for `key`, if present.
    pub fn get(&self, key: KeyLabel) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.correlation)
    }

    /// Entries sorted by correlation, highest first. Equal scores keep table
    /// order.
    pub fn sorted(&self) -> Vec<KeyCorrelation> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.correlation.total_cmp(&a.correlation));
        sorted
    }
}

impl<'a> IntoIterator for &'a KeyCorrelationTable {
    type Item = &'a KeyCorrelation;
    type IntoIter = std::slice::Iter<'a, KeyCorrelation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Correlate a pitch-class distribution with all 24 key profiles.
///
/// The vector is normalized to unit sum (silence becomes uniform), then for
/// every tonic it is rotated so that tonic sits at index 0 and compared with
/// each template. Rotations without variance score exactly 0.
pub fn correlate(chroma: &PitchClassVector) -> KeyCorrelationTable {
    let normalized = chroma.normalized();
    let values = normalized.values();

    let mut entries = Vec::with_capacity(NUM_KEYS);
    for mode in Mode::ALL {
        let profile = mode.profile();
        for tonic in PitchClass::ALL {
            let mut test = [0.0; SEMITONES];
            for (m, slot) in test.iter_mut().enumerate() {
                *slot = values[(tonic.index() + m) % SEMITONES];
            }
            entries.push(KeyCorrelation {
                key: KeyLabel::new(tonic, mode),
                correlation: round3(pearson(&test, profile.weights())),
            });
        }
    }

    KeyCorrelationTable { entries }
}

/// Pearson correlation, or 0 when either side is constant.
fn pearson(x: &[f32; SEMITONES], y: &[f32; SEMITONES]) -> f64 {
    let n = SEMITONES as f64;
    let mean_x = x.iter().map(|&v| v as f64).sum::<f64>() / n;
    let mean_y = y.iter().map(|&v| v as f64).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi as f64 - mean_x;
        let dy = yi as f64 - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

/// Round to 3 decimals; `+ 0.0` folds `-0.0` into `0.0`.
#[inline]
fn round3(r: f64) -> f64 {
    (r * 1000.0).round() / 1000.0 + 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(values: [f32; SEMITONES]) -> PitchClassVector {
        PitchClassVector::new(values).unwrap()
    }

    #[test]
    fn table_has_fixed_order() {
        let table = correlate(&PitchClassVector::zeros());
        assert_eq!(table.len(), NUM_KEYS);
        for (idx, entry) in table.iter().enumerate() {
            assert_eq!(entry.key, KeyLabel::from_ordinal(idx));
            assert_eq!(entry.key.ordinal(), idx);
        }
        assert_eq!(table.entries()[0].key.to_string(), "C major");
        assert_eq!(table.entries()[12].key.to_string(), "C minor");
        assert_eq!(table.entries()[23].key.to_string(), "B minor");
    }

    #[test]
    fn silence_scores_zero_everywhere() {
        let table = correlate(&PitchClassVector::zeros());
        assert!(table.iter().all(|e| e.correlation == 0.0));
    }

    #[test]
    fn uniform_energy_scores_zero_everywhere() {
        let table = correlate(&vector([3.0; SEMITONES]));
        assert!(table.iter().all(|e| e.correlation == 0.0));
    }

    #[test]
    fn full_rotation_is_identity() {
        let v = vector([0.9, 0.1, 0.5, 0.2, 0.7, 0.6, 0.1, 0.8, 0.2, 0.4, 0.1, 0.3]);
        assert_eq!(correlate(&v.transposed(12)), correlate(&v));
    }

    #[test]
    fn profile_itself_correlates_perfectly() {
        let table = correlate(&vector(*MAJOR_PROFILE.weights()));
        assert_eq!(table.get(KeyLabel::new(PitchClass::C, Mode::Major)), Some(1.0));

        let a_minor = vector(*MINOR_PROFILE.weights()).transposed(9);
        let table = correlate(&a_minor);
        assert_eq!(table.get(KeyLabel::new(PitchClass::A, Mode::Minor)), Some(1.0));
    }

    #[test]
    fn huge_energies_correlate_like_small_ones() {
        let mut small = [0.0; SEMITONES];
        let mut huge = [0.0; SEMITONES];
        for pc in [0, 4, 7] {
            small[pc] = 1.0;
            huge[pc] = f32::MAX / 2.0;
        }
        let table = correlate(&vector(huge));
        assert_eq!(table, correlate(&vector(small)));
        assert_eq!(table.get(KeyLabel::new(PitchClass::C, Mode::Major)), Some(0.834));
    }

    #[test]
    fn correlations_are_rounded_and_bounded() {
        let v = vector([1.3, 0.2, 0.77, 0.1, 0.9, 0.45, 0.05, 1.1, 0.3, 0.6, 0.08, 0.4]);
        for e in &correlate(&v) {
            assert!((-1.0..=1.0).contains(&e.correlation));
            let scaled = e.correlation * 1000.0;
            assert!((scaled - scaled.round()).abs() < 1e-3);
        }
    }

    #[test]
    fn labels_parse_and_display() {
        for key in KeyLabel::all() {
            assert_eq!(key.to_string().parse::<KeyLabel>(), Ok(key));
        }
        assert_eq!(
            "Eb minor".parse::<KeyLabel>(),
            Ok(KeyLabel::new(PitchClass::Ds, Mode::Minor))
        );
        assert!("C dorian".parse::<KeyLabel>().is_err());
        assert!("C".parse::<KeyLabel>().is_err());
    }

    #[test]
    fn relative_keys() {
        let c_major = KeyLabel::new(PitchClass::C, Mode::Major);
        assert_eq!(c_major.relative(), KeyLabel::new(PitchClass::A, Mode::Minor));
        assert_eq!(c_major.relative().relative(), c_major);
    }

    #[test]
    fn sorted_is_stable_on_ties() {
        let table = correlate(&PitchClassVector::zeros());
        let sorted = table.sorted();
        assert_eq!(sorted, table.entries());
    }
}

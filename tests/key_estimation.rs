//! Integration tests for key estimation from pitch-class energy and synthetic audio.

use key_detector::{
    estimate_key, AudioSegment, ChromaExtractor, ChromaMatrix, ChromaOutcome, ExtractError,
    KeyAnalyzer, KeyLabel, Mode, PitchClass, PitchClassVector,
};
use lazy_static::lazy_static;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde_json::{json, Value};
use std::f32::consts::PI;

const SAMPLE_RATE: u32 = 44_100;

/// Semitone offsets of the diatonic scales, tonic first.
const MAJOR_SCALE: [usize; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_SCALE: [usize; 7] = [0, 2, 3, 5, 7, 8, 10];

/// A pitch-class vector with a scale emphasised on top of a flat floor.
fn scale_vector(tonic: PitchClass, mode: Mode) -> PitchClassVector {
    let steps = match mode {
        Mode::Major => MAJOR_SCALE,
        Mode::Minor => MINOR_SCALE,
    };
    let mut values = [0.2; 12];
    for step in steps {
        values[(tonic.index() + step) % 12] = 1.0;
    }
    // weight the tonic triad the way real music tends to
    values[tonic.index()] += 1.0;
    values[(tonic.index() + 7) % 12] += 0.5;
    PitchClassVector::new(values).unwrap()
}

fn tone(freqs: &[f32], seconds: f32) -> Vec<f32> {
    let n = (SAMPLE_RATE as f32 * seconds) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f32>() / freqs.len() as f32
        })
        .collect()
}

lazy_static! {
    static ref ALL_SCALES: Vec<(KeyLabel, PitchClassVector)> = KeyLabel::all()
        .map(|key| (key, scale_vector(key.tonic, key.mode)))
        .collect();
}

struct Broken;

impl ChromaExtractor for Broken {
    fn extract(&self, _: &AudioSegment<'_>) -> Result<ChromaMatrix, ExtractError> {
        Err("feature extractor crashed".into())
    }
}

struct EightRows;

impl ChromaExtractor for EightRows {
    fn extract(&self, _: &AudioSegment<'_>) -> Result<ChromaMatrix, ExtractError> {
        Ok(ChromaMatrix::from_rows(vec![vec![1.0, 1.0]; 8]))
    }
}

#[test]
fn strong_c_over_flat_floor() {
    let chroma = PitchClassVector::new([12.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0])
        .unwrap();
    let result = estimate_key(&chroma).unwrap();

    assert_eq!(result.main_key.key.to_string(), "C major");
    assert!(result
        .correlations
        .iter()
        .all(|c| c.correlation <= result.main_key.correlation));
    // the major and minor templates weigh the tonic almost identically
    let runner_up = result.correlations[1];
    assert_eq!(runner_up.key.to_string(), "C minor");
    assert!(result.correlations[2..]
        .iter()
        .all(|c| c.correlation < result.main_key.correlation));

    assert_eq!(result.chroma_values[0].intensity, 1.0);
    let rest = result.chroma_values[1].intensity;
    assert!(rest < 1.0);
    assert!(result.chroma_values[1..].iter().all(|c| c.intensity == rest));
}

#[test]
fn silence_is_c_major_with_zero_correlation() {
    let result = estimate_key(&PitchClassVector::zeros()).unwrap();
    assert_eq!(result.main_key.key.to_string(), "C major");
    assert_eq!(result.main_key.correlation, 0.0);
    assert!(result.alternate_key.is_none());
    assert!(result.correlations.iter().all(|c| c.correlation == 0.0));
}

#[test]
fn every_scale_is_recognized() {
    ALL_SCALES.par_iter().for_each(|(key, chroma)| {
        let result = estimate_key(chroma).unwrap();
        assert_eq!(result.main_key.key, *key, "scale of {key}");
    });
}

#[test]
fn transposition_moves_the_tonic() {
    let base = scale_vector(PitchClass::C, Mode::Major);
    for semitones in 0..12 {
        let result = estimate_key(&base.transposed(semitones)).unwrap();
        assert_eq!(
            result.main_key.key,
            KeyLabel::new(PitchClass::C.transpose(semitones), Mode::Major)
        );
    }
}

#[test]
fn plain_major_scale_reports_relative_minor() {
    let mut values = [0.0; 12];
    for step in MAJOR_SCALE {
        values[step] = 1.0;
    }
    let result = estimate_key(&PitchClassVector::new(values).unwrap()).unwrap();
    assert_eq!(result.main_key.key.to_string(), "C major");
    let alternate = result.alternate_key.expect("relative minor is a close call");
    assert_eq!(alternate.key, result.main_key.key.relative());
    assert!(alternate.correlation > 0.9 * result.main_key.correlation);
}

#[test]
fn serialized_shape_matches_api_contract() {
    let mut values = [0.0; 12];
    for step in MAJOR_SCALE {
        values[step] = 1.0;
    }
    let result = estimate_key(&PitchClassVector::new(values).unwrap()).unwrap();
    let json: Value = serde_json::to_value(&result).unwrap();

    let fields: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
    for field in ["mainKey", "alternateKey", "chromaValues", "correlations"] {
        assert!(fields.contains(&field), "missing {field}");
    }
    assert_eq!(json["mainKey"]["key"], json!("C major"));
    assert_eq!(json["alternateKey"]["key"], json!("A minor"));
    assert_eq!(json["chromaValues"].as_array().unwrap().len(), 12);
    assert_eq!(json["chromaValues"][1], json!({"pitch": "C#", "intensity": 0.0}));
    assert_eq!(json["correlations"].as_array().unwrap().len(), 24);
    assert_eq!(json["correlations"][0]["key"], json!("C major"));

    let silent = serde_json::to_value(estimate_key(&PitchClassVector::zeros()).unwrap()).unwrap();
    assert_eq!(silent["alternateKey"], Value::Null);
}

#[test]
fn extractor_failure_degrades_to_silence() {
    let analyzer = KeyAnalyzer::new(Broken);
    let result = analyzer.analyze(&[0.1; 64], 8_000, None, None).unwrap();
    assert_eq!(result.main_key.key.to_string(), "C major");
    assert_eq!(result.main_key.correlation, 0.0);
    assert!(result.alternate_key.is_none());

    let outcome = ChromaOutcome::Failed("boom".into());
    assert_eq!(
        analyzer.analyze_chroma(&outcome).unwrap(),
        result
    );
}

#[test]
fn malformed_chroma_is_padded() {
    let analyzer = KeyAnalyzer::new(EightRows);
    let result = analyzer.analyze(&[0.1; 64], 8_000, None, None).unwrap();
    let intensities: Vec<f32> = result.chroma_values.iter().map(|c| c.intensity).collect();
    assert_eq!(intensities.len(), 12);
    assert_eq!(&intensities[..8], &[1.0; 8]);
    assert_eq!(&intensities[8..], &[0.0; 4]);
}

#[test]
fn a_minor_triad_from_audio() {
    // A3, C4, E4
    let samples = tone(&[220.0, 261.63, 329.63], 2.0);
    let analyzer = KeyAnalyzer::with_default_chromagram().unwrap();
    let result = analyzer.analyze(&samples, SAMPLE_RATE, None, None).unwrap();

    let strongest = result
        .chroma_values
        .iter()
        .filter(|c| c.intensity == 1.0)
        .map(|c| c.pitch)
        .next()
        .unwrap();
    assert!([PitchClass::A, PitchClass::C, PitchClass::E].contains(&strongest));
    for weak in [PitchClass::Cs, PitchClass::Fs, PitchClass::As] {
        assert!(result.chroma_values[weak.index()].intensity < 0.5);
    }
}

#[test]
fn time_window_selects_audio() {
    let mut samples = vec![0.0; SAMPLE_RATE as usize];
    samples.extend(tone(&[440.0], 1.0));
    let analyzer = KeyAnalyzer::with_default_chromagram().unwrap();

    let head = analyzer
        .analyze(&samples, SAMPLE_RATE, None, Some(1.0))
        .unwrap();
    assert!(head.chroma_values.iter().all(|c| c.intensity == 0.0));

    let tail = analyzer
        .analyze(&samples, SAMPLE_RATE, Some(1.0), None)
        .unwrap();
    assert_eq!(tail.chroma_values[PitchClass::A.index()].intensity, 1.0);

    let err = analyzer
        .analyze(&samples, SAMPLE_RATE, Some(3.0), Some(4.0))
        .unwrap_err();
    assert!(err.is_client_error());
}

#[test]
fn shared_analyzer_across_threads() {
    let analyzer = KeyAnalyzer::with_default_chromagram().unwrap();
    let signals: Vec<Vec<f32>> = [220.0, 246.94, 261.63, 293.66]
        .iter()
        .map(|&f| tone(&[f], 0.5))
        .collect();

    let parallel: Vec<_> = signals
        .par_iter()
        .map(|s| analyzer.analyze(s, SAMPLE_RATE, None, None).unwrap())
        .collect();
    let serial: Vec<_> = signals
        .iter()
        .map(|s| analyzer.analyze(s, SAMPLE_RATE, None, None).unwrap())
        .collect();
    assert_eq!(parallel, serial);
}

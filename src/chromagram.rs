//! Chromagram
//!
//! FFT-based 12-bin chromagram, the default [`ChromaExtractor`].
//!
//! Adapted from the streaming chromagram by Adam Stark, Queen Mary University of London.
//! https://github.com/adamstark/Chord-Detector-and-Chromagram

use std::{f32::consts::PI, sync::Arc};

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use thiserror::Error;

use crate::chroma::{ChromaExtractor, ChromaMatrix, ExtractError};
use crate::pitch_class::SEMITONES;
use crate::segment::AudioSegment;

const BUFFER_SIZE: usize = 8192;
/// Input samples between two emitted chroma frames.
const CHROMA_INTERVAL: usize = BUFFER_SIZE / 2;
/// Frequency of C3; pitch class `n` is searched at `C3 * 2^(n/12)`.
const REFERENCE_FREQUENCY: f32 = 130.8127;

#[allow(clippy::large_const_arrays)]
const HAMMING_WINDOW: [f32; BUFFER_SIZE] = make_hamming_window();

/// Errors returned by the Chromagram pipeline.
#[derive(Debug, Error)]
pub enum ChromagramError {
    /// Frame received was not of the expected size.
    #[error("expected frame of length {expected}, got {got}")]
    InvalidFrameSize {
        /// The expected size of the audio frame.
        expected: usize,
        /// The actual size of the received audio frame.
        got: usize,
    },

    /// An error occurred during the configuration of the Chromagram.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Builder for a Chromagram extractor.
pub struct ChromagramBuilder {
    frame_size: usize,
    downsample_factor: usize,
    num_harmonics: usize,
    num_octaves: usize,
    search_width: usize,
}

impl ChromagramBuilder {
    /// Start with default parameters:
    /// frame_size = 1024, downsample_factor = 4,
    /// num_harmonics = 2, num_octaves = 2, search_width = 3.
    pub fn new() -> Self {
        ChromagramBuilder {
            frame_size: 1024,
            downsample_factor: 4,
            num_harmonics: 2,
            num_octaves: 2,
            search_width: 3,
        }
    }

    /// Set the number of input samples consumed per step.
    pub fn frame_size(mut self, size: usize) -> Self {
        self.frame_size = size;
        self
    }

    /// Set the decimation factor applied before the FFT.
    pub fn downsample_factor(mut self, factor: usize) -> Self {
        self.downsample_factor = factor;
        self
    }

    /// Set the number of harmonics summed per pitch class.
    pub fn num_harmonics(mut self, n: usize) -> Self {
        self.num_harmonics = n;
        self
    }

    /// Set the number of octaves summed per pitch class.
    pub fn num_octaves(mut self, n: usize) -> Self {
        self.num_octaves = n;
        self
    }

    /// Set the search width (in bins) for finding spectral peaks.
    pub fn search_width(mut self, w: usize) -> Self {
        self.search_width = w;
        self
    }

    /// Finalize and create the Chromagram.
    pub fn build(self) -> Result<Chromagram, ChromagramError> {
        if self.downsample_factor == 0 || BUFFER_SIZE % self.downsample_factor != 0 {
            return Err(ChromagramError::Configuration(
                "BUFFER_SIZE must be divisible by a non-zero downsample_factor".into(),
            ));
        }
        if self.frame_size == 0 {
            return Err(ChromagramError::Configuration("frame_size cannot be zero".into()));
        }
        if self.frame_size % self.downsample_factor != 0 {
            return Err(ChromagramError::Configuration(
                "frame_size must be divisible by downsample_factor".into(),
            ));
        }
        if self.num_harmonics == 0 || self.num_octaves == 0 {
            return Err(ChromagramError::Configuration(
                "num_harmonics and num_octaves must be at least 1".into(),
            ));
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(BUFFER_SIZE);

        let mut note_frequencies = [0.0; SEMITONES];
        for (i, freq) in note_frequencies.iter_mut().enumerate() {
            *freq = REFERENCE_FREQUENCY * 2f32.powf(i as f32 / 12.0);
        }

        Ok(Chromagram {
            frame_size: self.frame_size,
            downsample_factor: self.downsample_factor,
            num_harmonics: self.num_harmonics,
            num_octaves: self.num_octaves,
            search_width: self.search_width,
            fft,
            note_frequencies,
        })
    }
}

impl Default for ChromagramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Chromagram extractor configuration with a prepared FFT plan.
///
/// Holds no per-signal state; every call to [`Chromagram::stream`] or
/// [`ChromaExtractor::extract`] starts from an empty buffer.
#[derive(Clone)]
pub struct Chromagram {
    frame_size: usize,
    downsample_factor: usize,
    num_harmonics: usize,
    num_octaves: usize,
    search_width: usize,
    fft: Arc<dyn Fft<f32>>,
    note_frequencies: [f32; SEMITONES],
}

impl std::fmt::Debug for Chromagram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chromagram")
            .field("frame_size", &self.frame_size)
            .field("downsample_factor", &self.downsample_factor)
            .field("num_harmonics", &self.num_harmonics)
            .field("num_octaves", &self.num_octaves)
            .field("search_width", &self.search_width)
            .finish()
    }
}

impl Chromagram {
    /// Start customizing with a builder.
    pub fn builder() -> ChromagramBuilder {
        ChromagramBuilder::new()
    }

    /// Frame length expected by [`ChromaStream::next`].
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Open a stream for audio sampled at `sampling_rate` Hz.
    pub fn stream(&self, sampling_rate: u32) -> ChromaStream<'_> {
        ChromaStream {
            config: self,
            sampling_rate,
            buffer: vec![0.0; BUFFER_SIZE],
            head: 0,
            filtered: vec![0.0; self.frame_size / self.downsample_factor],
            filter_state: [0.0; 4],
            fft_buffer: vec![Complex { re: 0.0, im: 0.0 }; BUFFER_SIZE],
            scratch: vec![Complex { re: 0.0, im: 0.0 }; self.fft.get_inplace_scratch_len()],
            magnitude: vec![0.0; (BUFFER_SIZE / 2) + 1],
            samples_since_last: 0,
            samples_seen: 0,
        }
    }
}

impl ChromaExtractor for Chromagram {
    /// Run the stream over the segment, zero-padding the last frame. A
    /// segment shorter than one hop still yields a single column computed
    /// from what was buffered.
    fn extract(&self, segment: &AudioSegment<'_>) -> Result<ChromaMatrix, ExtractError> {
        let mut stream = self.stream(segment.sample_rate());
        let mut frames = Vec::new();
        let mut padded = vec![0.0; self.frame_size];

        for chunk in segment.samples().chunks(self.frame_size) {
            let frame: &[f32] = if chunk.len() == self.frame_size {
                chunk
            } else {
                padded[..chunk.len()].copy_from_slice(chunk);
                &padded
            };
            if let Some(chroma) = stream.next(frame)? {
                frames.push(chroma);
            }
        }
        if frames.is_empty() {
            frames.push(stream.flush());
        }

        log::debug!(
            "chromagram: {} frames from {} samples at {} Hz",
            frames.len(),
            segment.len(),
            segment.sample_rate()
        );
        Ok(ChromaMatrix::from_frames(&frames))
    }
}

/// Streaming chromagram state for one signal.
pub struct ChromaStream<'a> {
    config: &'a Chromagram,
    sampling_rate: u32,
    buffer: Vec<f32>,
    head: usize,
    filtered: Vec<f32>,
    /// x[n-1], x[n-2], y[n-1], y[n-2] of the anti-aliasing filter.
    filter_state: [f32; 4],
    fft_buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitude: Vec<f32>,
    samples_since_last: usize,
    samples_seen: usize,
}

impl ChromaStream<'_> {
    /// Push one audio frame in. Returns `Ok(None)` until enough data accumulates,
    /// then `Ok(Some(chroma))` when a new chroma frame is ready.
    pub fn next(&mut self, frame: &[f32]) -> Result<Option<[f32; SEMITONES]>, ChromagramError> {
        if frame.len() != self.config.frame_size {
            return Err(ChromagramError::InvalidFrameSize {
                expected: self.config.frame_size,
                got: frame.len(),
            });
        }

        self.downsample_frame(frame);

        for &s in &self.filtered {
            self.buffer[self.head] = s;
            self.head = (self.head + 1) % BUFFER_SIZE;
        }

        self.samples_seen += frame.len();
        self.samples_since_last += frame.len();
        if self.samples_since_last < CHROMA_INTERVAL {
            return Ok(None);
        }
        self.samples_since_last -= CHROMA_INTERVAL;

        Ok(Some(self.compute()))
    }

    /// Compute a chroma frame from whatever is buffered, ready or not.
    pub fn flush(&mut self) -> [f32; SEMITONES] {
        if self.samples_seen == 0 {
            return [0.0; SEMITONES];
        }
        self.samples_since_last = 0;
        self.compute()
    }

    fn compute(&mut self) -> [f32; SEMITONES] {
        self.compute_spectrum();
        self.compute_chroma()
    }

    #[inline]
    fn downsample_frame(&mut self, input: &[f32]) {
        let (b0, b1, b2) = (0.2929, 0.5858, 0.2929);
        let a2 = 0.1716;
        let [mut x1, mut x2, mut y1, mut y2] = self.filter_state;
        let mut out = 0;

        for (i, &x0) in input.iter().enumerate() {
            let y0 = b0 * x0 + b1 * x1 + b2 * x2 - a2 * y2;
            x2 = x1;
            x1 = x0;
            y2 = y1;
            y1 = y0;

            if i % self.config.downsample_factor == 0 {
                self.filtered[out] = y0;
                out += 1;
            }
        }
        self.filter_state = [x1, x2, y1, y2];
    }

    #[inline]
    fn compute_spectrum(&mut self) {
        // oldest sample sits at `head`
        for (i, bin) in self.fft_buffer.iter_mut().enumerate() {
            let sample = self.buffer[(self.head + i) % BUFFER_SIZE];
            *bin = Complex {
                re: sample * HAMMING_WINDOW[i],
                im: 0.0,
            };
        }

        self.config
            .fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.scratch);

        for (mag, c) in self.magnitude.iter_mut().zip(&self.fft_buffer) {
            *mag = (c.re * c.re + c.im * c.im).sqrt();
        }
    }

    #[inline]
    fn compute_chroma(&self) -> [f32; SEMITONES] {
        let cfg = self.config;
        let bin_width =
            (self.sampling_rate as f32 / cfg.downsample_factor as f32) / BUFFER_SIZE as f32;
        let max_bin = self.magnitude.len() - 1;

        let mut chroma = [0.0; SEMITONES];
        for (n, slot) in chroma.iter_mut().enumerate() {
            let mut c_sum = 0.0;
            for octave in 1..=cfg.num_octaves {
                for harm in 1..=cfg.num_harmonics {
                    let freq = cfg.note_frequencies[n] * octave as f32 * harm as f32;
                    let center = (freq / bin_width).round() as usize;
                    let lo = center.saturating_sub(cfg.search_width * harm);
                    let hi = (center + cfg.search_width * harm).min(max_bin);
                    if lo > hi {
                        // above Nyquist for this sampling rate
                        continue;
                    }

                    let peak = self.magnitude[lo..=hi].iter().copied().fold(0.0_f32, f32::max);
                    c_sum += peak / harm as f32;
                }
            }
            *slot = c_sum;
        }
        chroma
    }
}

/// Approximate cosine for window generation.
const fn cos_const(mut x: f32) -> f32 {
    let two_pi = 2.0 * PI;
    while x < -PI {
        x += two_pi;
    }
    while x > PI {
        x -= two_pi;
    }
    let x2 = x * x;
    let x4 = x2 * x2;
    let x6 = x4 * x2;
    let x8 = x4 * x4;
    1.0 - x2 * 0.5 + x4 * (1.0 / 24.0) - x6 * (1.0 / 720.0) + x8 * (1.0 / 40320.0)
}

/// Compile‐time Hamming window.
const fn make_hamming_window() -> [f32; BUFFER_SIZE] {
    let mut w = [0.0; BUFFER_SIZE];
    let mut n = 0;
    while n < BUFFER_SIZE {
        let phase = 2.0 * PI * n as f32 / (BUFFER_SIZE as f32 - 1.0);
        w[n] = 0.54 - 0.46 * cos_const(phase);
        n += 1;
    }
    w
}

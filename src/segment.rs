//! Segment extraction
//!
//! Resolves an optional time window into a non-empty sample range of a
//! decoded waveform.

use thiserror::Error;

/// Errors when resolving an analysis window.
#[derive(Debug, Error, PartialEq)]
pub enum SegmentError {
    /// The resolved sample range holds no samples.
    #[error("empty segment: samples {start}..{end} of a {len}-sample buffer")]
    InvalidSegment {
        /// Clamped start index.
        start: usize,
        /// Clamped end index.
        end: usize,
        /// Buffer length.
        len: usize,
    },

    /// A time bound was NaN or infinite.
    #[error("time bound must be finite, got {0}")]
    NonFiniteTime(f64),

    /// The sample rate was zero.
    #[error("sample rate must be positive")]
    InvalidSampleRate,
}

/// A contiguous, non-empty slice of a waveform.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AudioSegment<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    start: usize,
    end: usize,
}

impl<'a> AudioSegment<'a> {
    /// Cut `[start, end)` seconds out of `samples`.
    ///
    /// Bounds are converted with `round(time * sample_rate)`; a missing start
    /// means the first sample, a missing end means the end of the buffer
    /// (`end() == samples.len()`, exclusive). Both indices are
    /// clamped to the buffer independently, so out-of-range times are not an
    /// error by themselves.
    ///
    /// Returns `Err(SegmentError::InvalidSegment)` if nothing is left after
    /// clamping.
    pub fn extract(
        samples: &'a [f32],
        sample_rate: u32,
        start: Option<f64>,
        end: Option<f64>,
    ) -> Result<Self, SegmentError> {
        if sample_rate == 0 {
            return Err(SegmentError::InvalidSampleRate);
        }
        let len = samples.len();
        let start = match start {
            Some(t) => time_to_index(t, sample_rate, len)?,
            None => 0,
        };
        let end = match end {
            Some(t) => time_to_index(t, sample_rate, len)?,
            None => len,
        };

        if start >= end {
            return Err(SegmentError::InvalidSegment { start, end, len });
        }

        log::debug!(
            "segment resolved to samples {}..{} of {} at {} Hz",
            start,
            end,
            len,
            sample_rate
        );

        Ok(AudioSegment {
            samples,
            sample_rate,
            start,
            end,
        })
    }

    /// The whole buffer as one segment.
    pub fn whole(samples: &'a [f32], sample_rate: u32) -> Result<Self, SegmentError> {
        Self::extract(samples, sample_rate, None, None)
    }

    /// Samples inside the segment.
    pub fn samples(&self) -> &'a [f32] {
        &self.samples[self.start..self.end]
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// First sample index (inclusive).
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last sample index (exclusive).
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of samples, always at least one.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Always `false`; kept for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Start time in seconds.
    pub fn start_time(&self) -> f64 {
        self.start as f64 / self.sample_rate as f64
    }

    /// End time in seconds.
    pub fn end_time(&self) -> f64 {
        self.end as f64 / self.sample_rate as f64
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }
}

fn time_to_index(time: f64, sample_rate: u32, len: usize) -> Result<usize, SegmentError> {
    if !time.is_finite() {
        return Err(SegmentError::NonFiniteTime(time));
    }
    let idx = (time * sample_rate as f64).round();
    Ok(idx.clamp(0.0, len as f64) as usize)
}

//! General-order IIR filter.
//!
//! Implements the transfer function
//!
//! ```text
//!         b0 + b1·z⁻¹ + … + bM·z⁻ᴹ
//! H(z) = ─────────────────────────
//!         a0 + a1·z⁻¹ + … + aN·z⁻ᴺ
//! ```
//!
//! with at most [`MAX_COEFFICIENTS`] coefficients per array. Coefficients
//! are normalized by `a0` once at construction, so the recurrence is
//!
//! ```text
//! y[n] = Σ b_k·x[n−k] − Σ_{k≥1} a_k·y[n−k]
//! ```
//!
//! History is kept per channel in a circular buffer of [`HISTORY_LENGTH`]
//! frames indexed with a bit mask.

#[cfg(not(feature = "std"))]
use alloc::{format, vec::Vec};

use core::f64::consts::PI;
use libm::{atan2, cos, sin, sqrt};

use crate::error::{AudioError, Result};
use crate::processor::SampleProcessor;

/// Maximum number of coefficients in either array.
pub const MAX_COEFFICIENTS: usize = 20;

/// Length of the per-channel circular history.
pub const HISTORY_LENGTH: usize = 32;

const HISTORY_MASK: usize = HISTORY_LENGTH - 1;

/// Validated, normalized IIR coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct IirCoefficients {
    feedforward: Vec<f64>,
    feedback: Vec<f64>,
}

impl IirCoefficients {
    /// Validates and normalizes the coefficient arrays.
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn new(feedforward: &[f64], feedback: &[f64]) -> Result<Self> {
        Self::validate(feedforward, feedback)?;

        let a0 = feedback[0];
        let (feedforward, feedback) = if a0 == 1.0 {
            (feedforward.to_vec(), feedback.to_vec())
        } else {
            (
                feedforward.iter().map(|b| b / a0).collect(),
                feedback.iter().map(|a| a / a0).collect(),
            )
        };

        Ok(Self {
            feedforward,
            feedback,
        })
    }

    /// Checks coefficient arrays without building anything.
    ///
    /// The feedback array is checked before the feedforward array.
    ///
    /// # Errors
    ///
    /// - [`AudioError::NotSupported`] if an array is empty or longer than
    ///   [`MAX_COEFFICIENTS`].
    /// - [`AudioError::InvalidState`] if the first coefficient of an array is
    ///   zero.
    pub fn validate(feedforward: &[f64], feedback: &[f64]) -> Result<()> {
        check_array("feedback", feedback)?;
        check_array("feedforward", feedforward)
    }

    /// Normalized feedforward (numerator) coefficients.
    pub fn feedforward(&self) -> &[f64] {
        &self.feedforward
    }

    /// Normalized feedback (denominator) coefficients; the first is always 1.
    pub fn feedback(&self) -> &[f64] {
        &self.feedback
    }

    /// Magnitude and phase of the response at `frequency_hz`.
    ///
    /// Frequencies outside `[0, nyquist]` yield `NaN` for both.
    pub fn response_at(&self, nyquist: f32, frequency_hz: f32) -> (f32, f32) {
        let normalized = frequency_hz / nyquist;
        if !(0.0..=1.0).contains(&normalized) {
            return (f32::NAN, f32::NAN);
        }

        let omega = -PI * f64::from(normalized);
        let z = (cos(omega), sin(omega));

        let (num_re, num_im) = horner(&self.feedforward, z);
        let (den_re, den_im) = horner(&self.feedback, z);

        let denominator = den_re * den_re + den_im * den_im;
        let re = (num_re * den_re + num_im * den_im) / denominator;
        let im = (num_im * den_re - num_re * den_im) / denominator;

        (sqrt(re * re + im * im) as f32, atan2(im, re) as f32)
    }

    /// Fills `magnitude` and `phase` with the response at each frequency.
    ///
    /// # Errors
    ///
    /// [`AudioError::NotSupported`] if the three slices differ in length.
    pub fn frequency_response(
        &self,
        nyquist: f32,
        frequency_hz: &[f32],
        magnitude: &mut [f32],
        phase: &mut [f32],
    ) -> Result<()> {
        if frequency_hz.len() != magnitude.len() || frequency_hz.len() != phase.len() {
            return Err(AudioError::not_supported(
                "frequency, magnitude and phase arrays must have the same length",
            ));
        }
        self.fill_response(nyquist, frequency_hz, magnitude, phase);
        Ok(())
    }

    /// Like [`frequency_response`](Self::frequency_response) but stops at the
    /// shortest slice instead of failing.
    pub fn fill_response(
        &self,
        nyquist: f32,
        frequency_hz: &[f32],
        magnitude: &mut [f32],
        phase: &mut [f32],
    ) {
        for ((&f, mag), ph) in frequency_hz.iter().zip(magnitude).zip(phase) {
            (*mag, *ph) = self.response_at(nyquist, f);
        }
    }
}

fn check_array(name: &str, coefficients: &[f64]) -> Result<()> {
    if coefficients.is_empty() || coefficients.len() > MAX_COEFFICIENTS {
        return Err(AudioError::not_supported(format!(
            "{name} must contain between 1 and {MAX_COEFFICIENTS} coefficients, got {}",
            coefficients.len()
        )));
    }
    if coefficients[0] == 0.0 {
        return Err(AudioError::invalid_state(format!(
            "the first {name} coefficient must not be 0"
        )));
    }
    Ok(())
}

/// Evaluates `c0 + c1·z + c2·z² + …` with (re, im) arithmetic.
fn horner(coefficients: &[f64], z: (f64, f64)) -> (f64, f64) {
    coefficients
        .iter()
        .rev()
        .fold((0.0, 0.0), |(re, im), &c| {
            (re * z.0 - im * z.1 + c, re * z.1 + im * z.0)
        })
}

#[derive(Debug, Clone)]
struct ChannelHistory {
    x: [f64; HISTORY_LENGTH],
    y: [f64; HISTORY_LENGTH],
    index: usize,
}

impl ChannelHistory {
    fn new() -> Self {
        Self {
            x: [0.0; HISTORY_LENGTH],
            y: [0.0; HISTORY_LENGTH],
            index: 0,
        }
    }
}

/// Multi-channel IIR filter with independent per-channel history.
///
/// # Example
///
/// ```rust
/// use unisono_core::{IirCoefficients, IirFilter};
///
/// let coefficients = IirCoefficients::new(&[1.0, -1.0], &[1.0, -0.5]).unwrap();
/// let mut filter = IirFilter::new(coefficients, 1);
/// let out: Vec<f32> = [1.0, 0.0, 0.0]
///     .iter()
///     .map(|&x| filter.process_sample(0, x))
///     .collect();
/// assert_eq!(out, vec![1.0, -0.5, -0.25]);
/// ```
#[derive(Debug, Clone)]
pub struct IirFilter {
    coefficients: IirCoefficients,
    channels: Vec<ChannelHistory>,
}

impl IirFilter {
    /// Creates a filter with `channel_count` zeroed histories.
    pub fn new(coefficients: IirCoefficients, channel_count: usize) -> Self {
        Self {
            coefficients,
            channels: (0..channel_count).map(|_| ChannelHistory::new()).collect(),
        }
    }

    /// The filter's normalized coefficients.
    pub fn coefficients(&self) -> &IirCoefficients {
        &self.coefficients
    }

    /// Number of channels with history.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Clears every channel's history.
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            *channel = ChannelHistory::new();
        }
    }

    /// Processes one sample on `channel`, growing the channel set if needed.
    pub fn process_sample(&mut self, channel: usize, input: f32) -> f32 {
        if channel >= self.channels.len() {
            self.channels.resize_with(channel + 1, ChannelHistory::new);
        }
        let b = &self.coefficients.feedforward;
        let a = &self.coefficients.feedback;
        let history = &mut self.channels[channel];

        let j = history.index;
        history.x[j] = f64::from(input);

        let mut y = b[0] * history.x[j];
        let shared = b.len().min(a.len());
        for k in 1..shared {
            let n = (j + HISTORY_LENGTH - k) & HISTORY_MASK;
            y += b[k] * history.x[n] - a[k] * history.y[n];
        }
        for (k, bk) in b.iter().enumerate().skip(shared) {
            y += bk * history.x[(j + HISTORY_LENGTH - k) & HISTORY_MASK];
        }
        for (k, ak) in a.iter().enumerate().skip(shared.max(1)) {
            y -= ak * history.y[(j + HISTORY_LENGTH - k) & HISTORY_MASK];
        }

        history.y[j] = y;
        history.index = (j + 1) & HISTORY_MASK;
        y as f32
    }

    /// Processes a block of one channel.
    ///
    /// # Panics
    ///
    /// Panics if `input.len() != output.len()`.
    pub fn process_channel(&mut self, channel: usize, input: &[f32], output: &mut [f32]) {
        assert_eq!(input.len(), output.len());
        for (x, y) in input.iter().zip(output.iter_mut()) {
            *y = self.process_sample(channel, *x);
        }
    }
}

impl SampleProcessor for IirFilter {
    fn process(&mut self, input: &[Vec<f32>], output: &mut [Vec<f32>]) {
        for (channel, (x, y)) in input.iter().zip(output.iter_mut()).enumerate() {
            self.process_channel(channel, x, y);
        }
    }

    fn reset(&mut self) {
        IirFilter::reset(self);
    }
}

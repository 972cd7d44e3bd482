//! The raw sample-processing contract.
//!
//! A [`SampleProcessor`] is the primitive the engine's script-processor node
//! drives: it receives one block of multi-channel input and fills a block of
//! multi-channel output. Emulated nodes are built on top of it.
//!
//! Unlike a mono per-sample effect, a processor owns all channels of a block,
//! so channel-dependent state (such as per-channel filter history) lives in
//! one place.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Block-based multi-channel audio processor.
///
/// `input` and `output` hold one `Vec` per channel, each with the same
/// length. The engine sizes `output` with
/// [`output_channel_count`](Self::output_channel_count) before calling
/// [`process`](Self::process) and zeroes it.
///
/// # Example
///
/// ```rust
/// use unisono_core::SampleProcessor;
///
/// struct Invert;
///
/// impl SampleProcessor for Invert {
///     fn process(&mut self, input: &[Vec<f32>], output: &mut [Vec<f32>]) {
///         for (x, y) in input.iter().zip(output.iter_mut()) {
///             for (a, b) in x.iter().zip(y.iter_mut()) {
///                 *b = -*a;
///             }
///         }
///     }
/// }
/// ```
pub trait SampleProcessor {
    /// Processes one block.
    fn process(&mut self, input: &[Vec<f32>], output: &mut [Vec<f32>]);

    /// Number of output channels produced for `input_channels` inputs.
    ///
    /// Default: same as the input.
    fn output_channel_count(&self, input_channels: usize) -> usize {
        input_channels
    }

    /// Clears internal state.
    fn reset(&mut self) {}
}

impl<F> SampleProcessor for F
where
    F: FnMut(&[Vec<f32>], &mut [Vec<f32>]),
{
    fn process(&mut self, input: &[Vec<f32>], output: &mut [Vec<f32>]) {
        self(input, output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(not(feature = "std"))]
    use alloc::{boxed::Box, vec};

    #[test]
    fn test_closure_processor() {
        let mut double = |input: &[Vec<f32>], output: &mut [Vec<f32>]| {
            for (x, y) in input.iter().zip(output.iter_mut()) {
                for (a, b) in x.iter().zip(y.iter_mut()) {
                    *b = *a * 2.0;
                }
            }
        };
        let input = vec![vec![1.0, -0.5]];
        let mut output = vec![vec![0.0; 2]];
        double.process(&input, &mut output);
        assert_eq!(output[0], vec![2.0, -1.0]);
        assert_eq!(double.output_channel_count(3), 3);
    }

    #[test]
    fn test_object_safe() {
        let mut boxed: Box<dyn SampleProcessor> =
            Box::new(|_: &[Vec<f32>], output: &mut [Vec<f32>]| {
                for channel in output.iter_mut() {
                    channel.fill(1.0);
                }
            });
        let mut output = vec![vec![0.0; 4]; 2];
        boxed.process(&[], &mut output);
        assert!(output.iter().flatten().all(|&s| s == 1.0));
    }
}

//! IIR filter faker.
//!
//! Engines without an IIR filter node get one built from the engine's
//! script-processor primitive driving [`IirFilter`]. The same construction is
//! used for live nodes and when a renderer rebuilds an IIR node inside an
//! offline target, so both produce the same arithmetic.

use unisono_core::{AudioError, IirCoefficients, IirFilter, Result};
use unisono_engine::{NativeContext, NativeNode};

use crate::capabilities::Capabilities;

/// Which implementation backs an IIR filter node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IirBackend {
    /// The engine's own node.
    Native,
    /// A script processor running [`IirFilter`].
    Faked,
}

impl IirBackend {
    /// The backend an engine with `capabilities` gets.
    pub fn for_capabilities(capabilities: &Capabilities) -> Self {
        if capabilities.native_iir_filter {
            Self::Native
        } else {
            Self::Faked
        }
    }
}

/// Creates an IIR filter node in `target`, native or faked.
///
/// Both paths validate the coefficients identically: a length outside
/// `1..=20` is NotSupported, a zero leading coefficient is InvalidState.
pub fn create_iir_filter(
    target: &NativeContext,
    capabilities: &Capabilities,
    feedforward: &[f64],
    feedback: &[f64],
) -> Result<NativeNode> {
    match IirBackend::for_capabilities(capabilities) {
        IirBackend::Native => target.create_iir_filter(feedforward, feedback),
        IirBackend::Faked => {
            let coefficients = IirCoefficients::new(feedforward, feedback)?;
            tracing::trace!(
                "iir_faker: {} ff={} fb={}",
                target.id(),
                feedforward.len(),
                feedback.len()
            );
            target.create_script_processor(Box::new(IirFilter::new(coefficients, 1)))
        }
    }
}

/// Frequency response of an IIR filter node.
///
/// Mismatched slice lengths are NotSupported whatever the backend; the check
/// runs here only where the engine would skip it.
pub fn get_frequency_response(
    backend: IirBackend,
    node: &NativeNode,
    coefficients: &IirCoefficients,
    capabilities: &Capabilities,
    frequency_hz: &[f32],
    magnitude: &mut [f32],
    phase: &mut [f32],
) -> Result<()> {
    match backend {
        IirBackend::Faked => {
            let nyquist = node.context().sample_rate() / 2.0;
            coefficients.frequency_response(nyquist, frequency_hz, magnitude, phase)
        }
        IirBackend::Native => {
            if !capabilities.checks_response_lengths
                && (magnitude.len() != frequency_hz.len() || phase.len() != frequency_hz.len())
            {
                return Err(AudioError::not_supported(format!(
                    "response arrays differ in length: {} frequencies, {} magnitudes, {} phases",
                    frequency_hz.len(),
                    magnitude.len(),
                    phase.len()
                )));
            }
            node.get_frequency_response(frequency_hz, magnitude, phase)
        }
    }
}

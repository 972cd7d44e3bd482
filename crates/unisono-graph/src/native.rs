//! The shared native node factory.
//!
//! Live construction and render-time reconstruction both go through
//! [`create_native`], so a node rebuilt in an offline target gets exactly the
//! adjustments the same node gets when built live on that engine.

use unisono_core::Result;
use unisono_engine::{NativeContext, NativeNode};

use crate::capabilities::Capabilities;
use crate::faker::iir;
use crate::graph::NodeOptions;

/// Builds the native counterpart of a node described by `options` in `target`.
pub(crate) fn create_native(
    target: &NativeContext,
    capabilities: &Capabilities,
    options: &NodeOptions,
) -> Result<NativeNode> {
    match options {
        NodeOptions::Destination => Ok(target.destination()),
        NodeOptions::Gain => target.create_gain(),
        NodeOptions::Delay { max_delay_time } => target.create_delay(*max_delay_time),
        NodeOptions::ConstantSource => target.create_constant_source(),
        NodeOptions::Oscillator { waveform } => {
            let node = target.create_oscillator()?;
            node.set_oscillator_type(*waveform)?;
            Ok(node)
        }
        NodeOptions::IirFilter {
            feedforward,
            feedback,
        } => iir::create_iir_filter(target, capabilities, feedforward, feedback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unisono_engine::{EngineProfile, NativeNodeKind, OscillatorType};

    #[test]
    fn test_oscillator_waveform_applied() {
        let profile = EngineProfile::reference();
        let caps = Capabilities::probe(&profile);
        let ctx = NativeContext::realtime(48000.0, profile).unwrap();
        let node = create_native(
            &ctx,
            &caps,
            &NodeOptions::Oscillator {
                waveform: OscillatorType::Triangle,
            },
        )
        .unwrap();
        assert_eq!(node.oscillator_type(), Some(OscillatorType::Triangle));
    }

    #[test]
    fn test_destination_is_not_rebuilt() {
        let profile = EngineProfile::reference();
        let caps = Capabilities::probe(&profile);
        let ctx = NativeContext::realtime(48000.0, profile).unwrap();
        let node = create_native(&ctx, &caps, &NodeOptions::Destination).unwrap();
        assert_eq!(node, ctx.destination());
        assert_eq!(node.kind(), NativeNodeKind::Destination);
        assert_eq!(ctx.number_of_nodes(), 1);
    }
}

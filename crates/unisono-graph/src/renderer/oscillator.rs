//! Oscillator renderer.
//!
//! The waveform is taken from the record as it stands at render time, so a
//! type change made after construction carries over.

use unisono_core::Result;
use unisono_engine::NativeNode;

use super::{NodeRenderer, RenderTarget, replay_schedule};
use crate::graph::NodeRecord;
use crate::native::create_native;

pub(crate) struct OscillatorRenderer;

impl NodeRenderer for OscillatorRenderer {
    fn create(&self, record: &NodeRecord, target: &RenderTarget) -> Result<NativeNode> {
        create_native(&target.context, &target.capabilities, &record.options)
    }

    fn replay_state(&self, record: &NodeRecord, native: &NativeNode) -> Result<()> {
        replay_schedule(record, native)
    }
}

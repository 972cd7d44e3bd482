//! Constant source renderer.

use unisono_core::Result;
use unisono_engine::NativeNode;

use super::{NodeRenderer, RenderTarget, replay_schedule};
use crate::graph::NodeRecord;
use crate::native::create_native;

pub(crate) struct ConstantSourceRenderer;

impl NodeRenderer for ConstantSourceRenderer {
    fn create(&self, record: &NodeRecord, target: &RenderTarget) -> Result<NativeNode> {
        create_native(&target.context, &target.capabilities, &record.options)
    }

    fn replay_state(&self, record: &NodeRecord, native: &NativeNode) -> Result<()> {
        replay_schedule(record, native)
    }
}

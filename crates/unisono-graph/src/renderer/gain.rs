//! Gain renderer.

use unisono_core::Result;
use unisono_engine::NativeNode;

use super::{NodeRenderer, RenderTarget};
use crate::graph::NodeRecord;
use crate::native::create_native;

pub(crate) struct GainRenderer;

impl NodeRenderer for GainRenderer {
    fn create(&self, record: &NodeRecord, target: &RenderTarget) -> Result<NativeNode> {
        create_native(&target.context, &target.capabilities, &record.options)
    }
}

//! IIR filter renderer.
//!
//! Whether the rebuilt node is native or faked depends on the *target*
//! engine's capabilities, not on how the live node was built.

use unisono_core::Result;
use unisono_engine::NativeNode;

use super::{NodeRenderer, RenderTarget};
use crate::graph::NodeRecord;
use crate::native::create_native;

pub(crate) struct IirFilterRenderer;

impl NodeRenderer for IirFilterRenderer {
    fn create(&self, record: &NodeRecord, target: &RenderTarget) -> Result<NativeNode> {
        create_native(&target.context, &target.capabilities, &record.options)
    }
}

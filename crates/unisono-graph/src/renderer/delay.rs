//! Delay renderer.
//!
//! The rebuilt delay keeps the maximum delay time it was created with, so its
//! delay memory and `delayTime` range match the live node.

use unisono_core::Result;
use unisono_engine::NativeNode;

use super::{NodeRenderer, RenderTarget};
use crate::graph::NodeRecord;
use crate::native::create_native;

pub(crate) struct DelayRenderer;

impl NodeRenderer for DelayRenderer {
    fn create(&self, record: &NodeRecord, target: &RenderTarget) -> Result<NativeNode> {
        create_native(&target.context, &target.capabilities, &record.options)
    }
}

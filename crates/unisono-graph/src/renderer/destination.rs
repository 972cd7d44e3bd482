//! Destination renderer.

use unisono_core::Result;
use unisono_engine::NativeNode;

use super::{NodeRenderer, RenderTarget};
use crate::graph::NodeRecord;

/// Maps a destination onto the target's own destination.
pub(crate) struct DestinationRenderer;

impl NodeRenderer for DestinationRenderer {
    fn create(&self, _record: &NodeRecord, target: &RenderTarget) -> Result<NativeNode> {
        Ok(target.context.destination())
    }
}

//! Per-pass memo of rendered nodes.

use std::collections::HashMap;

use unisono_engine::NativeNode;

use crate::graph::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Node id → native node built for it during one render pass.
///
/// A node is absent until its renderer has constructed the native node, then
/// in progress while its inputs are rendered, then done. Both present states
/// hand back the stored native node, which is what ends a cycle.
#[derive(Debug, Default)]
pub(crate) struct VisitedSet {
    entries: HashMap<NodeId, (Mark, NativeNode)>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The native node stored for `id`, in progress or done.
    pub fn get(&self, id: NodeId) -> Option<NativeNode> {
        self.entries.get(&id).map(|(_, node)| node.clone())
    }

    pub fn mark_in_progress(&mut self, id: NodeId, native: NativeNode) {
        self.entries.insert(id, (Mark::InProgress, native));
    }

    pub fn mark_done(&mut self, id: NodeId) {
        if let Some((mark, _)) = self.entries.get_mut(&id) {
            *mark = Mark::Done;
        }
    }

    pub fn is_in_progress(&self, id: NodeId) -> bool {
        matches!(self.entries.get(&id), Some((Mark::InProgress, _)))
    }

    pub fn is_done(&self, id: NodeId) -> bool {
        matches!(self.entries.get(&id), Some((Mark::Done, _)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

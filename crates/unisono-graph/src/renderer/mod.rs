//! Rebuilding a recorded graph inside a target context.
//!
//! [`render_node`] is a memoized depth-first walk. For each node it:
//!
//! 1. returns the stored native node if the node was already reached in this
//!    pass (fan-in and cycles both end here);
//! 2. builds the native counterpart through the node's [`NodeRenderer`] and
//!    marks the node in progress *before* recursing;
//! 3. renders every recorded upstream node and connects it to the new node,
//!    the caller connecting after the callee returns;
//! 4. replays each parameter's recorded automation onto the new node;
//! 5. replays node state that is not automation (source start/stop);
//! 6. marks the node done.
//!
//! A node reached again while in progress hands back its not-yet-wired
//! native node. That reference stays valid because wiring always happens in
//! the caller, so a delay feedback loop closes without infinite recursion.

mod constant_source;
mod delay;
mod destination;
mod gain;
mod iir_filter;
mod oscillator;
mod visited;

use unisono_core::{AudioError, Result};
use unisono_engine::{NativeContext, NativeNode};

use crate::capabilities::Capabilities;
use crate::graph::{GraphRecord, NodeId, NodeKind, NodeRecord};

pub(crate) use visited::VisitedSet;

/// The context a render pass builds into, with its probed capabilities.
pub(crate) struct RenderTarget {
    pub context: NativeContext,
    pub capabilities: Capabilities,
}

/// Per-kind construction and replay for one node type.
pub(crate) trait NodeRenderer {
    /// Builds the node's native counterpart in the target context.
    fn create(&self, record: &NodeRecord, target: &RenderTarget) -> Result<NativeNode>;

    /// Replays recorded state other than parameter automation.
    fn replay_state(&self, _record: &NodeRecord, _native: &NativeNode) -> Result<()> {
        Ok(())
    }
}

/// The renderer for nodes of `kind`.
pub(crate) fn renderer_for(kind: NodeKind) -> Box<dyn NodeRenderer> {
    match kind {
        NodeKind::Destination => Box::new(destination::DestinationRenderer),
        NodeKind::Gain => Box::new(gain::GainRenderer),
        NodeKind::Delay => Box::new(delay::DelayRenderer),
        NodeKind::ConstantSource => Box::new(constant_source::ConstantSourceRenderer),
        NodeKind::Oscillator => Box::new(oscillator::OscillatorRenderer),
        NodeKind::IirFilter => Box::new(iir_filter::IirFilterRenderer),
    }
}

/// Renders node `id` and everything upstream of it into `target`.
pub(crate) fn render_node(
    graph: &GraphRecord,
    id: NodeId,
    target: &RenderTarget,
    visited: &mut VisitedSet,
) -> Result<NativeNode> {
    if let Some(native) = visited.get(id) {
        if visited.is_in_progress(id) {
            tracing::trace!("render: {id} closes a cycle");
        }
        return Ok(native);
    }

    let record = graph
        .get(id)
        .ok_or_else(|| AudioError::invalid_state(format!("{id} is not part of this graph")))?;
    let renderer = record.renderer.as_ref().ok_or_else(|| {
        AudioError::invalid_state(format!("{id} belongs to a real-time graph"))
    })?;

    let native = renderer.create(record, target)?;
    visited.mark_in_progress(id, native.clone());
    tracing::trace!("render: {id} {} -> #{}", record.kind(), native.index());

    for connection in &record.inputs {
        let upstream = render_node(graph, connection.source, target, visited)?;
        upstream.connect(&native, connection.output, connection.input)?;
    }

    for param in &record.params {
        let Some(param_renderer) = param.renderer() else {
            continue;
        };
        let target_param = native.param(param.name()).ok_or_else(|| {
            AudioError::invalid_state(format!(
                "rendered {} has no parameter {}",
                record.kind(),
                param.name()
            ))
        })?;
        param_renderer.replay(&target_param)?;
    }

    renderer.replay_state(record, &native)?;
    visited.mark_done(id);
    Ok(native)
}

/// Replays the recorded start/stop times of a scheduled source.
pub(crate) fn replay_schedule(record: &NodeRecord, native: &NativeNode) -> Result<()> {
    if let Some(start) = record.start {
        native.start(start)?;
        if let Some(stop) = record.stop {
            native.stop(stop)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AudioContext, BaseAudioContext, OfflineAudioContext};
    use crate::runtime::Runtime;
    use unisono_engine::{EngineProfile, NativeNodeKind};

    fn render_into(context: &BaseAudioContext, id: NodeId) -> (NativeContext, VisitedSet) {
        let target = RenderTarget {
            context: NativeContext::offline(1, 128, 8000.0, EngineProfile::reference()).unwrap(),
            capabilities: context.capabilities(),
        };
        let mut visited = VisitedSet::new();
        render_node(&context.shared.graph.borrow(), id, &target, &mut visited).unwrap();
        (target.context, visited)
    }

    #[test]
    fn test_fan_in_builds_each_node_once() {
        let runtime = Runtime::new();
        let ctx =
            OfflineAudioContext::new(&runtime, 1, 128, 8000.0, EngineProfile::reference()).unwrap();
        let source = ctx.create_constant_source().unwrap();
        let left = ctx.create_gain().unwrap();
        let right = ctx.create_gain().unwrap();
        source.connect(&left, 0, 0).unwrap();
        source.connect(&right, 0, 0).unwrap();
        left.connect(&ctx.destination(), 0, 0).unwrap();
        right.connect(&ctx.destination(), 0, 0).unwrap();

        let (target, visited) = render_into(&ctx, ctx.destination().id());
        assert_eq!(target.number_of_nodes(), 4);
        assert_eq!(visited.len(), 4);
        assert!(visited.is_done(source.id()));
        assert_eq!(target.destination().inputs(0).len(), 2);
    }

    #[test]
    fn test_feedback_cycle_is_closed() {
        let runtime = Runtime::new();
        let ctx =
            OfflineAudioContext::new(&runtime, 1, 128, 8000.0, EngineProfile::reference()).unwrap();
        let source = ctx.create_constant_source().unwrap();
        let gain = ctx.create_gain().unwrap();
        let delay = ctx.create_delay(1.0).unwrap();
        source.connect(&gain, 0, 0).unwrap();
        gain.connect(&delay, 0, 0).unwrap();
        delay.connect(&gain, 0, 0).unwrap();
        gain.connect(&ctx.destination(), 0, 0).unwrap();

        let (target, visited) = render_into(&ctx, ctx.destination().id());
        assert_eq!(target.number_of_nodes(), 4);
        for id in [source.id(), gain.id(), delay.id()] {
            assert!(visited.is_done(id));
        }

        let native_gain = visited.get(gain.id()).unwrap();
        let native_delay = visited.get(delay.id()).unwrap();
        let gain_inputs: Vec<_> = native_gain.inputs(0).into_iter().map(|(n, _)| n).collect();
        assert_eq!(gain_inputs.len(), 2);
        assert!(gain_inputs.contains(&native_delay));
        assert_eq!(native_delay.inputs(0)[0].0, native_gain);
    }

    #[test]
    fn test_schedule_and_automation_replayed() {
        let runtime = Runtime::new();
        let ctx =
            OfflineAudioContext::new(&runtime, 1, 128, 8000.0, EngineProfile::reference()).unwrap();
        let source = ctx.create_constant_source().unwrap();
        source.offset().set_value_at_time(0.25, 0.0).unwrap();
        source.start(0.0).unwrap();
        source.stop(0.01).unwrap();

        let (_, visited) = render_into(&ctx, source.id());
        let native = visited.get(source.id()).unwrap();
        assert_eq!(native.scheduled_times(), Some((Some(0.0), Some(0.01))));
        let calls = native.param("offset").unwrap().scheduled_calls();
        assert_eq!(calls, source.offset().native().scheduled_calls());
    }

    #[test]
    fn test_iir_backend_follows_target_engine() {
        let runtime = Runtime::new();
        let ctx =
            OfflineAudioContext::new(&runtime, 1, 128, 8000.0, EngineProfile::reference()).unwrap();
        let filter = ctx.create_iir_filter(&[0.5, 0.5], &[1.0]).unwrap();
        assert_eq!(filter.native().kind(), NativeNodeKind::IirFilter);

        let legacy = EngineProfile::legacy();
        let target = RenderTarget {
            capabilities: runtime.capabilities(&legacy),
            context: NativeContext::offline(1, 128, 8000.0, legacy).unwrap(),
        };
        let mut visited = VisitedSet::new();
        let native =
            render_node(&ctx.shared.graph.borrow(), filter.id(), &target, &mut visited).unwrap();
        assert_eq!(native.kind(), NativeNodeKind::ScriptProcessor);
    }

    #[test]
    fn test_realtime_graph_has_no_renderers() {
        let runtime = Runtime::new();
        let ctx = AudioContext::new(&runtime, 8000.0, EngineProfile::reference()).unwrap();
        let target = RenderTarget {
            context: NativeContext::offline(1, 128, 8000.0, EngineProfile::reference()).unwrap(),
            capabilities: ctx.capabilities(),
        };
        let mut visited = VisitedSet::new();
        let err = render_node(
            &ctx.shared.graph.borrow(),
            ctx.destination().id(),
            &target,
            &mut visited,
        )
        .unwrap_err();
        assert!(matches!(err, AudioError::InvalidState(_)));
    }
}

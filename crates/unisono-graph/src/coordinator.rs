//! Offline render orchestration.

use unisono_core::{AudioBuffer, AudioError};
use unisono_engine::{Deferred, NativeContext};

use crate::graph::NodeKind;
use crate::node::AudioNode;
use crate::renderer::{RenderTarget, VisitedSet, render_node};

/// Rebuilds the graph behind `destination` inside `target` and renders it.
///
/// The whole graph is rebuilt synchronously before the engine starts. The
/// result is delivered through the engine's deferred result when it has one,
/// through its completion callback otherwise, never both. Either way it is
/// cut to the requested length and channel count.
///
/// Only the first call per context renders; later calls are rejected with
/// InvalidState.
pub fn start_rendering(destination: &AudioNode, target: &NativeContext) -> Deferred<AudioBuffer> {
    let context = destination.context();
    if destination.kind() != NodeKind::Destination {
        return Deferred::rejected(AudioError::invalid_state(format!(
            "{} is not a destination",
            destination.id()
        )));
    }
    if context.shared.rendering_started.replace(true) {
        return Deferred::rejected(AudioError::invalid_state(
            "rendering has already been started",
        ));
    }

    let capabilities = context.runtime().capabilities(target.profile());
    let render_target = RenderTarget {
        context: target.clone(),
        capabilities,
    };
    let mut visited = VisitedSet::new();
    {
        let graph = context.shared.graph.borrow();
        if let Err(err) = render_node(&graph, destination.id(), &render_target, &mut visited) {
            tracing::warn!("render: rebuilding {} failed: {err}", destination.id());
            return Deferred::rejected(err);
        }
    }
    debug_assert!(visited.is_done(destination.id()));
    tracing::debug!(
        "render: rebuilt {} nodes into {}",
        visited.len(),
        target.id()
    );

    let length = target.length();
    let channels = target.number_of_channels();
    let fix = move |mut buffer: AudioBuffer| {
        if buffer.length() > length {
            buffer.truncate(length);
        }
        if buffer.number_of_channels() != channels {
            buffer.set_number_of_channels(channels);
        }
        buffer
    };

    if capabilities.deferred_completion {
        match target.start_rendering() {
            Ok(Some(deferred)) => deferred.map(fix),
            Ok(None) => Deferred::rejected(AudioError::invalid_state(
                "engine returned no render result",
            )),
            Err(err) => Deferred::rejected(err),
        }
    } else {
        let (deferred, resolver) = Deferred::pending();
        target.set_oncomplete(move |buffer| resolver.resolve(fix(buffer)));
        match target.start_rendering() {
            Ok(_) => deferred,
            Err(err) => Deferred::rejected(err),
        }
    }
}

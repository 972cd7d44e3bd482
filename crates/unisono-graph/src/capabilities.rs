//! Engine capability probes.
//!
//! Each capability is detected by exercising the engine on a throwaway
//! context, never by reading its profile. Probing runs once per engine; the
//! [`Runtime`](crate::Runtime) caches the result.

use std::cell::Cell;
use std::rc::Rc;

use unisono_engine::{EngineProfile, NativeContext};

const PROBE_SAMPLE_RATE: f32 = 44100.0;

/// What an engine can do, as observed by probing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `create_iir_filter` produces a native node.
    pub native_iir_filter: bool,
    /// Native params implement `cancel_and_hold_at_time`.
    pub native_cancel_and_hold: bool,
    /// Nodes can still be constructed after the context closed.
    pub constructs_on_closed_context: bool,
    /// Native `get_frequency_response` rejects arrays of different lengths.
    pub checks_response_lengths: bool,
    /// Offline rendering returns a deferred result.
    pub deferred_completion: bool,
    /// Offline rendering fires the completion callback.
    pub event_completion: bool,
    /// Offline results come back longer than requested.
    pub pads_rendered_length: bool,
}

impl Capabilities {
    /// Probes an engine.
    ///
    /// A probe that fails outright is treated as a missing capability.
    pub fn probe(profile: &EngineProfile) -> Self {
        let Ok(ctx) = NativeContext::offline(1, 1, PROBE_SAMPLE_RATE, profile.clone()) else {
            tracing::warn!("capabilities: cannot create probe context for {}", profile.name);
            return Self::none();
        };

        let iir = ctx.create_iir_filter(&[1.0], &[1.0]).ok();
        let native_iir_filter = iir.is_some();
        // Engines without the node have nothing to check.
        let checks_response_lengths = iir.is_none_or(|node| {
            let mut magnitude = [0.0; 1];
            let mut phase = [0.0; 2];
            node.get_frequency_response(&[0.0, 100.0], &mut magnitude, &mut phase)
                .is_err()
        });

        let native_cancel_and_hold = ctx
            .create_gain()
            .ok()
            .and_then(|gain| gain.param("gain"))
            .is_some_and(|param| param.cancel_and_hold_at_time(0.0).is_ok());

        let fired = Rc::new(Cell::new(None));
        let slot = Rc::clone(&fired);
        ctx.set_oncomplete(move |buffer| slot.set(Some(buffer.length())));
        let rendered = ctx.start_rendering().ok().flatten();
        let deferred_completion = rendered.is_some();
        let rendered_length = rendered
            .and_then(|deferred| deferred.try_take())
            .and_then(Result::ok)
            .map(|buffer| buffer.length())
            .or(fired.get());
        let event_completion = fired.get().is_some();
        let pads_rendered_length = rendered_length.is_some_and(|length| length > 1);

        let constructs_on_closed_context = ctx.is_closed() && ctx.create_gain().is_ok();

        let capabilities = Self {
            native_iir_filter,
            native_cancel_and_hold,
            constructs_on_closed_context,
            checks_response_lengths,
            deferred_completion,
            event_completion,
            pads_rendered_length,
        };
        tracing::debug!("capabilities: {} -> {capabilities:?}", profile.name);
        capabilities
    }

    fn none() -> Self {
        Self {
            native_iir_filter: false,
            native_cancel_and_hold: false,
            constructs_on_closed_context: false,
            checks_response_lengths: false,
            deferred_completion: false,
            event_completion: false,
            pads_rendered_length: false,
        }
    }
}

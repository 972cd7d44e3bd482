//! Engine profiles: the quirks a host engine exhibits.
//!
//! Every field describes one divergence between host engines. The engine
//! consults its profile at the exact point where the divergence shows, so
//! two contexts built from different profiles behave like two different
//! hosts.

use serde::{Deserialize, Serialize};

/// How an offline context reports that rendering finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionPaths {
    /// `start_rendering` returns a deferred result; no completion event.
    Deferred,
    /// `start_rendering` returns nothing; the completion callback fires.
    Event,
    /// Both a deferred result and the completion callback.
    #[default]
    Both,
}

impl CompletionPaths {
    /// Returns `true` if `start_rendering` returns a deferred result.
    pub fn has_deferred(self) -> bool {
        matches!(self, Self::Deferred | Self::Both)
    }

    /// Returns `true` if the completion callback fires.
    pub fn has_event(self) -> bool {
        matches!(self, Self::Event | Self::Both)
    }
}

/// The quirk set of one host engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineProfile {
    /// Profile name, used as the capability cache key.
    pub name: String,
    /// The engine can construct IIR filter nodes.
    #[serde(default = "yes")]
    pub native_iir_filter: bool,
    /// The engine implements `cancel_and_hold_at_time`.
    #[serde(default = "yes")]
    pub native_cancel_and_hold: bool,
    /// Node constructors keep working after the context is closed.
    #[serde(default = "yes")]
    pub constructs_on_closed_context: bool,
    /// IIR `get_frequency_response` rejects arrays of different lengths.
    #[serde(default = "yes")]
    pub checks_response_lengths: bool,
    /// Offline render results are padded to a whole render quantum.
    #[serde(default)]
    pub pads_rendered_length: bool,
    /// Completion paths offered by offline rendering.
    #[serde(default)]
    pub completion: CompletionPaths,
}

fn yes() -> bool {
    true
}

impl EngineProfile {
    /// A conforming engine with no quirks.
    pub fn reference() -> Self {
        Self {
            name: "reference".to_string(),
            native_iir_filter: true,
            native_cancel_and_hold: true,
            constructs_on_closed_context: true,
            checks_response_lengths: true,
            pads_rendered_length: false,
            completion: CompletionPaths::Both,
        }
    }

    /// An old engine: no IIR node, no cancel-and-hold, no construction on
    /// closed contexts, unchecked response arrays, padded render results and
    /// event-only completion.
    pub fn legacy() -> Self {
        Self {
            name: "legacy".to_string(),
            native_iir_filter: false,
            native_cancel_and_hold: false,
            constructs_on_closed_context: false,
            checks_response_lengths: false,
            pads_rendered_length: true,
            completion: CompletionPaths::Event,
        }
    }

    /// A modern engine that still lacks cancel-and-hold and refuses
    /// construction on closed contexts.
    pub fn strict() -> Self {
        Self {
            name: "strict".to_string(),
            native_iir_filter: true,
            native_cancel_and_hold: false,
            constructs_on_closed_context: false,
            checks_response_lengths: true,
            pads_rendered_length: false,
            completion: CompletionPaths::Deferred,
        }
    }

    /// All built-in profiles.
    pub fn builtins() -> Vec<Self> {
        vec![Self::reference(), Self::legacy(), Self::strict()]
    }

    /// Looks up a built-in profile by name.
    pub fn builtin(name: &str) -> Option<Self> {
        Self::builtins().into_iter().find(|p| p.name == name)
    }
}

impl Default for EngineProfile {
    fn default() -> Self {
        Self::reference()
    }
}

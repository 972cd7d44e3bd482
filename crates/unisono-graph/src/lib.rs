//! Unisono Graph - one audio-graph API over engines that disagree
//!
//! Host audio engines differ in what they implement and how they deliver
//! results. This crate puts a single graph API in front of any
//! [`unisono_engine`] profile and irons the differences out:
//!
//! - every [`AudioParam`] keeps its own automation record, so automation can
//!   be replayed elsewhere and `cancel_and_hold_at_time` can be emulated
//! - offline graphs are recorded and rebuilt at render time by a memoized
//!   depth-first walk that closes delay feedback loops
//! - IIR filters are faked with a script processor where the engine has none
//! - construction on a closed context is redirected to a substitute context
//! - offline results arrive through one deferred value, cut to the
//!   requested length, whichever completion path the engine offers
//!
//! Engine behaviour is probed once per profile by [`Capabilities::probe`];
//! nothing here reads the profile flags directly.
//!
//! # Example
//!
//! ```rust
//! use unisono_engine::EngineProfile;
//! use unisono_graph::{OfflineAudioContext, Runtime};
//!
//! let runtime = Runtime::new();
//! let ctx = OfflineAudioContext::new(&runtime, 1, 512, 8000.0, EngineProfile::legacy()).unwrap();
//! let source = ctx.create_constant_source().unwrap();
//! source.offset().set_value_at_time(0.0, 0.0).unwrap();
//! source.offset().linear_ramp_to_value_at_time(1.0, 0.064).unwrap();
//! source.connect(&ctx.destination(), 0, 0).unwrap();
//! source.start(0.0).unwrap();
//!
//! let buffer = pollster::block_on(ctx.start_rendering()).unwrap();
//! assert_eq!(buffer.length(), 512);
//! assert!((buffer.get_channel_data(0).unwrap()[256] - 0.5).abs() < 1e-3);
//! ```

pub mod backup;
pub mod capabilities;
pub mod context;
pub mod coordinator;
pub mod faker;
pub mod graph;
mod native;
pub mod node;
pub mod param;
pub mod param_renderer;
mod renderer;
pub mod runtime;

pub use backup::BackupContextRegistry;
pub use capabilities::Capabilities;
pub use context::{AudioContext, BaseAudioContext, OfflineAudioContext};
pub use coordinator::start_rendering;
pub use faker::IirBackend;
pub use graph::{Connection, NodeId, NodeKind, NodeOptions};
pub use node::{
    AudioDestinationNode, AudioNode, ConstantSourceNode, DelayNode, GainNode, IirFilterNode,
    OscillatorNode,
};
pub use param::{AudioParam, CancelAndHoldPath};
pub use param_renderer::ParamRenderer;
pub use runtime::Runtime;

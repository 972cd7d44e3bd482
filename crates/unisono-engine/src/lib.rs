//! Unisono Engine - deterministic software audio engine
//!
//! The engine plays the part of the host audio engine underneath the
//! normalization layer. It implements a small node set with block rendering,
//! and every behaviour that differs between real host engines is switched by
//! an [`EngineProfile`].
//!
//! # Core Abstractions
//!
//! - [`NativeContext`] - Real-time (driven with `advance`) or offline
//!   (rendered once with `start_rendering`) context
//! - [`NativeNode`] - Handle to a node: connections, source scheduling,
//!   IIR frequency response
//! - [`NativeParam`] - Handle to a node parameter with the automation
//!   scheduling methods
//! - [`EngineProfile`] - The quirk set of one host engine
//! - [`Deferred`] - One-shot asynchronous result
//!
//! # Rendering
//!
//! Contexts render in quanta of [`RENDER_QUANTUM_SIZE`] frames. Each quantum
//! pulls the graph depth first from every node; delay nodes break feedback
//! cycles by delaying at least one quantum.
//!
//! # Example
//!
//! ```rust
//! use unisono_engine::{EngineProfile, NativeContext};
//!
//! let ctx = NativeContext::offline(1, 256, 44100.0, EngineProfile::reference()).unwrap();
//! let source = ctx.create_constant_source().unwrap();
//! source.param("offset").unwrap().set_value_at_time(0.5, 0.0).unwrap();
//! source.connect(&ctx.destination(), 0, 0).unwrap();
//! source.start(0.0).unwrap();
//!
//! let rendered = ctx.start_rendering().unwrap().unwrap();
//! let buffer = rendered.try_take().unwrap().unwrap();
//! assert!(buffer.get_channel_data(0).unwrap().iter().all(|&s| s == 0.5));
//! ```

pub mod context;
pub mod deferred;
pub mod node;
pub mod param;
pub mod profile;
mod render;

pub use context::{
    ContextId, ContextKind, ContextState, MAX_CHANNELS, MAX_DELAY_TIME, MAX_SAMPLE_RATE,
    MIN_SAMPLE_RATE, NativeContext,
};
pub use deferred::{Deferred, Resolver};
pub use node::{NativeNode, NativeNodeKind, OscillatorType};
pub use param::NativeParam;
pub use profile::{CompletionPaths, EngineProfile};
pub use unisono_core::RENDER_QUANTUM_SIZE;

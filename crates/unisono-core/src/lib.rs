//! Unisono Core - engine-independent audio graph primitives
//!
//! This crate holds the pieces every unisono layer agrees on, independent of
//! which engine ends up producing samples.
//!
//! # Core Abstractions
//!
//! ## Errors
//!
//! - [`AudioError`] - The three-kind error taxonomy (`NotSupported`,
//!   `InvalidState`, `IndexSize`) with DOM exception codes and names
//!
//! ## Automation
//!
//! - [`AutomationEvent`] - One scheduled parameter change
//! - [`AutomationEventList`] - Ordered per-parameter schedule with cancel
//!   semantics, history flushing and timeline evaluation
//!
//! ## Filters
//!
//! - [`IirCoefficients`] - Validated, normalized IIR transfer function with
//!   frequency response
//! - [`IirFilter`] - Multi-channel IIR recurrence with circular history
//!
//! ## Processing
//!
//! - [`SampleProcessor`] - Object-safe block processor driven by the
//!   engine's script-processor node
//! - [`AudioBuffer`] - Planar multi-channel audio
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible. Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! unisono-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use unisono_core::{AutomationEvent, AutomationEventList};
//!
//! let mut gain = AutomationEventList::new(1.0);
//! gain.add(AutomationEvent::SetValue { value: 0.0, start_time: 0.0 });
//! gain.add(AutomationEvent::LinearRampToValue { value: 1.0, end_time: 2.0 });
//!
//! assert_eq!(gain.value_at(1.0), 0.5);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod automation;
pub mod buffer;
pub mod error;
pub mod iir;
pub mod processor;

pub use automation::{AutomationEvent, AutomationEventList};
pub use buffer::AudioBuffer;
pub use error::{AudioError, Result};
pub use iir::{HISTORY_LENGTH, IirCoefficients, IirFilter, MAX_COEFFICIENTS};
pub use processor::SampleProcessor;

/// Number of frames the engine processes at once.
pub const RENDER_QUANTUM_SIZE: usize = 128;

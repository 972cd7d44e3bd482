//! Engine profile and patch files for unisono.
//!
//! # Features
//!
//! - **Engine profiles**: built-in quirk sets plus TOML profile files for
//!   engines of your own
//! - **Patches**: an offline render described in TOML: nodes, parameter
//!   automation, source schedules and connections
//! - **Validation**: every problem in a patch reported in one pass
//!
//! # Example
//!
//! ```rust
//! use unisono_config::{resolve_engine, Patch};
//! use unisono_graph::Runtime;
//!
//! let patch = Patch::from_toml(r#"
//! name = "tone"
//! sample_rate = 8000
//! length = 256
//! channels = 1
//!
//! [[nodes]]
//! id = "osc"
//! type = "oscillator"
//! start = 0.0
//! [nodes.params.frequency]
//! value = 500.0
//!
//! [[connections]]
//! from = "osc"
//! to = "destination"
//! "#).unwrap();
//!
//! let runtime = Runtime::new();
//! let built = patch.build(&runtime, resolve_engine("legacy").unwrap()).unwrap();
//! let buffer = pollster::block_on(built.context.start_rendering()).unwrap();
//! assert_eq!(buffer.length(), 256);
//! ```

mod error;
mod patch;
mod profile;

/// Patch and profile validation.
pub mod validation;

pub use error::ConfigError;
pub use patch::{
    AutomationConfig, BuiltPatch, ConnectionConfig, DESTINATION, NodeConfig, NodeSpec,
    ParamConfig, Patch,
};
pub use profile::{
    builtin_engine_names, load_profile, profile_from_toml, profile_to_toml, resolve_engine,
    save_profile,
};
pub use validation::{ValidationError, ValidationResult, validate_patch, validate_profile};

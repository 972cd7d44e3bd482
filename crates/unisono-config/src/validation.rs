//! Patch and engine profile validation.
//!
//! Validation catches what would otherwise surface half way through a build:
//! dangling connections, unknown parameters, out-of-range render settings and
//! malformed IIR coefficients. Problems are collected, not short-circuited,
//! so one pass reports all of them.
//!
//! # Example
//!
//! ```rust
//! use unisono_config::{Patch, validate_patch};
//!
//! let patch = Patch::new("empty", 128);
//! validate_patch(&patch).expect("an empty patch is valid");
//! ```

use std::collections::HashSet;
use thiserror::Error;

use unisono_core::IirCoefficients;
use unisono_engine::{EngineProfile, MAX_CHANNELS, MAX_DELAY_TIME, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};

use crate::patch::{DESTINATION, NodeSpec, Patch};

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Two nodes share an id, or a node uses the reserved destination id.
    #[error("duplicate or reserved node id: {0}")]
    DuplicateNode(String),

    /// A connection names a node that does not exist.
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    /// Unknown parameter name.
    #[error("unknown parameter '{param}' for node '{node}'")]
    UnknownParameter {
        /// Id of the node.
        node: String,
        /// Name of the unrecognized parameter.
        param: String,
    },

    /// Numeric setting out of range.
    #[error("'{field}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Name of the setting.
        field: String,
        /// The value that was out of range.
        value: f64,
        /// Minimum allowed value.
        min: f64,
        /// Maximum allowed value.
        max: f64,
    },

    /// Structurally invalid setting.
    #[error("invalid '{field}': {reason}")]
    InvalidFormat {
        /// Name of the setting.
        field: String,
        /// Description of the problem.
        reason: String,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn collapse(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

fn check_range(errors: &mut Vec<ValidationError>, field: &str, value: f64, min: f64, max: f64) {
    if !(min..=max).contains(&value) {
        errors.push(ValidationError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        });
    }
}

/// Validates every part of a patch.
pub fn validate_patch(patch: &Patch) -> ValidationResult<()> {
    let mut errors = Vec::new();

    check_range(
        &mut errors,
        "sample_rate",
        f64::from(patch.sample_rate),
        f64::from(MIN_SAMPLE_RATE),
        f64::from(MAX_SAMPLE_RATE),
    );
    check_range(
        &mut errors,
        "channels",
        patch.channels as f64,
        1.0,
        MAX_CHANNELS as f64,
    );
    if patch.length == 0 {
        errors.push(ValidationError::InvalidFormat {
            field: "length".to_string(),
            reason: "must be at least one frame".to_string(),
        });
    }

    let mut ids = HashSet::new();
    for node in &patch.nodes {
        if node.id == DESTINATION || !ids.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNode(node.id.clone()));
        }

        for param in node.params.keys() {
            if !node.spec.param_names().contains(&param.as_str()) {
                errors.push(ValidationError::UnknownParameter {
                    node: node.id.clone(),
                    param: param.clone(),
                });
            }
        }

        if let NodeSpec::Delay { max_delay_time } = node.spec
            && !(max_delay_time > 0.0 && max_delay_time < MAX_DELAY_TIME)
        {
            errors.push(ValidationError::OutOfRange {
                field: format!("{}.max_delay_time", node.id),
                value: max_delay_time,
                min: 0.0,
                max: MAX_DELAY_TIME,
            });
        }
        if let NodeSpec::IirFilter {
            feedforward,
            feedback,
        } = &node.spec
            && let Err(err) = IirCoefficients::validate(feedforward, feedback)
        {
            errors.push(ValidationError::InvalidFormat {
                field: format!("{}.coefficients", node.id),
                reason: err.to_string(),
            });
        }

        match (node.start, node.stop) {
            (Some(_), _) | (_, Some(_)) if !node.spec.is_source() => {
                errors.push(ValidationError::InvalidFormat {
                    field: format!("{}.start", node.id),
                    reason: format!("{} nodes cannot be scheduled", node.spec.type_name()),
                });
            }
            (None, Some(_)) => errors.push(ValidationError::InvalidFormat {
                field: format!("{}.stop", node.id),
                reason: "stop without start".to_string(),
            }),
            (Some(start), stop) => {
                check_range(&mut errors, &format!("{}.start", node.id), start, 0.0, f64::MAX);
                if let Some(stop) = stop {
                    check_range(&mut errors, &format!("{}.stop", node.id), stop, start, f64::MAX);
                }
            }
            (None, None) => {}
        }
    }

    for connection in &patch.connections {
        if connection.from == DESTINATION || !ids.contains(connection.from.as_str()) {
            errors.push(ValidationError::UnknownNode(connection.from.clone()));
        }
        if connection.to != DESTINATION && !ids.contains(connection.to.as_str()) {
            errors.push(ValidationError::UnknownNode(connection.to.clone()));
        }
    }

    collapse(errors)
}

/// Validates a user-supplied engine profile.
///
/// Capabilities are cached by profile name, so a file may not reuse a
/// built-in name with different quirks.
pub fn validate_profile(profile: &EngineProfile) -> ValidationResult<()> {
    let mut errors = Vec::new();
    if profile.name.trim().is_empty() {
        errors.push(ValidationError::InvalidFormat {
            field: "name".to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if let Some(builtin) = EngineProfile::builtin(&profile.name)
        && builtin != *profile
    {
        errors.push(ValidationError::InvalidFormat {
            field: "name".to_string(),
            reason: format!("'{}' is a built-in engine with different quirks", profile.name),
        });
    }
    if profile.name.contains(['/', '\\']) {
        errors.push(ValidationError::InvalidFormat {
            field: "name".to_string(),
            reason: "must not contain path separators".to_string(),
        });
    }
    collapse(errors)
}

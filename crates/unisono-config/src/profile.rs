//! Engine profile files.
//!
//! A profile file is the TOML form of [`EngineProfile`]. Omitted quirk flags
//! take their conforming values, so a file only lists what differs:
//!
//! ```toml
//! name = "old-browser"
//! native_iir_filter = false
//! completion = "event"
//! ```

use std::path::Path;

use unisono_engine::EngineProfile;

use crate::error::ConfigError;
use crate::validation::validate_profile;

/// Load a profile from a TOML file.
pub fn load_profile(path: impl AsRef<Path>) -> Result<EngineProfile, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    let profile = profile_from_toml(&content)?;
    tracing::debug!("profile: loaded '{}' from {}", profile.name, path.display());
    Ok(profile)
}

/// Parse and validate a profile from a TOML string.
pub fn profile_from_toml(toml_str: &str) -> Result<EngineProfile, ConfigError> {
    let profile: EngineProfile = toml::from_str(toml_str)?;
    validate_profile(&profile)?;
    Ok(profile)
}

/// Save a profile to a TOML file.
pub fn save_profile(profile: &EngineProfile, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
    }
    let content = profile_to_toml(profile)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
    Ok(())
}

/// Convert a profile to a TOML string.
pub fn profile_to_toml(profile: &EngineProfile) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(profile)?)
}

/// Resolves an engine given on a command line or in a config.
///
/// Built-in names (`reference`, `legacy`, `strict`) win; anything else is
/// read as a profile file path.
pub fn resolve_engine(name_or_path: &str) -> Result<EngineProfile, ConfigError> {
    if let Some(profile) = EngineProfile::builtin(name_or_path) {
        return Ok(profile);
    }
    let path = Path::new(name_or_path);
    if path.is_file() {
        return load_profile(path);
    }
    Err(ConfigError::UnknownEngine(name_or_path.to_string()))
}

/// Names of the built-in profiles.
pub fn builtin_engine_names() -> Vec<String> {
    EngineProfile::builtins()
        .into_iter()
        .map(|profile| profile.name)
        .collect()
}

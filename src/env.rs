//! Environment variable expansion for configuration values
//!
//! Configuration strings may reference variables as `${VAR_NAME}` or
//! `$VAR_NAME`, and may start with `~/` for the home directory. This also
//! locates the default configuration file under the XDG config directory.

use once_cell::sync::Lazy;
use regex::Regex;
use std::env;
use std::path::PathBuf;

use crate::config::ConfigError;

/// Matches `${VAR}` (group 1) or `$VAR` (group 2)
static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

/// Expand variable references and a leading `~/`.
///
/// Every missing variable is reported in a single error.
pub fn expand_vars(input: &str) -> Result<String, ConfigError> {
    let mut missing_vars: Vec<String> = Vec::new();

    let expanded = ENV_VAR_PATTERN.replace_all(input, |caps: &regex::Captures| {
        let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        match env::var(name) {
            Ok(value) => value,
            Err(_) => {
                if !missing_vars.iter().any(|v| v == name) {
                    missing_vars.push(name.to_string());
                }
                String::new()
            }
        }
    });

    if !missing_vars.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Missing environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    match expanded.strip_prefix("~/") {
        Some(rest) => {
            let home = env::var("HOME").map_err(|_| {
                ConfigError::ValidationError("HOME is not set, can't expand '~'".to_string())
            })?;
            Ok(format!("{}/{}", home.trim_end_matches('/'), rest))
        }
        None => Ok(expanded.into_owned()),
    }
}

/// `$XDG_CONFIG_HOME`, falling back to `$HOME/.config`
pub fn config_home() -> Option<PathBuf> {
    match env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")),
    }
}

/// Default location of the configuration file
pub fn default_config_path() -> Option<PathBuf> {
    config_home().map(|dir| dir.join("gio-adapter").join("config.yaml"))
}

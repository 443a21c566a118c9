use anyhow::{anyhow, Result};
use thiserror::Error;

/// This trait describes interaction with the configuration for shotty.
///
/// General settings live at the top level; credentials live in named
/// profiles. Keys that belong to a profile are looked up under the profile
/// passed in, everything else ignores it.
pub trait Config: Send + Sync {
    /// Returns a value from the configuration by its key.
    fn get(&self, profile: &str, key: &str) -> Result<String>;
    /// Returns a value from the configuration by its key, with the source.
    fn get_with_source(&self, profile: &str, key: &str) -> Result<(String, String)>;
    /// Sets a value in the configuration by its key.
    fn set(&mut self, profile: &str, key: &str, value: &str) -> Result<()>;

    /// Get the names of all profiles.
    fn profiles(&self) -> Result<Vec<String>>;
    /// Get the default profile.
    fn default_profile(&self) -> Result<String>;
    /// Get the default profile with the source.
    fn default_profile_with_source(&self) -> Result<(String, String)>;

    /// Check if the configuration can be written to.
    fn check_writable(&self, profile: &str, key: &str) -> Result<()>;
    /// Write the configuration.
    fn write(&self) -> Result<()>;

    /// Return the string representation of the config.
    fn config_to_string(&self) -> Result<String>;
    /// Return the string representation of the profiles.
    fn profiles_to_string(&self) -> Result<String>;
}

pub struct ConfigOption {
    pub key: String,
    pub description: String,
    pub default_value: String,
    pub allowed_values: Vec<String>,
    pub per_profile: bool,
}

pub fn config_options() -> Vec<ConfigOption> {
    vec![
        ConfigOption {
            key: "wait_timeout".to_string(),
            description: "seconds to wait for an instance to stop or start".to_string(),
            default_value: "600".to_string(),
            allowed_values: vec![],
            per_profile: false,
        },
        ConfigOption {
            key: "poll_interval".to_string(),
            description: "seconds between instance state checks while waiting".to_string(),
            default_value: "5".to_string(),
            allowed_values: vec![],
            per_profile: false,
        },
        ConfigOption {
            key: "max_retries".to_string(),
            description: "how many times to retry a throttled or unavailable provider call".to_string(),
            default_value: "3".to_string(),
            allowed_values: vec![],
            per_profile: false,
        },
        ConfigOption {
            key: "color".to_string(),
            description: "toggle colored output in the terminal".to_string(),
            default_value: "enabled".to_string(),
            allowed_values: vec!["enabled".to_string(), "disabled".to_string()],
            per_profile: false,
        },
        ConfigOption {
            key: "host".to_string(),
            description: "the compute API host for the profile".to_string(),
            default_value: "".to_string(),
            allowed_values: vec![],
            per_profile: true,
        },
        ConfigOption {
            key: "token".to_string(),
            description: "the API token for the profile".to_string(),
            default_value: "".to_string(),
            allowed_values: vec![],
            per_profile: true,
        },
        ConfigOption {
            key: "region".to_string(),
            description: "the region requests are scoped to".to_string(),
            default_value: "".to_string(),
            allowed_values: vec![],
            per_profile: true,
        },
        ConfigOption {
            key: "default".to_string(),
            description: "use this profile when none is given".to_string(),
            default_value: "false".to_string(),
            allowed_values: vec!["true".to_string(), "false".to_string()],
            per_profile: true,
        },
    ]
}

/// Returns the option for a key, if it is a known key.
pub fn find_option(key: &str) -> Option<ConfigOption> {
    config_options().into_iter().find(|o| o.key == key)
}

/// One line per known key with its description, for error messages.
pub fn known_keys() -> String {
    config_options()
        .iter()
        .map(|o| {
            let scope = if o.per_profile { " (per profile)" } else { "" };
            format!("  {}: {}{}", o.key, o.description, scope)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn is_profile_key(key: &str) -> bool {
    find_option(key).map(|o| o.per_profile).unwrap_or(false)
}

pub fn validate_key(key: &str) -> Result<()> {
    match find_option(key) {
        Some(_) => Ok(()),
        None => Err(anyhow!("invalid key")),
    }
}

#[derive(Error, Debug)]
pub enum InvalidValueError {
    #[error("invalid values, valid values: {0:?}")]
    ValidValues(Vec<String>),
    #[error("{0} must be a whole number")]
    NotANumber(String),
}

pub fn validate_value(key: &str, value: &str) -> Result<()> {
    if matches!(key, "wait_timeout" | "poll_interval" | "max_retries") && value.parse::<u64>().is_err() {
        return Err(InvalidValueError::NotANumber(key.to_string()).into());
    }

    let valid_values = match find_option(key) {
        Some(option) => option.allowed_values,
        None => return Ok(()),
    };

    if valid_values.is_empty() || valid_values.iter().any(|v| v == value) {
        return Ok(());
    }

    Err(InvalidValueError::ValidValues(valid_values).into())
}

pub fn new_blank_root() -> Result<toml_edit::Document> {
    Ok(r#"# Seconds to wait for an instance to stop or start.
wait_timeout = "600"

# Seconds between instance state checks while waiting.
poll_interval = "5"

# How many times to retry a throttled or unavailable provider call.
max_retries = "3"

# What color output to use. Supported values: enabled, disabled.
color = "enabled"
"#
    .parse::<toml_edit::Document>()?)
}

pub fn new_config(root: toml_edit::Document) -> crate::config_from_file::FileConfig {
    crate::config_from_file::FileConfig {
        map: crate::config_map::ConfigMap {
            root: root.as_table().clone(),
        },
    }
}

pub fn new_blank_config() -> Result<crate::config_from_file::FileConfig> {
    let root = new_blank_root()?;
    Ok(new_config(root))
}

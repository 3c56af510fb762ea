//! Configuration loader with environment variable expansion

use super::{expand_env_vars, Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse, expand `${VAR}` references and validate
    ///
    /// Expansion runs on string scalars after parsing, so environment values
    /// are taken verbatim and never read as YAML. Placeholders therefore only
    /// work in string fields.
    pub fn parse(content: &str) -> Result<Config, ConfigError> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(content)?;
        expand_value(&mut value);
        let config: Config = serde_yaml::from_value(value)?;
        config.validate()?;
        Ok(config)
    }
}

fn expand_value(value: &mut serde_yaml::Value) {
    match value {
        serde_yaml::Value::String(s) => *s = expand_env_vars(s),
        serde_yaml::Value::Sequence(items) => items.iter_mut().for_each(expand_value),
        serde_yaml::Value::Mapping(map) => map.iter_mut().for_each(|(_, v)| expand_value(v)),
        serde_yaml::Value::Tagged(tagged) => expand_value(&mut tagged.value),
        _ => {}
    }
}

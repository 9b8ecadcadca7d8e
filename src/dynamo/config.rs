//! Flat key=value configuration loaded from `dynamo.properties`
//!
//! The file is parsed once at startup and the resulting [`Config`] is
//! threaded through every constructor. Components ask only for their own
//! keys; nothing re-reads the file.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default configuration filename, resolved against the working directory.
pub const DEFAULT_PROPERTIES_FILE: &str = "dynamo.properties";

/// Typed lookup over the parsed properties file.
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: HashMap<String, String>,
}

#[derive(Debug)]
pub enum ConfigError {
    /// The properties file exists but could not be read
    Io(std::io::Error),
    /// A line did not parse as `key=value`
    Malformed { line: usize, content: String },
    /// A value failed to parse as the requested type
    Invalid { key: String, value: String },
    /// A required key is absent or empty
    Missing(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "Failed to read properties file: {}", err),
            ConfigError::Malformed { line, content } => {
                write!(f, "Malformed property on line {}: {}", line, content)
            }
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value for {}: {}", key, value)
            }
            ConfigError::Missing(key) => write!(f, "Missing required property: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl Config {
    /// Parse a properties file. A missing file yields an empty
    /// configuration so engine and codec defaults still apply; sinks with
    /// required keys surface their own errors at construction.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!(
                "Properties file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse properties from a string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();

        for (index, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            match line.split_once('=') {
                Some((key, value)) => {
                    values.insert(key.trim().to_string(), value.trim().to_string());
                }
                None => {
                    return Err(ConfigError::Malformed {
                        line: index + 1,
                        content: line.to_string(),
                    });
                }
            }
        }

        Ok(Config { values })
    }

    /// Build a configuration directly from key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Config {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a raw value. Empty values count as absent, matching the
    /// original properties semantics.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Look up a required value.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    /// Look up and parse a value, returning `None` when the key is absent.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    /// Look up and parse a value, falling back to a default.
    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.get_parsed(key)?.unwrap_or(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_properties() {
        let config = Config::parse(
            "# comment\n\
             Serialization.Format=json\n\
             Engines.Quantity.Quantity = 500\n\
             \n\
             ! another comment\n\
             Handlers.File.Path=/tmp/out\n",
        )
        .unwrap();

        assert_eq!(config.get("Serialization.Format"), Some("json"));
        assert_eq!(config.get("Handlers.File.Path"), Some("/tmp/out"));
        assert_eq!(
            config.get_parsed::<u64>("Engines.Quantity.Quantity").unwrap(),
            Some(500)
        );
    }

    #[test]
    fn test_empty_value_counts_as_absent() {
        let config = Config::parse("Engines.Replay.Path=\n").unwrap();
        assert_eq!(config.get("Engines.Replay.Path"), None);
        assert!(config.require("Engines.Replay.Path").is_err());
    }

    #[test]
    fn test_malformed_line_rejected() {
        let err = Config::parse("not a property\n").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_invalid_parse_reports_key() {
        let config = Config::parse("Engines.Quantity.Threads=lots\n").unwrap();
        let err = config.get_parsed::<usize>("Engines.Quantity.Threads").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_missing_file_is_empty_config() {
        let config = Config::load("/definitely/not/here/dynamo.properties").unwrap();
        assert_eq!(config.get("anything"), None);
    }
}

use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf, time::Duration};
use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- FactoryConfig ---------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FactoryConfig {
    /// Timeout applied when physically closing a channel.
    #[serde(deserialize_with = "de_duration")]
    pub close_timeout: Duration,

    /// Enable confirm mode on every fresh non-transactional channel.
    pub simple_publisher_confirms: bool,

    /// Build the implicit publisher peer factory. The peer itself is
    /// always constructed with this set to false.
    pub publisher_factory: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            close_timeout: Duration::from_secs(30),
            simple_publisher_confirms: false,
            publisher_factory: true,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- FactoryConfig: Static -------------------------------------------------

impl FactoryConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let cfg: FactoryConfig =
            toml::from_str(raw).map_err(|e| ConfigError::Toml { source: e })?;
        cfg.validate()?;
        Ok(cfg)
    }
}

// -----------------------------------------------------------------------------
// ----- FactoryConfig: Private ------------------------------------------------

impl FactoryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.close_timeout.is_zero() {
            return Err(ConfigError::InvalidField("close_timeout"));
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

/// Accepts integer milliseconds (e.g., 30000) or a humantime string
/// (e.g., "30s").
fn de_duration<'de, D>(d: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{Error, Unexpected, Visitor};
    use std::fmt;

    struct DurVisitor;

    impl<'de> Visitor<'de> for DurVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("integer milliseconds (e.g., 30000) or a duration string (e.g., \"30s\")")
        }

        fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Duration::from_millis(v))
        }

        fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
            if v < 0 {
                return Err(E::invalid_value(Unexpected::Signed(v), &self));
            }
            Ok(Duration::from_millis(v as u64))
        }

        fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
            humantime::parse_duration(v)
                .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    d.deserialize_any(DurVisitor)
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {source}")]
    Toml { source: toml::de::Error },

    #[error("invalid config field: {0}")]
    InvalidField(&'static str),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------

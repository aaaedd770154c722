//! Configuration for the state store, the processing provider and the
//! latency analysis.
use crate::attribute::AttributeName;
use crate::error::{Result, StateError};
use crate::types::Timestamp;
use serde::de::Error;
use std::path::Path;

/// Store configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Start of the store's time range. When unset, the first modification
    /// defines it.
    #[serde(default)]
    pub start_time: Option<Timestamp>,

    /// Capacity hint for the number of attributes
    #[serde(default = "Config::default_attribute_capacity")]
    pub attribute_capacity: usize,

    /// Capacity hint for closed intervals per attribute
    #[serde(default = "Config::default_interval_capacity")]
    pub interval_capacity: usize,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub segments: SegmentConfig,
}

/// Attribute names used by the processing state provider
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Top-level attribute holding one child per requester
    #[serde(default = "ProviderConfig::default_root_attribute")]
    pub root_attribute: String,

    /// Leaf attribute receiving the optional `value` field of process events
    #[serde(default = "ProviderConfig::default_value_attribute")]
    pub value_attribute: String,
}

impl ProviderConfig {
    fn default_root_attribute() -> String {
        "Requester".to_string()
    }

    fn default_value_attribute() -> String {
        "number".to_string()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            root_attribute: Self::default_root_attribute(),
            value_attribute: Self::default_value_attribute(),
        }
    }
}

/// Latency analysis settings
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentConfig {
    /// Name given to every emitted processing segment
    #[serde(default = "SegmentConfig::default_segment_name")]
    pub segment_name: String,
}

impl SegmentConfig {
    fn default_segment_name() -> String {
        "PROCESSING".to_string()
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            segment_name: Self::default_segment_name(),
        }
    }
}

impl Config {
    const fn default_attribute_capacity() -> usize {
        64
    }

    const fn default_interval_capacity() -> usize {
        16
    }

    pub fn with_start_time(mut self, start_time: Timestamp) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_attribute_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "Attribute capacity must be greater than zero");

        if capacity > 1_000_000 {
            log::warn!(
                "Attribute capacity of {} is very large and will be reserved up front.",
                capacity
            );
        }

        self.attribute_capacity = capacity;
        self
    }

    pub fn with_interval_capacity(mut self, capacity: usize) -> Self {
        self.interval_capacity = capacity;
        self
    }

    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_segments(mut self, segments: SegmentConfig) -> Self {
        self.segments = segments;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.attribute_capacity == 0 {
            return Err("Attribute capacity must be greater than zero".to_string());
        }

        for (field, name) in [
            ("provider.root_attribute", &self.provider.root_attribute),
            ("provider.value_attribute", &self.provider.value_attribute),
            ("segments.segment_name", &self.segments.segment_name),
        ] {
            if name.is_empty() {
                return Err(format!("{} cannot be empty", field));
            }
        }

        // Names become attribute path segments, so apply the tree's rules
        for (field, name) in [
            ("provider.root_attribute", &self.provider.root_attribute),
            ("provider.value_attribute", &self.provider.value_attribute),
        ] {
            AttributeName::parse(name.as_str()).map_err(|e| format!("{}: {}", field, e))?;
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load a configuration file. `.toml` files need the `toml` feature;
    /// anything else is read as JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            #[cfg(feature = "toml")]
            Some("toml") => Ok(Self::from_toml(&contents)?),
            #[cfg(not(feature = "toml"))]
            Some("toml") => Err(StateError::Config(format!(
                "{} is a TOML file but the `toml` feature is disabled",
                path.display()
            ))),
            _ => Ok(Self::from_json(&contents)?),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_time: None,
            attribute_capacity: Self::default_attribute_capacity(),
            interval_capacity: Self::default_interval_capacity(),
            provider: ProviderConfig::default(),
            segments: SegmentConfig::default(),
        }
    }
}

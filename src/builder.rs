//! State system builder
//!
//! Collects configuration from code or from a config file before creating a
//! [`StateSystem`].

use crate::config::{Config, ProviderConfig, SegmentConfig};
use crate::error::{Result, StateError};
use crate::system::StateSystem;
use crate::types::Timestamp;
use std::path::PathBuf;

/// Builder for [`StateSystem`].
///
/// ```rust
/// use statehistory::StateSystemBuilder;
///
/// let ss = StateSystemBuilder::new()
///     .start_time(0)
///     .attribute_capacity(1024)
///     .build()?;
/// assert_eq!(ss.start_time(), Some(0));
/// # Ok::<(), statehistory::StateError>(())
/// ```
#[derive(Debug)]
pub struct StateSystemBuilder {
    config_path: Option<PathBuf>,
    config: Config,
}

impl StateSystemBuilder {
    pub fn new() -> Self {
        Self {
            config_path: None,
            config: Config::default(),
        }
    }

    /// Load the configuration from a JSON or TOML file at build time.
    /// Settings applied after this call are ignored.
    pub fn config_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self.config_path = None;
        self
    }

    pub fn start_time(mut self, start_time: Timestamp) -> Self {
        self.config.start_time = Some(start_time);
        self
    }

    pub fn attribute_capacity(mut self, capacity: usize) -> Self {
        self.config.attribute_capacity = capacity;
        self
    }

    pub fn interval_capacity(mut self, capacity: usize) -> Self {
        self.config.interval_capacity = capacity;
        self
    }

    pub fn provider(mut self, provider: ProviderConfig) -> Self {
        self.config.provider = provider;
        self
    }

    pub fn segments(mut self, segments: SegmentConfig) -> Self {
        self.config.segments = segments;
        self
    }

    pub fn build(self) -> Result<StateSystem> {
        let config = match self.config_path {
            Some(path) => {
                log::debug!("loading state system config from {}", path.display());
                Config::from_file(&path)?
            }
            None => self.config,
        };
        config.validate().map_err(StateError::Config)?;
        Ok(StateSystem::from_valid_config(config))
    }
}

impl Default for StateSystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

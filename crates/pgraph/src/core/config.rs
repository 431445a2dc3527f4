//! # Scene Graph Configuration
//!
//! Runtime settings for the pipelined scene graph. A [`GraphConfig`] is
//! loaded from TOML or RON through the [`Config`] trait and handed to
//! [`Pipeline::from_config`](crate::pipeline::Pipeline::from_config), which
//! owns it for the lifetime of every node created on that pipeline.
//!
//! ## Settings
//!
//! - **Pipeline stages**: how many frames of latency separate the
//!   application thread from the cull/draw threads
//! - **Unambiguous graph**: escalate ambiguous instance resolution from a
//!   warning to an error
//! - **Bounds type**: the volume kind nodes compute by default
//! - **Log level**: default filter for binaries that initialise logging

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};
use crate::bounds::BoundingVolumeType;

/// Largest supported pipeline depth
pub const MAX_PIPELINE_STAGES: usize = 8;

/// # Graph Configuration
///
/// Settings consumed when constructing a pipeline and its nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Number of pipeline stages (1 disables pipelining)
    pub num_pipeline_stages: usize,
    /// Treat an ambiguous generic component as an error rather than a warning
    pub unambiguous_graph: bool,
    /// Bounding volume kind computed for nodes that don't choose one
    pub bounds_type: BoundingVolumeType,
    /// Default log filter ("error", "warn", "info", "debug", "trace")
    pub log_level: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            num_pipeline_stages: 1,
            unambiguous_graph: false,
            bounds_type: BoundingVolumeType::Sphere,
            log_level: "info".to_string(),
        }
    }
}

impl GraphConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the number of pipeline stages
    pub fn with_pipeline_stages(mut self, stages: usize) -> Self {
        self.num_pipeline_stages = stages;
        self
    }

    /// Builder: escalate ambiguous path resolution to an error
    pub fn with_unambiguous_graph(mut self, unambiguous: bool) -> Self {
        self.unambiguous_graph = unambiguous;
        self
    }

    /// Builder: set the default bounding volume kind
    pub fn with_bounds_type(mut self, bounds_type: BoundingVolumeType) -> Self {
        self.bounds_type = bounds_type;
        self
    }

    /// Builder: set the default log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.num_pipeline_stages == 0 {
            return Err("num_pipeline_stages must be at least 1".to_string());
        }

        if self.num_pipeline_stages > MAX_PIPELINE_STAGES {
            return Err(format!(
                "num_pipeline_stages {} exceeds the maximum of {}",
                self.num_pipeline_stages, MAX_PIPELINE_STAGES
            ));
        }

        if self.bounds_type == BoundingVolumeType::Default {
            return Err("bounds_type must name a concrete volume kind".to_string());
        }

        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(format!("unknown log level '{}'", self.log_level));
        }

        Ok(())
    }

    /// Load from file and validate in one step
    pub fn load_validated(path: &str) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

impl Config for GraphConfig {}

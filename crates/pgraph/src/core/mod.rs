//! Core runtime settings shared by the pipeline and the scene graph

pub mod config;

pub use config::{GraphConfig, MAX_PIPELINE_STAGES};

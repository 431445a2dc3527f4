//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the scene graph:
//! - Math types and helpers on top of nalgebra
//! - Logging utilities

pub mod math;
pub mod logging;

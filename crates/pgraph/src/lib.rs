//! # pgraph
//!
//! A multi-threaded, pipelined scene graph core.
//!
//! ## Features
//!
//! - **Pipelined stages**: every node keeps one copy-on-write record per
//!   pipeline stage, so the application thread can edit frame N while cull
//!   and draw threads read frames N-1 and N-2
//! - **Instancing**: a node may have many parents; `NodePath`s name one
//!   specific route to it
//! - **Lazy aggregates**: bounds, net collide masks and disabled clip planes
//!   are invalidated upward on edit and recomputed on the next read
//! - **Bam records**: nodes write and read themselves through a pluggable
//!   stream collaborator
//!
//! ## Quick Start
//!
//! ```rust
//! use pgraph::prelude::*;
//!
//! let pipeline = Pipeline::single_stage();
//! let root = NodePath::new(&PandaNode::new(&pipeline, "render"));
//! let model = root.attach_new_node(&PandaNode::new(&pipeline, "model"), 0);
//! assert_eq!(model.get_num_nodes(), 2);
//! assert_eq!(model.to_string(), "/render/model");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate, clippy::missing_panics_doc)]

pub mod foundation;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod bounds;
pub mod attrib;
pub mod scene;
pub mod bam;
pub mod error;

pub use error::{GraphError, GraphResult};

/// Common imports for scene graph users
pub mod prelude {
    pub use crate::{
        attrib::{AttribSlot, ClipPlaneAttrib, RenderAttrib, RenderEffect, RenderEffects, RenderState, TransformState},
        bam::{read_stream, BamError, MemoryBamWriter},
        bounds::{BoundingVolume, BoundingVolumeType},
        config::Config,
        core::GraphConfig,
        error::{GraphError, GraphResult},
        foundation::math::{Mat4, Vec3},
        pipeline::{current_stage, enter_stage, Pipeline, StageRange},
        scene::{CollideMask, DrawMask, NodeKind, NodePath, NodePathComponent, PandaNode},
    };
}

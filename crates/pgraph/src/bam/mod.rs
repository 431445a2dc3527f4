//! # Bam serialization
//!
//! Nodes write themselves as a flat record plus pointers to other objects.
//! The collaborator owning the stream decides how pointers are encoded:
//!
//! - Writing: [`BamWriter::write_pointer`] encodes a reference, and
//!   [`BamWriter::has_object`] tells a node which parents are part of the
//!   stream.
//! - Reading happens in two passes. [`PandaNode::fillin`] reads the record
//!   and lets the [`BamReader`] note every pointer. Once all objects exist
//!   the reader resolves those pointers and hands them back, in the order
//!   they were read, to [`PandaNode::complete_pointers`].
//!
//! [`MemoryBamWriter`] and [`read_stream`] are an in-process collaborator
//! pair.
//!
//! [`PandaNode::fillin`]: crate::scene::PandaNode::fillin
//! [`PandaNode::complete_pointers`]: crate::scene::PandaNode::complete_pointers

pub mod datagram;
pub mod memory;
mod node_io;

pub use datagram::{Datagram, DatagramIterator};
pub use memory::{read_stream, BamStream, MemoryBamWriter};

use std::sync::Arc;

use crate::attrib::{RenderEffects, RenderState, TransformState};
use crate::scene::PandaNode;

/// Failures reading or writing a Bam stream
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BamError {
    /// A record resolved a different number of pointers than it read
    #[error("expected {expected} pointers, found {found}")]
    PointerCountMismatch {
        /// Pointers the record needs
        expected: usize,
        /// Pointers supplied
        found: usize,
    },

    /// A pointer resolved to the wrong kind of object
    #[error("expected a {expected} pointer, found {found}")]
    UnexpectedObject {
        /// Kind the record needs at this position
        expected: &'static str,
        /// Kind supplied
        found: &'static str,
    },

    /// A read ran past the end of its record
    #[error("record truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes the read needed
        needed: usize,
        /// Bytes left in the record
        remaining: usize,
    },

    /// A string field held invalid UTF-8
    #[error("string is not valid UTF-8")]
    InvalidString,

    /// A pointer named an id the stream doesn't hold
    #[error("no object with id {0}")]
    UnknownObject(u32),

    /// A string or list is too long for its length prefix
    #[error("length {len} exceeds the record limit of {max}")]
    TooLong {
        /// Actual length
        len: usize,
        /// Largest encodable length
        max: usize,
    },
}

/// A reference being written
#[derive(Clone, Copy)]
#[allow(missing_docs)]
pub enum BamObjectRef<'a> {
    Node(&'a Arc<PandaNode>),
    State(&'a Arc<RenderState>),
    Effects(&'a Arc<RenderEffects>),
    Transform(&'a Arc<TransformState>),
}

/// A resolved pointer handed back while reading
#[derive(Clone)]
pub enum BamObject {
    /// A node in the stream
    Node(Arc<PandaNode>),
    /// A shared render state
    State(Arc<RenderState>),
    /// A shared effect set
    Effects(Arc<RenderEffects>),
    /// A shared transform
    Transform(Arc<TransformState>),
    /// A null pointer, or one to an object outside the stream
    Null,
}

impl BamObject {
    /// Name of the object kind, for error reports
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Node(_) => "PandaNode",
            Self::State(_) => "RenderState",
            Self::Effects(_) => "RenderEffects",
            Self::Transform(_) => "TransformState",
            Self::Null => "null",
        }
    }
}

/// Stream side of writing objects
pub trait BamWriter {
    /// Whether `node` is written to this stream
    fn has_object(&self, node: &PandaNode) -> bool;

    /// Encode a reference to `object` into `datagram`
    fn write_pointer(&mut self, datagram: &mut Datagram, object: BamObjectRef<'_>);
}

/// Stream side of reading objects
pub trait BamReader {
    /// Consume one encoded reference from `scan` and remember it for pointer completion
    fn read_pointer(&mut self, scan: &mut DatagramIterator<'_>) -> Result<(), BamError>;
}

/// What a node read in `fillin` but can't resolve until every object exists
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingPointers {
    pub(crate) num_up: usize,
    pub(crate) down_sorts: Vec<i32>,
    pub(crate) stashed_sorts: Vec<i32>,
}

impl PendingPointers {
    /// State, effects and transform, then one per edge
    pub(crate) fn num_pointers(&self) -> usize {
        3 + self.num_up + self.down_sorts.len() + self.stashed_sorts.len()
    }
}

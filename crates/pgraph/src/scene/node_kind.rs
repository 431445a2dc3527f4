//! Per-kind node behaviour
//!
//! Specialised nodes (geometry, LOD switches, billboards...) customise the
//! core through a [`NodeKind`] trait object. Every method has a default
//! matching a plain grouping node.

use std::any::Any;
use std::sync::Arc;

use super::masks::CollideMask;
use super::PandaNode;
use crate::bounds::{BoundingVolume, BoundingVolumeType};

/// Type name reported by plain nodes
pub const PLAIN_NODE_TYPE: &str = "PandaNode";

/// Behaviour hooks for one kind of node
pub trait NodeKind: Send + Sync + 'static {
    /// Name of the node kind, used in listings and copy checks
    fn type_name(&self) -> &'static str {
        PLAIN_NODE_TYPE
    }

    /// Fresh behaviour object for a copy of a node of this kind
    fn make_copy(&self) -> Box<dyn NodeKind>;

    /// Downcast support for kind-specific queries
    fn as_any(&self) -> &dyn Any;

    /// Merge `this` with a sibling `other` during flattening
    ///
    /// A plain node yields to any other node; otherwise a plain `other`
    /// yields to `this`. Anything else can't be combined.
    fn combine_with(&self, this: &Arc<PandaNode>, other: &Arc<PandaNode>) -> Option<Arc<PandaNode>> {
        if Arc::ptr_eq(this, other) {
            return Some(Arc::clone(this));
        }
        if this.type_name() == PLAIN_NODE_TYPE {
            return Some(Arc::clone(other));
        }
        if other.type_name() == PLAIN_NODE_TYPE {
            return Some(Arc::clone(this));
        }
        None
    }

    /// Collide bits this kind may be collided into
    fn legal_collide_mask(&self) -> CollideMask {
        CollideMask::all_on()
    }

    /// Volume around the node's own content, excluding children
    fn compute_internal_bound(&self, _node: &PandaNode, _stage: usize, _bound_type: BoundingVolumeType) -> BoundingVolume {
        BoundingVolume::Empty
    }

    /// Called after the node's parent set changed at `stage`
    fn parents_changed(&self, _node: &PandaNode, _stage: usize) {}

    /// Called after the node's child lists changed at `stage`
    fn children_changed(&self, _node: &PandaNode, _stage: usize) {}

    /// Called after the node's transform changed at `stage`
    fn transform_changed(&self, _node: &PandaNode, _stage: usize) {}

    /// Called after the node's render state changed at `stage`
    fn state_changed(&self, _node: &PandaNode, _stage: usize) {}

    /// Called after the node's draw mask changed at `stage`
    fn draw_mask_changed(&self, _node: &PandaNode, _stage: usize) {}

    /// Whether the node may be removed when flattening
    fn safe_to_flatten(&self) -> bool {
        true
    }

    /// Whether a transform may be applied to the node's content
    fn safe_to_transform(&self) -> bool {
        true
    }

    /// Whether the node's own transform may be changed by flattening
    fn safe_to_modify_transform(&self) -> bool {
        true
    }

    /// Whether the node may be merged with siblings
    fn safe_to_combine(&self) -> bool {
        true
    }

    /// Whether flattening may proceed below this node
    fn safe_to_flatten_below(&self) -> bool {
        true
    }

    /// Whether flattening must keep the node's name
    fn preserve_name(&self) -> bool {
        false
    }

    /// Whether the cull traversal calls back into this node
    fn has_cull_callback(&self) -> bool {
        false
    }

    /// Whether only some children are visible at a time
    fn has_selective_visibility(&self) -> bool {
        false
    }

    /// First visible child index
    fn get_first_visible_child(&self, _node: &PandaNode) -> usize {
        0
    }

    /// Visible child index following `n`
    fn get_next_visible_child(&self, _node: &PandaNode, n: usize) -> usize {
        n + 1
    }

    /// Whether exactly one child is visible at a time
    fn has_single_child_visibility(&self) -> bool {
        false
    }

    /// The single visible child, when [`has_single_child_visibility`](Self::has_single_child_visibility)
    fn get_visible_child(&self, _node: &PandaNode) -> Option<usize> {
        None
    }
}

/// Behaviour of an ordinary grouping node
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainNode;

impl NodeKind for PlainNode {
    fn make_copy(&self) -> Box<dyn NodeKind> {
        Box::new(Self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A node carrying a fixed piece of content volume, such as a model stand-in
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeNode {
    volume: BoundingVolume,
}

impl VolumeNode {
    /// Behaviour whose internal bound is `volume`
    pub fn new(volume: BoundingVolume) -> Self {
        Self { volume }
    }

    /// Content volume
    pub fn volume(&self) -> &BoundingVolume {
        &self.volume
    }
}

impl NodeKind for VolumeNode {
    fn type_name(&self) -> &'static str {
        "VolumeNode"
    }

    fn make_copy(&self) -> Box<dyn NodeKind> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn compute_internal_bound(&self, _node: &PandaNode, _stage: usize, bound_type: BoundingVolumeType) -> BoundingVolume {
        BoundingVolume::around(bound_type, [&self.volume]).unwrap_or(BoundingVolume::Undefined)
    }

    fn safe_to_combine(&self) -> bool {
        false
    }
}

//! The per-stage record a node keeps in its cycler

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use super::connection::{DownList, UpList};
use super::masks::{CollideMask, DrawMask};
use super::NodePathComponent;
use crate::attrib::{ClipPlaneAttrib, RenderEffects, RenderState, TransformState};
use crate::pipeline::CycleData;

/// Everything about a node that may differ between pipeline stages
#[derive(Clone)]
pub struct NodeData {
    /// Visible children
    pub(crate) down: DownList,
    /// Children excluded from traversal and aggregates
    pub(crate) stashed: DownList,
    /// Parents
    pub(crate) up: UpList,
    /// Path components currently naming this node
    pub(crate) paths: Vec<Weak<NodePathComponent>>,

    pub(crate) state: Arc<RenderState>,
    pub(crate) effects: Arc<RenderEffects>,
    pub(crate) transform: Arc<TransformState>,
    pub(crate) prev_transform: Arc<TransformState>,

    pub(crate) tag_data: BTreeMap<String, String>,

    pub(crate) draw_mask: DrawMask,
    pub(crate) into_collide_mask: CollideMask,

    // Child cache: derived from the visible subtree
    pub(crate) net_collide_mask: CollideMask,
    pub(crate) off_clip_planes: Arc<ClipPlaneAttrib>,
    pub(crate) stale_child_cache: bool,
    pub(crate) child_cache_generation: u64,

    pub(crate) fixed_internal_bound: bool,
}

impl Default for NodeData {
    fn default() -> Self {
        let identity = TransformState::make_identity();
        Self {
            down: DownList::default(),
            stashed: DownList::default(),
            up: UpList::default(),
            paths: Vec::new(),
            state: RenderState::make_empty(),
            effects: RenderEffects::make_empty(),
            transform: Arc::clone(&identity),
            prev_transform: identity,
            tag_data: BTreeMap::new(),
            draw_mask: DrawMask::all_on(),
            into_collide_mask: CollideMask::empty(),
            net_collide_mask: CollideMask::empty(),
            off_clip_planes: ClipPlaneAttrib::make(),
            stale_child_cache: true,
            child_cache_generation: 0,
            fixed_internal_bound: false,
        }
    }
}

impl CycleData for NodeData {}

impl NodeData {
    /// Live path components, dropping any that have gone away
    pub(crate) fn live_paths(&self) -> Vec<Arc<NodePathComponent>> {
        self.paths.iter().filter_map(Weak::upgrade).collect()
    }

    /// Whether `component` is recorded
    pub(crate) fn has_path(&self, component: &NodePathComponent) -> bool {
        let ptr: *const NodePathComponent = component;
        self.paths.iter().any(|weak| std::ptr::eq(weak.as_ptr(), ptr))
    }

    /// Record `component` once
    pub(crate) fn insert_path(&mut self, component: &Arc<NodePathComponent>) {
        if !self.has_path(component) {
            self.paths.push(Arc::downgrade(component));
        }
    }

    /// Forget `component`, and any dead entries with it
    pub(crate) fn remove_path(&mut self, component: *const NodePathComponent) {
        self.paths
            .retain(|weak| !std::ptr::eq(weak.as_ptr(), component) && weak.strong_count() > 0);
    }

    /// Whether `child` appears in either child list
    pub(crate) fn has_child_edge(&self, child: &super::PandaNode) -> bool {
        self.down.find(child).is_some() || self.stashed.find(child).is_some()
    }
}

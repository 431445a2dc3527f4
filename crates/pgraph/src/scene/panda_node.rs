//! # PandaNode
//!
//! The scene graph vertex. A node is always handled through an
//! `Arc<PandaNode>`:
//!
//! - Parents own their children through `Arc`s in their `down`/`stashed` lists.
//! - Children refer back to their parents weakly through `up`.
//! - Everything that may differ between pipeline stages lives in a
//!   [`NodeData`] record inside the node's [`PipelineCycler`].
//!
//! Application-side edits loop over [`StageRange::current_and_upstream`].
//! Cached aggregates (bounds, net collide mask, disabled clip planes) are
//! invalidated upward at edit time and recomputed downward on the next read.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use super::connection::{node_key, DownConnection};
use super::masks::{CollideMask, DrawMask};
use super::node_data::NodeData;
use super::node_kind::{NodeKind, PlainNode};
use crate::attrib::{
    AttribSlot, ClipPlaneAttrib, EffectSlot, RenderAttrib, RenderEffect, RenderEffects, RenderState,
    TransformState,
};
use crate::bam::PendingPointers;
use crate::bounds::{BoundedObject, BoundingVolume, BoundingVolumeType};
use crate::error::GraphError;
use crate::pipeline::{
    current_stage, Cyclable, CycleReader, CycleWriter, CyclerLock, Pipeline, PipelineCycler, StageRange,
};

/// A named, reference-counted scene graph vertex
pub struct PandaNode {
    name: RwLock<String>,
    pipeline: Arc<Pipeline>,
    pub(crate) cycler: PipelineCycler<NodeData>,
    bound: BoundedObject,
    internal_bound: BoundedObject,
    kind: Box<dyn NodeKind>,
    pub(crate) bam_pending: Mutex<Option<PendingPointers>>,
}

impl PandaNode {
    /// Create a plain grouping node
    pub fn new(pipeline: &Arc<Pipeline>, name: impl Into<String>) -> Arc<Self> {
        Self::with_kind(pipeline, name, Box::new(PlainNode))
    }

    /// Create a node with specialised behaviour
    pub fn with_kind(pipeline: &Arc<Pipeline>, name: impl Into<String>, kind: Box<dyn NodeKind>) -> Arc<Self> {
        Self::from_data(pipeline, name.into(), kind, NodeData::default())
    }

    pub(crate) fn from_data(
        pipeline: &Arc<Pipeline>,
        name: String,
        kind: Box<dyn NodeKind>,
        data: NodeData,
    ) -> Arc<Self> {
        let num_stages = pipeline.num_stages();
        let bound_type = pipeline.config().bounds_type;
        let node = Arc::new(Self {
            name: RwLock::new(name),
            pipeline: Arc::clone(pipeline),
            cycler: PipelineCycler::new(data, num_stages),
            bound: BoundedObject::new(bound_type, num_stages),
            internal_bound: BoundedObject::new(bound_type, num_stages),
            kind,
            bam_pending: Mutex::new(None),
        });

        let weak: Weak<dyn Cyclable> = Arc::downgrade(&node) as Weak<dyn Cyclable>;
        pipeline.register(weak);
        node
    }

    /// Node name
    pub fn name(&self) -> String {
        self.name.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Rename the node
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = name.into();
    }

    /// Name of the node kind
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Behaviour object of this node
    pub fn kind(&self) -> &dyn NodeKind {
        self.kind.as_ref()
    }

    /// Pipeline the node was created on
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub(crate) fn read_data(&self, stage: usize) -> CycleReader<NodeData> {
        self.cycler.read(stage)
    }

    fn read_current(&self) -> CycleReader<NodeData> {
        self.cycler.read(current_stage())
    }

    // ---------------------------------------------------------------
    // Parent and child queries, at the calling thread's stage
    // ---------------------------------------------------------------

    /// Number of parents
    pub fn get_num_parents(&self) -> usize {
        self.read_current().up.len()
    }

    /// Parent `index`, in identity order
    pub fn get_parent(&self, index: usize) -> Option<Arc<PandaNode>> {
        self.read_current().up.get(index).and_then(|c| c.parent())
    }

    /// Index of `parent` among the parents
    pub fn find_parent(&self, parent: &PandaNode) -> Option<usize> {
        self.read_current().up.find(parent)
    }

    /// Snapshot of the parent list
    pub fn get_parents(&self) -> Parents {
        Parents { cdata: self.read_current() }
    }

    /// Number of visible children
    pub fn get_num_children(&self) -> usize {
        self.read_current().down.len()
    }

    /// Visible child `index`
    pub fn get_child(&self, index: usize) -> Option<Arc<PandaNode>> {
        self.read_current().down.get(index).map(|c| Arc::clone(c.child()))
    }

    /// Sort key of visible child `index`
    pub fn get_child_sort(&self, index: usize) -> Option<i32> {
        self.read_current().down.get(index).map(DownConnection::sort)
    }

    /// Index of `child` among the visible children
    pub fn find_child(&self, child: &PandaNode) -> Option<usize> {
        self.read_current().down.find(child)
    }

    /// Snapshot of the visible children
    pub fn get_children(&self) -> Children {
        Children { cdata: self.read_current(), stashed: false }
    }

    /// Number of stashed children
    pub fn get_num_stashed(&self) -> usize {
        self.read_current().stashed.len()
    }

    /// Stashed child `index`
    pub fn get_stashed(&self, index: usize) -> Option<Arc<PandaNode>> {
        self.read_current().stashed.get(index).map(|c| Arc::clone(c.child()))
    }

    /// Sort key of stashed child `index`
    pub fn get_stashed_sort(&self, index: usize) -> Option<i32> {
        self.read_current().stashed.get(index).map(DownConnection::sort)
    }

    /// Index of `child` among the stashed children
    pub fn find_stashed(&self, child: &PandaNode) -> Option<usize> {
        self.read_current().stashed.find(child)
    }

    /// Snapshot of the stashed children
    pub fn get_stashed_children(&self) -> Children {
        Children { cdata: self.read_current(), stashed: true }
    }

    // ---------------------------------------------------------------
    // Render state, effects, transform
    // ---------------------------------------------------------------

    fn edit_state<F>(&self, edit: F)
    where
        F: Fn(&RenderState) -> Arc<RenderState>,
    {
        for stage in StageRange::current_and_upstream() {
            let changed = {
                let mut cdata = self.cycler.write_stage(stage);
                let new_state = edit(&cdata.state);
                if *new_state == *cdata.state {
                    false
                } else {
                    cdata.state = new_state;
                    true
                }
            };
            if changed {
                self.mark_child_cache_stale(stage);
                self.kind.state_changed(self, stage);
            }
        }
    }

    /// Add or replace one attribute of the node's state
    pub fn set_attrib(&self, attrib: RenderAttrib, override_priority: i32) {
        self.edit_state(|state| state.add_attrib(attrib.clone(), override_priority));
    }

    /// Remove the attribute in `slot`
    pub fn clear_attrib(&self, slot: AttribSlot) {
        self.edit_state(|state| state.remove_attrib(slot));
    }

    /// Attribute in `slot`, if set on this node
    pub fn get_attrib(&self, slot: AttribSlot) -> Option<Arc<RenderAttrib>> {
        self.read_current().state.get_attrib(slot).cloned()
    }

    /// Whether `slot` is set on this node
    pub fn has_attrib(&self, slot: AttribSlot) -> bool {
        self.read_current().state.has_attrib(slot)
    }

    /// Replace the whole render state
    pub fn set_state(&self, state: Arc<RenderState>) {
        self.edit_state(|_| Arc::clone(&state));
    }

    /// Current render state
    pub fn get_state(&self) -> Arc<RenderState> {
        Arc::clone(&self.read_current().state)
    }

    /// Reset to the empty render state
    pub fn clear_state(&self) {
        self.set_state(RenderState::make_empty());
    }

    fn edit_effects<F>(&self, edit: F)
    where
        F: Fn(&RenderEffects) -> Arc<RenderEffects>,
    {
        for stage in StageRange::current_and_upstream() {
            let mut cdata = self.cycler.write_stage(stage);
            let new_effects = edit(&cdata.effects);
            if *new_effects != *cdata.effects {
                cdata.effects = new_effects;
            }
        }
    }

    /// Add or replace one effect
    pub fn set_effect(&self, effect: RenderEffect) {
        self.edit_effects(|effects| effects.add_effect(effect.clone()));
    }

    /// Remove the effect in `slot`
    pub fn clear_effect(&self, slot: EffectSlot) {
        self.edit_effects(|effects| effects.remove_effect(slot));
    }

    /// Effect in `slot`, if set
    pub fn get_effect(&self, slot: EffectSlot) -> Option<Arc<RenderEffect>> {
        self.read_current().effects.get_effect(slot).cloned()
    }

    /// Whether `slot` is set
    pub fn has_effect(&self, slot: EffectSlot) -> bool {
        self.read_current().effects.has_effect(slot)
    }

    /// Replace the whole effect set
    pub fn set_effects(&self, effects: Arc<RenderEffects>) {
        self.edit_effects(|_| Arc::clone(&effects));
    }

    /// Current effect set
    pub fn get_effects(&self) -> Arc<RenderEffects> {
        Arc::clone(&self.read_current().effects)
    }

    /// Remove every effect
    pub fn clear_effects(&self) {
        self.set_effects(RenderEffects::make_empty());
    }

    /// Replace the local transform
    pub fn set_transform(&self, transform: Arc<TransformState>) {
        for stage in StageRange::current_and_upstream() {
            let changed = {
                let mut cdata = self.cycler.write_stage(stage);
                if *cdata.transform == *transform {
                    false
                } else {
                    cdata.transform = Arc::clone(&transform);
                    true
                }
            };
            if changed {
                self.mark_bound_stale(stage);
                self.kind.transform_changed(self, stage);
            }
        }
    }

    /// Current local transform
    pub fn get_transform(&self) -> Arc<TransformState> {
        Arc::clone(&self.read_current().transform)
    }

    /// Reset the local transform to identity
    pub fn clear_transform(&self) {
        self.set_transform(TransformState::make_identity());
    }

    /// Record the transform the node had on the previous frame
    pub fn set_prev_transform(&self, transform: Arc<TransformState>) {
        for stage in StageRange::current_and_upstream() {
            self.cycler.write_stage(stage).prev_transform = Arc::clone(&transform);
        }
    }

    /// Transform the node had on the previous frame
    pub fn get_prev_transform(&self) -> Arc<TransformState> {
        Arc::clone(&self.read_current().prev_transform)
    }

    /// Make the previous transform equal to the current one
    pub fn reset_prev_transform(&self) {
        for stage in StageRange::current_and_upstream() {
            let mut cdata = self.cycler.write_stage(stage);
            cdata.prev_transform = Arc::clone(&cdata.transform);
        }
    }

    // ---------------------------------------------------------------
    // Tags
    // ---------------------------------------------------------------

    /// Set a user annotation
    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        for stage in StageRange::current_and_upstream() {
            self.cycler.write_stage(stage).tag_data.insert(key.clone(), value.clone());
        }
    }

    /// Value of a user annotation
    pub fn get_tag(&self, key: &str) -> Option<String> {
        self.read_current().tag_data.get(key).cloned()
    }

    /// Whether `key` is set
    pub fn has_tag(&self, key: &str) -> bool {
        self.read_current().tag_data.contains_key(key)
    }

    /// Remove a user annotation
    pub fn clear_tag(&self, key: &str) {
        for stage in StageRange::current_and_upstream() {
            self.cycler.write_stage(stage).tag_data.remove(key);
        }
    }

    /// Whether any annotation is set
    pub fn has_tags(&self) -> bool {
        !self.read_current().tag_data.is_empty()
    }

    /// Annotation keys in order
    pub fn get_tag_keys(&self) -> Vec<String> {
        self.read_current().tag_data.keys().cloned().collect()
    }

    /// Copy every annotation from `other`, overwriting same-named keys
    pub fn copy_tags(&self, other: &PandaNode) {
        if std::ptr::eq(self, other) {
            return;
        }
        let tags = other.read_current().tag_data.clone();
        for stage in StageRange::current_and_upstream() {
            let mut cdata = self.cycler.write_stage(stage);
            for (key, value) in &tags {
                cdata.tag_data.insert(key.clone(), value.clone());
            }
        }
    }

    /// Annotation keys joined by `separator`
    pub fn list_tags(&self, separator: &str) -> String {
        let cdata = self.read_current();
        let keys: Vec<&str> = cdata.tag_data.keys().map(String::as_str).collect();
        keys.join(separator)
    }

    // ---------------------------------------------------------------
    // Masks and the child cache
    // ---------------------------------------------------------------

    /// Set which cameras draw this node
    pub fn set_draw_mask(&self, mask: DrawMask) {
        for stage in StageRange::current_and_upstream() {
            let changed = {
                let mut cdata = self.cycler.write_stage(stage);
                let changed = cdata.draw_mask != mask;
                cdata.draw_mask = mask;
                changed
            };
            if changed {
                self.kind.draw_mask_changed(self, stage);
            }
        }
    }

    /// Which cameras draw this node
    pub fn get_draw_mask(&self) -> DrawMask {
        self.read_current().draw_mask
    }

    /// Collide bits this node's kind accepts
    pub fn get_legal_collide_mask(&self) -> CollideMask {
        self.kind.legal_collide_mask()
    }

    /// Set the bits this node may be collided into, limited to the legal mask
    pub fn set_into_collide_mask(&self, mask: CollideMask) {
        let mask = mask & self.get_legal_collide_mask();
        for stage in StageRange::current_and_upstream() {
            let changed = {
                let mut cdata = self.cycler.write_stage(stage);
                let changed = cdata.into_collide_mask != mask;
                cdata.into_collide_mask = mask;
                changed
            };
            if changed {
                self.mark_child_cache_stale(stage);
            }
        }
    }

    /// Bits this node may be collided into
    pub fn get_into_collide_mask(&self) -> CollideMask {
        self.read_current().into_collide_mask
    }

    /// Union of collide bits over this node and its visible subtree
    pub fn get_net_collide_mask(&self) -> CollideMask {
        self.child_cache(current_stage()).0
    }

    /// Union of disabled clip planes over this node and its visible subtree
    pub fn get_off_clip_planes(&self) -> Arc<ClipPlaneAttrib> {
        self.child_cache(current_stage()).1
    }

    /// Whether the child cache will be recomputed on the next read
    pub fn is_child_cache_stale(&self) -> bool {
        self.read_current().stale_child_cache
    }

    fn child_cache(&self, stage: usize) -> (CollideMask, Arc<ClipPlaneAttrib>) {
        let cdata = self.cycler.read(stage);
        if cdata.stale_child_cache {
            return self.update_child_cache(cdata);
        }
        (cdata.net_collide_mask, Arc::clone(&cdata.off_clip_planes))
    }

    fn update_child_cache(&self, cdata: CycleReader<NodeData>) -> (CollideMask, Arc<ClipPlaneAttrib>) {
        let stage = cdata.stage();
        let generation = cdata.child_cache_generation;

        let mut net_collide_mask = cdata.into_collide_mask;
        let mut off_clip_planes = cdata
            .state
            .get_clip_plane()
            .map_or_else(ClipPlaneAttrib::make, |attrib| Arc::new(attrib.clone()));

        for connection in &cdata.down {
            let (child_mask, child_off) = connection.child().child_cache(stage);
            net_collide_mask |= child_mask;
            off_clip_planes = off_clip_planes.compose_off(&child_off);
        }
        drop(cdata);

        let mut cdata = self.cycler.write_stage(stage);
        if cdata.child_cache_generation == generation {
            cdata.net_collide_mask = net_collide_mask;
            cdata.off_clip_planes = Arc::clone(&off_clip_planes);
            cdata.stale_child_cache = false;
        }
        (net_collide_mask, off_clip_planes)
    }

    /// Mark the child cache stale here and on every ancestor not already stale
    pub(crate) fn mark_child_cache_stale(&self, stage: usize) {
        let parents = {
            let mut cdata = self.cycler.write_stage(stage);
            cdata.child_cache_generation += 1;
            if cdata.stale_child_cache {
                return;
            }
            cdata.stale_child_cache = true;
            cdata.up.parents()
        };
        for parent in parents {
            parent.mark_child_cache_stale(stage);
        }
    }

    /// Mark the child cache stale and walk up even if it already was
    pub(crate) fn force_child_cache_stale(&self, stage: usize) {
        let parents = {
            let mut cdata = self.cycler.write_stage(stage);
            cdata.child_cache_generation += 1;
            cdata.stale_child_cache = true;
            cdata.up.parents()
        };
        for parent in parents {
            parent.mark_child_cache_stale(stage);
        }
    }

    // ---------------------------------------------------------------
    // Bounds
    // ---------------------------------------------------------------

    /// Bound of this node and its visible subtree, in the parent's frame
    pub fn get_bound(&self) -> Arc<BoundingVolume> {
        self.get_bound_at(current_stage())
    }

    /// [`get_bound`](Self::get_bound) at an explicit stage
    pub fn get_bound_at(&self, stage: usize) -> Arc<BoundingVolume> {
        self.bound.get_or_recompute(stage, |bound_type| self.recompute_bound(stage, bound_type))
    }

    /// Bound of this node's own content, in its own frame
    pub fn get_internal_bound(&self) -> Arc<BoundingVolume> {
        self.get_internal_bound_at(current_stage())
    }

    /// [`get_internal_bound`](Self::get_internal_bound) at an explicit stage
    pub fn get_internal_bound_at(&self, stage: usize) -> Arc<BoundingVolume> {
        self.internal_bound
            .get_or_recompute(stage, |bound_type| self.kind.compute_internal_bound(self, stage, bound_type))
    }

    /// Whether the bound will be recomputed on the next read
    pub fn is_bound_stale(&self) -> bool {
        self.bound.is_stale(current_stage())
    }

    /// Volume kind the node computes
    pub fn get_bound_type(&self) -> BoundingVolumeType {
        self.bound.bound_type(current_stage())
    }

    /// Compute `bound_type` volumes from now on, dropping any fixed internal bound
    ///
    /// `Default` resolves to the pipeline's configured bounds type.
    pub fn set_bound_type(&self, bound_type: BoundingVolumeType) {
        let bound_type = match bound_type {
            BoundingVolumeType::Default => self.pipeline.config().bounds_type,
            other => other,
        };
        for stage in StageRange::current_and_upstream() {
            self.cycler.write_stage(stage).fixed_internal_bound = false;
            self.internal_bound.set_bound_type(bound_type, stage);
            self.bound.set_bound_type(bound_type, stage);
            self.force_bound_stale(stage);
        }
    }

    /// Use `volume` as the node's internal bound instead of computing it
    pub fn set_bound(&self, volume: BoundingVolume) {
        for stage in StageRange::current_and_upstream() {
            self.cycler.write_stage(stage).fixed_internal_bound = true;
            self.internal_bound.set_fixed(volume.clone(), stage);
            self.force_bound_stale(stage);
        }
    }

    /// Go back to computing the internal bound
    pub fn clear_bound(&self) {
        for stage in StageRange::current_and_upstream() {
            self.cycler.write_stage(stage).fixed_internal_bound = false;
            self.internal_bound.clear_fixed(stage);
            self.force_bound_stale(stage);
        }
    }

    /// Whether the internal bound was set explicitly
    pub fn has_fixed_internal_bound(&self) -> bool {
        self.read_current().fixed_internal_bound
    }

    /// Recompute the internal bound on the next read, e.g. after content changed
    pub fn mark_internal_bound_stale(&self) {
        for stage in StageRange::current_and_upstream() {
            self.internal_bound.mark_stale(stage);
            self.mark_bound_stale(stage);
        }
    }

    /// Mark this node's bound stale at every edited stage
    pub fn mark_bound_stale(&self, stage: usize) {
        if self.bound.mark_stale(stage) {
            self.propagate_stale_bound(stage);
        }
    }

    /// Mark this node's bound stale and walk up even if it already was
    pub fn force_bound_stale(&self, stage: usize) {
        self.bound.force_stale(stage);
        self.propagate_stale_bound(stage);
    }

    fn propagate_stale_bound(&self, stage: usize) {
        let parents = self.cycler.read(stage).up.parents();
        for parent in parents {
            parent.mark_bound_stale(stage);
        }
    }

    fn recompute_bound(&self, stage: usize, bound_type: BoundingVolumeType) -> BoundingVolume {
        let internal = self.get_internal_bound_at(stage);

        let cdata = self.cycler.read(stage);
        let child_bounds: Vec<Arc<BoundingVolume>> =
            cdata.down.iter().map(|c| c.child().get_bound_at(stage)).collect();
        let transform = Arc::clone(&cdata.transform);
        drop(cdata);

        let volumes = std::iter::once(&*internal).chain(child_bounds.iter().map(|bound| &**bound));
        let bound = match BoundingVolume::around(bound_type, volumes) {
            Ok(bound) => bound,
            Err(err) => {
                log::error!("Unable to compute bounding volume for {}: {}", self, err);
                BoundingVolume::Undefined
            }
        };

        if transform.is_identity() {
            bound
        } else {
            bound.xform(transform.get_mat())
        }
    }

    // ---------------------------------------------------------------
    // Copies
    // ---------------------------------------------------------------

    /// Copy of this node's own properties, without children or parents
    pub fn make_copy(&self) -> Arc<PandaNode> {
        let stage = current_stage();
        let source = self.cycler.read(stage);
        let data = NodeData {
            state: Arc::clone(&source.state),
            effects: Arc::clone(&source.effects),
            transform: Arc::clone(&source.transform),
            prev_transform: Arc::clone(&source.prev_transform),
            tag_data: source.tag_data.clone(),
            draw_mask: source.draw_mask,
            into_collide_mask: source.into_collide_mask,
            fixed_internal_bound: source.fixed_internal_bound,
            ..NodeData::default()
        };
        let fixed = source.fixed_internal_bound;
        drop(source);

        let copy = Self::from_data(&self.pipeline, self.name(), self.kind.make_copy(), data);

        let bound_type = self.bound.bound_type(stage);
        copy.bound.set_bound_type(bound_type, 0);
        copy.internal_bound.set_bound_type(bound_type, 0);
        if fixed {
            let volume = (*self.internal_bound.cached(stage)).clone();
            copy.internal_bound.set_fixed(volume, 0);
        }
        copy.bound.copy_to_all_stages(0);
        copy.internal_bound.copy_to_all_stages(0);
        copy
    }

    /// Deep copy of the visible subtree, preserving instancing inside it
    pub fn copy_subgraph(&self) -> Arc<PandaNode> {
        let mut inst_map = HashMap::new();
        self.r_copy_subgraph(&mut inst_map)
    }

    fn r_copy_subgraph(&self, inst_map: &mut HashMap<usize, Arc<PandaNode>>) -> Arc<PandaNode> {
        let copy = self.make_copy();
        if copy.type_name() != self.type_name() {
            log::warn!(
                "Don't know how to copy nodes of type {}; the copy is a {}",
                self.type_name(),
                copy.type_name()
            );
        }
        copy.r_copy_children(self, inst_map);
        copy
    }

    fn r_copy_children(self: &Arc<Self>, from: &PandaNode, inst_map: &mut HashMap<usize, Arc<PandaNode>>) {
        let children = from.get_children();
        for connection in children.iter() {
            let source_child = connection.child();
            let key = node_key(source_child);
            let dest_child = match inst_map.get(&key) {
                Some(existing) => Arc::clone(existing),
                None => {
                    let copied = source_child.r_copy_subgraph(inst_map);
                    inst_map.insert(key, Arc::clone(&copied));
                    copied
                }
            };
            self.add_child(&dest_child, connection.sort());
        }
    }

    /// Merge with a sibling when flattening; `None` if the kinds can't combine
    pub fn combine_with(self: &Arc<Self>, other: &Arc<PandaNode>) -> Option<Arc<PandaNode>> {
        self.kind.combine_with(self, other)
    }

    // ---------------------------------------------------------------
    // Listing
    // ---------------------------------------------------------------

    /// Indented listing of this node and its visible subtree
    pub fn ls(&self) -> String {
        let mut out = String::new();
        self.r_list_descendants(&mut out, 0);
        out
    }

    fn r_list_descendants(&self, out: &mut String, indent: usize) {
        let cdata = self.read_current();
        let _ = write!(out, "{:indent$}{}", "", self);
        if !cdata.tag_data.is_empty() {
            let keys: Vec<&str> = cdata.tag_data.keys().map(String::as_str).collect();
            let _ = write!(out, " [{}]", keys.join(" "));
        }
        if !cdata.transform.is_identity() {
            let _ = write!(out, " {}", cdata.transform);
        }
        if !cdata.state.is_empty() {
            let _ = write!(out, " {}", cdata.state);
        }
        if !cdata.effects.is_empty() {
            let _ = write!(out, " {}", cdata.effects);
        }
        out.push('\n');

        for connection in &cdata.down {
            connection.child().r_list_descendants(out, indent + 2);
        }
        if !cdata.stashed.is_empty() {
            let _ = writeln!(out, "{:width$}({} stashed)", "", cdata.stashed.len(), width = indent + 2);
        }
    }

    // ---------------------------------------------------------------
    // Destruction
    // ---------------------------------------------------------------

    /// Check that no stage still lists a parent for this node
    pub fn verify_detached(&self) -> Result<(), GraphError> {
        for stage in StageRange::all(self.cycler.get_num_stages()) {
            let parents = self.cycler.read(stage).up.len();
            if parents > 0 {
                return Err(GraphError::StillParented {
                    node: self.to_string(),
                    stage,
                    parents,
                });
            }
        }
        Ok(())
    }

    /// Drop every child edge at every stage as part of destruction
    fn release_all_children(&self) {
        let mut released = Vec::new();
        for stage in StageRange::all(self.cycler.get_num_stages()) {
            let (down, stashed) = {
                let mut cdata = self.cycler.write_stage(stage);
                (cdata.down.take(), cdata.stashed.take())
            };
            for connection in down.iter().chain(stashed.iter()) {
                let child = connection.child();
                child.cycler.write_stage(stage).up.erase(self);
                child.kind.parents_changed(child, stage);
            }
            released.push((down, stashed));
        }
        // Children may drop here; no writer is held
        drop(released);
    }

    /// Make every stage share the record and bounds of stage `from`
    pub(crate) fn copy_to_all_stages(&self, from: usize) {
        self.cycler.copy_to_all_stages(from);
        self.bound.copy_to_all_stages(from);
        self.internal_bound.copy_to_all_stages(from);
    }

    pub(crate) fn lock(&self) -> CyclerLock<'_> {
        self.cycler.lock()
    }

    pub(crate) fn write_stage(&self, stage: usize) -> CycleWriter<'_, NodeData> {
        self.cycler.write_stage(stage)
    }
}

impl Cyclable for PandaNode {
    fn cycle(&self) {
        self.cycler.cycle();
        self.bound.cycle();
        self.internal_bound.cycle();
    }
}

impl Drop for PandaNode {
    fn drop(&mut self) {
        if let Err(err) = self.verify_detached() {
            log::error!("Destroying a node that is still parented: {err}");
            debug_assert!(false, "{err}");
        }
        self.release_all_children();
    }
}

impl fmt::Display for PandaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.type_name(), self.name())
    }
}

impl fmt::Debug for PandaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PandaNode")
            .field("type", &self.type_name())
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Snapshot of a node's parents
pub struct Parents {
    cdata: CycleReader<NodeData>,
}

impl Parents {
    /// Number of parents
    pub fn len(&self) -> usize {
        self.cdata.up.len()
    }

    /// Whether there are no parents
    pub fn is_empty(&self) -> bool {
        self.cdata.up.is_empty()
    }

    /// Parent `index`, if it is still alive
    pub fn get(&self, index: usize) -> Option<Arc<PandaNode>> {
        self.cdata.up.get(index).and_then(|c| c.parent())
    }

    /// Live parents
    pub fn iter(&self) -> impl Iterator<Item = Arc<PandaNode>> + '_ {
        self.cdata.up.iter().filter_map(|c| c.parent())
    }
}

/// Snapshot of a node's visible or stashed children
pub struct Children {
    cdata: CycleReader<NodeData>,
    stashed: bool,
}

impl Children {
    fn list(&self) -> &super::connection::DownList {
        if self.stashed {
            &self.cdata.stashed
        } else {
            &self.cdata.down
        }
    }

    /// Number of children
    pub fn len(&self) -> usize {
        self.list().len()
    }

    /// Whether there are no children
    pub fn is_empty(&self) -> bool {
        self.list().is_empty()
    }

    /// Child `index`
    pub fn get(&self, index: usize) -> Option<&Arc<PandaNode>> {
        self.list().get(index).map(DownConnection::child)
    }

    /// Sort key of child `index`
    pub fn get_sort(&self, index: usize) -> Option<i32> {
        self.list().get(index).map(DownConnection::sort)
    }

    /// Edges in order
    pub fn iter(&self) -> std::slice::Iter<'_, DownConnection> {
        self.list().iter()
    }
}

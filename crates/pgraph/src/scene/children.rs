//! Structural edits on child lists
//!
//! Every edit here keeps the parent/child biconditional at each stage it
//! touches: an edge is in the child's `up` set exactly when the child is in
//! the parent's `down` or `stashed` list.
//!
//! Locking order:
//! 1. Coarse node locks, all taken at once in address order.
//! 2. Stage writers, at most one parent/child pair at a time, also in
//!    address order.
//!
//! Path fixups, stale marking and hook calls run after the writers are
//! released. Hooks run last, with no lock held, so they may edit the graph.

use std::ptr;
use std::sync::Arc;

use super::connection::{node_key, DownConnection, UpConnection};
use super::node_data::NodeData;
use super::PandaNode;
use crate::error::GraphError;
use crate::pipeline::{current_stage, CycleWriter, CyclerLock, StageRange};

#[derive(Debug, Clone, Copy)]
enum GraphEvent {
    ParentsChanged,
    ChildrenChanged,
}

/// Hook calls collected while nodes are locked, fired once they are released
#[derive(Default)]
pub(crate) struct HookQueue {
    events: Vec<(Arc<PandaNode>, GraphEvent, usize)>,
}

impl HookQueue {
    pub(crate) fn children_changed(&mut self, node: &Arc<PandaNode>, stage: usize) {
        self.events.push((Arc::clone(node), GraphEvent::ChildrenChanged, stage));
    }

    pub(crate) fn parents_changed(&mut self, node: &Arc<PandaNode>, stage: usize) {
        self.events.push((Arc::clone(node), GraphEvent::ParentsChanged, stage));
    }

    pub(crate) fn fire(self) {
        for (node, event, stage) in self.events {
            match event {
                GraphEvent::ParentsChanged => node.kind().parents_changed(&node, stage),
                GraphEvent::ChildrenChanged => node.kind().children_changed(&node, stage),
            }
        }
    }
}

/// Take the coarse locks of several nodes in address order
pub(crate) fn lock_nodes<'a>(nodes: &[&'a PandaNode]) -> Vec<CyclerLock<'a>> {
    let mut sorted = nodes.to_vec();
    sorted.sort_by_key(|node| node_key(node));
    sorted.dedup_by_key(|node| node_key(node));
    sorted.into_iter().map(PandaNode::lock).collect()
}

/// Writers for two distinct nodes at one stage, acquired in address order
pub(crate) fn write_pair<'a>(
    a: &'a PandaNode,
    b: &'a PandaNode,
    stage: usize,
) -> (CycleWriter<'a, NodeData>, CycleWriter<'a, NodeData>) {
    assert!(!ptr::eq(a, b), "{a} can't be both ends of an edge");
    if node_key(a) < node_key(b) {
        let first = a.write_stage(stage);
        let second = b.write_stage(stage);
        (first, second)
    } else {
        let second = b.write_stage(stage);
        let first = a.write_stage(stage);
        (first, second)
    }
}

/// Writers for several distinct nodes at one stage, returned in argument order
fn write_nodes<'a>(nodes: &[&'a PandaNode], stage: usize) -> Vec<CycleWriter<'a, NodeData>> {
    let mut order: Vec<usize> = (0..nodes.len()).collect();
    order.sort_by_key(|&i| node_key(nodes[i]));
    let mut acquired: Vec<(usize, CycleWriter<'a, NodeData>)> =
        order.into_iter().map(|i| (i, nodes[i].write_stage(stage))).collect();
    acquired.sort_by_key(|(i, _)| *i);
    acquired.into_iter().map(|(_, writer)| writer).collect()
}

/// Remove the `parent -> child` edge at one stage
///
/// Returns the removed connection and whether it was visible (not stashed).
fn unlink_at(parent: &PandaNode, child: &PandaNode, stage: usize) -> Option<(DownConnection, bool)> {
    let (mut cdata, mut cdata_child) = write_pair(parent, child, stage);
    cdata_child.up.find(parent)?;
    let removed = if let Some(index) = cdata.down.find(child) {
        (cdata.down.remove(index), true)
    } else if let Some(index) = cdata.stashed.find(child) {
        (cdata.stashed.remove(index), false)
    } else {
        log::error!("{child} lists {parent} as a parent at stage {stage}, but {parent} doesn't list it");
        return None;
    };
    cdata_child.up.erase(parent);
    Some(removed)
}

impl PandaNode {
    /// Add `child` below this node with sort key `sort`
    ///
    /// If `child` is already a child (visible or stashed) it is moved, not duplicated.
    ///
    /// # Panics
    ///
    /// Panics if `child` is this node.
    pub fn add_child(self: &Arc<Self>, child: &Arc<PandaNode>, sort: i32) {
        assert!(!Arc::ptr_eq(self, child), "can't add {} as a child of itself", self);
        let child = Arc::clone(child);
        let mut hooks = HookQueue::default();
        {
            let _locks = lock_nodes(&[&**self, &*child]);
            self.do_remove_child(&child, &mut hooks);

            for stage in StageRange::current_and_upstream() {
                {
                    let (mut cdata, mut cdata_child) = write_pair(self, &child, stage);
                    cdata.down.insert(DownConnection::new(Arc::clone(&child), sort));
                    cdata_child.up.insert(UpConnection::new(self));
                }
                Self::new_connection(self, &child, stage);
                self.force_child_cache_stale(stage);
                self.force_bound_stale(stage);
                hooks.children_changed(self, stage);
                hooks.parents_changed(&child, stage);
            }
        }
        hooks.fire();
    }

    /// Remove `child` from whichever list holds it; returns whether it was a child
    pub fn remove_child(self: &Arc<Self>, child: &Arc<PandaNode>) -> bool {
        if Arc::ptr_eq(self, child) {
            return false;
        }
        let child = Arc::clone(child);
        let mut hooks = HookQueue::default();
        let removed = {
            let _locks = lock_nodes(&[&**self, &*child]);
            self.do_remove_child(&child, &mut hooks)
        };
        hooks.fire();
        removed
    }

    /// Remove visible child `index`
    pub fn remove_child_at(self: &Arc<Self>, index: usize) -> bool {
        match self.get_child(index) {
            Some(child) => self.remove_child(&child),
            None => false,
        }
    }

    /// Remove stashed child `index`
    pub fn remove_stashed_at(self: &Arc<Self>, index: usize) -> bool {
        match self.get_stashed(index) {
            Some(child) => self.remove_child(&child),
            None => false,
        }
    }

    /// Remove the edge to `child` at every edited stage; caller holds both coarse locks
    pub(crate) fn do_remove_child(self: &Arc<Self>, child: &Arc<PandaNode>, hooks: &mut HookQueue) -> bool {
        let mut any_removed = false;
        for stage in StageRange::current_and_upstream() {
            let Some((connection, visible)) = unlink_at(self, child, stage) else {
                continue;
            };
            Self::sever_connection(self, child, stage);
            if visible {
                self.force_child_cache_stale(stage);
                self.force_bound_stale(stage);
            }
            hooks.children_changed(self, stage);
            hooks.parents_changed(child, stage);
            drop(connection);
            any_removed = true;
        }
        any_removed
    }

    /// Put `new_child` in `orig_child`'s place, keeping its position and sort key
    ///
    /// Paths that went through the old edge become top-level; they are not
    /// carried over to `new_child`. Returns whether `orig_child` was found.
    ///
    /// # Panics
    ///
    /// Panics if `new_child` is this node.
    pub fn replace_child(self: &Arc<Self>, orig_child: &Arc<PandaNode>, new_child: &Arc<PandaNode>) -> bool {
        if Arc::ptr_eq(orig_child, new_child) {
            return true;
        }
        assert!(!Arc::ptr_eq(self, new_child), "can't make {} a child of itself", self);
        let orig_child = Arc::clone(orig_child);
        let new_child = Arc::clone(new_child);

        let mut hooks = HookQueue::default();
        let mut any_replaced = false;
        let mut displaced = Vec::new();
        {
            let _locks = lock_nodes(&[&**self, &*orig_child, &*new_child]);
            if orig_child.find_parent(self).is_some() {
                self.do_remove_child(&new_child, &mut hooks);
            }

            for stage in StageRange::current_and_upstream() {
                let replaced = {
                    let mut writers = write_nodes(&[&**self, &*orig_child, &*new_child], stage);
                    let [cdata, cdata_orig, cdata_new] = writers.as_mut_slice() else {
                        unreachable!("three writers were requested");
                    };
                    let position = match cdata.down.find(&orig_child) {
                        Some(index) => Some((index, true)),
                        None => cdata.stashed.find(&orig_child).map(|index| (index, false)),
                    };
                    position.map(|(index, visible)| {
                        let list = if visible { &mut cdata.down } else { &mut cdata.stashed };
                        displaced.push(list.replace_child(index, Arc::clone(&new_child)));
                        cdata_orig.up.erase(self);
                        cdata_new.up.insert(UpConnection::new(self));
                        visible
                    })
                };

                let Some(visible) = replaced else {
                    continue;
                };
                Self::sever_connection(self, &orig_child, stage);
                Self::new_connection(self, &new_child, stage);
                if visible {
                    self.force_child_cache_stale(stage);
                    self.force_bound_stale(stage);
                }
                hooks.children_changed(self, stage);
                hooks.parents_changed(&orig_child, stage);
                hooks.parents_changed(&new_child, stage);
                any_replaced = true;
            }
        }
        hooks.fire();
        drop(displaced);
        any_replaced
    }

    fn check_base_stage() -> Result<(), GraphError> {
        match current_stage() {
            0 => Ok(()),
            stage => Err(GraphError::NotBaseStage { stage }),
        }
    }

    /// Move visible child `index` to the stashed list, keeping its sort key
    ///
    /// Only allowed on pipeline stage 0.
    pub fn stash_child(self: &Arc<Self>, index: usize) -> Result<(), GraphError> {
        Self::check_base_stage()?;
        let mut hooks = HookQueue::default();
        {
            let _lock = self.lock();
            let child = {
                let mut cdata = self.write_stage(0);
                if index >= cdata.down.len() {
                    return Err(GraphError::ChildIndexOutOfRange { index, len: cdata.down.len() });
                }
                let connection = cdata.down.remove(index);
                let child = Arc::clone(connection.child());
                cdata.stashed.insert(connection);
                child
            };
            self.force_child_cache_stale(0);
            self.force_bound_stale(0);
            hooks.children_changed(self, 0);
            hooks.parents_changed(&child, 0);
        }
        hooks.fire();
        Ok(())
    }

    /// Move stashed child `index` back to the visible list, keeping its sort key
    ///
    /// Only allowed on pipeline stage 0.
    pub fn unstash_child(self: &Arc<Self>, index: usize) -> Result<(), GraphError> {
        Self::check_base_stage()?;
        let mut hooks = HookQueue::default();
        {
            let _lock = self.lock();
            let child = {
                let mut cdata = self.write_stage(0);
                if index >= cdata.stashed.len() {
                    return Err(GraphError::ChildIndexOutOfRange { index, len: cdata.stashed.len() });
                }
                let connection = cdata.stashed.remove(index);
                let child = Arc::clone(connection.child());
                cdata.down.insert(connection);
                child
            };
            self.force_child_cache_stale(0);
            self.force_bound_stale(0);
            hooks.children_changed(self, 0);
            hooks.parents_changed(&child, 0);
        }
        hooks.fire();
        Ok(())
    }

    /// Add `child` directly to the stashed list
    ///
    /// Stashed children don't contribute to bounds or masks, so nothing is
    /// marked stale beyond what removing a previous edge requires.
    pub fn add_stashed(self: &Arc<Self>, child: &Arc<PandaNode>, sort: i32) {
        assert!(!Arc::ptr_eq(self, child), "can't stash {} under itself", self);
        let child = Arc::clone(child);
        let mut hooks = HookQueue::default();
        {
            let _locks = lock_nodes(&[&**self, &*child]);
            self.do_remove_child(&child, &mut hooks);

            for stage in StageRange::current_and_upstream() {
                {
                    let (mut cdata, mut cdata_child) = write_pair(self, &child, stage);
                    cdata.stashed.insert(DownConnection::new(Arc::clone(&child), sort));
                    cdata_child.up.insert(UpConnection::new(self));
                }
                Self::new_connection(self, &child, stage);
                hooks.children_changed(self, stage);
                hooks.parents_changed(&child, stage);
            }
        }
        hooks.fire();
    }

    /// Remove every visible and stashed child
    pub fn remove_all_children(self: &Arc<Self>) {
        let mut hooks = HookQueue::default();
        let mut released = Vec::new();
        {
            let _lock = self.lock();
            for stage in StageRange::current_and_upstream() {
                let (down, stashed) = {
                    let mut cdata = self.write_stage(stage);
                    (cdata.down.take(), cdata.stashed.take())
                };
                if down.is_empty() && stashed.is_empty() {
                    continue;
                }

                for connection in down.iter().chain(stashed.iter()) {
                    let child = connection.child();
                    child.write_stage(stage).up.erase(self);
                    Self::sever_connection(self, child, stage);
                    hooks.parents_changed(child, stage);
                }
                if !down.is_empty() {
                    self.force_child_cache_stale(stage);
                    self.force_bound_stale(stage);
                }
                hooks.children_changed(self, stage);
                released.push((down, stashed));
            }
        }
        hooks.fire();
        drop(released);
    }

    /// Move every child of `other` onto this node, keeping sort keys
    pub fn steal_children(self: &Arc<Self>, other: &Arc<PandaNode>) {
        if Arc::ptr_eq(self, other) {
            return;
        }
        let children = other.get_children();
        for connection in children.iter() {
            self.add_child(connection.child(), connection.sort());
        }
        let stashed = other.get_stashed_children();
        for connection in stashed.iter() {
            self.add_stashed(connection.child(), connection.sort());
        }
        drop((children, stashed));
        other.remove_all_children();
    }

    /// Add every child of `other` to this node as an additional instance
    pub fn copy_children(self: &Arc<Self>, other: &Arc<PandaNode>) {
        if Arc::ptr_eq(self, other) {
            return;
        }
        let children = other.get_children();
        for connection in children.iter() {
            self.add_child(connection.child(), connection.sort());
        }
        let stashed = other.get_stashed_children();
        for connection in stashed.iter() {
            self.add_stashed(connection.child(), connection.sort());
        }
    }
}

//! # Path components
//!
//! A [`NodePathComponent`] names one node reached through one specific chain
//! of parents. Components link toward the root through `next`. A component
//! with no `next` is a top component: the root of its path.
//!
//! Nodes remember the components naming them in their per-stage `paths`
//! list. Whenever an edge is made or broken the affected components are
//! re-linked and their cached lengths repaired down through the subtree.

use std::fmt;
use std::ptr;
use std::sync::{Arc, PoisonError, RwLock};

use super::children::{lock_nodes, write_pair, HookQueue};
use super::connection::{DownConnection, UpConnection};
use super::PandaNode;
use crate::error::GraphError;
use crate::pipeline::{current_stage, StageRange};

struct ComponentLinks {
    next: Option<Arc<NodePathComponent>>,
    length: usize,
}

/// One node reached through one specific chain of parents
pub struct NodePathComponent {
    node: Arc<PandaNode>,
    links: RwLock<ComponentLinks>,
}

impl NodePathComponent {
    fn new(node: Arc<PandaNode>, next: Option<Arc<NodePathComponent>>) -> Arc<Self> {
        let length = next.as_ref().map_or(1, |next| next.get_length() + 1);
        Arc::new(Self {
            node,
            links: RwLock::new(ComponentLinks { next, length }),
        })
    }

    /// The node this component names
    pub fn node(&self) -> &Arc<PandaNode> {
        &self.node
    }

    /// Whether this component is the root of its path
    pub fn is_top_node(&self) -> bool {
        self.links.read().unwrap_or_else(PoisonError::into_inner).next.is_none()
    }

    /// Component for the parent along this path
    pub fn get_next(&self) -> Option<Arc<NodePathComponent>> {
        self.links.read().unwrap_or_else(PoisonError::into_inner).next.clone()
    }

    /// Number of nodes from the root of the path to this node, inclusive
    pub fn get_length(&self) -> usize {
        self.links.read().unwrap_or_else(PoisonError::into_inner).length
    }

    pub(crate) fn set_next(&self, next: Arc<NodePathComponent>) {
        let old = self.links.write().unwrap_or_else(PoisonError::into_inner).next.replace(next);
        drop(old);
    }

    pub(crate) fn set_top_node(&self) {
        let old = self.links.write().unwrap_or_else(PoisonError::into_inner).next.take();
        drop(old);
    }

    /// Recompute the cached length from `next`; returns whether it changed
    pub(crate) fn fix_length(&self) -> bool {
        let length_should_be = self.get_next().map_or(1, |next| next.get_length() + 1);
        let mut links = self.links.write().unwrap_or_else(PoisonError::into_inner);
        if links.length == length_should_be {
            return false;
        }
        links.length = length_should_be;
        true
    }
}

impl Drop for NodePathComponent {
    fn drop(&mut self) {
        self.node.delete_component(self);
    }
}

impl fmt::Display for NodePathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = vec![self.node.name()];
        let mut next = self.get_next();
        while let Some(component) = next {
            names.push(component.node.name());
            next = component.get_next();
        }
        names.reverse();
        write!(f, "/{}", names.join("/"))
    }
}

impl fmt::Debug for NodePathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodePathComponent")
            .field("path", &self.to_string())
            .field("length", &self.get_length())
            .finish()
    }
}

impl PandaNode {
    fn make_top_component(node: &Arc<PandaNode>) -> Arc<NodePathComponent> {
        let component = NodePathComponent::new(Arc::clone(node), None);
        for stage in StageRange::current_and_upstream() {
            node.write_stage(stage).insert_path(&component);
        }
        component
    }

    /// Find or create the component for `child_node` reached through `parent`
    ///
    /// Returns `None` if `child_node` is not actually a child of `parent`'s node.
    pub fn get_component(parent: &Arc<NodePathComponent>, child_node: &Arc<PandaNode>) -> Option<Arc<NodePathComponent>> {
        let paths = child_node.read_data(current_stage()).live_paths();
        if let Some(existing) = paths
            .into_iter()
            .find(|c| c.get_next().is_some_and(|next| Arc::ptr_eq(&next, parent)))
        {
            return Some(existing);
        }

        child_node.find_parent(parent.node())?;
        let component = NodePathComponent::new(Arc::clone(child_node), Some(Arc::clone(parent)));
        for stage in StageRange::current_and_upstream() {
            child_node.write_stage(stage).insert_path(&component);
        }
        Some(component)
    }

    /// Find a top component for `node`, creating one if `force` is set
    pub fn get_top_component(node: &Arc<PandaNode>, force: bool) -> Option<Arc<NodePathComponent>> {
        let paths = node.read_data(current_stage()).live_paths();
        if let Some(top) = paths.into_iter().find(|c| c.is_top_node()) {
            return Some(top);
        }
        force.then(|| Self::make_top_component(node))
    }

    /// Some component naming this node, following parent 0 at every fork
    ///
    /// A node with several parents has no single answer; the choice is
    /// arbitrary but deterministic and is reported unless `accept_ambiguity`.
    pub fn get_generic_component(self: &Arc<Self>, accept_ambiguity: bool) -> Arc<NodePathComponent> {
        let mut ambiguous = false;
        let result = self.r_get_generic_component(&mut ambiguous);
        if ambiguous && !accept_ambiguity {
            if self.pipeline().config().unambiguous_graph {
                log::error!("{} is reachable by more than one path; using {}", self, result);
            } else {
                log::warn!("{} is reachable by more than one path; using {}", self, result);
            }
        }
        result
    }

    fn r_get_generic_component(self: &Arc<Self>, ambiguous: &mut bool) -> Arc<NodePathComponent> {
        let parents = self.get_parents();
        let Some(parent) = parents.get(0) else {
            drop(parents);
            return Self::get_top_component(self, true).unwrap_or_else(|| Self::make_top_component(self));
        };
        if parents.len() > 1 {
            *ambiguous = true;
        }
        drop(parents);

        let parent_component = parent.r_get_generic_component(ambiguous);
        Self::get_component(&parent_component, self).unwrap_or_else(|| Self::make_top_component(self))
    }

    /// Attach `child_node` under `parent`, or make a new unattached instance if `parent` is `None`
    pub fn attach(parent: Option<&Arc<NodePathComponent>>, child_node: &Arc<PandaNode>, sort: i32) -> Arc<NodePathComponent> {
        let Some(parent) = parent else {
            return Self::make_top_component(child_node);
        };

        let child = Self::get_component(parent, child_node)
            .or_else(|| Self::get_top_component(child_node, true))
            .unwrap_or_else(|| Self::make_top_component(child_node));

        if let Err(err) = Self::reparent(Some(parent), &child, sort, false) {
            log::error!("Unable to attach {}: {}", child_node, err);
        }
        child
    }

    /// Break the edge between `child` and its parent along that path
    ///
    /// # Panics
    ///
    /// Panics if `child` is a top component; check
    /// [`NodePathComponent::is_top_node`] first.
    pub fn detach(child: &Arc<NodePathComponent>) {
        let Some(parent) = child.get_next() else {
            panic!("can't detach top-level path component {child}");
        };
        let parent_node = Arc::clone(parent.node());
        let child_node = Arc::clone(child.node());
        drop(parent);

        let mut hooks = HookQueue::default();
        {
            let _locks = lock_nodes(&[&*parent_node, &*child_node]);
            assert!(
                child_node.find_parent(&parent_node).is_some(),
                "{child_node} is not a child of {parent_node}"
            );
            parent_node.do_remove_child(&child_node, &mut hooks);
        }
        hooks.fire();
    }

    /// Move `child` under `new_parent` (or make it top-level if `None`) at every edited stage
    ///
    /// Fails without changing anything if the child's node is already a child of
    /// `new_parent`'s node through some other edge.
    pub fn reparent(
        new_parent: Option<&Arc<NodePathComponent>>,
        child: &Arc<NodePathComponent>,
        sort: i32,
        as_stashed: bool,
    ) -> Result<(), GraphError> {
        let child_node = Arc::clone(child.node());
        let old_parent_node = child.get_next().map(|next| Arc::clone(next.node()));
        let new_parent_node = new_parent.map(|parent| Arc::clone(parent.node()));
        if let Some(parent_node) = &new_parent_node {
            assert!(
                !Arc::ptr_eq(parent_node, &child_node),
                "can't parent {child_node} to itself"
            );
        }

        let mut hooks = HookQueue::default();
        {
            let mut lock_set: Vec<&PandaNode> = vec![&*child_node];
            lock_set.extend(old_parent_node.as_deref());
            lock_set.extend(new_parent_node.as_deref());
            let _locks = lock_nodes(&lock_set);

            if let Some(parent_node) = &new_parent_node {
                let same_edge = old_parent_node
                    .as_ref()
                    .is_some_and(|old| Arc::ptr_eq(old, parent_node));
                if !same_edge && child_node.find_parent(parent_node).is_some() {
                    return Err(GraphError::DuplicateInstance {
                        child: child_node.to_string(),
                        parent: parent_node.to_string(),
                    });
                }
            }

            if let Some(old_parent) = &old_parent_node {
                old_parent.do_remove_child(&child_node, &mut hooks);
            }

            if let (Some(parent), Some(parent_node)) = (new_parent, &new_parent_node) {
                child.set_next(Arc::clone(parent));
                for stage in StageRange::current_and_upstream() {
                    {
                        let (mut cdata, mut cdata_child) = write_pair(parent_node, &child_node, stage);
                        let connection = DownConnection::new(Arc::clone(&child_node), sort);
                        if as_stashed {
                            cdata.stashed.insert(connection);
                        } else {
                            cdata.down.insert(connection);
                        }
                        cdata_child.up.insert(UpConnection::new(parent_node));
                        cdata_child.insert_path(child);
                    }
                    child_node.fix_path_lengths(stage);
                    if !as_stashed {
                        parent_node.force_child_cache_stale(stage);
                        parent_node.force_bound_stale(stage);
                    }
                    hooks.children_changed(parent_node, stage);
                    hooks.parents_changed(&child_node, stage);
                }
            }
        }
        hooks.fire();
        Ok(())
    }

    /// Turn every component of `child_node` that ran through `parent_node` into a top component
    pub(crate) fn sever_connection(parent_node: &PandaNode, child_node: &PandaNode, stage: usize) {
        let paths = child_node.read_data(stage).live_paths();
        for component in &paths {
            let through_parent = component
                .get_next()
                .is_some_and(|next| ptr::eq(&**next.node(), parent_node));
            if through_parent {
                component.set_top_node();
            }
        }
        child_node.fix_path_lengths(stage);
    }

    /// Hang every top component of `child_node` below `parent_node`'s generic component
    pub(crate) fn new_connection(parent_node: &Arc<PandaNode>, child_node: &PandaNode, stage: usize) {
        let tops: Vec<_> = child_node
            .read_data(stage)
            .live_paths()
            .into_iter()
            .filter(|component| component.is_top_node())
            .collect();
        if !tops.is_empty() {
            let parent_component = parent_node.get_generic_component(false);
            for component in &tops {
                component.set_next(Arc::clone(&parent_component));
            }
        }
        child_node.fix_path_lengths(stage);
    }

    /// Repair cached lengths of this node's components and, if any changed, of its subtree
    pub(crate) fn fix_path_lengths(&self, stage: usize) {
        let cdata = self.read_data(stage);
        let mut any_wrong = false;
        for component in cdata.live_paths() {
            if component.fix_length() {
                any_wrong = true;
            }
        }

        if any_wrong {
            for connection in cdata.down.iter().chain(cdata.stashed.iter()) {
                connection.child().fix_path_lengths(stage);
            }
        }
    }

    /// Forget `component` at every stage that still lists it
    pub(crate) fn delete_component(&self, component: &NodePathComponent) {
        for stage in StageRange::all(self.cycler.get_num_stages()) {
            if self.read_data(stage).has_path(component) {
                self.write_stage(stage).remove_path(component);
            }
        }
    }

    /// Number of live components naming this node at the calling thread's stage
    pub fn get_num_paths(&self) -> usize {
        self.read_data(current_stage()).live_paths().len()
    }
}

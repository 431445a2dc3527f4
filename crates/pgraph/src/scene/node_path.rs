//! Convenience handle over a path component

use std::fmt;
use std::sync::Arc;

use super::{NodePathComponent, PandaNode};
use crate::error::GraphError;

/// A node together with the specific chain of parents it was reached through
#[derive(Clone, Default)]
pub struct NodePath {
    head: Option<Arc<NodePathComponent>>,
}

impl NodePath {
    /// A path naming nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// A new top-level path to `node`
    pub fn new(node: &Arc<PandaNode>) -> Self {
        Self::from_component(PandaNode::attach(None, node, 0))
    }

    /// Some path to `node`, following parent 0 wherever it has several
    pub fn any_path(node: &Arc<PandaNode>) -> Self {
        Self::from_component(node.get_generic_component(false))
    }

    /// Wrap an existing component
    pub fn from_component(component: Arc<NodePathComponent>) -> Self {
        Self { head: Some(component) }
    }

    /// Whether this path names nothing
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// The node at the bottom of the path
    pub fn node(&self) -> Option<&Arc<PandaNode>> {
        self.head.as_ref().map(|head| head.node())
    }

    /// The component at the bottom of the path
    pub fn component(&self) -> Option<&Arc<NodePathComponent>> {
        self.head.as_ref()
    }

    /// Number of nodes from the root to the bottom, inclusive
    pub fn get_num_nodes(&self) -> usize {
        self.head.as_ref().map_or(0, |head| head.get_length())
    }

    /// The path to this node's parent along this path
    pub fn get_parent(&self) -> NodePath {
        Self {
            head: self.head.as_ref().and_then(|head| head.get_next()),
        }
    }

    /// The path to the root of this path
    pub fn get_top(&self) -> NodePath {
        let mut top = self.head.clone();
        while let Some(next) = top.as_ref().and_then(|c| c.get_next()) {
            top = Some(next);
        }
        Self { head: top }
    }

    /// Attach `node` below this path and return the path to it
    ///
    /// # Panics
    ///
    /// Panics if this path is empty.
    pub fn attach_new_node(&self, node: &Arc<PandaNode>, sort: i32) -> NodePath {
        let Some(head) = &self.head else {
            panic!("can't attach {node} to an empty path");
        };
        Self::from_component(PandaNode::attach(Some(head), node, sort))
    }

    /// Move this path's node under `parent`, keeping this path valid
    pub fn reparent_to(&self, parent: &NodePath, sort: i32) -> Result<(), GraphError> {
        self.do_reparent(parent, sort, false)
    }

    /// Like [`reparent_to`](Self::reparent_to), but into `parent`'s stashed list
    pub fn stash_to(&self, parent: &NodePath, sort: i32) -> Result<(), GraphError> {
        self.do_reparent(parent, sort, true)
    }

    fn do_reparent(&self, parent: &NodePath, sort: i32, as_stashed: bool) -> Result<(), GraphError> {
        let (Some(head), Some(parent_head)) = (&self.head, &parent.head) else {
            panic!("can't reparent an empty path");
        };
        PandaNode::reparent(Some(parent_head), head, sort, as_stashed)
    }

    /// Add this path's node under `parent` as an additional instance
    ///
    /// The original path is left where it was; the returned path names the new instance.
    pub fn instance_to(&self, parent: &NodePath, sort: i32) -> Result<NodePath, GraphError> {
        let (Some(head), Some(parent_head)) = (&self.head, &parent.head) else {
            panic!("can't instance an empty path");
        };
        let instance = PandaNode::attach(None, head.node(), sort);
        PandaNode::reparent(Some(parent_head), &instance, sort, false)?;
        Ok(Self::from_component(instance))
    }

    /// Break the edge to this node's parent along this path; a top-level path is left alone
    pub fn detach_node(&self) {
        if let Some(head) = &self.head {
            if !head.is_top_node() {
                PandaNode::detach(head);
            }
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.head {
            Some(head) => write!(f, "{head}"),
            None => f.write_str("**empty**"),
        }
    }
}

impl fmt::Debug for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePath({})", self)
    }
}

//! Parent/child edge records
//!
//! A parent owns each child through a [`DownConnection`] in its `down` or
//! `stashed` list. The child points back through a weak [`UpConnection`].

use std::sync::{Arc, Weak};

use super::PandaNode;

/// Identity key of a node, its address
pub(crate) fn node_key(node: &PandaNode) -> usize {
    node as *const PandaNode as usize
}

/// Owning edge from a parent to a child, with the child's sort key
#[derive(Clone)]
pub struct DownConnection {
    child: Arc<PandaNode>,
    sort: i32,
}

impl DownConnection {
    /// Edge to `child` with sort key `sort`
    pub fn new(child: Arc<PandaNode>, sort: i32) -> Self {
        Self { child, sort }
    }

    /// The child node
    pub fn child(&self) -> &Arc<PandaNode> {
        &self.child
    }

    /// The child's sort key
    pub fn sort(&self) -> i32 {
        self.sort
    }
}

/// Children ordered by ascending sort key, ties in insertion order
#[derive(Clone, Default)]
pub struct DownList {
    entries: Vec<DownConnection>,
}

impl DownList {
    /// Number of children
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no children
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Edge at `index`
    pub fn get(&self, index: usize) -> Option<&DownConnection> {
        self.entries.get(index)
    }

    /// Edges in order
    pub fn iter(&self) -> std::slice::Iter<'_, DownConnection> {
        self.entries.iter()
    }

    /// Insert after every entry with a sort key `<= sort`; returns the new index
    pub fn insert(&mut self, connection: DownConnection) -> usize {
        let index = self.entries.partition_point(|c| c.sort <= connection.sort);
        self.entries.insert(index, connection);
        index
    }

    /// Append without sorting, used when restoring a saved order
    pub(crate) fn push(&mut self, connection: DownConnection) {
        self.entries.push(connection);
    }

    /// Index of the edge to `node`
    pub fn find(&self, node: &PandaNode) -> Option<usize> {
        let key = node_key(node);
        self.entries.iter().position(|c| node_key(&c.child) == key)
    }

    /// Remove and return the edge at `index`
    pub fn remove(&mut self, index: usize) -> DownConnection {
        self.entries.remove(index)
    }

    /// Swap the child at `index` in place, keeping its sort key; returns the old child
    pub fn replace_child(&mut self, index: usize, child: Arc<PandaNode>) -> Arc<PandaNode> {
        std::mem::replace(&mut self.entries[index].child, child)
    }

    /// Remove every edge
    pub fn take(&mut self) -> Vec<DownConnection> {
        std::mem::take(&mut self.entries)
    }
}

impl<'a> IntoIterator for &'a DownList {
    type Item = &'a DownConnection;
    type IntoIter = std::slice::Iter<'a, DownConnection>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Non-owning edge from a child back to a parent
#[derive(Clone)]
pub struct UpConnection {
    parent: Weak<PandaNode>,
    key: usize,
}

impl UpConnection {
    /// Back edge to `parent`
    pub fn new(parent: &Arc<PandaNode>) -> Self {
        Self {
            parent: Arc::downgrade(parent),
            key: node_key(parent),
        }
    }

    /// The parent, if it is still alive
    pub fn parent(&self) -> Option<Arc<PandaNode>> {
        self.parent.upgrade()
    }

    /// Identity key of the parent
    pub fn key(&self) -> usize {
        self.key
    }
}

/// Parents as a set ordered by node identity
#[derive(Clone, Default)]
pub struct UpList {
    entries: Vec<UpConnection>,
}

impl UpList {
    /// Number of parents
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no parents
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Edge at `index`
    pub fn get(&self, index: usize) -> Option<&UpConnection> {
        self.entries.get(index)
    }

    /// Edges in identity order
    pub fn iter(&self) -> std::slice::Iter<'_, UpConnection> {
        self.entries.iter()
    }

    /// Add a parent; returns `false` if it was already present
    pub fn insert(&mut self, connection: UpConnection) -> bool {
        match self.entries.binary_search_by_key(&connection.key, |c| c.key) {
            Ok(_) => false,
            Err(index) => {
                self.entries.insert(index, connection);
                true
            }
        }
    }

    /// Index of `parent` in identity order
    pub fn find(&self, parent: &PandaNode) -> Option<usize> {
        self.entries.binary_search_by_key(&node_key(parent), |c| c.key).ok()
    }

    /// Remove `parent`; returns whether it was present
    pub fn erase(&mut self, parent: &PandaNode) -> bool {
        match self.find(parent) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Live parents in identity order
    pub fn parents(&self) -> Vec<Arc<PandaNode>> {
        self.entries.iter().filter_map(UpConnection::parent).collect()
    }

    /// Remove every edge
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

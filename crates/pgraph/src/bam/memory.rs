//! In-process Bam collaborator
//!
//! [`MemoryBamWriter`] writes a subgraph into a [`BamStream`]:
//! - Node records go in breadth-first order from the root, so the root is object 1.
//! - Value objects (state, effects, transform) are not encoded. They are
//!   stored by handle, and a value shared by several nodes is stored once.
//! - Id 0 is the null pointer.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::{BamError, BamObject, BamObjectRef, BamReader, BamWriter, Datagram, DatagramIterator};
use crate::attrib::{RenderEffects, RenderState, TransformState};
use crate::pipeline::Pipeline;
use crate::scene::connection::node_key;
use crate::scene::PandaNode;

#[derive(Debug, Clone)]
enum StreamObject {
    Node { type_name: &'static str, record: Datagram },
    State(Arc<RenderState>),
    Effects(Arc<RenderEffects>),
    Transform(Arc<TransformState>),
}

/// A written subgraph
#[derive(Debug, Clone, Default)]
pub struct BamStream {
    objects: Vec<StreamObject>,
}

impl BamStream {
    /// Number of objects, nodes and values together
    pub fn num_objects(&self) -> usize {
        self.objects.len()
    }

    /// Number of node records
    pub fn num_nodes(&self) -> usize {
        self.objects
            .iter()
            .filter(|object| matches!(object, StreamObject::Node { .. }))
            .count()
    }

    /// Record of node object `id`
    pub fn node_record(&self, id: u32) -> Option<&Datagram> {
        match self.object(id)? {
            StreamObject::Node { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Replace the record of node object `id`
    pub fn set_node_record(&mut self, id: u32, new_record: Datagram) -> bool {
        let index = id.checked_sub(1).map(|index| index as usize);
        match index.and_then(|index| self.objects.get_mut(index)) {
            Some(StreamObject::Node { record, .. }) => {
                *record = new_record;
                true
            }
            _ => false,
        }
    }

    fn object(&self, id: u32) -> Option<&StreamObject> {
        self.objects.get(id.checked_sub(1)? as usize)
    }
}

/// Writes a subgraph into a [`BamStream`]
#[derive(Default)]
pub struct MemoryBamWriter {
    objects: Vec<StreamObject>,
    node_ids: HashMap<usize, u32>,
    value_ids: HashMap<(u8, usize), u32>,
}

impl MemoryBamWriter {
    /// A writer with an empty stream
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `root` and everything below it, visible or stashed
    pub fn write_root(mut self, root: &Arc<PandaNode>) -> Result<BamStream, BamError> {
        let nodes = collect_subgraph(root);
        for node in &nodes {
            let id = self.next_id();
            self.node_ids.insert(node_key(node), id);
            self.objects.push(StreamObject::Node {
                type_name: node.type_name(),
                record: Datagram::new(),
            });
        }

        for (index, node) in nodes.iter().enumerate() {
            let mut dg = Datagram::new();
            node.write_datagram(&mut self, &mut dg)?;
            if let StreamObject::Node { record, .. } = &mut self.objects[index] {
                *record = dg;
            }
        }

        log::debug!("Wrote {} node(s) and {} object(s) from {}", nodes.len(), self.objects.len(), root);
        Ok(BamStream { objects: self.objects })
    }

    fn next_id(&self) -> u32 {
        u32::try_from(self.objects.len() + 1).unwrap_or(u32::MAX)
    }

    fn value_id(&mut self, tag: u8, address: usize, make: impl FnOnce() -> StreamObject) -> u32 {
        if let Some(&id) = self.value_ids.get(&(tag, address)) {
            return id;
        }
        let id = self.next_id();
        self.objects.push(make());
        self.value_ids.insert((tag, address), id);
        id
    }
}

impl BamWriter for MemoryBamWriter {
    fn has_object(&self, node: &PandaNode) -> bool {
        self.node_ids.contains_key(&node_key(node))
    }

    fn write_pointer(&mut self, datagram: &mut Datagram, object: BamObjectRef<'_>) {
        let id = match object {
            BamObjectRef::Node(node) => match self.node_ids.get(&node_key(node)) {
                Some(&id) => id,
                None => {
                    log::warn!("{} is not part of the stream; writing a null pointer", node);
                    0
                }
            },
            BamObjectRef::State(state) => {
                self.value_id(0, Arc::as_ptr(state) as usize, || StreamObject::State(Arc::clone(state)))
            }
            BamObjectRef::Effects(effects) => {
                self.value_id(1, Arc::as_ptr(effects) as usize, || StreamObject::Effects(Arc::clone(effects)))
            }
            BamObjectRef::Transform(transform) => self.value_id(2, Arc::as_ptr(transform) as usize, || {
                StreamObject::Transform(Arc::clone(transform))
            }),
        };
        datagram.add_u32(id);
    }
}

fn collect_subgraph(root: &Arc<PandaNode>) -> Vec<Arc<PandaNode>> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::from([Arc::clone(root)]);
    seen.insert(node_key(root));

    while let Some(node) = queue.pop_front() {
        let children = node.get_children();
        let stashed = node.get_stashed_children();
        for connection in children.iter().chain(stashed.iter()) {
            if seen.insert(node_key(connection.child())) {
                queue.push_back(Arc::clone(connection.child()));
            }
        }
        order.push(node);
    }
    order
}

/// Pointer ids noted while one record is read
#[derive(Default)]
struct PointerList {
    ids: Vec<u32>,
}

impl BamReader for PointerList {
    fn read_pointer(&mut self, scan: &mut DatagramIterator<'_>) -> Result<(), BamError> {
        self.ids.push(scan.get_u32()?);
        Ok(())
    }
}

/// Recreate the subgraph in `stream` on `pipeline`; the root comes first
///
/// Every node is read back as a plain node.
pub fn read_stream(pipeline: &Arc<Pipeline>, stream: &BamStream) -> Result<Vec<Arc<PandaNode>>, BamError> {
    let mut nodes: HashMap<u32, Arc<PandaNode>> = HashMap::new();
    let mut pending = Vec::new();

    for (index, object) in stream.objects.iter().enumerate() {
        let StreamObject::Node { type_name, record } = object else {
            continue;
        };
        let id = u32::try_from(index + 1).map_err(|_| BamError::UnknownObject(u32::MAX))?;
        let mut pointers = PointerList::default();
        let mut scan = DatagramIterator::new(record);
        let node = PandaNode::make_from_bam(pipeline, &mut scan, &mut pointers)?;
        if node.type_name() != *type_name {
            log::warn!("Reading {} {} back as a {}", type_name, node.name(), node.type_name());
        }
        nodes.insert(id, Arc::clone(&node));
        pending.push((id, node, pointers.ids));
    }

    let resolve = |id: u32| -> Result<BamObject, BamError> {
        if id == 0 {
            return Ok(BamObject::Null);
        }
        match stream.object(id).ok_or(BamError::UnknownObject(id))? {
            StreamObject::Node { .. } => nodes
                .get(&id)
                .map(|node| BamObject::Node(Arc::clone(node)))
                .ok_or(BamError::UnknownObject(id)),
            StreamObject::State(state) => Ok(BamObject::State(Arc::clone(state))),
            StreamObject::Effects(effects) => Ok(BamObject::Effects(Arc::clone(effects))),
            StreamObject::Transform(transform) => Ok(BamObject::Transform(Arc::clone(transform))),
        }
    };

    let mut result = Vec::with_capacity(pending.len());
    for (_, node, ids) in &pending {
        let objects = ids.iter().map(|&id| resolve(id)).collect::<Result<Vec<_>, _>>()?;
        let consumed = node.complete_pointers(&objects)?;
        if consumed != objects.len() {
            return Err(BamError::PointerCountMismatch {
                expected: consumed,
                found: objects.len(),
            });
        }
        result.push(Arc::clone(node));
    }
    drop(pending);
    Ok(result)
}

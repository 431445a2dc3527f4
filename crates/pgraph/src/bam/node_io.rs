//! Node records

use std::sync::{Arc, PoisonError};

use super::{BamError, BamObject, BamObjectRef, BamReader, BamWriter, Datagram, DatagramIterator, PendingPointers};
use crate::pipeline::Pipeline;
use crate::scene::connection::{DownConnection, UpConnection};
use crate::scene::{CollideMask, DrawMask, PandaNode};

impl PandaNode {
    /// Write this node's name and its stage-0 record
    ///
    /// Only parents the writer also writes are recorded.
    pub fn write_datagram(&self, manager: &mut dyn BamWriter, dg: &mut Datagram) -> Result<(), BamError> {
        dg.add_string(&self.name())?;

        let cdata = self.read_data(0);
        manager.write_pointer(dg, BamObjectRef::State(&cdata.state));
        manager.write_pointer(dg, BamObjectRef::Effects(&cdata.effects));
        manager.write_pointer(dg, BamObjectRef::Transform(&cdata.transform));

        dg.add_u32(cdata.draw_mask.bits());
        dg.add_u32(cdata.into_collide_mask.bits());

        let parents: Vec<_> = cdata
            .up
            .parents()
            .into_iter()
            .filter(|parent| manager.has_object(parent))
            .collect();
        dg.add_count(parents.len())?;
        for parent in &parents {
            manager.write_pointer(dg, BamObjectRef::Node(parent));
        }

        for list in [&cdata.down, &cdata.stashed] {
            dg.add_count(list.len())?;
            for connection in list {
                manager.write_pointer(dg, BamObjectRef::Node(connection.child()));
                dg.add_i32(connection.sort());
            }
        }

        let num_tags = u32::try_from(cdata.tag_data.len())
            .map_err(|_| BamError::TooLong { len: cdata.tag_data.len(), max: u32::MAX as usize })?;
        dg.add_u32(num_tags);
        for (key, value) in &cdata.tag_data {
            dg.add_string(key)?;
            dg.add_string(value)?;
        }
        Ok(())
    }

    /// Create a plain node from a record written by [`write_datagram`](Self::write_datagram)
    pub fn make_from_bam(
        pipeline: &Arc<Pipeline>,
        scan: &mut DatagramIterator<'_>,
        manager: &mut dyn BamReader,
    ) -> Result<Arc<PandaNode>, BamError> {
        let node = PandaNode::new(pipeline, "");
        node.fillin(scan, manager)?;
        Ok(node)
    }

    /// Read this node's record; pointers stay pending until [`complete_pointers`](Self::complete_pointers)
    pub fn fillin(&self, scan: &mut DatagramIterator<'_>, manager: &mut dyn BamReader) -> Result<(), BamError> {
        self.set_name(scan.get_string()?);

        for _ in 0..3 {
            manager.read_pointer(scan)?;
        }
        let draw_mask = DrawMask::from_bits_retain(scan.get_u32()?);
        let into_collide_mask = CollideMask::from_bits_retain(scan.get_u32()?);

        let num_up = usize::from(scan.get_u16()?);
        for _ in 0..num_up {
            manager.read_pointer(scan)?;
        }

        let mut read_children = |scan: &mut DatagramIterator<'_>| -> Result<Vec<i32>, BamError> {
            let count = usize::from(scan.get_u16()?);
            let mut sorts = Vec::with_capacity(count);
            for _ in 0..count {
                manager.read_pointer(scan)?;
                sorts.push(scan.get_i32()?);
            }
            Ok(sorts)
        };
        let down_sorts = read_children(scan)?;
        let stashed_sorts = read_children(scan)?;

        let num_tags = scan.get_u32()?;
        let mut tags = Vec::new();
        for _ in 0..num_tags {
            let key = scan.get_string()?;
            let value = scan.get_string()?;
            tags.push((key, value));
        }

        {
            let mut cdata = self.write_stage(0);
            cdata.draw_mask = draw_mask;
            cdata.into_collide_mask = into_collide_mask;
            cdata.tag_data.extend(tags);
        }

        *self.bam_pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(PendingPointers {
            num_up,
            down_sorts,
            stashed_sorts,
        });
        Ok(())
    }

    /// Resolve the pointers noted by [`fillin`](Self::fillin), in the order they were read
    ///
    /// Returns the number of pointers consumed. The loaded record is then
    /// shared by every pipeline stage.
    pub fn complete_pointers(self: &Arc<Self>, objects: &[BamObject]) -> Result<usize, BamError> {
        let Some(pending) = self.bam_pending.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return Ok(0);
        };
        let expected = pending.num_pointers();
        if objects.len() < expected {
            return Err(BamError::PointerCountMismatch {
                expected,
                found: objects.len(),
            });
        }

        let mut pointers = objects.iter();
        let mut next = || pointers.next().cloned().unwrap_or(BamObject::Null);

        let state = match next() {
            BamObject::State(state) => state,
            other => return Err(unexpected("RenderState", &other)),
        };
        let effects = match next() {
            BamObject::Effects(effects) => effects,
            other => return Err(unexpected("RenderEffects", &other)),
        };
        let transform = match next() {
            BamObject::Transform(transform) => transform,
            other => return Err(unexpected("TransformState", &other)),
        };

        let mut parents = Vec::with_capacity(pending.num_up);
        for _ in 0..pending.num_up {
            match next() {
                BamObject::Node(parent) => parents.push(parent),
                BamObject::Null => {}
                other => return Err(unexpected("PandaNode", &other)),
            }
        }

        let mut read_list = |sorts: &[i32]| -> Result<Vec<DownConnection>, BamError> {
            let mut list = Vec::with_capacity(sorts.len());
            for &sort in sorts {
                match next() {
                    BamObject::Node(child) => list.push(DownConnection::new(child, sort)),
                    BamObject::Null => {}
                    other => return Err(unexpected("PandaNode", &other)),
                }
            }
            Ok(list)
        };
        let down = read_list(&pending.down_sorts)?;
        let stashed = read_list(&pending.stashed_sorts)?;

        {
            let mut cdata = self.write_stage(0);
            cdata.state = state;
            cdata.effects = effects;
            cdata.prev_transform = Arc::clone(&transform);
            cdata.transform = transform;
            cdata.up.clear();
            for parent in &parents {
                cdata.up.insert(UpConnection::new(parent));
            }
            for connection in down {
                cdata.down.push(connection);
            }
            for connection in stashed {
                cdata.stashed.push(connection);
            }
            cdata.stale_child_cache = true;
            cdata.child_cache_generation += 1;
        }
        self.force_bound_stale(0);
        self.copy_to_all_stages(0);
        Ok(expected)
    }
}

fn unexpected(expected: &'static str, found: &BamObject) -> BamError {
    BamError::UnexpectedObject {
        expected,
        found: found.kind_name(),
    }
}

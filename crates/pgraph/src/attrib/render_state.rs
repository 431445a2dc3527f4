//! Immutable render state: a set of attributes keyed by slot

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Enables and disables named clip planes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipPlaneAttrib {
    on_planes: BTreeSet<String>,
    off_planes: BTreeSet<String>,
}

impl ClipPlaneAttrib {
    /// Attribute touching no planes
    pub fn make() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attribute disabling the named planes
    pub fn make_off<I, S>(planes: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            on_planes: BTreeSet::new(),
            off_planes: planes.into_iter().map(Into::into).collect(),
        })
    }

    /// Copy with `plane` enabled
    pub fn add_on_plane(&self, plane: impl Into<String>) -> Arc<Self> {
        let plane = plane.into();
        let mut result = self.clone();
        result.off_planes.remove(&plane);
        result.on_planes.insert(plane);
        Arc::new(result)
    }

    /// Copy with `plane` disabled
    pub fn add_off_plane(&self, plane: impl Into<String>) -> Arc<Self> {
        let plane = plane.into();
        let mut result = self.clone();
        result.on_planes.remove(&plane);
        result.off_planes.insert(plane);
        Arc::new(result)
    }

    /// Planes this attribute enables
    pub fn on_planes(&self) -> &BTreeSet<String> {
        &self.on_planes
    }

    /// Planes this attribute disables
    pub fn off_planes(&self) -> &BTreeSet<String> {
        &self.off_planes
    }

    /// Whether `plane` is disabled
    pub fn has_off_plane(&self, plane: &str) -> bool {
        self.off_planes.contains(plane)
    }

    /// Whether no plane is named
    pub fn is_empty(&self) -> bool {
        self.on_planes.is_empty() && self.off_planes.is_empty()
    }

    /// Keep this attribute's planes and add every plane `other` disables
    pub fn compose_off(&self, other: &ClipPlaneAttrib) -> Arc<Self> {
        let mut result = self.clone();
        result.off_planes.extend(other.off_planes.iter().cloned());
        Arc::new(result)
    }

    /// Later attribute wins plane by plane
    fn compose(&self, other: &ClipPlaneAttrib) -> Self {
        let mut result = self.clone();
        for plane in &other.on_planes {
            result.off_planes.remove(plane);
            result.on_planes.insert(plane.clone());
        }
        for plane in &other.off_planes {
            result.on_planes.remove(plane);
            result.off_planes.insert(plane.clone());
        }
        result
    }
}

/// One render attribute
#[derive(Debug, Clone, PartialEq)]
pub enum RenderAttrib {
    /// Clip plane enable/disable set
    ClipPlane(ClipPlaneAttrib),
    /// Flat color override (RGBA)
    Color([f32; 4]),
    /// Depth buffer writes
    DepthWrite(bool),
    /// Alpha blending
    Transparency(bool),
    /// Cull bin assignment
    CullBin {
        /// Bin name
        name: String,
        /// Draw order within the bin
        draw_order: i32,
    },
}

/// Slot an attribute occupies within a [`RenderState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttribSlot {
    /// [`RenderAttrib::ClipPlane`]
    ClipPlane,
    /// [`RenderAttrib::Color`]
    Color,
    /// [`RenderAttrib::DepthWrite`]
    DepthWrite,
    /// [`RenderAttrib::Transparency`]
    Transparency,
    /// [`RenderAttrib::CullBin`]
    CullBin,
}

impl RenderAttrib {
    /// Slot this attribute occupies
    pub fn slot(&self) -> AttribSlot {
        match self {
            Self::ClipPlane(_) => AttribSlot::ClipPlane,
            Self::Color(_) => AttribSlot::Color,
            Self::DepthWrite(_) => AttribSlot::DepthWrite,
            Self::Transparency(_) => AttribSlot::Transparency,
            Self::CullBin { .. } => AttribSlot::CullBin,
        }
    }

    /// Combine with the attribute of the same slot from a lower node
    fn compose(&self, other: &RenderAttrib) -> RenderAttrib {
        match (self, other) {
            (Self::ClipPlane(a), Self::ClipPlane(b)) => Self::ClipPlane(a.compose(b)),
            _ => other.clone(),
        }
    }
}

impl fmt::Display for RenderAttrib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClipPlane(attrib) => {
                write!(f, "ClipPlaneAttrib:")?;
                for plane in &attrib.on_planes {
                    write!(f, " on {plane}")?;
                }
                for plane in &attrib.off_planes {
                    write!(f, " off {plane}")?;
                }
                Ok(())
            }
            Self::Color([r, g, b, a]) => write!(f, "ColorAttrib:({r} {g} {b} {a})"),
            Self::DepthWrite(on) => write!(f, "DepthWriteAttrib:{}", if *on { "on" } else { "off" }),
            Self::Transparency(on) => write!(f, "TransparencyAttrib:{}", if *on { "alpha" } else { "none" }),
            Self::CullBin { name, draw_order } => write!(f, "CullBinAttrib:{name},{draw_order}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct AttribEntry {
    attrib: Arc<RenderAttrib>,
    override_priority: i32,
}

/// An immutable set of render attributes, one per slot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderState {
    attribs: BTreeMap<AttribSlot, AttribEntry>,
}

impl RenderState {
    /// The empty state
    pub fn make_empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// State holding a single attribute
    pub fn make(attrib: RenderAttrib, override_priority: i32) -> Arc<Self> {
        Self::default().add_attrib(attrib, override_priority)
    }

    /// Whether no attribute is set
    pub fn is_empty(&self) -> bool {
        self.attribs.is_empty()
    }

    /// Number of attributes set
    pub fn len(&self) -> usize {
        self.attribs.len()
    }

    /// Copy with `attrib` replacing whatever occupied its slot
    pub fn add_attrib(&self, attrib: RenderAttrib, override_priority: i32) -> Arc<Self> {
        let mut result = self.clone();
        result.attribs.insert(
            attrib.slot(),
            AttribEntry {
                attrib: Arc::new(attrib),
                override_priority,
            },
        );
        Arc::new(result)
    }

    /// Copy with `slot` cleared
    pub fn remove_attrib(&self, slot: AttribSlot) -> Arc<Self> {
        let mut result = self.clone();
        result.attribs.remove(&slot);
        Arc::new(result)
    }

    /// Attribute in `slot`, if any
    pub fn get_attrib(&self, slot: AttribSlot) -> Option<&Arc<RenderAttrib>> {
        self.attribs.get(&slot).map(|entry| &entry.attrib)
    }

    /// Override priority of the attribute in `slot`
    pub fn get_override(&self, slot: AttribSlot) -> Option<i32> {
        self.attribs.get(&slot).map(|entry| entry.override_priority)
    }

    /// Whether `slot` is set
    pub fn has_attrib(&self, slot: AttribSlot) -> bool {
        self.attribs.contains_key(&slot)
    }

    /// Clip plane attribute, if any
    pub fn get_clip_plane(&self) -> Option<&ClipPlaneAttrib> {
        match self.get_attrib(AttribSlot::ClipPlane).map(|attrib| &**attrib) {
            Some(RenderAttrib::ClipPlane(attrib)) => Some(attrib),
            _ => None,
        }
    }

    /// This state followed by a child's `other`
    ///
    /// The child's attribute wins a slot unless this state's override is higher.
    pub fn compose(&self, other: &RenderState) -> Arc<Self> {
        let mut result = self.clone();
        for (slot, entry) in &other.attribs {
            let composed = match self.attribs.get(slot) {
                Some(mine) if mine.override_priority > entry.override_priority => mine.clone(),
                Some(mine) => AttribEntry {
                    attrib: Arc::new(mine.attrib.compose(&entry.attrib)),
                    override_priority: entry.override_priority,
                },
                None => entry.clone(),
            };
            result.attribs.insert(*slot, composed);
        }
        Arc::new(result)
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("S:(")?;
        for (i, entry) in self.attribs.values().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", entry.attrib)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove_attrib() {
        let state = RenderState::make_empty();
        assert!(state.is_empty());

        let state = state.add_attrib(RenderAttrib::DepthWrite(false), 0);
        let state = state.add_attrib(RenderAttrib::DepthWrite(true), 1);
        assert_eq!(state.len(), 1);
        assert_eq!(**state.get_attrib(AttribSlot::DepthWrite).unwrap(), RenderAttrib::DepthWrite(true));
        assert_eq!(state.get_override(AttribSlot::DepthWrite), Some(1));

        let state = state.remove_attrib(AttribSlot::DepthWrite);
        assert!(state.is_empty());
    }

    #[test]
    fn test_compose_respects_override() {
        let parent = RenderState::make(RenderAttrib::Color([1.0, 0.0, 0.0, 1.0]), 2);
        let child = RenderState::make(RenderAttrib::Color([0.0, 1.0, 0.0, 1.0]), 0);
        let net = parent.compose(&child);
        assert_eq!(**net.get_attrib(AttribSlot::Color).unwrap(), RenderAttrib::Color([1.0, 0.0, 0.0, 1.0]));

        let net = child.compose(&parent);
        assert_eq!(**net.get_attrib(AttribSlot::Color).unwrap(), RenderAttrib::Color([1.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_clip_plane_compose_off() {
        let own = ClipPlaneAttrib::make().add_on_plane("water").add_off_plane("sky");
        let child = ClipPlaneAttrib::make_off(["ground"]);
        let merged = own.compose_off(&child);
        assert!(merged.on_planes().contains("water"));
        assert!(merged.has_off_plane("sky"));
        assert!(merged.has_off_plane("ground"));

        let state = RenderState::make(RenderAttrib::ClipPlane((*merged).clone()), 0);
        assert_eq!(state.get_clip_plane(), Some(&*merged));
    }
}

//! Immutable per-node special effects

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A special effect applied to a node and its subtree
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEffect {
    /// Rotate to face the camera
    Billboard {
        /// Rotate about the up axis only
        axial: bool,
    },
    /// Draw children as decals onto this node's geometry
    Decal,
    /// Draw the node's bounding volume
    ShowBounds {
        /// Show the tight bound rather than the cached one
        tight: bool,
    },
}

/// Slot an effect occupies within [`RenderEffects`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EffectSlot {
    /// [`RenderEffect::Billboard`]
    Billboard,
    /// [`RenderEffect::Decal`]
    Decal,
    /// [`RenderEffect::ShowBounds`]
    ShowBounds,
}

impl RenderEffect {
    /// Slot this effect occupies
    pub fn slot(&self) -> EffectSlot {
        match self {
            Self::Billboard { .. } => EffectSlot::Billboard,
            Self::Decal => EffectSlot::Decal,
            Self::ShowBounds { .. } => EffectSlot::ShowBounds,
        }
    }
}

impl fmt::Display for RenderEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Billboard { axial: true } => f.write_str("BillboardEffect:axial"),
            Self::Billboard { axial: false } => f.write_str("BillboardEffect"),
            Self::Decal => f.write_str("DecalEffect"),
            Self::ShowBounds { tight: true } => f.write_str("ShowBoundsEffect:tight"),
            Self::ShowBounds { tight: false } => f.write_str("ShowBoundsEffect"),
        }
    }
}

/// An immutable set of effects, one per slot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderEffects {
    effects: BTreeMap<EffectSlot, Arc<RenderEffect>>,
}

impl RenderEffects {
    /// No effects
    pub fn make_empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether no effect is set
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Copy with `effect` replacing whatever occupied its slot
    pub fn add_effect(&self, effect: RenderEffect) -> Arc<Self> {
        let mut result = self.clone();
        result.effects.insert(effect.slot(), Arc::new(effect));
        Arc::new(result)
    }

    /// Copy with `slot` cleared
    pub fn remove_effect(&self, slot: EffectSlot) -> Arc<Self> {
        let mut result = self.clone();
        result.effects.remove(&slot);
        Arc::new(result)
    }

    /// Effect in `slot`, if any
    pub fn get_effect(&self, slot: EffectSlot) -> Option<&Arc<RenderEffect>> {
        self.effects.get(&slot)
    }

    /// Whether `slot` is set
    pub fn has_effect(&self, slot: EffectSlot) -> bool {
        self.effects.contains_key(&slot)
    }
}

impl fmt::Display for RenderEffects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("E:(")?;
        for (i, effect) in self.effects.values().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{effect}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_slots_replace() {
        let effects = RenderEffects::make_empty()
            .add_effect(RenderEffect::Billboard { axial: false })
            .add_effect(RenderEffect::Billboard { axial: true })
            .add_effect(RenderEffect::Decal);
        assert!(effects.has_effect(EffectSlot::Decal));
        assert_eq!(**effects.get_effect(EffectSlot::Billboard).unwrap(), RenderEffect::Billboard { axial: true });
        assert_eq!(effects.to_string(), "E:(BillboardEffect:axial DecalEffect)");
        assert!(effects.remove_effect(EffectSlot::Decal).remove_effect(EffectSlot::Billboard).is_empty());
    }
}

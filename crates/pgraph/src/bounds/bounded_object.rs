//! Per-stage bounding volume cache
//!
//! A [`BoundedObject`] tracks `{fresh, stale}` per pipeline stage and keeps
//! the last computed volume. Owners mark it stale when their content changes
//! and pass a recompute closure to [`BoundedObject::get_or_recompute`].

use std::sync::Arc;

use super::{BoundingVolume, BoundingVolumeType};
use crate::pipeline::{CycleData, PipelineCycler};

#[derive(Debug, Clone)]
struct BoundData {
    bound: Arc<BoundingVolume>,
    bound_type: BoundingVolumeType,
    stale: bool,
    fixed: bool,
    generation: u64,
}

impl CycleData for BoundData {}

/// Lazily computed bounding volume, one per pipeline stage
#[derive(Debug)]
pub struct BoundedObject {
    cycler: PipelineCycler<BoundData>,
}

impl BoundedObject {
    /// Create a stale cache computing `bound_type` volumes
    pub fn new(bound_type: BoundingVolumeType, num_stages: usize) -> Self {
        let data = BoundData {
            bound: Arc::new(BoundingVolume::Empty),
            bound_type,
            stale: true,
            fixed: false,
            generation: 0,
        };
        Self {
            cycler: PipelineCycler::new(data, num_stages),
        }
    }

    /// Mark the cached volume stale at `stage`
    ///
    /// Returns `true` only on a fresh-to-stale transition, so callers
    /// propagate to ancestors once and stop at an already-stale node.
    pub fn mark_stale(&self, stage: usize) -> bool {
        let mut cdata = self.cycler.write_stage(stage);
        cdata.generation += 1;
        if cdata.stale || cdata.fixed {
            return false;
        }
        cdata.stale = true;
        true
    }

    /// Mark the cached volume stale even if it already is
    pub fn force_stale(&self, stage: usize) {
        let mut cdata = self.cycler.write_stage(stage);
        cdata.generation += 1;
        if !cdata.fixed {
            cdata.stale = true;
        }
    }

    /// Whether the next read at `stage` recomputes
    pub fn is_stale(&self, stage: usize) -> bool {
        self.cycler.read(stage).stale
    }

    /// Volume kind computed at `stage`
    pub fn bound_type(&self, stage: usize) -> BoundingVolumeType {
        self.cycler.read(stage).bound_type
    }

    /// Change the computed volume kind; drops any fixed volume
    pub fn set_bound_type(&self, bound_type: BoundingVolumeType, stage: usize) {
        let mut cdata = self.cycler.write_stage(stage);
        cdata.bound_type = bound_type;
        cdata.fixed = false;
        cdata.stale = true;
        cdata.generation += 1;
    }

    /// Pin the cache to an explicit volume; it never goes stale until cleared
    pub fn set_fixed(&self, volume: BoundingVolume, stage: usize) {
        let mut cdata = self.cycler.write_stage(stage);
        cdata.bound = Arc::new(volume);
        cdata.fixed = true;
        cdata.stale = false;
        cdata.generation += 1;
    }

    /// Return to computed volumes
    pub fn clear_fixed(&self, stage: usize) {
        let mut cdata = self.cycler.write_stage(stage);
        cdata.fixed = false;
        cdata.stale = true;
        cdata.generation += 1;
    }

    /// Whether the volume at `stage` was pinned explicitly
    pub fn is_fixed(&self, stage: usize) -> bool {
        self.cycler.read(stage).fixed
    }

    /// Current volume at `stage`, recomputing it first if stale
    ///
    /// The recompute runs without any lock held. Its result is stored only
    /// if nothing marked the cache stale in the meantime.
    pub fn get_or_recompute<F>(&self, stage: usize, recompute: F) -> Arc<BoundingVolume>
    where
        F: FnOnce(BoundingVolumeType) -> BoundingVolume,
    {
        let cdata = self.cycler.read(stage);
        if !cdata.stale {
            return Arc::clone(&cdata.bound);
        }
        let generation = cdata.generation;
        let bound_type = cdata.bound_type;
        drop(cdata);

        let bound = Arc::new(recompute(bound_type));

        let mut cdata = self.cycler.write_stage(stage);
        if cdata.generation == generation {
            cdata.bound = Arc::clone(&bound);
            cdata.stale = false;
        }
        bound
    }

    /// Last stored volume at `stage`, without recomputing
    pub fn cached(&self, stage: usize) -> Arc<BoundingVolume> {
        Arc::clone(&self.cycler.read(stage).bound)
    }

    /// Copy the state at `stage` into every stage
    pub fn copy_to_all_stages(&self, stage: usize) {
        self.cycler.copy_to_all_stages(stage);
    }

    /// Advance the per-stage records
    pub fn cycle(&self) {
        self.cycler.cycle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use std::cell::Cell;

    #[test]
    fn test_mark_stale_is_idempotent() {
        let bounded = BoundedObject::new(BoundingVolumeType::Sphere, 1);
        assert!(bounded.is_stale(0));
        assert!(!bounded.mark_stale(0));

        bounded.get_or_recompute(0, |_| BoundingVolume::Empty);
        assert!(!bounded.is_stale(0));
        assert!(bounded.mark_stale(0));
        assert!(!bounded.mark_stale(0));
    }

    #[test]
    fn test_recompute_runs_only_when_stale() {
        let bounded = BoundedObject::new(BoundingVolumeType::Sphere, 1);
        let calls = Cell::new(0);
        let compute = |ty: BoundingVolumeType| {
            calls.set(calls.get() + 1);
            assert_eq!(ty, BoundingVolumeType::Sphere);
            BoundingVolume::sphere(Vec3::zeros(), 2.0)
        };

        let first = bounded.get_or_recompute(0, compute);
        let second = bounded.get_or_recompute(0, compute);
        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_fixed_volume_never_stale() {
        let bounded = BoundedObject::new(BoundingVolumeType::Box, 2);
        let fixed = BoundingVolume::sphere(Vec3::zeros(), 5.0);
        bounded.set_fixed(fixed.clone(), 0);
        assert!(!bounded.mark_stale(0));
        assert!(!bounded.is_stale(0));
        assert_eq!(*bounded.get_or_recompute(0, |_| BoundingVolume::Infinite), fixed);

        bounded.clear_fixed(0);
        assert!(bounded.get_or_recompute(0, |_| BoundingVolume::Infinite).is_infinite());
    }

    #[test]
    fn test_stages_are_independent() {
        let bounded = BoundedObject::new(BoundingVolumeType::Sphere, 2);
        bounded.get_or_recompute(0, |_| BoundingVolume::Infinite);
        assert!(!bounded.is_stale(0));
        assert!(bounded.is_stale(1));
        bounded.cycle();
        assert!(!bounded.is_stale(1));
        assert!(bounded.cached(1).is_infinite());
    }
}

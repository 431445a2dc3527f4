//! # Pipeline stages
//!
//! A [`Pipeline`] owns the stage count shared by every cycler created on it
//! and the rotation primitive that advances the stages once per frame.
//!
//! - Stage 0 belongs to the application thread, which mutates the graph.
//! - Higher stages belong to cull/draw threads, each reading its own
//!   snapshot of the frame it is working on.
//! - [`Pipeline::cycle`] is called at the frame boundary, while no thread
//!   holds a stage writer. It shifts each stage's record one stage down.
//!
//! The calling thread's stage is thread-local; see [`enter_stage`] and
//! [`current_stage`].

pub mod cycler;

pub use cycler::{CycleData, CycleReader, CycleWriter, CyclerLock, PipelineCycler};

use std::cell::Cell;
use std::ops::{Range, RangeInclusive};
use std::iter::Rev;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::core::GraphConfig;

/// Something with per-stage data that advances when the pipeline cycles
pub trait Cyclable: Send + Sync {
    /// Shift each stage's record one stage downstream
    fn cycle(&self);
}

/// Explicitly constructed pipeline shared by every node created on it
pub struct Pipeline {
    num_stages: usize,
    config: GraphConfig,
    cyclers: Mutex<Vec<Weak<dyn Cyclable>>>,
    cycle_count: AtomicU64,
}

impl Pipeline {
    /// Create a pipeline with `num_stages` stages and default settings
    pub fn new(num_stages: usize) -> Arc<Self> {
        Self::from_config(&GraphConfig::default().with_pipeline_stages(num_stages))
    }

    /// Create a single-stage pipeline
    pub fn single_stage() -> Arc<Self> {
        Self::new(1)
    }

    /// Create a pipeline from a loaded configuration
    pub fn from_config(config: &GraphConfig) -> Arc<Self> {
        let num_stages = Self::effective_stages(config.num_pipeline_stages);
        log::debug!("Creating pipeline with {num_stages} stage(s)");
        Arc::new(Self {
            num_stages,
            config: config.clone(),
            cyclers: Mutex::new(Vec::new()),
            cycle_count: AtomicU64::new(0),
        })
    }

    #[cfg(feature = "pipelining")]
    fn effective_stages(requested: usize) -> usize {
        use crate::core::MAX_PIPELINE_STAGES;
        if requested > MAX_PIPELINE_STAGES {
            log::warn!("Requested {requested} pipeline stages; clamping to {MAX_PIPELINE_STAGES}");
        }
        requested.clamp(1, MAX_PIPELINE_STAGES)
    }

    #[cfg(not(feature = "pipelining"))]
    fn effective_stages(requested: usize) -> usize {
        if requested > 1 {
            log::warn!("Pipelining is compiled out; using 1 stage instead of {requested}");
        }
        1
    }

    /// Number of stages every cycler on this pipeline holds
    pub fn num_stages(&self) -> usize {
        self.num_stages
    }

    /// Settings this pipeline was built from
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Number of completed [`cycle`](Self::cycle) calls
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count.load(Ordering::Acquire)
    }

    /// Number of live registered cyclers
    pub fn num_cyclers(&self) -> usize {
        let cyclers = self.cyclers.lock().unwrap_or_else(PoisonError::into_inner);
        cyclers.iter().filter(|c| c.strong_count() > 0).count()
    }

    /// Register a cyclable object; dead entries are pruned on the next cycle
    pub fn register(&self, cyclable: Weak<dyn Cyclable>) {
        let mut cyclers = self.cyclers.lock().unwrap_or_else(PoisonError::into_inner);
        cyclers.push(cyclable);
    }

    /// Advance every registered cycler by one stage
    pub fn cycle(&self) {
        let live: Vec<Arc<dyn Cyclable>> = {
            let mut cyclers = self.cyclers.lock().unwrap_or_else(PoisonError::into_inner);
            cyclers.retain(|c| c.strong_count() > 0);
            cyclers.iter().filter_map(Weak::upgrade).collect()
        };

        if self.num_stages > 1 {
            for cyclable in &live {
                cyclable.cycle();
            }
        }

        let frame = self.cycle_count.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!("Pipeline cycle {} advanced {} cycler(s)", frame, live.len());
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("num_stages", &self.num_stages)
            .field("cycle_count", &self.cycle_count())
            .finish_non_exhaustive()
    }
}

thread_local! {
    static CURRENT_STAGE: Cell<usize> = const { Cell::new(0) };
}

/// Stage the calling thread reads and writes by default
pub fn current_stage() -> usize {
    CURRENT_STAGE.with(Cell::get)
}

/// Switch the calling thread to `stage` until the guard is dropped
pub fn enter_stage(stage: usize) -> StageGuard {
    let previous = CURRENT_STAGE.with(|current| current.replace(stage));
    StageGuard { previous }
}

/// Restores the previous thread stage on drop
#[must_use = "the stage reverts when the guard is dropped"]
pub struct StageGuard {
    previous: usize,
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        CURRENT_STAGE.with(|current| current.set(self.previous));
    }
}

/// Iterator over pipeline stage indices
///
/// - [`StageRange::current_and_upstream`] yields `current, current-1, ..., 0`,
///   the stages an application-side edit must touch.
/// - [`StageRange::all`] yields `0..count`, every stage a cycler holds.
#[derive(Debug, Clone)]
pub struct StageRange {
    inner: StageIter,
}

#[derive(Debug, Clone)]
enum StageIter {
    Upstream(Rev<RangeInclusive<usize>>),
    All(Range<usize>),
}

impl StageRange {
    /// The calling thread's stage and every stage before it, descending
    pub fn current_and_upstream() -> Self {
        Self::upstream_of(current_stage())
    }

    /// `stage` and every stage before it, descending
    pub fn upstream_of(stage: usize) -> Self {
        Self {
            inner: StageIter::Upstream((0..=stage).rev()),
        }
    }

    /// Every stage of a cycler with `count` stages
    pub fn all(count: usize) -> Self {
        Self {
            inner: StageIter::All(0..count),
        }
    }
}

impl Iterator for StageRange {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match &mut self.inner {
            StageIter::Upstream(range) => range.next(),
            StageIter::All(range) => range.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingCyclable(AtomicUsize);

    impl Cyclable for CountingCyclable {
        fn cycle(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_stage_ranges() {
        assert_eq!(StageRange::upstream_of(2).collect::<Vec<_>>(), vec![2, 1, 0]);
        assert_eq!(StageRange::all(3).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(StageRange::current_and_upstream().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_enter_stage_restores_previous() {
        assert_eq!(current_stage(), 0);
        {
            let _outer = enter_stage(2);
            assert_eq!(current_stage(), 2);
            {
                let _inner = enter_stage(1);
                assert_eq!(StageRange::current_and_upstream().collect::<Vec<_>>(), vec![1, 0]);
            }
            assert_eq!(current_stage(), 2);
        }
        assert_eq!(current_stage(), 0);
    }

    #[test]
    fn test_cycle_reaches_live_cyclers_and_prunes_dead() {
        let pipeline = Pipeline::new(2);
        let live = Arc::new(CountingCyclable(AtomicUsize::new(0)));
        let dead = Arc::new(CountingCyclable(AtomicUsize::new(0)));
        let live_weak: Weak<dyn Cyclable> = Arc::downgrade(&live) as Weak<dyn Cyclable>;
        let dead_weak: Weak<dyn Cyclable> = Arc::downgrade(&dead) as Weak<dyn Cyclable>;
        pipeline.register(live_weak);
        pipeline.register(dead_weak);
        drop(dead);

        pipeline.cycle();
        pipeline.cycle();
        assert_eq!(live.0.load(Ordering::SeqCst), 2);
        assert_eq!(pipeline.num_cyclers(), 1);
        assert_eq!(pipeline.cycle_count(), 2);
    }

    #[cfg(feature = "pipelining")]
    #[test]
    fn test_from_config_uses_stage_count() {
        let pipeline = Pipeline::from_config(&GraphConfig::new().with_pipeline_stages(3));
        assert_eq!(pipeline.num_stages(), 3);
        assert_eq!(Pipeline::single_stage().num_stages(), 1);
    }

    #[cfg(feature = "pipelining")]
    #[test]
    fn test_stage_count_is_clamped() {
        assert_eq!(Pipeline::new(100).num_stages(), crate::core::MAX_PIPELINE_STAGES);
        assert_eq!(Pipeline::new(0).num_stages(), 1);
    }
}

//! Multi-stage copy-on-write storage for per-node records
//!
//! A [`PipelineCycler`] keeps one `Arc<T>` per pipeline stage. Stages alias
//! the same record until a writer touches one of them, at which point that
//! stage forks a private copy through [`CycleData::make_copy`]. Readers hold
//! an `Arc` snapshot, so a reader never observes a writer's edits and never
//! blocks once it has its snapshot.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockWriteGuard};

/// Data record stored per pipeline stage
pub trait CycleData: Clone + Send + Sync + 'static {
    /// Produce the private copy a stage forks when it diverges from its neighbours
    fn make_copy(&self) -> Self {
        self.clone()
    }
}

thread_local! {
    static THREAD_TOKEN: u8 = 0;
}

/// Nonzero identifier for the calling thread, used to catch re-entrant writers
fn thread_token() -> usize {
    THREAD_TOKEN.with(|token| token as *const u8 as usize)
}

struct StageSlot<T> {
    data: RwLock<Arc<T>>,
    writer: AtomicUsize,
}

/// Holds one independently mutable record per pipeline stage
pub struct PipelineCycler<T: CycleData> {
    stages: Box<[StageSlot<T>]>,
    lock: Mutex<()>,
}

impl<T: CycleData> PipelineCycler<T> {
    /// Create a cycler whose stages all alias `initial`
    pub fn new(initial: T, num_stages: usize) -> Self {
        assert!(num_stages > 0, "a cycler needs at least one stage");
        let shared = Arc::new(initial);
        let stages = (0..num_stages)
            .map(|_| StageSlot {
                data: RwLock::new(Arc::clone(&shared)),
                writer: AtomicUsize::new(0),
            })
            .collect();

        Self {
            stages,
            lock: Mutex::new(()),
        }
    }

    /// Number of stages held
    pub fn get_num_stages(&self) -> usize {
        self.stages.len()
    }

    fn slot(&self, stage: usize) -> &StageSlot<T> {
        assert!(
            stage < self.stages.len(),
            "pipeline stage {} out of range (cycler has {} stages)",
            stage,
            self.stages.len()
        );
        &self.stages[stage]
    }

    fn snapshot(&self, stage: usize) -> Arc<T> {
        let slot = self.slot(stage);
        let data = slot.data.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&data)
    }

    /// Acquire a read snapshot of one stage
    pub fn read(&self, stage: usize) -> CycleReader<T> {
        CycleReader {
            data: self.snapshot(stage),
            stage,
        }
    }

    /// Acquire exclusive write access to one stage
    ///
    /// If the stage record is shared with another stage or an outstanding
    /// reader, it is forked first so nobody else observes the edit.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread already holds a writer on this stage.
    pub fn write_stage(&self, stage: usize) -> CycleWriter<'_, T> {
        let slot = self.slot(stage);
        let token = thread_token();
        assert!(
            slot.writer.load(Ordering::Acquire) != token,
            "pipeline stage {stage} is already being written by this thread"
        );

        let mut guard = slot.data.write().unwrap_or_else(PoisonError::into_inner);
        slot.writer.store(token, Ordering::Release);

        if Arc::strong_count(&guard) > 1 {
            let forked = guard.make_copy();
            *guard = Arc::new(forked);
        }

        CycleWriter {
            guard,
            writer: &slot.writer,
            stage,
        }
    }

    /// Upgrade a read snapshot to a writer on the same stage
    ///
    /// The writer sees the newest record for the stage, which may be newer
    /// than the snapshot the reader held.
    pub fn elevate(&self, reader: CycleReader<T>) -> CycleWriter<'_, T> {
        let stage = reader.stage;
        drop(reader);
        self.write_stage(stage)
    }

    /// Coarse lock for compound edits spanning several cyclers
    pub fn lock(&self) -> CyclerLock<'_> {
        CyclerLock {
            _guard: self.lock.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Whether `stage` owns its record rather than aliasing another stage's
    pub fn is_stage_unique(&self, stage: usize) -> bool {
        let data = self.snapshot(stage);
        (0..self.stages.len())
            .filter(|&other| other != stage)
            .all(|other| !Arc::ptr_eq(&data, &self.snapshot(other)))
    }

    /// Advance the pipeline: every stage takes the record of the stage before it
    pub fn cycle(&self) {
        let mut displaced = Vec::with_capacity(self.stages.len().saturating_sub(1));
        for stage in (1..self.stages.len()).rev() {
            let source = self.snapshot(stage - 1);
            let mut dest = self.stages[stage].data.write().unwrap_or_else(PoisonError::into_inner);
            displaced.push(std::mem::replace(&mut *dest, source));
        }
        // Old records may own nodes; release them with no slot locked
        drop(displaced);
    }

    /// Alias every stage to the record currently held by `from`
    pub fn copy_to_all_stages(&self, from: usize) {
        let source = self.snapshot(from);
        let mut displaced = Vec::new();
        for (stage, slot) in self.stages.iter().enumerate() {
            if stage == from {
                continue;
            }
            let mut dest = slot.data.write().unwrap_or_else(PoisonError::into_inner);
            displaced.push(std::mem::replace(&mut *dest, Arc::clone(&source)));
        }
        drop(displaced);
    }
}

impl<T: CycleData + fmt::Debug> fmt::Debug for PipelineCycler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineCycler")
            .field("num_stages", &self.stages.len())
            .field("stage_0", &self.snapshot(0))
            .finish()
    }
}

/// Read-only snapshot of one stage
#[derive(Clone)]
pub struct CycleReader<T> {
    data: Arc<T>,
    stage: usize,
}

impl<T> CycleReader<T> {
    /// Stage this snapshot was taken from
    pub fn stage(&self) -> usize {
        self.stage
    }
}

impl<T> Deref for CycleReader<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

/// Exclusive write access to one stage
pub struct CycleWriter<'a, T: CycleData> {
    guard: RwLockWriteGuard<'a, Arc<T>>,
    writer: &'a AtomicUsize,
    stage: usize,
}

impl<T: CycleData> CycleWriter<'_, T> {
    /// Stage being written
    pub fn stage(&self) -> usize {
        self.stage
    }
}

impl<T: CycleData> Deref for CycleWriter<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: CycleData> DerefMut for CycleWriter<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        Arc::make_mut(&mut self.guard)
    }
}

impl<T: CycleData> Drop for CycleWriter<'_, T> {
    fn drop(&mut self) {
        self.writer.store(0, Ordering::Release);
    }
}

/// Guard returned by [`PipelineCycler::lock`]
pub struct CyclerLock<'a> {
    _guard: MutexGuard<'a, ()>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Counter {
        value: u32,
        label: String,
    }

    impl CycleData for Counter {}

    #[test]
    fn test_stages_alias_until_written() {
        let cycler = PipelineCycler::new(Counter::default(), 3);
        assert_eq!(cycler.get_num_stages(), 3);
        assert!(!cycler.is_stage_unique(0));

        cycler.write_stage(0).value = 7;
        assert!(cycler.is_stage_unique(0));
        assert!(!cycler.is_stage_unique(1));
        assert_eq!(cycler.read(0).value, 7);
        assert_eq!(cycler.read(1).value, 0);
        assert_eq!(cycler.read(2).value, 0);
    }

    #[test]
    fn test_reader_snapshot_is_isolated_from_writer() {
        let cycler = PipelineCycler::new(Counter::default(), 1);
        let before = cycler.read(0);
        cycler.write_stage(0).label = "changed".to_string();
        assert_eq!(before.label, "");
        assert_eq!(cycler.read(0).label, "changed");
    }

    #[test]
    fn test_write_to_later_stage_not_visible_upstream() {
        let cycler = PipelineCycler::new(Counter::default(), 2);
        let early = cycler.read(0);
        cycler.write_stage(1).label = "cull".to_string();
        assert_eq!(early.label, "");
        assert_eq!(cycler.read(0).label, "");

        cycler.write_stage(0).label = "app".to_string();
        assert_eq!(cycler.read(0).label, "app");
        assert_eq!(cycler.read(1).label, "cull");
    }

    #[test]
    fn test_cycle_moves_records_downstream() {
        let cycler = PipelineCycler::new(Counter::default(), 3);
        cycler.write_stage(0).value = 1;
        cycler.cycle();
        assert_eq!(cycler.read(1).value, 1);
        assert_eq!(cycler.read(2).value, 0);
        cycler.cycle();
        assert_eq!(cycler.read(2).value, 1);
        assert!(!cycler.is_stage_unique(0));
    }

    #[test]
    fn test_elevate_sees_latest_record() {
        let cycler = PipelineCycler::new(Counter::default(), 1);
        let reader = cycler.read(0);
        assert_eq!(reader.value, 0);
        let mut writer = cycler.elevate(reader);
        writer.value += 5;
        drop(writer);
        assert_eq!(cycler.read(0).value, 5);
    }

    #[test]
    fn test_copy_to_all_stages() {
        let cycler = PipelineCycler::new(Counter::default(), 3);
        cycler.write_stage(0).value = 9;
        cycler.copy_to_all_stages(0);
        assert!((0..3).all(|stage| cycler.read(stage).value == 9));
        assert!(!cycler.is_stage_unique(2));
    }

    #[test]
    #[should_panic(expected = "already being written")]
    fn test_reentrant_writer_panics() {
        let cycler = PipelineCycler::new(Counter::default(), 1);
        let _first = cycler.write_stage(0);
        let _second = cycler.write_stage(0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_stage_out_of_range_panics() {
        let cycler = PipelineCycler::new(Counter::default(), 2);
        let _ = cycler.read(2);
    }
}

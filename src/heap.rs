//! # Heap Lock Guard
//!
//! The heap allocator serializes its free lists with a lock that is held
//! by a task, not by a critical section, so a task may be preempted while
//! holding it. When a task exits, its identity disappears from the ready
//! queue and the new head inherits the "current task" role before any real
//! context switch happens. If the lock were held at that point, a later
//! allocator call from the new head would see itself as the holder and
//! re-enter the allocator's critical region.
//!
//! The exit path therefore takes the lock and immediately gives it back
//! before unlinking the exiting task. No work happens in between; the pair
//! only waits out any other holder and proves the lock is free. If the
//! exiting task itself held the lock, the pair nests and unwinds back to
//! that hold, so the guard then drops every remaining level.

use core::cell::Cell;

use critical_section::Mutex;
use log::{error, trace, warn};

use crate::error::KResult;
use crate::scheduler::{PreemptionLock, Scheduler};
use crate::task::TaskId;

/// Lock contract of the heap allocator.
pub trait HeapLock {
    /// Take the lock on behalf of `holder`. Nested acquisition by the
    /// current holder must succeed immediately.
    fn acquire(&self, holder: TaskId);

    /// Give back one level of `holder`'s acquisition.
    fn release(&self, holder: TaskId);

    /// Drop every level `holder` still holds. Returns the number of levels
    /// dropped, 0 if `holder` did not hold the lock.
    fn release_all(&self, holder: TaskId) -> u32;
}

// ---------------------------------------------------------------------------
// Reentrant heap semaphore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Holder {
    task: Option<TaskId>,
    count: u32,
}

/// Reentrant, task-owned lock for the heap allocator.
///
/// Free or self-held acquisition never waits. Acquisition against another
/// holder spins until that holder releases from another execution context;
/// on a single core with interrupts masked that never happens, so the
/// first failed attempt is reported with `error!`.
pub struct HeapSemaphore {
    holder: Mutex<Cell<Holder>>,
}

impl HeapSemaphore {
    pub const fn new() -> Self {
        Self {
            holder: Mutex::new(Cell::new(Holder {
                task: None,
                count: 0,
            })),
        }
    }

    /// Try to take the lock without waiting.
    pub fn try_acquire(&self, holder: TaskId) -> bool {
        critical_section::with(|cs| {
            let cell = self.holder.borrow(cs);
            let mut state = cell.get();
            match state.task {
                None => {
                    state.task = Some(holder);
                    state.count = 1;
                }
                Some(task) if task == holder => state.count += 1,
                Some(_) => return false,
            }
            cell.set(state);
            true
        })
    }

    /// Current holder, if any.
    pub fn holder(&self) -> Option<TaskId> {
        critical_section::with(|cs| self.holder.borrow(cs).get().task)
    }

    /// Nesting depth of the current holder.
    pub fn depth(&self) -> u32 {
        critical_section::with(|cs| self.holder.borrow(cs).get().count)
    }
}

impl Default for HeapSemaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapLock for HeapSemaphore {
    fn acquire(&self, holder: TaskId) {
        if self.try_acquire(holder) {
            return;
        }
        error!(
            "task {} waiting on heap lock held by {:?}",
            holder,
            self.holder()
        );
        while !self.try_acquire(holder) {
            core::hint::spin_loop();
        }
    }

    fn release(&self, holder: TaskId) {
        critical_section::with(|cs| {
            let cell = self.holder.borrow(cs);
            let mut state = cell.get();
            if state.task != Some(holder) {
                return;
            }
            state.count -= 1;
            if state.count == 0 {
                state.task = None;
            }
            cell.set(state);
        })
    }

    fn release_all(&self, holder: TaskId) -> u32 {
        critical_section::with(|cs| {
            let cell = self.holder.borrow(cs);
            let state = cell.get();
            if state.task != Some(holder) {
                return 0;
            }
            cell.set(Holder {
                task: None,
                count: 0,
            });
            state.count
        })
    }
}

// ---------------------------------------------------------------------------
// Exit-path guard
// ---------------------------------------------------------------------------

/// Disable preemption of the exiting task, then take and immediately
/// release the heap lock on its behalf.
///
/// Any hold the task still has after the pair is dropped, since nothing
/// could release it once the task is gone.
///
/// The returned lock is never balanced: the task is destroyed holding it.
pub fn guard_heap_release<H>(sched: &mut Scheduler, heap: &H, task: TaskId) -> KResult<PreemptionLock>
where
    H: HeapLock + ?Sized,
{
    let lock = sched.lock_preemption(task)?;

    heap.acquire(task);
    heap.release(task);

    let dropped = heap.release_all(task);
    if dropped > 0 {
        warn!("exiting task {} still held the heap lock ({} levels), released", task, dropped);
    }

    trace!("heap lock quiesced for exiting task {}", task);
    Ok(lock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scheduler_with, HeapEvent, RecordingHeap};

    #[test]
    fn test_semaphore_is_reentrant() {
        let heap = HeapSemaphore::new();
        let a = TaskId::new(1);

        heap.acquire(a);
        heap.acquire(a);
        assert_eq!(heap.holder(), Some(a));
        assert_eq!(heap.depth(), 2);

        heap.release(a);
        assert_eq!(heap.holder(), Some(a));
        heap.release(a);
        assert_eq!(heap.holder(), None);
    }

    #[test]
    fn test_foreign_holder_blocks_try_acquire() {
        let heap = HeapSemaphore::new();
        let a = TaskId::new(1);
        let b = TaskId::new(2);

        assert!(heap.try_acquire(a));
        assert!(!heap.try_acquire(b));

        // A release by a non-holder is ignored
        heap.release(b);
        assert_eq!(heap.holder(), Some(a));

        heap.release(a);
        assert!(heap.try_acquire(b));
    }

    #[test]
    fn test_release_all_drops_every_level() {
        let heap = HeapSemaphore::new();
        let a = TaskId::new(1);
        let b = TaskId::new(2);

        heap.acquire(a);
        heap.acquire(a);
        heap.acquire(a);
        assert_eq!(heap.release_all(b), 0);
        assert_eq!(heap.depth(), 3);

        assert_eq!(heap.release_all(a), 3);
        assert_eq!(heap.holder(), None);
        assert_eq!(heap.release_all(a), 0);
        assert!(heap.try_acquire(b));
    }

    #[test]
    fn test_acquire_waits_for_foreign_release() {
        extern crate std;
        use std::{thread, time::Duration};

        static HEAP: HeapSemaphore = HeapSemaphore::new();
        let a = TaskId::new(1);
        let b = TaskId::new(2);
        assert!(HEAP.try_acquire(b));

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            HEAP.release(b);
        });

        HEAP.acquire(a);
        assert_eq!(HEAP.holder(), Some(a));
        releaser.join().unwrap();
        HEAP.release(a);
        assert_eq!(HEAP.holder(), None);
    }

    #[test]
    fn test_guard_clears_hold_of_exiting_task() {
        let (mut sched, ids) = scheduler_with(&[("a", 5)]);
        let a = ids[0];
        let heap = HeapSemaphore::new();
        heap.acquire(a);
        heap.acquire(a);

        guard_heap_release(&mut sched, &heap, a).unwrap().leak();
        assert_eq!(heap.holder(), None);
        assert!(heap.try_acquire(TaskId::new(99)));
    }

    #[test]
    fn test_guard_acquires_then_releases() {
        let (mut sched, ids) = scheduler_with(&[("a", 5)]);
        let a = ids[0];
        let heap = RecordingHeap::default();

        let lock = guard_heap_release(&mut sched, &heap, a).unwrap();
        assert_eq!(lock.task(), a);
        assert_eq!(sched.task(a).unwrap().lock_count, 1);
        assert_eq!(
            heap.events.borrow().as_slice(),
            &[HeapEvent::Acquire(a), HeapEvent::Release(a)]
        );
        lock.leak();
    }
}

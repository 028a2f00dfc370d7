//! # Task Exit
//!
//! Bottom half of `_exit()`: retires the running task (the ready head)
//! and leaves the next task promoted at the head. The architecture glue
//! performs the actual context switch after this returns.
//!
//! ## Sequence
//!
//! ```text
//!   dtcb = head
//!   lock(dtcb); heap.acquire(dtcb); heap.release(dtcb)
//!   remove_from_ready(dtcb)          rtcb = head, ReadyToRun, no task Running
//!   lock(rtcb)
//!   add_to_blocked(dtcb, Inactive)
//!   status = terminate(dtcb, suppress_exit_hooks = true)
//!   promote(rtcb)                    rtcb Running
//!   merge_pending()                  head may change
//!   release_unchecked(rtcb)
//!   return status
//! ```
//!
//! The finalizer status never aborts the sequence: by the time it runs the
//! exiting task is already gone from the ready queue.

use log::{debug, warn};

use crate::error::{KResult, KernelError};
use crate::heap::{guard_heap_release, HeapLock};
use crate::scheduler::Scheduler;
use crate::task::{BlockReason, TaskState};
use crate::terminate::Finalizer;

/// Terminate the task at the head of the ready-to-run queue.
///
/// # Preconditions
/// Interrupts are disabled and the caller is the head of the ready queue.
/// A successor must already be in the ready queue; tasks waiting in the
/// pending queue do not count, as only the exit itself would merge them.
/// Keeping the idle task (`Scheduler::init_idle`) in the ready queue
/// guarantees this, and the idle task never exits.
///
/// # Returns
/// The finalizer's status. Scheduler bookkeeping completes either way: if
/// the finalizer fails, the task is unlinked and its TCB slot reclaimed
/// here.
pub fn task_exit<H, F>(sched: &mut Scheduler, heap: &H, finalizer: &mut F) -> KResult<()>
where
    H: HeapLock + ?Sized,
    F: Finalizer + ?Sized,
{
    let dtcb = sched.current_task().ok_or(KernelError::NoCurrentTask)?;
    if sched.ready().second().is_none() {
        return Err(KernelError::NoSuccessor);
    }
    debug!("task {} exiting", dtcb);

    // The exiting task dies holding this lock
    guard_heap_release(sched, heap, dtcb)?.leak();

    sched.remove_from_ready(dtcb)?;
    let rtcb = sched.current_head().ok_or(KernelError::NoSuccessor)?;

    // Ready head is not running yet; keep it from being preempted until
    // the pending merge below
    let transit = sched.lock_preemption(rtcb)?;
    sched.set_state(rtcb, TaskState::ReadyToRun);

    sched.add_to_blocked(dtcb, BlockReason::Inactive)?;
    let status = finalizer.terminate(sched, dtcb, true);

    if let Err(e) = status {
        warn!("task {} teardown failed: {}", dtcb, e);
        if let Some(tcb) = sched.task_mut(dtcb) {
            tcb.state = TaskState::Terminated;
        }
        sched.unlink(dtcb);
        if sched.task(dtcb).is_some() && sched.release_task(dtcb).is_ok() {
            debug!("task {} slot reclaimed", dtcb);
        }
    }

    sched.promote(rtcb)?;

    if !sched.pending().is_empty() {
        sched.merge_pending();
    }

    // Not unlock_preemption(): the merge may have moved the head away from
    // rtcb, and the pending queue is already empty
    sched.release_unchecked(transit);

    sched.stats_mut().exits += 1;
    debug!("task {} exited, head is now {:?}", dtcb, sched.current_head());
    status
}

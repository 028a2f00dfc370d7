//! # Scheduler
//!
//! The single scheduler context: the TCB store plus the ready-to-run,
//! pending and blocked queues. Every operation takes `&mut self`, so the
//! whole scheduler state is mutated through one exclusive reference and
//! unit tests can fabricate as many independent contexts as they like.
//!
//! ## Queues
//!
//! - **Ready-to-run**: prioritized, ties FIFO. The head is the running task.
//! - **Pending**: prioritized. Tasks readied while the head holds a
//!   preemption lock wait here until the lock is dropped.
//! - **Blocked**: one FIFO queue per [`BlockReason`].
//!
//! A task is a member of at most one queue at any time.
//!
//! ## Preemption Locks
//!
//! `lock_preemption()` hands out a [`PreemptionLock`] token that must be
//! given back through exactly one of:
//!
//! - `unlock_preemption()`: The balanced release. Merges pending tasks when
//!   the count drops to zero on the head.
//! - `release_unchecked()`: A bare counter decrement, used once per task
//!   exit where the head may have changed under the lock.
//! - `PreemptionLock::leak()`: The task is being destroyed with the lock
//!   held.

use log::{error, trace};

use crate::config::{IDLE_PRIORITY, IDLE_TASK_NAME};
use crate::error::{KResult, KernelError};
use crate::queue::TaskQueue;
use crate::store::TaskStore;
use crate::task::{BlockReason, TaskConfig, TaskControlBlock, TaskId, TaskState};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Which scheduler queue a task currently belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Ready,
    Pending,
    Blocked(BlockReason),
}

/// Outcome of `Scheduler::remove_from_ready()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// The task that was removed.
    pub task: TaskId,
    /// Whether it was the head; if so the head changed and a context
    /// switch is needed.
    pub was_head: bool,
}

/// Counters kept by the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Completed `task_exit` calls.
    pub exits: u32,
    /// Calls to `release_unchecked()`.
    pub unchecked_releases: u32,
    /// Times a task other than the previous head reached the ready head.
    pub context_switches: u32,
}

impl SchedulerStats {
    pub const fn new() -> Self {
        Self {
            exits: 0,
            unchecked_releases: 0,
            context_switches: 0,
        }
    }
}

/// Token for one increment of a task's preemption lock count.
#[must_use = "a preemption lock must be released or explicitly leaked"]
#[derive(Debug, PartialEq, Eq)]
pub struct PreemptionLock {
    task: TaskId,
}

impl PreemptionLock {
    /// Task whose lock count this token accounts for.
    #[inline]
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Give up the token without decrementing. Only valid when the task is
    /// about to be destroyed.
    #[inline]
    pub fn leak(self) {}
}

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

pub struct Scheduler {
    store: TaskStore,
    ready: TaskQueue,
    pending: TaskQueue,
    blocked: [TaskQueue; BlockReason::COUNT],
    stats: SchedulerStats,
}

const EMPTY_QUEUE: TaskQueue = TaskQueue::new();

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            store: TaskStore::new(),
            ready: TaskQueue::new(),
            pending: TaskQueue::new(),
            blocked: [EMPTY_QUEUE; BlockReason::COUNT],
            stats: SchedulerStats::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Task registration
    // -----------------------------------------------------------------------

    /// Register a new task. It is parked `Inactive` until `activate()`.
    pub fn register_task(&mut self, config: TaskConfig) -> KResult<TaskId> {
        let id = self.store.allocate(config)?;
        if let Err(e) = self.blocked[BlockReason::Inactive.index()].push_back(id) {
            self.store.release(id)?;
            return Err(e);
        }
        trace!("registered task {} '{}' prio {}", id, config.name, config.priority);
        Ok(id)
    }

    /// Register and start the idle task at the lowest priority.
    pub fn init_idle(&mut self) -> KResult<TaskId> {
        let id = self.register_task(TaskConfig {
            name: IDLE_TASK_NAME,
            priority: IDLE_PRIORITY,
        })?;
        self.activate(id)?;
        Ok(id)
    }

    /// Make a freshly registered task runnable.
    ///
    /// Returns `true` if the task became the ready head.
    pub fn activate(&mut self, id: TaskId) -> KResult<bool> {
        match self.task(id).map(|tcb| tcb.state) {
            None => Err(KernelError::NoSuchTask(id)),
            Some(TaskState::Inactive) => self.unblock(id),
            Some(_) => Err(KernelError::InvalidState(id)),
        }
    }

    // -----------------------------------------------------------------------
    // Ready-to-run queue
    // -----------------------------------------------------------------------

    /// Task at the head of the ready-to-run queue.
    #[inline]
    pub fn current_head(&self) -> Option<TaskId> {
        self.ready.head()
    }

    /// The running task: by convention the ready head.
    #[inline]
    pub fn current_task(&self) -> Option<TaskId> {
        self.current_head()
    }

    /// Insert an unqueued task into the ready-to-run queue.
    ///
    /// If the head holds a preemption lock and `id` would outrank it, the
    /// task is deferred to the pending queue instead. Returns `true` if
    /// `id` became the new head (a context switch is needed).
    pub fn add_ready_to_run(&mut self, id: TaskId) -> KResult<bool> {
        let priority = self.task(id).ok_or(KernelError::NoSuchTask(id))?.priority;
        if self.locate(id).is_some() {
            return Err(KernelError::InvalidState(id));
        }

        if let Some(head) = self.ready.head().and_then(|head| self.store.get(head)) {
            if !head.is_preemptible() && priority > head.priority {
                trace!("task {} deferred: head {} holds lock", id, head.id);
                self.add_to_pending(id)?;
                return Ok(false);
            }
        }

        let position = self.ready.insert_prioritized(id, &self.store)?;
        if position == 0 {
            self.set_state(id, TaskState::Running);
            if let Some(previous) = self.ready.second() {
                self.set_state(previous, TaskState::ReadyToRun);
            }
            self.stats.context_switches += 1;
            trace!("task {} is the new ready head", id);
            Ok(true)
        } else {
            self.set_state(id, TaskState::ReadyToRun);
            Ok(false)
        }
    }

    /// Remove `id` from the ready-to-run queue.
    ///
    /// If `id` was the head, the new head is marked `ReadyToRun`, not
    /// `Running`: the caller promotes it once the switch is committed. The
    /// removed task keeps its state until the caller re-queues it.
    pub fn remove_from_ready(&mut self, id: TaskId) -> KResult<Removal> {
        let position = self.ready.remove(id).ok_or(KernelError::NotReady(id))?;
        let was_head = position == 0;

        if was_head {
            if let Some(head) = self.ready.head() {
                self.set_state(head, TaskState::ReadyToRun);
            }
        }

        trace!("task {} left ready queue (was head: {})", id, was_head);
        Ok(Removal { task: id, was_head })
    }

    /// Mark the ready head as `Running`, closing the window opened by
    /// `remove_from_ready()`.
    pub fn promote(&mut self, id: TaskId) -> KResult<()> {
        let state = self.task(id).ok_or(KernelError::NoSuchTask(id))?.state;
        if state != TaskState::ReadyToRun || self.ready.head() != Some(id) {
            return Err(KernelError::InvalidState(id));
        }
        self.set_state(id, TaskState::Running);
        self.stats.context_switches += 1;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Pending queue
    // -----------------------------------------------------------------------

    /// Defer an unqueued task until the current critical section ends.
    pub fn add_to_pending(&mut self, id: TaskId) -> KResult<()> {
        if self.task(id).is_none() {
            return Err(KernelError::NoSuchTask(id));
        }
        if self.locate(id).is_some() {
            return Err(KernelError::InvalidState(id));
        }
        self.pending.insert_prioritized(id, &self.store)?;
        self.set_state(id, TaskState::Pending);
        Ok(())
    }

    /// Move every pending task into the ready-to-run queue by priority.
    ///
    /// A task that lands at the head becomes `Running` and the displaced
    /// head `ReadyToRun`. Returns `true` if the head changed.
    pub fn merge_pending(&mut self) -> bool {
        let mut head_changed = false;

        while let Some(id) = self.pending.pop_front() {
            let previous = self.ready.head();
            match self.ready.insert_prioritized(id, &self.store) {
                Ok(0) => {
                    self.set_state(id, TaskState::Running);
                    if let Some(previous) = previous {
                        self.set_state(previous, TaskState::ReadyToRun);
                    }
                    head_changed = true;
                }
                Ok(_) => self.set_state(id, TaskState::ReadyToRun),
                Err(e) => error!("pending task {} dropped during merge: {}", id, e),
            }
        }

        if head_changed {
            self.stats.context_switches += 1;
        }
        head_changed
    }

    // -----------------------------------------------------------------------
    // Blocked queues
    // -----------------------------------------------------------------------

    /// Move `id` into the blocked queue for `reason`.
    ///
    /// The task is unlinked from whatever queue holds it. If it was the
    /// ready head, the new head is left `ReadyToRun` for the caller to
    /// promote.
    pub fn add_to_blocked(&mut self, id: TaskId, reason: BlockReason) -> KResult<()> {
        if self.task(id).is_none() {
            return Err(KernelError::NoSuchTask(id));
        }

        match self.locate(id) {
            Some(Membership::Blocked(current)) if current == reason => {}
            _ => {
                self.unlink(id);
                self.blocked[reason.index()].push_back(id)?;
            }
        }

        let state = match reason {
            BlockReason::Inactive => TaskState::Inactive,
            other => TaskState::Blocked(other),
        };
        self.set_state(id, state);
        Ok(())
    }

    /// Remove `id` from its blocked queue and return the reason it was
    /// blocked for.
    pub fn remove_from_blocked(&mut self, id: TaskId) -> KResult<BlockReason> {
        let reason = match self.locate(id) {
            Some(Membership::Blocked(reason)) => reason,
            _ => return Err(KernelError::InvalidState(id)),
        };
        self.blocked[reason.index()].remove(id);
        Ok(reason)
    }

    /// Wake a blocked task. Returns `true` if it became the ready head.
    pub fn unblock(&mut self, id: TaskId) -> KResult<bool> {
        self.remove_from_blocked(id)?;
        self.add_ready_to_run(id)
    }

    // -----------------------------------------------------------------------
    // Preemption locks
    // -----------------------------------------------------------------------

    /// Disable preemption of `id` by one more level.
    pub fn lock_preemption(&mut self, id: TaskId) -> KResult<PreemptionLock> {
        let tcb = self.task_mut(id).ok_or(KernelError::NoSuchTask(id))?;
        tcb.lock_count = tcb
            .lock_count
            .checked_add(1)
            .ok_or(KernelError::InvalidState(id))?;
        Ok(PreemptionLock { task: id })
    }

    /// Balanced release of a preemption lock.
    ///
    /// When the count reaches zero on the ready head, pending tasks are
    /// merged. Returns `true` if that merge changed the head.
    pub fn unlock_preemption(&mut self, lock: PreemptionLock) -> bool {
        let id = lock.task;
        let Some(tcb) = self.task_mut(id) else {
            return false;
        };
        tcb.lock_count = tcb.lock_count.saturating_sub(1);
        let released = tcb.lock_count == 0;

        if released && self.ready.head() == Some(id) && !self.pending.is_empty() {
            self.merge_pending()
        } else {
            false
        }
    }

    /// Drop one level of `lock`'s task count without any other side effect.
    pub fn release_unchecked(&mut self, lock: PreemptionLock) {
        if let Some(tcb) = self.task_mut(lock.task) {
            tcb.lock_count = tcb.lock_count.saturating_sub(1);
        }
        self.stats.unchecked_releases += 1;
    }

    // -----------------------------------------------------------------------
    // Membership and lookup
    // -----------------------------------------------------------------------

    /// Queue currently holding `id`, if any.
    pub fn locate(&self, id: TaskId) -> Option<Membership> {
        if self.ready.contains(id) {
            return Some(Membership::Ready);
        }
        if self.pending.contains(id) {
            return Some(Membership::Pending);
        }
        BlockReason::ALL
            .iter()
            .find(|reason| self.blocked[reason.index()].contains(id))
            .map(|&reason| Membership::Blocked(reason))
    }

    /// Remove `id` from whichever queue holds it.
    pub fn unlink(&mut self, id: TaskId) -> Option<Membership> {
        let membership = self.locate(id)?;
        match membership {
            Membership::Ready => {
                let _ = self.remove_from_ready(id);
            }
            Membership::Pending => {
                self.pending.remove(id);
            }
            Membership::Blocked(reason) => {
                self.blocked[reason.index()].remove(id);
            }
        }
        Some(membership)
    }

    /// Free the TCB of an unqueued task.
    pub fn release_task(&mut self, id: TaskId) -> KResult<()> {
        if self.locate(id).is_some() {
            return Err(KernelError::InvalidState(id));
        }
        self.store.release(id)
    }

    /// Number of tasks in the `Running` state.
    pub fn running_count(&self) -> usize {
        self.store
            .iter()
            .filter(|tcb| tcb.state == TaskState::Running)
            .count()
    }

    /// The task in the `Running` state, if exactly one is.
    pub fn running_task(&self) -> Option<TaskId> {
        let mut running = self
            .store
            .iter()
            .filter(|tcb| tcb.state == TaskState::Running);
        let first = running.next()?;
        running.next().is_none().then_some(first.id)
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskControlBlock> {
        self.store.get(id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut TaskControlBlock> {
        self.store.get_mut(id)
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.store
    }

    pub fn ready(&self) -> &TaskQueue {
        &self.ready
    }

    pub fn pending(&self) -> &TaskQueue {
        &self.pending
    }

    pub fn blocked(&self, reason: BlockReason) -> &TaskQueue {
        &self.blocked[reason.index()]
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut SchedulerStats {
        &mut self.stats
    }

    pub(crate) fn set_state(&mut self, id: TaskId, state: TaskState) {
        if let Some(tcb) = self.store.get_mut(id) {
            tcb.state = state;
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

//! # Task Termination
//!
//! The finalizer reclaims a task that has been unlinked from the ready
//! queue. Graceful termination runs the task's exit hooks and flushes its
//! buffered output first; non-blocking termination (the `_exit` flavour)
//! skips both.

use log::{debug, trace};

use crate::error::{KResult, KernelError};
use crate::scheduler::Scheduler;
use crate::task::{TaskId, TaskState};

/// Reclaims the resources of a task.
pub trait Finalizer {
    /// Tear down task `id`. When `suppress_exit_hooks` is set, exit hooks
    /// are not run and buffered output is not flushed.
    fn terminate(&mut self, sched: &mut Scheduler, id: TaskId, suppress_exit_hooks: bool)
        -> KResult<()>;
}

/// Default finalizer: hooks, unlink, free the TCB.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskTeardown;

impl Finalizer for TaskTeardown {
    fn terminate(
        &mut self,
        sched: &mut Scheduler,
        id: TaskId,
        suppress_exit_hooks: bool,
    ) -> KResult<()> {
        let tcb = sched.task_mut(id).ok_or(KernelError::NoSuchTask(id))?;

        if !suppress_exit_hooks {
            // atexit order: last registered runs first
            while let Some(hook) = tcb.exit_hooks.pop() {
                hook(id);
            }
            if let Some(flush) = tcb.stream_flush.take() {
                flush(id);
            }
        } else {
            trace!("task {}: exit hooks suppressed", id);
        }

        tcb.state = TaskState::Terminated;
        sched.unlink(id);
        sched.release_task(id)?;

        debug!("task {} terminated", id);
        Ok(())
    }
}

//! # Kernel Errors
//!
//! Error type shared by the scheduler queues, the exit path and the
//! termination finalizer. Every variant maps onto a negative errno value
//! for the architecture glue, which only deals in integer status codes.

use core::fmt;

use crate::task::TaskId;

/// Status code returned to the arch glue on success.
pub const OK: i32 = 0;

const EPERM: i32 = 1;
const ESRCH: i32 = 3;
const EAGAIN: i32 = 11;
const ENOMEM: i32 = 12;
const EBUSY: i32 = 16;
const EINVAL: i32 = 22;

/// Error type for kernel scheduling operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// No live task carries this id.
    NoSuchTask(TaskId),
    /// The TCB store has no free slot.
    TaskTableFull,
    /// A scheduler queue is at capacity.
    QueueFull,
    /// The task is not a member of the ready-to-run queue.
    NotReady(TaskId),
    /// The task is in a state that does not allow the operation.
    InvalidState(TaskId),
    /// The ready-to-run queue is empty.
    NoCurrentTask,
    /// The exiting task is the last runnable task.
    NoSuccessor,
    /// The task's exit hook table is full.
    HookTableFull,
    /// Teardown could not release a resource owned by the task.
    ResourceBusy(&'static str),
}

/// Result alias for kernel operations.
pub type KResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Converts the error to a negative errno code.
    pub fn to_errno(&self) -> i32 {
        match self {
            KernelError::NoSuchTask(_) => -ESRCH,
            KernelError::TaskTableFull => -EAGAIN,
            KernelError::QueueFull | KernelError::HookTableFull => -ENOMEM,
            KernelError::NotReady(_) | KernelError::InvalidState(_) => -EINVAL,
            KernelError::NoCurrentTask | KernelError::NoSuccessor => -EPERM,
            KernelError::ResourceBusy(_) => -EBUSY,
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::NoSuchTask(id) => write!(f, "no such task: {}", id),
            KernelError::TaskTableFull => write!(f, "task table full"),
            KernelError::QueueFull => write!(f, "scheduler queue full"),
            KernelError::NotReady(id) => write!(f, "task {} is not ready to run", id),
            KernelError::InvalidState(id) => write!(f, "task {} is in an invalid state", id),
            KernelError::NoCurrentTask => write!(f, "ready-to-run queue is empty"),
            KernelError::NoSuccessor => write!(f, "no task left to run"),
            KernelError::HookTableFull => write!(f, "exit hook table full"),
            KernelError::ResourceBusy(what) => write!(f, "resource busy: {}", what),
        }
    }
}

/// Collapses a kernel result into the integer status the arch glue expects.
pub fn to_status(result: KResult<()>) -> i32 {
    match result {
        Ok(()) => OK,
        Err(e) => e.to_errno(),
    }
}

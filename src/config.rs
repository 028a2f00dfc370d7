//! # rtsched Configuration
//!
//! Compile-time constants governing the scheduler. All limits are fixed
//! at compile time; the kernel never allocates.

/// Maximum number of tasks the TCB store can hold simultaneously.
/// This bounds the static TCB array and every scheduler queue.
pub const MAX_TASKS: usize = 16;

/// Maximum number of exit hooks a single task may register.
pub const MAX_EXIT_HOOKS: usize = 4;

/// Priority of the idle task. It is the lowest priority in the system so
/// that the idle task sits at the tail of the ready queue.
pub const IDLE_PRIORITY: u8 = 0;

/// Name given to the idle task by `Scheduler::init_idle()`.
pub const IDLE_TASK_NAME: &str = "idle";

/// First task id handed out by the TCB store. Id 0 is never assigned.
pub const FIRST_TASK_ID: u32 = 1;

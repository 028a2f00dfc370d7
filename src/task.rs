//! # Task Control Block
//!
//! Defines the per-task record owned by the TCB store. The scheduler queues
//! never hold TCBs directly, only [`TaskId`]s that resolve through the
//! store.

use core::fmt;

use heapless::Vec;

use crate::config::MAX_EXIT_HOOKS;
use crate::error::{KResult, KernelError};

// ---------------------------------------------------------------------------
// Task identity
// ---------------------------------------------------------------------------

/// Unique task identifier, stable for the lifetime of the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u32);

impl TaskId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Reason a task sits in a blocked queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Registered but not yet activated, or exiting on its way to the
    /// finalizer.
    Inactive,
    /// Waiting on a counting semaphore.
    Semaphore,
    /// Waiting for signal delivery.
    Signal,
    /// Waiting on a message queue.
    MessageQueue,
    /// Sleeping until a timeout expires.
    Delay,
}

impl BlockReason {
    /// Number of distinct block reasons (one blocked queue each).
    pub const COUNT: usize = 5;

    pub const ALL: [BlockReason; Self::COUNT] = [
        BlockReason::Inactive,
        BlockReason::Semaphore,
        BlockReason::Signal,
        BlockReason::MessageQueue,
        BlockReason::Delay,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            BlockReason::Inactive => 0,
            BlockReason::Semaphore => 1,
            BlockReason::Signal => 2,
            BlockReason::MessageQueue => 3,
            BlockReason::Delay => 4,
        }
    }
}

/// Scheduling state of a task.
///
/// ```text
///                 add_ready_to_run (head locked)
///   ┌──────────┐ ─────────────────────────────► ┌─────────┐
///   │ Inactive │                                 │ Pending │
///   └──────────┘                                 └─────────┘
///        │ activate                                   │ merge_pending
///        ▼                                            ▼
///   ┌────────────┐   promote / reaches head   ┌─────────┐
///   │ ReadyToRun │ ─────────────────────────► │ Running │
///   └────────────┘ ◄───────────────────────── └─────────┘
///        ▲              displaced from head        │ task_exit
///        │ unblock                                 ▼
///   ┌──────────┐                             ┌──────────┐   finalizer
///   │ Blocked  │                             │ Inactive │ ────────────► Terminated
///   └──────────┘                             └──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Head of the ready-to-run queue; owns the CPU.
    Running,
    /// In the ready-to-run queue, behind the head (or the head during the
    /// exit path's transient window).
    ReadyToRun,
    /// Waiting in the pending queue for the current critical section to end.
    Pending,
    /// In the `Inactive` blocked queue.
    Inactive,
    /// In the blocked queue for the given reason.
    Blocked(BlockReason),
    /// Torn down by the finalizer; no longer schedulable.
    Terminated,
}

// ---------------------------------------------------------------------------
// Task configuration
// ---------------------------------------------------------------------------

/// Static configuration for a task, set at registration.
#[derive(Debug, Clone, Copy)]
pub struct TaskConfig {
    /// Human-readable name, for logs.
    pub name: &'static str,
    /// Scheduling priority (higher = more urgent). Range: 0–255.
    pub priority: u8,
}

/// Callback run by graceful termination, in reverse registration order.
pub type ExitHook = fn(TaskId);

// ---------------------------------------------------------------------------
// Task Control Block
// ---------------------------------------------------------------------------

/// Task Control Block (TCB): per-task scheduling metadata.
///
/// TCBs live in the fixed array of [`crate::store::TaskStore`]; a slot with
/// `active == false` is free.
#[derive(Debug)]
pub struct TaskControlBlock {
    /// Unique task identifier.
    pub id: TaskId,

    /// Current scheduling state.
    pub state: TaskState,

    /// Scheduling priority, used only for queue ordering.
    pub priority: u8,

    /// Preemption lock count. The task may only be preempted at zero.
    /// Mutated through `Scheduler::lock_preemption` and friends.
    pub lock_count: u16,

    /// Name from the task configuration.
    pub name: &'static str,

    /// Hooks run on graceful termination (`atexit`-style).
    pub exit_hooks: Vec<ExitHook, MAX_EXIT_HOOKS>,

    /// Flushes output the task buffered but has not written yet.
    pub stream_flush: Option<ExitHook>,

    /// Whether this slot holds a live task.
    pub active: bool,
}

impl TaskControlBlock {
    /// A free slot. Used to initialize the static TCB array.
    pub const EMPTY: Self = Self {
        id: TaskId::new(0),
        state: TaskState::Terminated,
        priority: 0,
        lock_count: 0,
        name: "",
        exit_hooks: Vec::new(),
        stream_flush: None,
        active: false,
    };

    /// Initialize a free slot for a newly registered task. The task starts
    /// out `Inactive`.
    pub fn init(&mut self, id: TaskId, config: TaskConfig) {
        self.id = id;
        self.state = TaskState::Inactive;
        self.priority = config.priority;
        self.lock_count = 0;
        self.name = config.name;
        self.exit_hooks.clear();
        self.stream_flush = None;
        self.active = true;
    }

    /// Register a hook to run when the task terminates gracefully.
    pub fn register_exit_hook(&mut self, hook: ExitHook) -> KResult<()> {
        self.exit_hooks
            .push(hook)
            .map_err(|_| KernelError::HookTableFull)
    }

    #[inline]
    pub fn is_preemptible(&self) -> bool {
        self.lock_count == 0
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

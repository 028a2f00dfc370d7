//! # rtsched: RTOS task-exit core
//!
//! The task-termination path of a preemptible, priority-scheduled
//! real-time kernel for ARM Cortex-M4 microcontrollers: the routine that
//! retires the running task from the scheduler and leaves the next
//! runnable task at the head of the ready queue.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │          Exit glue (arch/cortex_m4.rs) · PendSV         │
//! ├────────────────────────────────────────────────────────┤
//! │        Kernel API (kernel.rs) · global scheduler        │
//! │          init() · create_task() · exit()               │
//! ├────────────────────────────────────────────────────────┤
//! │              Task exit (exit.rs)                        │
//! │   heap guard → unlink → finalize → promote → merge      │
//! ├──────────────┬─────────────────┬───────────────────────┤
//! │  Heap guard  │   Finalizer     │  Sync primitives      │
//! │  heap.rs     │   terminate.rs  │  sync.rs              │
//! ├──────────────┴─────────────────┴───────────────────────┤
//! │       Scheduler queues (scheduler.rs, queue.rs)         │
//! │        ready-to-run · pending · blocked[reason]         │
//! ├────────────────────────────────────────────────────────┤
//! │          TCB store (store.rs) · TCB (task.rs)           │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Exit Path
//!
//! `exit::task_exit()` runs with interrupts disabled and never blocks:
//!
//! 1. The running task takes a preemption lock, then takes and releases
//!    the heap lock so no allocator critical region straddles its exit.
//! 2. It leaves the ready queue. The new head is `ReadyToRun`, not
//!    `Running`, and holds a transitional preemption lock.
//! 3. It is parked `Inactive` and handed to the finalizer with exit hooks
//!    suppressed.
//! 4. The new head is promoted to `Running`, pending tasks are merged and
//!    the transitional lock is dropped with a bare decrement.
//!
//! ## Memory Model
//!
//! - **No heap**: all state is statically sized
//! - **Fixed-size TCB array**: `[TaskControlBlock; MAX_TASKS]`
//! - **Queues**: `heapless::Vec<TaskId, MAX_TASKS>`
//! - **Critical sections**: `critical_section::with()` for shared state

#![no_std]

pub mod config;
pub mod error;
pub mod task;
pub mod store;
pub mod queue;
pub mod scheduler;
pub mod heap;
pub mod terminate;
pub mod exit;
pub mod arch;
pub mod kernel;
pub mod sync;

#[cfg(test)]
mod testing;

//! # Kernel
//!
//! Global scheduler instance and the public task API used by firmware.
//! Every entry point masks interrupts for the duration of the scheduler
//! mutation.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()          ← idle task at the ready tail
//!         ├─► kernel::create_task()   ← register + activate (×N)
//!         └─► ...
//!               task returns → arch::cortex_m4::exit_current()
//!                                 └─► kernel::exit() → task_exit()
//! ```

use core::cell::RefCell;

use critical_section::Mutex;
use log::info;

use crate::error::{self, KResult};
use crate::exit::task_exit;
use crate::heap::HeapSemaphore;
use crate::scheduler::Scheduler;
use crate::sync;
use crate::task::{TaskConfig, TaskId};
use crate::terminate::TaskTeardown;

// ---------------------------------------------------------------------------
// Global kernel state
// ---------------------------------------------------------------------------

static SCHEDULER: Mutex<RefCell<Scheduler>> = Mutex::new(RefCell::new(Scheduler::new()));

/// Lock guarding the kernel heap allocator.
pub static HEAP_LOCK: HeapSemaphore = HeapSemaphore::new();

/// Run `f` on the global scheduler with interrupts disabled.
pub fn with_scheduler<F, R>(f: F) -> R
where
    F: FnOnce(&mut Scheduler) -> R,
{
    sync::critical_section(|cs| f(&mut *SCHEDULER.borrow_ref_mut(cs)))
}

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Reset the scheduler and start the idle task.
pub fn init() -> KResult<TaskId> {
    let idle = with_scheduler(|sched| {
        *sched = Scheduler::new();
        sched.init_idle()
    })?;
    info!("kernel initialized, idle task {}", idle);
    Ok(idle)
}

/// Register a task and make it runnable.
pub fn create_task(config: TaskConfig) -> KResult<TaskId> {
    with_scheduler(|sched| {
        let id = sched.register_task(config)?;
        sched.activate(id)?;
        Ok(id)
    })
}

/// Id of the running task.
pub fn current_task() -> Option<TaskId> {
    with_scheduler(|sched| sched.current_task())
}

/// Retire the running task.
///
/// Returns `0` or a negative errno from the finalizer. The caller must
/// switch to the new ready head afterwards.
pub fn exit() -> i32 {
    error::to_status(with_scheduler(|sched| {
        task_exit(sched, &HEAP_LOCK, &mut TaskTeardown)
    }))
}

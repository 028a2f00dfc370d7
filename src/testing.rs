//! Host-side fixtures shared by the unit tests.

use core::cell::RefCell;

use heapless::Vec;

use crate::config::MAX_TASKS;
use crate::error::{KResult, KernelError};
use crate::heap::HeapLock;
use crate::scheduler::Scheduler;
use crate::task::{TaskConfig, TaskId, TaskState};
use crate::terminate::{Finalizer, TaskTeardown};

pub fn register(sched: &mut Scheduler, name: &'static str, priority: u8) -> TaskId {
    sched
        .register_task(TaskConfig { name, priority })
        .unwrap()
}

/// Build a scheduler whose tasks are registered and activated in order.
pub fn scheduler_with(tasks: &[(&'static str, u8)]) -> (Scheduler, Vec<TaskId, MAX_TASKS>) {
    let mut sched = Scheduler::new();
    let mut ids = Vec::new();
    for &(name, priority) in tasks {
        let id = register(&mut sched, name, priority);
        sched.activate(id).unwrap();
        ids.push(id).unwrap();
    }
    (sched, ids)
}

// ---------------------------------------------------------------------------
// Heap lock double
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapEvent {
    Acquire(TaskId),
    Release(TaskId),
}

#[derive(Default)]
pub struct RecordingHeap {
    pub events: RefCell<Vec<HeapEvent, 8>>,
}

impl HeapLock for RecordingHeap {
    fn acquire(&self, holder: TaskId) {
        self.events.borrow_mut().push(HeapEvent::Acquire(holder)).unwrap();
    }

    fn release(&self, holder: TaskId) {
        self.events.borrow_mut().push(HeapEvent::Release(holder)).unwrap();
    }

    fn release_all(&self, _holder: TaskId) -> u32 {
        0
    }
}

// ---------------------------------------------------------------------------
// Finalizer double
// ---------------------------------------------------------------------------

/// What the finalizer saw when it was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizerCall {
    pub task: TaskId,
    pub suppress_exit_hooks: bool,
    pub running_tasks: usize,
    pub head_state: Option<TaskState>,
    pub task_state: Option<TaskState>,
}

/// Records each call, then either tears the task down for real or fails
/// without touching it.
#[derive(Default)]
pub struct RecordingFinalizer {
    pub fail_with: Option<KernelError>,
    pub calls: Vec<FinalizerCall, 4>,
}

impl RecordingFinalizer {
    pub fn failing(error: KernelError) -> Self {
        Self {
            fail_with: Some(error),
            calls: Vec::new(),
        }
    }
}

impl Finalizer for RecordingFinalizer {
    fn terminate(
        &mut self,
        sched: &mut Scheduler,
        id: TaskId,
        suppress_exit_hooks: bool,
    ) -> KResult<()> {
        let head_state = sched
            .current_head()
            .and_then(|head| sched.task(head))
            .map(|tcb| tcb.state);
        self.calls
            .push(FinalizerCall {
                task: id,
                suppress_exit_hooks,
                running_tasks: sched.running_count(),
                head_state,
                task_state: sched.task(id).map(|tcb| tcb.state),
            })
            .unwrap();

        match self.fail_with {
            Some(error) => Err(error),
            None => TaskTeardown.terminate(sched, id, suppress_exit_hooks),
        }
    }
}

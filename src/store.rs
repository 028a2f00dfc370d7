//! # TCB Store
//!
//! Owns the memory of every Task Control Block. TCBs live in a fixed array;
//! a task's slot is its id modulo `MAX_TASKS`, so lookups are O(1) and an
//! id is never handed out while a live task occupies the same slot.

use crate::config::{FIRST_TASK_ID, MAX_TASKS};
use crate::error::{KResult, KernelError};
use crate::task::{TaskConfig, TaskControlBlock, TaskId};

pub struct TaskStore {
    tasks: [TaskControlBlock; MAX_TASKS],
    next_id: u32,
    live: usize,
}

impl TaskStore {
    pub const fn new() -> Self {
        Self {
            tasks: [TaskControlBlock::EMPTY; MAX_TASKS],
            next_id: FIRST_TASK_ID,
            live: 0,
        }
    }

    #[inline]
    fn slot(id: TaskId) -> usize {
        id.as_u32() as usize % MAX_TASKS
    }

    /// Allocate a TCB for a new task and return its id.
    ///
    /// Ids increase monotonically (wrapping, skipping 0); candidates whose
    /// slot is still occupied are skipped.
    pub fn allocate(&mut self, config: TaskConfig) -> KResult<TaskId> {
        if self.live >= MAX_TASKS {
            return Err(KernelError::TaskTableFull);
        }

        loop {
            let id = TaskId::new(self.next_id);
            self.next_id = self.next_id.wrapping_add(1).max(FIRST_TASK_ID);

            let slot = Self::slot(id);
            if !self.tasks[slot].active {
                self.tasks[slot].init(id, config);
                self.live += 1;
                return Ok(id);
            }
        }
    }

    /// Free the TCB of `id`. Its slot may be reused afterwards.
    pub fn release(&mut self, id: TaskId) -> KResult<()> {
        let tcb = self.get_mut(id).ok_or(KernelError::NoSuchTask(id))?;
        tcb.active = false;
        tcb.exit_hooks.clear();
        tcb.stream_flush = None;
        self.live -= 1;
        Ok(())
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskControlBlock> {
        let tcb = &self.tasks[Self::slot(id)];
        (tcb.active && tcb.id == id).then_some(tcb)
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskControlBlock> {
        let tcb = &mut self.tasks[Self::slot(id)];
        (tcb.active && tcb.id == id).then_some(tcb)
    }

    /// Number of live tasks.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate over live TCBs.
    pub fn iter(&self) -> impl Iterator<Item = &TaskControlBlock> {
        self.tasks.iter().filter(|tcb| tcb.active)
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskState;

    fn config(priority: u8) -> TaskConfig {
        TaskConfig {
            name: "t",
            priority,
        }
    }

    #[test]
    fn test_allocate_assigns_increasing_ids() {
        let mut store = TaskStore::new();
        let a = store.allocate(config(1)).unwrap();
        let b = store.allocate(config(2)).unwrap();

        assert_eq!(a, TaskId::new(FIRST_TASK_ID));
        assert_eq!(b, TaskId::new(FIRST_TASK_ID + 1));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(b).unwrap().priority, 2);
        assert_eq!(store.get(a).unwrap().state, TaskState::Inactive);
    }

    #[test]
    fn test_table_full() {
        let mut store = TaskStore::new();
        for _ in 0..MAX_TASKS {
            store.allocate(config(1)).unwrap();
        }
        assert_eq!(store.allocate(config(1)), Err(KernelError::TaskTableFull));
    }

    #[test]
    fn test_released_id_is_not_reused() {
        let mut store = TaskStore::new();
        let a = store.allocate(config(1)).unwrap();
        store.release(a).unwrap();

        assert!(store.get(a).is_none());
        assert!(store.is_empty());

        let b = store.allocate(config(1)).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.release(a), Err(KernelError::NoSuchTask(a)));
    }

    #[test]
    fn test_occupied_slot_is_skipped() {
        let mut store = TaskStore::new();
        let first = store.allocate(config(1)).unwrap();
        // Free every other slot so the id counter wraps onto `first`'s slot
        for _ in 1..MAX_TASKS {
            let id = store.allocate(config(1)).unwrap();
            store.release(id).unwrap();
        }

        let next = store.allocate(config(1)).unwrap();
        assert_ne!(next.as_u32() as usize % MAX_TASKS, first.as_u32() as usize % MAX_TASKS);
        assert!(store.get(first).is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_stale_id_does_not_resolve() {
        let mut store = TaskStore::new();
        let a = store.allocate(config(1)).unwrap();
        store.release(a).unwrap();
        // Cycle ids until a new task lands in the old slot
        let mut reused = None;
        for _ in 0..MAX_TASKS {
            let id = store.allocate(config(1)).unwrap();
            if id.as_u32() as usize % MAX_TASKS == a.as_u32() as usize % MAX_TASKS {
                reused = Some(id);
                break;
            }
            store.release(id).unwrap();
        }

        let reused = reused.unwrap();
        assert!(store.get(a).is_none());
        assert!(store.get(reused).is_some());
    }
}

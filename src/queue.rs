//! # Task Queues
//!
//! A fixed-capacity sequence of task ids. The same type backs the
//! ready-to-run queue, the pending queue and each blocked queue; ordering
//! policy is chosen by the insertion method the scheduler calls.

use heapless::Vec;

use crate::config::MAX_TASKS;
use crate::error::{KResult, KernelError};
use crate::store::TaskStore;
use crate::task::TaskId;

#[derive(Debug)]
pub struct TaskQueue {
    entries: Vec<TaskId, MAX_TASKS>,
}

impl TaskQueue {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert `id` behind every task of equal or higher priority.
    ///
    /// Returns the position the task landed at; `0` means it is the new
    /// head.
    pub fn insert_prioritized(&mut self, id: TaskId, store: &TaskStore) -> KResult<usize> {
        let priority = store.get(id).ok_or(KernelError::NoSuchTask(id))?.priority;

        let position = self
            .entries
            .iter()
            .position(|&other| store.get(other).map_or(0, |tcb| tcb.priority) < priority)
            .unwrap_or(self.entries.len());

        self.entries
            .insert(position, id)
            .map_err(|_| KernelError::QueueFull)?;
        Ok(position)
    }

    /// Append `id` at the tail, ignoring priority.
    pub fn push_back(&mut self, id: TaskId) -> KResult<()> {
        self.entries.push(id).map_err(|_| KernelError::QueueFull)
    }

    /// Remove `id` if present. Returns the position it was removed from.
    pub fn remove(&mut self, id: TaskId) -> Option<usize> {
        let position = self.position(id)?;
        self.entries.remove(position);
        Some(position)
    }

    /// Remove and return the head.
    pub fn pop_front(&mut self) -> Option<TaskId> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    #[inline]
    pub fn head(&self) -> Option<TaskId> {
        self.entries.first().copied()
    }

    /// The task right behind the head.
    #[inline]
    pub fn second(&self) -> Option<TaskId> {
        self.entries.get(1).copied()
    }

    #[inline]
    pub fn position(&self, id: TaskId) -> Option<usize> {
        self.entries.iter().position(|&other| other == id)
    }

    #[inline]
    pub fn contains(&self, id: TaskId) -> bool {
        self.position(id).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.entries.iter().copied()
    }

    pub fn as_slice(&self) -> &[TaskId] {
        &self.entries
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskConfig;

    fn spawn(store: &mut TaskStore, priority: u8) -> TaskId {
        store
            .allocate(TaskConfig {
                name: "t",
                priority,
            })
            .unwrap()
    }

    #[test]
    fn test_prioritized_insert_orders_descending() {
        let mut store = TaskStore::new();
        let low = spawn(&mut store, 1);
        let high = spawn(&mut store, 9);
        let mid = spawn(&mut store, 5);

        let mut queue = TaskQueue::new();
        assert_eq!(queue.insert_prioritized(low, &store), Ok(0));
        assert_eq!(queue.insert_prioritized(high, &store), Ok(0));
        assert_eq!(queue.insert_prioritized(mid, &store), Ok(1));

        assert_eq!(queue.as_slice(), &[high, mid, low]);
        assert_eq!(queue.head(), Some(high));
        assert_eq!(queue.second(), Some(mid));
    }

    #[test]
    fn test_equal_priority_is_fifo() {
        let mut store = TaskStore::new();
        let first = spawn(&mut store, 3);
        let second = spawn(&mut store, 3);

        let mut queue = TaskQueue::new();
        queue.insert_prioritized(first, &store).unwrap();
        assert_eq!(queue.insert_prioritized(second, &store), Ok(1));
        assert_eq!(queue.as_slice(), &[first, second]);
    }

    #[test]
    fn test_remove_and_pop() {
        let mut store = TaskStore::new();
        let a = spawn(&mut store, 1);
        let b = spawn(&mut store, 1);

        let mut queue = TaskQueue::new();
        queue.push_back(a).unwrap();
        queue.push_back(b).unwrap();

        assert_eq!(queue.remove(b), Some(1));
        assert_eq!(queue.remove(b), None);
        assert_eq!(queue.pop_front(), Some(a));
        assert_eq!(queue.pop_front(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_unknown_task_is_rejected() {
        let store = TaskStore::new();
        let mut queue = TaskQueue::new();
        let ghost = TaskId::new(42);
        assert_eq!(
            queue.insert_prioritized(ghost, &store),
            Err(KernelError::NoSuchTask(ghost))
        );
    }
}

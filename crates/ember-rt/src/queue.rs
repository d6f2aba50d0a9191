// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Ready queue and sleep queue.
//!
//! The ready queue is two-tiered: a "fresh" tier for tasks that have never
//! been polled, and a "resume" tier for tasks coming back from a
//! suspension. Dispatch drains the *entire* fresh tier — High, then
//! Normal, then Low — before a single resume-tier task runs; only once
//! every priority's fresh lane is empty does the resume tier (again
//! High/Normal/Low) start supplying tasks. Within a lane, FIFO order is
//! insertion order. This is stronger than "same priority, fresh first":
//! a Low-priority fresh task runs before a High-priority resuming one.

use std::collections::{BinaryHeap, VecDeque};

use crate::task::{Priority, TaskId};

/// Ready queue: dispatch order is fresh tier (by priority) entirely, then
/// resume tier (by priority).
pub(crate) struct ReadyQueue {
    fresh: [VecDeque<TaskId>; 3],
    resume: [VecDeque<TaskId>; 3],
}

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        Self {
            fresh: Default::default(),
            resume: Default::default(),
        }
    }

    pub(crate) fn push_fresh(&mut self, priority: Priority, id: TaskId) {
        self.fresh[priority.index()].push_back(id);
    }

    pub(crate) fn push_resume(&mut self, priority: Priority, id: TaskId) {
        self.resume[priority.index()].push_back(id);
    }

    pub(crate) fn pop(&mut self) -> Option<TaskId> {
        for lane in &mut self.fresh {
            if let Some(id) = lane.pop_front() {
                return Some(id);
            }
        }
        for lane in &mut self.resume {
            if let Some(id) = lane.pop_front() {
                return Some(id);
            }
        }
        None
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fresh.iter().all(VecDeque::is_empty) && self.resume.iter().all(VecDeque::is_empty)
    }

    pub(crate) fn len(&self) -> usize {
        self.fresh.iter().map(VecDeque::len).sum::<usize>()
            + self.resume.iter().map(VecDeque::len).sum::<usize>()
    }

    /// Remove a pending task, e.g. on cancellation.
    pub(crate) fn remove(&mut self, id: TaskId) {
        for lane in &mut self.fresh {
            lane.retain(|t| *t != id);
        }
        for lane in &mut self.resume {
            lane.retain(|t| *t != id);
        }
    }
}

/// One entry in the sleep queue: wakes at `wake_time`, ties broken by the
/// order tasks were inserted (`seq`) so simultaneous sleepers keep FIFO
/// order when they wake together.
struct SleepEntry {
    wake_time: u64,
    seq: u64,
    task: TaskId,
}

impl PartialEq for SleepEntry {
    fn eq(&self, other: &Self) -> bool {
        self.wake_time == other.wake_time && self.seq == other.seq
    }
}
impl Eq for SleepEntry {}

impl PartialOrd for SleepEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SleepEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest wake_time (and,
        // within a tie, the earliest seq) sorts to the top.
        other
            .wake_time
            .cmp(&self.wake_time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Sleeping tasks, ordered by wake time then insertion order.
pub(crate) struct SleepQueue {
    heap: BinaryHeap<SleepEntry>,
    next_seq: u64,
}

impl SleepQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn push(&mut self, task: TaskId, wake_time: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(SleepEntry {
            wake_time,
            seq,
            task,
        });
    }

    pub(crate) fn peek_wake_time(&self) -> Option<u64> {
        self.heap.peek().map(|e| e.wake_time)
    }

    /// Pop every task whose `wake_time <= now`, in wake-order.
    pub(crate) fn drain_due(&mut self, now: u64) -> Vec<TaskId> {
        let mut woken = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.wake_time > now {
                break;
            }
            woken.push(self.heap.pop().unwrap().task);
        }
        woken
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Remove a sleeping task, e.g. on cancellation.
    pub(crate) fn remove(&mut self, id: TaskId) {
        if !self.heap.iter().any(|e| e.task == id) {
            return;
        }
        let remaining: Vec<SleepEntry> = self
            .heap
            .drain()
            .filter(|e| e.task != id)
            .collect();
        self.heap = remaining.into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> TaskId {
        TaskId(n)
    }

    #[test]
    fn ready_queue_priority_then_fifo() {
        let mut q = ReadyQueue::new();
        q.push_fresh(Priority::Low, id(1));
        q.push_fresh(Priority::High, id(2));
        q.push_fresh(Priority::Normal, id(3));
        q.push_fresh(Priority::High, id(4));
        assert_eq!(q.pop(), Some(id(2)));
        assert_eq!(q.pop(), Some(id(4)));
        assert_eq!(q.pop(), Some(id(3)));
        assert_eq!(q.pop(), Some(id(1)));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn fresh_beats_resume_at_same_priority() {
        let mut q = ReadyQueue::new();
        q.push_resume(Priority::Normal, id(1));
        q.push_fresh(Priority::Normal, id(2));
        assert_eq!(q.pop(), Some(id(2)));
        assert_eq!(q.pop(), Some(id(1)));
    }

    #[test]
    fn low_priority_fresh_beats_high_priority_resume() {
        // The whole fresh tier drains, across every priority, before any
        // resume-tier task is dispatched at all.
        let mut q = ReadyQueue::new();
        q.push_resume(Priority::High, id(1));
        q.push_fresh(Priority::Low, id(2));
        assert_eq!(q.pop(), Some(id(2)));
        assert_eq!(q.pop(), Some(id(1)));
    }

    #[test]
    fn sleep_queue_orders_by_wake_time_then_insertion() {
        let mut sq = SleepQueue::new();
        sq.push(id(1), 10);
        sq.push(id(2), 5);
        sq.push(id(3), 5);
        assert_eq!(sq.peek_wake_time(), Some(5));
        assert_eq!(sq.drain_due(5), vec![id(2), id(3)]);
        assert_eq!(sq.drain_due(10), vec![id(1)]);
    }

    #[test]
    fn sleep_queue_remove() {
        let mut sq = SleepQueue::new();
        sq.push(id(1), 5);
        sq.push(id(2), 5);
        sq.remove(id(1));
        assert_eq!(sq.drain_due(5), vec![id(2)]);
    }
}

// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Observability counters.
//!
//! A read-only snapshot of scheduler activity, exposed both as a plain
//! struct (`Scheduler::metrics`) and mirrored into the `tracing`
//! run-summary event at INFO, so a unit test and an operator reading logs
//! see the same numbers.

use std::cell::Cell;

/// Snapshot of scheduler activity since it was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerMetrics {
    pub tasks_created: u64,
    pub tasks_completed: u64,
    pub tasks_cancelled: u64,
    pub tasks_blocked: u64,
    pub sleeps_scheduled: u64,
    pub sleeps_woken: u64,
    pub steps_executed: u64,
    pub idle_cycles: u64,
    pub ready_depth: u64,
    pub ready_depth_max: u64,
    pub sleep_depth: u64,
    pub sleep_depth_max: u64,
    pub now: u64,
}

#[derive(Default)]
pub(crate) struct MetricsCell {
    tasks_created: Cell<u64>,
    tasks_completed: Cell<u64>,
    tasks_cancelled: Cell<u64>,
    tasks_blocked: Cell<u64>,
    sleeps_scheduled: Cell<u64>,
    sleeps_woken: Cell<u64>,
    steps_executed: Cell<u64>,
    idle_cycles: Cell<u64>,
    ready_depth_max: Cell<u64>,
    sleep_depth_max: Cell<u64>,
}

impl MetricsCell {
    pub(crate) fn task_created(&self) {
        self.tasks_created.set(self.tasks_created.get() + 1);
    }
    pub(crate) fn task_completed(&self) {
        self.tasks_completed.set(self.tasks_completed.get() + 1);
    }
    pub(crate) fn task_cancelled(&self) {
        self.tasks_cancelled.set(self.tasks_cancelled.get() + 1);
    }
    pub(crate) fn task_blocked(&self) {
        self.tasks_blocked.set(self.tasks_blocked.get() + 1);
    }
    pub(crate) fn sleep_scheduled(&self) {
        self.sleeps_scheduled.set(self.sleeps_scheduled.get() + 1);
    }
    pub(crate) fn sleep_woken(&self) {
        self.sleeps_woken.set(self.sleeps_woken.get() + 1);
    }
    pub(crate) fn step_executed(&self) {
        self.steps_executed.set(self.steps_executed.get() + 1);
    }
    pub(crate) fn steps_executed(&self) -> u64 {
        self.steps_executed.get()
    }
    pub(crate) fn idle_cycle(&self) {
        self.idle_cycles.set(self.idle_cycles.get() + 1);
    }
    pub(crate) fn observe_ready_depth(&self, depth: u64) {
        if depth > self.ready_depth_max.get() {
            self.ready_depth_max.set(depth);
        }
    }
    pub(crate) fn observe_sleep_depth(&self, depth: u64) {
        if depth > self.sleep_depth_max.get() {
            self.sleep_depth_max.set(depth);
        }
    }

    pub(crate) fn snapshot(&self, ready_depth: u64, sleep_depth: u64, now: u64) -> SchedulerMetrics {
        SchedulerMetrics {
            tasks_created: self.tasks_created.get(),
            tasks_completed: self.tasks_completed.get(),
            tasks_cancelled: self.tasks_cancelled.get(),
            tasks_blocked: self.tasks_blocked.get(),
            sleeps_scheduled: self.sleeps_scheduled.get(),
            sleeps_woken: self.sleeps_woken.get(),
            steps_executed: self.steps_executed.get(),
            idle_cycles: self.idle_cycles.get(),
            ready_depth,
            ready_depth_max: self.ready_depth_max.get(),
            sleep_depth,
            sleep_depth_max: self.sleep_depth_max.get(),
            now,
        }
    }
}

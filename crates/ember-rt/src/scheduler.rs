// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Deterministic, single-threaded scheduler.
//!
//! Replaces the M:N work-stealing scheduler that used to live under
//! `green/`: that one spread tasks across worker threads and an epoll
//! reactor specifically to maximize throughput, which also means two
//! runs of the same program can interleave differently. This scheduler
//! gives up parallelism entirely in exchange for exactly one possible
//! trace per program — one thread, one logical clock, one FIFO-ordered
//! ready queue per priority tier.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use tracing::{debug, info, trace};

use crate::error::RuntimeError;
use crate::metrics::{MetricsCell, SchedulerMetrics};
use crate::queue::{ReadyQueue, SleepQueue};
use crate::task::{Priority, ScheduledTask, TaskEntry, TaskHandle, TaskId, TaskState};

/// Tunable knobs for a `Scheduler`. Defaults match the dispatch algorithm
/// exactly: two flush passes per step, no step ceiling.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Number of deferred-action drain passes run after each step. Two is
    /// the minimum that lets a resumed task run to its next suspension
    /// point *and* lets any continuation that suspension itself queues
    /// settle before the next task is dispatched.
    pub flush_passes: u32,
    /// Optional ceiling on the number of steps `run()` will execute — a
    /// deterministic stand-in for a wall-clock watchdog, since real time
    /// is out of scope here. `None` means unbounded.
    pub max_steps: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            flush_passes: 2,
            max_steps: None,
        }
    }
}

struct Inner {
    config: SchedulerConfig,
    now: Cell<u64>,
    next_task_id: Cell<u64>,
    running: Cell<bool>,
    current_task: Cell<Option<TaskId>>,
    tasks: RefCell<std::collections::HashMap<TaskId, Rc<dyn ScheduledTask>>>,
    ready: RefCell<ReadyQueue>,
    sleeping: RefCell<SleepQueue>,
    metrics: MetricsCell,
}

/// Owns every task, the logical clock, and the ready/sleep queues for one
/// deterministic run. Not `Sync` — see the crate-level docs on why the
/// scheduler is never meant to be shared across threads.
pub struct Scheduler {
    inner: Rc<Inner>,
}

thread_local! {
    static CURRENT: RefCell<Option<Rc<Inner>>> = const { RefCell::new(None) };
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                config,
                now: Cell::new(0),
                next_task_id: Cell::new(0),
                running: Cell::new(false),
                current_task: Cell::new(None),
                tasks: RefCell::new(std::collections::HashMap::new()),
                ready: RefCell::new(ReadyQueue::new()),
                sleeping: RefCell::new(SleepQueue::new()),
                metrics: MetricsCell::default(),
            }),
        }
    }

    /// Current logical time.
    pub fn now(&self) -> u64 {
        self.inner.now.get()
    }

    /// A read-only snapshot of activity counters.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.inner.metrics.snapshot(
            self.inner.ready.borrow().len() as u64,
            self.inner.sleeping.borrow().len() as u64,
            self.inner.now.get(),
        )
    }

    /// Id of the task currently executing on this scheduler's stack, or
    /// `None` between dispatches.
    pub fn current_task_id(&self) -> Option<TaskId> {
        self.inner.current_task.get()
    }

    /// Register a new task body and enqueue it on the new/fresh tier.
    pub fn spawn<F>(&self, future: F, priority: Priority) -> TaskHandle<F::Output>
    where
        F: Future + 'static,
    {
        self.inner.spawn(future, priority)
    }

    /// Drive every task to completion, or until idle with no sleepers.
    pub fn run(&self) -> Result<(), RuntimeError> {
        if self.inner.running.replace(true) {
            return Err(RuntimeError::AlreadyRunning);
        }
        info!(scheduler.now = self.inner.now.get(), "scheduler run starting");
        CURRENT.with(|c| *c.borrow_mut() = Some(self.inner.clone()));
        let result = self.inner.run_loop();
        CURRENT.with(|c| *c.borrow_mut() = None);
        self.inner.running.set(false);
        let m = self.metrics();
        info!(
            tasks_created = m.tasks_created,
            tasks_completed = m.tasks_completed,
            tasks_cancelled = m.tasks_cancelled,
            steps_executed = m.steps_executed,
            now = m.now,
            "scheduler run finished"
        );
        result
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

enum StepOutcome {
    Dispatched,
    Idle,
    Waiting,
    Done,
}

impl Inner {
    fn spawn<F>(self: &Rc<Self>, future: F, priority: Priority) -> TaskHandle<F::Output>
    where
        F: Future + 'static,
    {
        let id = TaskId(self.next_task_id.get());
        self.next_task_id.set(id.0 + 1);
        let (entry, handle) = TaskEntry::new(id, priority, self.now.get(), Box::pin(future));
        let entry: Rc<dyn ScheduledTask> = entry;
        self.tasks.borrow_mut().insert(id, entry.clone());
        self.ready.borrow_mut().push_fresh(priority, id);
        self.metrics.observe_ready_depth(self.ready.borrow().len() as u64);
        self.metrics.task_created();

        let weak_self = Rc::downgrade(self);
        entry.set_cancel_hook(Rc::new(move |task_id| {
            if let Some(inner) = weak_self.upgrade() {
                inner.cancel_task(task_id);
            }
        }));
        handle
    }

    fn cancel_task(self: &Rc<Self>, id: TaskId) {
        let Some(task) = self.tasks.borrow().get(&id).cloned() else {
            return;
        };
        if matches!(task.state(), TaskState::Completed | TaskState::Cancelled) {
            return;
        }
        // A task cancelling itself is still on the stack inside its own
        // `poll` (see `step`) — dropping the future here would double-borrow
        // it. Defer to the next suspension point instead, per the
        // self-cancellation rule.
        if self.current_task.get() == Some(id) {
            task.request_self_cancel();
            return;
        }
        self.ready.borrow_mut().remove(id);
        self.sleeping.borrow_mut().remove(id);
        task.force_cancel();
        self.metrics.task_cancelled();
        self.tasks.borrow_mut().remove(&id);
    }

    fn run_loop(self: &Rc<Self>) -> Result<(), RuntimeError> {
        loop {
            match self.step() {
                StepOutcome::Done => return Ok(()),
                StepOutcome::Idle => {
                    if self.sleeping.borrow().is_empty() {
                        return Ok(());
                    }
                    self.flush();
                }
                StepOutcome::Waiting | StepOutcome::Dispatched => {
                    self.flush();
                }
            }
            if let Some(max) = self.config.max_steps {
                if self.metrics.steps_executed() >= max {
                    return Ok(());
                }
            }
        }
    }

    fn step(self: &Rc<Self>) -> StepOutcome {
        let now = self.now.get();
        let due = self.sleeping.borrow_mut().drain_due(now);
        for id in due {
            self.metrics.sleep_woken();
            if let Some(task) = self.tasks.borrow().get(&id).cloned() {
                if task.state() != TaskState::Cancelled {
                    task.set_state(TaskState::Pending);
                    self.ready.borrow_mut().push_resume(task.priority(), id);
                }
            }
        }

        let next = self.ready.borrow_mut().pop();
        let Some(id) = next else {
            if !self.sleeping.borrow().is_empty() {
                let wake = self.sleeping.borrow().peek_wake_time().expect("non-empty sleep queue has a peek");
                self.now.set(wake.max(now));
                self.metrics.idle_cycle();
                return StepOutcome::Idle;
            }
            if self.tasks.borrow().is_empty() {
                return StepOutcome::Done;
            }
            return StepOutcome::Waiting;
        };

        let Some(task) = self.tasks.borrow().get(&id).cloned() else {
            return StepOutcome::Dispatched;
        };
        if task.state() == TaskState::Cancelled {
            return StepOutcome::Dispatched;
        }

        task.mark_started();
        task.set_state(TaskState::Running);
        self.current_task.set(Some(id));
        debug!(task.id = id.0, task.priority = ?task.priority(), scheduler.now = now, "dispatch");

        let waker = make_waker(Rc::downgrade(self), id);
        let mut cx = Context::from_waker(&waker);
        let completed = task.poll(&mut cx);

        self.current_task.set(None);
        self.metrics.step_executed();

        let self_cancelled = task.take_self_cancel_requested();

        if completed {
            // The task ran to completion in this same step despite asking
            // to cancel itself — no further suspension point was reached,
            // so completion wins (see `cancel_task`).
            task.set_state(TaskState::Completed);
            self.metrics.task_completed();
            self.tasks.borrow_mut().remove(&id);
        } else if self_cancelled {
            self.ready.borrow_mut().remove(id);
            self.sleeping.borrow_mut().remove(id);
            task.force_cancel();
            self.metrics.task_cancelled();
            self.tasks.borrow_mut().remove(&id);
        } else if task.state() == TaskState::Running {
            // Poll returned Pending without transitioning state (e.g. a
            // future that suspended without going through sleep/channel
            // registration, such as `yield_now`): treat as blocked until
            // its waker fires.
            task.set_state(TaskState::Pending);
            self.metrics.task_blocked();
        }

        self.now.set(now + 1);
        trace!(scheduler.now = self.now.get(), "step complete");
        StepOutcome::Dispatched
    }

    fn flush(self: &Rc<Self>) {
        for _ in 0..self.config.flush_passes {
            crate::deferred::drain();
        }
    }

    fn schedule_sleep(self: &Rc<Self>, id: TaskId, wake_time: u64) {
        self.sleeping.borrow_mut().push(id, wake_time);
        self.metrics.observe_sleep_depth(self.sleeping.borrow().len() as u64);
        self.metrics.sleep_scheduled();
        if let Some(task) = self.tasks.borrow().get(&id) {
            task.set_state(TaskState::Sleeping);
            task.set_wake_time(Some(wake_time));
        }
    }

    /// Move a suspended task back onto the ready queue. Relies on every
    /// suspension point (channel waiter, sleep entry, select registration,
    /// yield) resolving exactly once, so no "already queued" guard is
    /// needed here — `TaskState::Pending` covers both "ready" and
    /// "suspended, not yet woken" and can't distinguish them on its own.
    fn wake_task(self: &Rc<Self>, id: TaskId) {
        let Some(task) = self.tasks.borrow().get(&id).cloned() else {
            return;
        };
        if matches!(task.state(), TaskState::Completed | TaskState::Cancelled) {
            return;
        }
        task.set_state(TaskState::Pending);
        self.ready.borrow_mut().push_resume(task.priority(), id);
        self.metrics.observe_ready_depth(self.ready.borrow().len() as u64);
    }
}

// --- Hand-rolled Rc-based Waker -------------------------------------------
//
// `std::task::Wake` requires `Arc` + `Send` + `Sync`, which this crate's
// single-threaded, `Rc`/`Cell`-based task model cannot and should not
// provide — wrapping every task id in an `Arc` just to satisfy a trait
// bound neither scheduler nor task needs would be a lie about the
// concurrency model. The raw vtable below is the documented escape hatch
// for exactly this situation (see `std::task::RawWaker`), so a wake is a
// thread-local lookup of the originating scheduler plus a ready-queue
// push, with no atomics anywhere in the hot path.

struct WakerData {
    scheduler: std::rc::Weak<Inner>,
    task: TaskId,
}

fn make_waker(scheduler: std::rc::Weak<Inner>, task: TaskId) -> Waker {
    let data = Box::into_raw(Box::new(WakerData { scheduler, task }));
    let raw = RawWaker::new(data as *const (), &VTABLE);
    unsafe { Waker::from_raw(raw) }
}

fn clone_raw(ptr: *const ()) -> RawWaker {
    let data = unsafe { &*(ptr as *const WakerData) };
    let cloned = Box::into_raw(Box::new(WakerData {
        scheduler: data.scheduler.clone(),
        task: data.task,
    }));
    RawWaker::new(cloned as *const (), &VTABLE)
}

fn wake(ptr: *const ()) {
    let data = unsafe { Box::from_raw(ptr as *mut WakerData) };
    if let Some(inner) = data.scheduler.upgrade() {
        inner.wake_task(data.task);
    }
}

fn wake_by_ref(ptr: *const ()) {
    let data = unsafe { &*(ptr as *const WakerData) };
    if let Some(inner) = data.scheduler.upgrade() {
        inner.wake_task(data.task);
    }
}

fn drop_raw(ptr: *const ()) {
    drop(unsafe { Box::from_raw(ptr as *mut WakerData) });
}

static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, wake, wake_by_ref, drop_raw);

// --- Ambient free functions ------------------------------------------------

fn with_current<R>(f: impl FnOnce(&Rc<Inner>) -> R) -> Result<R, RuntimeError> {
    CURRENT.with(|c| match c.borrow().as_ref() {
        Some(inner) => Ok(f(inner)),
        None => Err(RuntimeError::InvalidContext),
    })
}

/// Spawn a task on the ambient "current" scheduler (the one whose `run()`
/// is on the stack). Panics via `RuntimeError::InvalidContext` returned
/// from the caller is not possible here since there is no caller to
/// return to before a scheduler exists — use `Scheduler::spawn` directly
/// outside of task bodies.
pub fn spawn<F>(future: F, priority: Priority) -> Result<TaskHandle<F::Output>, RuntimeError>
where
    F: Future + 'static,
{
    with_current(|inner| inner.spawn(future, priority))
}

/// Suspend the calling task for `ticks` logical ticks. `ticks == 0` still
/// round-trips through the sleep queue and the scheduler's next sweep.
pub fn sleep(ticks: u64) -> SleepFuture {
    SleepFuture {
        ticks,
        armed: false,
    }
}

pub struct SleepFuture {
    ticks: u64,
    armed: bool,
}

impl Future for SleepFuture {
    type Output = Result<(), RuntimeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.armed {
            return Poll::Ready(Ok(()));
        }
        let result = with_current(|inner| {
            let Some(id) = inner.current_task.get() else {
                return Err(RuntimeError::InvalidContext);
            };
            let wake_time = inner.now.get() + this.ticks;
            inner.schedule_sleep(id, wake_time);
            Ok(())
        });
        match result {
            Ok(Ok(())) => {
                this.armed = true;
                let _ = cx.waker();
                Poll::Pending
            }
            Ok(Err(e)) | Err(e) => Poll::Ready(Err(e)),
        }
    }
}

/// Yield to the scheduler: re-enqueue on the resume tier at the calling
/// task's priority, then suspend once. A no-op outside a running task.
pub fn yield_now() -> YieldFuture {
    YieldFuture { yielded: false }
}

pub struct YieldFuture {
    yielded: bool,
}

impl Future for YieldFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _ = cx;
        if this.yielded {
            return Poll::Ready(());
        }
        this.yielded = true;
        // Re-enqueue directly on the resume tier rather than going
        // through the task's waker: calling both would double-push this
        // same task onto the ready queue in one suspension.
        let woke = with_current(|inner| {
            let Some(id) = inner.current_task.get() else {
                return false;
            };
            inner.wake_task(id);
            true
        })
        .unwrap_or(false);
        if !woke {
            return Poll::Ready(());
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn run_completes_with_no_tasks() {
        let sched = Scheduler::new();
        assert!(sched.run().is_ok());
    }

    #[test]
    fn already_running_is_rejected_on_reentry() {
        // Reentrant `run()` calls aren't reachable from a single-threaded
        // task body in this API (no task can call `run` on its own
        // scheduler), so this test exercises the flag directly.
        let sched = Scheduler::new();
        sched.inner.running.set(true);
        assert!(matches!(sched.run(), Err(RuntimeError::AlreadyRunning)));
        sched.inner.running.set(false);
    }

    #[test]
    fn spawned_task_runs_and_completes() {
        let sched = Scheduler::new();
        let ran = Rc::new(StdRefCell::new(false));
        let r = ran.clone();
        let handle = sched.spawn(
            async move {
                *r.borrow_mut() = true;
                7
            },
            Priority::Normal,
        );
        sched.run().unwrap();
        assert!(*ran.borrow());
        assert_eq!(handle.result(), Some(7));
    }

    #[test]
    fn high_priority_task_runs_before_low_with_no_suspension() {
        let sched = Scheduler::new();
        let trace = Rc::new(StdRefCell::new(Vec::new()));
        let t1 = trace.clone();
        sched.spawn(
            async move {
                t1.borrow_mut().push("L");
            },
            Priority::Low,
        );
        let t2 = trace.clone();
        sched.spawn(
            async move {
                t2.borrow_mut().push("H");
            },
            Priority::High,
        );
        sched.run().unwrap();
        assert_eq!(*trace.borrow(), vec!["H", "L"]);
    }

    #[test]
    fn sleep_orders_by_wake_time() {
        let sched = Scheduler::new();
        let trace = Rc::new(StdRefCell::new(Vec::new()));
        for (label, ticks) in [("a", 10u64), ("b", 5), ("c", 15)] {
            let t = trace.clone();
            sched.spawn(
                async move {
                    crate::scheduler::sleep(ticks).await.unwrap();
                    t.borrow_mut().push(label);
                },
                Priority::Normal,
            );
        }
        sched.run().unwrap();
        assert_eq!(*trace.borrow(), vec!["b", "a", "c"]);
    }

    #[test]
    fn cancel_before_dispatch_prevents_body_from_running() {
        let sched = Scheduler::new();
        let ran = Rc::new(StdRefCell::new(false));
        let r = ran.clone();
        let handle = sched.spawn(
            async move {
                *r.borrow_mut() = true;
            },
            Priority::Normal,
        );
        handle.cancel();
        sched.run().unwrap();
        assert!(!*ran.borrow());
        assert_eq!(handle.state(), TaskState::Cancelled);
    }
}

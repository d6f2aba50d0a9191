// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Task representation.
//!
//! A task wraps a boxed future. Unlike the work-stealing green tasks this
//! module used to drive, there is exactly one scheduler, on one thread,
//! deciding when each task is polled — so the header fields here are
//! `Cell`/`RefCell`, not atomics, and task identity is `Rc`-shared rather
//! than `Arc`-shared.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::error::RuntimeError;

/// Stable, monotonically increasing task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Scheduling priority. Smaller ordinal dispatches first: `High < Normal < Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    High = 0,
    #[default]
    Normal = 1,
    Low = 2,
}

impl Priority {
    pub(crate) const ALL: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Ready to run, or suspended awaiting a future wakeup — not currently
    /// on the scheduler's stack.
    Pending,
    /// Currently being polled; the task's own code is on the stack.
    Running,
    /// Parked in the sleep queue, waiting for the logical clock.
    Sleeping,
    /// Finished; a result or error is available.
    Completed,
    /// Cancelled before completion.
    Cancelled,
}

/// Shared state between a scheduled task and every `TaskHandle` cloned from it.
pub(crate) struct TaskHeader<T> {
    pub id: TaskId,
    pub priority: Priority,
    pub state: Cell<TaskState>,
    pub started: Cell<bool>,
    pub cancelled: Cell<bool>,
    pub created_tick: u64,
    pub wake_time: Cell<Option<u64>>,
    /// Set when a task cancels itself while its own future is being
    /// polled — the drop can't happen inline (see `force_cancel`), so
    /// `step` finalizes it once `poll` has returned.
    self_cancel_requested: Cell<bool>,
    result: RefCell<Option<Result<T, RuntimeError>>>,
    /// Set by the scheduler at spawn time; lets `TaskHandle::cancel` reach
    /// back into the scheduler without the header knowing its concrete type.
    cancel_hook: RefCell<Option<Rc<dyn Fn(TaskId)>>>,
}

impl<T> TaskHeader<T> {
    fn new(id: TaskId, priority: Priority, created_tick: u64) -> Self {
        Self {
            id,
            priority,
            state: Cell::new(TaskState::Pending),
            started: Cell::new(false),
            cancelled: Cell::new(false),
            created_tick,
            wake_time: Cell::new(None),
            self_cancel_requested: Cell::new(false),
            result: RefCell::new(None),
            cancel_hook: RefCell::new(None),
        }
    }
}

/// Internal trait the scheduler uses to drive a type-erased task.
///
/// Mirrors the old work-stealing runtime's `RawTask::poll` shape, but
/// `poll` here is only ever called from the scheduler's own `step`.
pub(crate) trait ScheduledTask {
    fn id(&self) -> TaskId;
    fn priority(&self) -> Priority;
    fn state(&self) -> TaskState;
    fn set_state(&self, state: TaskState);
    fn started(&self) -> bool;
    fn mark_started(&self);
    fn wake_time(&self) -> Option<u64>;
    fn set_wake_time(&self, t: Option<u64>);
    fn set_cancel_hook(&self, hook: Rc<dyn Fn(TaskId)>);
    /// Poll the underlying future once. Returns true if it completed.
    fn poll(&self, cx: &mut Context<'_>) -> bool;
    /// Force-terminate: drop the future (idiomatic Rust cancellation —
    /// see DESIGN.md) and record `RuntimeError::Cancelled` as the result.
    /// Must only be called while this task's own `poll` is not currently
    /// on the stack (see `request_self_cancel`).
    fn force_cancel(&self);
    /// Record that this task asked to cancel itself from inside its own
    /// currently-running `poll`. `step` must finalize the cancellation
    /// with `force_cancel` once `poll` returns.
    fn request_self_cancel(&self);
    /// Consume the flag set by `request_self_cancel`.
    fn take_self_cancel_requested(&self) -> bool;
}

pub(crate) struct TaskEntry<T> {
    header: Rc<TaskHeader<T>>,
    future: RefCell<Option<Pin<Box<dyn Future<Output = T>>>>>,
}

impl<T> TaskEntry<T> {
    pub(crate) fn new(
        id: TaskId,
        priority: Priority,
        created_tick: u64,
        future: Pin<Box<dyn Future<Output = T>>>,
    ) -> (Rc<Self>, TaskHandle<T>) {
        let header = Rc::new(TaskHeader::new(id, priority, created_tick));
        let entry = Rc::new(Self {
            header: header.clone(),
            future: RefCell::new(Some(future)),
        });
        (entry, TaskHandle { header })
    }
}

impl<T> ScheduledTask for TaskEntry<T> {
    fn id(&self) -> TaskId {
        self.header.id
    }

    fn priority(&self) -> Priority {
        self.header.priority
    }

    fn state(&self) -> TaskState {
        self.header.state.get()
    }

    fn set_state(&self, state: TaskState) {
        self.header.state.set(state);
    }

    fn started(&self) -> bool {
        self.header.started.get()
    }

    fn mark_started(&self) {
        self.header.started.set(true);
    }

    fn wake_time(&self) -> Option<u64> {
        self.header.wake_time.get()
    }

    fn set_wake_time(&self, t: Option<u64>) {
        self.header.wake_time.set(t);
    }

    fn set_cancel_hook(&self, hook: Rc<dyn Fn(TaskId)>) {
        *self.header.cancel_hook.borrow_mut() = Some(hook);
    }

    fn poll(&self, cx: &mut Context<'_>) -> bool {
        let mut slot = self.future.borrow_mut();
        let Some(fut) = slot.as_mut() else {
            return true;
        };
        match fut.as_mut().poll(cx) {
            Poll::Ready(value) => {
                *slot = None;
                *self.header.result.borrow_mut() = Some(Ok(value));
                true
            }
            Poll::Pending => false,
        }
    }

    fn force_cancel(&self) {
        // Dropping the pending future is how cancellation reaches a task
        // mid-suspend: there is no live `Waker` call that could hand a
        // typed error back through an in-flight `.await`. See DESIGN.md.
        self.future.borrow_mut().take();
        self.header.cancelled.set(true);
        self.header.state.set(TaskState::Cancelled);
        *self.header.result.borrow_mut() = Some(Err(RuntimeError::Cancelled));
    }

    fn request_self_cancel(&self) {
        self.header.self_cancel_requested.set(true);
    }

    fn take_self_cancel_requested(&self) -> bool {
        self.header.self_cancel_requested.replace(false)
    }
}

/// Handle to a spawned task.
///
/// Cloning a handle is cheap (`Rc` clone) and, unlike the old OS-thread
/// runtime's affine `TaskHandle`, does not need to be consumed — the
/// scheduler reaps the task from its table on completion regardless of
/// how many handles (if any) are still outstanding.
pub struct TaskHandle<T> {
    header: Rc<TaskHeader<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            header: self.header.clone(),
        }
    }
}

impl<T> TaskHandle<T> {
    /// Stable task id.
    pub fn id(&self) -> TaskId {
        self.header.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.header.state.get()
    }

    /// Take the task's result, if it has completed successfully.
    ///
    /// Returns `None` before completion, and also after the result has
    /// already been taken once or the task failed/was cancelled.
    pub fn result(&self) -> Option<T> {
        let mut slot = self.header.result.borrow_mut();
        if matches!(slot.as_ref(), Some(Ok(_))) {
            slot.take().and_then(|r| r.ok())
        } else {
            None
        }
    }

    /// Take the task's terminal error, if it failed or was cancelled.
    pub fn error(&self) -> Option<RuntimeError> {
        let mut slot = self.header.result.borrow_mut();
        if matches!(slot.as_ref(), Some(Err(_))) {
            slot.take().and_then(|r| r.err())
        } else {
            None
        }
    }

    /// Request cancellation. No-op if the task is already terminal.
    pub fn cancel(&self) {
        if matches!(
            self.header.state.get(),
            TaskState::Completed | TaskState::Cancelled
        ) {
            return;
        }
        if let Some(hook) = self.header.cancel_hook.borrow().as_ref() {
            hook(self.header.id);
        }
    }
}

// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Deterministic cooperative concurrency runtime.
//!
//! One scheduler, one thread, one logical clock. Every suspension point —
//! `send`, `recv`, `select`, `sleep`, `yield_now` — resolves through the
//! same FIFO-ordered ready queue, so a program built only from these
//! primitives produces the same trace every time it runs. This replaces
//! the two concurrency backends this crate used to ship (an OS-thread one
//! in this module, a work-stealing M:N one under `green/`) with a single
//! deterministic implementation; see DESIGN.md for why both predecessors
//! were removed rather than kept alongside it.
//!
//! Components:
//! - `scheduler` — logical clock, ready/sleep queues, task dispatch
//! - `channel` — CSP-style rendezvous/buffered message passing
//! - `select` — multi-way channel operation matching
//! - `task` — task identity, state, and handles
//! - `mutex`/`shared` — synchronous adapters, for when embedding code
//!   needs to share state with something outside this scheduler
//! - `metrics`/`error` — observability counters and the error taxonomy

pub mod channel;
pub mod deferred;
pub mod error;
pub mod metrics;
pub mod mutex;
pub mod queue;
pub mod scheduler;
pub mod select;
pub mod shared;
pub mod task;

pub use channel::Channel;
pub use error::{RuntimeError, SendError, TryRecvError, TrySendError};
pub use metrics::SchedulerMetrics;
pub use scheduler::{sleep, spawn, yield_now, Scheduler, SchedulerConfig};
pub use select::{select, select_or_default, SelectCase, SelectOutcome};
pub use task::{Priority, TaskHandle, TaskId, TaskState};

/// Create a channel with the given buffer capacity (`0` = rendezvous).
pub fn channel<T>(capacity: usize) -> Channel<T> {
    Channel::new(capacity)
}

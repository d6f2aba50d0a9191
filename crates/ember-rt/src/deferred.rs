// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The flush-phase deferral queue.
//!
//! A channel rendezvous resolves the receiving side eagerly but must not
//! let the sending side's own completion run in the same scheduler step —
//! otherwise the sender's continuation could execute before the receiver's
//! (see `channel.rs`). Instead of reaching back into the scheduler, a
//! resolution closure is pushed here and the scheduler's `flush` drains it
//! after the step that produced it. Single-threaded by construction: one
//! `Scheduler::run` owns this thread for the duration of the run, so a
//! thread-local queue needs no locking.

use std::cell::RefCell;
use std::collections::VecDeque;

thread_local! {
    static QUEUE: RefCell<VecDeque<Box<dyn FnOnce()>>> = RefCell::new(VecDeque::new());
}

/// Queue a closure to run during the next flush pass.
pub(crate) fn defer(action: impl FnOnce() + 'static) {
    QUEUE.with(|q| q.borrow_mut().push_back(Box::new(action)));
}

/// Drain and run everything queued so far, in FIFO order.
///
/// Actions that themselves call `defer` queue into the *next* drain, not
/// this one — `drain` snapshots what's there before running anything.
pub(crate) fn drain() {
    let actions: Vec<Box<dyn FnOnce()>> = QUEUE.with(|q| q.borrow_mut().drain(..).collect());
    for action in actions {
        action();
    }
}

#[cfg(test)]
pub(crate) fn is_empty() -> bool {
    QUEUE.with(|q| q.borrow().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn drain_runs_in_fifo_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            defer(move || order.borrow_mut().push(i));
        }
        drain();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert!(is_empty());
    }

    #[test]
    fn actions_queued_during_drain_wait_for_next_drain() {
        let ran_nested = Rc::new(Cell::new(false));
        let nested = ran_nested.clone();
        defer(move || {
            defer(move || nested.set(true));
        });
        drain();
        assert!(!ran_nested.get());
        drain();
        assert!(ran_nested.get());
    }
}

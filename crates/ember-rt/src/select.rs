// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Multi-way select over channel operations.
//!
//! All cases in one `select` must share a channel element type `T` — this
//! crate favors the typed-but-uniform shape over a `Box<dyn Any>` case
//! list (see DESIGN.md). A fast path checks every case in declaration
//! order before anything suspends, so a tie between two already-ready
//! cases always resolves to the earlier one; only when nothing is ready
//! does `select` register a shadow waiter per case and suspend once.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::channel::Channel;
use crate::error::RuntimeError;

/// Owns the one-way completion flag shared by every shadow waiter a single
/// `select` registers. Once set, every channel holding a shadow waiter
/// back-referencing this owner must treat that waiter as dead.
pub(crate) struct SelectWaiter {
    completed: Cell<bool>,
}

impl SelectWaiter {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            completed: Cell::new(false),
        })
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completed.get()
    }

    /// Test-and-set. Returns `true` if this call is the one that claims
    /// the waiter; `false` if another case already completed it.
    pub(crate) fn claim(&self) -> bool {
        if self.completed.get() {
            false
        } else {
            self.completed.set(true);
            true
        }
    }
}

impl Drop for SelectWaiter {
    fn drop(&mut self) {
        // A select future dropped while suspended (task cancellation) must
        // make every shadow waiter it left behind look stale.
        self.completed.set(true);
    }
}

/// One arm of a `select` call.
pub enum SelectCase<'a, T> {
    Recv(&'a Channel<T>),
    Send(&'a Channel<T>, T),
}

/// Result of a completed `select`.
#[derive(Debug, Clone)]
pub struct SelectOutcome<T> {
    /// `None` when the `default` arm fired; otherwise the index into the
    /// case list that completed.
    pub case_index: Option<usize>,
    pub value: Option<T>,
    pub ok: bool,
}

pub(crate) struct SelectShared<T> {
    pub(crate) outcome: RefCell<Option<SelectOutcome<T>>>,
    pub(crate) waker: RefCell<Option<Waker>>,
}

impl<T> SelectShared<T> {
    fn new(waker: Waker) -> Rc<Self> {
        Rc::new(Self {
            outcome: RefCell::new(None),
            waker: RefCell::new(Some(waker)),
        })
    }
}

enum SelectState<T> {
    Init,
    Registered {
        shared: Rc<SelectShared<T>>,
        waiter: Rc<SelectWaiter>,
    },
    Done,
}

/// Build a `select` over `cases`, with no default arm (blocks until a case
/// is ready). Fails synchronously with `InvalidArgument` if `cases` is
/// empty.
pub fn select<'a, T: 'static>(
    cases: Vec<SelectCase<'a, T>>,
) -> Result<SelectFuture<'a, T>, RuntimeError> {
    build(cases, false)
}

/// Like [`select`], but returns `{case_index: None, ok: true}` immediately
/// instead of suspending when no case is ready.
pub fn select_or_default<'a, T: 'static>(
    cases: Vec<SelectCase<'a, T>>,
) -> Result<SelectFuture<'a, T>, RuntimeError> {
    build(cases, true)
}

fn build<'a, T: 'static>(
    cases: Vec<SelectCase<'a, T>>,
    default: bool,
) -> Result<SelectFuture<'a, T>, RuntimeError> {
    if cases.is_empty() {
        return Err(RuntimeError::InvalidArgument);
    }
    Ok(SelectFuture {
        cases: Some(cases),
        default,
        state: SelectState::Init,
    })
}

/// Future returned by [`select`] / [`select_or_default`].
pub struct SelectFuture<'a, T> {
    cases: Option<Vec<SelectCase<'a, T>>>,
    default: bool,
    state: SelectState<T>,
}

impl<'a, T> Future for SelectFuture<'a, T> {
    type Output = SelectOutcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &this.state {
            SelectState::Init => this.poll_init(cx),
            SelectState::Registered { shared, .. } => {
                let outcome = shared.outcome.borrow_mut().take();
                match outcome {
                    Some(outcome) => {
                        this.state = SelectState::Done;
                        Poll::Ready(outcome)
                    }
                    None => {
                        *shared.waker.borrow_mut() = Some(cx.waker().clone());
                        Poll::Pending
                    }
                }
            }
            SelectState::Done => unreachable!("SelectFuture polled after completion"),
        }
    }
}

impl<'a, T> SelectFuture<'a, T> {
    fn poll_init(&mut self, cx: &mut Context<'_>) -> Poll<SelectOutcome<T>> {
        let mut cases = self.cases.take().expect("SelectFuture polled twice in Init");

        // Fast path: first declared case that's immediately satisfiable.
        for idx in 0..cases.len() {
            let ready = match &cases[idx] {
                SelectCase::Recv(ch) => ch.recv_ready(),
                SelectCase::Send(ch, _) => ch.send_ready(),
            };
            if !ready {
                continue;
            }
            let case = cases.swap_remove(idx);
            return match case {
                SelectCase::Recv(ch) => {
                    let (value, ok) = ch.recv_now();
                    self.state = SelectState::Done;
                    Poll::Ready(SelectOutcome {
                        case_index: Some(idx),
                        value,
                        ok,
                    })
                }
                SelectCase::Send(ch, value) => match ch.send_now_or_defer(value) {
                    Some(ok) => {
                        self.state = SelectState::Done;
                        Poll::Ready(SelectOutcome {
                            case_index: Some(idx),
                            value: None,
                            ok,
                        })
                    }
                    None => {
                        // Handed off to a waiting receiver; the send's own
                        // completion is deferred. Park this select on a
                        // private single-case registration so the deferred
                        // wakeup resolves it.
                        let waiter = SelectWaiter::new();
                        waiter.claim();
                        let shared = SelectShared::new(cx.waker().clone());
                        ch.arm_deferred_send_case(idx, shared.clone());
                        self.state = SelectState::Registered { shared, waiter };
                        Poll::Pending
                    }
                },
            };
        }

        if self.default {
            self.state = SelectState::Done;
            return Poll::Ready(SelectOutcome {
                case_index: None,
                value: None,
                ok: true,
            });
        }

        // Slow path: register a shadow waiter on every case.
        let waiter = SelectWaiter::new();
        let shared = SelectShared::new(cx.waker().clone());
        for (idx, case) in cases.into_iter().enumerate() {
            match case {
                SelectCase::Recv(ch) => ch.register_select_recv(idx, waiter.clone(), shared.clone()),
                SelectCase::Send(ch, value) => {
                    ch.register_select_send(idx, value, waiter.clone(), shared.clone())
                }
            }
        }
        self.state = SelectState::Registered { shared, waiter };
        Poll::Pending
    }
}

impl<'a, T> Drop for SelectFuture<'a, T> {
    fn drop(&mut self) {
        // Dropping while `Registered` means the owning task was cancelled
        // mid-select; marking the waiter completed makes every shadow
        // waiter look stale to the channels that still hold them.
        if let SelectState::Registered { waiter, .. } = &self.state {
            waiter.completed.set(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{Priority, Scheduler};

    #[test]
    fn empty_case_list_is_invalid_argument() {
        let cases: Vec<SelectCase<'_, i32>> = Vec::new();
        assert!(matches!(select(cases), Err(RuntimeError::InvalidArgument)));
    }

    #[test]
    fn fast_path_prefers_earlier_declared_ready_case() {
        let sched = Scheduler::new();
        let trace = Rc::new(RefCell::new(Vec::new()));
        let t = trace.clone();
        sched.spawn(
            async move {
                let a = Channel::new(1);
                let b = Channel::new(1);
                a.send(1).await.unwrap();
                b.send(2).await.unwrap();
                let outcome = select(vec![SelectCase::Recv(&a), SelectCase::Recv(&b)])
                    .unwrap()
                    .await;
                t.borrow_mut().push(outcome.case_index);
            },
            Priority::Normal,
        );
        sched.run().unwrap();
        assert_eq!(*trace.borrow(), vec![Some(0)]);
    }
}

// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Deterministic CSP-style channels.
//!
//! Replaces the old `std::sync::mpsc` wrapper: that version's blocking
//! `send`/`recv` hid non-deterministic OS-thread scheduling behind a
//! channel API, which is exactly what the rest of this crate exists to
//! remove. A `Channel<T>` here has no split sender/receiver handle — any
//! clone can send or receive — and every wait is resolved by this
//! process's own single-threaded scheduler, so the same program replayed
//! twice produces the same interleaving.
//!
//! Rendezvous ordering: whichever side is pulled out of a wait queue by
//! the other (rather than being the one actively calling `send`/`recv`
//! right now) always has its own completion deferred to the next flush
//! pass (`crate::deferred`), and the receiving side is always the one
//! considered "pulled" when both a waiting sender and an active receiver
//! meet. That keeps a receiver's continuation scheduled strictly before
//! the sender's in every rendezvous, matching the ordering a reader of
//! two concurrent tasks would expect ("whoever was waiting to receive
//! goes first").

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::{SendError, TryRecvError, TrySendError};
use crate::select::{SelectShared, SelectWaiter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

fn next_channel_id() -> ChannelId {
    thread_local! {
        static NEXT: Cell<u64> = const { Cell::new(0) };
    }
    NEXT.with(|n| {
        let id = n.get();
        n.set(id + 1);
        ChannelId(id)
    })
}

enum SendOutcome<T> {
    Sent,
    Closed(T),
}

struct SendSlot<T> {
    value: RefCell<Option<T>>,
    cancelled: Cell<bool>,
    notify: SendNotify<T>,
}

enum SendNotify<T> {
    Future {
        waker: RefCell<Waker>,
        outcome: RefCell<Option<SendOutcome<T>>>,
    },
    Select {
        idx: usize,
        waiter: Rc<SelectWaiter>,
        shared: Rc<SelectShared<T>>,
    },
}

impl<T> SendSlot<T> {
    fn is_live(&self) -> bool {
        if self.cancelled.get() {
            return false;
        }
        match &self.notify {
            SendNotify::Future { .. } => true,
            SendNotify::Select { waiter, .. } => !waiter.is_completed(),
        }
    }

    /// Finalize this slot's outcome. Always invoked through
    /// `crate::deferred::defer` so the sender resumes only after the
    /// current dispatch step has given the other side a full turn.
    fn resolve(self: Rc<Self>, outcome: SendOutcome<T>) {
        match &self.notify {
            SendNotify::Future { waker, outcome: slot } => {
                *slot.borrow_mut() = Some(outcome);
                waker.borrow().wake_by_ref();
            }
            SendNotify::Select { idx, waiter, shared } => {
                if !waiter.claim() {
                    return;
                }
                let ok = matches!(outcome, SendOutcome::Sent);
                *shared.outcome.borrow_mut() = Some(crate::select::SelectOutcome {
                    case_index: Some(*idx),
                    value: None,
                    ok,
                });
                if let Some(w) = shared.waker.borrow_mut().take() {
                    w.wake();
                }
            }
        }
    }
}

struct RecvSlot<T> {
    cancelled: Cell<bool>,
    notify: RecvNotify<T>,
}

enum RecvNotify<T> {
    Future {
        waker: RefCell<Waker>,
        result: RefCell<Option<(Option<T>, bool)>>,
    },
    Select {
        idx: usize,
        waiter: Rc<SelectWaiter>,
        shared: Rc<SelectShared<T>>,
    },
}

impl<T> RecvSlot<T> {
    fn is_live(&self) -> bool {
        if self.cancelled.get() {
            return false;
        }
        match &self.notify {
            RecvNotify::Future { .. } => true,
            RecvNotify::Select { waiter, .. } => !waiter.is_completed(),
        }
    }

    /// Finalize this slot's outcome synchronously — a receiver pulled off
    /// the wait queue always runs eagerly, never deferred.
    fn resolve(self: Rc<Self>, value: Option<T>, ok: bool) {
        match &self.notify {
            RecvNotify::Future { waker, result } => {
                *result.borrow_mut() = Some((value, ok));
                waker.borrow().wake_by_ref();
            }
            RecvNotify::Select { idx, waiter, shared } => {
                if !waiter.claim() {
                    return;
                }
                *shared.outcome.borrow_mut() = Some(crate::select::SelectOutcome {
                    case_index: Some(*idx),
                    value,
                    ok,
                });
                if let Some(w) = shared.waker.borrow_mut().take() {
                    w.wake();
                }
            }
        }
    }
}

struct ChannelInner<T> {
    id: ChannelId,
    capacity: usize,
    buffer: RefCell<VecDeque<T>>,
    closed: Cell<bool>,
    senders: RefCell<VecDeque<Rc<SendSlot<T>>>>,
    receivers: RefCell<VecDeque<Rc<RecvSlot<T>>>>,
}

impl<T> ChannelInner<T> {
    fn pop_live_receiver(&self) -> Option<Rc<RecvSlot<T>>> {
        let mut q = self.receivers.borrow_mut();
        while let Some(slot) = q.pop_front() {
            if slot.is_live() {
                return Some(slot);
            }
        }
        None
    }

    fn pop_live_sender(&self) -> Option<Rc<SendSlot<T>>> {
        let mut q = self.senders.borrow_mut();
        while let Some(slot) = q.pop_front() {
            if slot.is_live() {
                return Some(slot);
            }
        }
        None
    }

    /// After a value leaves the buffer, pull the next live waiting sender
    /// (if any) into the freed slot, deferring that sender's completion.
    fn pull_sender_into_buffer(&self) {
        if self.buffer.borrow().len() >= self.capacity.max(1) {
            return;
        }
        if let Some(slot) = self.pop_live_sender() {
            let value = slot.value.borrow_mut().take().expect("live sender slot has a value");
            self.buffer.borrow_mut().push_back(value);
            crate::deferred::defer(move || slot.resolve(SendOutcome::Sent));
        }
    }
}

/// A clonable handle onto a channel of `T`. Every clone shares the same
/// buffer and wait queues; there is no separate sender/receiver type.
pub struct Channel<T> {
    inner: Rc<ChannelInner<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Channel<T> {
    /// Create a channel with the given buffer capacity. `capacity == 0`
    /// is a rendezvous channel: every send waits for a matching receiver.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Rc::new(ChannelInner {
                id: next_channel_id(),
                capacity,
                buffer: RefCell::new(VecDeque::new()),
                closed: Cell::new(false),
                senders: RefCell::new(VecDeque::new()),
                receivers: RefCell::new(VecDeque::new()),
            }),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.inner.id
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    pub fn len(&self) -> usize {
        self.inner.buffer.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the channel: wakes every waiting receiver with `(None,
    /// false)` and fails every waiting sender with `SendError::Closed`.
    /// Buffered values already enqueued are still deliverable afterward.
    pub fn close(&self) {
        if self.inner.closed.replace(true) {
            return;
        }
        let receivers: Vec<_> = self.inner.receivers.borrow_mut().drain(..).collect();
        for slot in receivers {
            if slot.is_live() {
                slot.resolve(None, false);
            }
        }
        let senders: Vec<_> = self.inner.senders.borrow_mut().drain(..).collect();
        for slot in senders {
            if slot.is_live() {
                let value = slot.value.borrow_mut().take().expect("live sender slot has a value");
                crate::deferred::defer(move || slot.resolve(SendOutcome::Closed(value)));
            }
        }
    }

    /// True if a `recv` right now would resolve without suspending.
    pub(crate) fn recv_ready(&self) -> bool {
        !self.inner.buffer.borrow().is_empty()
            || self.inner.closed.get()
            || self.inner.senders.borrow().iter().any(|s| s.is_live())
    }

    /// True if a `send` right now would resolve without suspending
    /// (including the "closed, fails immediately" case).
    pub(crate) fn send_ready(&self) -> bool {
        self.inner.closed.get()
            || self.inner.receivers.borrow().iter().any(|r| r.is_live())
            || self.inner.buffer.borrow().len() < self.inner.capacity
    }

    /// Resolve a recv that `recv_ready` already reported as immediate.
    /// Used by `select`'s fast path; always eager, never deferred.
    pub(crate) fn recv_now(&self) -> (Option<T>, bool) {
        if let Some(v) = self.inner.buffer.borrow_mut().pop_front() {
            self.inner.pull_sender_into_buffer();
            return (Some(v), true);
        }
        if let Some(slot) = self.inner.pop_live_sender() {
            let value = slot.value.borrow_mut().take().expect("live sender slot has a value");
            crate::deferred::defer(move || slot.resolve(SendOutcome::Sent));
            return (Some(value), true);
        }
        debug_assert!(self.inner.closed.get());
        (None, false)
    }

    /// Resolve a send that `send_ready` already reported as immediate.
    /// `Some(ok)` means resolution was synchronous (buffered, or failed
    /// because the channel is closed); `None` means the value was handed
    /// directly to a waiting receiver and the sender's own completion has
    /// been deferred — the caller must suspend once more to observe it.
    pub(crate) fn send_now_or_defer(&self, value: T) -> Option<bool> {
        if self.inner.closed.get() {
            drop(value);
            return Some(false);
        }
        if let Some(recv_slot) = self.inner.pop_live_receiver() {
            recv_slot.resolve(Some(value), true);
            return None;
        }
        if self.inner.buffer.borrow().len() < self.inner.capacity {
            self.inner.buffer.borrow_mut().push_back(value);
            return Some(true);
        }
        None
    }

    /// Register a shadow waiter for a `select` recv case that wasn't
    /// immediately ready.
    pub(crate) fn register_select_recv(
        &self,
        idx: usize,
        waiter: Rc<SelectWaiter>,
        shared: Rc<SelectShared<T>>,
    ) {
        self.inner.receivers.borrow_mut().push_back(Rc::new(RecvSlot {
            cancelled: Cell::new(false),
            notify: RecvNotify::Select { idx, waiter, shared },
        }));
    }

    /// Register a shadow waiter for a `select` send case that wasn't
    /// immediately ready.
    pub(crate) fn register_select_send(
        &self,
        idx: usize,
        value: T,
        waiter: Rc<SelectWaiter>,
        shared: Rc<SelectShared<T>>,
    ) {
        self.inner.senders.borrow_mut().push_back(Rc::new(SendSlot {
            value: RefCell::new(Some(value)),
            cancelled: Cell::new(false),
            notify: SendNotify::Select { idx, waiter, shared },
        }));
    }

    /// A `select` send case resolved on the fast path by handing off
    /// directly to a waiting receiver, and needs its own deferred
    /// completion armed (mirrors the plain `SendFuture` path).
    pub(crate) fn arm_deferred_send_case(&self, idx: usize, shared: Rc<SelectShared<T>>) {
        // The handoff already happened in `send_now_or_defer` before this
        // is called; we only need the completion to show up on the next
        // flush so the select future wakes with case `idx` marked sent.
        let shared2 = shared.clone();
        crate::deferred::defer(move || {
            *shared2.outcome.borrow_mut() = Some(crate::select::SelectOutcome {
                case_index: Some(idx),
                value: None,
                ok: true,
            });
            if let Some(w) = shared2.waker.borrow_mut().take() {
                w.wake();
            }
        });
    }

    /// Non-blocking attempt. Never suspends: fails with `Full` rather
    /// than registering a waiter when nothing can be done right now.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        if self.inner.closed.get() {
            return Err(TrySendError::Closed(value));
        }
        if let Some(recv_slot) = self.inner.pop_live_receiver() {
            recv_slot.resolve(Some(value), true);
            return Ok(());
        }
        if self.inner.buffer.borrow().len() < self.inner.capacity {
            self.inner.buffer.borrow_mut().push_back(value);
            return Ok(());
        }
        Err(TrySendError::Full(value))
    }

    /// Non-blocking attempt. Never suspends.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        if let Some(v) = self.inner.buffer.borrow_mut().pop_front() {
            self.inner.pull_sender_into_buffer();
            return Ok(v);
        }
        if let Some(slot) = self.inner.pop_live_sender() {
            let value = slot.value.borrow_mut().take().expect("live sender slot has a value");
            crate::deferred::defer(move || slot.resolve(SendOutcome::Sent));
            return Ok(value);
        }
        if self.inner.closed.get() {
            return Err(TryRecvError::Closed);
        }
        Err(TryRecvError::Empty)
    }

    /// Suspending send. Resolves to `Ok(())` once the value is delivered
    /// (buffered or handed to a receiver), or `Err` if the channel is or
    /// becomes closed first.
    pub fn send(&self, value: T) -> SendFuture<T> {
        SendFuture {
            channel: self.clone(),
            state: SendState::Init(Some(value)),
        }
    }

    /// Suspending receive. Resolves to `(Some(value), true)` on success,
    /// `(None, false)` once the channel is closed and drained.
    pub fn recv(&self) -> RecvFuture<T> {
        RecvFuture {
            channel: self.clone(),
            state: RecvState::Init,
        }
    }

    /// An async iterator over received values, ending when the channel
    /// closes and drains. Not `std::iter::Iterator` — that trait's `next`
    /// is synchronous and can't suspend back to the scheduler between
    /// elements; `ChannelIter::next` is an `async fn` instead (see
    /// DESIGN.md).
    pub fn iter(&self) -> ChannelIter<T> {
        ChannelIter { channel: self.clone() }
    }
}

enum SendState<T> {
    Init(Option<T>),
    Waiting(Rc<SendSlot<T>>),
    Done,
}

/// Future returned by [`Channel::send`].
pub struct SendFuture<T> {
    channel: Channel<T>,
    state: SendState<T>,
}

impl<T> Future for SendFuture<T> {
    type Output = Result<(), SendError<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            match std::mem::replace(&mut this.state, SendState::Done) {
                SendState::Init(value) => {
                    let value = value.expect("SendFuture::Init always holds a value");
                    let inner = &this.channel.inner;
                    if inner.closed.get() {
                        return Poll::Ready(Err(SendError::Closed(value)));
                    }
                    if let Some(recv_slot) = inner.pop_live_receiver() {
                        recv_slot.resolve(Some(value), true);
                        let slot = Rc::new(SendSlot {
                            value: RefCell::new(None),
                            cancelled: Cell::new(false),
                            notify: SendNotify::Future {
                                waker: RefCell::new(cx.waker().clone()),
                                outcome: RefCell::new(None),
                            },
                        });
                        let slot2 = slot.clone();
                        crate::deferred::defer(move || slot2.resolve(SendOutcome::Sent));
                        this.state = SendState::Waiting(slot);
                        return Poll::Pending;
                    }
                    if inner.buffer.borrow().len() < inner.capacity {
                        inner.buffer.borrow_mut().push_back(value);
                        return Poll::Ready(Ok(()));
                    }
                    let slot = Rc::new(SendSlot {
                        value: RefCell::new(Some(value)),
                        cancelled: Cell::new(false),
                        notify: SendNotify::Future {
                            waker: RefCell::new(cx.waker().clone()),
                            outcome: RefCell::new(None),
                        },
                    });
                    inner.senders.borrow_mut().push_back(slot.clone());
                    this.state = SendState::Waiting(slot);
                    return Poll::Pending;
                }
                SendState::Waiting(slot) => {
                    let outcome = match &slot.notify {
                        SendNotify::Future { outcome, waker } => {
                            let out = outcome.borrow_mut().take();
                            if out.is_none() {
                                *waker.borrow_mut() = cx.waker().clone();
                            }
                            out
                        }
                        SendNotify::Select { .. } => unreachable!("SendFuture never uses Select notify"),
                    };
                    match outcome {
                        Some(SendOutcome::Sent) => return Poll::Ready(Ok(())),
                        Some(SendOutcome::Closed(v)) => return Poll::Ready(Err(SendError::Closed(v))),
                        None => {
                            this.state = SendState::Waiting(slot);
                            return Poll::Pending;
                        }
                    }
                }
                SendState::Done => panic!("SendFuture polled after completion"),
            }
        }
    }
}

impl<T> Drop for SendFuture<T> {
    fn drop(&mut self) {
        if let SendState::Waiting(slot) = &self.state {
            slot.cancelled.set(true);
        }
    }
}

enum RecvState<T> {
    Init,
    Waiting(Rc<RecvSlot<T>>),
    Done,
}

/// Future returned by [`Channel::recv`].
pub struct RecvFuture<T> {
    channel: Channel<T>,
    state: RecvState<T>,
}

impl<T> Future for RecvFuture<T> {
    type Output = (Option<T>, bool);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match std::mem::replace(&mut this.state, RecvState::Done) {
            RecvState::Init => {
                let inner = &this.channel.inner;
                if let Some(v) = inner.buffer.borrow_mut().pop_front() {
                    inner.pull_sender_into_buffer();
                    return Poll::Ready((Some(v), true));
                }
                if let Some(slot) = inner.pop_live_sender() {
                    let value = slot.value.borrow_mut().take().expect("live sender slot has a value");
                    crate::deferred::defer(move || slot.resolve(SendOutcome::Sent));
                    return Poll::Ready((Some(value), true));
                }
                if inner.closed.get() {
                    return Poll::Ready((None, false));
                }
                let slot = Rc::new(RecvSlot {
                    cancelled: Cell::new(false),
                    notify: RecvNotify::Future {
                        waker: RefCell::new(cx.waker().clone()),
                        result: RefCell::new(None),
                    },
                });
                inner.receivers.borrow_mut().push_back(slot.clone());
                this.state = RecvState::Waiting(slot);
                Poll::Pending
            }
            RecvState::Waiting(slot) => {
                let result = match &slot.notify {
                    RecvNotify::Future { result, waker } => {
                        let out = result.borrow_mut().take();
                        if out.is_none() {
                            *waker.borrow_mut() = cx.waker().clone();
                        }
                        out
                    }
                    RecvNotify::Select { .. } => unreachable!("RecvFuture never uses Select notify"),
                };
                match result {
                    Some((value, ok)) => Poll::Ready((value, ok)),
                    None => {
                        this.state = RecvState::Waiting(slot);
                        Poll::Pending
                    }
                }
            }
            RecvState::Done => panic!("RecvFuture polled after completion"),
        }
    }
}

impl<T> Drop for RecvFuture<T> {
    fn drop(&mut self) {
        if let RecvState::Waiting(slot) = &self.state {
            slot.cancelled.set(true);
        }
    }
}

/// Async iterator returned by [`Channel::iter`].
pub struct ChannelIter<T> {
    channel: Channel<T>,
}

impl<T> ChannelIter<T> {
    pub async fn next(&mut self) -> Option<T> {
        let (value, ok) = self.channel.recv().await;
        if ok {
            value
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{Priority, Scheduler};

    #[test]
    fn buffered_send_then_recv_same_task() {
        let sched = Scheduler::new();
        let result = Rc::new(RefCell::new(None));
        let r = result.clone();
        sched.spawn(
            async move {
                let ch = Channel::new(2);
                ch.send(1).await.unwrap();
                ch.send(2).await.unwrap();
                let a = ch.recv().await;
                let b = ch.recv().await;
                *r.borrow_mut() = Some((a, b));
            },
            Priority::Normal,
        );
        sched.run().unwrap();
        assert_eq!(
            *result.borrow(),
            Some(((Some(1), true), (Some(2), true)))
        );
    }

    #[test]
    fn rendezvous_receiver_runs_before_sender_continuation() {
        let sched = Scheduler::new();
        let trace = Rc::new(RefCell::new(Vec::new()));
        let ch = Channel::new(0);

        let t1 = trace.clone();
        let ch1 = ch.clone();
        sched.spawn(
            async move {
                ch1.send(1).await.unwrap();
                t1.borrow_mut().push("sender-after-send");
            },
            Priority::Normal,
        );
        let t2 = trace.clone();
        let ch2 = ch.clone();
        sched.spawn(
            async move {
                let (_v, _ok) = ch2.recv().await;
                t2.borrow_mut().push("receiver-after-recv");
            },
            Priority::Normal,
        );
        sched.run().unwrap();
        assert_eq!(
            *trace.borrow(),
            vec!["receiver-after-recv", "sender-after-send"]
        );
    }

    #[test]
    fn closing_wakes_waiting_receiver_with_false() {
        let sched = Scheduler::new();
        let result = Rc::new(RefCell::new(None));
        let r = result.clone();
        let ch: Channel<i32> = Channel::new(0);
        let ch2 = ch.clone();
        sched.spawn(
            async move {
                *r.borrow_mut() = Some(ch2.recv().await);
            },
            Priority::Normal,
        );
        sched.spawn(
            async move {
                ch.close();
            },
            Priority::Normal,
        );
        sched.run().unwrap();
        assert_eq!(*result.borrow(), Some((None, false)));
    }

    #[test]
    fn try_recv_empty_returns_empty_error() {
        let ch: Channel<i32> = Channel::new(1);
        assert!(matches!(ch.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn try_send_on_closed_channel_errors() {
        let ch: Channel<i32> = Channel::new(1);
        ch.close();
        assert!(matches!(ch.try_send(5), Err(TrySendError::Closed(5))));
    }
}

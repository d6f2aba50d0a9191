// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Error taxonomy for the deterministic scheduler, channels, and select.
//!
//! Every variant names a condition, not a wrapped type. A receive on a
//! closed, drained channel is deliberately not an error here — it's a
//! signalled `(value, false)` return instead.

use thiserror::Error;

/// Scheduler- and select-level failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// `sleep`/`yield_now`/a channel op/`select` was used outside a running task.
    #[error("called outside a running task")]
    InvalidContext,

    /// `Scheduler::run` was invoked while already running.
    #[error("scheduler is already running")]
    AlreadyRunning,

    /// `select` was given an empty case list.
    #[error("select requires at least one case")]
    InvalidArgument,

    /// The owning task was cancelled while suspended in this operation.
    #[error("task was cancelled")]
    Cancelled,
}

/// Error returned by `Channel::send`.
///
/// Carries the rejected value back to the caller the way `std::sync::mpsc`
/// does, since a failed send must not silently drop the payload.
#[derive(Debug, Clone, Error)]
pub enum SendError<T> {
    /// The channel was already closed; `v` was never enqueued.
    #[error("send on closed channel")]
    Closed(T),
}

impl<T> SendError<T> {
    /// Recover the value that failed to send.
    pub fn into_inner(self) -> T {
        match self {
            SendError::Closed(v) => v,
        }
    }
}

/// Error returned by `Channel::try_send`.
#[derive(Debug, Clone, Error)]
pub enum TrySendError<T> {
    /// No buffer slot and no waiting receiver right now; would block.
    #[error("channel full")]
    Full(T),
    /// The channel is closed; `v` was never enqueued.
    #[error("send on closed channel")]
    Closed(T),
}

impl<T> TrySendError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(v) | TrySendError::Closed(v) => v,
        }
    }
}

/// Error returned by `Channel::try_recv`.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TryRecvError {
    /// No value buffered and no waiting sender right now.
    #[error("channel empty")]
    Empty,
    /// The channel is closed and drained.
    #[error("channel closed")]
    Closed,
}

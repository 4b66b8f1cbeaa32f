//! One-shot completions.
//!
//! A completion pair is created per asynchronous call. The [`Completer`] is
//! consumed when it sets the value, so a completion is resolved at most once
//! by construction.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// The completer was dropped before setting a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("completion canceled before a value was set")]
pub struct Canceled;

/// Create a linked completer/completion pair.
pub fn completion<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Completer { tx },
        Completion {
            inner: Inner::Waiting(rx),
        },
    )
}

/// Sending half of a completion.
#[derive(Debug)]
pub struct Completer<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Completer<T> {
    /// Resolve the completion.
    ///
    /// Hands the value back if the waiting side is already gone.
    pub fn complete(self, value: T) -> Result<(), T> {
        self.tx.send(value)
    }

    /// True once the waiting side has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Waiting half of a completion. Resolves to the completed value, or to
/// [`Canceled`] if the completer is dropped first.
#[derive(Debug)]
pub struct Completion<T> {
    inner: Inner<T>,
}

#[derive(Debug)]
enum Inner<T> {
    Ready(Option<T>),
    Waiting(oneshot::Receiver<T>),
}

impl<T> Completion<T> {
    /// A completion that is already resolved.
    pub fn ready(value: T) -> Self {
        Self {
            inner: Inner::Ready(Some(value)),
        }
    }
}

// The value is only ever moved out, never pinned.
impl<T> Unpin for Completion<T> {}

impl<T> Future for Completion<T> {
    type Output = Result<T, Canceled>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            Inner::Ready(value) => Poll::Ready(value.take().ok_or(Canceled)),
            Inner::Waiting(rx) => Pin::new(rx).poll(cx).map(|res| res.map_err(|_| Canceled)),
        }
    }
}

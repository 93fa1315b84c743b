//! Completion notifications for responses.
//!
//! Every request handed to a handler carries a [`ResponseCompletion`] in its
//! extensions. It resolves once the connection has flushed the response for
//! that request, or failed to.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::Shared;
use thiserror::Error;

/// The response for a request never reached the peer in full.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("response not delivered: {reason}")]
pub struct ResponseAborted {
    reason: String,
}

impl ResponseAborted {
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Resolves when the response to the owning request has been written and flushed.
///
/// Cloning yields another handle on the same outcome.
#[derive(Clone)]
pub struct ResponseCompletion {
    inner: Shared<oneshot::Receiver<Result<(), ResponseAborted>>>,
}

impl fmt::Debug for ResponseCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCompletion").field("resolved", &self.inner.peek().is_some()).finish()
    }
}

impl Future for ResponseCompletion {
    type Output = Result<(), ResponseAborted>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx).map(|outcome| match outcome {
            Ok(outcome) => outcome,
            Err(_canceled) => {
                Err(ResponseAborted { reason: "connection dropped the request before responding".to_owned() })
            }
        })
    }
}

/// The connection side of a [`ResponseCompletion`].
#[derive(Debug)]
pub(crate) struct CompletionNotifier {
    sender: oneshot::Sender<Result<(), ResponseAborted>>,
}

impl CompletionNotifier {
    pub(crate) fn succeed(self) {
        // the receiving side may be gone already, nobody is waiting then
        let _ = self.sender.send(Ok(()));
    }

    pub(crate) fn fail<S: ToString>(self, reason: S) {
        let _ = self.sender.send(Err(ResponseAborted { reason: reason.to_string() }));
    }
}

pub(crate) fn completion_channel() -> (CompletionNotifier, ResponseCompletion) {
    let (sender, receiver) = oneshot::channel();
    (CompletionNotifier { sender }, ResponseCompletion { inner: receiver.shared() })
}

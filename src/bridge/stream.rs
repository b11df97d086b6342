use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::oneshot;

use super::{BridgeFault, Subscription, observer::ChannelObserver};

type Start<T> = Box<dyn FnOnce(ChannelObserver<T>) -> Subscription + Send>;

enum State<T> {
    Idle(Start<T>),
    Waiting {
        receiver: oneshot::Receiver<Result<T, BridgeFault>>,
        _guard: CancelOnDrop,
    },
    Done,
}

/// Cancels the subscription unless it already finished.
struct CancelOnDrop(Subscription);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// The [`Stream`] form of a [`Bridge`](super::Bridge).
///
/// Subscribes on first poll, yields exactly one item and then ends.
/// Dropping it while the call is in flight cancels the call.
#[must_use = "streams do nothing unless polled"]
pub struct BridgeStream<T> {
    state: State<T>,
}

impl<T> BridgeStream<T> {
    pub(super) fn new<F>(start: F) -> Self
    where
        F: FnOnce(ChannelObserver<T>) -> Subscription + Send + 'static,
    {
        Self {
            state: State::Idle(Box::new(start)),
        }
    }
}

impl<T: Send + 'static> Stream for BridgeStream<T> {
    type Item = Result<T, BridgeFault>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match std::mem::replace(&mut this.state, State::Done) {
                State::Idle(start) => {
                    let (sender, receiver) = oneshot::channel();
                    let subscription = start(ChannelObserver::new(sender));
                    this.state = State::Waiting {
                        receiver,
                        _guard: CancelOnDrop(subscription),
                    };
                }
                State::Waiting {
                    mut receiver,
                    _guard,
                } => {
                    return match Pin::new(&mut receiver).poll(cx) {
                        Poll::Pending => {
                            this.state = State::Waiting { receiver, _guard };
                            Poll::Pending
                        }
                        Poll::Ready(Ok(event)) => Poll::Ready(Some(event)),
                        Poll::Ready(Err(_)) => {
                            Poll::Ready(Some(Err(BridgeFault::MissingTerminalEvent)))
                        }
                    };
                }
                State::Done => return Poll::Ready(None),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.state {
            State::Idle(_) | State::Waiting { .. } => (1, Some(1)),
            State::Done => (0, Some(0)),
        }
    }
}

impl<T> std::fmt::Debug for BridgeStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Idle(_) => "idle",
            State::Waiting { .. } => "waiting",
            State::Done => "done",
        };
        f.debug_struct("BridgeStream").field("state", &state).finish()
    }
}

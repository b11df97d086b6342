use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{oneshot, watch};

use super::BridgeFault;

/// Receives the events of one subscription.
///
/// A subscription delivers either `on_next` followed by `on_complete`, or a
/// single `on_error`, or nothing at all if it was cancelled first. Events
/// may arrive on any thread.
pub trait Observer<T>: Send + 'static {
    /// The item produced by the call.
    fn on_next(&mut self, item: T);

    /// The stream itself failed. Request failures never arrive here.
    fn on_error(&mut self, fault: BridgeFault);

    /// The stream finished after delivering its item.
    fn on_complete(&mut self);
}

/// An observer assembled from three closures.
///
/// Built by [`Bridge::subscribe_with`](super::Bridge::subscribe_with).
pub struct FnObserver<N, E, C> {
    on_next: N,
    on_error: E,
    on_complete: C,
}

impl<N, E, C> FnObserver<N, E, C> {
    /// Creates an observer from its callbacks.
    pub fn new(on_next: N, on_error: E, on_complete: C) -> Self {
        Self {
            on_next,
            on_error,
            on_complete,
        }
    }
}

impl<T, N, E, C> Observer<T> for FnObserver<N, E, C>
where
    N: FnMut(T) + Send + 'static,
    E: FnMut(BridgeFault) + Send + 'static,
    C: FnMut() + Send + 'static,
{
    fn on_next(&mut self, item: T) {
        (self.on_next)(item);
    }

    fn on_error(&mut self, fault: BridgeFault) {
        (self.on_error)(fault);
    }

    fn on_complete(&mut self) {
        (self.on_complete)();
    }
}

/// Forwards the terminal event into a oneshot channel.
pub(super) struct ChannelObserver<T> {
    sender: Option<oneshot::Sender<Result<T, BridgeFault>>>,
}

impl<T> ChannelObserver<T> {
    pub(super) fn new(sender: oneshot::Sender<Result<T, BridgeFault>>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    fn send(&mut self, event: Result<T, BridgeFault>) {
        if let Some(sender) = self.sender.take() {
            // The receiver is gone only if the awaiting side was dropped.
            let _ = sender.send(event);
        }
    }
}

impl<T: Send + 'static> Observer<T> for ChannelObserver<T> {
    fn on_next(&mut self, item: T) {
        self.send(Ok(item));
    }

    fn on_error(&mut self, fault: BridgeFault) {
        self.send(Err(fault));
    }

    fn on_complete(&mut self) {
        self.sender = None;
    }
}

/// One event seen by a [`Recorder`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event<T> {
    /// An item was delivered.
    Next(T),
    /// The stream failed.
    Error(BridgeFault),
    /// The stream completed.
    Complete,
}

/// An observer that records every event it receives.
///
/// Clones share the same record, so one clone can be subscribed while
/// another inspects the events. [`terminated`](Recorder::terminated) waits
/// for the terminal event.
#[derive(Debug)]
pub struct Recorder<T> {
    events: Arc<Mutex<Vec<Event<T>>>>,
    terminated: Arc<watch::Sender<bool>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
            terminated: Arc::clone(&self.terminated),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Recorder<T> {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        let (terminated, _) = watch::channel(false);
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            terminated: Arc::new(terminated),
        }
    }

    fn push(&self, event: Event<T>, terminal: bool) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        if terminal {
            self.terminated.send_replace(true);
        }
    }

    /// Waits until a completion or an error has been recorded.
    pub async fn terminated(&self) {
        let mut receiver = self.terminated.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = receiver.wait_for(|terminated| *terminated).await;
    }

    /// Returns whether a completion or an error has been recorded.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        *self.terminated.borrow()
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of stream errors recorded.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| matches!(event, Event::Error(_)))
            .count()
    }

    /// Returns whether a completion has been recorded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|event| matches!(event, Event::Complete))
    }

    /// Removes and returns the recorded items, in delivery order.
    pub fn take_values(&self) -> Vec<T> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = Vec::new();
        let mut kept = Vec::new();
        for event in events.drain(..) {
            match event {
                Event::Next(value) => values.push(value),
                other => kept.push(other),
            }
        }
        *events = kept;
        values
    }
}

impl<T> Recorder<T> {
    /// Returns the recorded stream errors, in delivery order.
    #[must_use]
    pub fn faults(&self) -> Vec<BridgeFault> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|event| match event {
                Event::Error(fault) => Some(fault.clone()),
                Event::Next(_) | Event::Complete => None,
            })
            .collect()
    }
}

impl<T: Clone> Recorder<T> {
    /// Returns a copy of every recorded event.
    #[must_use]
    pub fn events(&self) -> Vec<Event<T>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T: Send + 'static> Observer<T> for Recorder<T> {
    fn on_next(&mut self, item: T) {
        self.push(Event::Next(item), false);
    }

    fn on_error(&mut self, fault: BridgeFault) {
        self.push(Event::Error(fault), true);
    }

    fn on_complete(&mut self) {
        self.push(Event::Complete, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recorder_shares_events_across_clones() {
        let recorder = Recorder::new();
        let mut observer = recorder.clone();

        let waiter = tokio::spawn({
            let recorder = recorder.clone();
            async move { recorder.terminated().await }
        });

        observer.on_next(1);
        assert!(!recorder.is_terminated());
        observer.on_complete();

        waiter.await.unwrap();
        assert_eq!(recorder.events(), vec![Event::Next(1), Event::Complete]);
        assert_eq!(recorder.error_count(), 0);
        assert_eq!(recorder.take_values(), vec![1]);
        assert_eq!(recorder.events(), vec![Event::Complete]);
    }

    #[test]
    fn test_recorder_error_terminates() {
        let recorder = Recorder::<u8>::new();
        let mut observer = recorder.clone();
        observer.on_error(BridgeFault::CompletionDropped);

        assert!(recorder.is_terminated());
        assert!(!recorder.is_complete());
        assert_eq!(recorder.error_count(), 1);
    }

    #[test]
    fn test_fn_observer_forwards() {
        let recorder = Recorder::new();
        let (mut next, mut complete) = (recorder.clone(), recorder.clone());
        let mut observer = FnObserver::new(
            move |item: &'static str| next.on_next(item),
            |_fault: BridgeFault| {},
            move || complete.on_complete(),
        );

        observer.on_next("ok");
        observer.on_complete();
        assert_eq!(recorder.events(), vec![Event::Next("ok"), Event::Complete]);
    }
}

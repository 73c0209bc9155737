//! In-process change notification.
//!
//! A [`Signal`] fans a value out to every live subscriber. Subscribers hold a
//! flume receiver and drain it on their own schedule; dropped receivers are
//! pruned on the next emit.

use flume::{Receiver, Sender, TryRecvError};

pub struct Signal<T: Clone> {
    subscribers: Vec<Sender<T>>,
}

impl<T: Clone> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Signal<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Subscription<T> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.push(tx);
        Subscription { rx }
    }

    pub fn emit(&mut self, value: T) {
        self.subscribers
            .retain(|tx| tx.send(value.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

pub struct Subscription<T> {
    rx: Receiver<T>,
}

impl<T> Subscription<T> {
    /// Drains pending notifications and returns the newest one.
    pub fn latest(&self) -> Option<T> {
        let mut last = None;
        loop {
            match self.rx.try_recv() {
                Ok(value) => last = Some(value),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        last
    }

    pub fn has_pending(&self) -> bool {
        !self.rx.is_empty()
    }
}

/// Emitted after the page surface has been swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentUpdated {
    pub generation: u64,
}

/// Emitted after every note add or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotesUpdated {
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_the_latest_value() {
        let mut signal = Signal::new();
        let a = signal.subscribe();
        let b = signal.subscribe();

        signal.emit(ContentUpdated { generation: 1 });
        signal.emit(ContentUpdated { generation: 2 });

        assert_eq!(a.latest(), Some(ContentUpdated { generation: 2 }));
        assert_eq!(b.latest(), Some(ContentUpdated { generation: 2 }));
        assert_eq!(a.latest(), None);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut signal = Signal::new();
        let keep = signal.subscribe();
        drop(signal.subscribe());

        signal.emit(NotesUpdated { count: 3 });
        assert_eq!(signal.subscriber_count(), 1);
        assert!(keep.has_pending());
    }
}

//! Replay-latest value channel.
//!
//! A subscriber first receives the value current at subscription time, then
//! every value published afterwards, in order. A subscriber that falls more
//! than `CAPACITY` values behind skips ahead to the newest ones.

use std::sync::Mutex;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

const CAPACITY: usize = 64;

/// Holds the latest value and fans out every update to subscribers.
#[derive(Debug)]
pub struct Observable<T> {
    current: Mutex<T>,
    tx: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        Self {
            current: Mutex::new(initial),
            tx,
        }
    }

    /// Snapshot of the latest value.
    pub fn get(&self) -> T {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn publish(&self, value: T) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = value.clone();
        // No receivers is fine: the value is still kept for later subscribers.
        let _ = self.tx.send(value);
    }

    /// Update the value in place and publish the result.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut current);
        let _ = self.tx.send(current.clone());
    }

    pub fn subscribe(&self) -> Subscription<T> {
        // Holding the lock keeps a concurrent publish from landing between the
        // snapshot and the receiver registration.
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        Subscription {
            replay: Some(current.clone()),
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving side of an `Observable`.
#[derive(Debug)]
pub struct Subscription<T> {
    replay: Option<T>,
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// Wait for the next value. Returns `None` once the observable is gone.
    pub async fn next(&mut self) -> Option<T> {
        if let Some(value) = self.replay.take() {
            return Some(value);
        }
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// The next value if one is already available.
    pub fn try_next(&mut self) -> Option<T> {
        if let Some(value) = self.replay.take() {
            return Some(value);
        }
        loop {
            match self.rx.try_recv() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Everything available right now, oldest first.
    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

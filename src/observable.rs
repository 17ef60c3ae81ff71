//! Change notification with coalescing.
//!
//! An [`Observable`] holds a value and a set of listeners that are invoked
//! synchronously, outside the value's lock, every time the value changes.
//! Each change also raises a pending flag. A [`Poller`] inspects the pending
//! flags of many observables at a fixed interval and reports only the ones
//! that changed since the last tick, so a burst of internal updates (many
//! piece writes per second) turns into at most one notification per tick.
//!
//! # Examples
//!
//! ```
//! use bitpiece::observable::{Observable, Poller};
//! use std::sync::Arc;
//!
//! let completed = Arc::new(Observable::new(0u64));
//! completed.subscribe(|old, new| println!("{old} -> {new}"));
//!
//! let poller = Poller::new();
//! poller.watch("completed", completed.clone());
//!
//! completed.update(|v| v + 16384);
//! completed.update(|v| v + 16384);
//! assert_eq!(poller.poll(), vec!["completed"]);
//! assert!(poller.poll().is_empty());
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::ProgressConfig;

type Listener<T> = Arc<dyn Fn(&T, &T) + Send + Sync>;

/// Identifies a listener registered with [`Observable::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A value whose changes are pushed to listeners.
pub struct Observable<T> {
    value: Mutex<T>,
    listeners: RwLock<Vec<(ListenerId, Listener<T>)>>,
    next_id: AtomicU64,
    pending: AtomicBool,
}

impl<T: Clone + PartialEq> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            pending: AtomicBool::new(false),
        }
    }

    /// Returns a copy of the current value.
    pub fn get(&self) -> T {
        self.value.lock().clone()
    }

    pub fn set(&self, value: T) -> T {
        self.update(|_| value)
    }

    /// Atomically replaces the value with `f(current)` and returns the new value.
    ///
    /// Listeners run after the lock is released and only if the value changed.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> T {
        let (old, new) = {
            let mut value = self.value.lock();
            let new = f(&value);
            if new == *value {
                return new;
            }
            let old = std::mem::replace(&mut *value, new.clone());
            (old, new)
        };

        self.pending.store(true, Ordering::Release);

        let listeners: Vec<Listener<T>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(&old, &new);
        }

        new
    }

    /// Registers a listener called with `(old, new)` on every change.
    pub fn subscribe(&self, listener: impl Fn(&T, &T) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.value.lock())
            .field("pending", &self.pending.load(Ordering::Relaxed))
            .finish()
    }
}

/// Anything with a "changed since last asked" flag.
pub trait ChangeSource: Send + Sync {
    /// Returns whether a change happened since the previous call, clearing the flag.
    fn take_pending(&self) -> bool;
}

impl<T: Send> ChangeSource for Observable<T> {
    fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}

/// Coalesces changes from many sources into periodic batches.
pub struct Poller<K> {
    sources: Mutex<Vec<(K, Arc<dyn ChangeSource>)>>,
}

impl<K: Clone + PartialEq + Send + 'static> Poller<K> {
    pub fn new() -> Self {
        Self {
            sources: Mutex::new(Vec::new()),
        }
    }

    /// Starts tracking `source` under `key`.
    pub fn watch(&self, key: K, source: Arc<dyn ChangeSource>) {
        self.sources.lock().push((key, source));
    }

    /// Stops tracking every source registered under `key`.
    pub fn unwatch(&self, key: &K) {
        self.sources.lock().retain(|(k, _)| k != key);
    }

    /// Returns the keys of sources that changed since the previous poll.
    pub fn poll(&self) -> Vec<K> {
        let sources: Vec<(K, Arc<dyn ChangeSource>)> = self.sources.lock().clone();
        sources
            .into_iter()
            .filter(|(_, source)| source.take_pending())
            .map(|(key, _)| key)
            .collect()
    }

    /// Spawns a task that polls every `interval` and hands non-empty batches
    /// to `on_changes`. Abort the returned handle to stop it.
    pub fn spawn<F>(self: Arc<Self>, interval: Duration, on_changes: F) -> JoinHandle<()>
    where
        F: Fn(Vec<K>) + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let changed = self.poll();
                if !changed.is_empty() {
                    tracing::trace!(count = changed.len(), "dispatching coalesced changes");
                    on_changes(changed);
                }
            }
        })
    }

    /// [`spawn`](Self::spawn) with the configured poll interval.
    pub fn spawn_with<F>(self: Arc<Self>, config: &ProgressConfig, on_changes: F) -> JoinHandle<()>
    where
        F: Fn(Vec<K>) + Send + 'static,
    {
        self.spawn(config.poll_interval, on_changes)
    }
}

impl<K: Clone + PartialEq + Send + 'static> Default for Poller<K> {
    fn default() -> Self {
        Self::new()
    }
}

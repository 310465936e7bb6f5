// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Signal/slot plumbing for crossing lock-order boundaries (spec §5,
//! design note in `original_source/src/social/routing_table.h`'s
//! `DeferrableSignal<...>` members: a routing-table method running under
//! its own mutex cannot call directly into the sloppy group or router
//! above it in the lock order, so it posts through the executor instead).
//!
//! [`Signal`] is the plain fan-out primitive: `emit` posts one deferred
//! call per subscriber so none run while the emitter still holds its lock.
//! [`RateLimitedSignal`] additionally coalesces bursts of `notify` calls
//! into a single deferred emission, for high-churn events (route
//! additions during a full table rebuild) where every individual change
//! does not need its own listener invocation.

use crate::time::Executor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Opaque handle returned by [`Signal::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SubscriptionId(u64);

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A multi-subscriber event with deferred dispatch.
pub struct Signal<T> {
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber<T>)>>,
    next_id: AtomicU64,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().unwrap().push((id, Arc::new(f)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().unwrap().retain(|(sid, _)| *sid != id);
    }

    /// Posts one deferred invocation per current subscriber. Safe to call
    /// while holding the emitting component's mutex: subscribers never run
    /// on this stack.
    pub fn emit(&self, executor: &dyn Executor, value: T)
    where
        T: Send + Sync + 'static,
    {
        let value = Arc::new(value);
        let subs: Vec<_> = self.subscribers.lock().unwrap().iter().map(|(_, f)| f.clone()).collect();
        for f in subs {
            let value = value.clone();
            executor.defer(Box::new(move || f(&value)));
        }
    }
}

/// Coalesces bursts of [`RateLimitedSignal::notify`] into at most one
/// emission per `min_interval`, trailing-edge: the first notify in a quiet
/// period arms a timer `min_interval` out; notifies arriving before that
/// timer fires only replace the pending value, and the timer's firing is
/// what actually emits it. Holds the executor itself (rather than taking
/// one per call) since the scheduled callback needs it to perform the
/// eventual `emit`.
pub struct RateLimitedSignal<T> {
    inner: Signal<T>,
    executor: Arc<dyn Executor>,
    min_interval: Duration,
    pending: Mutex<Option<T>>,
}

impl<T: Send + Sync + 'static> RateLimitedSignal<T> {
    pub fn new(executor: Arc<dyn Executor>, min_interval: Duration) -> Self {
        Self {
            inner: Signal::new(),
            executor,
            min_interval,
            pending: Mutex::new(None),
        }
    }

    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.subscribe(f)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.unsubscribe(id)
    }

    /// Records a new `value` to emit and, if no emission is already
    /// scheduled, arms a timer. Later calls before that timer fires replace
    /// the pending value rather than queuing an additional emission.
    pub fn notify(self: &Arc<Self>, value: T) {
        let mut pending = self.pending.lock().unwrap();
        let was_armed = pending.is_some();
        *pending = Some(value);
        drop(pending);
        if was_armed {
            return;
        }
        let this = self.clone();
        let delay = this.min_interval;
        self.executor.schedule(
            delay,
            Box::new(move || {
                let value = this.pending.lock().unwrap().take();
                if let Some(value) = value {
                    this.inner.emit(this.executor.as_ref(), value);
                }
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualExecutor;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emit_reaches_all_subscribers_deferred() {
        let exec = ManualExecutor::new();
        let signal: Signal<u32> = Signal::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c1 = calls.clone();
        let c2 = calls.clone();
        signal.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        signal.subscribe(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        });
        signal.emit(&exec, 42u32);
        assert_eq!(calls.load(Ordering::SeqCst), 0, "must not run synchronously");
        exec.run_deferred();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_future_emissions() {
        let exec = ManualExecutor::new();
        let signal: Signal<u32> = Signal::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c1 = calls.clone();
        let id = signal.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        signal.unsubscribe(id);
        signal.emit(&exec, 1);
        exec.run_deferred();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rate_limited_signal_coalesces_bursts() {
        let exec = Arc::new(ManualExecutor::new());
        let signal = Arc::new(RateLimitedSignal::<u32>::new(exec.clone(), Duration::from_secs(1)));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        signal.subscribe(move |v| seen_clone.lock().unwrap().push(*v));

        signal.notify(1);
        signal.notify(2);
        signal.notify(3);
        exec.advance(Duration::from_secs(2));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![3],
            "only the latest value in the window should be delivered, once"
        );
    }
}

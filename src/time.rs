// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! The executor/timer boundary the core needs from its embedder (spec §5,
//! §6 "External interfaces": scenario-driven test harnesses and cluster
//! orchestration own the real runtime; the core only needs to post
//! deferred closures and schedule cancellable timers).
//!
//! Production code drives this with [`TokioExecutor`]. Tests use
//! [`ManualExecutor`], which runs deferred closures and due timers only
//! when explicitly pumped, so timer-ordering and cancellation races (spec
//! §5: "a cancelled callback that nevertheless fires must be a no-op") are
//! reproducible.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A cancellable timer handle. Cancelling after the callback has already
/// been dispatched is a no-op; a race between `cancel` and dispatch results
/// in the callback observing cancellation and returning without effect.
pub struct TimerHandle {
    id: u64,
    cancelled: Arc<std::sync::atomic::AtomicBool>,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Executor boundary: post a closure to run with no caller-held locks
/// (`defer`), or schedule one to run after a delay (`schedule`).
pub trait Executor: Send + Sync {
    fn defer(&self, f: Box<dyn FnOnce() + Send + 'static>);
    fn schedule(&self, delay: Duration, f: Box<dyn FnOnce() + Send + 'static>) -> TimerHandle;
}

/// Production executor backed by a `tokio` runtime handle.
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
    next_id: AtomicU64,
}

impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(1),
        }
    }
}

impl Executor for TokioExecutor {
    fn defer(&self, f: Box<dyn FnOnce() + Send + 'static>) {
        self.handle.spawn(async move { f() });
    }

    fn schedule(&self, delay: Duration, f: Box<dyn FnOnce() + Send + 'static>) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let cancelled_for_task = cancelled.clone();
        self.handle.spawn(async move {
            tokio::time::delay_for(delay).await;
            if !cancelled_for_task.load(Ordering::SeqCst) {
                f();
            }
        });
        TimerHandle { id, cancelled }
    }
}

/// A deterministic, manually-pumped executor for tests. Deferred closures
/// and due timers queue until [`ManualExecutor::run_deferred`] /
/// [`ManualExecutor::advance`] are called, so tests control interleaving
/// exactly (spec §5's "timers are dispatched in expiration-time order").
#[derive(Default)]
pub struct ManualExecutor {
    inner: Mutex<ManualExecutorInner>,
}

#[derive(Default)]
struct ManualExecutorInner {
    now: Duration,
    deferred: Vec<Box<dyn FnOnce() + Send + 'static>>,
    timers: Vec<ManualTimer>,
    next_id: u64,
}

struct ManualTimer {
    fire_at: Duration,
    cancelled: Arc<std::sync::atomic::AtomicBool>,
    f: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl ManualExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every currently-queued deferred closure, in FIFO order.
    pub fn run_deferred(&self) {
        loop {
            let next = {
                let mut inner = self.inner.lock().unwrap();
                if inner.deferred.is_empty() {
                    None
                } else {
                    Some(inner.deferred.remove(0))
                }
            };
            match next {
                Some(f) => f(),
                None => break,
            }
        }
    }

    /// Advances the fake clock by `delta`, firing any timer whose deadline
    /// falls at or before the new time, in expiration-time order, then
    /// drains deferred work those callbacks may have queued.
    pub fn advance(&self, delta: Duration) {
        let due = {
            let mut inner = self.inner.lock().unwrap();
            inner.now += delta;
            let now = inner.now;
            let mut due_idx: Vec<usize> = inner
                .timers
                .iter()
                .enumerate()
                .filter(|(_, t)| t.fire_at <= now)
                .map(|(i, _)| i)
                .collect();
            due_idx.sort_by_key(|&i| inner.timers[i].fire_at);
            let mut due = Vec::new();
            for i in due_idx.into_iter().rev() {
                due.push(inner.timers.remove(i));
            }
            due.reverse();
            due
        };
        for mut timer in due {
            if !timer.cancelled.load(Ordering::SeqCst) {
                if let Some(f) = timer.f.take() {
                    f();
                }
            }
        }
        self.run_deferred();
    }
}

impl Executor for ManualExecutor {
    fn defer(&self, f: Box<dyn FnOnce() + Send + 'static>) {
        self.inner.lock().unwrap().deferred.push(f);
    }

    fn schedule(&self, delay: Duration, f: Box<dyn FnOnce() + Send + 'static>) -> TimerHandle {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        let cancelled = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let fire_at = inner.now + delay;
        inner.timers.push(ManualTimer {
            fire_at,
            cancelled: cancelled.clone(),
            f: Some(f),
        });
        TimerHandle { id, cancelled }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn cancelled_timer_is_a_no_op() {
        let exec = ManualExecutor::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let handle = exec.schedule(Duration::from_secs(1), Box::new(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));
        handle.cancel();
        exec.advance(Duration::from_secs(2));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn timers_fire_in_expiration_order() {
        let exec = ManualExecutor::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (delay, tag) in [(3u64, "c"), (1, "a"), (2, "b")] {
            let order = order.clone();
            exec.schedule(Duration::from_secs(delay), Box::new(move || {
                order.lock().unwrap().push(tag);
            }));
        }
        exec.advance(Duration::from_secs(5));
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }
}

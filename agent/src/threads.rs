//! Bookkeeping of live threads spawned through the agent.
//!
//! Rust has no runtime-level registry of threads, so this module provides
//! one. Threads started with [`ThreadRegistry::spawn`] are counted from the
//! moment `spawn` returns until their closure finishes (normally or by
//! panicking). Runtimes built with [`ThreadRegistry::tokio_runtime`] count
//! their worker and blocking threads too. Threads started any other way are
//! invisible to the registry.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use tokio::runtime::{Builder, Runtime};

/// Counter of live registered threads. Clones share the same count.
#[derive(Debug, Clone, Default)]
pub struct ThreadRegistry {
    live: Arc<AtomicUsize>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by sources that were not given their own.
    pub fn global() -> &'static ThreadRegistry {
        static GLOBAL: OnceLock<ThreadRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ThreadRegistry::new)
    }

    /// Live registered threads plus one for the main thread.
    pub fn active_count(&self) -> usize {
        self.live.load(Ordering::Acquire) + 1
    }

    /// Count one more live thread until the matching [`leave`](Self::leave).
    pub fn enter(&self) {
        self.live.fetch_add(1, Ordering::AcqRel);
    }

    /// Undo one [`enter`](Self::enter). Unmatched calls are ignored.
    pub fn leave(&self) {
        let _ = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Multi-thread tokio runtime whose threads are counted while they run.
    pub fn tokio_runtime(&self, worker_threads: Option<usize>) -> io::Result<Runtime> {
        let on_start = self.clone();
        let on_stop = self.clone();

        let mut builder = Builder::new_multi_thread();
        builder
            .enable_all()
            .on_thread_start(move || on_start.enter())
            .on_thread_stop(move || on_stop.leave());
        if let Some(n) = worker_threads {
            builder.worker_threads(n);
        }
        builder.build()
    }

    /// Spawn a thread that is counted while it runs.
    pub fn spawn<F, T>(&self, f: F) -> io::Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.spawn_with(thread::Builder::new(), f)
    }

    /// Like [`spawn`](Self::spawn) but names the thread.
    pub fn spawn_named<F, T>(&self, name: impl Into<String>, f: F) -> io::Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.spawn_with(thread::Builder::new().name(name.into()), f)
    }

    fn spawn_with<F, T>(&self, builder: thread::Builder, f: F) -> io::Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        // Counted before the thread starts so the caller sees it immediately.
        // If the spawn fails the guard is dropped with the closure.
        let guard = LiveGuard::enter(self.clone());
        builder.spawn(move || {
            let _guard = guard;
            f()
        })
    }
}

/// Leaves the registry when dropped, including during unwinding.
struct LiveGuard {
    registry: ThreadRegistry,
}

impl LiveGuard {
    fn enter(registry: ThreadRegistry) -> Self {
        registry.enter();
        Self { registry }
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.registry.leave();
    }
}

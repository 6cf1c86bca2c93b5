use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Lock a mutex, recovering the data if a holder panicked.
///
/// Every critical section in this crate leaves its data consistent between
/// statements, so a poisoned guard is still safe to use.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One-shot cancellation flag a worker can sleep on.
#[derive(Debug, Default)]
pub(crate) struct Signal {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl Signal {
    pub(crate) fn cancel(&self) {
        *lock(&self.cancelled) = true;
        self.wake.notify_all();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        *lock(&self.cancelled)
    }

    /// Sleep for `timeout` or until cancelled. Returns true if cancelled.
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        let guard = lock(&self.cancelled);
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// A named background thread that stops when its signal is cancelled.
#[derive(Debug)]
pub(crate) struct Worker {
    name: &'static str,
    signal: Arc<Signal>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn<F>(name: &'static str, body: F) -> Result<Self>
    where
        F: FnOnce(&Signal) + Send + 'static,
    {
        let signal = Arc::new(Signal::default());
        let thread_signal = Arc::clone(&signal);
        let handle = thread::Builder::new()
            .name(format!("messenger-{name}"))
            .spawn(move || body(&thread_signal))
            .map_err(|source| ClientError::Spawn { name, source })?;

        Ok(Self {
            name,
            signal,
            handle: Some(handle),
        })
    }

    /// Cancel and wait for the thread to finish.
    ///
    /// Calling this from the worker's own thread only cancels.
    pub(crate) fn stop(mut self) {
        self.signal.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::warn!(worker = self.name, "background thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use std::time::Instant;

    use super::*;

    #[test]
    fn wait_times_out_when_not_cancelled() {
        let signal = Signal::default();
        let start = Instant::now();
        assert!(!signal.wait(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn cancel_wakes_waiter_early() {
        let signal = Arc::new(Signal::default());
        let waiter = Arc::clone(&signal);
        let start = Instant::now();
        let handle = thread::spawn(move || waiter.wait(Duration::from_secs(10)));

        thread::sleep(Duration::from_millis(20));
        signal.cancel();

        assert!(handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn wait_after_cancel_returns_immediately() {
        let signal = Signal::default();
        signal.cancel();
        assert!(signal.is_cancelled());
        assert!(signal.wait(Duration::from_secs(10)));
    }

    #[test]
    fn stop_joins_looping_worker() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let worker = Worker::spawn("test", move |signal| loop {
            counter.fetch_add(1, Ordering::SeqCst);
            if signal.wait(Duration::from_millis(5)) {
                break;
            }
        })
        .unwrap();

        thread::sleep(Duration::from_millis(30));
        worker.stop();

        let after_stop = ticks.load(Ordering::SeqCst);
        assert!(after_stop >= 1);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }
}

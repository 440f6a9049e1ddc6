//! Trailing-edge debouncing as an explicit state machine.
//!
//! A [`Debouncer`] is `Idle` until a call arrives, `Scheduled` while that
//! call waits out the quiet period, and `Running` while the winning call's
//! work executes. Every call bumps a generation counter; a scheduled call
//! whose generation is no longer current when its delay elapses resolves to
//! [`DebounceOutcome::Superseded`] without running.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Scheduled,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceOutcome<T> {
    /// This call was the last one in its burst and its work ran.
    Ran(T),
    /// A newer call (or a cancel) replaced this one before it ran.
    Superseded,
}

impl<T> DebounceOutcome<T> {
    pub fn is_superseded(&self) -> bool {
        matches!(self, DebounceOutcome::Superseded)
    }

    pub fn into_ran(self) -> Option<T> {
        match self {
            DebounceOutcome::Ran(value) => Some(value),
            DebounceOutcome::Superseded => None,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    generation: u64,
    scheduled: bool,
    running: usize,
}

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    inner: Mutex<Inner>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> DebounceState {
        let inner = self.inner.lock();
        if inner.scheduled {
            DebounceState::Scheduled
        } else if inner.running > 0 {
            DebounceState::Running
        } else {
            DebounceState::Idle
        }
    }

    /// Schedule `work`, superseding any call still waiting.
    ///
    /// `work` is only invoked if no newer call arrives within the delay.
    pub async fn call<F, Fut, T>(&self, work: F) -> DebounceOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let generation = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.scheduled = true;
            inner.generation
        };
        let mut pending = PendingCall {
            inner: &self.inner,
            generation,
            armed: true,
        };

        tokio::time::sleep(self.delay).await;

        {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                pending.armed = false;
                return DebounceOutcome::Superseded;
            }
            inner.scheduled = false;
            inner.running += 1;
            pending.armed = false;
        }

        let _running = RunningGuard { inner: &self.inner };
        DebounceOutcome::Ran(work().await)
    }

    /// Drop the scheduled call, if any. Work already running is unaffected.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock();
        if inner.scheduled {
            inner.generation += 1;
            inner.scheduled = false;
        }
    }
}

/// Clears the scheduled flag when a waiting call is dropped mid-delay.
struct PendingCall<'a> {
    inner: &'a Mutex<Inner>,
    generation: u64,
    armed: bool,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.inner.lock();
            if inner.generation == self.generation {
                inner.scheduled = false;
            }
        }
    }
}

struct RunningGuard<'a> {
    inner: &'a Mutex<Inner>,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        inner.running = inner.running.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_single_call_runs_after_delay() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let start = tokio::time::Instant::now();
        let outcome = debouncer.call(|| async { 7 }).await;
        assert_eq!(outcome, DebounceOutcome::Ran(7));
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(debouncer.state(), DebounceState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_only_last_call() {
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(100)));
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..3 {
            let debouncer = Arc::clone(&debouncer);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                debouncer
                    .call(|| async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        i
                    })
                    .await
            }));
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }
        assert!(outcomes[0].is_superseded());
        assert!(outcomes[1].is_superseded());
        assert_eq!(outcomes[2], DebounceOutcome::Ran(2));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_transitions() {
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(50)));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let task = {
            let debouncer = Arc::clone(&debouncer);
            tokio::spawn(async move {
                debouncer
                    .call(|| async move {
                        release_rx.await.ok();
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(debouncer.state(), DebounceState::Scheduled);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(debouncer.state(), DebounceState::Running);

        release_tx.send(()).unwrap();
        assert_eq!(task.await.unwrap(), DebounceOutcome::Ran(()));
        assert_eq!(debouncer.state(), DebounceState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_supersedes_scheduled_call() {
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(50)));
        let task = {
            let debouncer = Arc::clone(&debouncer);
            tokio::spawn(async move { debouncer.call(|| async { 1 }).await })
        };

        tokio::time::sleep(Duration::from_millis(1)).await;
        debouncer.cancel();
        assert_eq!(debouncer.state(), DebounceState::Idle);
        assert!(task.await.unwrap().is_superseded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_call_returns_to_idle() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let call = debouncer.call(|| async { 1 });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), call).await;
        assert!(timed_out.is_err());
        assert_eq!(debouncer.state(), DebounceState::Idle);
    }
}

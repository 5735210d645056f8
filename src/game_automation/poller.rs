// Timeout-bounded polling with a fixed interval and cooperative cancellation
use std::future::Future;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

/// Source of time for the poller. Production sleeps on the tokio timer; tests
/// run the same code against a paused runtime.
#[allow(async_fn_in_trait)]
pub trait Clock {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// Fires the stop signal. Dropping it without stopping leaves the run going.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Observed between polls and between stages, never inside a bridge call.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

impl StopSignal {
    /// A signal nothing can fire.
    pub fn never() -> Self {
        stop_channel().1
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once stop is requested; pends forever if the handle is gone.
    pub async fn stopped(&mut self) {
        if self.rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// What one probe saw: the condition held, or not yet.
#[derive(Debug, Clone, PartialEq)]
pub enum Check<T> {
    Done(T),
    Pending(T),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<T> {
    Success(T),
    /// `last` is the final observation before giving up
    TimedOut { last: Option<T>, elapsed: Duration },
    Cancelled { last: Option<T> },
}

pub struct Poller<C: Clock = TokioClock> {
    clock: C,
    interval: Duration,
    stop: StopSignal,
}

impl<C: Clock> Poller<C> {
    pub fn new(clock: C, interval: Duration, stop: StopSignal) -> Self {
        Self {
            clock,
            interval,
            stop,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Probe immediately, then once per interval, until the probe reports
    /// `Done`, `timeout` has elapsed after a pending probe, or stop is
    /// requested. A probe error ends the wait.
    ///
    /// With instantaneous probes a timeout lands in `[timeout, timeout + interval]`.
    pub async fn wait_for<T, E, F, Fut>(
        &self,
        timeout: Duration,
        mut probe: F,
    ) -> Result<WaitOutcome<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Check<T>, E>>,
    {
        let start = self.clock.now();
        let mut stop = self.stop.clone();
        let mut last = None;
        loop {
            if stop.is_stopped() {
                return Ok(WaitOutcome::Cancelled { last });
            }
            match probe().await? {
                Check::Done(value) => return Ok(WaitOutcome::Success(value)),
                Check::Pending(value) => last = Some(value),
            }

            let elapsed = self.clock.now().saturating_duration_since(start);
            if elapsed >= timeout {
                return Ok(WaitOutcome::TimedOut { last, elapsed });
            }

            tokio::select! {
                _ = self.clock.sleep(self.interval) => {}
                _ = stop.stopped() => return Ok(WaitOutcome::Cancelled { last }),
            }
        }
    }

    /// `wait_for` over a plain predicate.
    pub async fn wait_until<E, F, Fut>(
        &self,
        timeout: Duration,
        mut predicate: F,
    ) -> Result<WaitOutcome<()>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        self.wait_for(timeout, || {
            let check = predicate();
            async move {
                Ok(if check.await? {
                    Check::Done(())
                } else {
                    Check::Pending(())
                })
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poller(interval_ms: u64, stop: StopSignal) -> Poller {
        Poller::new(TokioClock, Duration::from_millis(interval_ms), stop)
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_true_times_out_within_one_interval() {
        for (timeout_ms, interval_ms) in [(5_000, 1_000), (2_500, 1_000), (60_000, 7_000)] {
            let p = poller(interval_ms, StopSignal::never());
            let started = Instant::now();
            let outcome = p
                .wait_until(Duration::from_millis(timeout_ms), || async { Ok::<_, ()>(false) })
                .await
                .unwrap();
            let waited = started.elapsed();

            let timeout = Duration::from_millis(timeout_ms);
            let interval = Duration::from_millis(interval_ms);
            assert!(matches!(outcome, WaitOutcome::TimedOut { .. }));
            assert!(waited >= timeout, "{waited:?} < {timeout:?}");
            assert!(waited <= timeout + interval, "{waited:?} too late");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_reports_last_observation() {
        let p = poller(1_000, StopSignal::never());
        let mut n = 0;
        let outcome = p
            .wait_for(Duration::from_secs(3), || {
                n += 1;
                let seen = n;
                async move { Ok::<_, ()>(Check::Pending(seen)) }
            })
            .await
            .unwrap();

        assert_eq!(n, 4);
        assert_eq!(
            outcome,
            WaitOutcome::TimedOut {
                last: Some(4),
                elapsed: Duration::from_secs(3)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success_does_not_sleep() {
        let p = poller(1_000, StopSignal::never());
        let started = Instant::now();
        let outcome = p
            .wait_for(Duration::from_secs(30), || async { Ok::<_, ()>(Check::Done("setup")) })
            .await
            .unwrap();

        assert_eq!(outcome, WaitOutcome::Success("setup"));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_a_few_polls() {
        let p = poller(500, StopSignal::never());
        let started = Instant::now();
        let mut calls = 0;
        let outcome = p
            .wait_until(Duration::from_secs(10), || {
                calls += 1;
                let ready = calls == 3;
                async move { Ok::<_, ()>(ready) }
            })
            .await
            .unwrap();

        assert_eq!(outcome, WaitOutcome::Success(()));
        assert_eq!(calls, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_ends_the_wait() {
        let p = poller(1_000, StopSignal::never());
        let mut calls = 0;
        let result = p
            .wait_until(Duration::from_secs(10), || {
                calls += 1;
                async { Err::<bool, _>("device gone") }
            })
            .await;

        assert_eq!(result, Err("device gone"));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_probe() {
        let (handle, signal) = stop_channel();
        handle.stop();
        let p = poller(1_000, signal);
        let mut calls = 0;
        let outcome = p
            .wait_until(Duration::from_secs(10), || {
                calls += 1;
                async { Ok::<_, ()>(true) }
            })
            .await
            .unwrap();

        assert_eq!(outcome, WaitOutcome::Cancelled { last: None });
        assert_eq!(calls, 0);
        assert!(p.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_the_sleep() {
        let (handle, signal) = stop_channel();
        let p = poller(1_000, signal);
        let started = Instant::now();
        let mut calls = 0;

        let wait = p.wait_for(Duration::from_secs(60), || {
            calls += 1;
            let seen = calls;
            async move { Ok::<_, ()>(Check::Pending(seen)) }
        });
        let stopper = async {
            tokio::time::sleep(Duration::from_millis(1_500)).await;
            handle.stop();
        };
        let (outcome, ()) = tokio::join!(wait, stopper);

        assert_eq!(outcome.unwrap(), WaitOutcome::Cancelled { last: Some(2) });
        assert_eq!(started.elapsed(), Duration::from_millis(1_500));
    }
}

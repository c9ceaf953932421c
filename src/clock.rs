//! Injectable time source, so that timers (reclaim, status) are deterministic in tests.

use std::future::Future;
use std::time::{Duration, SystemTime};

/// Abstracts over wall-clock time and periodic scheduling.
///
/// Production code uses `SystemClock`, which defers to `tokio::time`. Tests use
/// a clock that can be advanced manually without sleeping real time.
pub trait Clock: Send + Sync + 'static {
    /// Current wall-clock time, used to stamp `complete_at` on completed requests.
    fn now(&self) -> SystemTime;

    /// Sleeps for `dur`. Timers call this in a loop between ticks.
    fn sleep(&self, dur: Duration) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// The real clock, backed by `tokio::time::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, dur: Duration) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(dur))
    }
}

/// Spawns `task` on an interval of `period`, using `clock` to wait between ticks.
/// Swallows and logs any panic-free error the task reports; never exits early.
pub fn schedule_periodic<F, Fut>(
    clock: std::sync::Arc<dyn Clock>,
    period: Duration,
    mut task: F,
) -> tokio::task::JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        loop {
            clock.sleep(period).await;
            task().await;
        }
    })
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// A clock that never actually sleeps; `now()` is a fixed, manually-advanced instant.
    pub struct TestClock {
        now: Mutex<SystemTime>,
    }

    impl TestClock {
        pub fn new() -> Self {
            TestClock { now: Mutex::new(SystemTime::UNIX_EPOCH) }
        }

        pub fn advance(&self, dur: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += dur;
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> SystemTime {
            *self.now.lock().unwrap()
        }

        fn sleep(&self, _dur: Duration) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> {
            Box::pin(async {})
        }
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::info;
use rand::Rng;

use crate::error::CollectError;

const SLICE: Duration = Duration::from_millis(100);

/// Process-wide stop flag. Raised from the Ctrl-C handler and polled by
/// every wait.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        StopSignal::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), CollectError> {
        if self.is_raised() {
            Err(CollectError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Delays between requests. `jitter` adds up to that much on top of each
/// inter-target and batch pause.
#[derive(Debug, Clone)]
pub struct Pacing {
    pub user_delay: Duration,
    pub batch_delay: Duration,
    pub batch_size: usize,
    pub jitter: Duration,
}

/// The pause taken after a crawled target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    User,
    Batch,
}

impl Pacing {
    /// No waiting between targets.
    pub fn immediate() -> Self {
        Pacing {
            user_delay: Duration::ZERO,
            batch_delay: Duration::ZERO,
            batch_size: 0,
            jitter: Duration::ZERO,
        }
    }

    /// The pause owed after the `attempts`-th crawl of a batch. Nothing
    /// follows the last target; every `batch_size`-th crawl gets the batch
    /// pause instead of the user pause.
    pub fn wait_after(&self, attempts: usize, last: bool) -> Option<Wait> {
        if last {
            None
        } else if self.batch_size > 0 && attempts % self.batch_size == 0 {
            Some(Wait::Batch)
        } else {
            Some(Wait::User)
        }
    }
}

/// Sleeps in short slices so a raised signal is noticed quickly.
pub fn pause(duration: Duration, stop: &StopSignal) -> Result<(), CollectError> {
    let deadline = Instant::now() + duration;
    loop {
        stop.check()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep(SLICE.min(deadline - now));
    }
}

pub fn wait(pacing: &Pacing, kind: Wait, stop: &StopSignal) -> Result<(), CollectError> {
    let (base, label) = match kind {
        Wait::User => (pacing.user_delay, "User Delay"),
        Wait::Batch => (pacing.batch_delay, "Batch Delay"),
    };
    let delay = with_jitter(base, pacing.jitter);
    if !delay.is_zero() {
        info!("Waiting for {:.1} seconds ({})...", delay.as_secs_f64(), label);
    }
    pause(delay, stop)
}

fn with_jitter(base: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return base;
    }
    let mut rng = rand::thread_rng();
    base + Duration::from_millis(rng.gen_range(0..=jitter.as_millis() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raised_signal_aborts_pause() {
        let stop = StopSignal::new();
        stop.raise();
        let started = Instant::now();
        assert!(matches!(
            pause(Duration::from_secs(30), &stop),
            Err(CollectError::Cancelled)
        ));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn batch_pause_replaces_user_pause() {
        let pacing = Pacing {
            batch_size: 2,
            ..Pacing::immediate()
        };
        assert_eq!(pacing.wait_after(1, false), Some(Wait::User));
        assert_eq!(pacing.wait_after(2, false), Some(Wait::Batch));
        assert_eq!(pacing.wait_after(3, false), Some(Wait::User));
        assert_eq!(pacing.wait_after(4, true), None);
        assert_eq!(Pacing::immediate().wait_after(5, false), Some(Wait::User));
    }

    #[test]
    fn jitter_stays_in_range() {
        let base = Duration::from_millis(200);
        let jitter = Duration::from_millis(50);
        for _ in 0..20 {
            let d = with_jitter(base, jitter);
            assert!(d >= base && d <= base + jitter);
        }
    }
}

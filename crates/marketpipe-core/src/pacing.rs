//! Serial call pacing for the per-asset extraction loop.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Enforces a minimum delay between consecutive provider calls.
///
/// The provider rate-limits aggressively; this is a hard pacing contract,
/// not a politeness delay. One call is admitted per period and the next
/// awaits the remainder of the window.
#[derive(Clone)]
pub struct Pacer {
    limiter: Arc<DirectRateLimiter>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        let quota = Quota::with_period(min_interval.max(Duration::from_millis(1)))
            .expect("pacing interval is always greater than zero")
            .allow_burst(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Wait until the next call is admissible under the pacing quota.
    pub async fn until_ready(&self) {
        self.limiter.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn second_call_waits_out_the_interval() {
        let pacer = Pacer::new(Duration::from_millis(100));

        pacer.until_ready().await;
        let started = Instant::now();
        pacer.until_ready().await;

        assert!(
            started.elapsed() >= Duration::from_millis(80),
            "second call should have been paced, waited {:?}",
            started.elapsed()
        );
    }
}

//! Randomized waits.

use rand::Rng;
use std::time::Duration;

use crate::config::DelayRange;

/// Draw a uniform duration from an inclusive millisecond range.
pub fn sample_delay(range: &DelayRange) -> Duration {
    if range.min >= range.max {
        return Duration::from_millis(range.min);
    }
    Duration::from_millis(rand::thread_rng().gen_range(range.min..=range.max))
}

/// Sleep for a random duration drawn from `range`.
pub async fn random_sleep(range: &DelayRange) {
    let delay = sample_delay(range);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

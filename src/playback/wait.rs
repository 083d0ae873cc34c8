use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

/// Poll `predicate` every `poll_interval` until it holds or `timeout` elapses.
///
/// Returns whether the predicate was satisfied. The predicate is checked once
/// more at the deadline so a condition that becomes true exactly at the
/// timeout still counts.
pub async fn wait_until<F>(mut predicate: F, timeout: Duration, poll_interval: Duration) -> bool
where
    F: FnMut() -> bool,
{
    if predicate() {
        return true;
    }

    let deadline = Instant::now() + timeout;
    let mut ticker = time::interval(poll_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if predicate() {
                    return true;
                }
            }
            _ = time::sleep_until(deadline) => {
                return predicate();
            }
        }
    }
}

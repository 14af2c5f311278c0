use std::time::{Duration, Instant};

/// Poll `done` every `poll_interval` until it returns true or `timeout` elapses.
///
/// Returns whether the condition was met. `done` is always checked at least once.
pub fn poll_until<F>(mut done: F, timeout: Duration, poll_interval: Duration, what: &str) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if done() {
            tracing::debug!("{} ready", what);
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            tracing::warn!("Timed out after {:?} waiting for {}", timeout, what);
            return false;
        }
        std::thread::sleep(poll_interval.min(deadline - now));
    }
}

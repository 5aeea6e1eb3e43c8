//! Bounded polling for registry availability

use std::time::Duration;

/// Smallest and largest allowed poll interval
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);

/// Smallest and largest allowed overall timeout
pub const MIN_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(3600);

/// Interval/timeout pair, always within the clamp bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
  interval: Duration,
  timeout: Duration,
}

impl PollSettings {
  /// Build settings, clamping interval to 1–60s and timeout to 10–3600s
  pub fn new(interval: Duration, timeout: Duration) -> Self {
    Self {
      interval: interval.clamp(MIN_INTERVAL, MAX_INTERVAL),
      timeout: timeout.clamp(MIN_TIMEOUT, MAX_TIMEOUT),
    }
  }

  pub fn from_secs(interval: u64, timeout: u64) -> Self {
    Self::new(Duration::from_secs(interval), Duration::from_secs(timeout))
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }

  pub fn timeout(&self) -> Duration {
    self.timeout
  }
}

impl Default for PollSettings {
  fn default() -> Self {
    Self::from_secs(5, 300)
  }
}

/// Call `probe` until it returns `true` or the timeout budget is spent.
///
/// The wait between probes doubles after each miss, capped at
/// [`MAX_INTERVAL`] and at the remaining budget. Elapsed time is the sum of
/// requested sleeps, so the loop is deterministic under a fake `sleep`.
pub fn poll_with_backoff(
  settings: PollSettings,
  mut sleep: impl FnMut(Duration),
  mut probe: impl FnMut() -> bool,
) -> bool {
  let mut elapsed = Duration::ZERO;
  let mut wait = settings.interval;

  loop {
    if probe() {
      return true;
    }
    if elapsed >= settings.timeout {
      return false;
    }

    let step = wait.min(settings.timeout - elapsed);
    sleep(step);
    elapsed += step;
    wait = (wait * 2).min(MAX_INTERVAL);
  }
}

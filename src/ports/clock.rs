//! Clock Port - Wall Time for Feed Freshness

/// Source of the current time in Unix seconds.
pub trait Clock: Send + Sync + 'static {
  fn now_secs(&self) -> u64;
}

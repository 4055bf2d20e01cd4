//! Event Log - Append-Only Record of Committed Effects
//!
//! Every use case appends here after it has committed. Sequence numbers
//! are assigned under the lock, so they are gap-free and strictly
//! increasing across all strategies and the revenue ledger. Records stay
//! buffered until the journal drains them.

use std::sync::Mutex;

use chrono::Utc;
use tracing::debug;

use crate::domain::events::{EventRecord, VaultEvent};

#[derive(Debug, Default)]
struct LogInner {
  next_sequence: u64,
  pending: Vec<EventRecord>,
}

/// Shared, process-wide event log.
#[derive(Debug, Default)]
pub struct EventLog {
  inner: Mutex<LogInner>,
}

impl EventLog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Resume numbering after a restored snapshot.
  pub fn starting_at(next_sequence: u64) -> Self {
    Self {
      inner: Mutex::new(LogInner {
        next_sequence,
        pending: Vec::new(),
      }),
    }
  }

  /// Append a committed event and return its sequence number.
  pub fn emit(&self, event: VaultEvent) -> u64 {
    let mut inner = self.lock();
    let sequence = inner.next_sequence;
    inner.next_sequence += 1;
    debug!(sequence, event = event.name(), "Event emitted");
    inner.pending.push(EventRecord {
      sequence,
      emitted_at: Utc::now(),
      event,
    });
    sequence
  }

  /// Buffered records with `sequence >= from`, without draining.
  pub fn since(&self, from: u64) -> Vec<EventRecord> {
    self
      .lock()
      .pending
      .iter()
      .filter(|record| record.sequence >= from)
      .cloned()
      .collect()
  }

  /// Hand all buffered records to the caller.
  pub fn drain(&self) -> Vec<EventRecord> {
    std::mem::take(&mut self.lock().pending)
  }

  /// Sequence number the next event will receive.
  pub fn next_sequence(&self) -> u64 {
    self.lock().next_sequence
  }

  pub fn pending_len(&self) -> usize {
    self.lock().pending.len()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, LogInner> {
    self
      .inner
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use alloy::primitives::{Address, U256};

  fn claim(amount: u64) -> VaultEvent {
    VaultEvent::RevenueClaimed {
      account: Address::repeat_byte(1),
      amount: U256::from(amount),
    }
  }

  #[test]
  fn test_sequences_are_gap_free() {
    let log = EventLog::new();
    assert_eq!(log.emit(claim(1)), 0);
    assert_eq!(log.emit(claim(2)), 1);
    assert_eq!(log.next_sequence(), 2);
    assert_eq!(log.since(1).len(), 1);
  }

  #[test]
  fn test_drain_empties_but_keeps_numbering() {
    let log = EventLog::starting_at(10);
    log.emit(claim(1));
    let drained = log.drain();
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].sequence, 10);
    assert_eq!(log.pending_len(), 0);
    assert_eq!(log.emit(claim(2)), 11);
  }
}

//! Persistence Adapters - JSONL-based File Storage
//!
//! Append-only JSONL files for committed events, atomic JSON snapshots for
//! engine state, and JSONL command sessions. No database dependency.

pub mod journal;
pub mod session;
pub mod state;

pub use journal::EventJournal;
pub use session::{load_session, parse_session};
pub use state::{EngineSnapshot, StateStore};

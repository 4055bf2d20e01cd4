//! Event Journal - Append-only JSONL Event Records
//!
//! Persists committed engine events to daily JSONL files in the format
//! `events/YYYY-MM-DD.jsonl`. Each line is one self-contained record, so
//! external indexers can tail the files and rebuild strategy state from
//! creation records plus the read accessors.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::domain::events::EventRecord;

pub struct EventJournal {
    events_dir: PathBuf,
}

impl EventJournal {
    /// Create a journal under `data_dir/events`.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let events_dir = Path::new(data_dir).join("events");
        fs::create_dir_all(&events_dir)
            .await
            .context("Failed to create events directory")?;
        Ok(Self { events_dir })
    }

    /// Append records to today's file in one write.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn append(&self, records: &[EventRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let path = self.events_dir.join(format!("{date}.jsonl"));

        let mut buffer = String::new();
        for record in records {
            buffer.push_str(
                &serde_json::to_string(record).context("Failed to serialize event record")?,
            );
            buffer.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open event journal")?;
        file.write_all(buffer.as_bytes())
            .await
            .context("Failed to write event records")?;
        file.flush().await.context("Failed to flush event journal")?;

        Ok(())
    }

    /// Load every record from every daily file, ordered by sequence.
    #[instrument(skip(self))]
    pub async fn load_all(&self) -> Result<Vec<EventRecord>> {
        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.events_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "jsonl") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            for line in content.lines().filter(|line| !line.trim().is_empty()) {
                match serde_json::from_str::<EventRecord>(line) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(
                        file = %path.display(),
                        error = %e,
                        "Skipping malformed event record"
                    ),
                }
            }
        }

        records.sort_by_key(|record| record.sequence);
        info!(count = records.len(), "Loaded event records");
        Ok(records)
    }

    pub async fn is_healthy(&self) -> bool {
        fs::metadata(&self.events_dir).await.is_ok()
    }
}

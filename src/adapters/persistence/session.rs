//! Session Reader - JSONL Command Envelopes
//!
//! A session file holds one `Envelope` per line. Blank lines and lines
//! starting with `#` are ignored. A malformed line fails the whole load
//! with its line number.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::info;

use crate::usecases::sequencer::Envelope;

pub async fn load_session(path: &Path) -> Result<Vec<Envelope>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read session file: {}", path.display()))?;

    let envelopes = parse_session(&content)?;
    info!(path = %path.display(), commands = envelopes.len(), "Session loaded");
    Ok(envelopes)
}

pub fn parse_session(content: &str) -> Result<Vec<Envelope>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Malformed command on line {}", index + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_and_blanks_skipped() {
        let content = r#"
# seed
{"caller":"0x1111111111111111111111111111111111111111","op":"withdraw_revenue","amount":"0x1"}
"#;
        let envelopes = parse_session(content).unwrap();
        assert_eq!(envelopes.len(), 1);
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let content = "{\"caller\":\"0x1111111111111111111111111111111111111111\",\"op\":\"nope\"}";
        let err = parse_session(content).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}

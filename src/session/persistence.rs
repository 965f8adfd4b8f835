// Append-only JSONL transcript storage
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::collaborators::{ExchangeRecord, TranscriptSink};
use crate::errors::Result;

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding one transcript file per session
    pub storage_dir: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        let storage_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".buddyrag")
            .join("transcripts");

        Self { storage_dir }
    }
}

/// Writes each exchange as one JSON line to `<storage_dir>/<session_id>.jsonl`
pub struct JsonlTranscriptSink {
    config: PersistenceConfig,
    // serializes appends so lines from concurrent sessions never interleave
    write_lock: Mutex<()>,
}

impl JsonlTranscriptSink {
    /// Create sink, creating the storage directory if needed
    pub fn new(config: PersistenceConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.storage_dir)?;

        Ok(Self {
            config,
            write_lock: Mutex::new(()),
        })
    }

    pub fn transcript_path(&self, session_id: &str) -> PathBuf {
        let safe: String = session_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.config.storage_dir.join(format!("{}.jsonl", safe))
    }

    /// Read back all exchanges of a session, oldest first
    pub async fn load(&self, session_id: &str) -> Result<Vec<ExchangeRecord>> {
        let path = self.transcript_path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let contents = tokio::fs::read_to_string(&path).await?;
        let mut records = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            records.push(serde_json::from_str(line)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl TranscriptSink for JsonlTranscriptSink {
    async fn record(&self, exchange: &ExchangeRecord) -> Result<()> {
        let mut line = serde_json::to_string(exchange)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.transcript_path(&exchange.session_id))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(session_id: &str, question: &str) -> ExchangeRecord {
        ExchangeRecord {
            session_id: session_id.to_string(),
            user_id: "u1".to_string(),
            question: question.to_string(),
            answer: "Woof!".to_string(),
            sources: Vec::new(),
            confidence: 0.1,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_record_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlTranscriptSink::new(PersistenceConfig {
            storage_dir: dir.path().to_path_buf(),
        })
        .unwrap();

        sink.record(&record("s1", "first")).await.unwrap();
        sink.record(&record("s1", "second")).await.unwrap();
        sink.record(&record("s2", "other")).await.unwrap();

        let loaded = sink.load("s1").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].question, "first");
        assert_eq!(loaded[1].question, "second");
        assert!(sink.load("missing").await.unwrap().is_empty());
    }

    #[test]
    fn test_transcript_path_sanitizes_ids() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlTranscriptSink::new(PersistenceConfig {
            storage_dir: dir.path().to_path_buf(),
        })
        .unwrap();

        let path = sink.transcript_path("../etc/passwd");
        assert_eq!(path.parent().unwrap(), dir.path());
        assert!(path.ends_with("___etc_passwd.jsonl"));
    }
}

//! Append-only newline-delimited JSON log of chat turns.
//!
//! One object per line:
//!
//! ```json
//! {"timestamp":"2025-01-01T10:00:00.000000","session_id":"default","user":"headache",
//!  "bot":"...","meta":{"latency":1.23,"symptoms":["headache"],"stage":"diagnosis"}}
//! ```
//!
//! Writers share one async mutex so lines from concurrent turns never interleave.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{TriageError, TriageResult};
use crate::session::Stage;

/// Local time without offset, microsecond precision.
pub fn now_timestamp() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnMeta {
    pub latency: f64,
    pub symptoms: Vec<String>,
    pub stage: Stage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub session_id: String,
    pub user: String,
    pub bot: String,
    pub meta: TurnMeta,
}

impl LogEntry {
    pub fn new(session_id: &str, user: &str, bot: &str, meta: TurnMeta) -> Self {
        Self {
            timestamp: now_timestamp(),
            session_id: session_id.to_string(),
            user: user.to_string(),
            bot: bot.to_string(),
            meta,
        }
    }
}

pub struct ChatLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ChatLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single line, creating the file on first use.
    pub async fn append(&self, entry: &LogEntry) -> TriageResult<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Every entry written so far, oldest first. Missing file reads as empty.
    pub async fn read_all(&self) -> TriageResult<Vec<LogEntry>> {
        let _guard = self.lock.lock().await;
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str::<LogEntry>(line).map_err(TriageError::from))
            .collect()
    }
}

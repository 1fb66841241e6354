//! Per-day accounting of completion-API token consumption.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UsageLogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One line per AI call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEntry {
    pub timestamp: String,
    pub endpoint: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub model: String,
}

/// Appends one JSON object per call to `token_usage_YYYY-MM-DD.jsonl` in the
/// log directory, partitioned by local calendar day. Append-only: a malformed
/// line left behind by an earlier writer can never block later appends;
/// readers skip lines that fail to parse.
#[derive(Debug, Clone)]
pub struct UsageLogger {
    log_dir: PathBuf,
}

impl UsageLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Path of the current day's log file.
    pub fn daily_log_path(&self) -> PathBuf {
        let today = Local::now().format("%Y-%m-%d");
        self.log_dir.join(format!("token_usage_{today}.jsonl"))
    }

    pub fn record(
        &self,
        endpoint: &str,
        input_tokens: u32,
        output_tokens: u32,
        model: &str,
    ) -> Result<(), UsageLogError> {
        let entry = UsageEntry {
            timestamp: Local::now().to_rfc3339(),
            endpoint: endpoint.to_string(),
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            model: model.to_string(),
        };

        fs::create_dir_all(&self.log_dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.daily_log_path())?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

//! Transaction audit log
//!
//! Records every pipeline attempt (start and completion) as JSON lines.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Final status of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Success,
    /// Broadcast, but the chain reported a failure
    Rejected,
    /// Aborted before or during broadcast
    Error,
}

/// Entry in the audit log
#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    timestamp: DateTime<Utc>,
    entry_type: &'static str,
    attempt_id: Uuid,
    signer: &'a str,
    messages: &'a [String],
    memo: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx_hash: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas_wanted: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    duration_ms: u64,
    status: AttemptStatus,
}

/// What is known about an attempt when it starts
#[derive(Debug, Clone)]
pub struct AttemptContext {
    pub attempt_id: Uuid,
    pub signer: String,
    /// Type URLs of the messages in the transaction
    pub messages: Vec<String>,
    pub memo: String,
}

impl AttemptContext {
    pub fn new(signer: &str, messages: Vec<String>, memo: &str) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            signer: signer.to_string(),
            messages,
            memo: memo.to_string(),
        }
    }
}

/// What is known about an attempt when it finishes
#[derive(Debug, Clone, Default)]
pub struct AttemptResult {
    pub tx_hash: Option<String>,
    pub gas_wanted: Option<u64>,
    pub gas_used: Option<u64>,
    pub error: Option<String>,
}

/// Writer for audit log entries
struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn write(&self, entry: &AuditEntry<'_>) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// Append-only JSONL log of transaction attempts
#[derive(Clone)]
pub struct AuditLog {
    writer: Arc<Mutex<AuditLogWriter>>,
}

impl AuditLog {
    /// # Arguments
    /// * `log_path` - Path to the audit log file (JSONL format)
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(AuditLogWriter {
                path: log_path.into(),
            })),
        }
    }

    async fn write(&self, entry: &AuditEntry<'_>) {
        let writer = self.writer.lock().await;
        // Audit logging never blocks the pipeline
        if let Err(e) = writer.write(entry) {
            tracing::warn!(error = %e, path = %writer.path.display(), "Failed to write audit log entry");
        }
    }

    pub async fn record_start(&self, ctx: &AttemptContext) {
        self.write(&AuditEntry {
            timestamp: Utc::now(),
            entry_type: "tx_attempt_start",
            attempt_id: ctx.attempt_id,
            signer: &ctx.signer,
            messages: &ctx.messages,
            memo: &ctx.memo,
            tx_hash: None,
            gas_wanted: None,
            gas_used: None,
            error: None,
            duration_ms: 0,
            status: AttemptStatus::Pending,
        })
        .await;
    }

    pub async fn record_complete(
        &self,
        ctx: &AttemptContext,
        result: &AttemptResult,
        status: AttemptStatus,
        duration_ms: u64,
    ) {
        self.write(&AuditEntry {
            timestamp: Utc::now(),
            entry_type: "tx_attempt_complete",
            attempt_id: ctx.attempt_id,
            signer: &ctx.signer,
            messages: &ctx.messages,
            memo: &ctx.memo,
            tx_hash: result.tx_hash.as_deref(),
            gas_wanted: result.gas_wanted,
            gas_used: result.gas_used,
            error: result.error.clone(),
            duration_ms,
            status,
        })
        .await;
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}

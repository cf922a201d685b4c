//! AuditWriter (spec §4.14), ported from `reconcile/audit.py`: append-only
//! JSONL with size/event-count rotation and field redaction. Fails open by
//! default — write errors are logged, never propagated to the reconcile
//! loop.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

const REDACTED_FIELDS: &[&str] = &[
    "api_key",
    "api_secret",
    "secret",
    "password",
    "token",
    "signature",
    "x-mbx-apikey",
    "authorization",
];

const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    ReconcileRun,
    RemediateAttempt,
    RemediateResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub ts_ms: i64,
    pub event_type: AuditEventType,
    pub run_id: String,
    pub schema_version: u32,
    pub mode: String,
    pub action: String,
    pub status: Option<String>,
    pub block_reason: Option<String>,
    pub symbols: Vec<String>,
    pub mismatch_counts: HashMap<String, u32>,
    pub details: serde_json::Map<String, Value>,
}

impl AuditEvent {
    pub fn new(ts_ms: i64, event_type: AuditEventType, run_id: String, mode: String, action: String) -> Self {
        Self {
            ts_ms,
            event_type,
            run_id,
            schema_version: 1,
            mode,
            action,
            status: None,
            block_reason: None,
            symbols: Vec::new(),
            mismatch_counts: HashMap::new(),
            details: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub max_bytes: u64,
    pub max_events_per_file: u64,
    pub flush_every: u64,
    pub redact: bool,
    pub fail_open: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("audit/reconcile.jsonl"),
            max_bytes: 100 * 1024 * 1024,
            max_events_per_file: 100_000,
            flush_every: 1,
            redact: true,
            fail_open: true,
        }
    }
}

fn is_redacted_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    REDACTED_FIELDS.iter().any(|f| lower.contains(f))
}

fn redact_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if is_redacted_key(&k) {
                    out.insert(k, Value::String(REDACTED_PLACEHOLDER.to_string()));
                } else {
                    out.insert(k, redact_value(v));
                }
            }
            Value::Object(out)
        }
        other => other,
    }
}

pub struct AuditWriter {
    config: AuditConfig,
    file: Option<File>,
    event_count: u64,
    byte_count: u64,
    unflushed: u64,
    write_errors: u64,
}

impl AuditWriter {
    pub fn new(config: AuditConfig) -> Self {
        Self {
            config,
            file: None,
            event_count: 0,
            byte_count: 0,
            unflushed: 0,
            write_errors: 0,
        }
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    fn ensure_open(&mut self) -> bool {
        if !self.config.enabled {
            return false;
        }
        if self.file.is_some() {
            return true;
        }
        if let Some(parent) = self.config.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                self.write_errors += 1;
                warn!(error = %e, path = %self.config.path.display(), "audit directory create failed");
                return false;
            }
        }
        if let Ok(meta) = fs::metadata(&self.config.path) {
            self.byte_count = meta.len();
        }
        match OpenOptions::new().create(true).append(true).open(&self.config.path) {
            Ok(file) => {
                self.file = Some(file);
                true
            }
            Err(e) => {
                self.write_errors += 1;
                warn!(error = %e, path = %self.config.path.display(), "audit file open failed");
                false
            }
        }
    }

    fn should_rotate(&self) -> bool {
        self.byte_count >= self.config.max_bytes || self.event_count >= self.config.max_events_per_file
    }

    fn rotate(&mut self) {
        self.file = None;
        if !self.config.path.exists() {
            return;
        }
        let mut n = 1;
        loop {
            let candidate = rotated_path(&self.config.path, n);
            if !candidate.exists() {
                let _ = fs::rename(&self.config.path, &candidate);
                info!(events = self.event_count, bytes = self.byte_count, "audit log rotated");
                self.event_count = 0;
                self.byte_count = 0;
                return;
            }
            n += 1;
        }
    }

    /// Writes one event. Returns `false` when audit is disabled or the
    /// write failed and `fail_open` is set (the default) — callers never
    /// need to handle a write failure as a hard error.
    pub fn write(&mut self, event: &AuditEvent) -> bool {
        if !self.ensure_open() {
            return false;
        }
        if self.should_rotate() {
            self.rotate();
            if !self.ensure_open() {
                return false;
            }
        }

        let mut value = serde_json::to_value(event).expect("AuditEvent serializes infallibly");
        if self.config.redact {
            if let Value::Object(ref mut map) = value {
                if let Some(details) = map.remove("details") {
                    map.insert("details".to_string(), redact_value(details));
                }
            }
        }
        let line = serde_json::to_string(&value).expect("serialized value re-serializes infallibly");

        let file = self.file.as_mut().expect("ensure_open guarantees Some");
        match writeln!(file, "{line}") {
            Ok(()) => {
                self.event_count += 1;
                self.byte_count += line.len() as u64 + 1;
                self.unflushed += 1;
                if self.unflushed >= self.config.flush_every {
                    let _ = file.flush();
                    self.unflushed = 0;
                }
                true
            }
            Err(e) => {
                self.write_errors += 1;
                warn!(error = %e, "audit write failed");
                false
            }
        }
    }
}

fn rotated_path(path: &Path, n: u32) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(format!(".{n}"));
    PathBuf::from(s)
}

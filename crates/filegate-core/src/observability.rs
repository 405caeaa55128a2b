//! Observability: tracing init, audit sink, quiet-aware logging.
//!
//! Uses config::ObservabilityConfig for FILEGATE_QUIET, LOG_LEVEL, LOG_JSON, AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Quiet-mode aware info logging. Suppressed when FILEGATE_QUIET=1.
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {{
        if !$crate::observability::is_quiet() {
            tracing::info!($($arg)*);
        }
    }};
}

pub fn is_quiet() -> bool {
    crate::config::ObservabilityConfig::from_env().quiet
}

/// Initialize tracing. Call once at process startup.
/// When FILEGATE_QUIET=1 only WARN and above are logged; RUST_LOG overrides both.
pub fn init_tracing() {
    let cfg = crate::config::ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "filegate=warn".to_string()
    } else {
        cfg.log_level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
}

/// Events the gate reports to its audit collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A containment or sensitive-name check refused the request.
    AccessDenied { requested: String, reason: String },
    /// Screening completed with `passed = false`.
    ScreeningFailed {
        path: String,
        threat_level: String,
        issue_kinds: Vec<String>,
    },
}

/// Audit-logging sink invoked on every denial and every failed screening.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Appends one JSON object per event to a file.
#[derive(Debug)]
pub struct JsonlAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Sink for `FILEGATE_AUDIT_LOG`, if configured.
    pub fn from_env() -> Option<Self> {
        let path = crate::config::ObservabilityConfig::from_env()
            .audit_log
            .clone()?;
        Some(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, event: &AuditEvent) {
        let mut record = json!({
            "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "source": "filegate",
        });
        if let (Some(obj), Ok(serde_json::Value::Object(fields))) =
            (record.as_object_mut(), serde_json::to_value(event))
        {
            obj.extend(fields);
        }
        let _guard = self.lock.lock();
        append_jsonl(&self.path, &record);
    }
}

fn append_jsonl(path: &Path, record: &serde_json::Value) {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(mut f) => {
            if let Ok(line) = serde_json::to_string(record) {
                let _ = writeln!(f, "{}", line);
            }
        }
        Err(e) => tracing::warn!(path = %path.display(), err = %e, "audit log unavailable"),
    }
}

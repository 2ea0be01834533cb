//! Observability: tracing init and the worker audit log.
//!
//! Reads CLAWLITE_QUIET, CLAWLITE_LOG_LEVEL, CLAWLITE_LOG_JSON and
//! CLAWLITE_AUDIT_LOG through [`ObservabilityConfig`].

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Initialize tracing. Call once at process startup.
/// With CLAWLITE_QUIET=1 only WARN and above are logged.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "clawlite=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    // stdout carries command results; diagnostics go to stderr
    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

pub fn is_quiet() -> bool {
    ObservabilityConfig::from_env().quiet
}

/// `tracing::info!` that stays silent under CLAWLITE_QUIET=1.
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {{
        if !$crate::observability::is_quiet() {
            tracing::info!($($arg)*);
        }
    }};
}

fn get_audit_path() -> Option<String> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = ObservabilityConfig::from_env().audit_log.clone()?;
    if path.is_empty() {
        return None;
    }
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    {
        let mut guard = AUDIT_PATH.lock().ok()?;
        *guard = Some(path.clone());
    }
    Some(path)
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Audit: worker_started (right after spawn)
pub fn audit_worker_started(group: &str, run_id: &str, program: &str, cwd: &str) {
    if let Some(path) = get_audit_path() {
        append_jsonl(&path, &worker_started_record(group, run_id, program, cwd));
    }
}

/// Audit: worker_completed (once per invocation, whatever the outcome)
pub fn audit_worker_completed(
    group: &str,
    run_id: &str,
    exit_code: Option<i32>,
    duration_ms: u64,
    success: bool,
    timed_out: bool,
) {
    if let Some(path) = get_audit_path() {
        append_jsonl(
            &path,
            &worker_completed_record(group, run_id, exit_code, duration_ms, success, timed_out),
        );
    }
}

fn worker_started_record(group: &str, run_id: &str, program: &str, cwd: &str) -> serde_json::Value {
    json!({
        "ts": now_ts(),
        "event": "worker_started",
        "group": group,
        "run_id": run_id,
        "program": program,
        "cwd": cwd,
    })
}

fn worker_completed_record(
    group: &str,
    run_id: &str,
    exit_code: Option<i32>,
    duration_ms: u64,
    success: bool,
    timed_out: bool,
) -> serde_json::Value {
    json!({
        "ts": now_ts(),
        "event": "worker_completed",
        "group": group,
        "run_id": run_id,
        "exit_code": exit_code,
        "duration_ms": duration_ms,
        "success": success,
        "timed_out": timed_out,
    })
}

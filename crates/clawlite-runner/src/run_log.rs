//! Per-invocation diagnostic log files under `<group>/logs/`.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// What happened during one run, as recorded in the diagnostic log.
#[derive(Debug)]
pub struct RunRecord<'a> {
    pub started_at: DateTime<Utc>,
    pub group_name: &'a str,
    pub run_id: &'a str,
    pub is_main: bool,
    pub duration: Duration,
    pub exit_code: Option<i32>,
    pub prompt_len: usize,
    pub session_id: Option<&'a str>,
    pub stdout: &'a str,
    pub stdout_truncated: bool,
    pub stderr: &'a str,
    pub stderr_truncated: bool,
    pub verbose: bool,
}

/// Summary written when a run is stopped by its timeout.
#[derive(Debug)]
pub struct TimeoutRecord<'a> {
    pub started_at: DateTime<Utc>,
    pub group_name: &'a str,
    pub run_id: &'a str,
    pub duration: Duration,
    pub configured_timeout: Duration,
    pub exit_code: Option<i32>,
    pub had_streaming_output: bool,
}

pub fn render_run_log(record: &RunRecord<'_>) -> String {
    let failed = record.exit_code != Some(0);
    let mut out = String::new();
    let _ = writeln!(out, "=== Worker Run Log ===");
    let _ = writeln!(out, "Timestamp: {}", timestamp(&record.started_at));
    let _ = writeln!(out, "Group: {}", record.group_name);
    let _ = writeln!(out, "Run ID: {}", record.run_id);
    let _ = writeln!(out, "IsMain: {}", record.is_main);
    let _ = writeln!(out, "Duration: {}ms", record.duration.as_millis());
    let _ = writeln!(out, "Exit Code: {}", exit_code_text(record.exit_code));
    let _ = writeln!(out, "Stdout Truncated: {}", record.stdout_truncated);
    let _ = writeln!(out, "Stderr Truncated: {}", record.stderr_truncated);
    let _ = writeln!(out);
    // Input summary only: never the prompt text or secrets
    let _ = writeln!(out, "=== Input Summary ===");
    let _ = writeln!(out, "Prompt length: {} chars", record.prompt_len);
    let _ = writeln!(out, "Session ID: {}", record.session_id.unwrap_or("new"));
    let _ = writeln!(out);

    if failed || record.verbose {
        write_stream(&mut out, "Stderr", record.stderr, record.stderr_truncated);
        write_stream(&mut out, "Stdout", record.stdout, record.stdout_truncated);
    }
    out
}

pub fn render_timeout_log(record: &TimeoutRecord<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Worker Run Log (TIMEOUT) ===");
    let _ = writeln!(out, "Timestamp: {}", timestamp(&record.started_at));
    let _ = writeln!(out, "Group: {}", record.group_name);
    let _ = writeln!(out, "Run ID: {}", record.run_id);
    let _ = writeln!(out, "Duration: {}ms", record.duration.as_millis());
    let _ = writeln!(out, "Timeout: {}ms", record.configured_timeout.as_millis());
    let _ = writeln!(out, "Exit Code: {}", exit_code_text(record.exit_code));
    let _ = writeln!(out, "Had Streaming Output: {}", record.had_streaming_output);
    out
}

fn write_stream(out: &mut String, label: &str, text: &str, truncated: bool) {
    let note = if truncated { " (TRUNCATED)" } else { "" };
    let _ = writeln!(out, "=== {}{} ===", label, note);
    let _ = writeln!(out, "{}", text);
    let _ = writeln!(out);
}

fn exit_code_text(code: Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none (signal)".to_string())
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `worker-2026-01-02T03-04-05-678Z.log`
pub fn log_file_name(at: &DateTime<Utc>) -> String {
    format!("worker-{}.log", log_stem(at))
}

fn log_stem(at: &DateTime<Utc>) -> String {
    timestamp(at).replace([':', '.'], "-")
}

/// Write `contents` into `logs_dir`. Failures are logged, never returned:
/// a missing diagnostic file must not change the run's outcome. A run that
/// starts in the same millisecond as an earlier one gets a `-N` suffix.
pub fn write_log(logs_dir: &Path, at: &DateTime<Utc>, contents: &str) -> Option<PathBuf> {
    if let Err(e) = fs::create_dir_all(logs_dir) {
        tracing::warn!(dir = %logs_dir.display(), error = %e, "Failed to create logs directory");
        return None;
    }
    let stem = log_stem(at);
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let path = if attempt == 0 {
            logs_dir.join(log_file_name(at))
        } else {
            logs_dir.join(format!("worker-{}-{}.log", stem, attempt))
        };
        let result = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .and_then(|mut file| file.write_all(contents.as_bytes()));
        match result {
            Ok(()) => return Some(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write run log");
                return None;
            }
        }
    }
    tracing::warn!(dir = %logs_dir.display(), "No free run log name");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record<'a>(exit_code: Option<i32>, verbose: bool) -> RunRecord<'a> {
        RunRecord {
            started_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            group_name: "Family",
            run_id: "clawlite-family-1",
            is_main: false,
            duration: Duration::from_millis(1234),
            exit_code,
            prompt_len: 42,
            session_id: Some("s-1"),
            stdout: "OUT-TEXT",
            stdout_truncated: true,
            stderr: "ERR-TEXT",
            stderr_truncated: false,
            verbose,
        }
    }

    #[test]
    fn test_success_log_omits_streams() {
        let text = render_run_log(&record(Some(0), false));
        assert!(text.contains("Group: Family"));
        assert!(text.contains("Duration: 1234ms"));
        assert!(text.contains("Exit Code: 0"));
        assert!(text.contains("Stdout Truncated: true"));
        assert!(!text.contains("OUT-TEXT"));
        assert!(!text.contains("ERR-TEXT"));
    }

    #[test]
    fn test_failure_or_verbose_log_includes_streams() {
        let failed = render_run_log(&record(Some(2), false));
        assert!(failed.contains("=== Stdout (TRUNCATED) ==="));
        assert!(failed.contains("OUT-TEXT"));
        assert!(failed.contains("=== Stderr ===\nERR-TEXT"));

        let verbose = render_run_log(&record(Some(0), true));
        assert!(verbose.contains("OUT-TEXT"));

        let signalled = render_run_log(&record(None, false));
        assert!(signalled.contains("Exit Code: none (signal)"));
        assert!(signalled.contains("ERR-TEXT"));
    }

    #[test]
    fn test_timeout_log() {
        let text = render_timeout_log(&TimeoutRecord {
            started_at: Utc::now(),
            group_name: "Team",
            run_id: "r",
            duration: Duration::from_secs(3),
            configured_timeout: Duration::from_millis(2500),
            exit_code: None,
            had_streaming_output: true,
        });
        assert!(text.starts_with("=== Worker Run Log (TIMEOUT) ==="));
        assert!(text.contains("Timeout: 2500ms"));
        assert!(text.contains("Had Streaming Output: true"));
    }

    #[test]
    fn test_write_log_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let path = write_log(&tmp.path().join("logs"), &at, "hello").unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "worker-2026-01-02T03-04-05-000Z.log"
        );
        assert_eq!(fs::read_to_string(path).unwrap(), "hello");
    }

    #[test]
    fn test_write_log_same_millisecond_keeps_both() {
        let tmp = tempfile::tempdir().unwrap();
        let logs = tmp.path().join("logs");
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let first = write_log(&logs, &at, "first").unwrap();
        let second = write_log(&logs, &at, "second").unwrap();
        assert_ne!(first, second);
        assert_eq!(
            second.file_name().unwrap().to_string_lossy(),
            "worker-2026-01-02T03-04-05-000Z-1.log"
        );
        assert_eq!(fs::read_to_string(first).unwrap(), "first");
        assert_eq!(fs::read_to_string(second).unwrap(), "second");
    }
}

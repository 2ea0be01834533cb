//! Typed configuration structs, grouped by concern.
//!
//! Loaded from the environment with the shared fallback logic in `loader`.

use super::env_keys::{assistant, observability as obv_keys, paths, worker};
use super::loader::{env_bool, env_optional, env_or, env_u64, secret_key_names};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================
// Runner defaults (single source of truth)
// ============================================================

/// Default hard timeout for one worker turn (30 min).
pub const DEFAULT_WORKER_TIMEOUT_MS: u64 = 30 * 60 * 1000;

/// Default idle-shutdown threshold for a worker that stopped producing output (30 min).
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30 * 60 * 1000;

/// Default cap for each captured stream (10 MiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Added on top of the idle threshold so the worker can shut itself down first.
pub const TIMEOUT_MARGIN: Duration = Duration::from_secs(30);

/// Delay between the graceful stop signal and the forced kill.
pub const KILL_GRACE: Duration = Duration::from_secs(15);

/// Streamed records buffered ahead of a slow output callback.
pub const OUTPUT_CHAIN_CAPACITY: usize = 64;

/// Assistant name baked into the packaged templates.
pub const DEFAULT_ASSISTANT_NAME: &str = "Andy";

pub const DEFAULT_WORKER_PROGRAM: &str = "clawlite-agent";

pub const DEFAULT_SECRET_KEYS: &[&str] = &["CLAUDE_CODE_OAUTH_TOKEN", "ANTHROPIC_API_KEY"];

/// Worker supervision settings, injected into the supervisor at construction.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub root: PathBuf,
    /// Per-group working directories (`<groups_dir>/<folder>`)
    pub groups_dir: PathBuf,
    /// IPC and per-group session state
    pub data_dir: PathBuf,
    /// Packaged `CLAUDE.md` templates
    pub templates_dir: PathBuf,
    /// Packaged skills mirrored into every group's config dir
    pub skills_dir: PathBuf,
    pub assistant_name: String,
    pub timezone: String,
    pub worker_program: String,
    pub worker_args: Vec<String>,
    pub worker_timeout: Duration,
    pub idle_timeout: Duration,
    pub timeout_margin: Duration,
    pub kill_grace: Duration,
    pub max_output_bytes: usize,
    pub output_chain_capacity: usize,
    /// Embed full stdout/stderr in diagnostic logs of successful runs
    pub verbose_logs: bool,
    pub secret_keys: Vec<String>,
}

impl RunnerConfig {
    /// Default configuration anchored at `root`, ignoring the environment.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            groups_dir: root.join("groups"),
            data_dir: root.join("data"),
            templates_dir: root.join("templates"),
            skills_dir: root.join("skills"),
            root,
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            timezone: "UTC".to_string(),
            worker_program: DEFAULT_WORKER_PROGRAM.to_string(),
            worker_args: Vec::new(),
            worker_timeout: Duration::from_millis(DEFAULT_WORKER_TIMEOUT_MS),
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
            timeout_margin: TIMEOUT_MARGIN,
            kill_grace: KILL_GRACE,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES as usize,
            output_chain_capacity: OUTPUT_CHAIN_CAPACITY,
            verbose_logs: false,
            secret_keys: DEFAULT_SECRET_KEYS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Load from environment variables (also loads `.env`).
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let root = env_optional(paths::CLAWLITE_HOME, &[])
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".clawlite")
            });
        let mut cfg = Self::with_root(root);

        let dir_or = |key: &str, fallback: PathBuf| {
            env_optional(key, &[]).map(PathBuf::from).unwrap_or(fallback)
        };
        cfg.groups_dir = dir_or(paths::CLAWLITE_GROUPS_DIR, cfg.groups_dir.clone());
        cfg.data_dir = dir_or(paths::CLAWLITE_DATA_DIR, cfg.data_dir.clone());
        cfg.templates_dir = dir_or(paths::CLAWLITE_TEMPLATES_DIR, cfg.templates_dir.clone());
        cfg.skills_dir = dir_or(paths::CLAWLITE_SKILLS_DIR, cfg.skills_dir.clone());

        cfg.assistant_name = env_or(
            assistant::CLAWLITE_ASSISTANT_NAME,
            assistant::ASSISTANT_NAME_ALIASES,
            || DEFAULT_ASSISTANT_NAME.to_string(),
        );
        cfg.timezone = env_or(assistant::CLAWLITE_TZ, assistant::TZ_ALIASES, || {
            "UTC".to_string()
        });

        if let Some(command) = env_optional(worker::CLAWLITE_WORKER_COMMAND, &[]) {
            let mut parts = command.split_whitespace().map(String::from);
            if let Some(program) = parts.next() {
                cfg.worker_program = program;
                cfg.worker_args = parts.collect();
            }
        }

        cfg.worker_timeout = Duration::from_millis(env_u64(
            worker::CLAWLITE_WORKER_TIMEOUT_MS,
            worker::WORKER_TIMEOUT_ALIASES,
            DEFAULT_WORKER_TIMEOUT_MS,
        ));
        cfg.idle_timeout = Duration::from_millis(env_u64(
            worker::CLAWLITE_IDLE_TIMEOUT_MS,
            worker::IDLE_TIMEOUT_ALIASES,
            DEFAULT_IDLE_TIMEOUT_MS,
        ));
        cfg.max_output_bytes = env_u64(
            worker::CLAWLITE_MAX_OUTPUT_BYTES,
            worker::MAX_OUTPUT_ALIASES,
            DEFAULT_MAX_OUTPUT_BYTES,
        ) as usize;
        cfg.secret_keys = secret_key_names(env_optional(worker::CLAWLITE_SECRET_KEYS, &[]).as_deref());
        cfg.verbose_logs = ObservabilityConfig::from_env().is_verbose();
        cfg
    }

    /// Timeout the operator configured: the group override, else the global default.
    pub fn configured_timeout(&self, group_override: Option<Duration>) -> Duration {
        group_override.unwrap_or(self.worker_timeout)
    }

    /// Timeout actually armed for a run. Never shorter than the idle threshold
    /// plus margin, so the worker's own idle shutdown always wins the race.
    pub fn effective_timeout(&self, group_override: Option<Duration>) -> Duration {
        self.configured_timeout(group_override)
            .max(self.idle_timeout + self.timeout_margin)
    }
}

/// Observability settings: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::CLAWLITE_QUIET, &[], false),
                log_level: env_or(
                    obv_keys::CLAWLITE_LOG_LEVEL,
                    obv_keys::LOG_LEVEL_ALIASES,
                    || "clawlite=info".to_string(),
                ),
                log_json: env_bool(obv_keys::CLAWLITE_LOG_JSON, &[], false),
                audit_log: env_optional(obv_keys::CLAWLITE_AUDIT_LOG, &[]),
            }
        })
    }

    /// Debug or trace logging requested anywhere in the filter.
    pub fn is_verbose(&self) -> bool {
        let level = self.log_level.to_lowercase();
        level.contains("debug") || level.contains("trace")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_root_layout() {
        let cfg = RunnerConfig::with_root("/srv/claw");
        assert_eq!(cfg.groups_dir, PathBuf::from("/srv/claw/groups"));
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/claw/data"));
        assert_eq!(cfg.templates_dir, PathBuf::from("/srv/claw/templates"));
        assert_eq!(cfg.skills_dir, PathBuf::from("/srv/claw/skills"));
        assert_eq!(cfg.max_output_bytes, 10 * 1024 * 1024);
        assert!(!cfg.verbose_logs);
    }

    #[test]
    fn test_effective_timeout_takes_larger_bound() {
        let mut cfg = RunnerConfig::with_root("/tmp/x");
        cfg.idle_timeout = Duration::from_secs(60);
        cfg.timeout_margin = Duration::from_secs(30);
        cfg.worker_timeout = Duration::from_secs(10);

        assert_eq!(cfg.effective_timeout(None), Duration::from_secs(90));
        assert_eq!(
            cfg.effective_timeout(Some(Duration::from_secs(600))),
            Duration::from_secs(600)
        );
        assert_eq!(
            cfg.configured_timeout(Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(cfg.configured_timeout(None), Duration::from_secs(10));
    }

    #[test]
    fn test_verbose_detection() {
        let mut obs = ObservabilityConfig {
            quiet: false,
            log_level: "clawlite=info".to_string(),
            log_json: false,
            audit_log: None,
        };
        assert!(!obs.is_verbose());
        obs.log_level = "clawlite=DEBUG".to_string();
        assert!(obs.is_verbose());
        obs.log_level = "trace".to_string();
        assert!(obs.is_verbose());
    }
}

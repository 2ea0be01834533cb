//! Environment variable keys and their legacy aliases.
//!
//! Primary keys use the `CLAWLITE_*` prefix; aliases keep older deployments
//! (container-era `CONTAINER_*`, bare `ASSISTANT_NAME`, `TZ`) working.

/// Directory roots
pub mod paths {
    pub const CLAWLITE_HOME: &str = "CLAWLITE_HOME";
    pub const CLAWLITE_GROUPS_DIR: &str = "CLAWLITE_GROUPS_DIR";
    pub const CLAWLITE_DATA_DIR: &str = "CLAWLITE_DATA_DIR";
    pub const CLAWLITE_TEMPLATES_DIR: &str = "CLAWLITE_TEMPLATES_DIR";
    pub const CLAWLITE_SKILLS_DIR: &str = "CLAWLITE_SKILLS_DIR";
}

/// Assistant identity and locale
pub mod assistant {
    pub const CLAWLITE_ASSISTANT_NAME: &str = "CLAWLITE_ASSISTANT_NAME";
    pub const ASSISTANT_NAME_ALIASES: &[&str] = &["ASSISTANT_NAME"];

    pub const CLAWLITE_TZ: &str = "CLAWLITE_TZ";
    pub const TZ_ALIASES: &[&str] = &["TZ"];
}

/// Worker process launch and limits
pub mod worker {
    /// Program plus arguments, split on whitespace.
    pub const CLAWLITE_WORKER_COMMAND: &str = "CLAWLITE_WORKER_COMMAND";

    pub const CLAWLITE_WORKER_TIMEOUT_MS: &str = "CLAWLITE_WORKER_TIMEOUT_MS";
    pub const WORKER_TIMEOUT_ALIASES: &[&str] = &["CONTAINER_TIMEOUT"];

    pub const CLAWLITE_IDLE_TIMEOUT_MS: &str = "CLAWLITE_IDLE_TIMEOUT_MS";
    pub const IDLE_TIMEOUT_ALIASES: &[&str] = &["IDLE_TIMEOUT"];

    pub const CLAWLITE_MAX_OUTPUT_BYTES: &str = "CLAWLITE_MAX_OUTPUT_BYTES";
    pub const MAX_OUTPUT_ALIASES: &[&str] = &["CONTAINER_MAX_OUTPUT_SIZE"];

    /// Comma separated names of credentials forwarded to the worker over stdin.
    pub const CLAWLITE_SECRET_KEYS: &str = "CLAWLITE_SECRET_KEYS";
}

/// Observability and logging
pub mod observability {
    pub const CLAWLITE_QUIET: &str = "CLAWLITE_QUIET";

    pub const CLAWLITE_LOG_LEVEL: &str = "CLAWLITE_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &["LOG_LEVEL"];

    pub const CLAWLITE_LOG_JSON: &str = "CLAWLITE_LOG_JSON";

    pub const CLAWLITE_AUDIT_LOG: &str = "CLAWLITE_AUDIT_LOG";
}

/// Variables exported to every worker process.
pub mod worker_env {
    pub const GROUP_DIR: &str = "CLAWLITE_GROUP_DIR";
    pub const GLOBAL_DIR: &str = "CLAWLITE_GLOBAL_DIR";
    pub const EXTRA_DIR: &str = "CLAWLITE_EXTRA_DIR";
    pub const IPC_DIR: &str = "CLAWLITE_IPC_DIR";
    pub const IPC_INPUT_DIR: &str = "CLAWLITE_IPC_INPUT_DIR";
    pub const TZ: &str = "TZ";
    pub const HOME: &str = "HOME";
}

//! Worker wire types shared by the host and worker implementations.
//!
//! One [`WorkerInput`] document goes to the worker's stdin; the worker answers
//! with zero or more [`WorkerOutput`] records framed by
//! [`OUTPUT_START_MARKER`] / [`OUTPUT_END_MARKER`] on stdout.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub const OUTPUT_START_MARKER: &str = "---CLAWLITE_OUTPUT_START---";
pub const OUTPUT_END_MARKER: &str = "---CLAWLITE_OUTPUT_END---";

// ─── Input ──────────────────────────────────────────────────────────────────

/// Credentials forwarded to the worker for a single turn.
///
/// Serializes as a plain JSON object so the worker can read it; `Debug`
/// prints key names only.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secrets(BTreeMap<String, String>);

impl Secrets {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self(values)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.0.keys().map(|k| format!("{k}=<redacted>")))
            .finish()
    }
}

/// Input document for one worker turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerInput {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub group_folder: String,
    pub chat_jid: String,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_scheduled_task: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_name: Option<String>,
    /// Caller-defined fields passed through to the worker untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
    /// Present only between construction and the stdin write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Secrets>,
}

impl WorkerInput {
    pub fn new(prompt: impl Into<String>, group_folder: impl Into<String>, chat_jid: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            session_id: None,
            group_folder: group_folder.into(),
            chat_jid: chat_jid.into(),
            is_main: false,
            is_scheduled_task: false,
            assistant_name: None,
            extra: serde_json::Map::new(),
            secrets: None,
        }
    }
}

// ─── Output ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Success,
    Error,
}

/// One protocol record, and also the terminal result of an invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOutput {
    pub status: WorkerStatus,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerOutput {
    pub fn success(result: Option<Value>, new_session_id: Option<String>) -> Self {
        Self {
            status: WorkerStatus::Success,
            result,
            new_session_id,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: WorkerStatus::Error,
            result: None,
            new_session_id: None,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == WorkerStatus::Success
    }
}

/// Frame a record the way a worker must print it on stdout.
pub fn frame_record(output: &WorkerOutput) -> serde_json::Result<String> {
    Ok(format!(
        "{}\n{}\n{}\n",
        OUTPUT_START_MARKER,
        serde_json::to_string(output)?,
        OUTPUT_END_MARKER
    ))
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clawlite_core::config::{read_env_file, RunnerConfig};
use clawlite_core::group::RegisteredGroup;
use clawlite_core::info_log;
use clawlite_core::protocol::{Secrets, WorkerInput, WorkerOutput};
use clawlite_runner::snapshot::{
    write_groups_snapshot, write_tasks_snapshot, AvailableGroup, TaskSnapshot,
};
use clawlite_runner::{prepare_workspace, OutputSink, Supervisor};
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug)]
pub struct RunRequest {
    pub group_folder: String,
    pub name: Option<String>,
    pub is_main: bool,
    pub stream: bool,
    pub timeout_ms: Option<u64>,
    pub env_file: PathBuf,
    pub tasks: Option<PathBuf>,
    pub groups: Option<PathBuf>,
}

/// Prints each streamed record as one JSON line on stdout.
struct PrintSink;

#[async_trait]
impl OutputSink for PrintSink {
    async fn on_output(&self, output: WorkerOutput) {
        match serde_json::to_string(&output) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(error = %e, "Failed to print streamed record"),
        }
    }
}

pub async fn cmd_run(config: RunnerConfig, req: RunRequest, input_json: &str) -> Result<WorkerOutput> {
    let mut group = RegisteredGroup::new(
        req.name.clone().unwrap_or_else(|| req.group_folder.clone()),
        &req.group_folder,
    );
    group.timeout_ms = req.timeout_ms;

    let mut input = build_input(input_json, &req.group_folder, req.is_main)?;
    if input.assistant_name.is_none() {
        input.assistant_name = Some(config.assistant_name.clone());
    }

    let supervisor = Supervisor::new(config);
    let workspace = prepare_workspace(supervisor.config(), &group, req.is_main)
        .with_context(|| format!("Failed to prepare workspace for '{}'", group.folder))?;

    if let Some(ref path) = req.tasks {
        let tasks: Vec<TaskSnapshot> = read_json_file(path)?;
        write_tasks_snapshot(&workspace.ipc_dir, &group.folder, req.is_main, &tasks)?;
    }
    if let Some(ref path) = req.groups {
        let groups: Vec<AvailableGroup> = read_json_file(path)?;
        write_groups_snapshot(&workspace.ipc_dir, req.is_main, &groups)?;
    }

    let secrets = read_env_file(&req.env_file, &supervisor.config().secret_keys);
    if !secrets.is_empty() {
        input.secrets = Some(Secrets::new(secrets));
    }

    let sink: Option<Arc<dyn OutputSink>> = if req.stream {
        Some(Arc::new(PrintSink))
    } else {
        None
    };
    let output = supervisor
        .run_in_workspace(
            &group,
            req.is_main,
            &workspace,
            &mut input,
            |handle| {
                info_log!(run_id = %handle.run_id, pid = ?handle.pid, "Worker running");
            },
            sink,
        )
        .await;
    Ok(output)
}

/// Accepts a full input document (missing routing fields are filled in) or,
/// when the argument is not JSON, a bare prompt.
pub fn build_input(raw: &str, group_folder: &str, is_main: bool) -> Result<WorkerInput> {
    let mut doc = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut input = WorkerInput::new(raw.trim(), group_folder, group_folder);
            input.is_main = is_main;
            return Ok(input);
        }
    };
    doc.entry("groupFolder")
        .or_insert_with(|| Value::String(group_folder.to_string()));
    doc.entry("chatJid")
        .or_insert_with(|| Value::String(group_folder.to_string()));
    doc.insert("isMain".to_string(), Value::Bool(is_main));
    // Credentials only ever come from the env file
    doc.remove("secrets");

    serde_json::from_value(Value::Object(doc)).context("Invalid worker input JSON")
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

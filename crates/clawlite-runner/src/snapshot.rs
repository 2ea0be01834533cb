//! Read-only state snapshots the host drops into a group's IPC directory
//! before a run, so the worker can see scheduled tasks and known chats.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{write_error, RunnerError};

pub const TASKS_SNAPSHOT_FILE: &str = "current_tasks.json";
pub const GROUPS_SNAPSHOT_FILE: &str = "available_groups.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub id: String,
    pub group_folder: String,
    pub prompt: String,
    pub schedule_type: String,
    pub schedule_value: String,
    pub status: String,
    #[serde(default)]
    pub next_run: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableGroup {
    pub jid: String,
    pub name: String,
    pub last_activity: String,
    pub is_registered: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupsSnapshot<'a> {
    groups: &'a [AvailableGroup],
    last_sync: String,
}

/// Write the tasks visible to `group_folder`: every task for the main group,
/// only its own otherwise.
pub fn write_tasks_snapshot(
    ipc_dir: &Path,
    group_folder: &str,
    is_main: bool,
    tasks: &[TaskSnapshot],
) -> Result<PathBuf, RunnerError> {
    let visible: Vec<&TaskSnapshot> = tasks
        .iter()
        .filter(|t| is_main || t.group_folder == group_folder)
        .collect();
    let path = ipc_dir.join(TASKS_SNAPSHOT_FILE);
    write_json(&path, &visible, "tasks snapshot")?;
    Ok(path)
}

/// Write the chats the group may address. Only the main group sees any.
pub fn write_groups_snapshot(
    ipc_dir: &Path,
    is_main: bool,
    groups: &[AvailableGroup],
) -> Result<PathBuf, RunnerError> {
    let snapshot = GroupsSnapshot {
        groups: if is_main { groups } else { &[] },
        last_sync: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    let path = ipc_dir.join(GROUPS_SNAPSHOT_FILE);
    write_json(&path, &snapshot, "groups snapshot")?;
    Ok(path)
}

fn write_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    what: &'static str,
) -> Result<(), RunnerError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|source| RunnerError::Serialize { what, source })?;
    std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))
        .map_err(|e| write_error(path, e))?;
    atomic_write(path, &text).map_err(|e| write_error(path, e))
}

/// The worker may read these files at any moment; never expose a partial write.
fn atomic_write(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, folder: &str) -> TaskSnapshot {
        TaskSnapshot {
            id: id.to_string(),
            group_folder: folder.to_string(),
            prompt: "water the plants".to_string(),
            schedule_type: "cron".to_string(),
            schedule_value: "0 9 * * *".to_string(),
            status: "active".to_string(),
            next_run: None,
        }
    }

    fn read(path: &Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_tasks_filtered_for_non_main() {
        let tmp = tempfile::tempdir().unwrap();
        let tasks = vec![task("t1", "family"), task("t2", "team")];

        let path = write_tasks_snapshot(tmp.path(), "family", false, &tasks).unwrap();
        let v = read(&path);
        assert_eq!(v.as_array().unwrap().len(), 1);
        assert_eq!(v[0]["id"], "t1");
        assert_eq!(v[0]["groupFolder"], "family");
        assert_eq!(v[0]["scheduleValue"], "0 9 * * *");

        write_tasks_snapshot(tmp.path(), "main", true, &tasks).unwrap();
        assert_eq!(read(&path).as_array().unwrap().len(), 2);
        assert!(!tmp.path().join("current_tasks.json.tmp").exists());
    }

    #[test]
    fn test_groups_only_visible_to_main() {
        let tmp = tempfile::tempdir().unwrap();
        let groups = vec![AvailableGroup {
            jid: "123@g.us".to_string(),
            name: "Family".to_string(),
            last_activity: "2026-01-01T00:00:00.000Z".to_string(),
            is_registered: true,
        }];

        let path = write_groups_snapshot(tmp.path(), true, &groups).unwrap();
        let v = read(&path);
        assert_eq!(v["groups"][0]["isRegistered"], true);
        assert!(v["lastSync"].as_str().is_some());

        write_groups_snapshot(tmp.path(), false, &groups).unwrap();
        assert_eq!(read(&path)["groups"].as_array().unwrap().len(), 0);
    }
}

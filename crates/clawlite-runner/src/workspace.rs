//! Per-group workspace preparation.
//!
//! Every invocation re-runs [`prepare_workspace`]. Directory creation is
//! idempotent; files inside the workspace persist across invocations, except
//! the skills mirror which always tracks the packaged copy.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clawlite_core::config::env_keys::worker_env;
use clawlite_core::config::RunnerConfig;
use clawlite_core::group::{resolve_under_root, RegisteredGroup, GLOBAL_FOLDER};
use serde::Serialize;
use serde_json::json;

use crate::error::{copy_error, create_dir_error, read_error, write_error, RunnerError};

pub const TEMPLATE_FILE: &str = "CLAUDE.md";
pub const SETTINGS_FILE: &str = "settings.json";
pub const EXTRA_DIR: &str = "extra";
pub const LOGS_DIR: &str = "logs";

/// Assistant name written into the packaged templates.
const TEMPLATE_ASSISTANT_NAME: &str = "Andy";

/// Resolved paths for one worker invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupWorkspace {
    pub group_dir: PathBuf,
    /// Shared memory, non-main groups only, and only when it exists
    pub global_dir: Option<PathBuf>,
    pub extra_dir: Option<PathBuf>,
    pub ipc_dir: PathBuf,
    pub config_dir: PathBuf,
}

impl GroupWorkspace {
    pub fn ipc_messages_dir(&self) -> PathBuf {
        self.ipc_dir.join("messages")
    }

    pub fn ipc_tasks_dir(&self) -> PathBuf {
        self.ipc_dir.join("tasks")
    }

    pub fn ipc_input_dir(&self) -> PathBuf {
        self.ipc_dir.join("input")
    }

    /// HOME for the worker: the parent of the config directory.
    pub fn home_dir(&self) -> PathBuf {
        self.config_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config_dir.clone())
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.group_dir.join(LOGS_DIR)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.config_dir.join("skills")
    }

    /// Variables added on top of the inherited environment.
    pub fn worker_env(&self, timezone: &str) -> BTreeMap<&'static str, String> {
        let mut env = BTreeMap::new();
        env.insert(worker_env::GROUP_DIR, path_string(&self.group_dir));
        if let Some(ref global) = self.global_dir {
            env.insert(worker_env::GLOBAL_DIR, path_string(global));
        }
        if let Some(ref extra) = self.extra_dir {
            env.insert(worker_env::EXTRA_DIR, path_string(extra));
        }
        env.insert(worker_env::IPC_DIR, path_string(&self.ipc_dir));
        env.insert(worker_env::IPC_INPUT_DIR, path_string(&self.ipc_input_dir()));
        env.insert(worker_env::TZ, timezone.to_string());
        env.insert(worker_env::HOME, path_string(&self.home_dir()));
        env
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Build (or refresh) the workspace for `group`.
pub fn prepare_workspace(
    config: &RunnerConfig,
    group: &RegisteredGroup,
    is_main: bool,
) -> Result<GroupWorkspace, RunnerError> {
    let group_dir = resolve_under_root(&config.groups_dir, &group.folder)?;
    ensure_dir(&group_dir)?;

    let fallback = if is_main { "main" } else { "default" };
    let group_template = [
        config.templates_dir.join(&group.folder).join(TEMPLATE_FILE),
        config.templates_dir.join(fallback).join(TEMPLATE_FILE),
    ]
    .into_iter()
    .find(|p| p.is_file());
    if let Some(template) = group_template {
        install_template(&template, &group_dir.join(TEMPLATE_FILE), &config.assistant_name)?;
    }

    let global_root = config.groups_dir.join(GLOBAL_FOLDER);
    let global_template = config.templates_dir.join(GLOBAL_FOLDER).join(TEMPLATE_FILE);
    if global_template.is_file() && !global_root.join(TEMPLATE_FILE).exists() {
        ensure_dir(&global_root)?;
        install_template(
            &global_template,
            &global_root.join(TEMPLATE_FILE),
            &config.assistant_name,
        )?;
    }
    let global_dir = (!is_main && global_root.is_dir()).then_some(global_root);

    let session_dir = resolve_under_root(&config.data_dir.join("sessions"), &group.folder)?;
    let config_dir = session_dir.join(".claude");
    ensure_dir(&config_dir)?;
    write_default_settings(&config_dir.join(SETTINGS_FILE))?;
    mirror_skills(&config.skills_dir, &config_dir.join("skills"))?;

    let ipc_dir = resolve_under_root(&config.data_dir.join("ipc"), &group.folder)?;
    for sub in ["messages", "tasks", "input"] {
        ensure_dir(&ipc_dir.join(sub))?;
    }

    let extra = group_dir.join(EXTRA_DIR);
    let extra_dir = extra.is_dir().then_some(extra);

    Ok(GroupWorkspace {
        group_dir,
        global_dir,
        extra_dir,
        ipc_dir,
        config_dir,
    })
}

fn ensure_dir(path: &Path) -> Result<(), RunnerError> {
    fs::create_dir_all(path).map_err(|e| create_dir_error(path, e))
}

/// Copy a packaged template unless the destination already exists.
fn install_template(src: &Path, dest: &Path, assistant_name: &str) -> Result<(), RunnerError> {
    if dest.exists() {
        return Ok(());
    }
    let text = fs::read_to_string(src).map_err(|e| read_error(src, e))?;
    let rendered = render_template(&text, assistant_name);
    fs::write(dest, rendered).map_err(|e| write_error(dest, e))?;
    tracing::debug!(template = %src.display(), dest = %dest.display(), "Installed group template");
    Ok(())
}

/// Substitute the assistant name into packaged template text.
pub fn render_template(text: &str, assistant_name: &str) -> String {
    if assistant_name == TEMPLATE_ASSISTANT_NAME {
        return text.to_string();
    }
    let heading = format!("# {}", TEMPLATE_ASSISTANT_NAME);
    let intro = format!("You are {}", TEMPLATE_ASSISTANT_NAME);
    text.split_inclusive('\n')
        .map(|line| {
            let body = line.trim_end_matches(['\r', '\n']);
            if body == heading {
                format!("# {}{}", assistant_name, &line[body.len()..])
            } else {
                line.replace(&intro, &format!("You are {}", assistant_name))
            }
        })
        .collect()
}

fn write_default_settings(path: &Path) -> Result<(), RunnerError> {
    if path.exists() {
        return Ok(());
    }
    let settings = json!({
        "env": {
            "CLAUDE_CODE_EXPERIMENTAL_AGENT_TEAMS": "1",
            "CLAUDE_CODE_ADDITIONAL_DIRECTORIES_FROM_CLAUDE_MD": "1",
            "CLAUDE_CODE_DISABLE_AUTO_MEMORY": "0",
        }
    });
    let mut text = serde_json::to_string_pretty(&settings).map_err(|source| {
        RunnerError::Serialize {
            what: "settings",
            source,
        }
    })?;
    text.push('\n');
    fs::write(path, text).map_err(|e| write_error(path, e))
}

/// Replace each packaged skill directory's copy under `dest_root`.
fn mirror_skills(src_root: &Path, dest_root: &Path) -> Result<(), RunnerError> {
    if !src_root.is_dir() {
        return Ok(());
    }
    let entries = fs::read_dir(src_root).map_err(|e| read_error(src_root, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| read_error(src_root, e))?;
        let src = entry.path();
        if !src.is_dir() {
            continue;
        }
        let dest = dest_root.join(entry.file_name());
        if dest.exists() {
            fs::remove_dir_all(&dest).map_err(|e| write_error(&dest, e))?;
        }
        copy_dir(&src, &dest)?;
    }
    Ok(())
}

fn copy_dir(src: &Path, dest: &Path) -> Result<(), RunnerError> {
    ensure_dir(dest)?;
    let entries = fs::read_dir(src).map_err(|e| read_error(src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| read_error(src, e))?;
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir(&src_path, &dest_path)?;
        } else {
            fs::copy(&src_path, &dest_path).map_err(|e| copy_error(&src_path, &dest_path, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, RunnerConfig) {
        let tmp = tempfile::tempdir().unwrap();
        let config = RunnerConfig::with_root(tmp.path());
        (tmp, config)
    }

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_prepare_creates_layout() {
        let (_tmp, config) = setup();
        let group = RegisteredGroup::new("Family", "family");
        let ws = prepare_workspace(&config, &group, false).unwrap();

        assert_eq!(ws.group_dir, config.groups_dir.join("family"));
        assert!(ws.group_dir.is_dir());
        assert_eq!(ws.ipc_dir, config.data_dir.join("ipc").join("family"));
        for sub in [ws.ipc_messages_dir(), ws.ipc_tasks_dir(), ws.ipc_input_dir()] {
            assert!(sub.is_dir());
        }
        assert_eq!(ws.home_dir(), config.data_dir.join("sessions").join("family"));
        assert_eq!(ws.global_dir, None);
        assert_eq!(ws.extra_dir, None);

        let settings: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(ws.settings_path()).unwrap()).unwrap();
        assert_eq!(settings["env"]["CLAUDE_CODE_EXPERIMENTAL_AGENT_TEAMS"], "1");
        assert_eq!(settings["env"]["CLAUDE_CODE_DISABLE_AUTO_MEMORY"], "0");
    }

    #[test]
    fn test_prepare_is_idempotent_and_keeps_settings() {
        let (_tmp, config) = setup();
        let group = RegisteredGroup::new("Family", "family");
        let ws = prepare_workspace(&config, &group, false).unwrap();
        fs::write(ws.settings_path(), "{\"custom\":true}").unwrap();

        let again = prepare_workspace(&config, &group, false).unwrap();
        assert_eq!(again, ws);
        assert_eq!(
            fs::read_to_string(again.settings_path()).unwrap(),
            "{\"custom\":true}"
        );
    }

    #[test]
    fn test_templates_rendered_once() {
        let (_tmp, mut config) = setup();
        config.assistant_name = "Nova".to_string();
        write(
            &config.templates_dir.join("default").join(TEMPLATE_FILE),
            "# Andy\n\nYou are Andy, a helper. You are Andy.\n# Andy's notes\n",
        );
        write(
            &config.templates_dir.join("global").join(TEMPLATE_FILE),
            "# Andy\r\nshared\r\n",
        );

        let group = RegisteredGroup::new("Team", "team");
        let ws = prepare_workspace(&config, &group, false).unwrap();
        assert_eq!(
            fs::read_to_string(ws.group_dir.join(TEMPLATE_FILE)).unwrap(),
            "# Nova\n\nYou are Nova, a helper. You are Nova.\n# Andy's notes\n"
        );
        let global = ws.global_dir.clone().unwrap();
        assert_eq!(
            fs::read_to_string(global.join(TEMPLATE_FILE)).unwrap(),
            "# Nova\r\nshared\r\n"
        );

        fs::write(ws.group_dir.join(TEMPLATE_FILE), "edited").unwrap();
        prepare_workspace(&config, &group, false).unwrap();
        assert_eq!(
            fs::read_to_string(ws.group_dir.join(TEMPLATE_FILE)).unwrap(),
            "edited"
        );
    }

    #[test]
    fn test_main_group_uses_main_template_and_no_global() {
        let (_tmp, config) = setup();
        write(&config.templates_dir.join("main").join(TEMPLATE_FILE), "main tpl\n");
        write(&config.templates_dir.join("default").join(TEMPLATE_FILE), "default tpl\n");
        fs::create_dir_all(config.groups_dir.join(GLOBAL_FOLDER)).unwrap();

        let ws = prepare_workspace(&config, &RegisteredGroup::new("Main", "main"), true).unwrap();
        assert_eq!(
            fs::read_to_string(ws.group_dir.join(TEMPLATE_FILE)).unwrap(),
            "main tpl\n"
        );
        assert_eq!(ws.global_dir, None);
    }

    #[test]
    fn test_default_name_leaves_template_untouched() {
        assert_eq!(render_template("# Andy\nYou are Andy\n", "Andy"), "# Andy\nYou are Andy\n");
    }

    #[test]
    fn test_skills_mirrored_and_overwritten() {
        let (_tmp, config) = setup();
        write(&config.skills_dir.join("search").join("SKILL.md"), "v1");
        write(&config.skills_dir.join("search").join("lib").join("a.sh"), "echo");
        write(&config.skills_dir.join("README.md"), "not a skill");

        let group = RegisteredGroup::new("Team", "team");
        let ws = prepare_workspace(&config, &group, false).unwrap();
        let mirrored = ws.skills_dir().join("search");
        assert_eq!(fs::read_to_string(mirrored.join("SKILL.md")).unwrap(), "v1");
        assert!(mirrored.join("lib").join("a.sh").is_file());
        assert!(!ws.skills_dir().join("README.md").exists());

        fs::write(mirrored.join("stale.txt"), "old").unwrap();
        write(&config.skills_dir.join("search").join("SKILL.md"), "v2");
        prepare_workspace(&config, &group, false).unwrap();
        assert_eq!(fs::read_to_string(mirrored.join("SKILL.md")).unwrap(), "v2");
        assert!(!mirrored.join("stale.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_skill_mirror_errors_propagate() {
        let (_tmp, config) = setup();
        let skill = config.skills_dir.join("broken");
        write(&skill.join("SKILL.md"), "v1");
        std::os::unix::fs::symlink(skill.join("missing.sh"), skill.join("dangling.sh")).unwrap();

        let group = RegisteredGroup::new("Team", "team");
        let err = prepare_workspace(&config, &group, false).unwrap_err();
        assert!(matches!(err, RunnerError::Copy { .. }));
    }

    #[test]
    fn test_extra_dir_and_worker_env() {
        let (_tmp, config) = setup();
        let group = RegisteredGroup::new("Team", "team");
        fs::create_dir_all(config.groups_dir.join("team").join(EXTRA_DIR)).unwrap();

        let ws = prepare_workspace(&config, &group, false).unwrap();
        assert_eq!(ws.extra_dir, Some(ws.group_dir.join(EXTRA_DIR)));

        let env = ws.worker_env("Europe/Berlin");
        assert_eq!(env[worker_env::TZ], "Europe/Berlin");
        assert_eq!(env[worker_env::IPC_INPUT_DIR], path_string(&ws.ipc_input_dir()));
        assert_eq!(env[worker_env::HOME], path_string(&ws.home_dir()));
        assert!(env.contains_key(worker_env::EXTRA_DIR));
        assert!(!env.contains_key(worker_env::GLOBAL_DIR));
    }

    #[test]
    fn test_rejects_invalid_folder_before_touching_disk() {
        let (_tmp, config) = setup();
        let err = prepare_workspace(&config, &RegisteredGroup::new("x", "../escape"), false)
            .unwrap_err();
        assert!(matches!(err, RunnerError::InvalidGroupFolder(_)));
        assert!(!config.groups_dir.exists());
    }
}

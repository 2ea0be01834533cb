use anyhow::{Context, Result};
use clawlite_core::config::RunnerConfig;
use clawlite_core::group::RegisteredGroup;
use clawlite_runner::{prepare_workspace, GroupWorkspace};

pub fn cmd_prepare(config: &RunnerConfig, group_folder: &str, is_main: bool) -> Result<GroupWorkspace> {
    let group = RegisteredGroup::new(group_folder, group_folder);
    prepare_workspace(config, &group, is_main)
        .with_context(|| format!("Failed to prepare workspace for '{}'", group_folder))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_prints_camel_case_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RunnerConfig::with_root(tmp.path());
        let ws = cmd_prepare(&config, "family", false).unwrap();
        let v = serde_json::to_value(&ws).unwrap();
        assert_eq!(
            v["groupDir"],
            config.groups_dir.join("family").to_string_lossy().as_ref()
        );
        assert!(v["globalDir"].is_null());
        assert!(cmd_prepare(&config, "global", false).is_err());
    }
}

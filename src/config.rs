//! Resolution and staging configuration, loadable from TOML.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::search::SearchOrder;
use crate::{Error, Result};

/// Controls dependency resolution for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveConfig {
    /// Caller-supplied directories, searched in the given order.
    pub extra_search_paths: Vec<PathBuf>,
    /// Precedence between a binary's own runpath entries and the extra
    /// paths above.
    pub search_order: SearchOrder,
    /// Whether system default library directories are searched last.
    pub include_system_paths: bool,
    /// Deadline for each external tool invocation.
    pub tool_timeout_secs: u64,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extra_search_paths: Vec::new(),
            search_order: SearchOrder::default(),
            include_system_paths: true,
            tool_timeout_secs: 30,
        }
    }
}

impl ResolveConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Controls file staging for one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageConfig {
    /// Replace existing destination files instead of skipping them.
    pub overwrite: bool,
    /// Re-hash each destination after copy and compare against the source.
    pub verify: bool,
    /// Abort the whole staging run on the first per-file failure.
    pub stop_on_first_error: bool,
    /// Rewrite each staged ELF file's runpath to the deployed layout.
    pub rewrite_runpath: bool,
    /// Reject destination names that collide case-insensitively (required
    /// when the deployment targets a case-insensitive filesystem).
    pub case_insensitive_collisions: bool,
    /// Copy independent entries on the rayon pool. Ignored when
    /// `stop_on_first_error` is set (that mode needs a defined order).
    pub parallel: bool,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            verify: true,
            stop_on_first_error: false,
            rewrite_runpath: true,
            case_insensitive_collisions: false,
            parallel: false,
        }
    }
}

/// On-disk TOML shape: `[resolve]` and `[stage]` tables, both optional.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    pub resolve: ResolveConfig,
    pub stage: StageConfig,
}

/// Load a [`DeployConfig`] from a TOML file.
pub fn load_config(path: &Path) -> Result<DeployConfig> {
    let content = fs::read_to_string(path).map_err(|e| Error::Config {
        path: path.to_path_buf(),
        reason: format!("reading file: {e}"),
    })?;
    toml::from_str(&content).map_err(|e| Error::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = DeployConfig::default();
        assert!(config.resolve.include_system_paths);
        assert_eq!(config.resolve.tool_timeout_secs, 30);
        assert!(!config.stage.overwrite);
        assert!(config.stage.verify);
    }

    #[test]
    fn test_load_config() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("deploy.toml");
        fs::write(
            &path,
            r#"
[resolve]
extra_search_paths = ["/opt/vendor/lib"]
search_order = "extra_paths_first"
tool_timeout_secs = 5

[stage]
overwrite = true
verify = false
"#,
        )?;

        let config = load_config(&path)?;
        assert_eq!(
            config.resolve.extra_search_paths,
            vec![PathBuf::from("/opt/vendor/lib")]
        );
        assert_eq!(
            config.resolve.search_order,
            crate::search::SearchOrder::ExtraPathsFirst
        );
        assert_eq!(config.resolve.tool_timeout_secs, 5);
        assert!(config.stage.overwrite);
        assert!(!config.stage.verify);
        // Unspecified fields keep their defaults.
        assert!(config.resolve.include_system_paths);
        assert!(config.stage.rewrite_runpath);
        Ok(())
    }

    #[test]
    fn test_load_config_rejects_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deploy.toml");
        fs::write(&path, "[resolve]\nnot_a_real_key = 1\n").unwrap();
        assert!(matches!(load_config(&path), Err(Error::Config { .. })));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/deploy.toml")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}

//! Aggregate run reporting and the end-to-end deploy entry point.
//!
//! The report is plain serializable data so any front end (CLI table, GUI
//! list, JSON dump) can render it without the resolver knowing about
//! presentation.

use log::info;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::cancel::CancelToken;
use crate::config::{ResolveConfig, StageConfig};
use crate::graph::{self, Resolution};
use crate::stage::{self, StageReport};
use crate::Result;

/// Structured report for one resolve (+ optional stage) run.
///
/// Every classified error that occurred appears here even when the run as a
/// whole succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub resolution: Resolution,
    pub staging: Option<StageReport>,
}

impl RunReport {
    pub fn resolved_count(&self) -> usize {
        self.resolution.libraries.len()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} resolved, {} unresolved, {} node errors",
            self.root.display(),
            self.resolution.libraries.len(),
            self.resolution.unresolved.len(),
            self.resolution.node_errors.len()
        )?;
        for unresolved in &self.resolution.unresolved {
            writeln!(
                f,
                "  not found: {} (searched {} directories)",
                unresolved.name,
                unresolved.searched.len()
            )?;
        }
        for node_error in &self.resolution.node_errors {
            writeln!(f, "  error: {}: {}", node_error.path.display(), node_error.error)?;
        }
        if let Some(staging) = &self.staging {
            writeln!(
                f,
                "  staged: {} copied, {} skipped, {} failed",
                staging.copied, staging.skipped, staging.failed
            )?;
        }
        Ok(())
    }
}

/// Resolve `root` and stage it with its dependency closure under
/// `dest_root`.
pub fn deploy(
    root: &Path,
    dest_root: &Path,
    resolve_config: &ResolveConfig,
    stage_config: &StageConfig,
    cancel: &CancelToken,
) -> Result<RunReport> {
    let resolution = graph::resolve_with_tools(root, resolve_config, cancel)?;
    info!(
        "{}: resolved {} libraries ({} unresolved)",
        root.display(),
        resolution.libraries.len(),
        resolution.unresolved.len()
    );

    let plan = stage::build_plan(
        std::slice::from_ref(&root.to_path_buf()),
        &resolution.libraries,
        dest_root,
        stage_config.case_insensitive_collisions,
    )?;
    let staging = stage::stage(&plan, stage_config, cancel)?;

    Ok(RunReport {
        root: root.to_path_buf(),
        resolution,
        staging: Some(staging),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Library;
    use crate::search::UnresolvedDependency;

    fn sample_report() -> RunReport {
        RunReport {
            root: PathBuf::from("/build/app"),
            resolution: Resolution {
                libraries: vec![Library {
                    path: PathBuf::from("/usr/lib/libz.so.1"),
                    name: "libz.so.1".to_string(),
                    found_in: PathBuf::from("/usr/lib"),
                }],
                unresolved: vec![UnresolvedDependency {
                    name: "libmissing.so".to_string(),
                    searched: vec![PathBuf::from("/usr/lib")],
                }],
                node_errors: vec![],
            },
            staging: None,
        }
    }

    #[test]
    fn test_report_display() {
        let text = sample_report().to_string();
        assert!(text.contains("1 resolved, 1 unresolved"));
        assert!(text.contains("not found: libmissing.so"));
    }

    #[test]
    fn test_report_json() -> anyhow::Result<()> {
        let json = sample_report().to_json()?;
        assert!(json.contains("libz.so.1"));
        assert!(json.contains("libmissing.so"));
        Ok(())
    }
}

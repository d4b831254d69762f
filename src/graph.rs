//! Recursive dependency resolution over a work queue.
//!
//! The graph is never materialized: a visited set keyed by canonical path
//! guarantees each node is processed once, which also terminates cycles
//! (legal among shared libraries). Per-node failures and unresolved names
//! are collected, not fatal; only a root that cannot be introspected at all
//! aborts the run.

use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::cancel::CancelToken;
use crate::config::ResolveConfig;
use crate::format::{detect_format, BinaryFormat};
use crate::parse::ParsedDeps;
use crate::search::{find_library, search_paths_for, UnresolvedDependency};
use crate::tool::{is_windows_system_dll, select_backend};
use crate::{Error, Result};

/// A resolved dependency: identity is the canonical absolute path, so one
/// physical file reached through different names or symlinks is one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Library {
    /// Canonical absolute path (symlink-free).
    pub path: PathBuf,
    /// The name the dependency was requested under.
    pub name: String,
    /// Directory the file was found in (pre-canonicalization).
    pub found_in: PathBuf,
}

/// A non-root node that could not be introspected. Recorded, not fatal.
#[derive(Debug, Clone, Serialize)]
pub struct NodeError {
    pub path: PathBuf,
    pub error: String,
}

/// Flattened outcome of one resolution run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Resolution {
    pub libraries: Vec<Library>,
    pub unresolved: Vec<UnresolvedDependency>,
    pub node_errors: Vec<NodeError>,
}

/// Where a node's dependency records come from.
///
/// The production implementation chains format detection, backend selection,
/// tool invocation, and parsing; tests substitute a table-driven stub to
/// exercise traversal semantics without external tools.
pub trait DependencySource: Sync {
    fn dependencies(&self, binary: &Path) -> Result<ParsedDeps>;
}

/// Real backend: detect format, pick a registered tool, invoke, parse.
/// Windows system DLLs are dropped from PE results here, before resolution.
pub struct ToolBackendSource {
    pub timeout: std::time::Duration,
}

impl DependencySource for ToolBackendSource {
    fn dependencies(&self, binary: &Path) -> Result<ParsedDeps> {
        let detected = detect_format(binary)?;
        let backend = select_backend(detected)?;
        let mut deps = backend.tool.dependencies(binary, self.timeout)?;
        if detected.format == BinaryFormat::Pe {
            deps.records.retain(|r| {
                let keep = !is_windows_system_dll(&r.name);
                if !keep {
                    debug!("excluding system DLL {}", r.name);
                }
                keep
            });
        }
        Ok(deps)
    }
}

/// Resolve the transitive dependency closure of one root binary.
pub fn resolve<S: DependencySource>(
    root: &Path,
    source: &S,
    config: &ResolveConfig,
    cancel: &CancelToken,
) -> Result<Resolution> {
    let root = root
        .canonicalize()
        .map_err(|_| Error::FileNotFound(root.to_path_buf()))?;

    let mut result = Resolution::default();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut unresolved_names: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<PathBuf> = VecDeque::new();

    visited.insert(root.clone());
    queue.push_back(root.clone());

    while let Some(binary) = queue.pop_front() {
        cancel.check()?;
        debug!("processing {}", binary.display());

        let deps = match source.dependencies(&binary) {
            Ok(deps) => deps,
            Err(e) => {
                if binary == root {
                    // Nothing meaningful can come out of a run whose root
                    // cannot be introspected.
                    return Err(e);
                }
                warn!("skipping {}: {e}", binary.display());
                result.node_errors.push(NodeError {
                    path: binary.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let search_paths = search_paths_for(
            &binary,
            &deps.runpaths,
            &config.extra_search_paths,
            config.search_order,
            config.include_system_paths,
        );

        for record in deps.records {
            // A hint from the tool short-circuits the search, but only if
            // the file is actually there.
            let located = match record.hint.as_deref().filter(|p| p.is_file()) {
                Some(hinted) => Ok(hinted.to_path_buf()),
                None => find_library(&record.name, &search_paths),
            };

            let found = match located {
                Ok(found) => found,
                Err(unresolved) => {
                    if unresolved_names.insert(unresolved.name.clone()) {
                        result.unresolved.push(unresolved);
                    }
                    continue;
                }
            };

            let canonical = match found.canonicalize() {
                Ok(c) => c,
                Err(e) => {
                    result.node_errors.push(NodeError {
                        path: found.clone(),
                        error: format!("cannot canonicalize: {e}"),
                    });
                    continue;
                }
            };

            if visited.insert(canonical.clone()) {
                result.libraries.push(Library {
                    path: canonical.clone(),
                    name: record.name,
                    found_in: found.parent().map(Path::to_path_buf).unwrap_or_default(),
                });
                queue.push_back(canonical);
            }
        }
    }

    debug!(
        "resolved {} libraries, {} unresolved, {} node errors",
        result.libraries.len(),
        result.unresolved.len(),
        result.node_errors.len()
    );
    Ok(result)
}

/// Resolve the default tool-backed source.
pub fn resolve_with_tools(
    root: &Path,
    config: &ResolveConfig,
    cancel: &CancelToken,
) -> Result<Resolution> {
    let source = ToolBackendSource {
        timeout: config.tool_timeout(),
    };
    resolve(root, &source, config, cancel)
}

/// Resolve several independent roots in parallel.
///
/// Each root gets its own private visited set; results come back in input
/// order.
pub fn resolve_roots<S: DependencySource>(
    roots: &[PathBuf],
    source: &S,
    config: &ResolveConfig,
    cancel: &CancelToken,
) -> Vec<Result<Resolution>> {
    roots
        .par_iter()
        .map(|root| resolve(root, source, config, cancel))
        .collect()
}

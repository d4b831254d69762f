//! Library search paths and on-disk name resolution.
//!
//! A [`SearchPathSet`] is ordered and deduplicated; order is resolution
//! precedence. Each binary gets its own set, composed from its embedded
//! runtime-search-path entries (with `$ORIGIN` expanded), caller-supplied
//! extra directories, and the system default library directories.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which side wins when a binary's own runpath entries and caller-supplied
/// extra directories disagree.
///
/// `BinaryPathsFirst` follows deployment-tool convention (the loader honors
/// the binary's own record first) and is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOrder {
    #[default]
    BinaryPathsFirst,
    ExtraPathsFirst,
}

/// Ordered, deduplicated sequence of directories to search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPathSet {
    dirs: Vec<PathBuf>,
}

impl SearchPathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a directory, keeping the first occurrence on duplicates.
    pub fn push(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.dirs.contains(&dir) {
            self.dirs.push(dir);
        }
    }

    pub fn extend<I, P>(&mut self, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for dir in dirs {
            self.push(dir);
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

/// A dependency name that could not be located, carried forward as a
/// non-fatal finding together with exactly the directories that were tried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedDependency {
    pub name: String,
    pub searched: Vec<PathBuf>,
}

/// Compose the search-path set for one binary.
///
/// `runpaths` are the binary's own embedded entries; `$ORIGIN` (and
/// `${ORIGIN}`) expand to the binary's directory. System defaults always come
/// last when enabled.
pub fn search_paths_for(
    binary: &Path,
    runpaths: &[PathBuf],
    extra: &[PathBuf],
    order: SearchOrder,
    include_system: bool,
) -> SearchPathSet {
    let mut set = SearchPathSet::new();
    let own = || {
        runpaths
            .iter()
            .map(|p| expand_origin(p, binary))
            .collect::<Vec<_>>()
    };

    match order {
        SearchOrder::BinaryPathsFirst => {
            set.extend(own());
            set.extend(extra.iter().cloned());
        }
        SearchOrder::ExtraPathsFirst => {
            set.extend(extra.iter().cloned());
            set.extend(own());
        }
    }
    if include_system {
        set.extend(system_library_dirs());
    }
    set
}

fn expand_origin(runpath: &Path, binary: &Path) -> PathBuf {
    let origin = binary
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let text = runpath.to_string_lossy();
    if text.contains("$ORIGIN") || text.contains("${ORIGIN}") {
        let origin = origin.to_string_lossy();
        PathBuf::from(
            text.replace("${ORIGIN}", &origin)
                .replace("$ORIGIN", &origin),
        )
    } else {
        runpath.to_path_buf()
    }
}

/// System default library directories.
///
/// On Linux this reads `/etc/ld.so.conf` (following `include` lines one
/// level of glob deep) and appends the conventional multilib directories as
/// a fallback.
pub fn system_library_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if cfg!(target_os = "linux") {
        collect_ld_so_conf(Path::new("/etc/ld.so.conf"), 0, &mut dirs);
    }
    for fallback in ["/lib", "/usr/lib", "/lib64", "/usr/lib64", "/usr/local/lib"] {
        let p = PathBuf::from(fallback);
        if !dirs.contains(&p) {
            dirs.push(p);
        }
    }
    dirs
}

fn collect_ld_so_conf(path: &Path, depth: usize, dirs: &mut Vec<PathBuf>) {
    // Bounded include depth; ld.so.conf trees are shallow in practice.
    if depth > 4 {
        return;
    }
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if let Some(pattern) = line.strip_prefix("include ") {
            for included in expand_include(pattern.trim()) {
                collect_ld_so_conf(&included, depth + 1, dirs);
            }
        } else {
            let dir = PathBuf::from(line);
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
    }
}

/// Expand an `include` pattern of the shape `<dir>/*.<ext>` (the only form
/// glibc ships). Matches are sorted for deterministic precedence.
fn expand_include(pattern: &str) -> Vec<PathBuf> {
    let path = Path::new(pattern);
    let Some(file_pattern) = path.file_name().and_then(|f| f.to_str()) else {
        return Vec::new();
    };
    if !file_pattern.contains('*') {
        return vec![path.to_path_buf()];
    }
    let Some(parent) = path.parent() else {
        return Vec::new();
    };
    let suffix = file_pattern.trim_start_matches('*');
    let Ok(entries) = fs::read_dir(parent) else {
        return Vec::new();
    };
    let mut matches: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|f| f.to_str())
                .is_some_and(|f| f.ends_with(suffix))
        })
        .collect();
    matches.sort();
    matches
}

/// Locate `name` in `paths`, first directory wins.
///
/// Within a directory an exact filename match is preferred; failing that, a
/// versioned-suffix match (`libfoo.so` accepts `libfoo.so.2`) is accepted,
/// highest numeric version first. The widening is deliberate: build trees
/// request unversioned link names while target systems often ship only the
/// versioned files.
pub fn find_library(
    name: &str,
    paths: &SearchPathSet,
) -> std::result::Result<PathBuf, UnresolvedDependency> {
    for dir in paths.dirs() {
        let exact = dir.join(name);
        if exact.is_file() {
            return Ok(exact);
        }
        if let Some(versioned) = best_versioned_match(dir, name) {
            debug!("'{name}' matched versioned '{}'", versioned.display());
            return Ok(versioned);
        }
    }
    Err(UnresolvedDependency {
        name: name.to_string(),
        searched: paths.dirs().to_vec(),
    })
}

/// Highest-versioned `<name>.N[.N...]` file in `dir`, if any.
fn best_versioned_match(dir: &Path, name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut best: Option<(Vec<u64>, PathBuf)> = None;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let Some(version) = version_suffix(file_name, name) else {
            continue;
        };
        if !entry.path().is_file() {
            continue;
        }
        match &best {
            Some((current, _)) if *current >= version => {}
            _ => best = Some((version, entry.path())),
        }
    }
    best.map(|(_, path)| path)
}

/// `libfoo.so.1.2` against request `libfoo.so` -> `Some([1, 2])`.
fn version_suffix(file_name: &str, requested: &str) -> Option<Vec<u64>> {
    let rest = file_name.strip_prefix(requested)?.strip_prefix('.')?;
    let parts: Option<Vec<u64>> = rest.split('.').map(|p| p.parse().ok()).collect();
    let parts = parts?;
    if parts.is_empty() {
        None
    } else {
        Some(parts)
    }
}

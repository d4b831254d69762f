//! Copy-plan construction and destination uniqueness.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::graph::Library;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Executable,
    Library,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyEntry {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct CopyPlan {
    pub dest_root: PathBuf,
    pub entries: Vec<CopyEntry>,
}

/// Build the ordered copy plan: executables at the destination root,
/// libraries under `lib/`.
///
/// Destination names must be unique within the plan; with
/// `case_insensitive` set the check also rejects names that collide only by
/// case (deploying to FAT/NTFS). The uniqueness check runs up front so the
/// single-writer-per-destination discipline holds structurally once copying
/// starts.
pub fn build_plan(
    executables: &[PathBuf],
    libraries: &[Library],
    dest_root: &Path,
    case_insensitive: bool,
) -> Result<CopyPlan> {
    let mut entries = Vec::with_capacity(executables.len() + libraries.len());
    let mut seen: HashSet<String> = HashSet::new();

    let mut claim = |dest: &Path| -> Result<()> {
        let key = dest.to_string_lossy();
        let key = if case_insensitive {
            key.to_lowercase()
        } else {
            key.into_owned()
        };
        if !seen.insert(key) {
            return Err(Error::DuplicateDestination {
                name: dest.to_string_lossy().into_owned(),
            });
        }
        Ok(())
    };

    for exe in executables {
        let file_name = exe
            .file_name()
            .ok_or_else(|| Error::FileNotFound(exe.clone()))?;
        let dest = dest_root.join(file_name);
        claim(&dest)?;
        entries.push(CopyEntry {
            source: exe.clone(),
            dest,
            kind: EntryKind::Executable,
        });
    }

    let lib_dir = dest_root.join("lib");
    for lib in libraries {
        let file_name = lib
            .path
            .file_name()
            .ok_or_else(|| Error::FileNotFound(lib.path.clone()))?;
        let dest = lib_dir.join(file_name);
        claim(&dest)?;
        entries.push(CopyEntry {
            source: lib.path.clone(),
            dest,
            kind: EntryKind::Library,
        });
    }

    Ok(CopyPlan {
        dest_root: dest_root.to_path_buf(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lib(path: &str) -> Library {
        Library {
            path: PathBuf::from(path),
            name: Path::new(path)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned(),
            found_in: Path::new(path).parent().unwrap().to_path_buf(),
        }
    }

    #[test]
    fn test_plan_layout() {
        let plan = build_plan(
            &[PathBuf::from("/build/app")],
            &[lib("/usr/lib/libz.so.1"), lib("/usr/lib/libssl.so.3")],
            Path::new("/deploy"),
            false,
        )
        .unwrap();

        assert_eq!(plan.entries.len(), 3);
        assert_eq!(plan.entries[0].dest, PathBuf::from("/deploy/app"));
        assert_eq!(plan.entries[0].kind, EntryKind::Executable);
        assert_eq!(plan.entries[1].dest, PathBuf::from("/deploy/lib/libz.so.1"));
        assert_eq!(plan.entries[1].kind, EntryKind::Library);
    }

    #[test]
    fn test_plan_rejects_duplicate_names() {
        let err = build_plan(
            &[],
            &[lib("/usr/lib/libz.so.1"), lib("/opt/other/libz.so.1")],
            Path::new("/deploy"),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateDestination { .. }));
    }

    #[test]
    fn test_plan_case_insensitive_collision() {
        let libs = [lib("/a/LibFoo.dll"), lib("/b/libfoo.dll")];

        assert!(build_plan(&[], &libs, Path::new("/deploy"), false).is_ok());
        let err = build_plan(&[], &libs, Path::new("/deploy"), true).unwrap_err();
        assert!(matches!(err, Error::DuplicateDestination { .. }));
    }
}

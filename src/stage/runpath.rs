//! Runtime search-path rewriting for staged files.
//!
//! A deployed tree must not lean on system library directories, so each
//! staged ELF file gets its runpath record rewritten to the relative layout:
//! `$ORIGIN/lib` for executables at the root, `$ORIGIN` for libraries
//! already sitting in `lib/`. The rewrite goes through `patchelf`; files
//! that are not ELF are left alone.

use log::debug;
use std::path::Path;
use std::time::Duration;

use crate::format::{detect_format, BinaryFormat};
use crate::process;
use crate::stage::plan::EntryKind;
use crate::{Error, Result};

const PATCHELF_TIMEOUT: Duration = Duration::from_secs(30);

/// Runpath value for a staged entry, relative to its own location.
pub fn runpath_for(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Executable => "$ORIGIN/lib",
        EntryKind::Library => "$ORIGIN",
    }
}

/// Rewrite the runpath of `file` if it is an ELF binary; other formats are
/// skipped without error.
pub fn rewrite_if_applicable(file: &Path, kind: EntryKind) -> Result<()> {
    match detect_format(file) {
        Ok(detected) if detected.format == BinaryFormat::Elf => {}
        _ => {
            debug!("{} is not ELF, runpath left alone", file.display());
            return Ok(());
        }
    }
    set_runpath(file, runpath_for(kind))
}

/// `patchelf --set-rpath <runpath> <file>`.
pub fn set_runpath(file: &Path, runpath: &str) -> Result<()> {
    let file_arg = file.display().to_string();
    let output = process::run(
        "patchelf",
        ["--set-rpath", runpath, file_arg.as_str()],
        PATCHELF_TIMEOUT,
    )?;
    if !output.success() {
        return Err(Error::ToolReportedError {
            tool: "patchelf".to_string(),
            exit_code: output.exit_code,
            excerpt: output.excerpt(),
        });
    }
    debug!("set runpath of {} to {runpath}", file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_runpath_for_layout() {
        assert_eq!(runpath_for(EntryKind::Executable), "$ORIGIN/lib");
        assert_eq!(runpath_for(EntryKind::Library), "$ORIGIN");
    }

    #[test]
    fn test_non_elf_is_skipped() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("notes.txt");
        fs::write(&file, "not a binary").unwrap();
        // No patchelf invocation, no error.
        rewrite_if_applicable(&file, EntryKind::Library).unwrap();
    }
}

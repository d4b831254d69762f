//! Verified, atomic file staging.
//!
//! Each entry is written to a temp file in the destination directory and
//! atomically renamed into place, so a concurrent reader only ever observes
//! the old complete file or the new complete file. Verification re-hashes
//! the destination after the rename and removes it on mismatch.

use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use crate::cancel::CancelToken;
use crate::config::StageConfig;
use crate::stage::plan::{CopyEntry, CopyPlan, EntryKind};
use crate::stage::runpath;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyOutcome {
    Copied,
    SkippedExists,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryResult {
    pub source: std::path::PathBuf,
    pub dest: std::path::PathBuf,
    pub outcome: CopyOutcome,
}

/// Aggregate staging result; the per-entry list is always complete for the
/// entries that were attempted.
#[derive(Debug, Default, Clone, Serialize)]
pub struct StageReport {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub entries: Vec<EntryResult>,
}

impl StageReport {
    fn record(&mut self, result: EntryResult) {
        match result.outcome {
            CopyOutcome::Copied => self.copied += 1,
            CopyOutcome::SkippedExists => self.skipped += 1,
            CopyOutcome::Failed { .. } => self.failed += 1,
        }
        self.entries.push(result);
    }
}

/// Execute a copy plan.
///
/// Per-file failures are captured in the report by default; with
/// `stop_on_first_error` the first failure is returned as the run's error
/// and no further entries are attempted.
pub fn stage(plan: &CopyPlan, config: &StageConfig, cancel: &CancelToken) -> Result<StageReport> {
    let mut report = StageReport::default();

    if config.parallel && !config.stop_on_first_error {
        let results: Vec<EntryResult> = plan
            .entries
            .par_iter()
            .map(|entry| run_entry(entry, config, cancel))
            .collect::<Result<Vec<_>>>()?;
        for result in results {
            report.record(result);
        }
        return Ok(report);
    }

    for entry in &plan.entries {
        cancel.check()?;
        match copy_entry(entry, config) {
            Ok(outcome) => report.record(EntryResult {
                source: entry.source.clone(),
                dest: entry.dest.clone(),
                outcome,
            }),
            Err(e) if config.stop_on_first_error => return Err(e),
            Err(e) => {
                warn!("staging {} failed: {e}", entry.dest.display());
                report.record(EntryResult {
                    source: entry.source.clone(),
                    dest: entry.dest.clone(),
                    outcome: CopyOutcome::Failed {
                        reason: e.to_string(),
                    },
                });
            }
        }
    }
    Ok(report)
}

/// One entry; classified failures become `Failed` outcomes, cancellation
/// propagates as an error.
fn run_entry(entry: &CopyEntry, config: &StageConfig, cancel: &CancelToken) -> Result<EntryResult> {
    cancel.check()?;
    let outcome = match copy_entry(entry, config) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("staging {} failed: {e}", entry.dest.display());
            CopyOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };
    Ok(EntryResult {
        source: entry.source.clone(),
        dest: entry.dest.clone(),
        outcome,
    })
}

fn copy_entry(entry: &CopyEntry, config: &StageConfig) -> Result<CopyOutcome> {
    let dest = &entry.dest;
    let parent = dest.parent().ok_or_else(|| Error::DirectoryCreateFailed {
        path: dest.clone(),
        reason: "destination has no parent directory".to_string(),
    })?;

    if parent.exists() && !parent.is_dir() {
        return Err(Error::DirectoryCreateFailed {
            path: parent.to_path_buf(),
            reason: "path exists and is not a directory".to_string(),
        });
    }
    fs::create_dir_all(parent).map_err(|e| Error::DirectoryCreateFailed {
        path: parent.to_path_buf(),
        reason: e.to_string(),
    })?;

    if dest.exists() && !config.overwrite {
        debug!("{} exists, skipping", dest.display());
        return Ok(CopyOutcome::SkippedExists);
    }

    // Temp file in the destination directory keeps the final rename atomic
    // (same filesystem) and cleans itself up on any error path.
    let tmp = tempfile::Builder::new()
        .prefix(".depstage-")
        .tempfile_in(parent)
        .map_err(|e| Error::CopyIo {
            src: entry.source.clone(),
            dest: dest.clone(),
            source: e,
        })?;

    let mut src_file = File::open(&entry.source).map_err(|e| Error::CopyIo {
        src: entry.source.clone(),
        dest: dest.clone(),
        source: e,
    })?;
    std::io::copy(&mut src_file, &mut tmp.as_file()).map_err(|e| Error::CopyIo {
        src: entry.source.clone(),
        dest: dest.clone(),
        source: e,
    })?;

    // Preserve the source permission bits (notably exec).
    if let Ok(metadata) = fs::metadata(&entry.source) {
        let _ = fs::set_permissions(tmp.path(), metadata.permissions());
    }

    tmp.persist(dest).map_err(|e| Error::CopyIo {
        src: entry.source.clone(),
        dest: dest.clone(),
        source: e.error,
    })?;

    if config.verify {
        verify_copy(&entry.source, dest)?;
    }

    if config.rewrite_runpath {
        runpath::rewrite_if_applicable(dest, entry.kind)?;
    }

    debug!("staged {}", dest.display());
    Ok(CopyOutcome::Copied)
}

/// Re-hash the destination and compare against the source. On mismatch the
/// destination is removed so a corrupt copy never survives in the tree.
fn verify_copy(src: &Path, dest: &Path) -> Result<()> {
    let src_hash = sha256_file(src)?;
    let dest_hash = sha256_file(dest)?;
    if src_hash != dest_hash {
        let _ = fs::remove_file(dest);
        return Err(Error::VerificationMismatch {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
        });
    }
    Ok(())
}

fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| Error::NotReadable {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1024 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

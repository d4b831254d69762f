//! Parsers for introspection tool output.
//!
//! Both parsers share one contract: line-oriented, tolerant of formatting
//! drift between tool versions. Unrecognized lines are skipped; a parse only
//! fails ([`crate::Error::UnparsableOutput`]) when non-empty input yields
//! zero recognized lines at all. "No dependencies" from well-formed output
//! (a statically linked binary, say) is a valid empty result.

pub mod ldd;
pub mod objdump;

use std::path::PathBuf;

/// One dependency as reported by a tool.
///
/// `hint` carries the absolute path when the tool already resolved the name
/// itself (ldd does, objdump does not); bare names go through
/// [`crate::search::find_library`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepRecord {
    pub name: String,
    pub hint: Option<PathBuf>,
}

impl DepRecord {
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hint: None,
        }
    }

    pub fn resolved(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            hint: Some(path.into()),
        }
    }
}

/// Everything extracted from one tool invocation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedDeps {
    pub records: Vec<DepRecord>,
    /// Embedded runtime-search-path entries (RPATH/RUNPATH), unexpanded.
    pub runpaths: Vec<PathBuf>,
    /// Format tag printed by the tool, e.g. `elf64-x86-64` (objdump only).
    pub file_format: Option<String>,
}

//! Parser for ldd output.
//!
//! Grammar (line-oriented):
//!
//! ```text
//! libfoo.so.1 => /usr/lib/libfoo.so.1 (0x00007f...)   resolved dependency
//! libbar.so.2 => not found                            needed but not found
//! linux-vdso.so.1 (0x00007ffd...)                     virtual, no file
//! /lib64/ld-linux-x86-64.so.2 (0x00007f...)           loader, pre-resolved
//! statically linked                                   no dynamic deps
//! ```

use std::path::Path;

use super::{DepRecord, ParsedDeps};
use crate::{Error, Result};

/// Parse raw ldd output for `binary` (the path is only used in errors).
pub fn parse(output: &str, binary: &Path) -> Result<ParsedDeps> {
    let mut deps = ParsedDeps::default();
    let mut recognized = 0usize;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((name, target)) = line.split_once("=>") {
            let name = name.trim();
            let target = target.trim();
            if name.is_empty() {
                continue;
            }
            recognized += 1;
            if target.starts_with("not found") {
                deps.records.push(DepRecord::bare(name));
            } else if let Some(path) = first_absolute_token(target) {
                deps.records.push(DepRecord::resolved(name, path));
            }
            // "name => (0x...)": virtual entry, recognized but no record.
            continue;
        }

        // Loader line: an absolute path followed by a load address. Requiring
        // the address token keeps diagnostics like "/usr/bin/app: error while
        // loading ..." from being taken for a pre-resolved entry.
        if line.starts_with('/') && line.contains("(0x") {
            if let Some(path) = first_absolute_token(line) {
                recognized += 1;
                let name = Path::new(&path)
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.clone());
                deps.records.push(DepRecord::resolved(name, path));
                continue;
            }
        }

        // Virtual entries like "linux-vdso.so.1 (0x...)" have no backing file.
        if line.contains("(0x") && !line.contains("=>") {
            recognized += 1;
            continue;
        }

        if line.contains("statically linked") || line.contains("not a dynamic executable") {
            recognized += 1;
            continue;
        }
        // Anything else is formatting drift; skip it.
    }

    if recognized == 0 && !output.trim().is_empty() {
        return Err(Error::UnparsableOutput {
            tool: "ldd".to_string(),
            path: binary.to_path_buf(),
        });
    }

    Ok(deps)
}

fn first_absolute_token(text: &str) -> Option<String> {
    text.split_whitespace()
        .next()
        .filter(|token| token.starts_with('/') && !token.ends_with(':'))
        .map(|token| token.to_string())
}

//! Parser for `objdump -p` output.
//!
//! Extracts `NEEDED` records (bare names, never pre-resolved), the
//! `RPATH`/`RUNPATH` dynamic entries, and the `file format` tag line. The
//! tag line is not anchored on the English prefix since localized objdump
//! builds translate it ("format de fichier elf64-x86-64").
//!
//! ```text
//! /usr/bin/app:     file format elf64-x86-64
//!
//! Dynamic Section:
//!   NEEDED               libssl.so.3
//!   NEEDED               libc.so.6
//!   RUNPATH              $ORIGIN/../lib:/opt/vendor/lib
//! ```

use std::path::{Path, PathBuf};

use super::{DepRecord, ParsedDeps};
use crate::{Error, Result};

/// Parse raw `objdump -p` output for `binary` (the path is only used in
/// errors).
pub fn parse(output: &str, binary: &Path) -> Result<ParsedDeps> {
    let mut deps = ParsedDeps::default();
    let mut recognized = 0usize;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = keyword_value(line, "NEEDED") {
            recognized += 1;
            deps.records.push(DepRecord::bare(name));
            continue;
        }

        if let Some(paths) = keyword_value(line, "RUNPATH").or_else(|| keyword_value(line, "RPATH"))
        {
            recognized += 1;
            deps.runpaths
                .extend(paths.split(':').filter(|p| !p.is_empty()).map(PathBuf::from));
            continue;
        }

        if let Some(tag) = file_format_tag(line) {
            recognized += 1;
            deps.file_format = Some(tag);
            continue;
        }

        // PE imports appear in the import tables, not the dynamic section.
        if let Some(name) = line.strip_prefix("DLL Name:") {
            let name = name.trim();
            if !name.is_empty() {
                recognized += 1;
                deps.records.push(DepRecord::bare(name));
            }
            continue;
        }

        if line.starts_with("Dynamic Section") {
            recognized += 1;
            continue;
        }

        // objdump reports a library it could not open as a diagnostic rather
        // than a NEEDED record; keep the name as an unresolved record.
        if let Some(rest) = line.split("could not find ").nth(1) {
            let name = rest.trim_matches(|c: char| c == '\'' || c == '"' || c == ':').trim();
            if !name.is_empty() {
                recognized += 1;
                deps.records.push(DepRecord::bare(name));
            }
            continue;
        }
        // Section tables, version references and other private-header chatter
        // are skipped.
    }

    if recognized == 0 && !output.trim().is_empty() {
        return Err(Error::UnparsableOutput {
            tool: "objdump".to_string(),
            path: binary.to_path_buf(),
        });
    }

    Ok(deps)
}

fn keyword_value(line: &str, keyword: &str) -> Option<String> {
    let rest = line.strip_prefix(keyword)?;
    // Must be the keyword column, not a prefix of a longer word.
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let value = rest.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Extract the format tag from a "file format <tag>" line, tolerating
/// localized prefixes by only requiring the word "format" and a plausible
/// tag as the last token.
fn file_format_tag(line: &str) -> Option<String> {
    if !line.contains("format") {
        return None;
    }
    let tag = line.split_whitespace().last()?;
    let plausible = ["elf", "pei-", "pe-", "a.out", "mach-o"]
        .iter()
        .any(|prefix| tag.starts_with(prefix));
    if plausible {
        Some(tag.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(output: &str) -> ParsedDeps {
        parse(output, Path::new("/usr/bin/app")).unwrap()
    }

    #[test]
    fn test_parse_needed_records() {
        let output = "\
/usr/bin/app:     file format elf64-x86-64

Dynamic Section:
  NEEDED               libssl.so.3
  NEEDED               libc.so.6
  SONAME               libapp.so.1
  INIT                 0x0000000000005000
";
        let deps = parse_ok(output);
        assert_eq!(
            deps.records,
            vec![DepRecord::bare("libssl.so.3"), DepRecord::bare("libc.so.6")]
        );
        assert_eq!(deps.file_format.as_deref(), Some("elf64-x86-64"));
    }

    #[test]
    fn test_parse_runpath() {
        let output = "\
Dynamic Section:
  NEEDED               libfoo.so.1
  RUNPATH              $ORIGIN/../lib:/opt/vendor/lib
";
        let deps = parse_ok(output);
        assert_eq!(
            deps.runpaths,
            vec![PathBuf::from("$ORIGIN/../lib"), PathBuf::from("/opt/vendor/lib")]
        );
    }

    #[test]
    fn test_parse_rpath() {
        let deps = parse_ok("Dynamic Section:\n  RPATH                /usr/local/app/lib\n");
        assert_eq!(deps.runpaths, vec![PathBuf::from("/usr/local/app/lib")]);
        assert!(deps.records.is_empty());
    }

    #[test]
    fn test_parse_localized_format_line() {
        let deps = parse_ok("app.exe:  format de fichier pei-x86-64\n");
        assert_eq!(deps.file_format.as_deref(), Some("pei-x86-64"));
        assert!(deps.records.is_empty());
    }

    #[test]
    fn test_parse_pe_import_tables() {
        let output = "\
app.exe:     file format pei-x86-64

The Import Tables (interpreted .idata section contents)
 vma:            Hint    Time      Forward  DLL       First
\tDLL Name: KERNEL32.dll
\tvma:  Hint/Ord Member-Name Bound-To
\tDLL Name: libstdc++-6.dll
";
        let deps = parse_ok(output);
        assert_eq!(
            deps.records,
            vec![
                DepRecord::bare("KERNEL32.dll"),
                DepRecord::bare("libstdc++-6.dll")
            ]
        );
    }

    #[test]
    fn test_parse_garbage_fails() {
        let err = parse("no such thing here\nat all", Path::new("/tmp/x")).unwrap_err();
        assert!(matches!(err, Error::UnparsableOutput { .. }));
    }

    #[test]
    fn test_parse_format_only_is_valid_empty() {
        // A binary with no dynamic section still prints its format line.
        let deps = parse_ok("/usr/bin/static-app:     file format elf64-x86-64\n");
        assert!(deps.records.is_empty());
    }
}

//! Introspection tool adapters and backend selection.
//!
//! Each tool gets a fixed argument template applied to one binary path. The
//! registry is a static ordered list consulted per detected format; the
//! first entry whose tool both supports the format and exists on the host
//! wins. No dynamic dispatch, no plugin loading.

use log::debug;
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use crate::format::{BinaryFormat, DetectedFormat};
use crate::parse::{self, ParsedDeps};
use crate::process::{self, RunOutput};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ldd,
    Objdump,
}

impl Tool {
    pub fn program(&self) -> &'static str {
        match self {
            Tool::Ldd => "ldd",
            Tool::Objdump => "objdump",
        }
    }

    fn args(&self) -> &'static [&'static str] {
        match self {
            Tool::Ldd => &[],
            Tool::Objdump => &["-p"],
        }
    }

    pub fn is_available(&self) -> bool {
        which::which(self.program()).is_ok()
    }

    /// Invoke the tool against one binary and capture its raw output.
    ///
    /// Diagnostic text on a successful exit (ldd "not found" lines, say) is
    /// kept for the parser, never discarded. The binary path is passed
    /// through as raw OS bytes; no lossy UTF-8 conversion.
    pub fn invoke(&self, binary: &Path, timeout: Duration) -> Result<RunOutput> {
        debug!("running {} on {}", self.program(), binary.display());
        let mut args: Vec<OsString> = self.args().iter().map(|a| OsString::from(*a)).collect();
        args.push(binary.as_os_str().to_os_string());
        process::run(self.program(), args, timeout)
    }

    /// Invoke and parse in one step.
    ///
    /// A non-zero exit with parsable partial output is still used; the exit
    /// status becomes [`Error::ToolReportedError`] when nothing could be
    /// extracted. A failed tool that printed nothing must not pass for a
    /// binary with no dependencies.
    pub fn dependencies(&self, binary: &Path, timeout: Duration) -> Result<ParsedDeps> {
        let output = self.invoke(binary, timeout)?;
        let parsed = match self {
            Tool::Ldd => parse::ldd::parse(&output.stdout, binary),
            Tool::Objdump => parse::objdump::parse(&output.stdout, binary),
        };
        match parsed {
            Ok(deps) if !output.success() && deps.records.is_empty() => {
                Err(self.reported_error(&output))
            }
            Ok(deps) => Ok(deps),
            Err(parse_err) if output.success() => Err(parse_err),
            Err(_) => Err(self.reported_error(&output)),
        }
    }

    fn reported_error(&self, output: &RunOutput) -> Error {
        Error::ToolReportedError {
            tool: self.program().to_string(),
            exit_code: output.exit_code,
            excerpt: output.excerpt(),
        }
    }
}

/// One registry entry: a tool and the formats it can introspect.
pub struct Backend {
    pub tool: Tool,
    supports: fn(BinaryFormat) -> bool,
}

impl Backend {
    pub fn supports(&self, format: BinaryFormat) -> bool {
        (self.supports)(format)
    }
}

/// Ordered backend registry. ldd is preferred for ELF binaries (it resolves
/// paths itself through the host loader); objdump covers ELF and PE and is
/// the cross-inspection fallback.
pub static BACKENDS: &[Backend] = &[
    Backend {
        tool: Tool::Ldd,
        supports: |f| matches!(f, BinaryFormat::Elf),
    },
    Backend {
        tool: Tool::Objdump,
        supports: |f| matches!(f, BinaryFormat::Elf | BinaryFormat::Pe),
    },
];

/// Pick the first installed backend that supports `detected`.
pub fn select_backend(detected: DetectedFormat) -> Result<&'static Backend> {
    let mut candidates = Vec::new();
    for backend in BACKENDS {
        if !backend.supports(detected.format) {
            continue;
        }
        if backend.tool.is_available() {
            return Ok(backend);
        }
        candidates.push(backend.tool.program());
    }
    Err(Error::NoBackendAvailable {
        format: detected.to_string(),
        tools: if candidates.is_empty() {
            "none registered".to_string()
        } else {
            candidates.join(", ")
        },
    })
}

/// Windows system libraries that are expected on any target host and must
/// not be redistributed. Matched case-insensitively against the DLL stem.
pub static WINDOWS_SYSTEM_DLLS: &[&str] = &[
    "Hal", "NTDLL", "KERNEL32", "GDI32", "USER32", "COMCTL32", "WS2_32", "ADVAPI32", "NETAPI32",
    "SHSCRAP", "WINMM", "MSVCRT", "mpr", "ole32", "shell32", "version", "crypt32", "dnsapi",
    "iphlpapi", "opengl32", "UxTheme", "dwmapi", "imm32", "oleaut32", "Secur32", "odbc32",
    "shfolder", "wsock32",
];

/// True for names like `KERNEL32.dll` that the exclusion list covers.
pub fn is_windows_system_dll(name: &str) -> bool {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    WINDOWS_SYSTEM_DLLS
        .iter()
        .any(|excluded| excluded.eq_ignore_ascii_case(stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // Tests that point PATH at a fake tool must not interleave.
    static PATH_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    /// Put a fake tool script first on PATH for the duration of the test.
    fn with_fake_tool(name: &str, script: &str, test: impl FnOnce(&TempDir)) {
        use std::os::unix::fs::PermissionsExt;

        let _guard = PATH_LOCK.lock().unwrap();
        let temp = TempDir::new().unwrap();
        let tool_path = temp.path().join(name);
        fs::write(&tool_path, script).unwrap();
        fs::set_permissions(&tool_path, fs::Permissions::from_mode(0o755)).unwrap();

        let old_path = std::env::var_os("PATH").unwrap_or_default();
        let mut paths = vec![temp.path().to_path_buf()];
        paths.extend(std::env::split_paths(&old_path));
        std::env::set_var("PATH", std::env::join_paths(paths).unwrap());

        test(&temp);

        std::env::set_var("PATH", old_path);
    }

    #[test]
    fn test_failed_tool_with_no_output_is_reported() {
        with_fake_tool("ldd", "#!/bin/sh\nexit 1\n", |temp| {
            let binary = temp.path().join("app");
            fs::write(&binary, "not really a binary").unwrap();

            let err = Tool::Ldd
                .dependencies(&binary, Duration::from_secs(10))
                .unwrap_err();
            assert!(matches!(
                err,
                Error::ToolReportedError { exit_code: 1, .. }
            ));
        });
    }

    #[test]
    fn test_failed_tool_with_diagnostic_text_is_reported() {
        with_fake_tool(
            "ldd",
            "#!/bin/sh\necho 'app: not a dynamic executable' >&2\nexit 1\n",
            |temp| {
                let binary = temp.path().join("app");
                fs::write(&binary, "plain file").unwrap();

                let err = Tool::Ldd
                    .dependencies(&binary, Duration::from_secs(10))
                    .unwrap_err();
                let Error::ToolReportedError { excerpt, .. } = err else {
                    panic!("expected ToolReportedError, got {err:?}");
                };
                assert!(excerpt.contains("not a dynamic executable"));
            },
        );
    }

    #[test]
    fn test_partial_output_from_failed_tool_is_still_used() {
        with_fake_tool(
            "ldd",
            "#!/bin/sh\necho '\tlibc.so.6 => /lib/libc.so.6 (0x1000)'\nexit 1\n",
            |temp| {
                let binary = temp.path().join("app");
                fs::write(&binary, "x").unwrap();

                let deps = Tool::Ldd
                    .dependencies(&binary, Duration::from_secs(10))
                    .unwrap();
                assert_eq!(deps.records.len(), 1);
                assert_eq!(deps.records[0].name, "libc.so.6");
            },
        );
    }

    #[test]
    fn test_registry_prefers_ldd_for_elf() {
        let elf = BACKENDS
            .iter()
            .find(|b| b.supports(BinaryFormat::Elf))
            .unwrap();
        assert_eq!(elf.tool, Tool::Ldd);
    }

    #[test]
    fn test_no_backend_for_macho() {
        let detected = DetectedFormat {
            format: BinaryFormat::MachO,
            bits: 64,
        };
        assert!(matches!(
            select_backend(detected),
            Err(Error::NoBackendAvailable { .. })
        ));
    }

    #[test]
    fn test_pe_uses_objdump() {
        assert!(!BACKENDS[0].supports(BinaryFormat::Pe));
        assert!(BACKENDS[1].supports(BinaryFormat::Pe));
    }

    #[test]
    fn test_windows_system_dll_matching() {
        assert!(is_windows_system_dll("KERNEL32.dll"));
        assert!(is_windows_system_dll("kernel32.DLL"));
        assert!(is_windows_system_dll("ntdll.dll"));
        assert!(!is_windows_system_dll("libstdc++-6.dll"));
        assert!(!is_windows_system_dll("Qt5Core.dll"));
    }
}

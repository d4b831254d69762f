//! Binary format detection from file headers.
//!
//! Reads just enough of the header to classify the file; the binary is never
//! executed. The detected format selects which introspection backend is
//! usable (see [`crate::tool`]).

use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::{Error, Result};

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BinaryFormat {
    Elf,
    Pe,
    MachO,
}

impl fmt::Display for BinaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryFormat::Elf => write!(f, "ELF"),
            BinaryFormat::Pe => write!(f, "PE"),
            BinaryFormat::MachO => write!(f, "Mach-O"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectedFormat {
    pub format: BinaryFormat,
    /// Pointer width: 32 or 64.
    pub bits: u8,
}

impl fmt::Display for DetectedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}-bit)", self.format, self.bits)
    }
}

/// Classify a file by its header magic.
///
/// Fat Mach-O archives and anything else without a recognized signature fail
/// with [`Error::UnsupportedFormat`].
pub fn detect_format(path: &Path) -> Result<DetectedFormat> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let mut file = File::open(path).map_err(|e| Error::NotReadable {
        path: path.to_path_buf(),
        source: e,
    })?;

    // 64 bytes covers the ELF ident, the DOS header, and the Mach-O magic.
    let mut header = [0u8; 64];
    let n = read_up_to(&mut file, &mut header).map_err(|e| Error::NotReadable {
        path: path.to_path_buf(),
        source: e,
    })?;
    let header = &header[..n];

    if let Some(detected) = detect_elf(header) {
        return Ok(detected);
    }
    if let Some(detected) = detect_macho(header) {
        return Ok(detected);
    }
    if let Some(detected) = detect_pe(header, &mut file)? {
        return Ok(detected);
    }

    Err(Error::UnsupportedFormat(path.to_path_buf()))
}

fn detect_elf(header: &[u8]) -> Option<DetectedFormat> {
    if header.len() < 5 || header[..4] != ELF_MAGIC {
        return None;
    }
    // EI_CLASS: 1 = ELFCLASS32, 2 = ELFCLASS64
    let bits = match header[4] {
        1 => 32,
        2 => 64,
        _ => return None,
    };
    Some(DetectedFormat {
        format: BinaryFormat::Elf,
        bits,
    })
}

fn detect_macho(header: &[u8]) -> Option<DetectedFormat> {
    if header.len() < 4 {
        return None;
    }
    let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let bits = match magic {
        0xfeed_face | 0xcefa_edfe => 32,
        0xfeed_facf | 0xcffa_edfe => 64,
        _ => return None,
    };
    Some(DetectedFormat {
        format: BinaryFormat::MachO,
        bits,
    })
}

/// PE: DOS stub with `MZ`, `e_lfanew` at 0x3c pointing at `PE\0\0`, then the
/// optional-header magic (PE32 vs PE32+) gives the bitness.
fn detect_pe(header: &[u8], file: &mut File) -> Result<Option<DetectedFormat>> {
    use std::io::{Seek, SeekFrom};

    if header.len() < 0x40 || header[0] != b'M' || header[1] != b'Z' {
        return Ok(None);
    }
    let pe_offset = u32::from_le_bytes([header[0x3c], header[0x3d], header[0x3e], header[0x3f]]);

    // PE signature (4) + COFF header (20) + optional-header magic (2)
    let mut buf = [0u8; 26];
    if file.seek(SeekFrom::Start(pe_offset as u64)).is_err() {
        return Ok(None);
    }
    let n = read_up_to(file, &mut buf)?;
    if n < 26 || &buf[..4] != b"PE\0\0" {
        return Ok(None);
    }
    let opt_magic = u16::from_le_bytes([buf[24], buf[25]]);
    let bits = match opt_magic {
        0x010b => 32, // PE32
        0x020b => 64, // PE32+
        _ => return Ok(None),
    };
    Ok(Some(DetectedFormat {
        format: BinaryFormat::Pe,
        bits,
    }))
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = file.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_detect_elf64() {
        let temp = TempDir::new().unwrap();
        let mut bytes = vec![0x7f, b'E', b'L', b'F', 2, 1, 1, 0];
        bytes.resize(64, 0);
        let path = write_file(&temp, "a.out", &bytes);

        let detected = detect_format(&path).unwrap();
        assert_eq!(detected.format, BinaryFormat::Elf);
        assert_eq!(detected.bits, 64);
    }

    #[test]
    fn test_detect_elf32() {
        let temp = TempDir::new().unwrap();
        let mut bytes = vec![0x7f, b'E', b'L', b'F', 1, 1, 1, 0];
        bytes.resize(64, 0);
        let path = write_file(&temp, "a.out", &bytes);

        assert_eq!(detect_format(&path).unwrap().bits, 32);
    }

    #[test]
    fn test_detect_pe64() {
        let temp = TempDir::new().unwrap();
        // DOS header with e_lfanew = 0x40, then PE header at 0x40.
        let mut bytes = vec![0u8; 0x40 + 26];
        bytes[0] = b'M';
        bytes[1] = b'Z';
        bytes[0x3c] = 0x40;
        bytes[0x40..0x44].copy_from_slice(b"PE\0\0");
        bytes[0x40 + 24..0x40 + 26].copy_from_slice(&0x020bu16.to_le_bytes());
        let path = write_file(&temp, "a.exe", &bytes);

        let detected = detect_format(&path).unwrap();
        assert_eq!(detected.format, BinaryFormat::Pe);
        assert_eq!(detected.bits, 64);
    }

    #[test]
    fn test_detect_macho64() {
        let temp = TempDir::new().unwrap();
        let mut bytes = 0xfeed_facfu32.to_le_bytes().to_vec();
        bytes.resize(64, 0);
        let path = write_file(&temp, "a.dylib", &bytes);

        let detected = detect_format(&path).unwrap();
        assert_eq!(detected.format, BinaryFormat::MachO);
        assert_eq!(detected.bits, 64);
    }

    #[test]
    fn test_detect_unsupported() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "notes.txt", b"just some text, not a binary");
        assert!(matches!(
            detect_format(&path),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_detect_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nope");
        assert!(matches!(detect_format(&path), Err(Error::FileNotFound(_))));
    }
}

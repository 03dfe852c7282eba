// src/install_condition/scan.rs

//! Printable-string scanning for U-Boot and custom version patterns
//!
//! Files are read in fixed windows; runs of printable ASCII are collected
//! (any other byte ends a run) and each completed run is matched against
//! the pattern, much like `strings(1) | grep`. Runs longer than
//! `MAX_RUN` are matched as they grow and cut down to a trailing window.

use crate::error::{Error, Result};
use crate::object::read_full;
use regex::Regex;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::LazyLock;

/// Window used when scanning for the U-Boot banner
const UBOOT_WINDOW: usize = 30;

const REGEXP_WINDOW: usize = 4096;

/// Longest printable run held in memory; longer runs keep only a tail
const MAX_RUN: usize = 64 * 1024;
const RUN_TAIL: usize = 1024;

static UBOOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"U-Boot(?: SPL)? (\S+) \(.*\)").expect("valid u-boot regex")
});

/// Extract the version from a U-Boot binary
pub fn uboot_version(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    scan_printable(BufReader::new(file), UBOOT_WINDOW, &UBOOT_RE)?
        .ok_or_else(|| Error::version_extraction(path, "no U-Boot banner found"))
}

/// Extract a version with a user supplied pattern
///
/// Scanning starts at `seek` and covers `buffer_size` bytes, or the rest of
/// the file when `buffer_size` is negative. The first capture group is the
/// version (the whole match when the pattern has no group).
pub fn regexp_version(path: &Path, pattern: &str, seek: u64, buffer_size: i64) -> Result<String> {
    let regex = Regex::new(pattern)
        .map_err(|e| Error::InvalidOption(format!("invalid install-condition pattern: {}", e)))?;

    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(seek))?;
    let reader = BufReader::new(file);
    let found = if buffer_size >= 0 {
        scan_printable(reader.take(buffer_size as u64), REGEXP_WINDOW, &regex)?
    } else {
        scan_printable(reader, REGEXP_WINDOW, &regex)?
    };
    found.ok_or_else(|| {
        Error::version_extraction(path, format!("pattern {} did not match", pattern))
    })
}

fn is_printable(byte: u8) -> bool {
    (0x20..=0x7e).contains(&byte)
}

fn match_run(run: &str, regex: &Regex) -> Option<String> {
    let caps = regex.captures(run)?;
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().to_string())
}

/// Match a run that may still grow; a match touching the end is not final
fn match_open_run(run: &str, regex: &Regex) -> Option<String> {
    let caps = regex.captures(run)?;
    if caps.get(0)?.end() >= run.len() {
        return None;
    }
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().to_string())
}

/// Scan `reader` in `window`-byte reads for the first printable run matching
/// `regex`
fn scan_printable<R: Read>(mut reader: R, window: usize, regex: &Regex) -> io::Result<Option<String>> {
    let mut buffer = vec![0u8; window];
    let mut run = String::new();

    loop {
        let len = read_full(&mut reader, &mut buffer)?;
        if len == 0 {
            break;
        }
        for &byte in &buffer[..len] {
            if is_printable(byte) {
                run.push(byte as char);
                if run.len() >= MAX_RUN {
                    if let Some(version) = match_open_run(&run, regex) {
                        return Ok(Some(version));
                    }
                    run.drain(..run.len() - RUN_TAIL);
                }
                continue;
            }
            if !run.is_empty() {
                if let Some(version) = match_run(&run, regex) {
                    return Ok(Some(version));
                }
                run.clear();
            }
        }
    }

    if run.is_empty() {
        return Ok(None);
    }
    Ok(match_run(&run, regex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn binary_with(text: &[u8], padding: usize) -> Vec<u8> {
        let mut bytes = vec![0x00, 0x13, 0x88, 0xFE];
        bytes.extend(std::iter::repeat_n(0x01u8, padding));
        bytes.extend_from_slice(text);
        bytes.extend_from_slice(&[0x00, 0xC3, 0x00]);
        bytes
    }

    #[test]
    fn test_uboot_banner_across_windows() {
        // Offset the banner so it straddles several 30-byte reads
        let file = write_temp(&binary_with(
            b"U-Boot 2017.11-rc3-00042-gdeadbee (Dec 01 2017 - 10:00:00 +0000)",
            47,
        ));
        assert_eq!(uboot_version(file.path()).unwrap(), "2017.11-rc3-00042-gdeadbee");
    }

    #[test]
    fn test_uboot_spl_banner() {
        let file = write_temp(&binary_with(b"U-Boot SPL 2016.03 (Mar 14 2016 - 12:00:00)", 3));
        assert_eq!(uboot_version(file.path()).unwrap(), "2016.03");
    }

    #[test]
    fn test_uboot_missing_banner() {
        let file = write_temp(&binary_with(b"Barebox 2020.01.0", 10));
        assert!(matches!(
            uboot_version(file.path()),
            Err(Error::VersionExtractionFailed { .. })
        ));
    }

    #[test]
    fn test_regexp_respects_seek_and_buffer_size() {
        let mut bytes = b"version=1.0.0\x00".to_vec();
        bytes.extend_from_slice(b"version=2.0.0\x00");
        let file = write_temp(&bytes);

        let pattern = r"version=(\S+)";
        assert_eq!(regexp_version(file.path(), pattern, 0, -1).unwrap(), "1.0.0");
        assert_eq!(regexp_version(file.path(), pattern, 14, -1).unwrap(), "2.0.0");
        // The first string is cut short, so only its prefix is visible
        assert_eq!(regexp_version(file.path(), pattern, 0, 10).unwrap(), "1.");
        assert!(regexp_version(file.path(), pattern, 0, 5).is_err());
    }

    #[test]
    fn test_regexp_resets_on_non_printable() {
        let file = write_temp(b"ver\x00sion=3.1");
        assert!(regexp_version(file.path(), r"version=(\S+)", 0, -1).is_err());
    }

    #[test]
    fn test_long_printable_run() {
        let pattern = r"version=(\d+\.\d+)";

        // Match straddles the point where the run is cut down
        let mut text = vec![b'x'; MAX_RUN - 5];
        text.extend_from_slice(b"version=9.9 ");
        text.extend(std::iter::repeat_n(b'y', 3 * MAX_RUN));
        let file = write_temp(&text);
        assert_eq!(regexp_version(file.path(), pattern, 0, -1).unwrap(), "9.9");

        // Match far past the cap, at the very end of the file
        let mut text = vec![b'z'; 5 * MAX_RUN];
        text.extend_from_slice(b"version=1.25");
        let file = write_temp(&text);
        assert_eq!(regexp_version(file.path(), pattern, 0, -1).unwrap(), "1.25");

        let file = write_temp(&vec![b'q'; 3 * MAX_RUN]);
        assert!(regexp_version(file.path(), pattern, 0, -1).is_err());
    }

    #[test]
    fn test_invalid_regexp() {
        let file = write_temp(b"abc");
        assert!(matches!(
            regexp_version(file.path(), "(unclosed", 0, -1),
            Err(Error::InvalidOption(_))
        ));
    }
}

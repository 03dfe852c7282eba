// src/install_condition/kernel.rs

//! Linux kernel image version detection
//!
//! Supported layouts:
//! - ARM uImage: big-endian magic `0x27051956` at byte 0, image name at 32
//! - ARM zImage: little-endian magic `0x016F2818` at byte 36, gzipped payload
//! - x86 bzImage/zImage: boot signature `0xAA55` at 510, load flag at 529,
//!   offset of the version string at 526 (relative to 512)

use crate::error::{Error, Result};
use crate::object::read_full;
use flate2::read::GzDecoder;
use regex::Regex;
use regex::bytes::Regex as BytesRegex;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::LazyLock;

const UIMAGE_MAGIC: u32 = 0x2705_1956;
const ZIMAGE_MAGIC: u32 = 0x016F_2818;
const X86_BOOT_SIGNATURE: u16 = 0xAA55;

/// Start of a gzip member with no flags and zero mtime, as embedded in zImage
const GZIP_HEADER: [u8; 8] = [0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Bytes of the image header needed to tell formats apart
const HEADER_LEN: usize = 1024;

const SCAN_BLOCK: usize = 64 * 1024;

/// Decompressed bytes kept between blocks so matches can straddle them
const WINDOW_TAIL: usize = 256;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.[^\s]+").expect("valid version regex"));
static BANNER_RE: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"(?-u)Linux version (\S+)").expect("valid banner regex"));

/// Kernel image layouts recognized by magic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelImage {
    ArmUImage,
    ArmZImage,
    X86BzImage,
    X86ZImage,
}

/// Identify the kernel image layout from its first bytes
pub fn detect_kernel_image(header: &[u8]) -> Option<KernelImage> {
    if header.len() >= 4 && u32::from_be_bytes([header[0], header[1], header[2], header[3]]) == UIMAGE_MAGIC {
        return Some(KernelImage::ArmUImage);
    }
    if header.len() >= 40
        && u32::from_le_bytes([header[36], header[37], header[38], header[39]]) == ZIMAGE_MAGIC
    {
        return Some(KernelImage::ArmZImage);
    }
    if header.len() >= 530 && u16::from_le_bytes([header[510], header[511]]) == X86_BOOT_SIGNATURE {
        return match header[529] {
            0x01 => Some(KernelImage::X86BzImage),
            0x00 => Some(KernelImage::X86ZImage),
            _ => None,
        };
    }
    None
}

/// Extract the version of a Linux kernel image
pub fn linux_kernel_version(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut header = vec![0u8; HEADER_LEN];
    let len = read_full(&mut file, &mut header)?;
    header.truncate(len);

    let version = match detect_kernel_image(&header) {
        Some(KernelImage::ArmUImage) => uimage_version(&header),
        Some(KernelImage::ArmZImage) => zimage_version(&mut file)?,
        Some(KernelImage::X86BzImage) | Some(KernelImage::X86ZImage) => {
            x86_version(&mut file, &header)?
        }
        None => {
            return Err(Error::version_extraction(path, "not a recognized Linux kernel image"));
        }
    };
    version.ok_or_else(|| Error::version_extraction(path, "no version string in kernel image"))
}

fn uimage_version(header: &[u8]) -> Option<String> {
    let name = header.get(32..64.min(header.len()))?;
    let name = until_nul(name);
    let name = String::from_utf8_lossy(name);
    VERSION_RE
        .find_iter(&name)
        .max_by_key(|m| m.as_str().len())
        .map(|m| m.as_str().to_string())
}

fn x86_version(file: &mut File, header: &[u8]) -> Result<Option<String>> {
    let offset = u16::from_le_bytes([header[526], header[527]]) as u64;
    file.seek(SeekFrom::Start(offset + 512))?;
    let mut buffer = [0u8; 512];
    let len = read_full(file, &mut buffer)?;
    let text = String::from_utf8_lossy(until_nul(&buffer[..len])).into_owned();
    Ok(VERSION_RE.find(&text).map(|m| m.as_str().to_string()))
}

/// Locate every embedded gzip header and scan its decompressed stream for
/// the kernel banner, stopping at the first hit
fn zimage_version(file: &mut File) -> Result<Option<String>> {
    for offset in find_gzip_headers(file)? {
        file.seek(SeekFrom::Start(offset))?;
        let decoder = GzDecoder::new(BufReader::new(&mut *file));
        if let Some(version) = scan_banner(decoder) {
            return Ok(Some(version));
        }
    }
    Ok(None)
}

fn find_gzip_headers(file: &mut File) -> io::Result<Vec<u64>> {
    file.seek(SeekFrom::Start(0))?;
    let mut offsets = Vec::new();
    let mut block = vec![0u8; SCAN_BLOCK];
    let mut carry: Vec<u8> = Vec::new();
    let mut consumed: u64 = 0;

    loop {
        let len = read_full(file, &mut block)?;
        if len == 0 {
            break;
        }
        let base = consumed - carry.len() as u64;
        carry.extend_from_slice(&block[..len]);
        for (i, window) in carry.windows(GZIP_HEADER.len()).enumerate() {
            if window == GZIP_HEADER {
                offsets.push(base + i as u64);
            }
        }
        consumed += len as u64;
        let keep = carry.len().min(GZIP_HEADER.len() - 1);
        carry.drain(..carry.len() - keep);
    }
    Ok(offsets)
}

/// Scan a decompressed stream; a decoding error ends the scan
fn scan_banner<R: Read>(mut reader: R) -> Option<String> {
    let mut window: Vec<u8> = Vec::with_capacity(SCAN_BLOCK + WINDOW_TAIL);
    let mut block = vec![0u8; SCAN_BLOCK];

    loop {
        let len = reader.read(&mut block).unwrap_or(0);
        let eof = len == 0;
        window.extend_from_slice(&block[..len]);

        if let Some(caps) = BANNER_RE.captures(&window) {
            if let Some(group) = caps.get(1) {
                if group.end() < window.len() || eof {
                    return Some(String::from_utf8_lossy(group.as_bytes()).into_owned());
                }
            }
        }
        if eof {
            return None;
        }
        if window.len() > WINDOW_TAIL {
            window.drain(..window.len() - WINDOW_TAIL);
        }
    }
}

fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|b| *b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn uimage(name: &str) -> Vec<u8> {
        let mut image = vec![0u8; 64];
        image[..4].copy_from_slice(&UIMAGE_MAGIC.to_be_bytes());
        image[32..32 + name.len()].copy_from_slice(name.as_bytes());
        image.extend_from_slice(&[0xAB; 128]);
        image
    }

    fn arm_zimage(banner: &[u8]) -> Vec<u8> {
        let mut payload = vec![0x5Au8; 200_000];
        payload.extend_from_slice(banner);
        payload.extend_from_slice(&[0u8; 1000]);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).unwrap();
        let gz = encoder.finish().unwrap();
        assert_eq!(&gz[..8], &GZIP_HEADER);

        let mut image = vec![0u8; 0x1000];
        image[36..40].copy_from_slice(&ZIMAGE_MAGIC.to_le_bytes());
        image.extend_from_slice(&gz);
        image.extend_from_slice(&[0xFF; 64]);
        image
    }

    fn x86_image(load_flag: u8, version: &str) -> Vec<u8> {
        let mut image = vec![0u8; 4096];
        image[510..512].copy_from_slice(&X86_BOOT_SIGNATURE.to_le_bytes());
        image[529] = load_flag;
        let offset: u16 = 0x0300;
        image[526..528].copy_from_slice(&offset.to_le_bytes());
        let start = offset as usize + 512;
        image[start..start + version.len()].copy_from_slice(version.as_bytes());
        image
    }

    #[test]
    fn test_uimage_longest_match() {
        let file = write_temp(&uimage("Linux-4.1.15-2.1.0+g30278ab"));
        assert_eq!(linux_kernel_version(file.path()).unwrap(), "4.1.15-2.1.0+g30278ab");
    }

    #[test]
    fn test_arm_zimage_banner() {
        let file = write_temp(&arm_zimage(
            b"Linux version 4.9.88-rt56 (builder@host) (gcc version 7.3.0) #1 SMP",
        ));
        assert_eq!(linux_kernel_version(file.path()).unwrap(), "4.9.88-rt56");
    }

    #[test]
    fn test_bzimage_and_zimage() {
        let file = write_temp(&x86_image(0x01, "5.10.0-amd64 (debian-kernel@lists)"));
        assert_eq!(linux_kernel_version(file.path()).unwrap(), "5.10.0-amd64");

        let file = write_temp(&x86_image(0x00, "2.6.32 (root@localhost) #1"));
        assert_eq!(linux_kernel_version(file.path()).unwrap(), "2.6.32");
    }

    #[test]
    fn test_detect_kernel_image() {
        assert_eq!(detect_kernel_image(&uimage("Linux-1.0")), Some(KernelImage::ArmUImage));
        assert_eq!(detect_kernel_image(&x86_image(1, "1.0")), Some(KernelImage::X86BzImage));
        assert_eq!(detect_kernel_image(&x86_image(0, "1.0")), Some(KernelImage::X86ZImage));
        assert_eq!(detect_kernel_image(&x86_image(7, "1.0")), None);
        assert_eq!(detect_kernel_image(b"short"), None);
    }

    #[test]
    fn test_unknown_image_fails() {
        let file = write_temp(&[0x42u8; 2048]);
        assert!(matches!(
            linux_kernel_version(file.path()),
            Err(Error::VersionExtractionFailed { .. })
        ));
    }

    #[test]
    fn test_zimage_without_banner_fails() {
        let file = write_temp(&arm_zimage(b"no banner here"));
        assert!(matches!(
            linux_kernel_version(file.path()),
            Err(Error::VersionExtractionFailed { .. })
        ));
    }
}

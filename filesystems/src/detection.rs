// Volume format detection from the header region.

use carbon_core::{CarbonError, DataLocator};

use crate::families::hfs::structs::hfs::{EMBED_SIGNATURE_HFSPLUS, MDB_SIGNATURE};
use crate::families::hfs::structs::hfsplus::{HFSPLUS_SIGNATURE, HFSX_SIGNATURE};
use crate::families::hfs::volume::HEADER_OFFSET;

/// Detected on-disk format of the volume region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFormat {
    /// Classic HFS.
    Hfs,
    /// Classic HFS acting as a shell around an embedded HFS+ volume.
    HfsWrapper,
    HfsPlus,
    Hfsx,
    Unknown,
}

/// Classify the 512-byte header block found at offset 1024.
pub fn detect(header_block: &[u8]) -> DetectedFormat {
    if header_block.len() < 2 {
        return DetectedFormat::Unknown;
    }
    match u16::from_be_bytes([header_block[0], header_block[1]]) {
        MDB_SIGNATURE => {
            // drEmbedSigWord distinguishes a wrapper from a plain volume.
            let embed = header_block
                .get(124..126)
                .map(|b| u16::from_be_bytes([b[0], b[1]]));
            if embed == Some(EMBED_SIGNATURE_HFSPLUS) {
                DetectedFormat::HfsWrapper
            } else {
                DetectedFormat::Hfs
            }
        }
        HFSPLUS_SIGNATURE => DetectedFormat::HfsPlus,
        HFSX_SIGNATURE => DetectedFormat::Hfsx,
        _ => DetectedFormat::Unknown,
    }
}

/// Read the header block from a locator and classify it.
pub fn detect_from(locator: &dyn DataLocator) -> Result<DetectedFormat, CarbonError> {
    let block = locator.read_vec(HEADER_OFFSET, 512)?;
    Ok(detect(&block))
}

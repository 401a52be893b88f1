// On-disk structure decoding for HFS and HFS+/HFSX.
// Pure layout code: every struct decodes eagerly from a big-endian byte
// buffer, is bounds-checked up front, and can reproduce its exact on-disk
// bytes through encode().

pub mod btree;
pub mod hfs;
pub mod hfsplus;

use carbon_core::CarbonError;

/// Bounds check shared by every struct constructor in this module tree.
/// Short buffers are a structural error (`Truncated`), never silently
/// tolerated.
pub(crate) fn ensure_len(
    what: &'static str,
    data: &[u8],
    need: usize,
) -> Result<(), CarbonError> {
    if data.len() < need {
        Err(CarbonError::Truncated {
            what,
            need,
            have: data.len(),
        })
    } else {
        Ok(())
    }
}

/// A classic Mac OS four-character code (file types, creator codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(code: &[u8; 4]) -> Self {
        FourCC(*code)
    }

    pub fn from_slice(data: &[u8]) -> Self {
        FourCC([data[0], data[1], data[2], data[3]])
    }

    pub fn as_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

/// Finder info carried by classic HFS and HFS+ file records (`FInfo`,
/// 16 bytes). Folder-side finder info has no fields we interpret and stays
/// raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinderFileInfo {
    pub file_type: FourCC,
    pub creator: FourCC,
    pub flags: u16,
    pub location_v: i16,
    pub location_h: i16,
    pub reserved: i16,
}

pub const FINDER_FILE_INFO_SIZE: usize = 16;

impl FinderFileInfo {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("Finder file info", data, FINDER_FILE_INFO_SIZE)?;
        Ok(Self {
            file_type: FourCC::from_slice(&data[0..4]),
            creator: FourCC::from_slice(&data[4..8]),
            flags: u16::from_be_bytes([data[8], data[9]]),
            location_v: i16::from_be_bytes([data[10], data[11]]),
            location_h: i16::from_be_bytes([data[12], data[13]]),
            reserved: i16::from_be_bytes([data[14], data[15]]),
        })
    }

    pub fn encode(&self) -> [u8; FINDER_FILE_INFO_SIZE] {
        let mut out = [0u8; FINDER_FILE_INFO_SIZE];
        out[0..4].copy_from_slice(&self.file_type.0);
        out[4..8].copy_from_slice(&self.creator.0);
        out[8..10].copy_from_slice(&self.flags.to_be_bytes());
        out[10..12].copy_from_slice(&self.location_v.to_be_bytes());
        out[12..14].copy_from_slice(&self.location_h.to_be_bytes());
        out[14..16].copy_from_slice(&self.reserved.to_be_bytes());
        out
    }
}

/// Read a Pascal string (length byte + bytes) with a fixed maximum length.
/// Returns the raw bytes; character decoding is the model layer's concern.
pub(crate) fn parse_pascal_string(
    what: &'static str,
    data: &[u8],
    max: usize,
) -> Result<Vec<u8>, CarbonError> {
    ensure_len(what, data, 1)?;
    let len = data[0] as usize;
    if len > max {
        return Err(CarbonError::InvalidVolume(format!(
            "{what}: pascal string length {len} exceeds maximum {max}"
        )));
    }
    ensure_len(what, data, 1 + len)?;
    Ok(data[1..1 + len].to_vec())
}

// HFS+/HFSX on-disk structures (TN1150).
// The Volume Header is 512 bytes at offset 1024; names are UTF-16BE up to
// 255 units; extents are 32-bit on both sides with 8 inline slots.

use byteorder::{BigEndian, ByteOrder};
use carbon_core::CarbonError;
use static_assertions::const_assert_eq;

use super::ensure_len;

pub const HFSPLUS_SIGNATURE: u16 = 0x482B; // "H+"
pub const HFSX_SIGNATURE: u16 = 0x4858; // "HX"
pub const HFSPLUS_VERSION: u16 = 4;
pub const HFSX_VERSION: u16 = 5;

pub const VOLUME_HEADER_SIZE: usize = 512;
const_assert_eq!(VOLUME_HEADER_SIZE, 2 + 2 + 4 + 4 + 4 + 4 * 5 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 8 + 32 + 80 * 5);

pub const HFSPLUS_MAX_NAME_UNITS: usize = 255;
pub const HFSPLUS_INLINE_EXTENTS: usize = 8;

/// Record type tags for HFS+ catalog data records.
pub const REC_FOLDER: u16 = 1;
pub const REC_FILE: u16 = 2;
pub const REC_FOLDER_THREAD: u16 = 3;
pub const REC_FILE_THREAD: u16 = 4;

/// `HFSPlusCatalogFile.flags` bit set on directory hard links.
pub const FLAG_HAS_LINK_CHAIN: u16 = 0x0020;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HfsPlusExtentDescriptor {
    pub start_block: u32,
    pub block_count: u32,
}

pub const HFSPLUS_EXTENT_DESCRIPTOR_SIZE: usize = 8;
pub const HFSPLUS_EXTENT_RECORD_SIZE: usize =
    HFSPLUS_EXTENT_DESCRIPTOR_SIZE * HFSPLUS_INLINE_EXTENTS;

impl HfsPlusExtentDescriptor {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS+ extent descriptor", data, HFSPLUS_EXTENT_DESCRIPTOR_SIZE)?;
        Ok(Self {
            start_block: BigEndian::read_u32(&data[0..4]),
            block_count: BigEndian::read_u32(&data[4..8]),
        })
    }

    pub fn encode(&self) -> [u8; HFSPLUS_EXTENT_DESCRIPTOR_SIZE] {
        let mut out = [0u8; HFSPLUS_EXTENT_DESCRIPTOR_SIZE];
        BigEndian::write_u32(&mut out[0..4], self.start_block);
        BigEndian::write_u32(&mut out[4..8], self.block_count);
        out
    }
}

pub fn parse_extent_record(
    data: &[u8],
) -> Result<[HfsPlusExtentDescriptor; HFSPLUS_INLINE_EXTENTS], CarbonError> {
    ensure_len("HFS+ extent record", data, HFSPLUS_EXTENT_RECORD_SIZE)?;
    let mut out = [HfsPlusExtentDescriptor { start_block: 0, block_count: 0 };
        HFSPLUS_INLINE_EXTENTS];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = HfsPlusExtentDescriptor::parse(&data[i * 8..i * 8 + 8])?;
    }
    Ok(out)
}

pub fn encode_extent_record(
    extents: &[HfsPlusExtentDescriptor; HFSPLUS_INLINE_EXTENTS],
) -> [u8; HFSPLUS_EXTENT_RECORD_SIZE] {
    let mut out = [0u8; HFSPLUS_EXTENT_RECORD_SIZE];
    for (i, ext) in extents.iter().enumerate() {
        out[i * 8..i * 8 + 8].copy_from_slice(&ext.encode());
    }
    out
}

/// Fork location and size (`HFSPlusForkData`, 80 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkData {
    pub logical_size: u64,
    pub clump_size: u32,
    pub total_blocks: u32,
    pub extents: [HfsPlusExtentDescriptor; HFSPLUS_INLINE_EXTENTS],
}

pub const FORK_DATA_SIZE: usize = 80;
const_assert_eq!(FORK_DATA_SIZE, 8 + 4 + 4 + HFSPLUS_EXTENT_RECORD_SIZE);

impl ForkData {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS+ fork data", data, FORK_DATA_SIZE)?;
        Ok(Self {
            logical_size: BigEndian::read_u64(&data[0..8]),
            clump_size: BigEndian::read_u32(&data[8..12]),
            total_blocks: BigEndian::read_u32(&data[12..16]),
            extents: parse_extent_record(&data[16..80])?,
        })
    }

    pub fn encode(&self) -> [u8; FORK_DATA_SIZE] {
        let mut out = [0u8; FORK_DATA_SIZE];
        BigEndian::write_u64(&mut out[0..8], self.logical_size);
        BigEndian::write_u32(&mut out[8..12], self.clump_size);
        BigEndian::write_u32(&mut out[12..16], self.total_blocks);
        out[16..80].copy_from_slice(&encode_extent_record(&self.extents));
        out
    }
}

/// HFS+/HFSX Volume Header (512 bytes at byte offset 1024).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeHeader {
    pub signature: u16,
    pub version: u16,
    pub attributes: u32,
    pub last_mounted_version: u32,
    pub journal_info_block: u32,
    pub create_date: u32,
    pub modify_date: u32,
    pub backup_date: u32,
    pub checked_date: u32,
    pub file_count: u32,
    pub folder_count: u32,
    pub block_size: u32,
    pub total_blocks: u32,
    pub free_blocks: u32,
    pub next_allocation: u32,
    pub rsrc_clump_size: u32,
    pub data_clump_size: u32,
    pub next_cnid: u32,
    pub write_count: u32,
    pub encodings_bitmap: u64,
    pub finder_info: [u8; 32],
    pub allocation_file: ForkData,
    pub extents_file: ForkData,
    pub catalog_file: ForkData,
    pub attributes_file: ForkData,
    pub startup_file: ForkData,
}

impl VolumeHeader {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS+ volume header", data, VOLUME_HEADER_SIZE)?;
        let mut finder_info = [0u8; 32];
        finder_info.copy_from_slice(&data[80..112]);
        Ok(Self {
            signature: BigEndian::read_u16(&data[0..2]),
            version: BigEndian::read_u16(&data[2..4]),
            attributes: BigEndian::read_u32(&data[4..8]),
            last_mounted_version: BigEndian::read_u32(&data[8..12]),
            journal_info_block: BigEndian::read_u32(&data[12..16]),
            create_date: BigEndian::read_u32(&data[16..20]),
            modify_date: BigEndian::read_u32(&data[20..24]),
            backup_date: BigEndian::read_u32(&data[24..28]),
            checked_date: BigEndian::read_u32(&data[28..32]),
            file_count: BigEndian::read_u32(&data[32..36]),
            folder_count: BigEndian::read_u32(&data[36..40]),
            block_size: BigEndian::read_u32(&data[40..44]),
            total_blocks: BigEndian::read_u32(&data[44..48]),
            free_blocks: BigEndian::read_u32(&data[48..52]),
            next_allocation: BigEndian::read_u32(&data[52..56]),
            rsrc_clump_size: BigEndian::read_u32(&data[56..60]),
            data_clump_size: BigEndian::read_u32(&data[60..64]),
            next_cnid: BigEndian::read_u32(&data[64..68]),
            write_count: BigEndian::read_u32(&data[68..72]),
            encodings_bitmap: BigEndian::read_u64(&data[72..80]),
            finder_info,
            allocation_file: ForkData::parse(&data[112..192])?,
            extents_file: ForkData::parse(&data[192..272])?,
            catalog_file: ForkData::parse(&data[272..352])?,
            attributes_file: ForkData::parse(&data[352..432])?,
            startup_file: ForkData::parse(&data[432..512])?,
        })
    }

    pub fn is_valid(&self) -> bool {
        let sig_ok = matches!(
            (self.signature, self.version),
            (HFSPLUS_SIGNATURE, HFSPLUS_VERSION) | (HFSX_SIGNATURE, HFSX_VERSION)
        );
        sig_ok && self.block_size >= 512 && self.block_size.is_power_of_two()
    }

    pub fn is_hfsx(&self) -> bool {
        self.signature == HFSX_SIGNATURE
    }

    /// Byte offset of allocation block `block`. HFS+ numbers blocks from
    /// the start of the volume, so block 0 contains the boot blocks.
    pub fn block_offset(&self, block: u64) -> u64 {
        block * u64::from(self.block_size)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; VOLUME_HEADER_SIZE];
        BigEndian::write_u16(&mut out[0..2], self.signature);
        BigEndian::write_u16(&mut out[2..4], self.version);
        BigEndian::write_u32(&mut out[4..8], self.attributes);
        BigEndian::write_u32(&mut out[8..12], self.last_mounted_version);
        BigEndian::write_u32(&mut out[12..16], self.journal_info_block);
        BigEndian::write_u32(&mut out[16..20], self.create_date);
        BigEndian::write_u32(&mut out[20..24], self.modify_date);
        BigEndian::write_u32(&mut out[24..28], self.backup_date);
        BigEndian::write_u32(&mut out[28..32], self.checked_date);
        BigEndian::write_u32(&mut out[32..36], self.file_count);
        BigEndian::write_u32(&mut out[36..40], self.folder_count);
        BigEndian::write_u32(&mut out[40..44], self.block_size);
        BigEndian::write_u32(&mut out[44..48], self.total_blocks);
        BigEndian::write_u32(&mut out[48..52], self.free_blocks);
        BigEndian::write_u32(&mut out[52..56], self.next_allocation);
        BigEndian::write_u32(&mut out[56..60], self.rsrc_clump_size);
        BigEndian::write_u32(&mut out[60..64], self.data_clump_size);
        BigEndian::write_u32(&mut out[64..68], self.next_cnid);
        BigEndian::write_u32(&mut out[68..72], self.write_count);
        BigEndian::write_u64(&mut out[72..80], self.encodings_bitmap);
        out[80..112].copy_from_slice(&self.finder_info);
        out[112..192].copy_from_slice(&self.allocation_file.encode());
        out[192..272].copy_from_slice(&self.extents_file.encode());
        out[272..352].copy_from_slice(&self.catalog_file.encode());
        out[352..432].copy_from_slice(&self.attributes_file.encode());
        out[432..512].copy_from_slice(&self.startup_file.encode());
        out
    }
}

/// HFS+ catalog key: keyLength u16 (excluding its own two bytes), parent
/// CNID u32, then the node name as a u16 unit count plus UTF-16BE units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HfsPlusCatalogKey {
    pub parent_id: u32,
    /// Name as raw UTF-16 code units, not validated as well-formed UTF-16.
    pub name: Vec<u16>,
}

impl HfsPlusCatalogKey {
    /// Returns the key plus bytes consumed (2 length bytes + keyLength).
    pub fn parse(data: &[u8]) -> Result<(Self, usize), CarbonError> {
        ensure_len("HFS+ catalog key", data, 8)?;
        let key_len = BigEndian::read_u16(&data[0..2]) as usize;
        if key_len < 6 {
            return Err(CarbonError::CorruptTree(format!(
                "HFS+ catalog key length {key_len} below minimum 6"
            )));
        }
        ensure_len("HFS+ catalog key", data, 2 + key_len)?;
        let parent_id = BigEndian::read_u32(&data[2..6]);
        let unit_count = BigEndian::read_u16(&data[6..8]) as usize;
        if unit_count > HFSPLUS_MAX_NAME_UNITS || 6 + unit_count * 2 > key_len {
            return Err(CarbonError::CorruptTree(format!(
                "HFS+ catalog key name length {unit_count} overruns key length {key_len}"
            )));
        }
        let mut name = Vec::with_capacity(unit_count);
        for i in 0..unit_count {
            name.push(BigEndian::read_u16(&data[8 + i * 2..10 + i * 2]));
        }
        Ok((Self { parent_id, name }, 2 + key_len))
    }

    pub fn encode(&self) -> Vec<u8> {
        let key_len = 4 + 2 + self.name.len() * 2;
        let mut out = Vec::with_capacity(2 + key_len);
        out.extend_from_slice(&(key_len as u16).to_be_bytes());
        out.extend_from_slice(&self.parent_id.to_be_bytes());
        out.extend_from_slice(&(self.name.len() as u16).to_be_bytes());
        for unit in &self.name {
            out.extend_from_slice(&unit.to_be_bytes());
        }
        out
    }
}

/// HFS+ extents-overflow key (12 bytes): keyLength(=10) u16, fork type
/// u8 (0=data, 0xFF=resource), pad u8, file CNID u32, first file
/// allocation block covered by this record u32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HfsPlusExtentKey {
    pub fork_type: u8,
    pub file_id: u32,
    pub start_block: u32,
}

pub const HFSPLUS_EXTENT_KEY_SIZE: usize = 12;
pub const HFSPLUS_EXTENT_KEY_LENGTH: u16 = 10;

impl HfsPlusExtentKey {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS+ extent key", data, HFSPLUS_EXTENT_KEY_SIZE)?;
        let key_len = BigEndian::read_u16(&data[0..2]);
        if key_len != HFSPLUS_EXTENT_KEY_LENGTH {
            return Err(CarbonError::CorruptTree(format!(
                "HFS+ extent key length {key_len} (expected {HFSPLUS_EXTENT_KEY_LENGTH})"
            )));
        }
        Ok(Self {
            fork_type: data[2],
            file_id: BigEndian::read_u32(&data[4..8]),
            start_block: BigEndian::read_u32(&data[8..12]),
        })
    }

    pub fn encode(&self) -> [u8; HFSPLUS_EXTENT_KEY_SIZE] {
        let mut out = [0u8; HFSPLUS_EXTENT_KEY_SIZE];
        BigEndian::write_u16(&mut out[0..2], HFSPLUS_EXTENT_KEY_LENGTH);
        out[2] = self.fork_type;
        BigEndian::write_u32(&mut out[4..8], self.file_id);
        BigEndian::write_u32(&mut out[8..12], self.start_block);
        out
    }
}

/// POSIX-ish permissions block (`HFSPlusBSDInfo`, 16 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BsdInfo {
    pub owner_id: u32,
    pub group_id: u32,
    pub admin_flags: u8,
    pub owner_flags: u8,
    pub file_mode: u16,
    /// Union field: iNodeNum for hard links, linkCount for indirect node
    /// files, rawDevice for device specials.
    pub special: u32,
}

pub const BSD_INFO_SIZE: usize = 16;

/// `file_mode` type bits (POSIX S_IFMT and S_IFLNK).
pub const MODE_TYPE_MASK: u16 = 0o170000;
pub const MODE_TYPE_SYMLINK: u16 = 0o120000;

impl BsdInfo {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS+ BSD info", data, BSD_INFO_SIZE)?;
        Ok(Self {
            owner_id: BigEndian::read_u32(&data[0..4]),
            group_id: BigEndian::read_u32(&data[4..8]),
            admin_flags: data[8],
            owner_flags: data[9],
            file_mode: BigEndian::read_u16(&data[10..12]),
            special: BigEndian::read_u32(&data[12..16]),
        })
    }

    pub fn encode(&self) -> [u8; BSD_INFO_SIZE] {
        let mut out = [0u8; BSD_INFO_SIZE];
        BigEndian::write_u32(&mut out[0..4], self.owner_id);
        BigEndian::write_u32(&mut out[4..8], self.group_id);
        out[8] = self.admin_flags;
        out[9] = self.owner_flags;
        BigEndian::write_u16(&mut out[10..12], self.file_mode);
        BigEndian::write_u32(&mut out[12..16], self.special);
        out
    }

    pub fn is_symlink(&self) -> bool {
        self.file_mode & MODE_TYPE_MASK == MODE_TYPE_SYMLINK
    }
}

/// Folder record (`HFSPlusCatalogFolder`, 88 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HfsPlusCatalogFolder {
    pub flags: u16,
    pub valence: u32,
    pub folder_id: u32,
    pub create_date: u32,
    pub content_mod_date: u32,
    pub attribute_mod_date: u32,
    pub access_date: u32,
    pub backup_date: u32,
    pub permissions: BsdInfo,
    pub user_info: [u8; 16],
    pub finder_info: [u8; 16],
    pub text_encoding: u32,
    pub reserved: u32,
}

pub const CATALOG_FOLDER_SIZE: usize = 88;
const_assert_eq!(
    CATALOG_FOLDER_SIZE,
    2 + 2 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + BSD_INFO_SIZE + 16 + 16 + 4 + 4
);

impl HfsPlusCatalogFolder {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS+ folder record", data, CATALOG_FOLDER_SIZE)?;
        let mut user_info = [0u8; 16];
        user_info.copy_from_slice(&data[48..64]);
        let mut finder_info = [0u8; 16];
        finder_info.copy_from_slice(&data[64..80]);
        Ok(Self {
            flags: BigEndian::read_u16(&data[2..4]),
            valence: BigEndian::read_u32(&data[4..8]),
            folder_id: BigEndian::read_u32(&data[8..12]),
            create_date: BigEndian::read_u32(&data[12..16]),
            content_mod_date: BigEndian::read_u32(&data[16..20]),
            attribute_mod_date: BigEndian::read_u32(&data[20..24]),
            access_date: BigEndian::read_u32(&data[24..28]),
            backup_date: BigEndian::read_u32(&data[28..32]),
            permissions: BsdInfo::parse(&data[32..48])?,
            user_info,
            finder_info,
            text_encoding: BigEndian::read_u32(&data[80..84]),
            reserved: BigEndian::read_u32(&data[84..88]),
        })
    }

    pub fn encode(&self) -> [u8; CATALOG_FOLDER_SIZE] {
        let mut out = [0u8; CATALOG_FOLDER_SIZE];
        BigEndian::write_u16(&mut out[0..2], REC_FOLDER);
        BigEndian::write_u16(&mut out[2..4], self.flags);
        BigEndian::write_u32(&mut out[4..8], self.valence);
        BigEndian::write_u32(&mut out[8..12], self.folder_id);
        BigEndian::write_u32(&mut out[12..16], self.create_date);
        BigEndian::write_u32(&mut out[16..20], self.content_mod_date);
        BigEndian::write_u32(&mut out[20..24], self.attribute_mod_date);
        BigEndian::write_u32(&mut out[24..28], self.access_date);
        BigEndian::write_u32(&mut out[28..32], self.backup_date);
        out[32..48].copy_from_slice(&self.permissions.encode());
        out[48..64].copy_from_slice(&self.user_info);
        out[64..80].copy_from_slice(&self.finder_info);
        BigEndian::write_u32(&mut out[80..84], self.text_encoding);
        BigEndian::write_u32(&mut out[84..88], self.reserved);
        out
    }
}

/// File record (`HFSPlusCatalogFile`, 248 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HfsPlusCatalogFile {
    pub flags: u16,
    pub reserved1: u32,
    pub file_id: u32,
    pub create_date: u32,
    pub content_mod_date: u32,
    pub attribute_mod_date: u32,
    pub access_date: u32,
    pub backup_date: u32,
    pub permissions: BsdInfo,
    pub user_info: [u8; 16],
    pub finder_info: [u8; 16],
    pub text_encoding: u32,
    pub reserved2: u32,
    pub data_fork: ForkData,
    pub resource_fork: ForkData,
}

pub const CATALOG_FILE_SIZE: usize = 248;
const_assert_eq!(
    CATALOG_FILE_SIZE,
    2 + 2 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + BSD_INFO_SIZE + 16 + 16 + 4 + 4 + FORK_DATA_SIZE * 2
);

impl HfsPlusCatalogFile {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS+ file record", data, CATALOG_FILE_SIZE)?;
        let mut user_info = [0u8; 16];
        user_info.copy_from_slice(&data[48..64]);
        let mut finder_info = [0u8; 16];
        finder_info.copy_from_slice(&data[64..80]);
        Ok(Self {
            flags: BigEndian::read_u16(&data[2..4]),
            reserved1: BigEndian::read_u32(&data[4..8]),
            file_id: BigEndian::read_u32(&data[8..12]),
            create_date: BigEndian::read_u32(&data[12..16]),
            content_mod_date: BigEndian::read_u32(&data[16..20]),
            attribute_mod_date: BigEndian::read_u32(&data[20..24]),
            access_date: BigEndian::read_u32(&data[24..28]),
            backup_date: BigEndian::read_u32(&data[28..32]),
            permissions: BsdInfo::parse(&data[32..48])?,
            user_info,
            finder_info,
            text_encoding: BigEndian::read_u32(&data[80..84]),
            reserved2: BigEndian::read_u32(&data[84..88]),
            data_fork: ForkData::parse(&data[88..168])?,
            resource_fork: ForkData::parse(&data[168..248])?,
        })
    }

    pub fn encode(&self) -> [u8; CATALOG_FILE_SIZE] {
        let mut out = [0u8; CATALOG_FILE_SIZE];
        BigEndian::write_u16(&mut out[0..2], REC_FILE);
        BigEndian::write_u16(&mut out[2..4], self.flags);
        BigEndian::write_u32(&mut out[4..8], self.reserved1);
        BigEndian::write_u32(&mut out[8..12], self.file_id);
        BigEndian::write_u32(&mut out[12..16], self.create_date);
        BigEndian::write_u32(&mut out[16..20], self.content_mod_date);
        BigEndian::write_u32(&mut out[20..24], self.attribute_mod_date);
        BigEndian::write_u32(&mut out[24..28], self.access_date);
        BigEndian::write_u32(&mut out[28..32], self.backup_date);
        out[32..48].copy_from_slice(&self.permissions.encode());
        out[48..64].copy_from_slice(&self.user_info);
        out[64..80].copy_from_slice(&self.finder_info);
        BigEndian::write_u32(&mut out[80..84], self.text_encoding);
        BigEndian::write_u32(&mut out[84..88], self.reserved2);
        out[88..168].copy_from_slice(&self.data_fork.encode());
        out[168..248].copy_from_slice(&self.resource_fork.encode());
        out
    }
}

/// Thread record (`HFSPlusCatalogThread`, variable length).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HfsPlusCatalogThread {
    pub is_file_thread: bool,
    /// Reserved field after the record type, kept for byte-exact
    /// re-encoding.
    pub reserved: u16,
    pub parent_id: u32,
    pub name: Vec<u16>,
}

impl HfsPlusCatalogThread {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS+ thread record", data, 10)?;
        let is_file_thread = match BigEndian::read_u16(&data[0..2]) {
            REC_FOLDER_THREAD => false,
            REC_FILE_THREAD => true,
            other => {
                return Err(CarbonError::CorruptTree(format!(
                    "thread record with type tag {other:#06x}"
                )))
            }
        };
        let unit_count = BigEndian::read_u16(&data[8..10]) as usize;
        if unit_count > HFSPLUS_MAX_NAME_UNITS {
            return Err(CarbonError::CorruptTree(format!(
                "HFS+ thread name length {unit_count} exceeds maximum"
            )));
        }
        ensure_len("HFS+ thread record", data, 10 + unit_count * 2)?;
        let mut name = Vec::with_capacity(unit_count);
        for i in 0..unit_count {
            name.push(BigEndian::read_u16(&data[10 + i * 2..12 + i * 2]));
        }
        Ok(Self {
            is_file_thread,
            reserved: BigEndian::read_u16(&data[2..4]),
            parent_id: BigEndian::read_u32(&data[4..8]),
            name,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(10 + self.name.len() * 2);
        let tag = if self.is_file_thread { REC_FILE_THREAD } else { REC_FOLDER_THREAD };
        out.extend_from_slice(&tag.to_be_bytes());
        out.extend_from_slice(&self.reserved.to_be_bytes());
        out.extend_from_slice(&self.parent_id.to_be_bytes());
        out.extend_from_slice(&(self.name.len() as u16).to_be_bytes());
        for unit in &self.name {
            out.extend_from_slice(&unit.to_be_bytes());
        }
        out
    }
}

/// Catalog data record, discriminated by the leading u16 record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HfsPlusCatalogData {
    Folder(HfsPlusCatalogFolder),
    File(HfsPlusCatalogFile),
    Thread(HfsPlusCatalogThread),
}

impl HfsPlusCatalogData {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS+ catalog data record", data, 2)?;
        match BigEndian::read_u16(&data[0..2]) {
            REC_FOLDER => Ok(HfsPlusCatalogData::Folder(HfsPlusCatalogFolder::parse(data)?)),
            REC_FILE => Ok(HfsPlusCatalogData::File(HfsPlusCatalogFile::parse(data)?)),
            REC_FOLDER_THREAD | REC_FILE_THREAD => {
                Ok(HfsPlusCatalogData::Thread(HfsPlusCatalogThread::parse(data)?))
            }
            other => Err(CarbonError::CorruptTree(format!(
                "unknown HFS+ catalog record type {other:#06x}"
            ))),
        }
    }
}

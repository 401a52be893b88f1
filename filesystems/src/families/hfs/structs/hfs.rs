// Classic HFS on-disk structures (Inside Macintosh: Files).
// The Master Directory Block sits at byte offset 1024 and is 162 bytes;
// extent fields are 16-bit, names are MacRoman Pascal strings of at most
// 31 bytes.

use byteorder::{BigEndian, ByteOrder};
use carbon_core::CarbonError;
use static_assertions::const_assert_eq;

use super::{ensure_len, parse_pascal_string};

pub const MDB_SIGNATURE: u16 = 0x4244; // "BD"
pub const MDB_SIZE: usize = 162;
const_assert_eq!(
    MDB_SIZE,
    2 + 4 + 4 + 2 + 2 + 2 + 2 + 2 + 4 + 4 + 2 + 4 + 2 + 28 + 4 + 2 + 4 + 4 + 4
        + 2 + 4 + 4 + 32 + 2 + 4 + 4 + 12 + 4 + 12
);

/// Embedded-volume signature stored in `drEmbedSigWord` when an HFS+
/// volume lives inside an HFS wrapper.
pub const EMBED_SIGNATURE_HFSPLUS: u16 = 0x482B; // "H+"

pub const HFS_MAX_NAME_BYTES: usize = 31;
pub const HFS_INLINE_EXTENTS: usize = 3;

/// Record type tags (`cdrType`) for classic catalog data records.
pub const CDR_DIR: u8 = 1;
pub const CDR_FIL: u8 = 2;
pub const CDR_THD: u8 = 3;
pub const CDR_FTHD: u8 = 4;

/// One allocation-block run. Classic HFS extents are 16-bit on both
/// sides, widened at the model layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HfsExtentDescriptor {
    pub start_block: u16,
    pub block_count: u16,
}

pub const HFS_EXTENT_DESCRIPTOR_SIZE: usize = 4;
pub const HFS_EXTENT_RECORD_SIZE: usize = HFS_EXTENT_DESCRIPTOR_SIZE * HFS_INLINE_EXTENTS;

impl HfsExtentDescriptor {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS extent descriptor", data, HFS_EXTENT_DESCRIPTOR_SIZE)?;
        Ok(Self {
            start_block: BigEndian::read_u16(&data[0..2]),
            block_count: BigEndian::read_u16(&data[2..4]),
        })
    }

    pub fn encode(&self) -> [u8; HFS_EXTENT_DESCRIPTOR_SIZE] {
        let mut out = [0u8; HFS_EXTENT_DESCRIPTOR_SIZE];
        BigEndian::write_u16(&mut out[0..2], self.start_block);
        BigEndian::write_u16(&mut out[2..4], self.block_count);
        out
    }
}

pub fn parse_extent_record(
    data: &[u8],
) -> Result<[HfsExtentDescriptor; HFS_INLINE_EXTENTS], CarbonError> {
    ensure_len("HFS extent record", data, HFS_EXTENT_RECORD_SIZE)?;
    Ok([
        HfsExtentDescriptor::parse(&data[0..4])?,
        HfsExtentDescriptor::parse(&data[4..8])?,
        HfsExtentDescriptor::parse(&data[8..12])?,
    ])
}

pub fn encode_extent_record(
    extents: &[HfsExtentDescriptor; HFS_INLINE_EXTENTS],
) -> [u8; HFS_EXTENT_RECORD_SIZE] {
    let mut out = [0u8; HFS_EXTENT_RECORD_SIZE];
    for (i, ext) in extents.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&ext.encode());
    }
    out
}

/// Master Directory Block. Lives at offset 1024 regardless of allocation
/// block size; allocation block N starts at byte
/// `drAlBlSt * 512 + N * drAlBlkSiz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterDirectoryBlock {
    pub signature: u16,
    pub create_date: u32,
    pub modify_date: u32,
    pub attributes: u16,
    pub root_file_count: u16,
    pub bitmap_start: u16,
    pub alloc_ptr: u16,
    pub total_blocks: u16,
    pub block_size: u32,
    pub clump_size: u32,
    pub alloc_start: u16,
    pub next_cnid: u32,
    pub free_blocks: u16,
    /// Volume name field (`drVN`), raw 28 bytes: a Pascal length byte, at
    /// most 27 MacRoman bytes, and whatever tail the formatter left there.
    pub volume_name: [u8; 28],
    pub backup_date: u32,
    pub backup_seq: u16,
    pub write_count: u32,
    pub extents_clump_size: u32,
    pub catalog_clump_size: u32,
    pub root_dir_count: u16,
    pub file_count: u32,
    pub dir_count: u32,
    pub finder_info: [u8; 32],
    pub embed_signature: u16,
    pub embed_extent: HfsExtentDescriptor,
    pub extents_file_size: u32,
    pub extents_file_extents: [HfsExtentDescriptor; HFS_INLINE_EXTENTS],
    pub catalog_file_size: u32,
    pub catalog_file_extents: [HfsExtentDescriptor; HFS_INLINE_EXTENTS],
}

impl MasterDirectoryBlock {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("master directory block", data, MDB_SIZE)?;
        if data[36] as usize > 27 {
            return Err(CarbonError::InvalidVolume(format!(
                "MDB volume name length {} exceeds maximum 27",
                data[36]
            )));
        }
        let mut volume_name = [0u8; 28];
        volume_name.copy_from_slice(&data[36..64]);
        let mut finder_info = [0u8; 32];
        finder_info.copy_from_slice(&data[92..124]);
        Ok(Self {
            signature: BigEndian::read_u16(&data[0..2]),
            create_date: BigEndian::read_u32(&data[2..6]),
            modify_date: BigEndian::read_u32(&data[6..10]),
            attributes: BigEndian::read_u16(&data[10..12]),
            root_file_count: BigEndian::read_u16(&data[12..14]),
            bitmap_start: BigEndian::read_u16(&data[14..16]),
            alloc_ptr: BigEndian::read_u16(&data[16..18]),
            total_blocks: BigEndian::read_u16(&data[18..20]),
            block_size: BigEndian::read_u32(&data[20..24]),
            clump_size: BigEndian::read_u32(&data[24..28]),
            alloc_start: BigEndian::read_u16(&data[28..30]),
            next_cnid: BigEndian::read_u32(&data[30..34]),
            free_blocks: BigEndian::read_u16(&data[34..36]),
            volume_name,
            backup_date: BigEndian::read_u32(&data[64..68]),
            backup_seq: BigEndian::read_u16(&data[68..70]),
            write_count: BigEndian::read_u32(&data[70..74]),
            extents_clump_size: BigEndian::read_u32(&data[74..78]),
            catalog_clump_size: BigEndian::read_u32(&data[78..82]),
            root_dir_count: BigEndian::read_u16(&data[82..84]),
            file_count: BigEndian::read_u32(&data[84..88]),
            dir_count: BigEndian::read_u32(&data[88..92]),
            finder_info,
            embed_signature: BigEndian::read_u16(&data[124..126]),
            embed_extent: HfsExtentDescriptor::parse(&data[126..130])?,
            extents_file_size: BigEndian::read_u32(&data[130..134]),
            extents_file_extents: parse_extent_record(&data[134..146])?,
            catalog_file_size: BigEndian::read_u32(&data[146..150]),
            catalog_file_extents: parse_extent_record(&data[150..162])?,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.signature == MDB_SIGNATURE && self.block_size > 0 && self.block_size % 512 == 0
    }

    /// Volume name payload within the raw `drVN` field.
    pub fn volume_name_bytes(&self) -> &[u8] {
        &self.volume_name[1..1 + self.volume_name[0] as usize]
    }

    /// Build a `drVN` field from at most 27 MacRoman bytes, zero padded.
    pub fn pack_volume_name(name: &[u8]) -> [u8; 28] {
        let mut field = [0u8; 28];
        let len = name.len().min(27);
        field[0] = len as u8;
        field[1..1 + len].copy_from_slice(&name[..len]);
        field
    }

    /// True when this volume is only a shell around an embedded HFS+
    /// volume (`drEmbedSigWord` == "H+").
    pub fn has_embedded_volume(&self) -> bool {
        self.embed_signature == EMBED_SIGNATURE_HFSPLUS
    }

    /// Byte offset of allocation block `block` within the volume.
    pub fn block_offset(&self, block: u64) -> u64 {
        u64::from(self.alloc_start) * 512 + block * u64::from(self.block_size)
    }

    pub fn encode(&self) -> [u8; MDB_SIZE] {
        let mut out = [0u8; MDB_SIZE];
        BigEndian::write_u16(&mut out[0..2], self.signature);
        BigEndian::write_u32(&mut out[2..6], self.create_date);
        BigEndian::write_u32(&mut out[6..10], self.modify_date);
        BigEndian::write_u16(&mut out[10..12], self.attributes);
        BigEndian::write_u16(&mut out[12..14], self.root_file_count);
        BigEndian::write_u16(&mut out[14..16], self.bitmap_start);
        BigEndian::write_u16(&mut out[16..18], self.alloc_ptr);
        BigEndian::write_u16(&mut out[18..20], self.total_blocks);
        BigEndian::write_u32(&mut out[20..24], self.block_size);
        BigEndian::write_u32(&mut out[24..28], self.clump_size);
        BigEndian::write_u16(&mut out[28..30], self.alloc_start);
        BigEndian::write_u32(&mut out[30..34], self.next_cnid);
        BigEndian::write_u16(&mut out[34..36], self.free_blocks);
        out[36..64].copy_from_slice(&self.volume_name);
        BigEndian::write_u32(&mut out[64..68], self.backup_date);
        BigEndian::write_u16(&mut out[68..70], self.backup_seq);
        BigEndian::write_u32(&mut out[70..74], self.write_count);
        BigEndian::write_u32(&mut out[74..78], self.extents_clump_size);
        BigEndian::write_u32(&mut out[78..82], self.catalog_clump_size);
        BigEndian::write_u16(&mut out[82..84], self.root_dir_count);
        BigEndian::write_u32(&mut out[84..88], self.file_count);
        BigEndian::write_u32(&mut out[88..92], self.dir_count);
        out[92..124].copy_from_slice(&self.finder_info);
        BigEndian::write_u16(&mut out[124..126], self.embed_signature);
        out[126..130].copy_from_slice(&self.embed_extent.encode());
        BigEndian::write_u32(&mut out[130..134], self.extents_file_size);
        out[134..146].copy_from_slice(&encode_extent_record(&self.extents_file_extents));
        BigEndian::write_u32(&mut out[146..150], self.catalog_file_size);
        out[150..162].copy_from_slice(&encode_extent_record(&self.catalog_file_extents));
        out
    }
}

/// Classic catalog key: keyLength byte (excluding itself), a reserved
/// byte, the parent CNID, then the node name as a Pascal string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HfsCatalogKey {
    pub parent_id: u32,
    pub name: Vec<u8>,
}

impl HfsCatalogKey {
    /// Returns the key plus the number of bytes consumed from `data`
    /// (1 length byte + keyLength payload bytes).
    pub fn parse(data: &[u8]) -> Result<(Self, usize), CarbonError> {
        ensure_len("HFS catalog key", data, 2)?;
        let key_len = data[0] as usize;
        if key_len < 6 {
            return Err(CarbonError::CorruptTree(format!(
                "HFS catalog key length {key_len} below minimum 6"
            )));
        }
        ensure_len("HFS catalog key", data, 1 + key_len)?;
        let parent_id = BigEndian::read_u32(&data[2..6]);
        let name = parse_pascal_string("HFS catalog key name", &data[6..1 + key_len], HFS_MAX_NAME_BYTES)?;
        Ok((Self { parent_id, name }, 1 + key_len))
    }

    pub fn encode(&self) -> Vec<u8> {
        let key_len = 1 + 4 + 1 + self.name.len();
        let mut out = Vec::with_capacity(1 + key_len);
        out.push(key_len as u8);
        out.push(0); // reserved
        out.extend_from_slice(&self.parent_id.to_be_bytes());
        out.push(self.name.len() as u8);
        out.extend_from_slice(&self.name);
        out
    }
}

/// Classic extents-overflow key: keyLength(=7) u8, fork type u8
/// (0=data, 0xFF=resource), file CNID u32, first allocation block of the
/// file covered by this record u16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HfsExtentKey {
    pub fork_type: u8,
    pub file_id: u32,
    pub start_block: u16,
}

pub const HFS_EXTENT_KEY_SIZE: usize = 8;
pub const HFS_EXTENT_KEY_LENGTH: u8 = 7;

impl HfsExtentKey {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS extent key", data, HFS_EXTENT_KEY_SIZE)?;
        if data[0] != HFS_EXTENT_KEY_LENGTH {
            return Err(CarbonError::CorruptTree(format!(
                "HFS extent key length {} (expected {HFS_EXTENT_KEY_LENGTH})",
                data[0]
            )));
        }
        Ok(Self {
            fork_type: data[1],
            file_id: BigEndian::read_u32(&data[2..6]),
            start_block: BigEndian::read_u16(&data[6..8]),
        })
    }

    pub fn encode(&self) -> [u8; HFS_EXTENT_KEY_SIZE] {
        let mut out = [0u8; HFS_EXTENT_KEY_SIZE];
        out[0] = HFS_EXTENT_KEY_LENGTH;
        out[1] = self.fork_type;
        BigEndian::write_u32(&mut out[2..6], self.file_id);
        BigEndian::write_u16(&mut out[6..8], self.start_block);
        out
    }
}

/// Directory record (`CdrDirRec`, 70 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdrDirRec {
    pub flags: u16,
    pub valence: u16,
    pub dir_id: u32,
    pub create_date: u32,
    pub modify_date: u32,
    pub backup_date: u32,
    pub user_info: [u8; 16],
    pub finder_info: [u8; 16],
    pub reserved: [u8; 16],
}

pub const CDR_DIR_REC_SIZE: usize = 70;
const_assert_eq!(CDR_DIR_REC_SIZE, 2 + 2 + 2 + 4 + 4 + 4 + 4 + 16 + 16 + 16);

impl CdrDirRec {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS directory record", data, CDR_DIR_REC_SIZE)?;
        let mut user_info = [0u8; 16];
        user_info.copy_from_slice(&data[22..38]);
        let mut finder_info = [0u8; 16];
        finder_info.copy_from_slice(&data[38..54]);
        let mut reserved = [0u8; 16];
        reserved.copy_from_slice(&data[54..70]);
        Ok(Self {
            flags: BigEndian::read_u16(&data[2..4]),
            valence: BigEndian::read_u16(&data[4..6]),
            dir_id: BigEndian::read_u32(&data[6..10]),
            create_date: BigEndian::read_u32(&data[10..14]),
            modify_date: BigEndian::read_u32(&data[14..18]),
            backup_date: BigEndian::read_u32(&data[18..22]),
            user_info,
            finder_info,
            reserved,
        })
    }

    pub fn encode(&self) -> [u8; CDR_DIR_REC_SIZE] {
        let mut out = [0u8; CDR_DIR_REC_SIZE];
        out[0] = CDR_DIR;
        BigEndian::write_u16(&mut out[2..4], self.flags);
        BigEndian::write_u16(&mut out[4..6], self.valence);
        BigEndian::write_u32(&mut out[6..10], self.dir_id);
        BigEndian::write_u32(&mut out[10..14], self.create_date);
        BigEndian::write_u32(&mut out[14..18], self.modify_date);
        BigEndian::write_u32(&mut out[18..22], self.backup_date);
        out[22..38].copy_from_slice(&self.user_info);
        out[38..54].copy_from_slice(&self.finder_info);
        out[54..70].copy_from_slice(&self.reserved);
        out
    }
}

/// File record (`CdrFilRec`, 102 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdrFilRec {
    pub flags: u8,
    pub file_type: u8,
    pub user_info: [u8; 16],
    pub file_id: u32,
    pub data_start_block: u16,
    pub data_logical_size: u32,
    pub data_physical_size: u32,
    pub rsrc_start_block: u16,
    pub rsrc_logical_size: u32,
    pub rsrc_physical_size: u32,
    pub create_date: u32,
    pub modify_date: u32,
    pub backup_date: u32,
    pub finder_info: [u8; 16],
    pub clump_size: u16,
    pub data_extents: [HfsExtentDescriptor; HFS_INLINE_EXTENTS],
    pub rsrc_extents: [HfsExtentDescriptor; HFS_INLINE_EXTENTS],
    pub reserved: u32,
}

pub const CDR_FIL_REC_SIZE: usize = 102;
const_assert_eq!(
    CDR_FIL_REC_SIZE,
    1 + 1 + 1 + 1 + 16 + 4 + 2 + 4 + 4 + 2 + 4 + 4 + 4 + 4 + 4 + 16 + 2 + 12 + 12 + 4
);

impl CdrFilRec {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS file record", data, CDR_FIL_REC_SIZE)?;
        let mut user_info = [0u8; 16];
        user_info.copy_from_slice(&data[4..20]);
        let mut finder_info = [0u8; 16];
        finder_info.copy_from_slice(&data[56..72]);
        Ok(Self {
            flags: data[2],
            file_type: data[3],
            user_info,
            file_id: BigEndian::read_u32(&data[20..24]),
            data_start_block: BigEndian::read_u16(&data[24..26]),
            data_logical_size: BigEndian::read_u32(&data[26..30]),
            data_physical_size: BigEndian::read_u32(&data[30..34]),
            rsrc_start_block: BigEndian::read_u16(&data[34..36]),
            rsrc_logical_size: BigEndian::read_u32(&data[36..40]),
            rsrc_physical_size: BigEndian::read_u32(&data[40..44]),
            create_date: BigEndian::read_u32(&data[44..48]),
            modify_date: BigEndian::read_u32(&data[48..52]),
            backup_date: BigEndian::read_u32(&data[52..56]),
            finder_info,
            clump_size: BigEndian::read_u16(&data[72..74]),
            data_extents: parse_extent_record(&data[74..86])?,
            rsrc_extents: parse_extent_record(&data[86..98])?,
            reserved: BigEndian::read_u32(&data[98..102]),
        })
    }

    pub fn encode(&self) -> [u8; CDR_FIL_REC_SIZE] {
        let mut out = [0u8; CDR_FIL_REC_SIZE];
        out[0] = CDR_FIL;
        out[2] = self.flags;
        out[3] = self.file_type;
        out[4..20].copy_from_slice(&self.user_info);
        BigEndian::write_u32(&mut out[20..24], self.file_id);
        BigEndian::write_u16(&mut out[24..26], self.data_start_block);
        BigEndian::write_u32(&mut out[26..30], self.data_logical_size);
        BigEndian::write_u32(&mut out[30..34], self.data_physical_size);
        BigEndian::write_u16(&mut out[34..36], self.rsrc_start_block);
        BigEndian::write_u32(&mut out[36..40], self.rsrc_logical_size);
        BigEndian::write_u32(&mut out[40..44], self.rsrc_physical_size);
        BigEndian::write_u32(&mut out[44..48], self.create_date);
        BigEndian::write_u32(&mut out[48..52], self.modify_date);
        BigEndian::write_u32(&mut out[52..56], self.backup_date);
        out[56..72].copy_from_slice(&self.finder_info);
        BigEndian::write_u16(&mut out[72..74], self.clump_size);
        out[74..86].copy_from_slice(&encode_extent_record(&self.data_extents));
        out[86..98].copy_from_slice(&encode_extent_record(&self.rsrc_extents));
        BigEndian::write_u32(&mut out[98..102], self.reserved);
        out
    }
}

/// Thread record (`CdrThdRec`/`CdrFThdRec`, 46 bytes; the directory and
/// file variants share a layout and differ only in `cdrType`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdrThdRec {
    pub is_file_thread: bool,
    /// `thdResrv`, kept as read so re-encoding is byte exact.
    pub reserved: [u8; 8],
    pub parent_id: u32,
    pub name: Vec<u8>,
}

pub const CDR_THD_REC_SIZE: usize = 46;
const_assert_eq!(CDR_THD_REC_SIZE, 1 + 1 + 8 + 4 + 32);

impl CdrThdRec {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS thread record", data, CDR_THD_REC_SIZE)?;
        let is_file_thread = match data[0] {
            CDR_THD => false,
            CDR_FTHD => true,
            other => {
                return Err(CarbonError::CorruptTree(format!(
                    "thread record with type tag {other:#04x}"
                )))
            }
        };
        let name = parse_pascal_string("HFS thread name", &data[14..46], HFS_MAX_NAME_BYTES)?;
        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[2..10]);
        Ok(Self {
            is_file_thread,
            reserved,
            parent_id: BigEndian::read_u32(&data[10..14]),
            name,
        })
    }

    pub fn encode(&self) -> [u8; CDR_THD_REC_SIZE] {
        let mut out = [0u8; CDR_THD_REC_SIZE];
        out[0] = if self.is_file_thread { CDR_FTHD } else { CDR_THD };
        out[2..10].copy_from_slice(&self.reserved);
        BigEndian::write_u32(&mut out[10..14], self.parent_id);
        out[14] = self.name.len() as u8;
        out[15..15 + self.name.len()].copy_from_slice(&self.name);
        out
    }
}

/// Catalog data record, discriminated by the leading `cdrType` byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HfsCatalogData {
    Dir(CdrDirRec),
    File(CdrFilRec),
    Thread(CdrThdRec),
}

impl HfsCatalogData {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS catalog data record", data, 1)?;
        match data[0] {
            CDR_DIR => Ok(HfsCatalogData::Dir(CdrDirRec::parse(data)?)),
            CDR_FIL => Ok(HfsCatalogData::File(CdrFilRec::parse(data)?)),
            CDR_THD | CDR_FTHD => Ok(HfsCatalogData::Thread(CdrThdRec::parse(data)?)),
            other => Err(CarbonError::CorruptTree(format!(
                "unknown HFS catalog record type {other:#04x}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_extents() -> [HfsExtentDescriptor; 3] {
        [
            HfsExtentDescriptor { start_block: 10, block_count: 4 },
            HfsExtentDescriptor { start_block: 0, block_count: 0 },
            HfsExtentDescriptor { start_block: 0, block_count: 0 },
        ]
    }

    #[test]
    fn mdb_round_trip() {
        let mdb = MasterDirectoryBlock {
            signature: MDB_SIGNATURE,
            create_date: 0xD0000000,
            modify_date: 0xD0000001,
            attributes: 0x0100,
            root_file_count: 2,
            bitmap_start: 3,
            alloc_ptr: 0,
            total_blocks: 1000,
            block_size: 512,
            clump_size: 2048,
            alloc_start: 16,
            next_cnid: 40,
            free_blocks: 900,
            volume_name: MasterDirectoryBlock::pack_volume_name(b"Macintosh HD"),
            backup_date: 0,
            backup_seq: 0,
            write_count: 7,
            extents_clump_size: 2048,
            catalog_clump_size: 2048,
            root_dir_count: 1,
            file_count: 5,
            dir_count: 2,
            finder_info: [0; 32],
            embed_signature: 0,
            embed_extent: HfsExtentDescriptor { start_block: 0, block_count: 0 },
            extents_file_size: 2048,
            extents_file_extents: sample_extents(),
            catalog_file_size: 2048,
            catalog_file_extents: sample_extents(),
        };
        assert!(mdb.is_valid());
        assert!(!mdb.has_embedded_volume());
        let bytes = mdb.encode();
        assert_eq!(MasterDirectoryBlock::parse(&bytes).unwrap(), mdb);
    }

    #[test]
    fn mdb_block_offset_uses_512_byte_units() {
        let mut mdb = {
            let bytes = [0u8; MDB_SIZE];
            MasterDirectoryBlock::parse(&bytes).unwrap()
        };
        mdb.alloc_start = 16;
        mdb.block_size = 1024;
        assert_eq!(mdb.block_offset(0), 16 * 512);
        assert_eq!(mdb.block_offset(3), 16 * 512 + 3 * 1024);
    }

    #[test]
    fn catalog_key_round_trip() {
        let key = HfsCatalogKey {
            parent_id: 2,
            name: b"System Folder".to_vec(),
        };
        let bytes = key.encode();
        let (parsed, consumed) = HfsCatalogKey::parse(&bytes).unwrap();
        assert_eq!(parsed, key);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn catalog_key_rejects_undersized_length() {
        assert!(HfsCatalogKey::parse(&[3, 0, 0, 0]).is_err());
    }

    #[test]
    fn extent_key_round_trip() {
        let key = HfsExtentKey { fork_type: 0, file_id: 21, start_block: 3 };
        assert_eq!(HfsExtentKey::parse(&key.encode()).unwrap(), key);
    }

    #[test]
    fn file_record_round_trip() {
        let rec = CdrFilRec {
            flags: 0,
            file_type: 0,
            user_info: [0; 16],
            file_id: 21,
            data_start_block: 0,
            data_logical_size: 10,
            data_physical_size: 512,
            rsrc_start_block: 0,
            rsrc_logical_size: 0,
            rsrc_physical_size: 0,
            create_date: 1,
            modify_date: 2,
            backup_date: 0,
            finder_info: [0; 16],
            clump_size: 0,
            data_extents: sample_extents(),
            rsrc_extents: sample_extents(),
            reserved: 0,
        };
        let bytes = rec.encode();
        match HfsCatalogData::parse(&bytes).unwrap() {
            HfsCatalogData::File(parsed) => assert_eq!(parsed, rec),
            other => panic!("expected file record, got {other:?}"),
        }
    }

    #[test]
    fn thread_record_round_trip() {
        let rec = CdrThdRec {
            is_file_thread: true,
            reserved: [0; 8],
            parent_id: 20,
            name: b"a.txt".to_vec(),
        };
        let bytes = rec.encode();
        match HfsCatalogData::parse(&bytes).unwrap() {
            HfsCatalogData::Thread(parsed) => assert_eq!(parsed, rec),
            other => panic!("expected thread record, got {other:?}"),
        }
    }

    #[test]
    fn mdb_preserves_volume_name_padding() {
        let mut bytes = [0u8; MDB_SIZE];
        BigEndian::write_u16(&mut bytes[0..2], MDB_SIGNATURE);
        BigEndian::write_u32(&mut bytes[20..24], 512);
        bytes[36] = 3;
        bytes[37..40].copy_from_slice(b"Vol");
        // Junk past the name payload must survive a re-encode.
        for (i, b) in bytes[40..64].iter_mut().enumerate() {
            *b = 0xA0 + i as u8;
        }
        let mdb = MasterDirectoryBlock::parse(&bytes).unwrap();
        assert_eq!(mdb.volume_name_bytes(), b"Vol");
        assert_eq!(mdb.encode(), bytes);
    }

    #[test]
    fn mdb_rejects_oversized_volume_name() {
        let mut bytes = [0u8; MDB_SIZE];
        BigEndian::write_u16(&mut bytes[0..2], MDB_SIGNATURE);
        bytes[36] = 28;
        assert!(MasterDirectoryBlock::parse(&bytes).is_err());
    }

    #[test]
    fn thread_record_preserves_reserved_bytes() {
        let mut bytes = [0u8; CDR_THD_REC_SIZE];
        bytes[0] = CDR_THD;
        bytes[2..10].copy_from_slice(&[0xDE; 8]);
        BigEndian::write_u32(&mut bytes[10..14], 2);
        bytes[14] = 4;
        bytes[15..19].copy_from_slice(b"Docs");
        let rec = CdrThdRec::parse(&bytes).unwrap();
        assert_eq!(rec.reserved, [0xDE; 8]);
        assert_eq!(rec.encode(), bytes);
    }

    #[test]
    fn unknown_record_tag_is_corruption() {
        assert!(matches!(
            HfsCatalogData::parse(&[9u8; CDR_FIL_REC_SIZE]),
            Err(CarbonError::CorruptTree(_))
        ));
    }
}

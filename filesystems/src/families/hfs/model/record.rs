//! Unified catalog leaf records: folder, file, and thread views that
//! dispatch over the classic and HFS+ encodings.

use carbon_core::CarbonError;
use chrono::{DateTime, Utc};

use crate::families::hfs::structs::hfs::{
    CdrDirRec, CdrFilRec, CdrThdRec, HfsCatalogData, HfsExtentDescriptor,
};
use crate::families::hfs::structs::hfsplus::{
    BsdInfo, HfsPlusCatalogData, HfsPlusCatalogFile, HfsPlusCatalogFolder, HfsPlusCatalogThread,
    HfsPlusExtentDescriptor, FLAG_HAS_LINK_CHAIN,
};
use crate::families::hfs::structs::{FinderFileInfo, FourCC};
use crate::families::hfs::{macroman, unicode};

use super::{hfs_time_to_utc, Cnid, HfsFormat};

/// Finder type/creator pairs marking HFS+ link files.
const LINK_FILE_TYPE: FourCC = FourCC::new(b"hlnk");
const LINK_FILE_CREATOR: FourCC = FourCC::new(b"hfs+");
const LINK_DIR_TYPE: FourCC = FourCC::new(b"fdrp");
const LINK_DIR_CREATOR: FourCC = FourCC::new(b"MACS");

/// Which byte stream of a file. The raw value is the fork-type byte
/// used in extents-overflow keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForkKind {
    Data,
    Resource,
}

impl ForkKind {
    pub fn raw(self) -> u8 {
        match self {
            ForkKind::Data => 0x00,
            ForkKind::Resource => 0xFF,
        }
    }
}

/// A contiguous allocation-block run, widened to 32 bits for both
/// formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtentDescriptor {
    pub start_block: u32,
    pub block_count: u32,
}

impl From<HfsExtentDescriptor> for ExtentDescriptor {
    fn from(e: HfsExtentDescriptor) -> Self {
        ExtentDescriptor {
            start_block: u32::from(e.start_block),
            block_count: u32::from(e.block_count),
        }
    }
}

impl From<HfsPlusExtentDescriptor> for ExtentDescriptor {
    fn from(e: HfsPlusExtentDescriptor) -> Self {
        ExtentDescriptor {
            start_block: e.start_block,
            block_count: e.block_count,
        }
    }
}

/// Drop trailing empty slots from an inline extent record.
fn compact<T: Copy + Into<ExtentDescriptor>>(extents: &[T]) -> Vec<ExtentDescriptor> {
    extents
        .iter()
        .map(|&e| e.into())
        .filter(|e| e.block_count > 0)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogFolder {
    Hfs(CdrDirRec),
    HfsPlus(HfsPlusCatalogFolder),
}

impl CatalogFolder {
    pub fn format(&self) -> HfsFormat {
        match self {
            CatalogFolder::Hfs(_) => HfsFormat::Hfs,
            CatalogFolder::HfsPlus(_) => HfsFormat::HfsPlus,
        }
    }

    pub fn id(&self) -> Cnid {
        match self {
            CatalogFolder::Hfs(r) => r.dir_id,
            CatalogFolder::HfsPlus(r) => r.folder_id,
        }
    }

    /// Number of direct children, as recorded on disk.
    pub fn valence(&self) -> u32 {
        match self {
            CatalogFolder::Hfs(r) => u32::from(r.valence),
            CatalogFolder::HfsPlus(r) => r.valence,
        }
    }

    pub fn create_date(&self) -> Option<DateTime<Utc>> {
        let raw = match self {
            CatalogFolder::Hfs(r) => r.create_date,
            CatalogFolder::HfsPlus(r) => r.create_date,
        };
        hfs_time_to_utc(raw)
    }

    pub fn content_mod_date(&self) -> Option<DateTime<Utc>> {
        let raw = match self {
            CatalogFolder::Hfs(r) => r.modify_date,
            CatalogFolder::HfsPlus(r) => r.content_mod_date,
        };
        hfs_time_to_utc(raw)
    }

    pub fn backup_date(&self) -> Option<DateTime<Utc>> {
        let raw = match self {
            CatalogFolder::Hfs(r) => r.backup_date,
            CatalogFolder::HfsPlus(r) => r.backup_date,
        };
        hfs_time_to_utc(raw)
    }

    /// Classic HFS keeps no access date; the content-modify date stands
    /// in when absent.
    pub fn has_access_date(&self) -> bool {
        matches!(self, CatalogFolder::HfsPlus(_))
    }

    pub fn access_date(&self) -> Option<DateTime<Utc>> {
        match self {
            CatalogFolder::Hfs(_) => self.content_mod_date(),
            CatalogFolder::HfsPlus(r) => hfs_time_to_utc(r.access_date),
        }
    }

    pub fn has_attribute_mod_date(&self) -> bool {
        matches!(self, CatalogFolder::HfsPlus(_))
    }

    pub fn attribute_mod_date(&self) -> Option<DateTime<Utc>> {
        match self {
            CatalogFolder::Hfs(_) => self.content_mod_date(),
            CatalogFolder::HfsPlus(r) => hfs_time_to_utc(r.attribute_mod_date),
        }
    }

    pub fn has_permissions(&self) -> bool {
        matches!(self, CatalogFolder::HfsPlus(_))
    }

    pub fn permissions(&self) -> Result<BsdInfo, CarbonError> {
        match self {
            CatalogFolder::Hfs(_) => Err(CarbonError::UnsupportedOperation(
                "classic HFS folders carry no POSIX permissions",
            )),
            CatalogFolder::HfsPlus(r) => Ok(r.permissions),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogFile {
    Hfs(CdrFilRec),
    HfsPlus(HfsPlusCatalogFile),
}

impl CatalogFile {
    pub fn format(&self) -> HfsFormat {
        match self {
            CatalogFile::Hfs(_) => HfsFormat::Hfs,
            CatalogFile::HfsPlus(_) => HfsFormat::HfsPlus,
        }
    }

    pub fn id(&self) -> Cnid {
        match self {
            CatalogFile::Hfs(r) => r.file_id,
            CatalogFile::HfsPlus(r) => r.file_id,
        }
    }

    pub fn fork_logical_size(&self, fork: ForkKind) -> u64 {
        match (self, fork) {
            (CatalogFile::Hfs(r), ForkKind::Data) => u64::from(r.data_logical_size),
            (CatalogFile::Hfs(r), ForkKind::Resource) => u64::from(r.rsrc_logical_size),
            (CatalogFile::HfsPlus(r), ForkKind::Data) => r.data_fork.logical_size,
            (CatalogFile::HfsPlus(r), ForkKind::Resource) => r.resource_fork.logical_size,
        }
    }

    /// Inline extents from the catalog record, trailing empty slots
    /// dropped.
    pub fn inline_extents(&self, fork: ForkKind) -> Vec<ExtentDescriptor> {
        match (self, fork) {
            (CatalogFile::Hfs(r), ForkKind::Data) => compact(&r.data_extents),
            (CatalogFile::Hfs(r), ForkKind::Resource) => compact(&r.rsrc_extents),
            (CatalogFile::HfsPlus(r), ForkKind::Data) => compact(&r.data_fork.extents),
            (CatalogFile::HfsPlus(r), ForkKind::Resource) => compact(&r.resource_fork.extents),
        }
    }

    pub fn create_date(&self) -> Option<DateTime<Utc>> {
        let raw = match self {
            CatalogFile::Hfs(r) => r.create_date,
            CatalogFile::HfsPlus(r) => r.create_date,
        };
        hfs_time_to_utc(raw)
    }

    pub fn content_mod_date(&self) -> Option<DateTime<Utc>> {
        let raw = match self {
            CatalogFile::Hfs(r) => r.modify_date,
            CatalogFile::HfsPlus(r) => r.content_mod_date,
        };
        hfs_time_to_utc(raw)
    }

    pub fn backup_date(&self) -> Option<DateTime<Utc>> {
        let raw = match self {
            CatalogFile::Hfs(r) => r.backup_date,
            CatalogFile::HfsPlus(r) => r.backup_date,
        };
        hfs_time_to_utc(raw)
    }

    pub fn has_access_date(&self) -> bool {
        matches!(self, CatalogFile::HfsPlus(_))
    }

    pub fn access_date(&self) -> Option<DateTime<Utc>> {
        match self {
            CatalogFile::Hfs(_) => self.content_mod_date(),
            CatalogFile::HfsPlus(r) => hfs_time_to_utc(r.access_date),
        }
    }

    pub fn has_permissions(&self) -> bool {
        matches!(self, CatalogFile::HfsPlus(_))
    }

    pub fn permissions(&self) -> Result<BsdInfo, CarbonError> {
        match self {
            CatalogFile::Hfs(_) => Err(CarbonError::UnsupportedOperation(
                "classic HFS files carry no POSIX permissions",
            )),
            CatalogFile::HfsPlus(r) => Ok(r.permissions),
        }
    }

    /// Finder type/creator block. Both formats store a 16-byte FInfo.
    pub fn finder_info(&self) -> Result<FinderFileInfo, CarbonError> {
        match self {
            CatalogFile::Hfs(r) => FinderFileInfo::parse(&r.user_info),
            CatalogFile::HfsPlus(r) => FinderFileInfo::parse(&r.user_info),
        }
    }

    /// HFS+ hard-link file: Finder type/creator equal "hlnk"/"hfs+".
    pub fn is_hard_link(&self) -> bool {
        match self {
            CatalogFile::Hfs(_) => false,
            CatalogFile::HfsPlus(_) => self
                .finder_info()
                .map(|fi| fi.file_type == LINK_FILE_TYPE && fi.creator == LINK_FILE_CREATOR)
                .unwrap_or(false),
        }
    }

    /// HFS+ directory hard link: "fdrp"/"MACS" plus the link-chain flag.
    pub fn is_directory_hard_link(&self) -> bool {
        match self {
            CatalogFile::Hfs(_) => false,
            CatalogFile::HfsPlus(r) => {
                r.flags & FLAG_HAS_LINK_CHAIN != 0
                    && self
                        .finder_info()
                        .map(|fi| fi.file_type == LINK_DIR_TYPE && fi.creator == LINK_DIR_CREATOR)
                        .unwrap_or(false)
            }
        }
    }

    /// Symlink per the POSIX type bits of the file mode. Classic HFS has
    /// no mode, so never.
    pub fn is_symlink(&self) -> bool {
        match self {
            CatalogFile::Hfs(_) => false,
            CatalogFile::HfsPlus(r) => r.permissions.is_symlink(),
        }
    }

    /// For hard links, the CNID of the indirect node file this link
    /// points at (the BSD info "special" union holds the inode number).
    pub fn hard_link_target(&self) -> Option<Cnid> {
        match self {
            CatalogFile::Hfs(_) => None,
            CatalogFile::HfsPlus(r) => {
                if self.is_hard_link() || self.is_directory_hard_link() {
                    Some(r.permissions.special)
                } else {
                    None
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogThread {
    Hfs(CdrThdRec),
    HfsPlus(HfsPlusCatalogThread),
}

impl CatalogThread {
    /// The true parent CNID of the entry this thread describes.
    pub fn parent_id(&self) -> Cnid {
        match self {
            CatalogThread::Hfs(r) => r.parent_id,
            CatalogThread::HfsPlus(r) => r.parent_id,
        }
    }

    /// The entry's name under that parent.
    pub fn name(&self) -> String {
        match self {
            CatalogThread::Hfs(r) => macroman::decode(&r.name),
            CatalogThread::HfsPlus(r) => unicode::units_to_name(&r.name),
        }
    }

    pub fn is_file_thread(&self) -> bool {
        match self {
            CatalogThread::Hfs(r) => r.is_file_thread,
            CatalogThread::HfsPlus(r) => r.is_file_thread,
        }
    }
}

/// A catalog leaf record's data portion, unified across formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogRecord {
    Folder(CatalogFolder),
    File(CatalogFile),
    Thread(CatalogThread),
}

impl CatalogRecord {
    pub fn parse(format: HfsFormat, data: &[u8]) -> Result<Self, CarbonError> {
        match format {
            HfsFormat::Hfs => Ok(match HfsCatalogData::parse(data)? {
                HfsCatalogData::Dir(r) => CatalogRecord::Folder(CatalogFolder::Hfs(r)),
                HfsCatalogData::File(r) => CatalogRecord::File(CatalogFile::Hfs(r)),
                HfsCatalogData::Thread(r) => CatalogRecord::Thread(CatalogThread::Hfs(r)),
            }),
            HfsFormat::HfsPlus => Ok(match HfsPlusCatalogData::parse(data)? {
                HfsPlusCatalogData::Folder(r) => {
                    CatalogRecord::Folder(CatalogFolder::HfsPlus(r))
                }
                HfsPlusCatalogData::File(r) => CatalogRecord::File(CatalogFile::HfsPlus(r)),
                HfsPlusCatalogData::Thread(r) => {
                    CatalogRecord::Thread(CatalogThread::HfsPlus(r))
                }
            }),
        }
    }

    pub fn as_folder(&self) -> Option<&CatalogFolder> {
        match self {
            CatalogRecord::Folder(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&CatalogFile> {
        match self {
            CatalogRecord::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_thread(&self) -> Option<&CatalogThread> {
        match self {
            CatalogRecord::Thread(t) => Some(t),
            _ => None,
        }
    }
}

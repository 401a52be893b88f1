//! Unified volume header and B-tree header views.

use carbon_core::CarbonError;
use chrono::{DateTime, Utc};

use crate::families::hfs::macroman;
use crate::families::hfs::structs::btree::{HfsBTreeHeaderRec, HfsPlusBTreeHeaderRec};
use crate::families::hfs::structs::hfs::MasterDirectoryBlock;
use crate::families::hfs::structs::hfsplus::VolumeHeader as HfsPlusVolumeHeader;

use super::record::ExtentDescriptor;
use super::{hfs_time_to_utc, Cnid, HfsFormat, KeyCompare};

/// Location of one of the special files (catalog, extents overflow,
/// and the HFS+-only allocation/attributes/startup files): logical byte
/// length plus the inline extents from the volume header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialFork {
    pub logical_size: u64,
    pub extents: Vec<ExtentDescriptor>,
}

/// Volume header unified across the Master Directory Block and the HFS+
/// Volume Header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeMeta {
    Hfs(MasterDirectoryBlock),
    HfsPlus(HfsPlusVolumeHeader),
}

impl VolumeMeta {
    pub fn format(&self) -> HfsFormat {
        match self {
            VolumeMeta::Hfs(_) => HfsFormat::Hfs,
            VolumeMeta::HfsPlus(_) => HfsFormat::HfsPlus,
        }
    }

    pub fn is_hfsx(&self) -> bool {
        match self {
            VolumeMeta::Hfs(_) => false,
            VolumeMeta::HfsPlus(vh) => vh.is_hfsx(),
        }
    }

    pub fn block_size(&self) -> u32 {
        match self {
            VolumeMeta::Hfs(mdb) => mdb.block_size,
            VolumeMeta::HfsPlus(vh) => vh.block_size,
        }
    }

    pub fn total_blocks(&self) -> u64 {
        match self {
            VolumeMeta::Hfs(mdb) => u64::from(mdb.total_blocks),
            VolumeMeta::HfsPlus(vh) => u64::from(vh.total_blocks),
        }
    }

    pub fn free_blocks(&self) -> u64 {
        match self {
            VolumeMeta::Hfs(mdb) => u64::from(mdb.free_blocks),
            VolumeMeta::HfsPlus(vh) => u64::from(vh.free_blocks),
        }
    }

    pub fn next_cnid(&self) -> Cnid {
        match self {
            VolumeMeta::Hfs(mdb) => mdb.next_cnid,
            VolumeMeta::HfsPlus(vh) => vh.next_cnid,
        }
    }

    pub fn create_date(&self) -> Option<DateTime<Utc>> {
        let raw = match self {
            VolumeMeta::Hfs(mdb) => mdb.create_date,
            VolumeMeta::HfsPlus(vh) => vh.create_date,
        };
        hfs_time_to_utc(raw)
    }

    pub fn modify_date(&self) -> Option<DateTime<Utc>> {
        let raw = match self {
            VolumeMeta::Hfs(mdb) => mdb.modify_date,
            VolumeMeta::HfsPlus(vh) => vh.modify_date,
        };
        hfs_time_to_utc(raw)
    }

    pub fn backup_date(&self) -> Option<DateTime<Utc>> {
        let raw = match self {
            VolumeMeta::Hfs(mdb) => mdb.backup_date,
            VolumeMeta::HfsPlus(vh) => vh.backup_date,
        };
        hfs_time_to_utc(raw)
    }

    /// The classic MDB stores the volume name inline; HFS+ keeps it in
    /// the root folder's thread record instead.
    pub fn inline_volume_name(&self) -> Option<String> {
        match self {
            VolumeMeta::Hfs(mdb) => Some(macroman::decode(mdb.volume_name_bytes())),
            VolumeMeta::HfsPlus(_) => None,
        }
    }

    /// Byte offset of allocation block `block` within the volume region.
    /// HFS offsets from `drAlBlSt` 512-byte units; HFS+ numbers blocks
    /// from the start of the volume.
    pub fn block_offset(&self, block: u64) -> u64 {
        match self {
            VolumeMeta::Hfs(mdb) => mdb.block_offset(block),
            VolumeMeta::HfsPlus(vh) => vh.block_offset(block),
        }
    }

    pub fn catalog_fork(&self) -> SpecialFork {
        match self {
            VolumeMeta::Hfs(mdb) => SpecialFork {
                logical_size: u64::from(mdb.catalog_file_size),
                extents: mdb.catalog_file_extents.iter().map(|&e| e.into()).collect(),
            },
            VolumeMeta::HfsPlus(vh) => SpecialFork {
                logical_size: vh.catalog_file.logical_size,
                extents: vh.catalog_file.extents.iter().map(|&e| e.into()).collect(),
            },
        }
    }

    pub fn extents_fork(&self) -> SpecialFork {
        match self {
            VolumeMeta::Hfs(mdb) => SpecialFork {
                logical_size: u64::from(mdb.extents_file_size),
                extents: mdb.extents_file_extents.iter().map(|&e| e.into()).collect(),
            },
            VolumeMeta::HfsPlus(vh) => SpecialFork {
                logical_size: vh.extents_file.logical_size,
                extents: vh.extents_file.extents.iter().map(|&e| e.into()).collect(),
            },
        }
    }

    pub fn allocation_fork(&self) -> Result<SpecialFork, CarbonError> {
        self.plus_fork("classic HFS has no allocation file", |vh| &vh.allocation_file)
    }

    pub fn attributes_fork(&self) -> Result<SpecialFork, CarbonError> {
        self.plus_fork("classic HFS has no attributes file", |vh| &vh.attributes_file)
    }

    pub fn startup_fork(&self) -> Result<SpecialFork, CarbonError> {
        self.plus_fork("classic HFS has no startup file", |vh| &vh.startup_file)
    }

    fn plus_fork(
        &self,
        unsupported: &'static str,
        pick: impl Fn(&HfsPlusVolumeHeader) -> &crate::families::hfs::structs::hfsplus::ForkData,
    ) -> Result<SpecialFork, CarbonError> {
        match self {
            VolumeMeta::Hfs(_) => Err(CarbonError::UnsupportedOperation(unsupported)),
            VolumeMeta::HfsPlus(vh) => {
                let fork = pick(vh);
                Ok(SpecialFork {
                    logical_size: fork.logical_size,
                    extents: fork.extents.iter().map(|&e| e.into()).collect(),
                })
            }
        }
    }

    /// For an HFS wrapper volume: the allocation-block extent holding
    /// the embedded HFS+ volume, surfaced so an upstream layer can
    /// re-slice and reopen it. This layer does not recurse into it.
    pub fn embedded_volume_extent(&self) -> Option<ExtentDescriptor> {
        match self {
            VolumeMeta::Hfs(mdb) if mdb.has_embedded_volume() => Some(mdb.embed_extent.into()),
            _ => None,
        }
    }
}

/// B-tree header record unified across formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeHeader {
    Hfs(HfsBTreeHeaderRec),
    HfsPlus(HfsPlusBTreeHeaderRec),
}

impl TreeHeader {
    pub fn depth(&self) -> u16 {
        match self {
            TreeHeader::Hfs(h) => h.depth,
            TreeHeader::HfsPlus(h) => h.depth,
        }
    }

    pub fn root_node(&self) -> u32 {
        match self {
            TreeHeader::Hfs(h) => h.root_node,
            TreeHeader::HfsPlus(h) => h.root_node,
        }
    }

    pub fn leaf_records(&self) -> u32 {
        match self {
            TreeHeader::Hfs(h) => h.leaf_records,
            TreeHeader::HfsPlus(h) => h.leaf_records,
        }
    }

    pub fn first_leaf_node(&self) -> u32 {
        match self {
            TreeHeader::Hfs(h) => h.first_leaf_node,
            TreeHeader::HfsPlus(h) => h.first_leaf_node,
        }
    }

    pub fn last_leaf_node(&self) -> u32 {
        match self {
            TreeHeader::Hfs(h) => h.last_leaf_node,
            TreeHeader::HfsPlus(h) => h.last_leaf_node,
        }
    }

    pub fn node_size(&self) -> u16 {
        match self {
            TreeHeader::Hfs(h) => h.node_size,
            TreeHeader::HfsPlus(h) => h.node_size,
        }
    }

    pub fn total_nodes(&self) -> u32 {
        match self {
            TreeHeader::Hfs(h) => h.total_nodes,
            TreeHeader::HfsPlus(h) => h.total_nodes,
        }
    }

    pub fn free_nodes(&self) -> u32 {
        match self {
            TreeHeader::Hfs(h) => h.free_nodes,
            TreeHeader::HfsPlus(h) => h.free_nodes,
        }
    }

    /// Name ordering declared by the tree. Classic trees have no
    /// keyCompareType field; binary comparison is the assumed rule.
    pub fn key_compare(&self) -> Result<KeyCompare, CarbonError> {
        match self {
            TreeHeader::Hfs(_) => Ok(KeyCompare::Binary),
            TreeHeader::HfsPlus(h) => KeyCompare::from_raw(h.key_compare_type),
        }
    }

    /// Structural sanity checks performed once at tree bootstrap.
    pub fn validate(&self) -> Result<(), CarbonError> {
        let node_size = self.node_size();
        if node_size < 512 || !node_size.is_power_of_two() {
            return Err(CarbonError::InvalidTree(format!(
                "node size {node_size} is not a power of two >= 512"
            )));
        }
        if self.root_node() == 0 && self.leaf_records() > 0 {
            return Err(CarbonError::InvalidTree(format!(
                "tree claims {} leaf records but no root node",
                self.leaf_records()
            )));
        }
        Ok(())
    }
}

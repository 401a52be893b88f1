//! Catalog and extent keys unified across formats, with the ordering
//! rules each B-tree uses.

use std::cmp::Ordering;

use carbon_core::CarbonError;

use crate::families::hfs::structs::btree::{KEY_COMPARE_BINARY, KEY_COMPARE_CASE_FOLDING};
use crate::families::hfs::structs::hfs::{HfsCatalogKey, HfsExtentKey};
use crate::families::hfs::structs::hfsplus::{HfsPlusCatalogKey, HfsPlusExtentKey};
use crate::families::hfs::{macroman, unicode};

use super::Cnid;

/// Name ordering for an HFS+ catalog tree, from the header record's
/// keyCompareType. Classic HFS always uses binary comparison — the
/// reference material calls this "probably binary compare" without a
/// definitive citation, so it is an assumption, pinned by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCompare {
    CaseFolding,
    Binary,
}

impl KeyCompare {
    pub fn from_raw(raw: u8) -> Result<Self, CarbonError> {
        match raw {
            KEY_COMPARE_CASE_FOLDING => Ok(KeyCompare::CaseFolding),
            KEY_COMPARE_BINARY => Ok(KeyCompare::Binary),
            other => Err(CarbonError::InvalidTree(format!(
                "unknown key compare type {other:#04x}"
            ))),
        }
    }
}

/// A catalog key: (parent CNID, node name), tagged by format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogKey {
    Hfs(HfsCatalogKey),
    HfsPlus(HfsPlusCatalogKey),
}

impl CatalogKey {
    pub fn parent_id(&self) -> Cnid {
        match self {
            CatalogKey::Hfs(k) => k.parent_id,
            CatalogKey::HfsPlus(k) => k.parent_id,
        }
    }

    /// Name decoded for display (MacRoman or UTF-16 per format).
    pub fn name(&self) -> String {
        match self {
            CatalogKey::Hfs(k) => macroman::decode(&k.name),
            CatalogKey::HfsPlus(k) => unicode::units_to_name(&k.name),
        }
    }

    pub fn is_empty_name(&self) -> bool {
        match self {
            CatalogKey::Hfs(k) => k.name.is_empty(),
            CatalogKey::HfsPlus(k) => k.name.is_empty(),
        }
    }

    /// Total ordering within one tree: parent CNID first (unsigned),
    /// then the name per format rule. Comparing keys of different
    /// formats is a caller bug and reports corruption rather than
    /// panicking.
    pub fn compare(&self, other: &CatalogKey, mode: KeyCompare) -> Result<Ordering, CarbonError> {
        match (self, other) {
            (CatalogKey::Hfs(a), CatalogKey::Hfs(b)) => Ok(a
                .parent_id
                .cmp(&b.parent_id)
                .then_with(|| a.name.cmp(&b.name))),
            (CatalogKey::HfsPlus(a), CatalogKey::HfsPlus(b)) => {
                Ok(a.parent_id.cmp(&b.parent_id).then_with(|| match mode {
                    KeyCompare::Binary => unicode::compare_binary(&a.name, &b.name),
                    KeyCompare::CaseFolding => unicode::compare_folded(&a.name, &b.name),
                }))
            }
            _ => Err(CarbonError::CorruptTree(
                "catalog key format mismatch in comparison".into(),
            )),
        }
    }
}

/// An extents-overflow key: (fork type, file CNID, first file block of
/// the fragment run), tagged by format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentKey {
    Hfs(HfsExtentKey),
    HfsPlus(HfsPlusExtentKey),
}

impl ExtentKey {
    pub fn file_id(&self) -> Cnid {
        match self {
            ExtentKey::Hfs(k) => k.file_id,
            ExtentKey::HfsPlus(k) => k.file_id,
        }
    }

    pub fn fork_type(&self) -> u8 {
        match self {
            ExtentKey::Hfs(k) => k.fork_type,
            ExtentKey::HfsPlus(k) => k.fork_type,
        }
    }

    pub fn start_block(&self) -> u32 {
        match self {
            ExtentKey::Hfs(k) => u32::from(k.start_block),
            ExtentKey::HfsPlus(k) => k.start_block,
        }
    }

    /// Both formats order extent keys by (file CNID, fork type, start
    /// block), all unsigned.
    pub fn compare(&self, other: &ExtentKey) -> Result<Ordering, CarbonError> {
        match (self, other) {
            (ExtentKey::Hfs(_), ExtentKey::Hfs(_))
            | (ExtentKey::HfsPlus(_), ExtentKey::HfsPlus(_)) => Ok(self
                .file_id()
                .cmp(&other.file_id())
                .then_with(|| self.fork_type().cmp(&other.fork_type()))
                .then_with(|| self.start_block().cmp(&other.start_block()))),
            _ => Err(CarbonError::CorruptTree(
                "extent key format mismatch in comparison".into(),
            )),
        }
    }
}

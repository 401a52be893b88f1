//! Format-agnostic view over the HFS and HFS+ on-disk structures.
//!
//! Every entity here is a closed two-variant enum tagged by format;
//! accessors dispatch by pattern match. Fields one format lacks either
//! return a documented stand-in (paired with a `has_*` predicate) or an
//! `UnsupportedOperation` error.

pub mod header;
pub mod key;
pub mod record;

use chrono::{DateTime, Utc};

pub use header::{SpecialFork, TreeHeader, VolumeMeta};
pub use key::{CatalogKey, ExtentKey, KeyCompare};
pub use record::{
    CatalogFile, CatalogFolder, CatalogRecord, CatalogThread, ExtentDescriptor, ForkKind,
};

/// Catalog node ID. 32 bits on disk for both formats; arithmetic on
/// CNIDs is held in u64 by callers that need it.
pub type Cnid = u32;

pub const CNID_ROOT_PARENT: Cnid = 1;
pub const CNID_ROOT_FOLDER: Cnid = 2;
pub const CNID_EXTENTS_FILE: Cnid = 3;
pub const CNID_CATALOG_FILE: Cnid = 4;
pub const CNID_BAD_BLOCKS_FILE: Cnid = 5;
pub const CNID_ALLOCATION_FILE: Cnid = 6;
pub const CNID_STARTUP_FILE: Cnid = 7;
pub const CNID_ATTRIBUTES_FILE: Cnid = 8;
pub const CNID_REPAIR_CATALOG_FILE: Cnid = 14;
pub const CNID_BOGUS_EXTENT_FILE: Cnid = 15;
pub const CNID_FIRST_USER: Cnid = 16;

/// The two catalog encodings. HFSX is the `HfsPlus` variant with a
/// binary key comparator; it is a tree property, not a third format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HfsFormat {
    Hfs,
    HfsPlus,
}

/// Seconds between the HFS epoch (1904-01-01T00:00:00) and the Unix
/// epoch.
const HFS_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Convert an on-disk HFS timestamp to UTC. Zero means "never set" and
/// maps to None. HFS stores local time and HFS+ stores GMT; no timezone
/// correction is attempted for the classic format.
pub fn hfs_time_to_utc(secs: u32) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(i64::from(secs) - HFS_EPOCH_OFFSET, 0)
}

//! Read-only access to Apple HFS, HFS+, and HFSX volumes.
//!
//! Layered bottom-up: `structs` decodes raw on-disk layouts, `model`
//! unifies the two formats behind tagged enums, `btree` walks the
//! node-based trees, `catalog`/`extents` specialize the two trees every
//! volume carries, and `volume` ties it all together behind the facade
//! external tooling consumes.

pub mod btree;
pub mod catalog;
pub mod extents;
pub mod fork;
pub mod macroman;
pub mod model;
pub mod structs;
pub mod unicode;
pub mod volume;

pub use catalog::{Catalog, DirEntry, ListingPolicy};
pub use extents::ExtentsOverflow;
pub use fork::ForkStream;
pub use model::{
    CatalogFile, CatalogFolder, CatalogKey, CatalogRecord, CatalogThread, Cnid,
    ExtentDescriptor, ForkKind, HfsFormat, KeyCompare, VolumeMeta,
};
pub use volume::HfsVolume;

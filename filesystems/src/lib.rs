// Filesystem families organization
pub mod families;

pub mod detection;

// HFS family: classic HFS, HFS+, HFSX
pub use families::hfs::{
    Catalog, CatalogFile, CatalogFolder, CatalogKey, CatalogRecord, CatalogThread, Cnid,
    DirEntry, ExtentDescriptor, ExtentsOverflow, ForkKind, ForkStream, HfsFormat, HfsVolume,
    KeyCompare, ListingPolicy, VolumeMeta,
};

pub use detection::{detect, detect_from, DetectedFormat};

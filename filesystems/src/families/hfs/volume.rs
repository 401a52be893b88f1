//! Volume facade: signature detection, header validation, and the
//! catalog/extent operations consumed by browsers and extractors.

use std::sync::Arc;

use carbon_core::{CarbonError, DataLocator};
use log::{debug, info};

use super::catalog::{Catalog, DirEntry, ListingPolicy};
use super::extents::ExtentsOverflow;
use super::fork::ForkStream;
use super::model::{
    CatalogFile, CatalogFolder, CatalogRecord, Cnid, ExtentDescriptor, ForkKind, HfsFormat,
    SpecialFork, VolumeMeta, CNID_CATALOG_FILE, CNID_ROOT_FOLDER,
};
use super::structs::hfs::{MasterDirectoryBlock, MDB_SIGNATURE};
use super::structs::hfsplus::{VolumeHeader, HFSPLUS_SIGNATURE, HFSX_SIGNATURE};

/// Byte offset of the volume header region in every format.
pub const HEADER_OFFSET: u64 = 1024;

/// An open, read-only HFS/HFS+/HFSX volume.
pub struct HfsVolume {
    meta: VolumeMeta,
    catalog: Catalog,
    extents: ExtentsOverflow,
    listing_policy: ListingPolicy,
}

impl HfsVolume {
    /// Detect the format from the signature at offset 1024, validate the
    /// header, and bootstrap the catalog and extents-overflow trees from
    /// the header's special-file fork locations.
    pub fn open(locator: Arc<dyn DataLocator>) -> Result<Self, CarbonError> {
        let header_block = locator.read_vec(HEADER_OFFSET, 512)?;
        let signature = u16::from_be_bytes([header_block[0], header_block[1]]);
        let meta = match signature {
            MDB_SIGNATURE => {
                let mdb = MasterDirectoryBlock::parse(&header_block)?;
                if !mdb.is_valid() {
                    return Err(CarbonError::InvalidVolume(
                        "master directory block fails sanity checks".into(),
                    ));
                }
                if mdb.has_embedded_volume() {
                    // The embedded HFS+ region is surfaced through
                    // embedded_volume_extent(); re-slicing is upstream's
                    // concern.
                    info!("HFS wrapper volume with embedded HFS+ data");
                }
                VolumeMeta::Hfs(mdb)
            }
            HFSPLUS_SIGNATURE | HFSX_SIGNATURE => {
                let vh = VolumeHeader::parse(&header_block)?;
                if !vh.is_valid() {
                    return Err(CarbonError::InvalidVolume(
                        "volume header fails sanity checks".into(),
                    ));
                }
                VolumeMeta::HfsPlus(vh)
            }
            other => {
                return Err(CarbonError::InvalidVolume(format!(
                    "no HFS family signature at offset 1024 (found {other:#06x})"
                )))
            }
        };
        let format = meta.format();
        debug!(
            "opening {:?} volume: block size {}, {} blocks",
            format,
            meta.block_size(),
            meta.total_blocks()
        );

        // The extents tree first: the catalog file's own extent list may
        // continue there.
        let mut extents = ExtentsOverflow::open(
            special_fork_stream(&locator, &meta, &meta.extents_fork()),
            format,
        )?;

        let catalog_fork = meta.catalog_fork();
        let catalog_blocks = blocks_for(catalog_fork.logical_size, meta.block_size());
        let catalog_extents = extents.all_extents(
            CNID_CATALOG_FILE,
            ForkKind::Data,
            &catalog_fork.extents,
            catalog_blocks,
        )?;
        let catalog = Catalog::open(
            ForkStream::new(
                Arc::clone(&locator),
                catalog_extents,
                meta.block_offset(0),
                meta.block_size(),
                catalog_fork.logical_size,
            ),
            format,
        )?;

        Ok(Self {
            meta,
            catalog,
            extents,
            listing_policy: ListingPolicy::default(),
        })
    }

    /// Convenience constructor keeping the locator type concrete.
    pub fn open_locator<L: DataLocator + 'static>(locator: L) -> Result<Self, CarbonError> {
        Self::open(Arc::new(locator))
    }

    pub fn with_listing_policy(mut self, policy: ListingPolicy) -> Self {
        self.listing_policy = policy;
        self
    }

    pub fn meta(&self) -> &VolumeMeta {
        &self.meta
    }

    pub fn format(&self) -> HfsFormat {
        self.meta.format()
    }

    pub fn is_hfsx(&self) -> bool {
        self.meta.is_hfsx()
    }

    /// The volume's name: inline in the classic MDB, otherwise the root
    /// folder's thread record name.
    pub fn volume_name(&mut self) -> Result<String, CarbonError> {
        if let Some(name) = self.meta.inline_volume_name() {
            return Ok(name);
        }
        match self.catalog.thread(CNID_ROOT_FOLDER)? {
            Some(thread) => Ok(thread.name()),
            None => Err(CarbonError::CorruptTree(
                "catalog has no thread record for the root folder".into(),
            )),
        }
    }

    /// The root folder record (CNID 2).
    pub fn root_folder(&mut self) -> Result<CatalogFolder, CarbonError> {
        match self.entry(CNID_ROOT_FOLDER)? {
            Some(CatalogRecord::Folder(folder)) => Ok(folder),
            Some(_) => Err(CarbonError::CorruptTree(
                "root CNID resolves to a non-folder record".into(),
            )),
            None => Err(CarbonError::CorruptTree(
                "catalog has no root folder record".into(),
            )),
        }
    }

    /// Resolve any entry by CNID: thread record first for the true
    /// (parent, name), then the regular lookup.
    pub fn entry(&mut self, cnid: Cnid) -> Result<Option<CatalogRecord>, CarbonError> {
        let Some((parent, name)) = self.catalog.parent_of(cnid)? else {
            return Ok(None);
        };
        self.catalog.lookup(parent, &name)
    }

    /// Lookup by (parent CNID, name).
    pub fn lookup(
        &mut self,
        parent_id: Cnid,
        name: &str,
    ) -> Result<Option<CatalogRecord>, CarbonError> {
        self.catalog.lookup(parent_id, name)
    }

    /// Reverse lookup: (parent CNID, name) for an entry.
    pub fn parent_of(&mut self, cnid: Cnid) -> Result<Option<(Cnid, String)>, CarbonError> {
        self.catalog.parent_of(cnid)
    }

    /// All children of a folder, honoring the volume's listing policy.
    pub fn list_folder(&mut self, cnid: Cnid) -> Result<Vec<DirEntry>, CarbonError> {
        let policy = self.listing_policy;
        self.catalog.list_children(cnid, policy)
    }

    pub fn fork_len(&self, file: &CatalogFile, fork: ForkKind) -> u64 {
        file.fork_logical_size(fork)
    }

    /// A fork's complete extent list: inline extents plus any overflow
    /// fragments.
    pub fn fork_extents(
        &mut self,
        file: &CatalogFile,
        fork: ForkKind,
    ) -> Result<Vec<ExtentDescriptor>, CarbonError> {
        let total_blocks = blocks_for(file.fork_logical_size(fork), self.meta.block_size());
        self.extents
            .all_extents(file.id(), fork, &file.inline_extents(fork), total_blocks)
    }

    /// A readable stream over a file fork's content.
    pub fn fork_stream(
        &mut self,
        locator: Arc<dyn DataLocator>,
        file: &CatalogFile,
        fork: ForkKind,
    ) -> Result<ForkStream, CarbonError> {
        let extents = self.fork_extents(file, fork)?;
        Ok(ForkStream::new(
            locator,
            extents,
            self.meta.block_offset(0),
            self.meta.block_size(),
            file.fork_logical_size(fork),
        ))
    }
}

/// Allocation blocks needed to hold `logical_size` bytes.
fn blocks_for(logical_size: u64, block_size: u32) -> u64 {
    let block_size = u64::from(block_size);
    logical_size.div_ceil(block_size)
}

fn special_fork_stream(
    locator: &Arc<dyn DataLocator>,
    meta: &VolumeMeta,
    fork: &SpecialFork,
) -> ForkStream {
    let extents: Vec<ExtentDescriptor> = fork
        .extents
        .iter()
        .copied()
        .filter(|e| e.block_count > 0)
        .collect();
    ForkStream::new(
        Arc::clone(locator),
        extents,
        meta.block_offset(0),
        meta.block_size(),
        fork.logical_size,
    )
}

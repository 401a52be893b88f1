//! Catalog file access: key construction, single-entry lookup, child
//! listing, and thread-based reverse lookup.

use std::cmp::Ordering;

use carbon_core::CarbonError;
use log::warn;

use super::btree::{BTree, TreeOps};
use super::fork::ForkStream;
use super::model::{
    CatalogKey, CatalogRecord, CatalogThread, Cnid, HfsFormat, KeyCompare,
};
use super::structs::hfs::{HfsCatalogKey, HFS_MAX_NAME_BYTES};
use super::structs::hfsplus::{HfsPlusCatalogKey, HFSPLUS_MAX_NAME_UNITS};
use super::{macroman, unicode};

/// How a bulk listing treats a catalog entry whose data record fails to
/// decode. Single-entry lookups always fail loudly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingPolicy {
    /// Abort the listing with the decode error.
    #[default]
    Fail,
    /// Log the entry and leave it out of the result.
    SkipCorrupt,
}

/// One child of a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub record: CatalogRecord,
}

/// Key/record codecs for the catalog tree. The comparator is carried
/// explicitly; HFSX selects binary mode through the tree header.
pub struct CatalogTreeOps {
    format: HfsFormat,
    compare: KeyCompare,
}

impl TreeOps for CatalogTreeOps {
    type Key = CatalogKey;
    type Record = CatalogRecord;

    fn parse_key(&self, data: &[u8]) -> Result<(CatalogKey, usize), CarbonError> {
        match self.format {
            HfsFormat::Hfs => {
                let (key, consumed) = HfsCatalogKey::parse(data)?;
                Ok((CatalogKey::Hfs(key), consumed))
            }
            HfsFormat::HfsPlus => {
                let (key, consumed) = HfsPlusCatalogKey::parse(data)?;
                Ok((CatalogKey::HfsPlus(key), consumed))
            }
        }
    }

    fn parse_record(&self, data: &[u8]) -> Result<CatalogRecord, CarbonError> {
        CatalogRecord::parse(self.format, data)
    }

    fn compare(&self, a: &CatalogKey, b: &CatalogKey) -> Result<Ordering, CarbonError> {
        a.compare(b, self.compare)
    }

    fn aligns_to_even(&self) -> bool {
        self.format == HfsFormat::Hfs
    }
}

/// Read-only view of a volume's catalog B-tree.
pub struct Catalog {
    tree: BTree<CatalogTreeOps>,
    format: HfsFormat,
}

impl Catalog {
    /// Open the catalog over its fork. The name comparator is taken from
    /// the tree's own header record after bootstrap (HFSX volumes may
    /// declare binary comparison there).
    pub fn open(fork: ForkStream, format: HfsFormat) -> Result<Self, CarbonError> {
        let ops = CatalogTreeOps {
            format,
            compare: KeyCompare::Binary,
        };
        let mut tree = BTree::open(ops, fork, format)?;
        let compare = tree.header().key_compare()?;
        tree.ops_mut().compare = compare;
        Ok(Self { tree, format })
    }

    pub fn key_compare(&self) -> KeyCompare {
        self.tree.ops().compare
    }

    /// Build a search key for (parent, name). Returns None when the name
    /// cannot exist on this format (not MacRoman-encodable, or too long),
    /// which makes the corresponding lookup a clean NotFound.
    pub fn make_key(&self, parent_id: Cnid, name: &str) -> Option<CatalogKey> {
        match self.format {
            HfsFormat::Hfs => {
                let bytes = macroman::encode(name)?;
                if bytes.len() > HFS_MAX_NAME_BYTES {
                    return None;
                }
                Some(CatalogKey::Hfs(HfsCatalogKey { parent_id, name: bytes }))
            }
            HfsFormat::HfsPlus => {
                let units = unicode::name_to_units(name);
                if units.len() > HFSPLUS_MAX_NAME_UNITS {
                    return None;
                }
                Some(CatalogKey::HfsPlus(HfsPlusCatalogKey { parent_id, name: units }))
            }
        }
    }

    fn empty_key(&self, parent_id: Cnid) -> CatalogKey {
        match self.format {
            HfsFormat::Hfs => CatalogKey::Hfs(HfsCatalogKey { parent_id, name: Vec::new() }),
            HfsFormat::HfsPlus => {
                CatalogKey::HfsPlus(HfsPlusCatalogKey { parent_id, name: Vec::new() })
            }
        }
    }

    /// Single-entry lookup by (parent, name).
    pub fn lookup(
        &mut self,
        parent_id: Cnid,
        name: &str,
    ) -> Result<Option<CatalogRecord>, CarbonError> {
        let Some(key) = self.make_key(parent_id, name) else {
            return Ok(None);
        };
        self.tree.search(&key)
    }

    /// The thread record for a CNID. Threads are keyed under the child's
    /// OWN CNID with an empty name, not under the true parent; the
    /// returned record's fields hold the real (parent, name) pair.
    pub fn thread(&mut self, cnid: Cnid) -> Result<Option<CatalogThread>, CarbonError> {
        let key = self.empty_key(cnid);
        match self.tree.search(&key)? {
            Some(CatalogRecord::Thread(thread)) => Ok(Some(thread)),
            Some(_) => Err(CarbonError::CorruptTree(format!(
                "record at thread key for CNID {cnid} is not a thread"
            ))),
            None => Ok(None),
        }
    }

    /// Reverse lookup: the (parent CNID, name) of an entry.
    pub fn parent_of(&mut self, cnid: Cnid) -> Result<Option<(Cnid, String)>, CarbonError> {
        Ok(self
            .thread(cnid)?
            .map(|t| (t.parent_id(), t.name())))
    }

    /// All folder/file children of a folder, in catalog key order.
    /// Children form one contiguous key run starting at (parent, "");
    /// the thread record at that key is skipped.
    pub fn list_children(
        &mut self,
        parent_id: Cnid,
        policy: ListingPolicy,
    ) -> Result<Vec<DirEntry>, CarbonError> {
        let start = self.empty_key(parent_id);
        let mut pos = self.tree.lower_bound(&start)?;
        let mut entries = Vec::new();
        while let Some((key, record)) = self.tree.scan_next_lenient(&mut pos)? {
            if key.parent_id() != parent_id {
                break;
            }
            let record = match record {
                Ok(record) => record,
                Err(e) => match policy {
                    ListingPolicy::Fail => return Err(e),
                    ListingPolicy::SkipCorrupt => {
                        warn!(
                            "skipping corrupt catalog entry {:?} under CNID {parent_id}: {e}",
                            key.name()
                        );
                        continue;
                    }
                },
            };
            if matches!(record, CatalogRecord::Thread(_)) {
                continue;
            }
            entries.push(DirEntry { name: key.name(), record });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::hfs::model::{CatalogFolder, CNID_ROOT_FOLDER, CNID_ROOT_PARENT};
    use crate::families::hfs::structs::btree::{
        NodeDescriptor, NodeKind, KEY_COMPARE_CASE_FOLDING, NODE_DESCRIPTOR_SIZE,
    };
    use crate::families::hfs::structs::hfs::{CdrDirRec, CdrThdRec, CDR_DIR};
    use crate::families::hfs::structs::hfsplus::{
        BsdInfo, ForkData, HfsPlusCatalogFile, HfsPlusCatalogFolder, HfsPlusCatalogThread,
        HfsPlusExtentDescriptor,
    };
    use crate::families::hfs::model::ExtentDescriptor;
    use carbon_core::BufferDataLocator;
    use std::sync::Arc;

    const NODE_SIZE: usize = 512;

    fn build_node(
        kind: NodeKind,
        height: i8,
        forward_link: u32,
        records: &[Vec<u8>],
    ) -> Vec<u8> {
        let mut node = vec![0u8; NODE_SIZE];
        let desc = NodeDescriptor {
            forward_link,
            backward_link: 0,
            kind: kind.to_raw(),
            height,
            num_records: records.len() as u16,
            reserved: 0,
        };
        node[..NODE_DESCRIPTOR_SIZE].copy_from_slice(&desc.encode());
        let mut off = NODE_DESCRIPTOR_SIZE;
        for (i, rec) in records.iter().enumerate() {
            node[off..off + rec.len()].copy_from_slice(rec);
            let slot = NODE_SIZE - 2 * (i + 1);
            node[slot..slot + 2].copy_from_slice(&(off as u16).to_be_bytes());
            off += rec.len();
        }
        let sentinel = NODE_SIZE - 2 * (records.len() + 1);
        node[sentinel..sentinel + 2].copy_from_slice(&(off as u16).to_be_bytes());
        node
    }

    fn header_node(root: u32, depth: u16, leaves: (u32, u32), leaf_records: u32, total: u32, compare: u8) -> Vec<u8> {
        let mut raw = [0u8; 106];
        raw[0..2].copy_from_slice(&depth.to_be_bytes());
        raw[2..6].copy_from_slice(&root.to_be_bytes());
        raw[6..10].copy_from_slice(&leaf_records.to_be_bytes());
        raw[10..14].copy_from_slice(&leaves.0.to_be_bytes());
        raw[14..18].copy_from_slice(&leaves.1.to_be_bytes());
        raw[18..20].copy_from_slice(&(NODE_SIZE as u16).to_be_bytes());
        raw[22..26].copy_from_slice(&total.to_be_bytes());
        raw[37] = compare;
        build_node(NodeKind::Header, 0, 0, &[raw.to_vec(), vec![0u8; 128], vec![0u8; 8]])
    }

    fn open_catalog(nodes: Vec<Vec<u8>>, format: HfsFormat) -> Catalog {
        let total = nodes.len() as u32;
        let image: Vec<u8> = nodes.into_iter().flatten().collect();
        let len = image.len() as u64;
        let fork = ForkStream::new(
            Arc::new(BufferDataLocator::new(image)),
            vec![ExtentDescriptor { start_block: 0, block_count: total }],
            0,
            NODE_SIZE as u32,
            len,
        );
        Catalog::open(fork, format).unwrap()
    }

    fn plus_key(parent: u32, name: &str) -> Vec<u8> {
        HfsPlusCatalogKey {
            parent_id: parent,
            name: name.encode_utf16().collect(),
        }
        .encode()
    }

    fn plus_folder(id: u32) -> Vec<u8> {
        HfsPlusCatalogFolder {
            flags: 0,
            valence: 1,
            folder_id: id,
            create_date: 1,
            content_mod_date: 2,
            attribute_mod_date: 2,
            access_date: 2,
            backup_date: 0,
            permissions: BsdInfo {
                owner_id: 0,
                group_id: 0,
                admin_flags: 0,
                owner_flags: 0,
                file_mode: 0o040755,
                special: 0,
            },
            user_info: [0; 16],
            finder_info: [0; 16],
            text_encoding: 0,
            reserved: 0,
        }
        .encode()
        .to_vec()
    }

    fn plus_file(id: u32, size: u64) -> Vec<u8> {
        let mut extents = [HfsPlusExtentDescriptor { start_block: 0, block_count: 0 }; 8];
        extents[0] = HfsPlusExtentDescriptor { start_block: 100, block_count: 1 };
        HfsPlusCatalogFile {
            flags: 0,
            reserved1: 0,
            file_id: id,
            create_date: 1,
            content_mod_date: 2,
            attribute_mod_date: 2,
            access_date: 2,
            backup_date: 0,
            permissions: BsdInfo {
                owner_id: 0,
                group_id: 0,
                admin_flags: 0,
                owner_flags: 0,
                file_mode: 0o100644,
                special: 0,
            },
            user_info: [0; 16],
            finder_info: [0; 16],
            text_encoding: 0,
            reserved2: 0,
            data_fork: ForkData {
                logical_size: size,
                clump_size: 0,
                total_blocks: 1,
                extents,
            },
            resource_fork: ForkData {
                logical_size: 0,
                clump_size: 0,
                total_blocks: 0,
                extents: [HfsPlusExtentDescriptor { start_block: 0, block_count: 0 }; 8],
            },
        }
        .encode()
        .to_vec()
    }

    fn plus_thread(parent: u32, name: &str, file: bool) -> Vec<u8> {
        HfsPlusCatalogThread {
            is_file_thread: file,
            reserved: 0,
            parent_id: parent,
            name: name.encode_utf16().collect(),
        }
        .encode()
    }

    fn record(key: Vec<u8>, data: Vec<u8>) -> Vec<u8> {
        let mut r = key;
        r.extend_from_slice(&data);
        r
    }

    /// Root (CNID 2) holding folder "Documents" (CNID 20) holding file
    /// "a.txt" (CNID 21). Thread records keyed under each entry's own
    /// CNID with an empty name.
    fn sample_catalog() -> Catalog {
        let leaf = build_node(
            NodeKind::Leaf,
            1,
            0,
            &[
                record(plus_key(CNID_ROOT_FOLDER, ""), plus_thread(CNID_ROOT_PARENT, "MyVol", false)),
                record(plus_key(CNID_ROOT_FOLDER, "Documents"), plus_folder(20)),
                record(plus_key(20, ""), plus_thread(CNID_ROOT_FOLDER, "Documents", false)),
                record(plus_key(20, "a.txt"), plus_file(21, 10)),
            ],
        );
        let nodes = vec![
            header_node(1, 1, (1, 1), 4, 2, KEY_COMPARE_CASE_FOLDING),
            leaf,
        ];
        open_catalog(nodes, HfsFormat::HfsPlus)
    }

    #[test]
    fn lookup_finds_folder_and_file() {
        let mut catalog = sample_catalog();
        let rec = catalog.lookup(CNID_ROOT_FOLDER, "Documents").unwrap().unwrap();
        assert_eq!(rec.as_folder().unwrap().id(), 20);
        let rec = catalog.lookup(20, "a.txt").unwrap().unwrap();
        assert_eq!(rec.as_file().unwrap().id(), 21);
        assert!(catalog.lookup(20, "b.txt").unwrap().is_none());
    }

    #[test]
    fn case_folded_lookup_matches_other_case() {
        let mut catalog = sample_catalog();
        assert_eq!(catalog.key_compare(), KeyCompare::CaseFolding);
        let rec = catalog.lookup(CNID_ROOT_FOLDER, "DOCUMENTS").unwrap().unwrap();
        assert_eq!(rec.as_folder().unwrap().id(), 20);
    }

    #[test]
    fn list_children_skips_threads_and_stops_at_parent_boundary() {
        let mut catalog = sample_catalog();
        let root = catalog.list_children(CNID_ROOT_FOLDER, ListingPolicy::Fail).unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].name, "Documents");
        let docs = catalog.list_children(20, ListingPolicy::Fail).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "a.txt");
        assert_eq!(
            docs[0].record.as_file().unwrap().fork_logical_size(
                crate::families::hfs::model::ForkKind::Data
            ),
            10
        );
        assert!(catalog.list_children(99, ListingPolicy::Fail).unwrap().is_empty());
    }

    #[test]
    fn thread_resolves_parent_and_name() {
        let mut catalog = sample_catalog();
        assert_eq!(
            catalog.parent_of(20).unwrap(),
            Some((CNID_ROOT_FOLDER, "Documents".to_string()))
        );
        assert_eq!(
            catalog.parent_of(CNID_ROOT_FOLDER).unwrap(),
            Some((CNID_ROOT_PARENT, "MyVol".to_string()))
        );
        assert_eq!(catalog.parent_of(77).unwrap(), None);
    }

    #[test]
    fn corrupt_entry_respects_listing_policy() {
        // The folder record's type tag is clobbered.
        let mut bad_folder = plus_folder(20);
        bad_folder[0] = 0xEE;
        bad_folder[1] = 0xEE;
        let leaf = build_node(
            NodeKind::Leaf,
            1,
            0,
            &[
                record(plus_key(CNID_ROOT_FOLDER, ""), plus_thread(CNID_ROOT_PARENT, "V", false)),
                record(plus_key(CNID_ROOT_FOLDER, "Bad"), bad_folder),
                record(plus_key(CNID_ROOT_FOLDER, "Docs"), plus_folder(22)),
            ],
        );
        let nodes = vec![
            header_node(1, 1, (1, 1), 3, 2, KEY_COMPARE_CASE_FOLDING),
            leaf,
        ];
        let mut catalog = open_catalog(nodes, HfsFormat::HfsPlus);
        assert!(catalog
            .list_children(CNID_ROOT_FOLDER, ListingPolicy::Fail)
            .is_err());
        let listed = catalog
            .list_children(CNID_ROOT_FOLDER, ListingPolicy::SkipCorrupt)
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Docs");
        // Single-entry lookup must not skip.
        assert!(catalog.lookup(CNID_ROOT_FOLDER, "Bad").is_err());
    }

    #[test]
    fn classic_catalog_honors_even_alignment() {
        // Key (2, "ab") occupies 9 bytes; the directory record starts at
        // byte 10 of the leaf record.
        let key = HfsCatalogKey { parent_id: 2, name: b"ab".to_vec() }.encode();
        assert_eq!(key.len() % 2, 1);
        let mut rec = key;
        rec.push(0); // pad
        rec.extend_from_slice(&{
            let mut dir = [0u8; crate::families::hfs::structs::hfs::CDR_DIR_REC_SIZE];
            dir[0] = CDR_DIR;
            dir[6..10].copy_from_slice(&20u32.to_be_bytes());
            CdrDirRec::parse(&dir).unwrap().encode()
        });
        let thread = {
            let key = HfsCatalogKey { parent_id: 2, name: Vec::new() }.encode();
            let mut r = key;
            r.push(0); // key is 7 bytes, pad to 8
            r.extend_from_slice(
                &CdrThdRec {
                    is_file_thread: false,
                    reserved: [0; 8],
                    parent_id: 1,
                    name: b"Vol".to_vec(),
                }
                .encode(),
            );
            r
        };
        let leaf = build_node(NodeKind::Leaf, 1, 0, &[thread, rec]);
        let nodes = vec![header_node(1, 1, (1, 1), 2, 2, 0), leaf];
        let mut catalog = open_catalog(nodes, HfsFormat::Hfs);
        assert_eq!(catalog.key_compare(), KeyCompare::Binary);
        let found = catalog.lookup(2, "ab").unwrap().unwrap();
        match found {
            CatalogRecord::Folder(CatalogFolder::Hfs(dir)) => assert_eq!(dir.dir_id, 20),
            other => panic!("expected classic folder record, got {other:?}"),
        }
    }
}

//! End-to-end tests over synthetic volume images: open, browse, and
//! resolve extents on HFS+, HFSX, and classic HFS volumes built from the
//! crate's own encoders.

use std::io::Write;
use std::sync::Arc;

use carbon_core::{BufferDataLocator, CarbonError, DataLocator, FileDataLocator};
use tempfile::NamedTempFile;
use carbon_filesystems::families::hfs::structs::btree::{
    NodeDescriptor, NodeKind, KEY_COMPARE_BINARY, KEY_COMPARE_CASE_FOLDING, NODE_DESCRIPTOR_SIZE,
};
use carbon_filesystems::families::hfs::structs::hfs::{
    CdrDirRec, CdrFilRec, CdrThdRec, HfsCatalogKey, HfsExtentDescriptor, MasterDirectoryBlock,
    MDB_SIGNATURE,
};
use carbon_filesystems::families::hfs::structs::hfsplus::{
    encode_extent_record, BsdInfo, ForkData, HfsPlusCatalogFile, HfsPlusCatalogFolder,
    HfsPlusCatalogKey, HfsPlusCatalogThread, HfsPlusExtentDescriptor, HfsPlusExtentKey,
    VolumeHeader, HFSPLUS_SIGNATURE, HFSPLUS_VERSION, HFSX_SIGNATURE, HFSX_VERSION,
};
use carbon_filesystems::{
    detect_from, CatalogRecord, DetectedFormat, ExtentDescriptor, ForkKind, HfsFormat, HfsVolume,
    ListingPolicy,
};

const BLOCK: usize = 512;
const NODE_SIZE: usize = 512;

fn build_node(kind: NodeKind, height: i8, forward_link: u32, records: &[Vec<u8>]) -> Vec<u8> {
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

fn header_node(
    root: u32,
    depth: u16,
    leaves: (u32, u32),
    leaf_records: u32,
    total: u32,
    compare: u8,
) -> Vec<u8> {
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

fn record(key: Vec<u8>, data: Vec<u8>) -> Vec<u8> {
    let mut r = key;
    r.extend_from_slice(&data);
    r
}

fn index_record(key: Vec<u8>, child: u32) -> Vec<u8> {
    record(key, child.to_be_bytes().to_vec())
}

fn zero_fork() -> ForkData {
    ForkData {
        logical_size: 0,
        clump_size: 0,
        total_blocks: 0,
        extents: [HfsPlusExtentDescriptor { start_block: 0, block_count: 0 }; 8],
    }
}

fn fork_at(start_block: u32, block_count: u32, logical_size: u64) -> ForkData {
    let mut fork = zero_fork();
    fork.logical_size = logical_size;
    fork.total_blocks = block_count;
    fork.extents[0] = HfsPlusExtentDescriptor { start_block, block_count };
    fork
}

fn plus_key(parent: u32, name: &str) -> Vec<u8> {
    HfsPlusCatalogKey {
        parent_id: parent,
        name: name.encode_utf16().collect(),
    }
    .encode()
}

fn plus_folder(id: u32, valence: u32) -> Vec<u8> {
    HfsPlusCatalogFolder {
        flags: 0,
        valence,
        folder_id: id,
        create_date: 0xD0000000,
        content_mod_date: 0xD0000001,
        attribute_mod_date: 0xD0000001,
        access_date: 0xD0000001,
        backup_date: 0,
        permissions: BsdInfo {
            owner_id: 501,
            group_id: 20,
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

fn plus_file(id: u32, fork: ForkData) -> Vec<u8> {
    HfsPlusCatalogFile {
        flags: 0,
        reserved1: 0,
        file_id: id,
        create_date: 0xD0000000,
        content_mod_date: 0xD0000001,
        attribute_mod_date: 0xD0000001,
        access_date: 0xD0000001,
        backup_date: 0,
        permissions: BsdInfo {
            owner_id: 501,
            group_id: 20,
            admin_flags: 0,
            owner_flags: 0,
            file_mode: 0o100644,
            special: 0,
        },
        user_info: [0; 16],
        finder_info: [0; 16],
        text_encoding: 0,
        reserved2: 0,
        data_fork: fork,
        resource_fork: zero_fork(),
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

fn overflow_leaf_record(file_id: u32, start_block: u32, runs: &[(u32, u32)]) -> Vec<u8> {
    let key = HfsPlusExtentKey { fork_type: 0, file_id, start_block };
    let mut extents = [HfsPlusExtentDescriptor { start_block: 0, block_count: 0 }; 8];
    for (i, &(start, count)) in runs.iter().enumerate() {
        extents[i] = HfsPlusExtentDescriptor { start_block: start, block_count: count };
    }
    let mut rec = key.encode().to_vec();
    rec.extend_from_slice(&encode_extent_record(&extents));
    rec
}

fn write_blocks(image: &mut [u8], start_block: usize, data: &[u8]) {
    let start = start_block * BLOCK;
    image[start..start + data.len()].copy_from_slice(data);
}

/// A 64-block HFS+ (or HFSX) volume named "MyVol": folder "Documents"
/// (CNID 20) in the root, file "a.txt" (CNID 21, content at block 30)
/// inside it. The catalog spans an index root and two linked leaves so
/// lookups exercise a real descent.
///
/// Catalog nodes: 0 header, 1 index root, 2-3 leaves.
fn build_plus_image(
    hfsx: bool,
    compare: u8,
    overflow_records: &[Vec<u8>],
    a_txt_fork: ForkData,
) -> Vec<u8> {
    let mut image = vec![0u8; 64 * BLOCK];

    let extents_nodes = if overflow_records.is_empty() {
        vec![header_node(0, 0, (0, 0), 0, 1, 0)]
    } else {
        vec![
            header_node(1, 1, (1, 1), overflow_records.len() as u32, 2, 0),
            build_node(NodeKind::Leaf, 1, 0, overflow_records),
        ]
    };
    let extents_block_count = extents_nodes.len() as u32;
    for (i, node) in extents_nodes.iter().enumerate() {
        write_blocks(&mut image, 10 + i, node);
    }

    let index = build_node(
        NodeKind::Index,
        2,
        0,
        &[
            index_record(plus_key(1, "MyVol"), 2),
            index_record(plus_key(20, ""), 3),
        ],
    );
    let leaf1 = build_node(
        NodeKind::Leaf,
        1,
        3,
        &[
            record(plus_key(1, "MyVol"), plus_folder(2, 1)),
            record(plus_key(2, ""), plus_thread(1, "MyVol", false)),
            record(plus_key(2, "Documents"), plus_folder(20, 1)),
        ],
    );
    let leaf2 = build_node(
        NodeKind::Leaf,
        1,
        0,
        &[
            record(plus_key(20, ""), plus_thread(2, "Documents", false)),
            record(plus_key(20, "a.txt"), plus_file(21, a_txt_fork)),
            record(plus_key(21, ""), plus_thread(20, "a.txt", true)),
        ],
    );
    write_blocks(&mut image, 16, &header_node(1, 2, (2, 3), 6, 4, compare));
    write_blocks(&mut image, 17, &index);
    write_blocks(&mut image, 18, &leaf1);
    write_blocks(&mut image, 19, &leaf2);

    write_blocks(&mut image, 30, b"hello hfs+");

    let (signature, version) = if hfsx {
        (HFSX_SIGNATURE, HFSX_VERSION)
    } else {
        (HFSPLUS_SIGNATURE, HFSPLUS_VERSION)
    };
    let vh = VolumeHeader {
        signature,
        version,
        attributes: 0,
        last_mounted_version: 0x31302E30,
        journal_info_block: 0,
        create_date: 0xD0000000,
        modify_date: 0xD0000001,
        backup_date: 0,
        checked_date: 0,
        file_count: 1,
        folder_count: 2,
        block_size: BLOCK as u32,
        total_blocks: 64,
        free_blocks: 20,
        next_allocation: 31,
        rsrc_clump_size: 4096,
        data_clump_size: 4096,
        next_cnid: 22,
        write_count: 1,
        encodings_bitmap: 1,
        finder_info: [0; 32],
        allocation_file: zero_fork(),
        extents_file: fork_at(
            10,
            extents_block_count,
            u64::from(extents_block_count) * BLOCK as u64,
        ),
        catalog_file: fork_at(16, 4, 2048),
        attributes_file: zero_fork(),
        startup_file: zero_fork(),
    };
    image[1024..1536].copy_from_slice(&vh.encode());
    image
}

fn plain_plus_image() -> Vec<u8> {
    build_plus_image(false, KEY_COMPARE_CASE_FOLDING, &[], fork_at(30, 1, 10))
}

fn open(image: Vec<u8>) -> HfsVolume {
    HfsVolume::open(Arc::new(BufferDataLocator::new(image))).unwrap()
}

#[test]
fn hfsplus_volume_walk() {
    let mut volume = open(plain_plus_image());
    assert_eq!(volume.format(), HfsFormat::HfsPlus);
    assert!(!volume.is_hfsx());
    assert_eq!(volume.volume_name().unwrap(), "MyVol");

    let root = volume.root_folder().unwrap();
    assert_eq!(root.id(), 2);
    assert!(root.has_permissions());

    let children = volume.list_folder(2).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name, "Documents");
    assert_eq!(children[0].record.as_folder().unwrap().id(), 20);

    let docs = volume.list_folder(20).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].name, "a.txt");
    let file = docs[0].record.as_file().unwrap().clone();
    assert_eq!(file.id(), 21);
    assert_eq!(volume.fork_len(&file, ForkKind::Data), 10);
    assert_eq!(
        volume.fork_extents(&file, ForkKind::Data).unwrap(),
        vec![ExtentDescriptor { start_block: 30, block_count: 1 }]
    );
}

#[test]
fn hfsplus_entry_by_cnid_and_reverse_lookup() {
    let mut volume = open(plain_plus_image());
    match volume.entry(21).unwrap().unwrap() {
        CatalogRecord::File(file) => assert_eq!(file.id(), 21),
        other => panic!("expected a file record, got {other:?}"),
    }
    assert_eq!(volume.parent_of(21).unwrap(), Some((20, "a.txt".to_string())));
    assert_eq!(volume.parent_of(20).unwrap(), Some((2, "Documents".to_string())));
    assert!(volume.entry(99).unwrap().is_none());
}

#[test]
fn hfsplus_fork_stream_reads_file_content() {
    let locator: Arc<dyn DataLocator> = Arc::new(BufferDataLocator::new(plain_plus_image()));
    let mut volume = HfsVolume::open(Arc::clone(&locator)).unwrap();
    let file = volume
        .lookup(20, "a.txt")
        .unwrap()
        .unwrap()
        .as_file()
        .unwrap()
        .clone();
    let stream = volume.fork_stream(locator, &file, ForkKind::Data).unwrap();
    assert_eq!(stream.len(), 10);
    assert_eq!(stream.read_vec(0, 10).unwrap(), b"hello hfs+");
    assert_eq!(stream.read_vec(6, 4).unwrap(), b"hfs+");
}

#[test]
fn hfsplus_case_folding_lookup() {
    let mut volume = open(plain_plus_image());
    assert!(volume.lookup(2, "DOCUMENTS").unwrap().is_some());
    assert!(volume.lookup(20, "A.TXT").unwrap().is_some());
    assert!(volume.lookup(20, "b.txt").unwrap().is_none());
}

#[test]
fn hfsx_binary_compare_is_case_sensitive() {
    let image = build_plus_image(true, KEY_COMPARE_BINARY, &[], fork_at(30, 1, 10));
    let mut volume = open(image);
    assert!(volume.is_hfsx());
    assert!(volume.lookup(2, "Documents").unwrap().is_some());
    assert!(volume.lookup(2, "DOCUMENTS").unwrap().is_none());
}

#[test]
fn fragmented_fork_pulls_overflow_extents() {
    // "a.txt" claims 3 blocks: one inline, two continued in the overflow
    // tree at file block 1.
    let overflow = vec![overflow_leaf_record(21, 1, &[(40, 2)])];
    let image = build_plus_image(false, KEY_COMPARE_CASE_FOLDING, &overflow, fork_at(30, 1, 1536));

    let mut volume = open(image);
    let file = volume
        .lookup(20, "a.txt")
        .unwrap()
        .unwrap()
        .as_file()
        .unwrap()
        .clone();
    assert_eq!(
        volume.fork_extents(&file, ForkKind::Data).unwrap(),
        vec![
            ExtentDescriptor { start_block: 30, block_count: 1 },
            ExtentDescriptor { start_block: 40, block_count: 2 },
        ]
    );
}

#[test]
fn missing_overflow_fragment_is_an_error() {
    // The fork needs 3 blocks but the overflow tree is empty.
    let image = build_plus_image(false, KEY_COMPARE_CASE_FOLDING, &[], fork_at(30, 1, 1536));
    let mut volume = open(image);
    let file = volume
        .lookup(20, "a.txt")
        .unwrap()
        .unwrap()
        .as_file()
        .unwrap()
        .clone();
    assert!(matches!(
        volume.fork_extents(&file, ForkKind::Data),
        Err(CarbonError::FragmentedExtentMissing { file_id: 21, missing_blocks: 2 })
    ));
}

#[test]
fn detection_classifies_images() {
    let plus = BufferDataLocator::new(plain_plus_image());
    assert_eq!(detect_from(&plus).unwrap(), DetectedFormat::HfsPlus);
    let hfsx =
        BufferDataLocator::new(build_plus_image(true, KEY_COMPARE_BINARY, &[], fork_at(30, 1, 10)));
    assert_eq!(detect_from(&hfsx).unwrap(), DetectedFormat::Hfsx);
    let classic = BufferDataLocator::new(build_classic_image());
    assert_eq!(detect_from(&classic).unwrap(), DetectedFormat::Hfs);
}

#[test]
fn listing_policy_governs_corrupt_entries() {
    // Clobber the type tag of the "Documents" folder record in leaf1
    // (catalog node 2, volume block 18).
    let mut image = plain_plus_image();
    let leaf_base = 18 * BLOCK;
    let before = record(plus_key(1, "MyVol"), plus_folder(2, 1)).len()
        + record(plus_key(2, ""), plus_thread(1, "MyVol", false)).len()
        + plus_key(2, "Documents").len();
    let tag_at = leaf_base + NODE_DESCRIPTOR_SIZE + before;
    image[tag_at] = 0xEE;
    image[tag_at + 1] = 0xEE;

    let mut volume = open(image.clone());
    assert!(volume.list_folder(2).is_err());

    let mut volume = open(image).with_listing_policy(ListingPolicy::SkipCorrupt);
    assert!(volume.list_folder(2).unwrap().is_empty());
}

// ---- classic HFS ----

fn hfs_key(parent: u32, name: &[u8]) -> Vec<u8> {
    let mut key = HfsCatalogKey { parent_id: parent, name: name.to_vec() }.encode();
    if key.len() % 2 == 1 {
        key.push(0); // record data starts on an even offset
    }
    key
}

fn hfs_dir(id: u32, valence: u16) -> Vec<u8> {
    CdrDirRec {
        flags: 0,
        valence,
        dir_id: id,
        create_date: 0xA0000000,
        modify_date: 0xA0000001,
        backup_date: 0,
        user_info: [0; 16],
        finder_info: [0; 16],
        reserved: [0; 16],
    }
    .encode()
    .to_vec()
}

fn hfs_thread(parent: u32, name: &[u8], file: bool) -> Vec<u8> {
    CdrThdRec {
        is_file_thread: file,
        reserved: [0; 8],
        parent_id: parent,
        name: name.to_vec(),
    }
    .encode()
    .to_vec()
}

fn hfs_file(id: u32, start_block: u16, size: u32) -> Vec<u8> {
    let empty = HfsExtentDescriptor { start_block: 0, block_count: 0 };
    CdrFilRec {
        flags: 0,
        file_type: 0,
        user_info: [0; 16],
        file_id: id,
        data_start_block: start_block,
        data_logical_size: size,
        data_physical_size: 512,
        rsrc_start_block: 0,
        rsrc_logical_size: 0,
        rsrc_physical_size: 0,
        create_date: 0xA0000000,
        modify_date: 0xA0000001,
        backup_date: 0,
        finder_info: [0; 16],
        clump_size: 0,
        data_extents: [HfsExtentDescriptor { start_block, block_count: 1 }, empty, empty],
        rsrc_extents: [empty; 3],
        reserved: 0,
    }
    .encode()
    .to_vec()
}

/// A classic HFS volume named "Classic": allocation area at drAlBlSt 16,
/// catalog at allocation blocks 4-5, files "Alpha" and "beta" in the
/// root. Binary MacRoman order puts "Alpha" (0x41...) before "beta"
/// (0x62...).
fn build_classic_image() -> Vec<u8> {
    let alloc_base = 16 * 512;
    let mut image = vec![0u8; alloc_base + 64 * BLOCK];

    // Empty extents-overflow tree at allocation block 0.
    let extents_header = header_node(0, 0, (0, 0), 0, 1, 0);
    image[alloc_base..alloc_base + NODE_SIZE].copy_from_slice(&extents_header);

    let catalog_leaf = build_node(
        NodeKind::Leaf,
        1,
        0,
        &[
            record(hfs_key(1, b"Classic"), hfs_dir(2, 2)),
            record(hfs_key(2, b""), hfs_thread(1, b"Classic", false)),
            record(hfs_key(2, b"Alpha"), hfs_file(17, 30, 5)),
            record(hfs_key(2, b"beta"), hfs_file(18, 31, 4)),
        ],
    );
    let catalog_base = alloc_base + 4 * BLOCK;
    image[catalog_base..catalog_base + NODE_SIZE]
        .copy_from_slice(&header_node(1, 1, (1, 1), 4, 2, 0));
    image[catalog_base + NODE_SIZE..catalog_base + 2 * NODE_SIZE].copy_from_slice(&catalog_leaf);

    let alpha_base = alloc_base + 30 * BLOCK;
    image[alpha_base..alpha_base + 5].copy_from_slice(b"alpha");
    let beta_base = alloc_base + 31 * BLOCK;
    image[beta_base..beta_base + 4].copy_from_slice(b"beta");

    let empty = HfsExtentDescriptor { start_block: 0, block_count: 0 };
    let mdb = MasterDirectoryBlock {
        signature: MDB_SIGNATURE,
        create_date: 0xA0000000,
        modify_date: 0xA0000001,
        attributes: 0x0100,
        root_file_count: 2,
        bitmap_start: 3,
        alloc_ptr: 0,
        total_blocks: 64,
        block_size: BLOCK as u32,
        clump_size: 2048,
        alloc_start: 16,
        next_cnid: 19,
        free_blocks: 30,
        volume_name: MasterDirectoryBlock::pack_volume_name(b"Classic"),
        backup_date: 0,
        backup_seq: 0,
        write_count: 1,
        extents_clump_size: 2048,
        catalog_clump_size: 2048,
        root_dir_count: 0,
        file_count: 2,
        dir_count: 0,
        finder_info: [0; 32],
        embed_signature: 0,
        embed_extent: empty,
        extents_file_size: 512,
        extents_file_extents: [HfsExtentDescriptor { start_block: 0, block_count: 1 }, empty, empty],
        catalog_file_size: 1024,
        catalog_file_extents: [HfsExtentDescriptor { start_block: 4, block_count: 2 }, empty, empty],
    };
    image[1024..1024 + 162].copy_from_slice(&mdb.encode());
    image
}

#[test]
fn classic_volume_walk() {
    let mut volume = open(build_classic_image());
    assert_eq!(volume.format(), HfsFormat::Hfs);
    assert_eq!(volume.volume_name().unwrap(), "Classic");

    let root = volume.root_folder().unwrap();
    assert_eq!(root.id(), 2);
    assert!(!root.has_permissions());
    assert_eq!(root.valence(), 2);

    let children = volume.list_folder(2).unwrap();
    let names: Vec<&str> = children.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "beta"]);

    let alpha = children[0].record.as_file().unwrap().clone();
    assert_eq!(alpha.id(), 17);
    assert_eq!(volume.fork_len(&alpha, ForkKind::Data), 5);
    assert_eq!(
        volume.fork_extents(&alpha, ForkKind::Data).unwrap(),
        vec![ExtentDescriptor { start_block: 30, block_count: 1 }]
    );
}

#[test]
fn classic_lookup_is_case_sensitive() {
    let mut volume = open(build_classic_image());
    assert!(volume.lookup(2, "Alpha").unwrap().is_some());
    assert!(volume.lookup(2, "alpha").unwrap().is_none());
    // Not MacRoman-encodable, so it cannot exist on this volume.
    assert!(volume.lookup(2, "\u{4E2D}\u{6587}").unwrap().is_none());
}

#[test]
fn volume_opens_from_an_image_file() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut image_file = NamedTempFile::new().unwrap();
    image_file.write_all(&plain_plus_image()).unwrap();
    image_file.flush().unwrap();

    let locator = FileDataLocator::open(image_file.path()).unwrap();
    let mut volume = HfsVolume::open_locator(locator).unwrap();
    assert_eq!(volume.volume_name().unwrap(), "MyVol");
    assert_eq!(volume.list_folder(2).unwrap().len(), 1);
}

#[test]
fn classic_fork_stream_reads_through_allocation_offset() {
    let locator: Arc<dyn DataLocator> = Arc::new(BufferDataLocator::new(build_classic_image()));
    let mut volume = HfsVolume::open(Arc::clone(&locator)).unwrap();
    let alpha = volume
        .lookup(2, "Alpha")
        .unwrap()
        .unwrap()
        .as_file()
        .unwrap()
        .clone();
    let stream = volume.fork_stream(locator, &alpha, ForkKind::Data).unwrap();
    assert_eq!(stream.read_vec(0, 5).unwrap(), b"alpha");
}

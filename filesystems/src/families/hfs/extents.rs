//! Extents-overflow file access: continuation fragments for forks whose
//! extent list outgrows the inline slots, and full extent-list
//! resolution.

use std::cmp::Ordering;

use carbon_core::CarbonError;
use log::debug;

use super::btree::{BTree, TreeOps};
use super::fork::ForkStream;
use super::model::{Cnid, ExtentDescriptor, ExtentKey, ForkKind, HfsFormat};
use super::structs::hfs::{HfsExtentKey, HFS_EXTENT_KEY_SIZE};
use super::structs::hfsplus::{HfsPlusExtentKey, HFSPLUS_EXTENT_KEY_SIZE};
use super::structs::{hfs, hfsplus};

/// Key/record codecs for the extents-overflow tree. Leaf data is the
/// inline-extent-record shape of the owning format (3 or 8 slots);
/// trailing empty slots are dropped on decode.
pub struct ExtentsTreeOps {
    format: HfsFormat,
}

impl TreeOps for ExtentsTreeOps {
    type Key = ExtentKey;
    type Record = Vec<ExtentDescriptor>;

    fn parse_key(&self, data: &[u8]) -> Result<(ExtentKey, usize), CarbonError> {
        match self.format {
            HfsFormat::Hfs => Ok((
                ExtentKey::Hfs(HfsExtentKey::parse(data)?),
                HFS_EXTENT_KEY_SIZE,
            )),
            HfsFormat::HfsPlus => Ok((
                ExtentKey::HfsPlus(HfsPlusExtentKey::parse(data)?),
                HFSPLUS_EXTENT_KEY_SIZE,
            )),
        }
    }

    fn parse_record(&self, data: &[u8]) -> Result<Vec<ExtentDescriptor>, CarbonError> {
        let descriptors: Vec<ExtentDescriptor> = match self.format {
            HfsFormat::Hfs => hfs::parse_extent_record(data)?
                .iter()
                .map(|&e| e.into())
                .collect(),
            HfsFormat::HfsPlus => hfsplus::parse_extent_record(data)?
                .iter()
                .map(|&e| e.into())
                .collect(),
        };
        Ok(descriptors.into_iter().filter(|e| e.block_count > 0).collect())
    }

    fn compare(&self, a: &ExtentKey, b: &ExtentKey) -> Result<Ordering, CarbonError> {
        a.compare(b)
    }
}

/// Read-only view of a volume's extents-overflow B-tree.
pub struct ExtentsOverflow {
    tree: BTree<ExtentsTreeOps>,
    format: HfsFormat,
}

impl ExtentsOverflow {
    pub fn open(fork: ForkStream, format: HfsFormat) -> Result<Self, CarbonError> {
        let tree = BTree::open(ExtentsTreeOps { format }, fork, format)?;
        Ok(Self { tree, format })
    }

    /// Key for the fragment record starting at file allocation block
    /// `start_block`. None when the block number does not fit the
    /// format's key width (classic keys are 16-bit).
    fn make_key(&self, file_id: Cnid, fork: ForkKind, start_block: u64) -> Option<ExtentKey> {
        match self.format {
            HfsFormat::Hfs => {
                let start_block = u16::try_from(start_block).ok()?;
                Some(ExtentKey::Hfs(HfsExtentKey {
                    fork_type: fork.raw(),
                    file_id,
                    start_block,
                }))
            }
            HfsFormat::HfsPlus => {
                let start_block = u32::try_from(start_block).ok()?;
                Some(ExtentKey::HfsPlus(HfsPlusExtentKey {
                    fork_type: fork.raw(),
                    file_id,
                    start_block,
                }))
            }
        }
    }

    /// The overflow fragment whose run begins exactly at file block
    /// `start_block`, or None.
    pub fn fragment(
        &mut self,
        file_id: Cnid,
        fork: ForkKind,
        start_block: u64,
    ) -> Result<Option<Vec<ExtentDescriptor>>, CarbonError> {
        match self.make_key(file_id, fork, start_block) {
            Some(key) => self.tree.search(&key),
            None => Ok(None),
        }
    }

    /// Resolve a fork's complete extent list: the inline extents from
    /// the catalog record, then overflow fragments keyed by the running
    /// block count, until `total_blocks` are covered. A gap is a
    /// structural inconsistency, surfaced rather than silently
    /// truncating the fork.
    pub fn all_extents(
        &mut self,
        file_id: Cnid,
        fork: ForkKind,
        inline: &[ExtentDescriptor],
        total_blocks: u64,
    ) -> Result<Vec<ExtentDescriptor>, CarbonError> {
        let mut extents: Vec<ExtentDescriptor> =
            inline.iter().copied().filter(|e| e.block_count > 0).collect();
        let mut consumed: u64 = extents.iter().map(|e| u64::from(e.block_count)).sum();

        while consumed < total_blocks {
            let missing = || CarbonError::FragmentedExtentMissing {
                file_id,
                missing_blocks: total_blocks - consumed,
            };
            let fragment = self
                .fragment(file_id, fork, consumed)?
                .ok_or_else(missing)?;
            let added: u64 = fragment.iter().map(|e| u64::from(e.block_count)).sum();
            if added == 0 {
                // An empty fragment cannot make progress.
                return Err(missing());
            }
            debug!(
                "file {file_id}: overflow fragment at block {consumed} adds {added} blocks"
            );
            extents.extend_from_slice(&fragment);
            consumed += added;
        }
        Ok(extents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::hfs::structs::btree::{NodeDescriptor, NodeKind, NODE_DESCRIPTOR_SIZE};
    use crate::families::hfs::structs::hfsplus::HfsPlusExtentDescriptor;
    use carbon_core::BufferDataLocator;
    use std::sync::Arc;

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

    fn header_node(root: u32, leaf_records: u32, total: u32) -> Vec<u8> {
        let mut raw = [0u8; 106];
        raw[0..2].copy_from_slice(&1u16.to_be_bytes());
        raw[2..6].copy_from_slice(&root.to_be_bytes());
        raw[6..10].copy_from_slice(&leaf_records.to_be_bytes());
        raw[10..14].copy_from_slice(&root.to_be_bytes());
        raw[14..18].copy_from_slice(&root.to_be_bytes());
        raw[18..20].copy_from_slice(&(NODE_SIZE as u16).to_be_bytes());
        raw[22..26].copy_from_slice(&total.to_be_bytes());
        build_node(NodeKind::Header, 0, 0, &[raw.to_vec(), vec![0u8; 128], vec![0u8; 8]])
    }

    fn overflow_record(file_id: u32, start_block: u32, runs: &[(u32, u32)]) -> Vec<u8> {
        let key = HfsPlusExtentKey { fork_type: 0, file_id, start_block };
        let mut extents = [HfsPlusExtentDescriptor { start_block: 0, block_count: 0 }; 8];
        for (i, &(start, count)) in runs.iter().enumerate() {
            extents[i] = HfsPlusExtentDescriptor { start_block: start, block_count: count };
        }
        let mut rec = key.encode().to_vec();
        rec.extend_from_slice(&hfsplus::encode_extent_record(&extents));
        rec
    }

    fn open_overflow(records: &[Vec<u8>]) -> ExtentsOverflow {
        let nodes = vec![
            header_node(1, records.len() as u32, 2),
            build_node(NodeKind::Leaf, 1, 0, records),
        ];
        let image: Vec<u8> = nodes.into_iter().flatten().collect();
        let len = image.len() as u64;
        let fork = ForkStream::new(
            Arc::new(BufferDataLocator::new(image)),
            vec![ExtentDescriptor { start_block: 0, block_count: 2 }],
            0,
            NODE_SIZE as u32,
            len,
        );
        ExtentsOverflow::open(fork, HfsFormat::HfsPlus).unwrap()
    }

    fn ext(start: u32, count: u32) -> ExtentDescriptor {
        ExtentDescriptor { start_block: start, block_count: count }
    }

    #[test]
    fn inline_extents_cover_the_fork() {
        let mut overflow = open_overflow(&[]);
        let all = overflow
            .all_extents(21, ForkKind::Data, &[ext(100, 1)], 1)
            .unwrap();
        assert_eq!(all, vec![ext(100, 1)]);
    }

    #[test]
    fn overflow_fragment_continues_the_list() {
        let mut overflow = open_overflow(&[overflow_record(21, 1, &[(200, 2)])]);
        let all = overflow
            .all_extents(21, ForkKind::Data, &[ext(100, 1)], 3)
            .unwrap();
        assert_eq!(all, vec![ext(100, 1), ext(200, 2)]);
        assert_eq!(all.iter().map(|e| u64::from(e.block_count)).sum::<u64>(), 3);
    }

    #[test]
    fn chained_fragments_accumulate() {
        let mut overflow = open_overflow(&[
            overflow_record(21, 1, &[(200, 2)]),
            overflow_record(21, 3, &[(300, 1), (400, 1)]),
        ]);
        let all = overflow
            .all_extents(21, ForkKind::Data, &[ext(100, 1)], 5)
            .unwrap();
        assert_eq!(all, vec![ext(100, 1), ext(200, 2), ext(300, 1), ext(400, 1)]);
    }

    #[test]
    fn missing_fragment_is_surfaced() {
        let mut overflow = open_overflow(&[overflow_record(21, 1, &[(200, 2)])]);
        let err = overflow
            .all_extents(21, ForkKind::Data, &[ext(100, 1)], 5)
            .unwrap_err();
        match err {
            CarbonError::FragmentedExtentMissing { file_id, missing_blocks } => {
                assert_eq!(file_id, 21);
                assert_eq!(missing_blocks, 2);
            }
            other => panic!("expected FragmentedExtentMissing, got {other:?}"),
        }
    }

    #[test]
    fn fragments_of_other_files_and_forks_are_ignored() {
        let mut overflow = open_overflow(&[overflow_record(22, 1, &[(500, 4)])]);
        assert!(overflow.fragment(21, ForkKind::Data, 1).unwrap().is_none());
        assert!(overflow.fragment(22, ForkKind::Resource, 1).unwrap().is_none());
        assert_eq!(
            overflow.fragment(22, ForkKind::Data, 1).unwrap().unwrap(),
            vec![ext(500, 4)]
        );
    }
}

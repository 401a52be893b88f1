//! Generic reader for the on-disk B-trees (catalog and extents
//! overflow). Nodes are fixed-size and addressed by number within the
//! tree's fork; records inside a node are located through the u16 offset
//! table stored in reverse order at the node's tail.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use carbon_core::CarbonError;
use log::trace;

use super::fork::ForkStream;
use super::model::{HfsFormat, TreeHeader};
use super::structs::btree::{
    HfsBTreeHeaderRec, HfsPlusBTreeHeaderRec, NodeDescriptor, NodeKind, NODE_DESCRIPTOR_SIZE,
};
use super::structs::ensure_len;

/// Upper bound on index-node descent; real trees stay under 5 levels.
const MAX_DESCENT: usize = 16;

/// Key and record codecs plus the key ordering for one concrete tree.
pub trait TreeOps {
    type Key: Clone + std::fmt::Debug;
    type Record: Clone;

    /// Decode a key from the start of a record, returning the key and the
    /// number of bytes it occupies.
    fn parse_key(&self, data: &[u8]) -> Result<(Self::Key, usize), CarbonError>;

    /// Decode the data portion following the key.
    fn parse_record(&self, data: &[u8]) -> Result<Self::Record, CarbonError>;

    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Result<Ordering, CarbonError>;

    /// Classic HFS starts record data on an even offset within the node;
    /// a key of odd length is followed by one pad byte.
    fn aligns_to_even(&self) -> bool {
        false
    }
}

/// One decoded node: descriptor plus the validated record offset table.
pub struct Node {
    pub desc: NodeDescriptor,
    data: Vec<u8>,
    offsets: Vec<usize>,
}

impl Node {
    pub fn parse(data: Vec<u8>) -> Result<Node, CarbonError> {
        let desc = NodeDescriptor::parse(&data)?;
        let n = desc.num_records as usize;
        let table_size = (n + 1) * 2;
        if NODE_DESCRIPTOR_SIZE + table_size > data.len() {
            return Err(CarbonError::CorruptTree(format!(
                "node claims {n} records but its offset table does not fit"
            )));
        }
        let table_start = data.len() - table_size;
        let mut offsets = Vec::with_capacity(n + 1);
        for i in 0..=n {
            let at = data.len() - 2 * (i + 1);
            let off = usize::from(u16::from_be_bytes([data[at], data[at + 1]]));
            if off < NODE_DESCRIPTOR_SIZE || off > table_start {
                return Err(CarbonError::CorruptTree(format!(
                    "record offset {off} outside node bounds"
                )));
            }
            if let Some(&prev) = offsets.last() {
                if off < prev {
                    return Err(CarbonError::CorruptTree(
                        "record offset table is not ascending".into(),
                    ));
                }
            }
            offsets.push(off);
        }
        Ok(Node { desc, data, offsets })
    }

    pub fn kind(&self) -> Result<NodeKind, CarbonError> {
        self.desc.node_kind().ok_or_else(|| {
            CarbonError::CorruptTree(format!("unknown node type {}", self.desc.kind))
        })
    }

    pub fn num_records(&self) -> usize {
        self.desc.num_records as usize
    }

    /// Record i's byte range, per the offset table.
    pub fn record(&self, i: usize) -> &[u8] {
        &self.data[self.offsets[i]..self.offsets[i + 1]]
    }
}

/// Position of a leaf-chain scan. `node == 0` means exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPos {
    node: u32,
    index: usize,
}

impl ScanPos {
    pub const END: ScanPos = ScanPos { node: 0, index: 0 };
}

/// A read-only B-tree over a fork. Node reads go through an unbounded
/// cache keyed by node number; every entry can be re-derived from the
/// backing store.
pub struct BTree<T: TreeOps> {
    ops: T,
    fork: ForkStream,
    header: TreeHeader,
    node_size: usize,
    cache: HashMap<u32, Rc<Node>>,
}

impl<T: TreeOps> BTree<T> {
    /// Bootstrap from node 0: decode the header node's descriptor and
    /// header record, then validate the tree's declared geometry.
    pub fn open(ops: T, fork: ForkStream, format: HfsFormat) -> Result<Self, CarbonError> {
        let boot = fork.read_vec(0, 512u64.min(fork.len()) as usize)?;
        let desc = NodeDescriptor::parse(&boot)?;
        match desc.node_kind() {
            Some(NodeKind::Header) => {}
            _ => {
                return Err(CarbonError::InvalidTree(format!(
                    "node 0 has type {} instead of header",
                    desc.kind
                )))
            }
        }
        ensure_len("B-tree header node", &boot, NODE_DESCRIPTOR_SIZE + 106)?;
        let header_bytes = &boot[NODE_DESCRIPTOR_SIZE..NODE_DESCRIPTOR_SIZE + 106];
        let header = match format {
            HfsFormat::Hfs => TreeHeader::Hfs(HfsBTreeHeaderRec::parse(header_bytes)?),
            HfsFormat::HfsPlus => {
                TreeHeader::HfsPlus(HfsPlusBTreeHeaderRec::parse(header_bytes)?)
            }
        };
        header.validate()?;
        let node_size = usize::from(header.node_size());
        trace!(
            "opened B-tree: root node {}, depth {}, node size {}",
            header.root_node(),
            header.depth(),
            node_size
        );
        Ok(Self {
            ops,
            fork,
            header,
            node_size,
            cache: HashMap::new(),
        })
    }

    pub fn header(&self) -> &TreeHeader {
        &self.header
    }

    pub fn ops(&self) -> &T {
        &self.ops
    }

    pub fn ops_mut(&mut self) -> &mut T {
        &mut self.ops
    }

    fn node(&mut self, number: u32) -> Result<Rc<Node>, CarbonError> {
        if let Some(node) = self.cache.get(&number) {
            return Ok(Rc::clone(node));
        }
        if number >= self.header.total_nodes() {
            return Err(CarbonError::CorruptTree(format!(
                "node number {number} beyond tree size {}",
                self.header.total_nodes()
            )));
        }
        let offset = u64::from(number) * self.node_size as u64;
        let node = Rc::new(Node::parse(self.fork.read_vec(offset, self.node_size)?)?);
        self.cache.insert(number, Rc::clone(&node));
        Ok(node)
    }

    /// Key end offset within a record, honoring the format's alignment.
    fn key_end(&self, consumed: usize) -> usize {
        if self.ops.aligns_to_even() && consumed % 2 == 1 {
            consumed + 1
        } else {
            consumed
        }
    }

    /// Decode record i of a leaf. The key must decode; the data portion's
    /// outcome is kept separate so bulk listings can skip a bad record.
    fn leaf_entry_parts(
        &self,
        node: &Node,
        i: usize,
    ) -> Result<(T::Key, Result<T::Record, CarbonError>), CarbonError> {
        let raw = node.record(i);
        let (key, consumed) = self.ops.parse_key(raw)?;
        let start = self.key_end(consumed);
        let record = match raw.get(start..) {
            Some(data) => self.ops.parse_record(data),
            None => Err(CarbonError::Truncated {
                what: "leaf record data",
                need: start,
                have: raw.len(),
            }),
        };
        Ok((key, record))
    }

    fn index_entry(&self, node: &Node, i: usize) -> Result<(T::Key, u32), CarbonError> {
        let raw = node.record(i);
        let (key, consumed) = self.ops.parse_key(raw)?;
        let start = self.key_end(consumed);
        let child_bytes = raw.get(start..start + 4).ok_or(CarbonError::Truncated {
            what: "index record child pointer",
            need: start + 4,
            have: raw.len(),
        })?;
        let child = u32::from_be_bytes([
            child_bytes[0],
            child_bytes[1],
            child_bytes[2],
            child_bytes[3],
        ]);
        Ok((key, child))
    }

    /// Descend from the root to the leaf whose key range covers `key`.
    /// Returns None for an empty tree. At each index node the descent
    /// takes the last record whose key compares <= the target; when the
    /// target precedes every key it takes the first child, so the result
    /// doubles as a lower-bound position for range scans.
    fn descend(&mut self, key: &T::Key) -> Result<Option<u32>, CarbonError> {
        let mut node_num = self.header.root_node();
        if node_num == 0 {
            return Ok(None);
        }
        for _ in 0..MAX_DESCENT {
            let node = self.node(node_num)?;
            match node.kind()? {
                NodeKind::Leaf => return Ok(Some(node_num)),
                NodeKind::Index => {
                    if node.num_records() == 0 {
                        return Err(CarbonError::CorruptTree(format!(
                            "index node {node_num} has no records"
                        )));
                    }
                    let mut chosen = None;
                    for i in 0..node.num_records() {
                        let (rec_key, child) = self.index_entry(&node, i)?;
                        if self.ops.compare(&rec_key, key)? != Ordering::Greater {
                            chosen = Some(child);
                        } else {
                            break;
                        }
                    }
                    node_num = match chosen {
                        Some(child) => child,
                        // Target precedes the whole subtree.
                        None => self.index_entry(&node, 0)?.1,
                    };
                }
                other => {
                    return Err(CarbonError::CorruptTree(format!(
                        "node {node_num} has type {other:?} mid-descent"
                    )))
                }
            }
        }
        Err(CarbonError::CorruptTree(
            "descent exceeded maximum tree depth".into(),
        ))
    }

    /// Exact-match search. Key absence is a normal result, not an error.
    pub fn search(&mut self, key: &T::Key) -> Result<Option<T::Record>, CarbonError> {
        let mut pos = self.lower_bound(key)?;
        match self.scan_next(&mut pos)? {
            Some((found, record)) if self.ops.compare(&found, key)? == Ordering::Equal => {
                Ok(Some(record))
            }
            _ => Ok(None),
        }
    }

    /// Position at the first leaf record whose key is >= `key`.
    pub fn lower_bound(&mut self, key: &T::Key) -> Result<ScanPos, CarbonError> {
        let Some(leaf_num) = self.descend(key)? else {
            return Ok(ScanPos::END);
        };
        let leaf = self.node(leaf_num)?;
        for i in 0..leaf.num_records() {
            let raw = leaf.record(i);
            let (rec_key, _) = self.ops.parse_key(raw)?;
            if self.ops.compare(&rec_key, key)? != Ordering::Less {
                return Ok(ScanPos { node: leaf_num, index: i });
            }
        }
        // Everything in this leaf is smaller; the first qualifying record
        // (if any) opens the next leaf.
        Ok(ScanPos { node: leaf.desc.forward_link, index: 0 })
    }

    /// Position at the very first leaf record of the tree.
    pub fn scan_start(&self) -> ScanPos {
        ScanPos { node: self.header.first_leaf_node(), index: 0 }
    }

    /// Yield the record at `pos` and advance. Follows forward links,
    /// skipping record-less nodes; link 0 terminates the chain.
    pub fn scan_next(
        &mut self,
        pos: &mut ScanPos,
    ) -> Result<Option<(T::Key, T::Record)>, CarbonError> {
        match self.scan_next_lenient(pos)? {
            Some((key, Ok(record))) => Ok(Some((key, record))),
            Some((_, Err(e))) => Err(e),
            None => Ok(None),
        }
    }

    /// Like `scan_next`, but a record whose data portion fails to decode
    /// comes back as an Err payload so a bulk listing can choose to skip
    /// it. A key that fails to decode still aborts the scan; without the
    /// key the position within the order is unknown.
    pub fn scan_next_lenient(
        &mut self,
        pos: &mut ScanPos,
    ) -> Result<Option<(T::Key, Result<T::Record, CarbonError>)>, CarbonError> {
        loop {
            if pos.node == 0 {
                return Ok(None);
            }
            let node = self.node(pos.node)?;
            if node.kind()? != NodeKind::Leaf {
                return Err(CarbonError::CorruptTree(format!(
                    "leaf chain reached non-leaf node {}",
                    pos.node
                )));
            }
            if pos.index < node.num_records() {
                let entry = self.leaf_entry_parts(&node, pos.index)?;
                pos.index += 1;
                return Ok(Some(entry));
            }
            *pos = ScanPos { node: node.desc.forward_link, index: 0 };
        }
    }
}

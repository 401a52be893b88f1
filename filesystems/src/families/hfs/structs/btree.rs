// B-tree node descriptor and header records.
// Layouts follow Inside Macintosh (classic HFS BTHdrRec) and TN1150
// (HFS+ BTHeaderRec); all integers are big-endian.

use byteorder::{BigEndian, ByteOrder};
use carbon_core::CarbonError;
use static_assertions::const_assert_eq;

use super::ensure_len;

pub const NODE_DESCRIPTOR_SIZE: usize = 14;
const_assert_eq!(NODE_DESCRIPTOR_SIZE, 4 + 4 + 1 + 1 + 2 + 2);

/// Classic HFS header record: fixed 106 bytes, 76 of them reserved.
pub const HFS_BTREE_HEADER_SIZE: usize = 106;
const_assert_eq!(HFS_BTREE_HEADER_SIZE, 2 + 4 + 4 + 4 + 4 + 2 + 2 + 4 + 4 + 76);

/// HFS+ header record: also 106 bytes, with the reserved area split into
/// typed fields (clump size, tree type, key compare type, attributes).
pub const HFSPLUS_BTREE_HEADER_SIZE: usize = 106;
const_assert_eq!(
    HFSPLUS_BTREE_HEADER_SIZE,
    2 + 4 + 4 + 4 + 4 + 2 + 2 + 4 + 4 + 2 + 4 + 1 + 1 + 4 + 64
);

/// HFSX catalog key comparison selectors (TN1150).
pub const KEY_COMPARE_CASE_FOLDING: u8 = 0xCF;
pub const KEY_COMPARE_BINARY: u8 = 0xBC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Index,
    Header,
    Map,
}

impl NodeKind {
    pub fn from_raw(raw: i8) -> Option<NodeKind> {
        match raw {
            -1 => Some(NodeKind::Leaf),
            0 => Some(NodeKind::Index),
            1 => Some(NodeKind::Header),
            2 => Some(NodeKind::Map),
            _ => None,
        }
    }

    pub fn to_raw(self) -> i8 {
        match self {
            NodeKind::Leaf => -1,
            NodeKind::Index => 0,
            NodeKind::Header => 1,
            NodeKind::Map => 2,
        }
    }
}

/// The 14 bytes at the start of every B-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub forward_link: u32,
    pub backward_link: u32,
    pub kind: i8,
    pub height: i8,
    pub num_records: u16,
    pub reserved: u16,
}

impl NodeDescriptor {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("B-tree node descriptor", data, NODE_DESCRIPTOR_SIZE)?;
        Ok(Self {
            forward_link: BigEndian::read_u32(&data[0..4]),
            backward_link: BigEndian::read_u32(&data[4..8]),
            kind: data[8] as i8,
            height: data[9] as i8,
            num_records: BigEndian::read_u16(&data[10..12]),
            reserved: BigEndian::read_u16(&data[12..14]),
        })
    }

    pub fn node_kind(&self) -> Option<NodeKind> {
        NodeKind::from_raw(self.kind)
    }

    pub fn encode(&self) -> [u8; NODE_DESCRIPTOR_SIZE] {
        let mut out = [0u8; NODE_DESCRIPTOR_SIZE];
        BigEndian::write_u32(&mut out[0..4], self.forward_link);
        BigEndian::write_u32(&mut out[4..8], self.backward_link);
        out[8] = self.kind as u8;
        out[9] = self.height as u8;
        BigEndian::write_u16(&mut out[10..12], self.num_records);
        BigEndian::write_u16(&mut out[12..14], self.reserved);
        out
    }
}

/// Classic HFS B-tree header record (BTHdrRec).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HfsBTreeHeaderRec {
    pub depth: u16,
    pub root_node: u32,
    pub leaf_records: u32,
    pub first_leaf_node: u32,
    pub last_leaf_node: u32,
    pub node_size: u16,
    pub max_key_len: u16,
    pub total_nodes: u32,
    pub free_nodes: u32,
    pub reserved: [u8; 76],
}

impl HfsBTreeHeaderRec {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS B-tree header record", data, HFS_BTREE_HEADER_SIZE)?;
        let mut reserved = [0u8; 76];
        reserved.copy_from_slice(&data[30..106]);
        Ok(Self {
            depth: BigEndian::read_u16(&data[0..2]),
            root_node: BigEndian::read_u32(&data[2..6]),
            leaf_records: BigEndian::read_u32(&data[6..10]),
            first_leaf_node: BigEndian::read_u32(&data[10..14]),
            last_leaf_node: BigEndian::read_u32(&data[14..18]),
            node_size: BigEndian::read_u16(&data[18..20]),
            max_key_len: BigEndian::read_u16(&data[20..22]),
            total_nodes: BigEndian::read_u32(&data[22..26]),
            free_nodes: BigEndian::read_u32(&data[26..30]),
            reserved,
        })
    }

    pub fn encode(&self) -> [u8; HFS_BTREE_HEADER_SIZE] {
        let mut out = [0u8; HFS_BTREE_HEADER_SIZE];
        BigEndian::write_u16(&mut out[0..2], self.depth);
        BigEndian::write_u32(&mut out[2..6], self.root_node);
        BigEndian::write_u32(&mut out[6..10], self.leaf_records);
        BigEndian::write_u32(&mut out[10..14], self.first_leaf_node);
        BigEndian::write_u32(&mut out[14..18], self.last_leaf_node);
        BigEndian::write_u16(&mut out[18..20], self.node_size);
        BigEndian::write_u16(&mut out[20..22], self.max_key_len);
        BigEndian::write_u32(&mut out[22..26], self.total_nodes);
        BigEndian::write_u32(&mut out[26..30], self.free_nodes);
        out[30..106].copy_from_slice(&self.reserved);
        out
    }
}

/// HFS+ B-tree header record (BTHeaderRec).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HfsPlusBTreeHeaderRec {
    pub depth: u16,
    pub root_node: u32,
    pub leaf_records: u32,
    pub first_leaf_node: u32,
    pub last_leaf_node: u32,
    pub node_size: u16,
    pub max_key_len: u16,
    pub total_nodes: u32,
    pub free_nodes: u32,
    pub reserved1: u16,
    pub clump_size: u32,
    pub btree_type: u8,
    pub key_compare_type: u8,
    pub attributes: u32,
    pub reserved3: [u8; 64],
}

impl HfsPlusBTreeHeaderRec {
    pub fn parse(data: &[u8]) -> Result<Self, CarbonError> {
        ensure_len("HFS+ B-tree header record", data, HFSPLUS_BTREE_HEADER_SIZE)?;
        let mut reserved3 = [0u8; 64];
        reserved3.copy_from_slice(&data[42..106]);
        Ok(Self {
            depth: BigEndian::read_u16(&data[0..2]),
            root_node: BigEndian::read_u32(&data[2..6]),
            leaf_records: BigEndian::read_u32(&data[6..10]),
            first_leaf_node: BigEndian::read_u32(&data[10..14]),
            last_leaf_node: BigEndian::read_u32(&data[14..18]),
            node_size: BigEndian::read_u16(&data[18..20]),
            max_key_len: BigEndian::read_u16(&data[20..22]),
            total_nodes: BigEndian::read_u32(&data[22..26]),
            free_nodes: BigEndian::read_u32(&data[26..30]),
            reserved1: BigEndian::read_u16(&data[30..32]),
            clump_size: BigEndian::read_u32(&data[32..36]),
            btree_type: data[36],
            key_compare_type: data[37],
            attributes: BigEndian::read_u32(&data[38..42]),
            reserved3,
        })
    }

    pub fn encode(&self) -> [u8; HFSPLUS_BTREE_HEADER_SIZE] {
        let mut out = [0u8; HFSPLUS_BTREE_HEADER_SIZE];
        BigEndian::write_u16(&mut out[0..2], self.depth);
        BigEndian::write_u32(&mut out[2..6], self.root_node);
        BigEndian::write_u32(&mut out[6..10], self.leaf_records);
        BigEndian::write_u32(&mut out[10..14], self.first_leaf_node);
        BigEndian::write_u32(&mut out[14..18], self.last_leaf_node);
        BigEndian::write_u16(&mut out[18..20], self.node_size);
        BigEndian::write_u16(&mut out[20..22], self.max_key_len);
        BigEndian::write_u32(&mut out[22..26], self.total_nodes);
        BigEndian::write_u32(&mut out[26..30], self.free_nodes);
        BigEndian::write_u16(&mut out[30..32], self.reserved1);
        BigEndian::write_u32(&mut out[32..36], self.clump_size);
        out[36] = self.btree_type;
        out[37] = self.key_compare_type;
        BigEndian::write_u32(&mut out[38..42], self.attributes);
        out[42..106].copy_from_slice(&self.reserved3);
        out
    }
}

//! The chromosome-interval ("cir") tree: the R-tree that indexes data blocks
//! by genomic position.

use std::cmp::Ordering;
use std::collections::VecDeque;

use bytes::Buf;
use log::trace;
use smallvec::{smallvec, SmallVec};

use crate::bbi::block::BBIFileRead;
use crate::bbi::{BBIReadError, Block, CIR_TREE_MAGIC};
use crate::utils::endian::EndianBuf;
use crate::utils::file::bytereader::ByteReader;
use crate::utils::file::SeekableRead;

pub(crate) const CIR_TREE_HEADER_SIZE: u64 = 48;
const LEAF_ITEM_SIZE: usize = 32;
const NON_LEAF_ITEM_SIZE: usize = 24;

#[derive(Copy, Clone, Debug)]
pub(crate) struct CirTreeLeaf {
    pub(crate) start_chrom_ix: u32,
    pub(crate) start_base: u32,
    pub(crate) end_chrom_ix: u32,
    pub(crate) end_base: u32,
    pub(crate) data_offset: u64,
    pub(crate) data_size: u64,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct CirTreeNonLeaf {
    pub(crate) start_chrom_ix: u32,
    pub(crate) start_base: u32,
    pub(crate) end_chrom_ix: u32,
    pub(crate) end_base: u32,
    pub(crate) node_offset: u64,
}

#[derive(Clone, Debug)]
pub(crate) enum CirTreeNode {
    Leaf(Vec<CirTreeLeaf>),
    NonLeaf(Vec<CirTreeNonLeaf>),
}

/// Validates the index header at `index_offset` and returns the offset of the
/// root node.
pub(crate) fn read_cir_tree_header<S: SeekableRead>(
    file: &mut ByteReader<S>,
    index_offset: u64,
) -> Result<u64, BBIReadError> {
    let endianness = file.endianness();
    if !file.contains(index_offset, CIR_TREE_HEADER_SIZE) {
        return Err(BBIReadError::InvalidFile(format!(
            "Index at offset {} is past the end of the file.",
            index_offset
        )));
    }
    let mut header_data = file.read_at(index_offset, CIR_TREE_HEADER_SIZE as usize)?;

    let magic = header_data.get_u32_endian(endianness);
    if magic != CIR_TREE_MAGIC {
        return Err(BBIReadError::InvalidFile(format!(
            "Invalid index magic at offset {}.",
            index_offset
        )));
    }
    let _blocksize = header_data.get_u32_endian(endianness);
    let _item_count = header_data.get_u64_endian(endianness);
    let _start_chrom_idx = header_data.get_u32_endian(endianness);
    let _start_base = header_data.get_u32_endian(endianness);
    let _end_chrom_idx = header_data.get_u32_endian(endianness);
    let _end_base = header_data.get_u32_endian(endianness);
    let _end_file_offset = header_data.get_u64_endian(endianness);
    let _item_per_slot = header_data.get_u32_endian(endianness);
    let _reserved = header_data.get_u32_endian(endianness);

    Ok(index_offset + CIR_TREE_HEADER_SIZE)
}

pub(crate) fn read_node<S: SeekableRead>(
    file: &mut ByteReader<S>,
    node_offset: u64,
) -> Result<CirTreeNode, BBIReadError> {
    let endianness = file.endianness();
    if !file.contains(node_offset, 4) {
        return Err(BBIReadError::InvalidFile(format!(
            "Index node at offset {} is past the end of the file.",
            node_offset
        )));
    }
    let mut header_data = file.read_at(node_offset, 4)?;
    let isleaf = header_data.get_u8();
    let _reserved = header_data.get_u8();
    let count = header_data.get_u16_endian(endianness) as usize;

    let item_size = match isleaf {
        1 => LEAF_ITEM_SIZE,
        0 => NON_LEAF_ITEM_SIZE,
        _ => {
            return Err(BBIReadError::InvalidFile(format!(
                "Unexpected isleaf at offset {}: {}",
                node_offset, isleaf
            )))
        }
    };
    if !file.contains(node_offset + 4, (count * item_size) as u64) {
        return Err(BBIReadError::InvalidFile(format!(
            "Index node at offset {} has {} items, which go past the end of the file.",
            node_offset, count
        )));
    }
    let mut bytes = file.read_at(node_offset + 4, count * item_size)?;

    let node = if isleaf == 1 {
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(CirTreeLeaf {
                start_chrom_ix: bytes.get_u32_endian(endianness),
                start_base: bytes.get_u32_endian(endianness),
                end_chrom_ix: bytes.get_u32_endian(endianness),
                end_base: bytes.get_u32_endian(endianness),
                data_offset: bytes.get_u64_endian(endianness),
                data_size: bytes.get_u64_endian(endianness),
            });
        }
        CirTreeNode::Leaf(items)
    } else {
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(CirTreeNonLeaf {
                start_chrom_ix: bytes.get_u32_endian(endianness),
                start_base: bytes.get_u32_endian(endianness),
                end_chrom_ix: bytes.get_u32_endian(endianness),
                end_base: bytes.get_u32_endian(endianness),
                node_offset: bytes.get_u64_endian(endianness),
            });
        }
        CirTreeNode::NonLeaf(items)
    };
    Ok(node)
}

#[inline]
fn compare_position(chrom1: u32, chrom1_base: u32, chrom2: u32, chrom2_base: u32) -> Ordering {
    (chrom1, chrom1_base).cmp(&(chrom2, chrom2_base))
}

/// Whether the half-open query `chromq:[start, end)` overlaps the item
/// spanning `(chromb1, start)` up to (exclusive) `(chromb2, end)`.
#[inline]
fn overlaps(
    chromq: u32,
    chromq_start: u32,
    chromq_end: u32,
    chromb1: u32,
    chromb1_start: u32,
    chromb2: u32,
    chromb2_end: u32,
) -> bool {
    compare_position(chromq, chromq_start, chromb2, chromb2_end) == Ordering::Less
        && compare_position(chromq, chromq_end, chromb1, chromb1_start) == Ordering::Greater
}

/// Splits a node into the child nodes (for non-leaves) or data blocks (for
/// leaves) that overlap the query.
pub(crate) fn nodes_overlapping(
    node: &CirTreeNode,
    chrom_ix: u32,
    start: u32,
    end: u32,
) -> (SmallVec<[u64; 4]>, SmallVec<[Block; 4]>) {
    match node {
        CirTreeNode::Leaf(items) => {
            let mut blocks: SmallVec<[_; 4]> = smallvec![];
            for child in items {
                let block_overlaps = overlaps(
                    chrom_ix,
                    start,
                    end,
                    child.start_chrom_ix,
                    child.start_base,
                    child.end_chrom_ix,
                    child.end_base,
                );
                if block_overlaps {
                    blocks.push(Block {
                        offset: child.data_offset,
                        size: child.data_size,
                    });
                }
            }
            (smallvec![], blocks)
        }
        CirTreeNode::NonLeaf(items) => {
            let mut new_childblocks: SmallVec<[_; 4]> = smallvec![];
            for child in items {
                let block_overlaps = overlaps(
                    chrom_ix,
                    start,
                    end,
                    child.start_chrom_ix,
                    child.start_base,
                    child.end_chrom_ix,
                    child.end_base,
                );
                if block_overlaps {
                    new_childblocks.push(child.node_offset);
                }
            }
            (new_childblocks, smallvec![])
        }
    }
}

/// Finds the data blocks overlapping `chrom_ix:[start, end)`, starting at the
/// root node `root_offset`. The blocks are returned sorted by offset, without
/// duplicates.
pub(crate) fn search_cir_tree<R: BBIFileRead>(
    file: &mut R,
    root_offset: u64,
    chrom_ix: u32,
    start: u32,
    end: u32,
) -> Result<Vec<Block>, BBIReadError> {
    let mut blocks = vec![];

    let mut remaining_childblocks = VecDeque::with_capacity(64);
    remaining_childblocks.push_front(root_offset);
    while let Some(node_offset) = remaining_childblocks.pop_front() {
        let (new_childblocks, node_blocks) =
            file.blocks_for_cir_tree_node(node_offset, chrom_ix, start, end)?;
        for child in new_childblocks.into_iter().rev() {
            if child <= node_offset {
                return Err(BBIReadError::InvalidFile(format!(
                    "Index node at {} points backwards to {}.",
                    node_offset, child
                )));
            }
            remaining_childblocks.push_front(child);
        }
        blocks.extend(node_blocks);
    }

    blocks.sort_unstable();
    blocks.dedup();
    trace!(
        "Found {} blocks for {}:{}-{}",
        blocks.len(),
        chrom_ix,
        start,
        end
    );
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(
        start_chrom_ix: u32,
        start_base: u32,
        end_chrom_ix: u32,
        end_base: u32,
        data_offset: u64,
    ) -> CirTreeLeaf {
        CirTreeLeaf {
            start_chrom_ix,
            start_base,
            end_chrom_ix,
            end_base,
            data_offset,
            data_size: 10,
        }
    }

    #[test]
    fn test_overlaps_half_open() {
        // Item covering chr0:[100, 200)
        assert!(overlaps(0, 150, 160, 0, 100, 0, 200));
        assert!(overlaps(0, 0, 101, 0, 100, 0, 200));
        assert!(overlaps(0, 199, 300, 0, 100, 0, 200));
        assert!(!overlaps(0, 0, 100, 0, 100, 0, 200));
        assert!(!overlaps(0, 200, 300, 0, 100, 0, 200));
        assert!(!overlaps(1, 150, 160, 0, 100, 0, 200));

        // Item spanning chr0:500 to chr2:50
        assert!(overlaps(1, 0, 10, 0, 500, 2, 50));
        assert!(overlaps(0, 600, 700, 0, 500, 2, 50));
        assert!(!overlaps(2, 50, 60, 0, 500, 2, 50));
    }

    #[test]
    fn test_nodes_overlapping() {
        let node = CirTreeNode::Leaf(vec![
            leaf(0, 0, 0, 100, 1000),
            leaf(0, 100, 0, 200, 2000),
            leaf(0, 200, 1, 50, 3000),
            leaf(1, 50, 1, 100, 4000),
        ]);
        let (children, blocks) = nodes_overlapping(&node, 0, 150, 250);
        assert!(children.is_empty());
        let offsets: Vec<_> = blocks.iter().map(|b| b.offset).collect();
        assert_eq!(offsets, vec![2000, 3000]);

        let (_, blocks) = nodes_overlapping(&node, 1, 0, 60);
        let offsets: Vec<_> = blocks.iter().map(|b| b.offset).collect();
        assert_eq!(offsets, vec![3000, 4000]);

        let (_, blocks) = nodes_overlapping(&node, 2, 0, 60);
        assert!(blocks.is_empty());
    }
}

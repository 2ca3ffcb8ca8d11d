use std::collections::HashMap;
use std::io;
use std::num::NonZeroUsize;

use bytes::Bytes;
use libdeflater::Decompressor;
use log::trace;
use lru::LruCache;
use smallvec::SmallVec;

use crate::bbi::cirtree::{nodes_overlapping, read_node, CirTreeNode};
use crate::bbi::{BBIReadError, Block};
use crate::utils::file::bytereader::ByteReader;
use crate::utils::file::SeekableRead;

/// Default number of decompressed blocks kept by [`CachedBBIFileRead`].
pub const DEFAULT_BLOCK_CACHE_SIZE: usize = 4096;

/// Decompresses data blocks into a scratch buffer that is allocated once and
/// reused for every block.
///
/// Blocks are zlib streams whose decompressed size is at most the
/// uncompress buffer size from the file header. A size of `0` means the
/// file is not compressed, and blocks are passed through unchanged.
pub struct BlockDecompressor {
    decompressor: Decompressor,
    buf: Vec<u8>,
}

impl BlockDecompressor {
    pub fn new(uncompress_buf_size: u32) -> Self {
        BlockDecompressor {
            decompressor: Decompressor::new(),
            buf: vec![0; uncompress_buf_size as usize],
        }
    }

    pub fn is_compressed(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Decompresses `compressed`, which must inflate to at most
    /// the uncompress buffer size.
    pub fn decompress(&mut self, compressed: Bytes) -> Result<Bytes, BBIReadError> {
        if !self.is_compressed() {
            return Ok(compressed);
        }
        let decompressed = self
            .decompressor
            .zlib_decompress(&compressed, &mut self.buf)
            .map_err(|e| {
                BBIReadError::InvalidFile(format!(
                    "Unable to decompress a block of {} bytes (max decompressed size {}): {:?}",
                    compressed.len(),
                    self.buf.len(),
                    e
                ))
            })?;
        Ok(Bytes::copy_from_slice(&self.buf[..decompressed]))
    }
}

/// Access to the data blocks and index nodes of a bbi file.
///
/// Implemented directly by [`ByteReader`], and by [`CachedBBIFileRead`],
/// which keeps decompressed blocks and index nodes in memory.
pub trait BBIFileRead {
    type Read: SeekableRead;

    /// Gets the data (uncompressed, if applicable) from a given block
    fn get_block_data(
        &mut self,
        block: &Block,
        decompressor: &mut BlockDecompressor,
    ) -> Result<Bytes, BBIReadError>;

    fn blocks_for_cir_tree_node(
        &mut self,
        node_offset: u64,
        chrom_ix: u32,
        start: u32,
        end: u32,
    ) -> Result<(SmallVec<[u64; 4]>, SmallVec<[Block; 4]>), BBIReadError>;

    fn reader(&mut self) -> &mut ByteReader<Self::Read>;
}

impl<S: SeekableRead> BBIFileRead for ByteReader<S> {
    type Read = S;

    fn get_block_data(
        &mut self,
        block: &Block,
        decompressor: &mut BlockDecompressor,
    ) -> Result<Bytes, BBIReadError> {
        read_block_data(self, block, decompressor)
    }

    fn blocks_for_cir_tree_node(
        &mut self,
        node_offset: u64,
        chrom_ix: u32,
        start: u32,
        end: u32,
    ) -> Result<(SmallVec<[u64; 4]>, SmallVec<[Block; 4]>), BBIReadError> {
        let node = read_node(self, node_offset)?;
        Ok(nodes_overlapping(&node, chrom_ix, start, end))
    }

    fn reader(&mut self) -> &mut ByteReader<S> {
        self
    }
}

/// A [`BBIFileRead`] that caches decompressed blocks (least recently used
/// first out) and parsed index nodes.
pub struct CachedBBIFileRead<S> {
    read: ByteReader<S>,
    cir_tree_node_map: HashMap<u64, CirTreeNode>,
    block_data: LruCache<Block, Bytes>,
}

impl<S: SeekableRead> CachedBBIFileRead<S> {
    pub fn new(read: ByteReader<S>) -> Self {
        Self::with_capacity(read, DEFAULT_BLOCK_CACHE_SIZE)
    }

    /// Caches at most `blocks` decompressed blocks (at least one).
    pub fn with_capacity(read: ByteReader<S>, blocks: usize) -> Self {
        CachedBBIFileRead {
            read,
            cir_tree_node_map: HashMap::new(),
            block_data: LruCache::new(NonZeroUsize::new(blocks).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    pub fn cached_blocks(&self) -> usize {
        self.block_data.len()
    }
}

impl<S: SeekableRead> BBIFileRead for CachedBBIFileRead<S> {
    type Read = S;

    fn get_block_data(
        &mut self,
        block: &Block,
        decompressor: &mut BlockDecompressor,
    ) -> Result<Bytes, BBIReadError> {
        if let Some(data) = self.block_data.get(block) {
            return Ok(data.clone());
        }
        let data = read_block_data(&mut self.read, block, decompressor)?;
        self.block_data.put(*block, data.clone());
        Ok(data)
    }

    fn blocks_for_cir_tree_node(
        &mut self,
        node_offset: u64,
        chrom_ix: u32,
        start: u32,
        end: u32,
    ) -> Result<(SmallVec<[u64; 4]>, SmallVec<[Block; 4]>), BBIReadError> {
        if let Some(node) = self.cir_tree_node_map.get(&node_offset) {
            return Ok(nodes_overlapping(node, chrom_ix, start, end));
        }
        let node = read_node(&mut self.read, node_offset)?;
        let overlapping = nodes_overlapping(&node, chrom_ix, start, end);
        self.cir_tree_node_map.insert(node_offset, node);
        Ok(overlapping)
    }

    fn reader(&mut self) -> &mut ByteReader<S> {
        &mut self.read
    }
}

fn read_block_data<S: SeekableRead>(
    read: &mut ByteReader<S>,
    block: &Block,
    decompressor: &mut BlockDecompressor,
) -> Result<Bytes, BBIReadError> {
    if !read.contains(block.offset, block.size) {
        return Err(BBIReadError::InvalidFile(format!(
            "Block at offset {} (size {}) is past the end of the file.",
            block.offset, block.size
        )));
    }
    let size = usize::try_from(block.size)
        .map_err(|_| BBIReadError::OutOfMemory(usize::MAX))?;
    trace!("Reading block at {} ({} bytes)", block.offset, size);
    let raw_data = read.read_at(block.offset, size).map_err(|e| match e.kind() {
        io::ErrorKind::OutOfMemory => BBIReadError::OutOfMemory(size),
        _ => BBIReadError::IoError(e),
    })?;
    decompressor.decompress(raw_data)
}

use std::io;

use byteordered::Endianness;
use bytes::Buf;
use log::debug;
use thiserror::Error;

use crate::bbi::{
    BBIFile, ZoomHeader, BIGBED_MAGIC, BIGWIG_MAGIC, CHROM_TREE_MAGIC,
};
use crate::utils::endian::EndianBuf;
use crate::utils::file::bytereader::ByteReader;
use crate::utils::file::SeekableRead;

/// The newest bbi version this reader understands.
pub const MAX_SUPPORTED_VERSION: u16 = 4;

pub(crate) const HEADER_SIZE: usize = 64;
pub(crate) const ZOOM_HEADER_SIZE: usize = 24;
pub(crate) const TOTAL_SUMMARY_SIZE: u64 = 40;
const CHROM_TREE_HEADER_SIZE: usize = 32;

/// The location of a (possibly compressed) data block in a bbi file
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block {
    pub(crate) offset: u64,
    pub(crate) size: u64,
}

impl Block {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Header info for a bbi file
///
/// Note that info on internal properties like file offsets are not public.
/// Reading data is available through higher-level functions.
#[derive(Copy, Clone, Debug)]
pub struct BBIHeader {
    pub endianness: Endianness,
    pub version: u16,
    pub field_count: u16,
    pub defined_field_count: u16,

    pub(crate) zoom_levels: u16,
    pub(crate) chromosome_tree_offset: u64,
    pub(crate) full_data_offset: u64,
    pub(crate) full_index_offset: u64,
    pub(crate) full_index_tree_offset: Option<u64>,
    pub(crate) auto_sql_offset: u64,
    pub(crate) total_summary_offset: u64,
    pub(crate) uncompress_buf_size: u32,
}

impl BBIHeader {
    /// Whether data blocks are zlib compressed
    pub fn is_compressed(&self) -> bool {
        self.uncompress_buf_size > 0
    }

    /// The largest size of a decompressed block
    pub fn uncompress_buf_size(&self) -> u32 {
        self.uncompress_buf_size
    }
}

/// Information on a chromosome in a bbi file
#[derive(Clone, Debug)]
pub struct ChromInfo {
    pub name: String,
    pub length: u32,
    pub(crate) id: u32,
}

impl ChromInfo {
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl PartialEq for ChromInfo {
    fn eq(&self, other: &ChromInfo) -> bool {
        self.name == other.name
    }
}

/// Info on a bbi file
#[derive(Clone, Debug)]
pub struct BBIFileInfo {
    /// The type of the bbi file - either a bigBed or a bigWig
    pub filetype: BBIFile,
    /// Header info
    pub header: BBIHeader,
    /// Info on zooms in the bbi file
    pub zoom_headers: Vec<ZoomHeader>,
    /// The chromosome info the bbi file is based on
    pub chrom_info: Vec<ChromInfo>,
}

impl BBIFileInfo {
    /// Looks up a chromosome by name. Names are compared exactly
    /// (case-sensitive).
    pub fn chrom(&self, chrom_name: &str) -> Option<&ChromInfo> {
        self.chrom_info.iter().find(|c| c.name == chrom_name)
    }

    pub(crate) fn chrom_id(&self, chrom_name: &str) -> Result<&ChromInfo, BBIReadError> {
        self.chrom(chrom_name)
            .ok_or_else(|| BBIReadError::InvalidChromosome(chrom_name.to_owned()))
    }
}

/// Possible errors encountered when reading the header and chromosome tree
/// of a bbi file
#[derive(Error, Debug)]
pub enum BBIFileReadInfoError {
    #[error("Invalid magic (likely not a BigWig or BigBed file)")]
    UnknownMagic,
    #[error("Unsupported version: {}", .0)]
    UnsupportedVersion(u16),
    #[error("The file was invalid: {}", .0)]
    InvalidFile(String),
    #[error("Error occurred: {}", .0)]
    IoError(#[from] io::Error),
}

/// Possible errors encountered when reading a bbi file
#[derive(Error, Debug)]
pub enum BBIReadError {
    #[error("The passed chromosome ({}) was incorrect.", .0)]
    InvalidChromosome(String),
    #[error("Invalid range {}:{}-{}: {}", .chrom, .start, .end, .reason)]
    InvalidRange {
        chrom: String,
        start: u32,
        end: u32,
        reason: &'static str,
    },
    #[error("The passed reduction level ({}) was not found.", .0)]
    ReductionLevelNotFound(u32),
    #[error("The file was invalid: {}", .0)]
    InvalidFile(String),
    #[error("Unable to allocate space for {} items.", .0)]
    OutOfMemory(usize),
    #[error("Error occurred: {}", .0)]
    IoError(#[from] io::Error),
}

fn check_offset<S>(
    file: &ByteReader<S>,
    what: &str,
    offset: u64,
    length: u64,
) -> Result<(), BBIFileReadInfoError> {
    if file.contains(offset, length) {
        Ok(())
    } else {
        Err(BBIFileReadInfoError::InvalidFile(format!(
            "{} at offset {} (length {}) is past the end of the file ({:?} bytes).",
            what,
            offset,
            length,
            file.len()
        )))
    }
}

/// Reads the header, zoom headers and chromosome tree of a bbi file. Also
/// sets the endianness of `file` from the magic.
pub(crate) fn read_info<S: SeekableRead>(
    file: &mut ByteReader<S>,
) -> Result<BBIFileInfo, BBIFileReadInfoError> {
    let mut magic_data = match file.read_at(0, 4) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(BBIFileReadInfoError::UnknownMagic)
        }
        Err(e) => return Err(e.into()),
    };
    let magic = magic_data.get_u32_le();
    let (filetype, endianness) = match magic {
        BIGWIG_MAGIC => (BBIFile::BigWig, Endianness::Little),
        BIGBED_MAGIC => (BBIFile::BigBed, Endianness::Little),
        _ if magic == BIGWIG_MAGIC.swap_bytes() => (BBIFile::BigWig, Endianness::Big),
        _ if magic == BIGBED_MAGIC.swap_bytes() => (BBIFile::BigBed, Endianness::Big),
        _ => return Err(BBIFileReadInfoError::UnknownMagic),
    };
    file.set_endianness(endianness);

    let mut header_data = file.read_at(4, HEADER_SIZE - 4).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            BBIFileReadInfoError::InvalidFile("The header is truncated.".to_owned())
        }
        _ => e.into(),
    })?;

    let version = header_data.get_u16_endian(endianness);
    let zoom_levels = header_data.get_u16_endian(endianness);
    let chromosome_tree_offset = header_data.get_u64_endian(endianness);
    let full_data_offset = header_data.get_u64_endian(endianness);
    let full_index_offset = header_data.get_u64_endian(endianness);
    let field_count = header_data.get_u16_endian(endianness);
    let defined_field_count = header_data.get_u16_endian(endianness);
    let auto_sql_offset = header_data.get_u64_endian(endianness);
    let total_summary_offset = header_data.get_u64_endian(endianness);
    let uncompress_buf_size = header_data.get_u32_endian(endianness);
    let _reserved = header_data.get_u64_endian(endianness);

    if version == 0 || version > MAX_SUPPORTED_VERSION {
        return Err(BBIFileReadInfoError::UnsupportedVersion(version));
    }

    check_offset(
        file,
        "The chromosome tree",
        chromosome_tree_offset,
        CHROM_TREE_HEADER_SIZE as u64,
    )?;
    check_offset(file, "The data section", full_data_offset, 8)?;
    check_offset(file, "The index", full_index_offset, 48)?;
    if total_summary_offset != 0 {
        check_offset(file, "The total summary", total_summary_offset, TOTAL_SUMMARY_SIZE)?;
    }

    let header = BBIHeader {
        endianness,
        version,
        zoom_levels,
        chromosome_tree_offset,
        full_data_offset,
        full_index_offset,
        full_index_tree_offset: None,
        field_count,
        defined_field_count,
        auto_sql_offset,
        total_summary_offset,
        uncompress_buf_size,
    };

    let zoom_headers = read_zoom_headers(file, &header)?;

    let mut header_data = file.read_at(chromosome_tree_offset, CHROM_TREE_HEADER_SIZE)?;
    let magic = header_data.get_u32_endian(endianness);
    if magic != CHROM_TREE_MAGIC {
        return Err(BBIFileReadInfoError::InvalidFile(
            "Invalid chromosome tree magic.".to_owned(),
        ));
    }
    let _block_size = header_data.get_u32_endian(endianness);
    let key_size = header_data.get_u32_endian(endianness);
    let val_size = header_data.get_u32_endian(endianness);
    let item_count = header_data.get_u64_endian(endianness);
    let _reserved = header_data.get_u64_endian(endianness);

    if val_size != 8 {
        return Err(BBIFileReadInfoError::InvalidFile(format!(
            "Chromosome tree values should be 8 bytes, not {}.",
            val_size
        )));
    }

    let mut chrom_info = Vec::new();
    chrom_info
        .try_reserve(usize::try_from(item_count).unwrap_or(usize::MAX).min(1 << 20))
        .map_err(|_| BBIFileReadInfoError::InvalidFile("Too many chromosomes.".to_owned()))?;
    read_chrom_tree_block(
        file,
        chromosome_tree_offset + CHROM_TREE_HEADER_SIZE as u64,
        &mut chrom_info,
        key_size,
    )?;

    debug!(
        "Read {:?} header: version {}, {} zoom levels, {} chromosomes, {:?} endian, compressed: {}",
        filetype,
        version,
        zoom_headers.len(),
        chrom_info.len(),
        endianness,
        header.is_compressed(),
    );

    Ok(BBIFileInfo {
        filetype,
        header,
        zoom_headers,
        chrom_info,
    })
}

fn read_zoom_headers<S: SeekableRead>(
    file: &mut ByteReader<S>,
    header: &BBIHeader,
) -> Result<Vec<ZoomHeader>, BBIFileReadInfoError> {
    let endianness = header.endianness;
    let zoom_levels = header.zoom_levels as usize;
    check_offset(
        file,
        "The zoom headers",
        HEADER_SIZE as u64,
        (zoom_levels * ZOOM_HEADER_SIZE) as u64,
    )?;
    let mut header_data = file.read_at(HEADER_SIZE as u64, zoom_levels * ZOOM_HEADER_SIZE)?;

    let mut zoom_headers = Vec::with_capacity(zoom_levels);
    for _ in 0..zoom_levels {
        let reduction_level = header_data.get_u32_endian(endianness);
        let _reserved = header_data.get_u32_endian(endianness);
        let data_offset = header_data.get_u64_endian(endianness);
        let index_offset = header_data.get_u64_endian(endianness);

        check_offset(file, "Zoom data", data_offset, 4)?;
        check_offset(file, "Zoom index", index_offset, 48)?;

        zoom_headers.push(ZoomHeader {
            reduction_level,
            data_offset,
            index_offset,
            index_tree_offset: None,
        });
    }

    Ok(zoom_headers)
}

fn read_chrom_tree_block<S: SeekableRead>(
    f: &mut ByteReader<S>,
    offset: u64,
    chroms: &mut Vec<ChromInfo>,
    key_size: u32,
) -> Result<(), BBIFileReadInfoError> {
    let endianness = f.endianness();
    if !f.contains(offset, 4) {
        return Err(BBIFileReadInfoError::InvalidFile(format!(
            "Chromosome tree node at offset {} is past the end of the file.",
            offset
        )));
    }
    let mut header_data = f.read_at(offset, 4)?;

    let isleaf = header_data.get_u8();
    let _reserved = header_data.get_u8();
    let count = header_data.get_u16_endian(endianness) as usize;

    let key_size = key_size as usize;
    let items_size = (key_size + 8) * count;
    if !f.contains(offset + 4, items_size as u64) {
        return Err(BBIFileReadInfoError::InvalidFile(format!(
            "Chromosome tree node at offset {} has {} items, which go past the end of the file.",
            offset, count
        )));
    }
    let mut bytes = f.read_at(offset + 4, items_size)?;

    match isleaf {
        1 => {
            for _ in 0..count {
                let key_string = match std::str::from_utf8(&bytes[0..key_size]) {
                    Ok(s) => s.trim_matches(char::from(0)).to_owned(),
                    Err(_) => {
                        return Err(BBIFileReadInfoError::InvalidFile(
                            "Invalid file format: Invalid utf-8 string.".to_owned(),
                        ))
                    }
                };
                bytes.advance(key_size);

                let chrom_id = bytes.get_u32_endian(endianness);
                let chrom_size = bytes.get_u32_endian(endianness);
                chroms.push(ChromInfo {
                    name: key_string,
                    id: chrom_id,
                    length: chrom_size,
                });
            }
        }
        0 => {
            // First, go through and get child blocks
            let mut children: Vec<u64> = Vec::with_capacity(count);
            for _ in 0..count {
                // Only needed for lookups by name, we read the whole tree
                bytes.advance(key_size);
                children.push(bytes.get_u64_endian(endianness));
            }
            // Then go through each child block
            for child in children {
                if child <= offset {
                    return Err(BBIFileReadInfoError::InvalidFile(format!(
                        "Chromosome tree child at {} does not follow its parent at {}.",
                        child, offset
                    )));
                }
                read_chrom_tree_block(f, child, chroms, key_size as u32)?;
            }
        }
        _ => {
            return Err(BBIFileReadInfoError::InvalidFile(format!(
                "Unexpected isleaf in chromosome tree: {}",
                isleaf
            )))
        }
    }
    Ok(())
}

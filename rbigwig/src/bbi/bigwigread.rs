/*!
Provides the interface for reading bigWig files.

## Example
```rust, no_run
# use std::error::Error;
# use rbigwig::{BigWigRead, Statistic};
# fn main() -> Result<(), Box<dyn Error>> {
// First, we open a bigWig using a file name.
let mut bwread = BigWigRead::open_file("signal.bigWig")?;

// Then, we could get the chromosomes and lengths
let chroms = bwread.chroms();
println!("{} has {} bases", chroms[0].name, chroms[0].length);

// We can read the intervals overlapping a region
let intervals = bwread.fetch_intervals("chr17", 0, 59899, false)?;
for value in &intervals.values {
    println!("{}\t{}\t{}", value.start, value.end, value.value);
}

// Or summarize a region into bins
let means = bwread.fetch_stats("chr17", 0, 1_000_000, 10, Statistic::Mean, false)?;
assert_eq!(means.len(), 10);
# Ok(())
# }
```
*/
use std::fs::File;
use std::io;
use std::path::Path;

use byteordered::Endianness;
use bytes::{Buf, Bytes};
use log::{debug, trace};
use thiserror::Error;

use crate::bbi::bbiread::{read_info, BBIFileReadInfoError, TOTAL_SUMMARY_SIZE};
use crate::bbi::block::{BBIFileRead, BlockDecompressor, CachedBBIFileRead};
use crate::bbi::cirtree::{read_cir_tree_header, search_cir_tree};
use crate::bbi::{BBIFile, BBIFileInfo, BBIReadError, ChromInfo, Summary, Value, ZoomRecord};
use crate::utils::endian::EndianBuf;
use crate::utils::file::bytereader::ByteReader;
use crate::utils::file::SeekableRead;
use crate::utils::stats::{
    aggregate, aggregate_zoom, bin_boundaries, select_zoom, zoom_records_fit_bins, Statistic,
};

const SECTION_HEADER_SIZE: usize = 24;
const ZOOM_RECORD_SIZE: usize = 32;

/// Possible errors encountered when opening a bigWig file to read
#[derive(Debug, Error)]
pub enum BigWigReadOpenError {
    #[error("File is not a bigWig.")]
    NotABigWig,
    #[error("Unsupported bigWig version: {}", .0)]
    UnsupportedVersion(u16),
    #[error("File not found: {}", .0)]
    FileNotFound(String),
    #[error("The file was invalid: {}", .0)]
    InvalidFile(String),
    #[error("{}", .0)]
    IoError(io::Error),
}

impl From<io::Error> for BigWigReadOpenError {
    fn from(error: io::Error) -> Self {
        BigWigReadOpenError::IoError(error)
    }
}

impl From<BBIFileReadInfoError> for BigWigReadOpenError {
    fn from(error: BBIFileReadInfoError) -> Self {
        match error {
            BBIFileReadInfoError::UnknownMagic => BigWigReadOpenError::NotABigWig,
            BBIFileReadInfoError::UnsupportedVersion(v) => {
                BigWigReadOpenError::UnsupportedVersion(v)
            }
            BBIFileReadInfoError::InvalidFile(msg) => BigWigReadOpenError::InvalidFile(msg),
            BBIFileReadInfoError::IoError(e) => BigWigReadOpenError::IoError(e),
        }
    }
}

/// The kind of a bigWig data section, which determines how its items are
/// encoded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SectionType {
    /// `start`, `end` and `value` per item
    BedGraph,
    /// `start` and `value` per item, with a shared span
    VarStep,
    /// only `value` per item, with a shared step and span
    FixedStep,
}

impl SectionType {
    fn from_u8(section_type: u8) -> Option<Self> {
        match section_type {
            1 => Some(SectionType::BedGraph),
            2 => Some(SectionType::VarStep),
            3 => Some(SectionType::FixedStep),
            _ => None,
        }
    }

    fn item_size(self) -> usize {
        match self {
            SectionType::BedGraph => 12,
            SectionType::VarStep => 8,
            SectionType::FixedStep => 4,
        }
    }

    /// Fixed step sections only store a start for the whole section; item
    /// ends are implied by the span.
    pub fn has_explicit_ends(self) -> bool {
        !matches!(self, SectionType::FixedStep)
    }
}

/// The values overlapping a region, sorted by start.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Intervals {
    pub values: Vec<Value>,
    /// `false` when every section the values came from was fixed step
    pub has_explicit_ends: bool,
}

/// The struct used to read a bigWig file
pub struct BigWigRead<R> {
    pub(super) info: BBIFileInfo,
    pub(super) read: R,
    decompressor: BlockDecompressor,
}

impl BigWigRead<ByteReader<File>> {
    /// Opens a new `BigWigRead` from a given path as a file.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self, BigWigReadOpenError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                BigWigReadOpenError::FileNotFound(path.to_string_lossy().into_owned())
            }
            _ => BigWigReadOpenError::IoError(e),
        })?;
        let b = BigWigRead::open(file);
        if let Err(e) = &b {
            debug!("Error when opening {}: {}", path.display(), e);
        }
        b
    }
}

impl<S: SeekableRead> BigWigRead<ByteReader<S>> {
    /// Opens a new `BigWigRead` for a given type that implements both `Read` and `Seek`
    pub fn open(read: S) -> Result<Self, BigWigReadOpenError> {
        let mut read = ByteReader::new(read)?;
        let info = read_info(&mut read)?;
        match info.filetype {
            BBIFile::BigWig => {}
            _ => return Err(BigWigReadOpenError::NotABigWig),
        }

        let decompressor = BlockDecompressor::new(info.header.uncompress_buf_size);
        Ok(BigWigRead {
            info,
            read,
            decompressor,
        })
    }

    /// Converts this `BigWigRead` to where the `BBIFileRead` caches index
    /// access and block data
    pub fn cached(self) -> BigWigRead<CachedBBIFileRead<S>> {
        BigWigRead {
            info: self.info,
            read: CachedBBIFileRead::new(self.read),
            decompressor: self.decompressor,
        }
    }
}

impl<R> BigWigRead<R> {
    /// Get basic info about this bigWig
    pub fn info(&self) -> &BBIFileInfo {
        &self.info
    }

    /// Gets the chromosomes present in this bigWig
    pub fn chroms(&self) -> &[ChromInfo] {
        &self.info.chrom_info
    }

    /// Gets a reference to the inner `R` type, in order to access any info
    pub fn inner_read(&self) -> &R {
        &self.read
    }

    /// Resolves a chromosome name and checks that `[start, end)` is a
    /// non-empty range inside it.
    fn resolve(&self, chrom_name: &str, start: u32, end: u32) -> Result<u32, BBIReadError> {
        let chrom = self.info.chrom_id(chrom_name)?;
        let invalid = |reason| BBIReadError::InvalidRange {
            chrom: chrom_name.to_owned(),
            start,
            end,
            reason,
        };
        if start >= end {
            return Err(invalid("start must be less than end"));
        }
        if end > chrom.length {
            return Err(invalid("end is past the end of the chromosome"));
        }
        Ok(chrom.id)
    }
}

impl<R> BigWigRead<R>
where
    R: BBIFileRead,
{
    /// Returns the summary data from bigWig
    ///
    /// Note: For version 1 of bigWigs, there is no total summary. In that
    /// case, 0 is returned for all of the summary except total items. If this
    /// matters to you, you can check the version using
    /// `info().header.version > 1`.
    pub fn get_summary(&mut self) -> Result<Summary, BBIReadError> {
        let endianness = self.info.header.endianness;
        let summary_offset = self.info.header.total_summary_offset;
        let data_offset = self.info.header.full_data_offset;
        let reader = self.read.reader();
        let (bases_covered, min_val, max_val, sum, sum_squares) = if summary_offset != 0 {
            let mut data = reader.read_at(summary_offset, TOTAL_SUMMARY_SIZE as usize)?;
            (
                data.get_u64_endian(endianness),
                data.get_f64_endian(endianness),
                data.get_f64_endian(endianness),
                data.get_f64_endian(endianness),
                data.get_f64_endian(endianness),
            )
        } else {
            (0, 0.0, 0.0, 0.0, 0.0)
        };
        let mut count = reader.read_at(data_offset, 8)?;
        let total_items = count.get_u64_endian(endianness);
        Ok(Summary {
            total_items,
            bases_covered,
            min_val,
            max_val,
            sum,
            sum_squares,
        })
    }

    fn full_index_root(&mut self) -> Result<u64, BBIReadError> {
        if let Some(root) = self.info.header.full_index_tree_offset {
            return Ok(root);
        }
        let root = read_cir_tree_header(self.read.reader(), self.info.header.full_index_offset)?;
        self.info.header.full_index_tree_offset = Some(root);
        Ok(root)
    }

    fn zoom_index_root(&mut self, reduction_level: u32) -> Result<u64, BBIReadError> {
        let zoom_header = self
            .info
            .zoom_headers
            .iter_mut()
            .find(|h| h.reduction_level == reduction_level)
            .ok_or(BBIReadError::ReductionLevelNotFound(reduction_level))?;
        if let Some(root) = zoom_header.index_tree_offset {
            return Ok(root);
        }
        let root = read_cir_tree_header(self.read.reader(), zoom_header.index_offset)?;
        zoom_header.index_tree_offset = Some(root);
        Ok(root)
    }

    fn intervals_for_chrom(
        &mut self,
        chrom: u32,
        start: u32,
        end: u32,
        include_missing: bool,
    ) -> Result<Intervals, BBIReadError> {
        let root = self.full_index_root()?;
        let blocks = search_cir_tree(&mut self.read, root, chrom, start, end)?;
        let endianness = self.info.header.endianness;

        let mut values = Vec::new();
        let mut saw_section = false;
        let mut saw_explicit_ends = false;
        for block in blocks {
            let data = self.read.get_block_data(&block, &mut self.decompressor)?;
            let section_type = decode_section(
                data,
                endianness,
                chrom,
                start,
                end,
                include_missing,
                &mut values,
            )?;
            if let Some(section_type) = section_type {
                trace!("Decoded {:?} section at {}", section_type, block.offset);
                saw_section = true;
                saw_explicit_ends |= section_type.has_explicit_ends();
            }
        }
        values.sort_by_key(|v| v.start);

        Ok(Intervals {
            values,
            has_explicit_ends: saw_explicit_ends || !saw_section,
        })
    }

    /// For a given chromosome, start, and end, returns the intersecting
    /// `Value`s, sorted by start and clipped to `[start, end)`.
    ///
    /// Values that are `NaN` mark missing data, and are only returned if
    /// `include_missing` is set.
    pub fn fetch_intervals(
        &mut self,
        chrom_name: &str,
        start: u32,
        end: u32,
        include_missing: bool,
    ) -> Result<Intervals, BBIReadError> {
        let chrom = self.resolve(chrom_name, start, end)?;
        debug!("Fetching intervals for {}:{}-{}", chrom_name, start, end);
        self.intervals_for_chrom(chrom, start, end, include_missing)
    }

    /// For a given chromosome, start, and end, returns the intersecting
    /// `ZoomRecord`s at the given zoom level. Records are not clipped.
    pub fn get_zoom_interval(
        &mut self,
        chrom_name: &str,
        start: u32,
        end: u32,
        reduction_level: u32,
    ) -> Result<Vec<ZoomRecord>, BBIReadError> {
        let chrom = self.resolve(chrom_name, start, end)?;
        self.zoom_records_for_chrom(chrom, start, end, reduction_level)
    }

    fn zoom_records_for_chrom(
        &mut self,
        chrom: u32,
        start: u32,
        end: u32,
        reduction_level: u32,
    ) -> Result<Vec<ZoomRecord>, BBIReadError> {
        let root = self.zoom_index_root(reduction_level)?;
        let blocks = search_cir_tree(&mut self.read, root, chrom, start, end)?;
        let endianness = self.info.header.endianness;

        let mut records = Vec::new();
        for block in blocks {
            let data = self.read.get_block_data(&block, &mut self.decompressor)?;
            decode_zoom_block(data, endianness, chrom, start, end, &mut records)?;
        }
        records.sort_by_key(|r| r.start);
        Ok(records)
    }

    /// Returns the values between `start` and `end` as a `Vec<f64>`, one per
    /// base. Any positions with no data in the bigWig will be `f64::NAN`.
    pub fn values(
        &mut self,
        chrom_name: &str,
        start: u32,
        end: u32,
    ) -> Result<Vec<f64>, BBIReadError> {
        let chrom = self.resolve(chrom_name, start, end)?;
        let len = (end - start) as usize;
        let mut values = Vec::new();
        values
            .try_reserve_exact(len)
            .map_err(|_| BBIReadError::OutOfMemory(len))?;
        values.resize(len, f64::NAN);

        let intervals = self.intervals_for_chrom(chrom, start, end, false)?;
        for interval in intervals.values {
            let interval_start = (interval.start - start) as usize;
            let interval_end = (interval.end - start) as usize;
            for i in &mut values[interval_start..interval_end] {
                *i = f64::from(interval.value);
            }
        }
        Ok(values)
    }

    /// Summarizes `[start, end)` into `nbins` bins.
    ///
    /// Unless `exact` is set, a zoom level is used when there is one at most
    /// half the bin size (see [`select_zoom`]). Min, max, sum and coverage
    /// only come from zoom data when no zoom record is split between bins,
    /// and are computed from raw data otherwise. Mean and stdev from zoom
    /// data can differ slightly from exact results, see [`aggregate_zoom`].
    pub fn fetch_stats(
        &mut self,
        chrom_name: &str,
        start: u32,
        end: u32,
        nbins: usize,
        statistic: Statistic,
        exact: bool,
    ) -> Result<Vec<f64>, BBIReadError> {
        let chrom = self.resolve(chrom_name, start, end)?;
        if nbins == 0 {
            return Err(BBIReadError::InvalidRange {
                chrom: chrom_name.to_owned(),
                start,
                end,
                reason: "the number of bins must be positive",
            });
        }

        let boundaries = bin_boundaries(start, end, nbins)
            .map_err(|_| BBIReadError::OutOfMemory(nbins))?;

        let zoom = match exact {
            true => None,
            false => select_zoom(&self.info.zoom_headers, start, end, nbins),
        };
        if let Some(reduction_level) = zoom {
            let records = self.zoom_records_for_chrom(chrom, start, end, reduction_level)?;
            if !statistic.needs_whole_zoom_records()
                || zoom_records_fit_bins(&records, &boundaries)
            {
                debug!(
                    "Summarizing {}:{}-{} into {} bins using zoom level {}",
                    chrom_name, start, end, nbins, reduction_level
                );
                return aggregate_zoom(&records, start, end, nbins, statistic)
                    .map_err(|_| BBIReadError::OutOfMemory(nbins));
            }
            debug!(
                "Zoom level {} is split by the bins of {}:{}-{}, using raw data for {}",
                reduction_level, chrom_name, start, end, statistic
            );
        }

        debug!(
            "Summarizing {}:{}-{} into {} bins from raw data",
            chrom_name, start, end, nbins
        );
        let intervals = self.intervals_for_chrom(chrom, start, end, false)?;
        aggregate(&intervals.values, start, end, nbins, statistic)
            .map_err(|_| BBIReadError::OutOfMemory(nbins))
    }
}

/// Decodes the items of one data section that overlap `[start, end)`, clipped
/// to the range, into `values`. Returns `None` if the section is for a
/// different chromosome.
pub(crate) fn decode_section(
    mut data: Bytes,
    endianness: Endianness,
    chrom: u32,
    start: u32,
    end: u32,
    include_missing: bool,
    values: &mut Vec<Value>,
) -> Result<Option<SectionType>, BBIReadError> {
    if data.len() < SECTION_HEADER_SIZE {
        return Err(BBIReadError::InvalidFile(format!(
            "Data section is too short ({} bytes).",
            data.len()
        )));
    }
    let chrom_id = data.get_u32_endian(endianness);
    let chrom_start = data.get_u32_endian(endianness);
    let _chrom_end = data.get_u32_endian(endianness);
    let item_step = data.get_u32_endian(endianness);
    let item_span = data.get_u32_endian(endianness);
    let section_type = data.get_u8();
    let _reserved = data.get_u8();
    let item_count = data.get_u16_endian(endianness) as usize;

    if chrom_id != chrom {
        return Ok(None);
    }

    let section_type = SectionType::from_u8(section_type).ok_or_else(|| {
        BBIReadError::InvalidFile(format!("Unknown bigwig section type: {}", section_type))
    })?;
    if data.remaining() < item_count * section_type.item_size() {
        return Err(BBIReadError::InvalidFile(format!(
            "Data section has {} {:?} items, but only {} bytes of data.",
            item_count,
            section_type,
            data.remaining()
        )));
    }
    values
        .try_reserve(item_count)
        .map_err(|_| BBIReadError::OutOfMemory(item_count))?;

    let mut curr_start = chrom_start;
    for _ in 0..item_count {
        let (item_start, item_end, value) = match section_type {
            SectionType::BedGraph => {
                let item_start = data.get_u32_endian(endianness);
                let item_end = data.get_u32_endian(endianness);
                let value = data.get_f32_endian(endianness);
                (item_start, item_end, value)
            }
            SectionType::VarStep => {
                let item_start = data.get_u32_endian(endianness);
                let value = data.get_f32_endian(endianness);
                (item_start, item_start.saturating_add(item_span), value)
            }
            SectionType::FixedStep => {
                let value = data.get_f32_endian(endianness);
                let item_start = curr_start;
                curr_start = curr_start.saturating_add(item_step);
                (item_start, item_start.saturating_add(item_span), value)
            }
        };
        if item_start >= item_end || item_end <= start || item_start >= end {
            continue;
        }
        if value.is_nan() && !include_missing {
            continue;
        }
        values.push(Value {
            start: item_start.max(start),
            end: item_end.min(end),
            value,
        });
    }

    Ok(Some(section_type))
}

/// Decodes the zoom records of one block that overlap `[start, end)`.
pub(crate) fn decode_zoom_block(
    mut data: Bytes,
    endianness: Endianness,
    chrom: u32,
    start: u32,
    end: u32,
    records: &mut Vec<ZoomRecord>,
) -> Result<(), BBIReadError> {
    if data.len() % ZOOM_RECORD_SIZE != 0 {
        return Err(BBIReadError::InvalidFile(format!(
            "Zoom block of {} bytes is not a whole number of records.",
            data.len()
        )));
    }
    let itemcount = data.len() / ZOOM_RECORD_SIZE;
    records
        .try_reserve(itemcount)
        .map_err(|_| BBIReadError::OutOfMemory(itemcount))?;

    for _ in 0..itemcount {
        let chrom_id = data.get_u32_endian(endianness);
        let chrom_start = data.get_u32_endian(endianness);
        let chrom_end = data.get_u32_endian(endianness);
        let bases_covered = u64::from(data.get_u32_endian(endianness));
        let min_val = f64::from(data.get_f32_endian(endianness));
        let max_val = f64::from(data.get_f32_endian(endianness));
        let sum = f64::from(data.get_f32_endian(endianness));
        let sum_squares = f64::from(data.get_f32_endian(endianness));
        if chrom_id == chrom && chrom_end > start && chrom_start < end {
            records.push(ZoomRecord {
                chrom: chrom_id,
                start: chrom_start,
                end: chrom_end,
                summary: Summary {
                    total_items: 0,
                    bases_covered,
                    min_val,
                    max_val,
                    sum,
                    sum_squares,
                },
            });
        }
    }
    Ok(())
}

/*!
One-shot queries: open a bigWig, run a single query, and close it again.

These are the operations a language binding needs. Each call opens its own
[`BigWigRead`], so there is no state shared between calls.

```rust, no_run
# use rbigwig::fetch::{fetch_region, fetch_region_stats};
# use rbigwig::Statistic;
# fn main() -> Result<(), rbigwig::fetch::FetchError> {
let region = fetch_region("signal.bigWig", "chr1", 0, 10_000)?;
println!("{} intervals", region.values.len());

let means = fetch_region_stats("signal.bigWig", "chr1", 0, 10_000, 100, Statistic::Mean)?;
assert_eq!(means.len(), 100);
# Ok(())
# }
```
*/
use std::path::Path;

use thiserror::Error;

use crate::bbi::{BBIReadError, BigWigRead, BigWigReadOpenError};
use crate::utils::stats::{bin_boundaries, Statistic};

/// The intervals overlapping a region, as parallel columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionValues {
    pub starts: Vec<u32>,
    /// `None` when every section read stored only starts (fixed step data);
    /// the interval ends are then implied by the file's span
    pub ends: Option<Vec<u32>>,
    pub values: Vec<f64>,
}

/// One bin of [`fetch_region_stats_table`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BinRow {
    /// 1-based bin number
    pub row: usize,
    pub start: u32,
    pub end: u32,
    pub score: f64,
}

/// The broad category of a [`FetchError`], for callers that map errors onto
/// their own error types.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    FileNotFound,
    UnsupportedFormat,
    CorruptData,
    UnknownChromosome,
    InvalidRange,
    OutOfMemory,
    Io,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Unable to open bigWig: {}", .0)]
    Open(#[from] BigWigReadOpenError),
    #[error("Unable to read bigWig: {}", .0)]
    Read(#[from] BBIReadError),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Open(e) => match e {
                BigWigReadOpenError::FileNotFound(_) => ErrorKind::FileNotFound,
                BigWigReadOpenError::NotABigWig | BigWigReadOpenError::UnsupportedVersion(_) => {
                    ErrorKind::UnsupportedFormat
                }
                BigWigReadOpenError::InvalidFile(_) => ErrorKind::CorruptData,
                BigWigReadOpenError::IoError(_) => ErrorKind::Io,
            },
            FetchError::Read(e) => match e {
                BBIReadError::InvalidChromosome(_) => ErrorKind::UnknownChromosome,
                BBIReadError::InvalidRange { .. } | BBIReadError::ReductionLevelNotFound(_) => {
                    ErrorKind::InvalidRange
                }
                BBIReadError::InvalidFile(_) => ErrorKind::CorruptData,
                BBIReadError::OutOfMemory(_) => ErrorKind::OutOfMemory,
                BBIReadError::IoError(_) => ErrorKind::Io,
            },
        }
    }
}

/// Returns the intervals of `chrom` overlapping `[start, end)`, clipped to
/// the region and sorted by start. Missing (`NaN`) values are left out.
pub fn fetch_region(
    path: impl AsRef<Path>,
    chrom: &str,
    start: u32,
    end: u32,
) -> Result<RegionValues, FetchError> {
    let mut bigwig = BigWigRead::open_file(path)?;
    let intervals = bigwig.fetch_intervals(chrom, start, end, false)?;

    let len = intervals.values.len();
    let mut region = RegionValues::default();
    region
        .starts
        .try_reserve_exact(len)
        .and_then(|_| region.values.try_reserve_exact(len))
        .map_err(|_| BBIReadError::OutOfMemory(len))?;
    let mut ends = Vec::new();
    if intervals.has_explicit_ends {
        ends.try_reserve_exact(len)
            .map_err(|_| BBIReadError::OutOfMemory(len))?;
    }
    for value in &intervals.values {
        region.starts.push(value.start);
        region.values.push(f64::from(value.value));
        if intervals.has_explicit_ends {
            ends.push(value.end);
        }
    }
    region.ends = intervals.has_explicit_ends.then_some(ends);
    Ok(region)
}

/// Summarizes `[start, end)` of `chrom` into `bins` bins, using zoom data
/// when it is fine enough. See [`BigWigRead::fetch_stats`].
pub fn fetch_region_stats(
    path: impl AsRef<Path>,
    chrom: &str,
    start: u32,
    end: u32,
    bins: usize,
    statistic: Statistic,
) -> Result<Vec<f64>, FetchError> {
    let mut bigwig = BigWigRead::open_file(path)?;
    Ok(bigwig.fetch_stats(chrom, start, end, bins, statistic, false)?)
}

/// Like [`fetch_region_stats`], with the bin coordinates of each score.
pub fn fetch_region_stats_table(
    path: impl AsRef<Path>,
    chrom: &str,
    start: u32,
    end: u32,
    bins: usize,
    statistic: Statistic,
) -> Result<Vec<BinRow>, FetchError> {
    let scores = fetch_region_stats(path, chrom, start, end, bins, statistic)?;
    let boundaries =
        bin_boundaries(start, end, bins).map_err(|_| BBIReadError::OutOfMemory(bins))?;

    let mut rows = Vec::new();
    rows.try_reserve_exact(bins)
        .map_err(|_| BBIReadError::OutOfMemory(bins))?;
    rows.extend(scores.into_iter().enumerate().map(|(i, score)| BinRow {
        row: i + 1,
        start: boundaries[i],
        end: boundaries[i + 1],
        score,
    }));
    Ok(rows)
}

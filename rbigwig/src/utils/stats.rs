//! Summary statistics over bins of a region, computed either from raw
//! intervals or from the pre-aggregated records of a zoom level.

use std::collections::TryReserveError;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use itertools::Itertools;
use thiserror::Error;

use crate::bbi::{Value, ZoomHeader, ZoomRecord};

/// The statistic to compute for each bin
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Statistic {
    /// Mean value, weighted by the number of bases covered
    Mean,
    /// Weighted population standard deviation
    Stdev,
    Min,
    Max,
    /// Sum of `value * bases` over the bin
    Sum,
    /// Fraction of the bin's bases that have data
    Coverage,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Stdev => "stdev",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Sum => "sum",
            Statistic::Coverage => "coverage",
        }
    }

    /// Whether zoom records only give the same result as raw data when none
    /// of them is split between bins. Mean and stdev tolerate the split.
    pub fn needs_whole_zoom_records(&self) -> bool {
        matches!(
            self,
            Statistic::Min | Statistic::Max | Statistic::Sum | Statistic::Coverage
        )
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "Unrecognized statistic `{}`. Only `mean`, `stdev`, `min`, `max`, `sum` and `coverage` are allowed.",
    .0
)]
pub struct UnknownStatistic(pub String);

impl FromStr for Statistic {
    type Err = UnknownStatistic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "mean" => Statistic::Mean,
            "stdev" => Statistic::Stdev,
            "min" => Statistic::Min,
            "max" => Statistic::Max,
            "sum" => Statistic::Sum,
            "coverage" => Statistic::Coverage,
            _ => return Err(UnknownStatistic(s.to_owned())),
        })
    }
}

/// The `nbins + 1` boundaries splitting `[start, end)` into `nbins` bins.
///
/// Boundary `i` is `start + round((end - start) * i / nbins)` (rounding half
/// up), computed exactly. The first boundary is `start`, the last is `end`,
/// and bins differ in length by at most one base. When there are more bins
/// than bases, some bins are empty.
pub fn bin_boundaries(
    start: u32,
    end: u32,
    nbins: usize,
) -> Result<Vec<u32>, TryReserveError> {
    let mut boundaries = Vec::new();
    // Saturating, so an absurd bin count fails to reserve
    boundaries.try_reserve_exact(nbins.saturating_add(1))?;
    boundaries.push(start);
    if nbins == 0 {
        return Ok(boundaries);
    }
    let len = u128::from(end.saturating_sub(start));
    let n = nbins as u128;
    boundaries.extend((1..=n).map(|i| start + ((2 * len * i + n) / (2 * n)) as u32));
    Ok(boundaries)
}

/// The indices of the bins that `[start, end)` may overlap.
fn bins_overlapping(boundaries: &[u32], start: u32, end: u32) -> Range<usize> {
    let nbins = boundaries.len() - 1;
    let first = boundaries[1..].partition_point(|&b| b <= start);
    let last = boundaries[..nbins].partition_point(|&b| b < end);
    first..last.max(first)
}

#[derive(Copy, Clone, Debug)]
struct BinAccumulator {
    bases_covered: f64,
    sum: f64,
    sum_squares: f64,
    min: f64,
    max: f64,
}

impl Default for BinAccumulator {
    fn default() -> Self {
        BinAccumulator {
            bases_covered: 0.0,
            sum: 0.0,
            sum_squares: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl BinAccumulator {
    fn add(&mut self, bases_covered: f64, sum: f64, sum_squares: f64, min: f64, max: f64) {
        self.bases_covered += bases_covered;
        self.sum += sum;
        self.sum_squares += sum_squares;
        self.min = self.min.min(min);
        self.max = self.max.max(max);
    }

    fn finish(&self, statistic: Statistic, bin_len: u32) -> f64 {
        let empty = self.bases_covered <= 0.0;
        match statistic {
            Statistic::Sum => self.sum,
            Statistic::Coverage => match bin_len {
                0 => 0.0,
                _ => (self.bases_covered / f64::from(bin_len)).clamp(0.0, 1.0),
            },
            _ if empty => f64::NAN,
            Statistic::Mean => self.sum / self.bases_covered,
            Statistic::Min => self.min,
            Statistic::Max => self.max,
            Statistic::Stdev => {
                let mean = self.sum / self.bases_covered;
                let variance = self.sum_squares / self.bases_covered - mean * mean;
                variance.max(0.0).sqrt()
            }
        }
    }
}

fn accumulate<T>(
    items: &[T],
    start: u32,
    end: u32,
    nbins: usize,
    statistic: Statistic,
    mut add: impl FnMut(&T, &[u32], &mut [BinAccumulator]),
) -> Result<Vec<f64>, TryReserveError> {
    let boundaries = bin_boundaries(start, end, nbins)?;
    let mut bins = Vec::new();
    bins.try_reserve_exact(nbins)?;
    bins.resize(nbins, BinAccumulator::default());
    if nbins == 0 {
        return Ok(vec![]);
    }

    for item in items {
        add(item, &boundaries[..], &mut bins[..]);
    }

    let mut stats = Vec::new();
    stats.try_reserve_exact(nbins)?;
    stats.extend(
        boundaries
            .iter()
            .tuple_windows()
            .zip(bins.iter())
            .map(|((bin_start, bin_end), bin)| bin.finish(statistic, bin_end - bin_start)),
    );
    Ok(stats)
}

/// The number of bases of `[start, end)` inside bin `bin`.
fn overlap(boundaries: &[u32], bin: usize, start: u32, end: u32) -> u32 {
    end.min(boundaries[bin + 1])
        .saturating_sub(start.max(boundaries[bin]))
}

/// Computes `statistic` for each of `nbins` bins over `[start, end)` from raw
/// intervals. Each interval contributes to a bin in proportion to the bases
/// it shares with that bin; `NaN` values are ignored.
///
/// Empty bins are `0` for [`Statistic::Sum`] and [`Statistic::Coverage`],
/// and `NaN` otherwise.
pub fn aggregate(
    values: &[Value],
    start: u32,
    end: u32,
    nbins: usize,
    statistic: Statistic,
) -> Result<Vec<f64>, TryReserveError> {
    accumulate(values, start, end, nbins, statistic, |v, boundaries, bins| {
        let value = f64::from(v.value);
        if value.is_nan() {
            return;
        }
        for bin in bins_overlapping(boundaries, v.start, v.end) {
            let bases = overlap(boundaries, bin, v.start, v.end);
            if bases == 0 {
                continue;
            }
            let w = f64::from(bases);
            bins[bin].add(w, w * value, w * value * value, value, value);
        }
    })
}

/// Like [`aggregate`], but from zoom records.
///
/// A record only partially inside a bin contributes its bases covered, sum,
/// and sum of squares scaled by the fraction of the record inside the bin.
/// Its min and max are used as is. So results only match [`aggregate`] over
/// the same region when [`zoom_records_fit_bins`] holds, or for mean and
/// stdev, which are allowed to drift within floating point tolerance.
pub fn aggregate_zoom(
    records: &[ZoomRecord],
    start: u32,
    end: u32,
    nbins: usize,
    statistic: Statistic,
) -> Result<Vec<f64>, TryReserveError> {
    accumulate(records, start, end, nbins, statistic, |r, boundaries, bins| {
        let summary = &r.summary;
        let record_len = r.end.saturating_sub(r.start);
        if summary.bases_covered == 0 || record_len == 0 {
            return;
        }
        for bin in bins_overlapping(boundaries, r.start, r.end) {
            let bases = overlap(boundaries, bin, r.start, r.end);
            if bases == 0 {
                continue;
            }
            let fraction = f64::from(bases) / f64::from(record_len);
            bins[bin].add(
                summary.bases_covered as f64 * fraction,
                summary.sum * fraction,
                summary.sum_squares * fraction,
                summary.min_val,
                summary.max_val,
            );
        }
    })
}

/// Whether every record that carries data lies inside a single bin of
/// `boundaries`, which also means inside the queried region.
pub fn zoom_records_fit_bins(records: &[ZoomRecord], boundaries: &[u32]) -> bool {
    let (start, end) = match (boundaries.first(), boundaries.last()) {
        (Some(&start), Some(&end)) => (start, end),
        _ => return false,
    };
    records.iter().all(|r| {
        if r.summary.bases_covered == 0 || r.end <= r.start {
            return true;
        }
        if r.start < start || r.end > end {
            return false;
        }
        let next = boundaries.partition_point(|&b| b <= r.start);
        boundaries.get(next).map_or(false, |&b| r.end <= b)
    })
}

/// Picks the zoom level to summarize `[start, end)` into `nbins` bins: the
/// one with the largest reduction level that is at most half the bin size.
/// Returns `None` if no zoom level is fine enough.
pub fn select_zoom(
    zoom_headers: &[ZoomHeader],
    start: u32,
    end: u32,
    nbins: usize,
) -> Option<u32> {
    if nbins == 0 {
        return None;
    }
    let max_zoom_size =
        u64::from(end.saturating_sub(start)) / (nbins as u64).saturating_mul(2);
    zoom_headers
        .iter()
        .map(|z| z.reduction_level)
        .filter(|&r| r > 0 && u64::from(r) <= max_zoom_size)
        .max()
}

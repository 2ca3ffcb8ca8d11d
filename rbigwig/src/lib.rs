/*!
rbigwig provides random-access reading of bigWig files: the intervals
overlapping a region, per-base values, and per-bin summary statistics.

The original file format specification for bigWig and bigBed files is defined in this paper: <https://doi.org/10.1093/bioinformatics/btq351>

## Reading

The entrypoint is [`BigWigRead::open`], which takes any type that implements
both [`Read`][std::io::Read] and [`Seek`][std::io::Seek]. There is also
[`BigWigRead::open_file`], which takes a path and opens a `File`. With the
`remote` feature, [`RemoteFile`][crate::utils::file::remote_file::RemoteFile]
reads a bigWig over HTTP using range requests.

Once a [`BigWigRead`] has been constructed, the header, zoom levels and
chromosomes are available through [`BigWigRead::info`]. Data is read with:

- [`BigWigRead::fetch_intervals`]: the `(start, end, value)` records
  overlapping a region, clipped to it.
- [`BigWigRead::values`]: one value per base, `NaN` where there is no data.
- [`BigWigRead::fetch_stats`]: one summary [`Statistic`] per bin, computed
  from a zoom level when the requested resolution is coarse enough.

Repeated queries over the same regions can use [`BigWigRead::cached`] to keep
decompressed blocks and index nodes in memory.

## One-shot queries

[`fetch::fetch_region`] and [`fetch::fetch_region_stats`] open a file, run a
single query and close it again. These are the two operations language
bindings are built on.
*/

mod bbi;
pub mod fetch;
pub mod utils;

pub use bbi::*;
pub use utils::file::bytereader::ByteReader;
pub use utils::stats::Statistic;

use std::error::Error;
use std::io::{self, BufWriter, Write};

use clap::Args;

use crate::utils::cli::with_bigwig;
use crate::{BBIFileRead, BigWigRead};

#[derive(Clone, Debug, PartialEq, Args)]
pub struct IntervalsArgs {
    /// The bigWig to read from.
    pub bigwig: String,

    /// The chromosome to read.
    pub chrom: String,

    /// The start of the region (0-based).
    pub start: u32,

    /// The end of the region (exclusive).
    pub end: u32,

    /// If set, intervals with missing (`NaN`) values are printed too.
    #[arg(long)]
    #[arg(default_value_t = false)]
    pub include_missing: bool,
}

/// Prints the intervals overlapping a region as bedGraph lines.
pub fn intervals(args: IntervalsArgs) -> Result<(), Box<dyn Error>> {
    with_bigwig!(&args.bigwig, write_intervals(&args))
}

fn write_intervals<R: BBIFileRead>(
    mut bigwig: BigWigRead<R>,
    args: &IntervalsArgs,
) -> Result<(), Box<dyn Error>> {
    let intervals =
        bigwig.fetch_intervals(&args.chrom, args.start, args.end, args.include_missing)?;
    let mut out = BufWriter::new(io::stdout().lock());
    for value in intervals.values {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            args.chrom, value.start, value.end, value.value
        )?;
    }
    out.flush()?;
    Ok(())
}

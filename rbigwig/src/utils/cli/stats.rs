use std::error::Error;
use std::io::{self, BufWriter, Write};

use clap::Args;

use crate::utils::cli::with_bigwig;
use crate::utils::stats::{bin_boundaries, Statistic};
use crate::{BBIFileRead, BigWigRead};

#[derive(Clone, Debug, PartialEq, Args)]
pub struct StatsArgs {
    /// The bigWig to read from.
    pub bigwig: String,

    /// The chromosome to read.
    pub chrom: String,

    /// The start of the region (0-based).
    pub start: u32,

    /// The end of the region (exclusive).
    pub end: u32,

    /// The number of bins to split the region into.
    #[arg(short = 'n', long)]
    #[arg(default_value_t = 1)]
    pub bins: usize,

    /// The statistic to compute per bin. One of `mean`, `stdev`, `min`,
    /// `max`, `sum`, or `coverage`.
    #[arg(short = 's', long)]
    #[arg(default_value_t = Statistic::Mean)]
    pub statistic: Statistic,

    /// Compute from the raw data, even when a zoom level could be used.
    #[arg(long)]
    #[arg(default_value_t = false)]
    pub exact: bool,

    /// Print a row per bin with its coordinates, instead of one line of values.
    #[arg(long)]
    #[arg(default_value_t = false)]
    pub table: bool,
}

/// Prints summary statistics over the bins of a region.
pub fn stats(args: StatsArgs) -> Result<(), Box<dyn Error>> {
    with_bigwig!(&args.bigwig, write_stats(&args))
}

fn write_stats<R: BBIFileRead>(
    mut bigwig: BigWigRead<R>,
    args: &StatsArgs,
) -> Result<(), Box<dyn Error>> {
    let scores = bigwig.fetch_stats(
        &args.chrom,
        args.start,
        args.end,
        args.bins,
        args.statistic,
        args.exact,
    )?;
    let mut out = BufWriter::new(io::stdout().lock());
    if args.table {
        let boundaries = bin_boundaries(args.start, args.end, args.bins)?;
        writeln!(out, "row\tstart\tend\t{}", args.statistic)?;
        for (i, score) in scores.iter().enumerate() {
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                i + 1,
                boundaries[i],
                boundaries[i + 1],
                score
            )?;
        }
    } else {
        let line = scores
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}

use std::error::Error;

use byteordered::Endianness;
use clap::Args;

use crate::utils::cli::with_bigwig;
use crate::{BBIFileRead, BigWigRead};

#[derive(Clone, Debug, PartialEq, Args)]
pub struct BigWigInfoArgs {
    /// The bigWig to get info for.
    pub bigwig: String,

    /// If set, will print out the list of chromosomes in the bigWig and their sizes.
    #[arg(long)]
    #[arg(default_value_t = false)]
    pub chroms: bool,

    /// If set, will print out the list of all zoom levels.
    #[arg(long)]
    #[arg(default_value_t = false)]
    pub zooms: bool,
}

pub fn bigwiginfo(args: BigWigInfoArgs) -> Result<(), Box<dyn Error>> {
    with_bigwig!(&args.bigwig, print_info(&args))
}

fn print_info<R: BBIFileRead>(
    mut bigwig: BigWigRead<R>,
    args: &BigWigInfoArgs,
) -> Result<(), Box<dyn Error>> {
    let summary = bigwig.get_summary()?;
    let info = bigwig.info();
    let header = info.header;
    println!("version: {}", header.version);
    println!(
        "isCompressed: {}",
        if header.is_compressed() { "yes" } else { "no" }
    );
    println!(
        "isSwapped: {}",
        if matches!(header.endianness, Endianness::Big) { 1 } else { 0 }
    );
    println!("itemCount: {}", num_with_commas(summary.total_items));
    println!("zoomLevels: {}", info.zoom_headers.len());
    if args.zooms {
        for zoom in info.zoom_headers.iter() {
            println!("\t{}", zoom.reduction_level);
        }
    }
    println!("chromCount: {}", info.chrom_info.len());
    if args.chroms {
        for chrom in info.chrom_info.iter() {
            println!("\t{} {} {}", chrom.name, chrom.id(), chrom.length);
        }
    }

    let covered = summary.bases_covered as f64;
    let mean = summary.sum / covered;
    let var = (summary.sum_squares - summary.sum * summary.sum / covered) / (covered - 1.0);
    println!("basesCovered: {}", num_with_commas(summary.bases_covered));
    println!("mean: {:.6}", mean);
    println!("min: {:.6}", summary.min_val);
    println!("max: {:.6}", summary.max_val);
    println!("std: {:.6}", var.max(0.0).sqrt());

    Ok(())
}

fn num_with_commas(num: u64) -> String {
    let digits = num.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(c);
    }
    formatted
}

#[test]
fn test_num_with_commas() {
    assert_eq!("0", num_with_commas(0));
    assert_eq!("987", num_with_commas(987));
    assert_eq!("1,000", num_with_commas(1000));
    assert_eq!("12,987", num_with_commas(12987));
    assert_eq!("123,987", num_with_commas(123987));
    assert_eq!("4,023,987", num_with_commas(4023987));
    assert_eq!("9,000,123,987", num_with_commas(9000123987));
    assert_eq!("9,456,123,000", num_with_commas(9456123000));
}

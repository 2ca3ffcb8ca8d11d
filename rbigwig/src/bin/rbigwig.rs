use std::error::Error;

use clap::{Parser, Subcommand};

use rbigwig::utils::cli::bigwiginfo::{bigwiginfo, BigWigInfoArgs};
use rbigwig::utils::cli::intervals::{intervals, IntervalsArgs};
use rbigwig::utils::cli::stats::{stats, StatsArgs};

#[derive(Clone, Debug, PartialEq, Subcommand)]
enum SubCommands {
    /// Gets information about a bigWig.
    Info {
        #[command(flatten)]
        args: BigWigInfoArgs,
    },
    /// Prints the intervals of a bigWig overlapping a region, as bedGraph.
    Intervals {
        #[command(flatten)]
        args: IntervalsArgs,
    },
    /// Summarizes a region of a bigWig into bins.
    Stats {
        #[command(flatten)]
        args: StatsArgs,
    },
}

#[derive(Debug, Parser)]
#[command(name = "rbigwig", about = "Reads bigWig files.", long_about = None, version)]
struct Cli {
    #[command(subcommand)]
    command: SubCommands,
}

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        SubCommands::Info { args } => bigwiginfo(args),
        SubCommands::Intervals { args } => intervals(args),
        SubCommands::Stats { args } => stats(args),
    }
}

#[test]
fn verify_cli_bin() {
    use clap::CommandFactory;
    Cli::command().debug_assert()
}

#[test]
fn test_parse_stats() {
    use rbigwig::Statistic;

    let cli = Cli::try_parse_from([
        "rbigwig", "stats", "a.bw", "chr1", "0", "1000", "--bins", "10", "-s", "max", "--table",
    ])
    .unwrap();
    match cli.command {
        SubCommands::Stats { args } => {
            assert_eq!(args.bins, 10);
            assert_eq!(args.statistic, Statistic::Max);
            assert!(args.table);
            assert!(!args.exact);
        }
        _ => panic!("Expected stats subcommand"),
    }

    let unknown = ["rbigwig", "stats", "a.bw", "chr1", "0", "1", "-s", "median"];
    assert!(Cli::try_parse_from(unknown).is_err());
}

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{value_parser, Parser};
use layout_engines::fm::graph::HyperGraph;
use layout_engines::Partitioner;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    name = "fm",
    about = "Two-way FM hypergraph partitioning with the CLIP gain reset"
)]
struct Cli {
    /// Input netlist: a balance factor followed by NET records.
    #[clap(value_parser = value_parser!(PathBuf))]
    input: PathBuf,

    /// Output partition file.
    #[clap(value_parser = value_parser!(PathBuf))]
    output: PathBuf,

    /// Dump the parsed nets and cells before partitioning.
    #[arg(long)]
    report: bool,

    /// Where to write an optional JSON run summary.
    #[arg(long, value_parser = value_parser!(PathBuf))]
    stats: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Cli::parse();

    let input = std::fs::read_to_string(&args.input)
        .with_context(|| format!("cannot open the input file {:?}", args.input))?;
    let graph = HyperGraph::parse(&input)
        .with_context(|| format!("malformed input file {:?}", args.input))?;
    let mut partitioner = Partitioner::new(graph)?;
    if args.report {
        partitioner.report_net();
        partitioner.report_cell();
    }

    partitioner.partition();
    partitioner.print_summary();

    let mut output = File::create(&args.output)
        .with_context(|| format!("cannot open the output file {:?}", args.output))?;
    partitioner
        .write_result(&mut output)
        .with_context(|| format!("cannot write {:?}", args.output))?;

    if let Some(stats) = &args.stats {
        let file = File::create(stats)
            .with_context(|| format!("cannot open the stats file {stats:?}"))?;
        serde_json::to_writer_pretty(file, &partitioner.summary())?;
    }
    Ok(())
}

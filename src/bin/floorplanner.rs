use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{value_parser, Parser};
use layout_engines::floorplan::{parse_input, SaConfig};
use layout_engines::Floorplanner;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    name = "floorplanner",
    about = "Fixed-outline B*-tree floorplanning by simulated annealing"
)]
struct Cli {
    /// Area / wirelength trade-off α in [0, 1].
    alpha: String,

    /// Block file: outline, blocks, and terminals.
    #[clap(value_parser = value_parser!(PathBuf))]
    block_file: PathBuf,

    /// Net file.
    #[clap(value_parser = value_parser!(PathBuf))]
    net_file: PathBuf,

    /// Output floorplan file.
    #[clap(value_parser = value_parser!(PathBuf))]
    output: PathBuf,

    /// Where to write an optional JSON run summary.
    #[arg(long, value_parser = value_parser!(PathBuf))]
    stats: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Cli::parse();

    let alpha: f64 = args
        .alpha
        .parse()
        .with_context(|| format!("invalid alpha {:?}", args.alpha))?;
    let blk_input = std::fs::read_to_string(&args.block_file)
        .with_context(|| format!("cannot open the input file {:?}", args.block_file))?;
    let net_input = std::fs::read_to_string(&args.net_file)
        .with_context(|| format!("cannot open the input file {:?}", args.net_file))?;
    let input = parse_input(&blk_input, &net_input)
        .with_context(|| format!("malformed input file {:?}", args.block_file))?;

    // Hyperparameters are tuned per benchmark case and raw α argument.
    let config = SaConfig::for_case(&args.block_file.to_string_lossy(), &args.alpha);
    let mut floorplanner = Floorplanner::new(input, alpha, config);

    let start = Instant::now();
    floorplanner.floorplan();
    let run_time = start.elapsed().as_secs_f64();

    let mut output = File::create(&args.output)
        .with_context(|| format!("cannot open the output file {:?}", args.output))?;
    floorplanner
        .write_output(&mut output, run_time)
        .with_context(|| format!("cannot write {:?}", args.output))?;

    if let Some(stats) = &args.stats {
        let file = File::create(stats)
            .with_context(|| format!("cannot open the stats file {stats:?}"))?;
        serde_json::to_writer_pretty(file, &floorplanner.summary())?;
    }
    Ok(())
}

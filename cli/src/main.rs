mod interactive;

use std::{
    fs::File,
    io::{stdin, BufReader},
    path::PathBuf,
};

use anyhow::Result;
use cache_sim::{
    accumulator::CacheStats, config::SimConfig, sim::Simulator, trace::TraceReader,
};
use clap::{Args, Parser, Subcommand};

#[cfg(feature = "stat")]
use terminal_size::terminal_size;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// simulate a memory trace
    Run(RunArgs),
    /// print the default configuration as JSON
    Defaults,
}

#[derive(Args, Debug)]
struct GeometryArgs {
    /// log2 of L1 capacity in bytes
    #[arg(short = 'c')]
    c1: Option<u32>,
    /// log2 of L1 block size in bytes
    #[arg(short = 'b')]
    b1: Option<u32>,
    /// log2 of L1 ways per set
    #[arg(short = 's')]
    s1: Option<u32>,
    /// Number of victim cache entries (0 disables it)
    #[arg(short = 'v')]
    v: Option<usize>,
    /// log2 of L2 capacity in bytes
    #[arg(short = 'C')]
    c2: Option<u32>,
    /// log2 of L2 block size in bytes
    #[arg(short = 'B')]
    b2: Option<u32>,
    /// log2 of L2 ways per set
    #[arg(short = 'S')]
    s2: Option<u32>,
}

impl GeometryArgs {
    fn apply(&self, cfg: &mut SimConfig) {
        macro_rules! apply {
            ($($arg:ident => $($field:ident).+),* $(,)?) => {
                $(if let Some(v) = self.$arg {
                    cfg.$($field).+ = v;
                })*
            };
        }
        apply!(
            c1 => l1.c,
            b1 => l1.b,
            s1 => l1.s,
            v => victim_entries,
            c2 => l2.c,
            b2 => l2.b,
            s2 => l2.s,
        );
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    /// File path to memory trace (stdin when omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// File path to JSON configuration; geometry flags override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(flatten)]
    geometry: GeometryArgs,
    /// Print final statistics as JSON
    #[arg(long)]
    json: bool,
    /// Enable interactive mode (after replaying `--input`, if given)
    #[arg(long)]
    interactive: bool,
    /// Verbose output
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    match args.command {
        Command::Run(args) => {
            if args.verbose {
                env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                    .init();
            } else {
                env_logger::init();
            }
            let cfg = read_config(&args)?;
            let mut sim = Simulator::new(&cfg)?;
            match (&args.input, args.interactive) {
                (Some(input), _) => {
                    let file = File::open(input)?;
                    sim.run(TraceReader::new(BufReader::new(file)))?;
                }
                (None, false) => {
                    sim.run(TraceReader::new(stdin().lock()))?;
                }
                (None, true) => {}
            }
            if args.interactive {
                interactive::execute_interactive(&mut sim)?;
            }
            let stats = sim.finish();
            if args.json {
                let report = serde_json::json!({ "config": cfg, "stats": stats });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output_stat(&stats);
            }
            Ok(())
        }
        Command::Defaults => {
            println!("{}", serde_json::to_string_pretty(&SimConfig::default())?);
            Ok(())
        }
    }
}

fn read_config(args: &RunArgs) -> Result<SimConfig> {
    let mut cfg = match &args.config {
        Some(p) => {
            let file = File::open(p)?;
            SimConfig::deser(BufReader::new(file))?
        }
        None => Default::default(),
    };
    args.geometry.apply(&mut cfg);
    Ok(cfg)
}

#[cfg(not(feature = "stat"))]
fn output_stat(stats: &CacheStats) {
    println!("average access time: {:.4} ns", stats.avg_access_time_l1);
}

#[cfg(feature = "stat")]
fn output_stat(stats: &CacheStats) {
    use cache_sim::stat::{AddStats, Stats};

    let max_width = get_terminal_width().unwrap_or(120) as usize;
    let mut ss = Stats::default();
    stats.add_stats(&mut ss);
    println!("{}", ss.view(max_width));
}

#[cfg(feature = "stat")]
fn get_terminal_width() -> Option<u16> {
    terminal_size().map(|(w, _)| w.0.saturating_sub(20))
}

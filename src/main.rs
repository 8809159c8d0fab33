use anyhow::{Context, Result};
use ca_traffic_sim::{run_partitioned, ArrivalProcess, Config, RunReport};
use env_logger::{Builder, Env};
use log::info;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "cats", about = "Cellular automaton traffic simulation")]
struct Args {
    /// Simulation inputs: flat whitespace separated values, or a `.json` file
    #[structopt(long, default_value = "cats-input.txt")]
    config: String,
    /// Table of `interarrival time, cumulative probability` pairs
    #[structopt(long, default_value = "interarrival-cdf.dat")]
    arrivals: String,
    /// The number of workers to split the road across
    #[structopt(long, default_value = "1")]
    workers: usize,
    /// A seed for generating random numbers, overriding the config
    #[structopt(long)]
    seed: Option<u64>,
    /// Print the results as JSON
    #[structopt(long)]
    json: bool,
}

fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::from_args();

    let mut config =
        Config::load(&args.config).with_context(|| format!("loading {}", args.config))?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.validate(args.workers)?;
    let arrivals =
        ArrivalProcess::load(&args.arrivals).with_context(|| format!("loading {}", args.arrivals))?;

    info!(
        "simulating {} lanes of {} sites for {} steps on {} workers",
        config.lanes, config.length, config.max_time, args.workers
    );
    let report = run_partitioned(&config, &arrivals, args.workers)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("================================================");
    println!("||    CELLULAR AUTOMATA TRAFFIC SIMULATION    ||");
    println!("================================================");
    println!("--- Simulation Performance ---");
    println!("total computation time: {:.6} [s]", report.elapsed_secs);
    println!("average time per iteration: {:.6e} [s]", report.secs_per_step());
    println!("average iterating frequency: {:.3} [iter/s]", report.steps_per_sec());
    println!("--- Simulation Results ---");
    println!(
        "time on road: avg={}, std={}, N={}",
        report.travel_time.average(),
        report.travel_time.variance().sqrt(),
        report.travel_time.count()
    );
    for worker in &report.workers {
        println!(
            "worker {}: sites {}..{}, {} vehicles remaining, {:.6} [s]",
            worker.rank, worker.span.min, worker.span.max, worker.vehicles_remaining, worker.elapsed_secs
        );
    }
}

mod output;
#[cfg(test)]
mod test;

use std::path::PathBuf;
use std::process;
use std::time::Instant;
use clap::Parser;
use env_logger::Env;
use tlblib::batch::{self, TraceCorpus, TraceResult};
use tlblib::config::{SimulationConfig, SimulationMode};

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Replays nested page walk traces against simulated translation caches"))]
struct Args {
    /// Size of the primary TLB the traces were recorded with
    tlb_size: u32,
    /// Associativity of the primary TLB, shared by every simulated cache
    tlb_way: u32,
    /// Entries in the nested TLB
    ntlb_size: u32,
    /// Entries in the page walk cache
    pwc_size: u32,
    /// Simulated design: 0 = NTLB, 1 = PWC_EPT, 2 = PWC_NOEPT, 3 = FULL
    cmd_idx: SimulationMode,

    /// Directory containing the trace files
    #[arg(long, default_value = "./TRACES")]
    traces: PathBuf,

    /// Print a JSON report instead of the table
    #[arg(long)]
    json: bool,

    /// Simulate traces on this many threads
    #[arg(long, value_name = "THREADS")]
    parallel: Option<usize>,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,
}

impl Args {
    fn config(&self) -> SimulationConfig {
        SimulationConfig {
            tlb_size: self.tlb_size,
            tlb_ways: self.tlb_way,
            nested_tlb_size: self.ntlb_size,
            pwc_size: self.pwc_size,
            mode: self.cmd_idx,
        }
    }
}

fn main() -> Result<(), String> {
    let start = Instant::now();
    let args = match Args::try_parse() {
        Ok(args) => args,
        // Usage problems exit with 1, help and version output is left to clap
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            process::exit(1);
        }
        Err(e) => e.exit(),
    };
    env_logger::init_from_env(Env::default().filter_or("TLBSIM_LOG", "warn"));

    let config = args.config();
    config.validate().map_err(|e| e.to_string())?;
    let corpus = TraceCorpus::discover(&args.traces, &config).map_err(|e| e.to_string())?;
    let sim_start = Instant::now();
    let results = simulate(&args, &config, &corpus)?;
    let sim_end = Instant::now();

    if args.json {
        println!("{}", output::json(&config, &results)?);
    } else {
        println!("{}", output::header());
        for result in &results {
            for row in output::trace_rows(result) {
                println!("{row}");
            }
        }
    }
    if args.performance {
        let end = Instant::now();
        println!("Simulation time: {}s", (sim_end - sim_start).as_nanos() as f64 / 1e9);
        println!("Total execution time (includes trace discovery and output): {}s", (end - start).as_nanos() as f64 / 1e9);
    }
    Ok(())
}

fn simulate(args: &Args, config: &SimulationConfig, corpus: &TraceCorpus) -> Result<Vec<TraceResult>, String> {
    if let Some(workers) = args.parallel {
        return batch::run_parallel(config, corpus, workers).map_err(|e| e.to_string());
    }
    if !args.debug {
        return batch::run(config, corpus).map_err(|e| e.to_string());
    }
    #[cfg(debug_assertions)]
    eprintln!("Running the debug binary, debug mode is enabled by default. If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
    eprintln!("Parsed configuration: {config:?}");
    eprintln!("Found {} traces in {}", corpus.len(), args.traces.display());
    batch::run_inspect(config, corpus, |result, simulator| {
        let counts = simulator.uninitialised_slot_counts();
        let formatted = counts
            .iter()
            .map(|(name, count)| format!("{name}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        eprintln!("{}: uninitialised cache slots ({formatted})", result.trace.display());
    })
    .map_err(|e| e.to_string())
}

use std::path::PathBuf;
use clap::Parser;
use tlblib::batch::TraceResult;
use tlblib::cache::HitMissCounter;
use tlblib::config::SimulationMode;
use tlblib::simulator::SimulationResult;
use crate::output;
use crate::Args;

fn trace(nested_tlb: HitMissCounter, page_walk_cache: HitMissCounter, memory_accesses: u64) -> TraceResult {
    TraceResult {
        trace: PathBuf::from("TRACES/trace_0412_1530_64.4"),
        result: SimulationResult {
            memory_accesses,
            nested_tlb,
            page_walk_cache,
        },
    }
}

#[test]
fn positional_arguments() {
    let args = Args::try_parse_from(["tlbsim", "64", "4", "32", "16", "3"]).unwrap();
    let config = args.config();
    assert_eq!((config.tlb_size, config.tlb_ways, config.nested_tlb_size, config.pwc_size), (64, 4, 32, 16));
    assert_eq!(config.mode, SimulationMode::Combined);
    assert_eq!(config.trace_suffix(), "_64.4");
    assert_eq!(args.traces, PathBuf::from("./TRACES"));
}

#[test]
fn wrong_argument_count_is_a_usage_error() {
    let err = Args::try_parse_from(["tlbsim", "64", "4", "32", "16"]).unwrap_err();
    assert!(err.use_stderr());
    assert!(Args::try_parse_from(["tlbsim", "64", "4", "32", "16", "3", "9"]).is_err());
    assert!(Args::try_parse_from(["tlbsim", "64", "4", "32", "16", "7"]).is_err());
}

#[test]
fn rows_report_counters_and_accesses() {
    let rows = output::trace_rows(&trace(HitMissCounter { hit: 3, miss: 1 }, HitMissCounter { hit: 1, miss: 2 }, 17));
    let ntlb: Vec<&str> = rows[0].split('\t').map(str::trim).collect();
    assert_eq!(ntlb, vec!["NTLB", "3", "1", "75.0000"]);
    let pwc: Vec<&str> = rows[1].split('\t').map(str::trim).collect();
    assert_eq!(pwc, vec!["PWC", "1", "2", "33.3333", "17"]);
    assert_eq!(output::header().split('\t').count(), 5);
}

#[test]
fn unprobed_cache_has_no_ratio() {
    let rows = output::trace_rows(&trace(HitMissCounter::default(), HitMissCounter { hit: 2, miss: 2 }, 2));
    assert_eq!(rows[0].split('\t').last().map(str::trim), Some("nan"));
}

#[test]
fn json_report_lists_traces() {
    let args = Args::try_parse_from(["tlbsim", "64", "4", "32", "16", "1", "--json"]).unwrap();
    let traces = [trace(HitMissCounter::default(), HitMissCounter { hit: 5, miss: 5 }, 9)];
    let report: serde_json::Value = serde_json::from_str(&output::json(&args.config(), &traces).unwrap()).unwrap();
    assert_eq!(report["config"]["mode"], "PwcExtendedPaging");
    assert_eq!(report["traces"][0]["memory_accesses"], 9);
    assert_eq!(report["traces"][0]["page_walk_cache"]["miss"], 5);
}

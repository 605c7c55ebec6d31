use serde::Serialize;
use tlblib::batch::TraceResult;
use tlblib::cache::HitMissCounter;
use tlblib::config::SimulationConfig;

/// Everything printed with `--json`
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub config: &'a SimulationConfig,
    pub traces: &'a [TraceResult],
}

pub fn header() -> String {
    format!("{:<10}\t{:>20}\t{:>20}\t{:>20}\t{:>20}", "Cache", "Hit", "Miss", "Hit Ratio", "Mem Access")
}

/// Formats a hit ratio with 4 decimal places. A cache that was never probed has no ratio
fn ratio(counter: &HitMissCounter) -> String {
    match counter.hit_ratio() {
        Some(r) => format!("{r:.4}"),
        None => String::from("nan"),
    }
}

fn counter_row(name: &str, counter: &HitMissCounter) -> String {
    format!("{:<10}\t{:>20}\t{:>20}\t{:>20}", name, counter.hit, counter.miss, ratio(counter))
}

/// The two table rows for one trace: the nested TLB, then the page walk cache with the total
/// memory accesses
pub fn trace_rows(trace: &TraceResult) -> [String; 2] {
    let result = &trace.result;
    [
        counter_row("NTLB", &result.nested_tlb),
        format!("{}\t{:>20}", counter_row("PWC", &result.page_walk_cache), result.memory_accesses),
    ]
}

pub fn json(config: &SimulationConfig, traces: &[TraceResult]) -> Result<String, String> {
    serde_json::to_string_pretty(&Report { config, traces }).map_err(|e| format!("Couldn't serialise the output {e}"))
}

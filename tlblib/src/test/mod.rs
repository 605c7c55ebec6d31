use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use crate::config::{SimulationConfig, SimulationMode};
use crate::trace::TranslationEvent;

mod cache_tests;

/// A configuration where every cache shares `ways`, recorded with a 64 entry primary TLB
pub(crate) fn config(mode: SimulationMode, nested_tlb_size: u32, pwc_size: u32, ways: u32) -> SimulationConfig {
    SimulationConfig {
        tlb_size: 64,
        tlb_ways: ways,
        nested_tlb_size,
        pwc_size,
        mode,
    }
}

pub(crate) fn encode(events: &[TranslationEvent]) -> Vec<u8> {
    events.iter().flat_map(|e| e.to_bytes()).collect()
}

pub(crate) fn write_trace(dir: &Path, name: &str, events: &[TranslationEvent]) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, encode(events))?;
    Ok(path)
}

/// Deterministic walks over a small address space, so caches see both hits and evictions
pub(crate) fn pseudo_random_events(count: usize, seed: u64) -> Vec<TranslationEvent> {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as u32
    };
    (0..count)
        .map(|_| {
            let depth = (next() % 4) as u8;
            let l1 = (next() % 64) << 2;
            let l2 = 0x0010_0000 | ((next() % 512) << 12) | ((next() % 1024) << 2);
            let pa = 0x0200_0000 | ((next() % 2048) << 12) | (next() & 0xFFF);
            TranslationEvent::new(depth, l1, l2, pa)
        })
        .collect()
}

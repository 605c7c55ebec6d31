use std::io::Read;
use std::time::{Duration, Instant};
use log::debug;
use serde::{Deserialize, Serialize};
use crate::cache::{AssociativeCache, HitMissCounter, KeyScheme, RecencyClock};
use crate::config::{SimulationConfig, SimulationMode};
use crate::error::{ConfigError, TraceError};
use crate::trace::{TraceReader, TranslationEvent};

const PAGE_MASK: u32 = 0xFFFF_F000;

/// Domain of a guest page table descriptor in the page walk cache
const GUEST: u32 = 1;
/// Domain of an extended page table descriptor in the page walk cache
const HOST: u32 = 0;

/// The second level of the extended page table is laid out after the 16KiB first level
const EPT_L2_BASE: u32 = 16 * 1024;

// Memory access costs. These describe the two-level nested paging hardware being modelled, and
// are not meant to be tuned
/// Reading the cached translation of a descriptor page in the nested TLB
const NTLB_METADATA_READ: u64 = 1;
/// Walking both levels of the extended page table after a nested TLB miss
const NTLB_MISS_WALK: u64 = 2;
/// Reading a guest descriptor which missed the page walk cache
const GUEST_DESCRIPTOR_READ: u64 = 1;
/// Reading one extended page table descriptor which missed the page walk cache
const HOST_DESCRIPTOR_READ: u64 = 1;

/// The result of simulating one trace. Can be serialised for reports
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Extra memory reads caused by translation cache misses
    pub memory_accesses: u64,
    /// The page-granular nested TLB, zero if the mode doesn't simulate one
    pub nested_tlb: HitMissCounter,
    /// The descriptor page walk cache, zero if the mode doesn't simulate one
    pub page_walk_cache: HitMissCounter,
}

/// Addresses of the two extended page table descriptors translating a guest physical address.
/// The table is assumed to be a flat two-level table based at host address 0
///
/// # Examples
///
/// ```
/// use tlblib::simulator::host_descriptors;
/// assert_eq!(host_descriptors(0x0030_5000), (12, 16 * 1024 + 3 * 1024 + 5 * 4));
/// ```
pub fn host_descriptors(addr: u32) -> (u32, u32) {
    let l1 = (addr >> 20) * 4;
    let l2 = EPT_L2_BASE + (addr >> 20) * 1024 + ((addr >> 12) & 0xFF) * 4;
    (l1, l2)
}

/// Probes the page walk cache for both extended page table descriptors of `addr`, returning the
/// memory accesses needed for those that missed
fn walk_host_table(pwc: &mut AssociativeCache, clock: &mut RecencyClock, addr: u32) -> u64 {
    let (l1, l2) = host_descriptors(addr);
    let mut accesses = 0;
    if pwc.probe(l1, HOST, clock).is_miss() {
        accesses += HOST_DESCRIPTOR_READ;
    }
    if pwc.probe(l2, HOST, clock).is_miss() {
        accesses += HOST_DESCRIPTOR_READ;
    }
    accesses
}

/// A generic trait for the simulated hardware designs
///
/// Implementations own all of their cache state, so independent simulators can run on separate
/// threads
pub trait Simulate {
    /// Replays a single event, updating caches and counters
    fn step(&mut self, event: &TranslationEvent);

    /// Returns every cache, counter and the recency clock to their initial state
    fn reset(&mut self);

    /// Gets the counters accumulated since the last reset
    fn result(&self) -> SimulationResult;

    /// Simulates a sequence of events from a clean state
    ///
    /// # Arguments
    ///
    /// * `events`: The events, in trace order
    ///
    /// returns: SimulationResult
    fn run<I>(&mut self, events: I) -> SimulationResult
    where
        I: IntoIterator<Item = TranslationEvent>,
        Self: Sized,
    {
        self.reset();
        for event in events {
            self.step(&event);
        }
        self.result()
    }

    /// Simulates a whole trace from a clean state
    ///
    /// Events are pulled from the reader one at a time, so traces never need to fit in memory.
    /// Running out of input ends the run normally
    fn simulate<R: Read>(&mut self, trace: &mut TraceReader<R>) -> Result<SimulationResult, TraceError>
    where
        Self: Sized,
    {
        self.reset();
        while let Some(event) = trace.next_event()? {
            self.step(&event);
        }
        debug!("Simulated {} events", trace.events_read());
        Ok(self.result())
    }
}

/// Nested TLB only. Every guest descriptor page and the final guest frame are translated through
/// one page-granular cache
#[derive(Debug, Clone)]
pub struct NestedTlbOnly {
    clock: RecencyClock,
    nested_tlb: AssociativeCache,
    memory_accesses: u64,
}

impl NestedTlbOnly {
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            clock: RecencyClock::new(),
            nested_tlb: AssociativeCache::new("nested TLB", config.nested_tlb_geometry(), KeyScheme::Page, false)?,
            memory_accesses: 0,
        })
    }

    fn translate(&mut self, addr: u32, terminal: bool) {
        // The final frame is not a descriptor, nothing is read through it
        if !terminal {
            self.memory_accesses += NTLB_METADATA_READ;
        }
        if self.nested_tlb.probe(addr, 0, &mut self.clock).is_miss() {
            self.memory_accesses += NTLB_MISS_WALK;
        }
    }
}

impl Simulate for NestedTlbOnly {
    fn step(&mut self, event: &TranslationEvent) {
        self.translate(event.l1_addr & PAGE_MASK, false);
        if event.depth > 1 {
            self.translate(event.l2_addr & PAGE_MASK, false);
        }
        if event.depth > 2 {
            self.translate(event.final_addr, true);
        }
    }

    fn reset(&mut self) {
        self.clock.reset();
        self.nested_tlb.reset();
        self.memory_accesses = 0;
    }

    fn result(&self) -> SimulationResult {
        SimulationResult {
            memory_accesses: self.memory_accesses,
            nested_tlb: self.nested_tlb.counter(),
            ..Default::default()
        }
    }
}

/// Page walk cache holding both guest descriptors and the extended page table descriptors needed
/// to reach them
#[derive(Debug, Clone)]
pub struct PwcWithEpt {
    clock: RecencyClock,
    pwc: AssociativeCache,
    memory_accesses: u64,
}

impl PwcWithEpt {
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            clock: RecencyClock::new(),
            pwc: AssociativeCache::new("page walk cache", config.pwc_geometry(), KeyScheme::Descriptor, true)?,
            memory_accesses: 0,
        })
    }

    fn guest_descriptor(&mut self, addr: u32) {
        if self.pwc.probe(addr, GUEST, &mut self.clock).is_miss() {
            self.memory_accesses += walk_host_table(&mut self.pwc, &mut self.clock, addr) + GUEST_DESCRIPTOR_READ;
        }
    }
}

impl Simulate for PwcWithEpt {
    fn step(&mut self, event: &TranslationEvent) {
        self.guest_descriptor(event.l1_addr);
        if event.depth > 1 {
            self.guest_descriptor(event.l2_addr);
        }
        if event.depth > 2 {
            self.memory_accesses += walk_host_table(&mut self.pwc, &mut self.clock, event.final_addr);
        }
    }

    fn reset(&mut self) {
        self.clock.reset();
        self.pwc.reset();
        self.memory_accesses = 0;
    }

    fn result(&self) -> SimulationResult {
        SimulationResult {
            memory_accesses: self.memory_accesses,
            page_walk_cache: self.pwc.counter(),
            ..Default::default()
        }
    }
}

/// Page walk cache for guest descriptors only. Host translations are assumed to come from a
/// separate cache at no cost
#[derive(Debug, Clone)]
pub struct PwcWithoutEpt {
    clock: RecencyClock,
    pwc: AssociativeCache,
    memory_accesses: u64,
}

impl PwcWithoutEpt {
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            clock: RecencyClock::new(),
            pwc: AssociativeCache::new("page walk cache", config.pwc_geometry(), KeyScheme::Descriptor, true)?,
            memory_accesses: 0,
        })
    }

    fn guest_descriptor(&mut self, addr: u32) {
        if self.pwc.probe(addr, GUEST, &mut self.clock).is_miss() {
            self.memory_accesses += GUEST_DESCRIPTOR_READ;
        }
    }
}

impl Simulate for PwcWithoutEpt {
    fn step(&mut self, event: &TranslationEvent) {
        self.guest_descriptor(event.l1_addr);
        if event.depth > 1 {
            self.guest_descriptor(event.l2_addr);
        }
    }

    fn reset(&mut self) {
        self.clock.reset();
        self.pwc.reset();
        self.memory_accesses = 0;
    }

    fn result(&self) -> SimulationResult {
        SimulationResult {
            memory_accesses: self.memory_accesses,
            page_walk_cache: self.pwc.counter(),
            ..Default::default()
        }
    }
}

/// Page walk cache in front of a nested TLB. A guest descriptor missing the page walk cache is
/// translated through the nested TLB, and only a nested TLB miss walks the extended page table
#[derive(Debug, Clone)]
pub struct NestedTlbWithPwc {
    clock: RecencyClock,
    pwc: AssociativeCache,
    nested_tlb: AssociativeCache,
    memory_accesses: u64,
}

impl NestedTlbWithPwc {
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            clock: RecencyClock::new(),
            pwc: AssociativeCache::new("page walk cache", config.pwc_geometry(), KeyScheme::Descriptor, true)?,
            nested_tlb: AssociativeCache::new("nested TLB", config.nested_tlb_geometry(), KeyScheme::Page, false)?,
            memory_accesses: 0,
        })
    }

    fn translate_page(&mut self, addr: u32) {
        if self.nested_tlb.probe(addr, 0, &mut self.clock).is_miss() {
            self.memory_accesses += walk_host_table(&mut self.pwc, &mut self.clock, addr);
        }
    }

    fn guest_descriptor(&mut self, addr: u32) {
        if self.pwc.probe(addr, GUEST, &mut self.clock).is_miss() {
            self.translate_page(addr & PAGE_MASK);
            self.memory_accesses += GUEST_DESCRIPTOR_READ;
        }
    }
}

impl Simulate for NestedTlbWithPwc {
    fn step(&mut self, event: &TranslationEvent) {
        self.guest_descriptor(event.l1_addr);
        if event.depth > 1 {
            self.guest_descriptor(event.l2_addr);
        }
        if event.depth > 2 {
            self.translate_page(event.final_addr);
        }
    }

    fn reset(&mut self) {
        self.clock.reset();
        self.pwc.reset();
        self.nested_tlb.reset();
        self.memory_accesses = 0;
    }

    fn result(&self) -> SimulationResult {
        SimulationResult {
            memory_accesses: self.memory_accesses,
            nested_tlb: self.nested_tlb.counter(),
            page_walk_cache: self.pwc.counter(),
        }
    }
}

/// Enum for all 4 simulated designs
///
/// Like the cache variants, we branch explicitly rather than going through a trait object, so the
/// per-event calls can be inlined
#[derive(Debug, Clone)]
pub enum Simulator {
    NestedTlb(NestedTlbOnly),
    PwcExtendedPaging(PwcWithEpt),
    PwcNoExtendedPaging(PwcWithoutEpt),
    Combined(NestedTlbWithPwc),
}

impl Simulator {
    /// Creates a simulator for the configured mode, validating the caches it needs
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        Ok(match config.mode {
            SimulationMode::NestedTlb => Simulator::NestedTlb(NestedTlbOnly::new(config)?),
            SimulationMode::PwcExtendedPaging => Simulator::PwcExtendedPaging(PwcWithEpt::new(config)?),
            SimulationMode::PwcNoExtendedPaging => Simulator::PwcNoExtendedPaging(PwcWithoutEpt::new(config)?),
            SimulationMode::Combined => Simulator::Combined(NestedTlbWithPwc::new(config)?),
        })
    }

    pub fn mode(&self) -> SimulationMode {
        match self {
            Simulator::NestedTlb(_) => SimulationMode::NestedTlb,
            Simulator::PwcExtendedPaging(_) => SimulationMode::PwcExtendedPaging,
            Simulator::PwcNoExtendedPaging(_) => SimulationMode::PwcNoExtendedPaging,
            Simulator::Combined(_) => SimulationMode::Combined,
        }
    }

    /// Gets the number of slots never filled in each simulated cache
    pub fn uninitialised_slot_counts(&self) -> Vec<(&'static str, usize)> {
        match self {
            Simulator::NestedTlb(s) => vec![("NTLB", s.nested_tlb.uninitialised_slot_count())],
            Simulator::PwcExtendedPaging(s) => vec![("PWC", s.pwc.uninitialised_slot_count())],
            Simulator::PwcNoExtendedPaging(s) => vec![("PWC", s.pwc.uninitialised_slot_count())],
            Simulator::Combined(s) => vec![
                ("NTLB", s.nested_tlb.uninitialised_slot_count()),
                ("PWC", s.pwc.uninitialised_slot_count()),
            ],
        }
    }

    /// Runs a whole trace file, timing the simulation
    pub fn simulate_file(&mut self, trace: &mut TraceReader<impl Read>) -> Result<(SimulationResult, Duration), TraceError> {
        let start = Instant::now();
        let result = self.simulate(trace)?;
        Ok((result, start.elapsed()))
    }
}

impl Simulate for Simulator {
    fn step(&mut self, event: &TranslationEvent) {
        match self {
            Simulator::NestedTlb(s) => s.step(event),
            Simulator::PwcExtendedPaging(s) => s.step(event),
            Simulator::PwcNoExtendedPaging(s) => s.step(event),
            Simulator::Combined(s) => s.step(event),
        }
    }

    fn reset(&mut self) {
        match self {
            Simulator::NestedTlb(s) => s.reset(),
            Simulator::PwcExtendedPaging(s) => s.reset(),
            Simulator::PwcNoExtendedPaging(s) => s.reset(),
            Simulator::Combined(s) => s.reset(),
        }
    }

    fn result(&self) -> SimulationResult {
        match self {
            Simulator::NestedTlb(s) => s.result(),
            Simulator::PwcExtendedPaging(s) => s.result(),
            Simulator::PwcNoExtendedPaging(s) => s.result(),
            Simulator::Combined(s) => s.result(),
        }
    }
}

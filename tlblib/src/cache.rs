use serde::{Deserialize, Serialize};
use crate::config::CacheGeometry;
use crate::error::ConfigError;

/// Tag stored in a slot which has never been filled, or was flushed
pub const INVALID_TAG: u32 = u32::MAX;

/// How a tag is turned into the key bits that select its way set
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyScheme {
    /// Page-granular translation caches, indexed by page number
    Page,
    /// Page-walk caches holding descriptor addresses, indexed by descriptor number
    Descriptor,
}

impl KeyScheme {
    pub const fn shift(self) -> u32 {
        match self {
            KeyScheme::Page => 12,
            KeyScheme::Descriptor => 2,
        }
    }
}

/// Outcome of a single cache probe
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Probe {
    Hit,
    Miss,
}

impl Probe {
    pub fn is_hit(self) -> bool {
        self == Probe::Hit
    }

    pub fn is_miss(self) -> bool {
        self == Probe::Miss
    }
}

/// Logical clock used to order slot accesses for LRU
///
/// Every cache probed during one run shares a single clock, so timestamps in different caches are
/// comparable. Ticks start at 1, 0 is reserved for slots that were never used
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RecencyClock {
    time: u64,
}

impl RecencyClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock, returning the new time
    pub fn tick(&mut self) -> u64 {
        self.time += 1;
        self.time
    }

    pub fn now(&self) -> u64 {
        self.time
    }

    pub fn reset(&mut self) {
        self.time = 0;
    }
}

/// Hit and miss counts for one cache
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitMissCounter {
    pub hit: u64,
    pub miss: u64,
}

impl HitMissCounter {
    /// Number of probes recorded
    pub fn total(&self) -> u64 {
        self.hit + self.miss
    }

    /// Hit ratio as a percentage, or None if the cache was never probed
    pub fn hit_ratio(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(100.0 * self.hit as f64 / total as f64),
        }
    }
}

/// A single cache entry
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CacheSlot {
    pub tag: u32,
    pub domain: u32,
    pub last_used: u64,
}

impl CacheSlot {
    pub const INVALID: CacheSlot = CacheSlot {
        tag: INVALID_TAG,
        domain: 0,
        last_used: 0,
    };

    pub fn is_valid(&self) -> bool {
        self.last_used != 0
    }
}

/// A set-associative, LRU managed translation cache
///
/// Slots of one way set are interleaved through the array: the set for a key starts at
/// `key & index_mask` and continues every `step` slots until the end of the array. This layout,
/// and the quirks of the victim search in [`AssociativeCache::probe`], reproduce the hardware
/// models the traces were analysed with, so results stay comparable with them
///
/// Entries are matched on the whole tag, and optionally on a domain which separates guest
/// descriptors from host descriptors at the same address
#[derive(Debug, Clone)]
pub struct AssociativeCache {
    slots: Vec<CacheSlot>,
    step: usize,
    index_mask: u32,
    key_shift: u32,
    match_domain: bool,
    counter: HitMissCounter,
}

impl AssociativeCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `name`: Name used when reporting an invalid geometry
    /// * `geometry`: Capacity and associativity, capacity must be a multiple of the ways
    /// * `scheme`: How tags are turned into set indices
    /// * `match_domain`: Whether the domain takes part in matching
    ///
    /// returns: Result<AssociativeCache, ConfigError>
    pub fn new(name: &'static str, geometry: CacheGeometry, scheme: KeyScheme, match_domain: bool) -> Result<Self, ConfigError> {
        let step = geometry.validate(name)?;
        Ok(Self {
            slots: vec![CacheSlot::INVALID; geometry.capacity as usize],
            step: step as usize,
            index_mask: step - 1,
            key_shift: scheme.shift(),
            match_domain,
            counter: HitMissCounter::default(),
        })
    }

    /// Looks up a tag, inserting it on a miss
    ///
    /// A hit refreshes the matching slot. On a miss the least recently used slot of the way set is
    /// replaced, except that the search starts from slot 0 of the whole array rather than from the
    /// first slot of the set, and only a strictly older slot displaces the current candidate. While
    /// slot 0 is at least as old as everything in the set, slot 0 is the one overwritten, even if
    /// it belongs to another set
    ///
    /// # Arguments
    ///
    /// * `tag`: The address to look up
    /// * `domain`: Ignored unless the cache matches on domain
    /// * `clock`: The run's shared clock
    ///
    /// returns: Probe
    pub fn probe(&mut self, tag: u32, domain: u32, clock: &mut RecencyClock) -> Probe {
        let domain = if self.match_domain { domain } else { 0 };
        let mut victim = 0;
        let mut oldest = self.slots[0].last_used;
        let mut index = ((tag >> self.key_shift) & self.index_mask) as usize;
        while index < self.slots.len() {
            let slot = &mut self.slots[index];
            if slot.tag == tag && slot.domain == domain {
                slot.last_used = clock.tick();
                self.counter.hit += 1;
                return Probe::Hit;
            }
            if slot.last_used < oldest {
                oldest = slot.last_used;
                victim = index;
            }
            index += self.step;
        }
        self.slots[victim] = CacheSlot {
            tag,
            domain,
            last_used: clock.tick(),
        };
        self.counter.miss += 1;
        Probe::Miss
    }

    /// Checks whether a tag is resident in its way set without touching LRU state or counters
    pub fn contains(&self, tag: u32, domain: u32) -> bool {
        let domain = if self.match_domain { domain } else { 0 };
        let start = ((tag >> self.key_shift) & self.index_mask) as usize;
        self.slots[start..]
            .iter()
            .step_by(self.step)
            .any(|slot| slot.tag == tag && slot.domain == domain)
    }

    /// Invalidates every slot and clears the counter
    pub fn reset(&mut self) {
        self.slots.fill(CacheSlot::INVALID);
        self.counter = HitMissCounter::default();
    }

    pub fn counter(&self) -> HitMissCounter {
        self.counter
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&CacheSlot> {
        self.slots.get(index)
    }

    /// Gets the number of slots which have never been filled since the last reset. Useful for
    /// judging whether a trace was long enough to warm the cache
    pub fn uninitialised_slot_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_valid()).count()
    }
}

use crate::cache::{AssociativeCache, HitMissCounter, KeyScheme, Probe, RecencyClock, INVALID_TAG};
use crate::config::CacheGeometry;
use crate::error::ConfigError;

fn page_cache(capacity: u32, ways: u32) -> AssociativeCache {
    AssociativeCache::new("test", CacheGeometry::new(capacity, ways), KeyScheme::Page, false).unwrap()
}

fn descriptor_cache(capacity: u32, ways: u32) -> AssociativeCache {
    AssociativeCache::new("test", CacheGeometry::new(capacity, ways), KeyScheme::Descriptor, true).unwrap()
}

#[test]
fn fully_associative_evicts_least_recently_used() {
    let mut cache = page_cache(4, 4);
    let mut clock = RecencyClock::new();
    let [a, b, c, d, e] = [0x1000, 0x2000, 0x3000, 0x4000, 0x5000];
    let probes: Vec<Probe> = [a, b, c, d, a, e].iter().map(|&tag| cache.probe(tag, 0, &mut clock)).collect();
    assert_eq!(probes, vec![Probe::Miss, Probe::Miss, Probe::Miss, Probe::Miss, Probe::Hit, Probe::Miss]);
    assert!(!cache.contains(b, 0));
    for tag in [a, c, d, e] {
        assert!(cache.contains(tag, 0), "{tag:#x} should still be resident");
    }
    assert_eq!(cache.counter(), HitMissCounter { hit: 1, miss: 5 });
}

#[test]
fn recently_probed_tags_survive_eviction() {
    let mut cache = page_cache(4, 4);
    let mut clock = RecencyClock::new();
    for tag in [0x1000, 0x2000, 0x3000, 0x4000] {
        cache.probe(tag, 0, &mut clock);
    }
    assert_eq!(cache.probe(0x1000, 0, &mut clock), Probe::Hit);
    assert_eq!(cache.probe(0x2000, 0, &mut clock), Probe::Hit);
    assert_eq!(cache.probe(0x5000, 0, &mut clock), Probe::Miss);
    assert!(!cache.contains(0x3000, 0));
    assert_eq!(cache.probe(0x6000, 0, &mut clock), Probe::Miss);
    assert!(!cache.contains(0x4000, 0));
    for tag in [0x1000, 0x2000, 0x5000, 0x6000] {
        assert!(cache.contains(tag, 0));
    }
}

#[test]
fn victim_search_starts_from_slot_zero() {
    // Two index groups: slots 0 and 2 hold even page numbers, slots 1 and 3 odd ones
    let mut cache = page_cache(4, 2);
    let mut clock = RecencyClock::new();

    // Nothing in the odd set is older than the empty slot 0, so slot 0 is filled
    assert_eq!(cache.probe(0x1000, 0, &mut clock), Probe::Miss);
    assert_eq!(cache.slot(0).unwrap().tag, 0x1000);
    assert!(!cache.contains(0x1000, 0));

    // Slot 0 is now newer than the empty slot 1
    assert_eq!(cache.probe(0x1000, 0, &mut clock), Probe::Miss);
    assert_eq!(cache.slot(1).unwrap().tag, 0x1000);
    assert_eq!(cache.probe(0x1000, 0, &mut clock), Probe::Hit);

    assert_eq!(cache.counter(), HitMissCounter { hit: 1, miss: 2 });
    assert_eq!(cache.slot(2).unwrap().tag, INVALID_TAG);
    assert_eq!(cache.uninitialised_slot_count(), 2);
}

#[test]
fn domain_separates_identical_tags() {
    let mut cache = descriptor_cache(8, 8);
    let mut clock = RecencyClock::new();
    assert_eq!(cache.probe(0x40, 1, &mut clock), Probe::Miss);
    assert_eq!(cache.probe(0x40, 0, &mut clock), Probe::Miss);
    assert_eq!(cache.probe(0x40, 1, &mut clock), Probe::Hit);
    assert_eq!(cache.probe(0x40, 0, &mut clock), Probe::Hit);
    assert_eq!(cache.counter(), HitMissCounter { hit: 2, miss: 2 });
}

#[test]
fn domain_is_ignored_without_matching() {
    let mut cache = page_cache(8, 8);
    let mut clock = RecencyClock::new();
    assert_eq!(cache.probe(0x1000, 1, &mut clock), Probe::Miss);
    assert_eq!(cache.probe(0x1000, 0, &mut clock), Probe::Hit);
}

#[test]
fn descriptor_keys_use_word_index() {
    // 4 index groups of 2: descriptors 4 bytes apart land in different sets
    let mut cache = descriptor_cache(8, 2);
    let mut clock = RecencyClock::new();
    for addr in [0x0, 0x4, 0x8, 0xC] {
        cache.probe(addr, 1, &mut clock);
    }
    for addr in [0x0, 0x4, 0x8, 0xC] {
        assert!(cache.contains(addr, 1), "{addr:#x} should be resident");
    }
}

#[test]
fn clock_is_shared_between_caches() {
    let mut pages = page_cache(4, 4);
    let mut descriptors = descriptor_cache(4, 4);
    let mut clock = RecencyClock::new();
    pages.probe(0x1000, 0, &mut clock);
    descriptors.probe(0x10, 1, &mut clock);
    pages.probe(0x1000, 0, &mut clock);
    assert_eq!(clock.now(), 3);
    assert_eq!(descriptors.slot(0).unwrap().last_used, 2);
    assert_eq!(pages.slot(0).unwrap().last_used, 3);
}

#[test]
fn reset_invalidates_everything() {
    let mut cache = page_cache(4, 4);
    let mut clock = RecencyClock::new();
    for tag in [0x1000, 0x2000, 0x1000] {
        cache.probe(tag, 0, &mut clock);
    }
    assert_eq!(cache.uninitialised_slot_count(), 2);
    cache.reset();
    assert_eq!(cache.counter(), HitMissCounter::default());
    assert_eq!(cache.uninitialised_slot_count(), cache.capacity());
    assert!(!cache.contains(0x1000, 0));
}

#[test]
fn invalid_geometries_are_rejected() {
    let cases = [
        ((0, 1), ConfigError::ZeroCapacity { cache: "test" }),
        ((4, 0), ConfigError::ZeroWays { cache: "test" }),
        ((4, 8), ConfigError::WaysExceedCapacity { cache: "test", capacity: 4, ways: 8 }),
        ((6, 4), ConfigError::UnevenWays { cache: "test", capacity: 6, ways: 4 }),
    ];
    for ((capacity, ways), expected) in cases {
        let err = AssociativeCache::new("test", CacheGeometry::new(capacity, ways), KeyScheme::Page, false).unwrap_err();
        assert_eq!(err, expected);
    }
    assert!(AssociativeCache::new("test", CacheGeometry::new(512, 4), KeyScheme::Page, false).is_ok());
    for (capacity, ways) in [(12, 12), (12, 4), (24, 4)] {
        assert!(AssociativeCache::new("test", CacheGeometry::new(capacity, ways), KeyScheme::Page, false).is_ok());
    }
}

#[test]
fn hit_ratio_is_undefined_without_probes() {
    assert_eq!(HitMissCounter::default().hit_ratio(), None);
    let counter = HitMissCounter { hit: 3, miss: 1 };
    assert_eq!(counter.total(), 4);
    assert_eq!(counter.hit_ratio(), Some(75.0));
}

#[test]
fn uneven_index_groups_leave_some_sets_unused() {
    // 24 entries of 4 ways: slots 6 apart share a set, and set starts are `page & 5`
    let mut cache = page_cache(24, 4);
    let mut clock = RecencyClock::new();
    assert_eq!(cache.probe(0x2000, 0, &mut clock), Probe::Miss);
    assert_eq!(cache.slot(0).unwrap().tag, 0x2000);
    assert_eq!(cache.probe(0x6000, 0, &mut clock), Probe::Miss);
    assert_eq!(cache.slot(4).unwrap().tag, 0x6000);
    assert!(cache.probe(0x2000, 0, &mut clock).is_hit());

    for page in 0..200u32 {
        cache.probe(page << 12, 0, &mut clock);
    }
    // Sets starting at 2 and 3 are never selected
    for index in 0..cache.capacity() {
        let unused = matches!(index % 6, 2 | 3);
        assert_eq!(cache.slot(index).unwrap().is_valid(), !unused, "slot {index}");
    }
    assert_eq!(cache.uninitialised_slot_count(), 8);
}

/// A direct transcription of the lookup rules over plain slot pairs of (tag, last use)
fn reference_probe(slots: &mut [(u32, u64)], step: usize, tag: u32, time: &mut u64) -> bool {
    let start = ((tag >> 12) & (step as u32 - 1)) as usize;
    let set: Vec<usize> = (start..slots.len()).step_by(step).collect();
    *time += 1;
    if let Some(&hit) = set.iter().find(|&&i| slots[i].0 == tag) {
        slots[hit].1 = *time;
        return true;
    }
    let mut victim = 0;
    for &i in &set {
        if slots[i].1 < slots[victim].1 {
            victim = i;
        }
    }
    slots[victim] = (tag, *time);
    false
}

#[test]
fn matches_reference_model_for_any_geometry() {
    for (capacity, ways) in [(24, 4), (12, 4), (40, 4), (6, 1), (16, 4), (10, 2)] {
        let mut cache = page_cache(capacity, ways);
        let mut clock = RecencyClock::new();
        let mut slots = vec![(INVALID_TAG, 0); capacity as usize];
        let mut time = 0;
        let mut state = 0x9E37_79B9u32 ^ capacity;
        for i in 0..4_000 {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let tag = ((state >> 16) % 48) << 12;
            let expected = reference_probe(&mut slots, (capacity / ways) as usize, tag, &mut time);
            assert_eq!(cache.probe(tag, 0, &mut clock).is_hit(), expected, "{capacity}/{ways} probe {i}");
        }
        for (index, &(tag, _)) in slots.iter().enumerate() {
            assert_eq!(cache.slot(index).unwrap().tag, tag, "{capacity}/{ways} slot {index}");
        }
    }
}

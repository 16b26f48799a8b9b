//! Integration tests for canonical template enumeration and the template cache.

use doubles_scheduler::logic::{canonical_count, is_canonical, TemplateCache, TemplateStream};
use std::collections::HashSet;

/// n! / (2^(3c) * c!) for n = 4c.
fn closed_form(courts: u64) -> u64 {
    let n = 4 * courts;
    let factorial = |k: u64| (1..=k).product::<u64>();
    factorial(n) / (8u64.pow(courts as u32) * factorial(courts))
}

#[test]
fn counts_match_closed_form() {
    assert_eq!(canonical_count(1), 3);
    assert_eq!(canonical_count(2), 315);
    assert_eq!(canonical_count(3), 155_925);
    for courts in 1..=4 {
        assert_eq!(canonical_count(courts as usize), closed_form(courts));
    }
}

#[test]
fn stream_emits_exactly_the_canonical_set() {
    for courts in 1..=3 {
        let mut stream = TemplateStream::new(courts);
        let mut seen = HashSet::new();
        while let Some(t) = stream.next_template() {
            assert_eq!(t.len(), courts * 4);
            assert!(is_canonical(t), "non-canonical template {t:?}");
            let mut sorted = t.to_vec();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..courts * 4).collect::<Vec<_>>(), "not a permutation: {t:?}");
            assert!(seen.insert(t.to_vec()), "duplicate template {t:?}");
        }
        assert_eq!(seen.len() as u64, canonical_count(courts));
        // exhausted streams stay exhausted
        assert!(stream.next_template().is_none());
    }
}

#[test]
fn four_court_stream_prefix_is_canonical_and_distinct() {
    let mut stream = TemplateStream::new(4);
    let mut seen = HashSet::new();
    for _ in 0..20_000 {
        let t = stream.next_template().expect("four courts has far more templates").to_vec();
        assert!(is_canonical(&t));
        assert!(seen.insert(t));
    }
}

#[test]
fn is_canonical_rejects_each_rule() {
    assert!(is_canonical(&[0, 1, 2, 3]));
    assert!(!is_canonical(&[1, 0, 2, 3]), "pair A out of order");
    assert!(!is_canonical(&[0, 1, 3, 2]), "pair B out of order");
    assert!(!is_canonical(&[2, 3, 0, 1]), "pair B leads pair A");
    assert!(!is_canonical(&[4, 5, 6, 7, 0, 1, 2, 3]), "courts out of order");
    assert!(!is_canonical(&[0, 1, 2]));
}

#[test]
fn cache_materializes_small_sizes_once() {
    let mut cache = TemplateCache::new(1_000);
    assert!(cache.is_empty());

    let mut cursor = cache.templates(2, 8).unwrap();
    assert!(!cursor.is_streaming());
    let mut cached = Vec::new();
    while let Some(t) = cursor.next_template() {
        cached.push(t.to_vec());
    }
    assert_eq!(cached, TemplateStream::new(2).collect_all());

    cache.templates(2, 8).unwrap();
    cache.templates(1, 4).unwrap();
    assert_eq!(cache.len(), 2);
}

#[test]
fn cache_streams_above_the_limit() {
    let mut cache = TemplateCache::new(100);
    let mut cursor = cache.templates(2, 8).unwrap();
    assert!(cursor.is_streaming());
    let mut count = 0;
    while cursor.next_template().is_some() {
        count += 1;
    }
    assert_eq!(count, 315);
    assert!(cache.is_empty());
}

#[test]
fn cache_rejects_sizes_that_do_not_fill_courts() {
    let mut cache = TemplateCache::default();
    assert!(cache.templates(2, 7).is_err());
    assert!(cache.templates(0, 0).is_err());
}

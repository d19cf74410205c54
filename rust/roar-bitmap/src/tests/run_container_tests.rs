use crate::container::run::{Run, RunBuilder, RunContainer, runs_are_canonical, serialized_size};

fn runs_of(container: &RunContainer) -> Vec<(u16, u16)> {
    container.runs().iter().map(|r| (r.first(), r.last())).collect()
}

#[test]
fn test_run_layout() {
    let run = Run::new(100, 199);
    assert_eq!(run.length, 99);
    assert_eq!(run.value_count(), 100);
    assert_eq!(run.end(), 200);
    let full = Run::from_range(0..65536);
    assert_eq!(full.length, u16::MAX);
    assert_eq!(full.end(), 65536);
    assert_eq!(serialized_size(3), 14);
}

#[test]
fn test_run_insert_merges_neighbors() {
    let mut runs = RunContainer::new();
    assert!(runs.insert(10));
    assert!(runs.insert(12));
    assert_eq!(runs_of(&runs), vec![(10, 10), (12, 12)]);
    assert!(runs.insert(11));
    assert_eq!(runs_of(&runs), vec![(10, 12)]);
    assert!(!runs.insert(11));
    assert!(runs.insert(9));
    assert!(runs.insert(13));
    assert!(runs.insert(65535));
    assert_eq!(runs_of(&runs), vec![(9, 13), (65535, 65535)]);
    assert!(runs_are_canonical(runs.runs()));
}

#[test]
fn test_run_remove_splits() {
    let mut runs = RunContainer::from_range(100..200);
    assert!(runs.remove(150));
    assert_eq!(runs_of(&runs), vec![(100, 149), (151, 199)]);
    assert!(runs.remove(100));
    assert!(runs.remove(199));
    assert!(!runs.remove(150));
    assert!(!runs.remove(5));
    assert_eq!(runs_of(&runs), vec![(101, 149), (151, 198)]);
    assert_eq!(runs.len(), 97);
}

#[test]
fn test_run_range_updates() {
    let mut runs = RunContainer::from(vec![Run::new(0, 9), Run::new(20, 29), Run::new(40, 49)]);
    runs.insert_range(10..20);
    assert_eq!(runs_of(&runs), vec![(0, 29), (40, 49)]);
    runs.insert_range(30..35);
    assert_eq!(runs_of(&runs), vec![(0, 34), (40, 49)]);
    runs.remove_range(5..45);
    assert_eq!(runs_of(&runs), vec![(0, 4), (45, 49)]);
    runs.flip_range(3..47);
    assert_eq!(runs_of(&runs), vec![(0, 2), (5, 44), (47, 49)]);
    runs.insert_range(65530..65536);
    assert_eq!(runs.last(), Some(65535));
    runs.remove_range(65535..65536);
    assert_eq!(runs.last(), Some(65534));
    assert!(runs_are_canonical(runs.runs()));
}

#[test]
fn test_run_queries() {
    let runs = RunContainer::from(vec![Run::new(10, 19), Run::new(30, 39), Run::new(65530, 65535)]);
    assert_eq!(runs.len(), 26);
    assert_eq!(runs.rank(9), 0);
    assert_eq!(runs.rank(15), 6);
    assert_eq!(runs.rank(25), 10);
    assert_eq!(runs.rank(65535), 26);
    assert_eq!(runs.select(10), Some(30));
    assert_eq!(runs.select(26), None);
    assert_eq!(runs.next_value(20), Some(30));
    assert_eq!(runs.prev_value(29), Some(19));
    assert_eq!(runs.next_absent(10), Some(20));
    assert_eq!(runs.next_absent(65530), None);
    assert_eq!(runs.prev_absent(39), Some(29));
    assert_eq!(runs.prev_absent(5), Some(5));
    assert_eq!(runs.range_cardinality(15..35), 10);
    assert_eq!(runs.range_cardinality(0..65536), 26);
    assert!(runs.contains_range(30..40));
    assert!(!runs.contains_range(30..41));
    assert!(runs.intersects_range(39..40));
    assert!(!runs.intersects_range(40..65530));
}

#[test]
fn test_run_set_operations() {
    let a = RunContainer::from(vec![Run::new(0, 9), Run::new(20, 29)]);
    let b = RunContainer::from(vec![Run::new(5, 24)]);
    assert_eq!(runs_of(&a.or(&b)), vec![(0, 29)]);
    assert_eq!(runs_of(&a.and(&b)), vec![(5, 9), (20, 24)]);
    assert_eq!(runs_of(&a.and_not(&b)), vec![(0, 4), (25, 29)]);
    assert_eq!(runs_of(&a.xor(&b)), vec![(0, 4), (10, 19), (25, 29)]);
    assert_eq!(a.and_cardinality(&b), 10);
    assert!(a.intersects(&b));
    assert!(!a.intersects(&RunContainer::from_range(10..20)));
}

#[test]
fn test_run_builder_fuses_ranges() {
    let mut builder = RunBuilder::default();
    builder.push_range(0..5);
    builder.push_range(5..7);
    builder.push_range(3..6);
    builder.push_range(10..10);
    builder.push_value(10);
    builder.push_range(12..65536);
    let runs = builder.finish();
    assert_eq!(runs_of(&runs), vec![(0, 6), (10, 10), (12, 65535)]);
    assert!(runs_are_canonical(runs.runs()));
}

#[test]
fn test_run_canonical_check() {
    assert!(runs_are_canonical(&[Run::new(0, 1), Run::new(3, 4)]));
    assert!(!runs_are_canonical(&[Run::new(0, 1), Run::new(2, 4)]));
    assert!(!runs_are_canonical(&[Run::new(3, 4), Run::new(0, 1)]));
    assert!(!runs_are_canonical(&[Run {
        start: 65535,
        length: 1
    }]));
}

#[test]
fn test_run_add_offset() {
    let runs = RunContainer::from(vec![Run::new(0, 1), Run::new(65530, 65535)]);
    let (low, high) = runs.add_offset(3);
    assert_eq!(runs_of(&low), vec![(3, 4), (65533, 65535)]);
    assert_eq!(runs_of(&high), vec![(0, 2)]);
}

use std::collections::BTreeSet;

use crate::{
    ErrorKind,
    container::{
        ARRAY_MAX_LEN, Container, ContainerKind,
        array::ArrayContainer,
        bitmap::BitmapContainer,
        run::{Run, RunContainer},
    },
    storage::Owned,
    tests::fixtures::{forms, random_lows},
};

const BOUNDARY_RANGES: [(u32, u32); 12] = [
    (0, 0),
    (0, 1),
    (0, 64),
    (1, 63),
    (63, 65),
    (64, 128),
    (100, 4000),
    (4095, 4097),
    (32768, 32769),
    (65472, 65536),
    (65535, 65536),
    (0, 65536),
];

fn boundary_values() -> Vec<u16> {
    let mut set = BTreeSet::from([0u16, 63, 64, 127, 128, 4096]);
    set.extend(30000..33000);
    set.extend(65471..=65535);
    set.into_iter().collect()
}

fn assert_content(container: &Container, expected: &[u16]) {
    assert_eq!(container.len(), expected.len());
    assert!(container.iter().eq(expected.iter().copied()));
    if !expected.is_empty() {
        container.validate().unwrap();
    }
}

#[test]
fn test_representation_equivalence() {
    let mut rng = fastrand::Rng::with_seed(7);
    for shape in 0..3 {
        for _ in 0..4 {
            let values = random_lows(&mut rng, shape);
            let forms = forms(&values);
            let runs = forms[1].count_runs();
            for container in &forms {
                assert_eq!(container.len(), values.len());
                assert!(container.iter().eq(values.iter().copied()));
                assert!(container.iter().rev().eq(values.iter().rev().copied()));
                assert_eq!(container.first().unwrap(), values[0]);
                assert_eq!(container.last().unwrap(), *values.last().unwrap());
                assert_eq!(container.count_runs(), runs);
                for (index, &value) in values.iter().enumerate().step_by(37) {
                    assert!(container.contains(value));
                    assert_eq!(container.rank(value), index + 1);
                    assert_eq!(container.select(index).unwrap(), value);
                }
            }
            for a in &forms {
                for b in &forms {
                    assert_eq!(a, b);
                }
            }
        }
    }
}

#[test]
fn test_range_queries_at_word_boundaries() {
    let values = boundary_values();
    let model = values.iter().map(|&v| v as u32).collect::<BTreeSet<_>>();
    for container in forms(&values) {
        for (start, end) in BOUNDARY_RANGES {
            let count = model.range(start..end).count();
            assert_eq!(
                container.range_cardinality(start..end).unwrap(),
                count,
                "{:?} {start}..{end}",
                container.kind()
            );
            assert_eq!(
                container.contains_range(start..end).unwrap(),
                count == (end - start) as usize
            );
            assert_eq!(container.intersects_range(start..end).unwrap(), count > 0);
        }
    }
}

#[test]
fn test_neighbor_queries_match_model() {
    let values = boundary_values();
    let set = values.iter().copied().collect::<BTreeSet<u16>>();
    let probes = [0u16, 1, 62, 63, 64, 65, 128, 129, 4095, 4096, 29999, 32999, 33000, 65470, 65471, 65535];
    for container in forms(&values) {
        for from in probes {
            assert_eq!(container.next_value(from), set.range(from..).next().copied());
            assert_eq!(container.prev_value(from), set.range(..=from).next_back().copied());
            assert_eq!(
                container.next_absent(from),
                (from..=u16::MAX).find(|v| !set.contains(v))
            );
            assert_eq!(
                container.prev_absent(from),
                (0..=from).rev().find(|v| !set.contains(v))
            );
        }
    }
}

#[test]
fn test_array_promotes_and_bitmap_demotes() {
    let mut container = Container::new();
    for i in 0..ARRAY_MAX_LEN as u16 {
        container.insert(i * 2);
    }
    assert_eq!(container.kind(), ContainerKind::Array);
    assert!(container.insert(1));
    assert_eq!(container.kind(), ContainerKind::Bitmap);
    assert_eq!(container.len(), ARRAY_MAX_LEN + 1);
    assert!(container.remove(1));
    assert_eq!(container.kind(), ContainerKind::Array);

    let expected = Container::from_sorted_values((0..ARRAY_MAX_LEN as u16).map(|i| i * 2).collect());
    assert_eq!(container, expected);

    let mut ranged = Container::new();
    ranged.insert_range(0..4096).unwrap();
    assert_eq!(ranged.kind(), ContainerKind::Array);
    ranged.insert_range(5000..5001).unwrap();
    assert_eq!(ranged.kind(), ContainerKind::Bitmap);
    ranged.remove_range(0..1).unwrap();
    assert_eq!(ranged.kind(), ContainerKind::Array);
    // {1..4096, 5000} flipped over 0..8192 leaves {0} and 4096..8192 without 5000.
    ranged.flip_range(0..8192).unwrap();
    assert_eq!(ranged.kind(), ContainerKind::Array);
    assert_eq!(ranged.len(), 4096);
    assert!(ranged.contains(0));
    assert!(!ranged.contains(5000));
    assert!(ranged.contains(8191));
}

#[test]
fn test_from_range_picks_encoding() {
    assert_eq!(Container::from_range(0..4096).unwrap().kind(), ContainerKind::Array);
    assert_eq!(Container::from_range(0..4097).unwrap().kind(), ContainerKind::Bitmap);
    assert_eq!(Container::from_range(0..65536).unwrap().len(), 65536);
    assert!(Container::from_range(0..0).unwrap().is_empty());
    assert!(Container::from_range(0..65537).is_err());
}

#[test]
fn test_run_container_stays_run_on_mutation() {
    let mut container = Container::Run(RunContainer::from_range(100..200));
    assert_eq!(container.len(), 100);
    assert_eq!(container.first().unwrap(), 100);
    assert_eq!(container.last().unwrap(), 199);
    container.insert(500);
    container.remove(150);
    container.insert_range(1000..1010).unwrap();
    assert_eq!(container.kind(), ContainerKind::Run);
    assert_eq!(container.len(), 110);
    container.validate().unwrap();
}

#[test]
fn test_container_errors() {
    let empty = Container::new();
    assert!(matches!(
        empty.first().unwrap_err().kind(),
        ErrorKind::EmptyContainer { .. }
    ));
    assert!(matches!(
        empty.select(0).unwrap_err().kind(),
        ErrorKind::EmptyContainer { .. }
    ));
    let container = Container::from_sorted_values(vec![1, 2, 3]);
    assert!(matches!(
        container.select(3).unwrap_err().kind(),
        ErrorKind::OutOfRange {
            index: 3,
            cardinality: 3
        }
    ));
    let mut container = container;
    #[allow(clippy::reversed_empty_ranges)]
    let reversed = 10..5;
    assert!(matches!(
        container.insert_range(reversed).unwrap_err().kind(),
        ErrorKind::InvalidArgument { .. }
    ));
    assert!(container.range_cardinality(0..65537).is_err());
    assert_eq!(container.len(), 3);
}

#[test]
fn test_pairwise_operations_match_model() {
    let mut rng = fastrand::Rng::with_seed(11);
    let mut sets = (0..3)
        .map(|shape| random_lows(&mut rng, shape))
        .collect::<Vec<_>>();
    sets.push(Vec::new());
    sets.push((0..=u16::MAX).collect());

    for a_values in &sets {
        for b_values in &sets {
            let a = a_values.iter().copied().collect::<BTreeSet<_>>();
            let b = b_values.iter().copied().collect::<BTreeSet<_>>();
            let and = a.intersection(&b).copied().collect::<Vec<_>>();
            let or = a.union(&b).copied().collect::<Vec<_>>();
            let xor = a.symmetric_difference(&b).copied().collect::<Vec<_>>();
            let and_not = a.difference(&b).copied().collect::<Vec<_>>();

            for fa in forms(a_values) {
                for fb in forms(b_values) {
                    assert_content(&fa.and(&fb), &and);
                    assert_content(&fa.or(&fb), &or);
                    assert_content(&fa.xor(&fb), &xor);
                    assert_content(&fa.and_not(&fb), &and_not);
                    assert_eq!(fa.and_cardinality(&fb), and.len());
                    assert_eq!(fa.intersects(&fb), !and.is_empty());
                    assert_eq!(fa.is_subset(&fb), a.is_subset(&b));

                    let mut lazy = fa.lazy_or(&fb);
                    lazy.repair_after_lazy();
                    assert_content(&lazy, &or);

                    let mut in_place = fa.clone();
                    in_place.xor_with(&fb);
                    assert_content(&in_place, &xor);
                }
            }
        }
    }
}

#[test]
fn test_lazy_or_chain_matches_eager_or() {
    let mut rng = fastrand::Rng::with_seed(5);
    let inputs = (0..6)
        .map(|i| Container::from_sorted_values(random_lows(&mut rng, (i % 3) as u8)))
        .collect::<Vec<_>>();
    let mut lazy = Container::new();
    let mut eager = Container::new();
    for input in &inputs {
        lazy.lazy_or_with(input);
        eager.or_with(input);
    }
    lazy.repair_after_lazy();
    assert_eq!(lazy, eager);
    assert_eq!(lazy.len(), eager.len());
}

#[test]
fn test_run_optimize() {
    let mut dense = Container::from_range(0..10000).unwrap();
    assert_eq!(dense.kind(), ContainerKind::Bitmap);
    assert!(dense.run_optimize());
    assert_eq!(dense.kind(), ContainerKind::Run);
    assert!(!dense.run_optimize());

    let mut scattered = Container::from_sorted_values(vec![1, 10, 100]);
    assert!(!scattered.run_optimize());
    assert_eq!(scattered.kind(), ContainerKind::Array);

    let mut consecutive = Container::from_range(0..100).unwrap();
    assert!(consecutive.run_optimize());
    assert_eq!(consecutive.kind(), ContainerKind::Run);

    // Singleton runs cost more than the array they hold.
    let singles = (0..100u16).map(|i| i * 2).collect::<Vec<_>>();
    let mut runs = Container::from_sorted_values(singles.clone()).to_run();
    assert!(runs.run_optimize());
    assert_eq!(runs.kind(), ContainerKind::Array);
    assert!(runs.iter().eq(singles.iter().copied()));

    let mut dense_runs = Container::from_range(0..10000).unwrap().to_run();
    assert!(dense_runs.remove_run_compression());
    assert_eq!(dense_runs.kind(), ContainerKind::Bitmap);
    assert!(!dense_runs.remove_run_compression());
}

#[test]
fn test_add_offset_splits_across_keys() {
    let values = vec![0u16, 1, 65535];
    for container in forms(&values) {
        let (low, high) = container.add_offset(1);
        assert!(low.iter().eq([1u16, 2]));
        assert!(high.iter().eq([0u16]));
    }

    let dense = Container::from_range(60000..65536).unwrap();
    let (low, high) = dense.add_offset(1000);
    assert_eq!(low.len(), 4536);
    assert_eq!(low.first().unwrap(), 61000);
    assert_eq!(high.len(), 1000);
    assert_eq!(high.kind(), ContainerKind::Array);
}

#[test]
fn test_validate_rejects_broken_containers() {
    let unsorted: Container = Container::Array(ArrayContainer::wrap_unchecked(vec![3, 1]));
    assert!(unsorted.validate().unwrap_err().is_invalid_format());

    let mut words = vec![0u64; 1024].into_boxed_slice();
    words[0] = u64::MAX;
    let miscounted: Container = Container::Bitmap(BitmapContainer::wrap(words.clone(), 5));
    assert!(miscounted.validate().is_err());
    let sparse: Container = Container::Bitmap(BitmapContainer::wrap(words, 64));
    assert!(sparse.validate().is_err());

    let overlapping: Container = Container::Run(RunContainer::wrap_unchecked(vec![
        Run::new(0, 10),
        Run::new(5, 20),
    ]));
    assert!(overlapping.validate().is_err());
    assert!(Container::<Owned>::Run(RunContainer::new()).validate().is_err());
    assert!(Container::new().validate().is_err());
}

#[test]
fn test_to_array_rejects_large_containers() {
    let dense = Container::from_range(0..5000).unwrap();
    assert!(matches!(
        dense.to_array().unwrap_err().kind(),
        ErrorKind::InvalidArgument { .. }
    ));
    assert!(matches!(
        dense.to_run().to_array().unwrap_err().kind(),
        ErrorKind::InvalidArgument { .. }
    ));

    let limit = Container::from_range(0..ARRAY_MAX_LEN as u32).unwrap().to_bitmap();
    let array = limit.to_array().unwrap();
    assert_eq!(array.kind(), ContainerKind::Array);
    assert_eq!(array, limit);
}

#[test]
fn test_from_runs_compares_payload_sizes() {
    // One run of two values: 6 bytes as runs, 4 as an array.
    let pair = Container::from_runs(RunContainer::from_range(10..12));
    assert_eq!(pair.kind(), ContainerKind::Array);
    // Three values tie at 6 bytes; runs are kept.
    let triple = Container::from_runs(RunContainer::from_range(10..13));
    assert_eq!(triple.kind(), ContainerKind::Run);

    for len in 1..20u32 {
        let runs = RunContainer::from_range(100..100 + len);
        let run_size = runs.serialized_size_in_bytes();
        let chosen = Container::from_runs(runs);
        let array_size = Container::from_range(100..100 + len)
            .unwrap()
            .serialized_size_in_bytes();
        assert_eq!(chosen.kind() == ContainerKind::Run, run_size <= array_size);
    }
}

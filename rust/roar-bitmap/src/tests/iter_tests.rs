use std::collections::BTreeSet;

use crate::{
    Bitmap,
    iter::ContainerIter,
    tests::fixtures::{forms, mixed_bitmap, random_lows},
};

/// Expected output of advancing to each target in turn and taking one value.
fn advance_model(model: &BTreeSet<u32>, targets: &[u32]) -> Vec<Option<u32>> {
    let mut cursor = 0u64;
    targets
        .iter()
        .map(|&target| {
            cursor = cursor.max(target as u64);
            let next = if cursor > u32::MAX as u64 {
                None
            } else {
                model.range(cursor as u32..).next().copied()
            };
            if let Some(v) = next {
                cursor = v as u64 + 1;
            }
            next
        })
        .collect()
}

#[test]
fn test_container_iter_both_ends() {
    let mut rng = fastrand::Rng::with_seed(41);
    for shape in 0..3 {
        let values = random_lows(&mut rng, shape);
        for container in forms(&values) {
            let mut it = container.iter();
            let (mut front, mut back) = (Vec::new(), Vec::new());
            loop {
                match it.next() {
                    Some(v) => front.push(v),
                    None => break,
                }
                match it.next_back() {
                    Some(v) => back.push(v),
                    None => break,
                }
            }
            front.extend(back.iter().rev());
            assert_eq!(front, values, "{:?}", container.kind());
        }
    }
}

#[test]
fn test_container_iter_advance_to() {
    let mut rng = fastrand::Rng::with_seed(42);
    for shape in 0..3 {
        let values = random_lows(&mut rng, shape);
        let model = values.iter().map(|&v| v as u32).collect::<BTreeSet<_>>();
        let mut targets = (0..64).map(|_| rng.u32(0..65536)).collect::<Vec<_>>();
        targets.sort_unstable();
        targets.extend([65535, 0]);
        let expected = advance_model(&model, &targets);
        for container in forms(&values) {
            let mut it = ContainerIter::new(&container);
            let actual = targets
                .iter()
                .map(|&t| {
                    it.advance_to(t as u16);
                    it.next().map(u32::from)
                })
                .collect::<Vec<_>>();
            assert_eq!(actual, expected, "{:?}", container.kind());
        }
    }
}

#[test]
fn test_iter_both_ends_across_containers() {
    let mut rng = fastrand::Rng::with_seed(43);
    for _ in 0..4 {
        let (bitmap, model) = mixed_bitmap(&mut rng);
        let mut it = bitmap.iter();
        let (mut front, mut back) = (Vec::new(), Vec::new());
        while let Some(v) = it.next() {
            front.push(v);
            if rng.bool() {
                match it.next_back() {
                    Some(v) => back.push(v),
                    None => break,
                }
            }
        }
        front.extend(back.iter().rev());
        assert!(front.iter().eq(model.iter()));
        assert!(bitmap.iter().rev().eq(model.iter().rev().copied()));
    }
}

#[test]
fn test_iter_advance_to() {
    let mut rng = fastrand::Rng::with_seed(44);
    for _ in 0..4 {
        let (bitmap, model) = mixed_bitmap(&mut rng);
        let mut targets = (0..200).map(|_| rng.u32(..)).collect::<Vec<_>>();
        targets.extend([0, 65535, 65536, 0x8000_0000, u32::MAX]);
        targets.sort_unstable();
        targets.push(3);
        let expected = advance_model(&model, &targets);
        let mut it = bitmap.iter();
        let actual = targets
            .iter()
            .map(|&t| {
                it.advance_to(t);
                it.next()
            })
            .collect::<Vec<_>>();
        assert_eq!(actual, expected);
    }
}

#[test]
fn test_iter_advance_to_respects_back_consumption() {
    let bitmap = Bitmap::bitmap_of(&[1, 5, 70000, 70005, 140000]);
    let mut it = bitmap.iter();
    assert_eq!(it.next_back(), Some(140000));
    assert_eq!(it.next_back(), Some(70005));
    it.advance_to(70001);
    assert_eq!(it.next(), None);

    let mut it = bitmap.iter();
    assert_eq!(it.next_back(), Some(140000));
    it.advance_to(70001);
    assert_eq!(it.next(), Some(70005));
    assert_eq!(it.next(), None);

    let mut it = bitmap.iter();
    it.advance_to(6);
    assert_eq!(it.next(), Some(70000));
    it.advance_to(2);
    assert_eq!(it.next(), Some(70005));
}

#[test]
fn test_signed_iteration_order() {
    let bitmap = Bitmap::bitmap_of(&[1, 0x8000_0000, u32::MAX, 5, 0x7FFF_FFFF]);
    assert_eq!(
        bitmap.iter_signed().collect::<Vec<_>>(),
        vec![i32::MIN, -1, 1, 5, i32::MAX]
    );
    assert_eq!(
        bitmap.iter_signed().rev().collect::<Vec<_>>(),
        vec![i32::MAX, 5, 1, -1, i32::MIN]
    );
    assert_eq!(Bitmap::bitmap_of(&[3, 4]).iter_signed().collect::<Vec<_>>(), vec![3, 4]);
    assert_eq!(
        Bitmap::bitmap_of(&[u32::MAX]).iter_signed().collect::<Vec<_>>(),
        vec![-1]
    );
}

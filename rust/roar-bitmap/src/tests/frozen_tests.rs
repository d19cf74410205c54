use std::borrow::Cow;

use crate::{
    Bitmap, FrozenBitmap,
    config::ReadConfig,
    storage::{borrow_runs, borrow_u16s, borrow_u64s},
    tests::fixtures::{assert_matches_model, mixed_bitmap},
};

#[test]
fn test_view_matches_owned() {
    let mut rng = fastrand::Rng::with_seed(21);
    for _ in 0..6 {
        let (bitmap, model) = mixed_bitmap(&mut rng);
        let bytes = bitmap.to_bytes();
        let frozen = FrozenBitmap::view(&bytes).unwrap();
        assert_eq!(frozen, bitmap);
        assert_eq!(frozen.len(), bitmap.len());
        assert!(frozen.iter().eq(model.iter().copied()));
        assert!(frozen.iter().rev().eq(model.iter().rev().copied()));
        assert_eq!(frozen.to_bytes(), bytes);
        assert_eq!(frozen.serialized_size_in_bytes(), bytes.len());
        assert_matches_model(&frozen.materialize(), &model);
        if let Some(&value) = model.iter().nth(model.len() / 2) {
            assert!(frozen.contains(value));
            assert_eq!(frozen.rank(value), bitmap.rank(value));
            assert_eq!(frozen.select(frozen.rank(value) - 1).unwrap(), value);
        }
    }
}

#[test]
fn test_view_of_misaligned_buffer() {
    let mut bitmap = Bitmap::from_range(0..10_000).unwrap();
    bitmap.insert_range(70_000..70_100).unwrap();
    bitmap.insert(1 << 30);
    bitmap.run_optimize();
    let bytes = bitmap.to_bytes();
    let mut shifted = vec![0u8];
    shifted.extend_from_slice(&bytes);
    let frozen = FrozenBitmap::view(&shifted[1..]).unwrap();
    assert_eq!(frozen, bitmap);
    frozen.validate().unwrap();
}

#[test]
fn test_frozen_operations_produce_owned_bitmaps() {
    let mut rng = fastrand::Rng::with_seed(22);
    let (a, _) = mixed_bitmap(&mut rng);
    let (b, _) = mixed_bitmap(&mut rng);
    let bytes = a.to_bytes();
    let frozen = FrozenBitmap::view_with(&bytes, &ReadConfig::validating()).unwrap();

    assert_eq!(frozen.and(&b), a.and(&b));
    assert_eq!(frozen.or(&b), a.or(&b));
    assert_eq!(b.xor(&frozen), b.xor(&a));
    assert_eq!(b.and_not(&frozen), b.and_not(&a));
    assert_eq!(frozen.and_cardinality(&b), a.and_cardinality(&b));
    assert_eq!(frozen.add_offset(12345), a.add_offset(12345));
    assert_eq!(frozen.limit(10), a.limit(10));
    assert_eq!(frozen.lazy_or(&b).repair(), a.or(&b));

    let mut owned = b.clone();
    owned |= &frozen;
    assert_eq!(owned, a.or(&b));
    assert_eq!(frozen.stats().cardinality, a.len());
}

#[test]
fn test_view_rejects_truncated_buffer() {
    let bytes = Bitmap::from_range(0..10_000).unwrap().to_bytes();
    let err = FrozenBitmap::view(&bytes[..bytes.len() - 8]).unwrap_err();
    assert!(err.is_invalid_format());
    assert!(FrozenBitmap::view(&[]).unwrap_err().is_invalid_format());
}

#[test]
fn test_borrow_helpers() {
    let values: Vec<u16> = vec![1, 2, 0xABCD];
    let bytes = bytemuck::cast_slice::<u16, u8>(&values);
    assert_eq!(borrow_u16s(bytes).as_ref(), values.as_slice());

    let words: Vec<u64> = vec![u64::MAX, 5];
    let bytes = bytemuck::cast_slice::<u64, u8>(&words);
    let borrowed = borrow_u64s(bytes);
    if cfg!(target_endian = "little") {
        assert!(matches!(borrowed, Cow::Borrowed(_)));
    }
    assert_eq!(borrowed.as_ref(), words.as_slice());

    let mut unaligned = vec![0u8; 9];
    unaligned[1..].copy_from_slice(&7u64.to_le_bytes());
    assert_eq!(borrow_u64s(&unaligned[1..]).as_ref(), &[7]);

    let runs = borrow_runs(&[1, 0, 4, 0]);
    assert_eq!((runs[0].start, runs[0].length), (1, 4));
}

#[test]
fn test_view_borrows_every_payload_kind() {
    let mut bitmap = Bitmap::bitmap_of(&[3, 9, 27]);
    bitmap.insert_range(1 << 16..(1 << 16) + 30_000).unwrap();
    for i in 0..6000u32 {
        bitmap.insert(2 << 16 | (i * 7));
    }
    bitmap.run_optimize();
    let stats = bitmap.stats();
    assert_eq!(
        (stats.array_containers, stats.bitmap_containers, stats.run_containers),
        (1, 1, 1)
    );

    let bytes = bitmap.to_bytes();
    let frozen = FrozenBitmap::view(&bytes).unwrap();
    assert_eq!(frozen.stats().run_containers, 1);
    assert_eq!(frozen, bitmap);
    assert!(frozen.contains((1 << 16) + 29_999));
    assert!(frozen.contains(2 << 16 | 7 * 5999));

    // Cutting into the last payload (the bitmap words) is a format error.
    for cut in [1, 8, 4000] {
        let err = FrozenBitmap::view(&bytes[..bytes.len() - cut]).unwrap_err();
        assert!(err.is_invalid_format(), "cut {cut}");
    }
}

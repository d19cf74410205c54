use crate::container::bitmap::{BitmapContainer, Cardinality, range_masks};

#[test]
fn test_range_masks_word_boundaries() {
    assert_eq!(range_masks(0..0).count(), 0);
    assert_eq!(range_masks(0..64).collect::<Vec<_>>(), vec![(0, u64::MAX)]);
    assert_eq!(range_masks(64..128).collect::<Vec<_>>(), vec![(1, u64::MAX)]);
    assert_eq!(range_masks(63..65).collect::<Vec<_>>(), vec![(0, 1 << 63), (1, 1)]);
    assert_eq!(range_masks(3..5).collect::<Vec<_>>(), vec![(0, 0b11000)]);
    assert_eq!(
        range_masks(65472..65536).collect::<Vec<_>>(),
        vec![(1023, u64::MAX)]
    );
    assert_eq!(range_masks(0..65536).count(), 1024);
}

#[test]
fn test_bitmap_insert_remove_flip() {
    let mut bitmap = BitmapContainer::empty();
    assert!(bitmap.insert(0));
    assert!(bitmap.insert(64));
    assert!(bitmap.insert(65535));
    assert!(!bitmap.insert(64));
    assert_eq!(bitmap.len(), 3);
    assert!(bitmap.remove(64));
    assert!(!bitmap.remove(64));
    bitmap.flip(7);
    bitmap.flip(0);
    assert_eq!(bitmap.len(), 2);
    assert!(bitmap.contains(7));
    assert!(!bitmap.contains(0));
    assert_eq!(bitmap.first(), Some(7));
    assert_eq!(bitmap.last(), Some(65535));
}

#[test]
fn test_bitmap_range_updates_track_cardinality() {
    let mut bitmap = BitmapContainer::empty();
    bitmap.insert_range(10..200);
    assert_eq!(bitmap.len(), 190);
    bitmap.insert_range(100..300);
    assert_eq!(bitmap.len(), 290);
    bitmap.remove_range(64..128);
    assert_eq!(bitmap.len(), 226);
    bitmap.flip_range(0..65536);
    assert_eq!(bitmap.len(), 65536 - 226);
    assert_eq!(bitmap.count_ones(), bitmap.len());
    bitmap.flip_range(65535..65536);
    assert!(!bitmap.contains(65535));
    assert_eq!(bitmap.count_ones(), bitmap.len());
}

#[test]
fn test_bitmap_rank_select() {
    let bitmap = BitmapContainer::from_range(60..70);
    assert_eq!(bitmap.rank(59), 0);
    assert_eq!(bitmap.rank(63), 4);
    assert_eq!(bitmap.rank(64), 5);
    assert_eq!(bitmap.rank(65535), 10);
    assert_eq!(bitmap.select(0), Some(60));
    assert_eq!(bitmap.select(4), Some(64));
    assert_eq!(bitmap.select(9), Some(69));
    assert_eq!(bitmap.select(10), None);
}

#[test]
fn test_bitmap_neighbors() {
    let full = BitmapContainer::full();
    assert_eq!(full.next_absent(0), None);
    assert_eq!(full.prev_absent(65535), None);
    assert_eq!(full.count_runs(), 1);

    let mut bitmap = BitmapContainer::from_range(64..192);
    bitmap.insert(65535);
    assert_eq!(bitmap.next_value(0), Some(64));
    assert_eq!(bitmap.next_value(192), Some(65535));
    assert_eq!(bitmap.prev_value(65534), Some(191));
    assert_eq!(bitmap.prev_value(63), None);
    assert_eq!(bitmap.next_absent(64), Some(192));
    assert_eq!(bitmap.next_absent(65535), None);
    assert_eq!(bitmap.prev_absent(191), Some(63));
    assert_eq!(bitmap.count_runs(), 2);
}

#[test]
fn test_bitmap_range_queries() {
    let bitmap = BitmapContainer::from_range(63..129);
    assert_eq!(bitmap.range_cardinality(0..65536), 66);
    assert_eq!(bitmap.range_cardinality(64..128), 64);
    assert!(bitmap.contains_range(63..129));
    assert!(!bitmap.contains_range(62..129));
    assert!(bitmap.contains_range(100..100));
    assert!(bitmap.intersects_range(128..129));
    assert!(!bitmap.intersects_range(129..65536));
}

#[test]
fn test_bitmap_lazy_or_repair() {
    let mut bitmap = BitmapContainer::from_range(0..100);
    bitmap.lazy_or(&BitmapContainer::from_range(50..150));
    assert_eq!(bitmap.cardinality(), Cardinality::PendingRepair);
    assert!(!bitmap.is_empty());
    bitmap.lazy_insert_range(1000..1010);
    bitmap.lazy_insert_many([2000u16, 2001].into_iter());
    bitmap.repair();
    assert_eq!(bitmap.cardinality(), Cardinality::Valid(162));
    assert_eq!(bitmap.len(), 162);
}

#[test]
fn test_bitmap_conversions() {
    let mut bitmap = BitmapContainer::from_range(0..64);
    bitmap.insert_range(128..130);
    bitmap.insert(65535);
    let runs = bitmap.to_run();
    assert_eq!(runs.run_count(), 3);
    assert!(runs.values().eq(bitmap.to_array().iter()));
    assert_eq!(bitmap.to_array().len(), 67);
}

#[test]
fn test_bitmap_add_offset() {
    let mut bitmap = BitmapContainer::from_range(0..3);
    bitmap.insert_range(65530..65536);
    for offset in [0u16, 1, 63, 64, 65, 1000, 65535] {
        let (low, high) = bitmap.add_offset(offset);
        let expected = bitmap
            .to_array()
            .iter()
            .map(|v| v as u32 + offset as u32)
            .collect::<Vec<_>>();
        let actual = low
            .to_array()
            .iter()
            .map(|v| v as u32)
            .chain(high.to_array().iter().map(|v| v as u32 + 65536))
            .collect::<Vec<_>>();
        assert_eq!(actual, expected, "offset {offset}");
        assert_eq!(low.len() + high.len(), bitmap.len());
    }
}

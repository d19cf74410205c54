use crate::{Bitmap, tests::fixtures::mixed_bitmap};

#[test]
fn test_batches_cover_all_values() {
    let mut rng = fastrand::Rng::with_seed(51);
    for _ in 0..4 {
        let (bitmap, model) = mixed_bitmap(&mut rng);
        let expected = model.iter().copied().collect::<Vec<_>>();
        for batch_size in [1, 7, 64, 1000, 70_000] {
            let batches = bitmap.batch_iter().collect_batches(batch_size);
            assert!(batches.iter().all(|b| b.len() <= batch_size));
            assert!(
                batches
                    .iter()
                    .rev()
                    .skip(1)
                    .all(|b| b.len() == batch_size)
            );
            assert_eq!(batches.concat(), expected, "batch size {batch_size}");
        }
    }
}

#[test]
fn test_next_batch_reports_exhaustion() {
    let bitmap = Bitmap::bitmap_of(&[1, 2, 3, 70_000]);
    let mut batches = bitmap.batch_iter();
    let mut buffer = [0u32; 3];
    assert_eq!(batches.next_batch(&mut buffer), 3);
    assert_eq!(buffer, [1, 2, 3]);
    assert_eq!(batches.next_batch(&mut buffer), 1);
    assert_eq!(buffer[0], 70_000);
    assert_eq!(batches.next_batch(&mut buffer), 0);

    assert_eq!(Bitmap::new().batch_iter().next_batch(&mut buffer), 0);
    assert!(Bitmap::new().batch_iter().collect_batches(4).is_empty());
}

#[test]
fn test_batches_over_runs_and_bitmaps() {
    let mut bitmap = Bitmap::from_range(60..200).unwrap();
    bitmap.insert_range(65_500..70_000).unwrap();
    bitmap.insert_range(1 << 20..(1 << 20) + 5000).unwrap();
    let expected = bitmap.to_vec();
    bitmap.run_optimize();
    let mut batches = bitmap.batch_iter();
    let mut buffer = vec![0u32; 33];
    let mut out = Vec::new();
    loop {
        let n = batches.next_batch(&mut buffer);
        out.extend_from_slice(&buffer[..n]);
        if n < buffer.len() {
            break;
        }
    }
    assert_eq!(out, expected);
}

#[test]
fn test_batch_advance_to() {
    let bitmap = Bitmap::from_range(0..100_000).unwrap();
    let mut batches = bitmap.batch_iter();
    let mut buffer = [0u32; 4];
    batches.advance_to(65_534);
    assert_eq!(batches.next_batch(&mut buffer), 4);
    assert_eq!(buffer, [65_534, 65_535, 65_536, 65_537]);
    batches.advance_to(99_998);
    assert_eq!(batches.next_batch(&mut buffer), 2);
    assert_eq!(&buffer[..2], &[99_998, 99_999]);
}

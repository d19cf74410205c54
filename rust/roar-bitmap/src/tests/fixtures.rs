use std::collections::BTreeSet;

use crate::{
    Bitmap,
    container::{ARRAY_MAX_LEN, Container},
};

/// Keys populated by [`mixed_bitmap`]; covers both signed halves and the last key.
pub const MIXED_KEYS: [u32; 6] = [0, 1, 3, 7, 0x8000, 0xFFFF];

/// Sorted, unique low values: shape 0 is sparse, 1 is dense, anything else is a
/// handful of runs.
pub fn random_lows(rng: &mut fastrand::Rng, shape: u8) -> Vec<u16> {
    let mut set = BTreeSet::new();
    match shape {
        0 => {
            for _ in 0..rng.usize(1..300) {
                set.insert(rng.u16(..));
            }
        }
        1 => {
            for _ in 0..rng.usize(6000..40000) {
                set.insert(rng.u16(..));
            }
        }
        _ => {
            for _ in 0..rng.usize(1..30) {
                let start = rng.u32(0..65000);
                let len = rng.u32(1..400);
                set.extend((start..start + len).map(|v| v as u16));
            }
        }
    }
    set.into_iter().collect()
}

/// The same values in every encoding that can hold them.
pub fn forms(values: &[u16]) -> Vec<Container> {
    let base = Container::from_sorted_values(values.to_vec());
    let mut forms = vec![base.to_bitmap(), base.to_run()];
    if values.len() <= ARRAY_MAX_LEN {
        forms.push(base.to_array().unwrap());
    }
    forms
}

/// A bitmap mixing sparse, dense and run-shaped containers, with its model.
pub fn mixed_bitmap(rng: &mut fastrand::Rng) -> (Bitmap, BTreeSet<u32>) {
    let mut bitmap = Bitmap::new();
    let mut model = BTreeSet::new();
    for key in MIXED_KEYS {
        let base = key << 16;
        match rng.u8(0..4) {
            0 => {
                for _ in 0..rng.usize(1..200) {
                    let value = base + rng.u32(0..65536);
                    bitmap.insert(value);
                    model.insert(value);
                }
            }
            1 => {
                for _ in 0..rng.usize(5000..30000) {
                    let value = base + rng.u32(0..65536);
                    bitmap.insert(value);
                    model.insert(value);
                }
            }
            2 => {
                for _ in 0..rng.usize(1..20) {
                    let start = base + rng.u32(0..65000);
                    let end = start + rng.u32(1..500);
                    bitmap.insert_range(start as u64..end as u64).unwrap();
                    model.extend(start..end);
                }
            }
            _ => {}
        }
    }
    if rng.bool() {
        bitmap.run_optimize();
    }
    (bitmap, model)
}

/// Asserts that `bitmap` holds exactly the values of `model`.
pub fn assert_matches_model(bitmap: &Bitmap, model: &BTreeSet<u32>) {
    assert_eq!(bitmap.len(), model.len() as u64);
    assert!(bitmap.iter().eq(model.iter().copied()));
    if !bitmap.is_empty() {
        bitmap.validate().unwrap();
    }
}

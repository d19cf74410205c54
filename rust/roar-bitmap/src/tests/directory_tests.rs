use crate::{
    container::{Container, SetOp},
    directory::ContainerDirectory,
};

fn directory_of(entries: &[(u16, &[u16])]) -> ContainerDirectory {
    let mut directory = ContainerDirectory::default();
    for &(key, values) in entries {
        directory.append(key, Container::from_sorted_values(values.to_vec()));
    }
    directory
}

fn contents(directory: &ContainerDirectory) -> Vec<(u16, Vec<u16>)> {
    directory
        .iter()
        .map(|(key, container)| (key, container.iter().collect()))
        .collect()
}

#[test]
fn test_directory_lookup() {
    let directory = directory_of(&[(1, &[1]), (5, &[2, 3]), (9, &[4])]);
    assert_eq!(directory.len(), 3);
    assert_eq!(directory.keys(), &[1, 5, 9]);
    assert_eq!(directory.locate(5), Ok(1));
    assert_eq!(directory.locate(6), Err(2));
    assert_eq!(directory.locate_from(0, 6), 2);
    assert_eq!(directory.locate_from(2, 1), 2);
    assert_eq!(directory.locate_from(0, 10), 3);
    assert_eq!(directory.get(5).map(Container::len), Some(2));
    assert!(directory.get(2).is_none());
    assert_eq!(directory.entry(2).0, 9);
    assert_eq!(directory.cardinality(), 4);
}

#[test]
fn test_directory_edits() {
    let mut directory = directory_of(&[(1, &[1]), (9, &[4])]);
    directory.get_or_insert(5).insert(7);
    assert_eq!(directory.keys(), &[1, 5, 9]);
    assert!(directory.get_or_insert(5).contains(7));
    assert_eq!(directory.len(), 3);

    directory.get_mut(1).unwrap().remove(1);
    directory.remove_if_empty(0);
    assert_eq!(directory.keys(), &[5, 9]);

    directory.container_at_mut(0).remove(7);
    directory.retain_non_empty();
    assert_eq!(directory.keys(), &[9]);

    directory.insert(0, 3, Container::singleton(8));
    assert_eq!(directory.remove_at(1).0, 9);
    assert_eq!(contents(&directory), vec![(3, vec![8])]);
    let previous = directory.replace(0, Container::from_range(10..20).unwrap());
    assert_eq!(previous.iter().collect::<Vec<_>>(), vec![8]);
    assert_eq!(directory.cardinality(), 10);
    assert_eq!(directory.last_mut().map(|(key, _)| key), Some(3));

    directory.append(4, Container::singleton(0));
    directory.append(6, Container::singleton(0));
    directory.drain_positions(0, 2);
    assert_eq!(directory.keys(), &[6]);
    directory.clear();
    assert!(directory.is_empty());
}

#[test]
fn test_directory_merge() {
    let a = directory_of(&[(1, &[1, 2]), (3, &[5]), (7, &[9])]);
    let b = directory_of(&[(0, &[0]), (3, &[5]), (7, &[8, 9])]);

    assert_eq!(
        contents(&a.merge(SetOp::And, &b)),
        vec![(3, vec![5]), (7, vec![9])]
    );
    assert_eq!(
        contents(&a.merge(SetOp::Or, &b)),
        vec![(0, vec![0]), (1, vec![1, 2]), (3, vec![5]), (7, vec![8, 9])]
    );
    assert_eq!(
        contents(&a.merge(SetOp::Xor, &b)),
        vec![(0, vec![0]), (1, vec![1, 2]), (7, vec![8])]
    );
    assert_eq!(contents(&a.merge(SetOp::AndNot, &b)), vec![(1, vec![1, 2])]);

    // Keys whose result is empty are dropped.
    let disjoint = directory_of(&[(7, &[1])]);
    assert!(a.merge(SetOp::And, &disjoint).is_empty());

    for op in [SetOp::And, SetOp::Or, SetOp::Xor, SetOp::AndNot] {
        let mut in_place = a.clone();
        in_place.merge_in_place(op, &b);
        assert_eq!(in_place, a.merge(op, &b), "{op:?}");
    }

    assert_eq!(a.and_cardinality(&b), 2);
    assert!(a.intersects(&b));
    assert!(!a.is_subset(&b));
    assert!(directory_of(&[(3, &[5]), (7, &[8])]).is_subset(&b));
    assert!(!directory_of(&[(4, &[5])]).is_subset(&b));
}

#[test]
fn test_directory_materialize_is_deep() {
    let a = directory_of(&[(1, &[1, 2])]);
    let mut copy = a.materialize();
    copy.get_mut(1).unwrap().insert(3);
    assert_eq!(a.cardinality(), 2);
    assert_eq!(copy.cardinality(), 3);
    assert!(copy.heap_size_bytes() > 0);
}

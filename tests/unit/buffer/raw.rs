use super::*;

#[test]
fn count_follows_payload_length() {
    let b = Buffer::new(vec![0; 2 * 4 * 3 * 5], vec![2, 4, 3], DataType::U8).unwrap();
    assert_eq!(b.itemsize(), 24);
    assert_eq!(b.count(), 5);
    assert_eq!(b.full_shape(), vec![5, 2, 4, 3]);

    let audio = Buffer::new(vec![0; 8 * 3], vec![2], DataType::F32).unwrap();
    assert_eq!(audio.count(), 3);
}

#[test]
fn partial_elements_and_zero_size_are_rejected() {
    assert!(Buffer::new(vec![0; 5], vec![2], DataType::I16).is_err());
    assert!(Buffer::new(vec![], vec![0, 3], DataType::U8).is_err());
}

#[test]
fn concat_then_split_preserves_order() {
    let a = Buffer::new(vec![1, 2, 3, 4], vec![2], DataType::U8).unwrap();
    let b = Buffer::new(vec![5, 6], vec![2], DataType::U8).unwrap();
    let mut all = Buffer::concat([a, b], vec![2], DataType::U8).unwrap();
    assert_eq!(all.count(), 3);

    let rest = all.split_off(2);
    assert_eq!(all.data(), &[1, 2, 3, 4]);
    assert_eq!(rest.data(), &[5, 6]);
    assert!(all.clone().split_off(10).is_empty());
}

#[test]
fn concat_rejects_mismatched_formats() {
    let a = Buffer::new(vec![1, 2], vec![2], DataType::U8).unwrap();
    let b = Buffer::new(vec![1, 2], vec![1], DataType::I16).unwrap();
    assert!(Buffer::concat([a, b], vec![2], DataType::U8).is_err());
    let empty = Buffer::concat(Vec::new(), vec![3], DataType::F64).unwrap();
    assert_eq!(empty.count(), 0);
    assert_eq!(empty.full_shape(), vec![0, 3]);
}

// Tests for the table engine through its public interface
use crate::*;

fn int(i: i64) -> LuaValue {
    LuaValue::integer(i)
}

fn s(text: &str) -> LuaValue {
    LuaValue::string(text)
}

#[test]
fn test_set_get_basic() {
    let mut t = LuaTable::new();
    t.set_int(1, int(10));
    t.set_int(2, s("two"));
    t.raw_set(s("name"), int(99)).unwrap();
    t.raw_set(LuaValue::boolean(true), s("yes")).unwrap();
    t.raw_set(int(-3), int(30)).unwrap();
    t.raw_set(LuaValue::float(2.5), s("half")).unwrap();

    assert_eq!(t.get_int(1), int(10));
    assert_eq!(t.get_int(2), s("two"));
    assert_eq!(t.raw_get(&s("name")), int(99));
    assert_eq!(t.raw_get(&LuaValue::boolean(true)), s("yes"));
    assert_eq!(t.raw_get(&int(-3)), int(30));
    assert_eq!(t.raw_get(&LuaValue::float(2.5)), s("half"));

    assert_eq!(t.get_int(3), LuaValue::Nil);
    assert_eq!(t.raw_get(&s("absent")), LuaValue::Nil);
    assert_eq!(t.raw_get(&LuaValue::boolean(false)), LuaValue::Nil);
}

#[test]
fn test_in_order_integer_keys() {
    let mut t = LuaTable::new();
    for i in 1..=32 {
        t.set_int(i, int(i * 100));
    }
    for i in 1..=32 {
        assert_eq!(t.get_int(i), int(i * 100));
    }
    assert_eq!(t.rawlen(), 32);
    assert!((32..=64).contains(&t.array_length()));
    assert_eq!(t.hash_length(), 0);
}

#[test]
fn test_out_of_order_integer_keys() {
    // Upper half first, forcing the keys through the hash part, then the
    // lower half, which must migrate them into the array part
    let mut t = LuaTable::new();
    for i in 17..=32 {
        t.set_int(i, int(i * 100));
    }
    for i in 1..=16 {
        t.set_int(i, int(i * 100));
    }
    for i in 1..=32 {
        assert_eq!(t.get_int(i), int(i * 100));
    }
    assert_eq!(t.rawlen(), 32);
}

#[test]
fn test_final_state_is_order_independent() {
    let mut forward = LuaTable::new();
    let mut backward = LuaTable::new();
    for i in 1..=16 {
        forward.set_int(i, int(i));
    }
    for i in (1..=16).rev() {
        backward.set_int(i, int(i));
    }
    for i in 1..=16 {
        assert_eq!(forward.get_int(i), backward.get_int(i));
    }
    assert_eq!(forward.rawlen(), 16);
    assert_eq!(backward.rawlen(), 16);
}

#[test]
fn test_rekey_sequence_bounds() {
    let mut t = LuaTable::new();
    for &k in &[3i64, 1, 5, 4, 6, 2] {
        t.set_int(k, int(k * 10));
    }
    for k in 1..=6 {
        assert_eq!(t.get_int(k), int(k * 10));
    }
    assert!((3..=12).contains(&t.array_length()));
    assert!(t.hash_length() <= 3);
}

#[test]
fn test_shrink_after_deletes() {
    let mut t = LuaTable::new();
    for i in 1..=6 {
        t.set_int(i, int(i));
    }
    t.raw_set(s("aa"), int(1)).unwrap();
    t.raw_set(s("bb"), int(2)).unwrap();

    t.set_int(3, LuaValue::Nil);
    t.set_int(4, LuaValue::Nil);
    t.set_int(6, LuaValue::Nil);

    t.raw_set(s("cc"), int(3)).unwrap();
    t.raw_set(s("dd"), int(4)).unwrap();

    assert_eq!(t.array_length(), 4);
    assert_eq!(t.hash_entries(), 5);

    assert_eq!(t.get_int(3), LuaValue::Nil);
    assert_eq!(t.get_int(4), LuaValue::Nil);
    assert_eq!(t.get_int(6), LuaValue::Nil);
    assert_eq!(t.get_int(1), int(1));
    assert_eq!(t.get_int(2), int(2));
    assert_eq!(t.get_int(5), int(5));
    for name in ["aa", "bb", "cc", "dd"] {
        assert!(!t.raw_get(&s(name)).is_nil());
    }
}

#[test]
fn test_integer_and_string_keys_never_alias() {
    let mut t = LuaTable::new();
    for i in 0..10 {
        t.set_int(i, int(i * 2));
        t.raw_set(s(&i.to_string()), int(i * 2 + 1)).unwrap();
    }
    assert_eq!(t.key_count(), 20);
    for i in 0..10 {
        assert_eq!(t.get_int(i), int(i * 2));
        assert_eq!(t.raw_get(&s(&i.to_string())), int(i * 2 + 1));
    }
}

#[test]
fn test_replace_keeps_entry_count() {
    let mut t = LuaTable::new();
    for i in 1..=4 {
        t.set_int(i, int(i));
    }
    t.raw_set(s("x"), int(100)).unwrap();
    let before = t.key_count();

    t.set_int(2, s("replaced"));
    t.raw_set(s("x"), int(200)).unwrap();

    assert_eq!(t.key_count(), before);
    assert_eq!(t.get_int(2), s("replaced"));
    assert_eq!(t.raw_get(&s("x")), int(200));
    assert_eq!(t.get_int(1), int(1));
    assert_eq!(t.get_int(3), int(3));
}

#[test]
fn test_length_border() {
    let mut t = LuaTable::new();
    assert_eq!(t.rawlen(), 0);

    t.set_int(1, int(1));
    t.set_int(2, int(2));
    assert_eq!(t.rawlen(), 2);

    // A hole at 3: any border is legal, and here the search lands on 2
    t.set_int(4, int(4));
    let n = t.rawlen();
    assert!(!t.get_int(n).is_nil() || n == 0);
    assert!(t.get_int(n + 1).is_nil());

    t.set_int(3, int(3));
    assert_eq!(t.rawlen(), 4);
}

#[test]
fn test_float_key_normalization() {
    let mut t = LuaTable::new();
    t.raw_set(LuaValue::float(2.0), s("two")).unwrap();
    assert_eq!(t.get_int(2), s("two"));
    assert_eq!(t.raw_get(&LuaValue::float(2.0)), s("two"));

    t.set_int(2, s("still two"));
    assert_eq!(t.raw_get(&LuaValue::float(2.0)), s("still two"));
    assert_eq!(t.key_count(), 1);

    t.raw_set(LuaValue::float(2.5), s("half")).unwrap();
    assert_eq!(t.key_count(), 2);
    assert_eq!(t.raw_get(&LuaValue::float(2.5)), s("half"));
}

#[test]
fn test_nil_and_nan_keys_error() {
    let mut t = LuaTable::new();
    assert_eq!(t.raw_set(LuaValue::Nil, int(1)), Err(LuaError::NilIndex));
    assert_eq!(
        t.raw_set(LuaValue::float(f64::NAN), int(1)),
        Err(LuaError::NanIndex)
    );

    // Reads stay total
    assert_eq!(t.raw_get(&LuaValue::Nil), LuaValue::Nil);
    assert_eq!(t.raw_get(&LuaValue::float(f64::NAN)), LuaValue::Nil);
}

#[test]
fn test_assigning_nil_removes() {
    let mut t = LuaTable::new();
    t.set_int(1, int(1));
    t.raw_set(s("k"), int(2)).unwrap();

    t.set_int(1, LuaValue::Nil);
    t.raw_set(s("k"), LuaValue::Nil).unwrap();

    assert_eq!(t.get_int(1), LuaValue::Nil);
    assert_eq!(t.raw_get(&s("k")), LuaValue::Nil);
    assert_eq!(t.key_count(), 0);

    // Removing an absent key is a no-op
    t.raw_set(s("never"), LuaValue::Nil).unwrap();
}

#[test]
fn test_insert_remove_matches_reference_list() {
    let mut t = LuaTable::new();
    let mut reference: Vec<i64> = Vec::new();

    let compare = |t: &LuaTable, reference: &Vec<i64>| {
        assert_eq!(t.rawlen() as usize, reference.len());
        for (i, &v) in reference.iter().enumerate() {
            assert_eq!(t.get_int(i as i64 + 1), int(v));
        }
    };

    // Build up 32 elements by appending
    for i in 0..32 {
        t.insert(0, int(100 + i));
        reference.push(100 + i);
        compare(&t, &reference);
    }

    // Insert at the beginning, the middle and the end
    for i in 0..8 {
        t.insert(1, int(200 + i));
        reference.insert(0, 200 + i);
        compare(&t, &reference);

        let mid = reference.len() as i64 / 2;
        t.insert(mid, int(300 + i));
        reference.insert(mid as usize - 1, 300 + i);
        compare(&t, &reference);

        t.insert(0, int(400 + i));
        reference.push(400 + i);
        compare(&t, &reference);
    }

    // Remove from the beginning, the middle and the end
    for _ in 0..8 {
        assert_eq!(t.remove(1), int(reference.remove(0)));
        compare(&t, &reference);

        let mid = reference.len() as i64 / 2;
        assert_eq!(t.remove(mid), int(reference.remove(mid as usize - 1)));
        compare(&t, &reference);

        assert_eq!(t.remove(0), int(reference.pop().unwrap()));
        compare(&t, &reference);
    }
}

#[test]
fn test_remove_on_empty_and_out_of_range() {
    let mut t = LuaTable::new();
    assert_eq!(t.remove(0), LuaValue::Nil);
    assert_eq!(t.remove(1), LuaValue::Nil);

    t.set_int(1, int(1));
    assert_eq!(t.remove(5), LuaValue::Nil);
    assert_eq!(t.get_int(1), int(1));
    assert_eq!(t.remove(1), int(1));
    assert_eq!(t.rawlen(), 0);
}

#[test]
fn test_next_visits_every_entry_once() {
    let mut t = LuaTable::new();
    for i in 1..=8 {
        t.set_int(i, int(i));
    }
    for name in ["a", "b", "c"] {
        t.raw_set(s(name), s(name)).unwrap();
    }

    let mut seen = Vec::new();
    let mut cursor = LuaValue::Nil;
    while let Some((key, value)) = t.next(&cursor).unwrap() {
        assert_eq!(t.raw_get(&key), value);
        assert!(
            !seen.iter().any(|k: &LuaValue| k.raw_eq(&key)),
            "duplicate visit"
        );
        seen.push(key.clone());
        cursor = key;
    }
    assert_eq!(seen.len(), 11);

    // The array part comes first, in index order
    for (i, key) in seen.iter().take(8).enumerate() {
        assert_eq!(*key, int(i as i64 + 1));
    }
}

#[test]
fn test_next_with_unknown_key_errors() {
    let mut t = LuaTable::new();
    t.raw_set(s("present"), int(1)).unwrap();
    assert_eq!(t.next(&s("missing")), Err(LuaError::InvalidNext));
    assert_eq!(
        t.next(&LuaValue::float(f64::NAN)),
        Err(LuaError::InvalidNext)
    );
}

#[test]
fn test_remove_while_iterating() {
    let mut t = LuaTable::new();
    for i in 1..=8 {
        t.set_int(i, int(i * 10));
    }
    for i in 1..=8 {
        t.raw_set(s(&format!("s{}", i)), int(i)).unwrap();
    }

    let full_order: Vec<LuaValue> = t.pairs().map(|(k, _)| k).collect();
    assert_eq!(full_order.len(), 16);

    // Remove every other visited key, mid-iteration
    let mut removed = Vec::new();
    let mut cursor = LuaValue::Nil;
    let mut index = 0;
    while let Some((key, _)) = t.next(&cursor).unwrap() {
        cursor = key.clone();
        if index % 2 == 0 {
            t.raw_set(key.clone(), LuaValue::Nil).unwrap();
            removed.push(key);
        }
        index += 1;
    }
    assert_eq!(index, 16);

    // Survivors iterate in their original relative order, each once
    let expected: Vec<LuaValue> = full_order
        .iter()
        .filter(|k| !removed.iter().any(|r| r.raw_eq(k)))
        .cloned()
        .collect();
    let survivors: Vec<LuaValue> = t.pairs().map(|(k, _)| k).collect();
    assert_eq!(survivors, expected);
    assert_eq!(survivors.len(), 8);
}

#[test]
fn test_trailing_trim_keeps_cursor_terminating() {
    let mut t = LuaTable::new();
    for i in 1..=8 {
        t.set_int(i, int(i));
    }
    assert_eq!(t.array_length(), 8);

    for i in 4..=8 {
        t.set_int(i, LuaValue::Nil);
    }
    // More than half the array was one trailing run of holes
    assert_eq!(t.array_length(), 3);

    // A cursor parked on the trimmed tail still ends cleanly
    assert_eq!(t.next(&int(8)).unwrap(), None);
    for i in 1..=3 {
        assert_eq!(t.get_int(i), int(i));
    }
    assert_eq!(t.rawlen(), 3);
}

#[test]
fn test_pairs_matches_next() {
    let mut t = LuaTable::new();
    for i in 1..=5 {
        t.set_int(i, int(i));
    }
    t.raw_set(s("x"), int(6)).unwrap();

    let mut manual = Vec::new();
    let mut cursor = LuaValue::Nil;
    while let Some((key, value)) = t.next(&cursor).unwrap() {
        cursor = key.clone();
        manual.push((key, value));
    }

    let iterated: Vec<(LuaValue, LuaValue)> = t.pairs().collect();
    assert_eq!(iterated, manual);
}

#[test]
fn test_capacity_hints() {
    let t = LuaTable::with_capacity(0, 0);
    assert_eq!(t.array_length(), 0);
    assert_eq!(t.hash_length(), 0);

    let mut t = LuaTable::with_capacity(5, 3);
    assert_eq!(t.array_length(), 8);
    assert!(t.hash_length() >= 3);

    t.set_int(3, int(3));
    t.raw_set(s("k"), int(1)).unwrap();
    assert_eq!(t.get_int(3), int(3));
    assert_eq!(t.raw_get(&s("k")), int(1));
}

#[test]
fn test_large_sparse_keys_stay_in_hash() {
    let mut t = LuaTable::new();
    t.set_int(1_000_000, int(1));
    t.set_int(-5, int(2));
    t.set_int(0, int(3));

    assert_eq!(t.array_length(), 0);
    assert_eq!(t.get_int(1_000_000), int(1));
    assert_eq!(t.get_int(-5), int(2));
    assert_eq!(t.get_int(0), int(3));
    assert_eq!(t.rawlen(), 0);
}

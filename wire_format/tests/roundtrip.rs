// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::collections::BTreeMap;

use wire_format::*;

fn encode<T: WireWrite>(t: &T) -> Vec<u8> {
    let mut w = Writer::new();
    t.serialize(&mut w);
    w.into_bytes()
}

fn decode<T: WireRead>(bytes: &[u8]) -> T {
    let mut r = Reader::new(bytes);
    let t = T::deserialize(&mut r).unwrap();
    assert_eq!(0, r.remaining(), "decode must consume the whole buffer");
    t
}

#[test]
fn primitives() {
    assert_eq!(17_i32, decode(&encode(&17_i32)));
    assert_eq!(-1_i64, decode(&encode(&-1_i64)));
    assert_eq!(0xfe_u8, decode(&encode(&0xfe_u8)));
    assert_eq!(usize::MAX, decode(&encode(&usize::MAX)));
    assert_eq!(2.5_f64, decode::<f64>(&encode(&2.5_f64)));
    assert_eq!('!', decode(&encode(&'!')));
    assert_eq!('\u{1f980}', decode(&encode(&'\u{1f980}')));
    assert!(decode::<bool>(&encode(&true)));
}

#[test]
fn strings() {
    assert_eq!("ABC".to_string(), decode::<String>(&encode(&"ABC")));

    // No length prefix: the bytes end with the single NUL sentinel.
    assert_eq!(vec![b'A', b'B', b'C', 0], encode(&"ABC"));
}

#[test]
fn empty_string_is_one_nul_byte() {
    assert_eq!(vec![0_u8], encode(&String::new()));
    assert_eq!(String::new(), decode::<String>(&[0]));
}

#[test]
fn vectors_and_maps() {
    let v = vec!["x".to_string(), "y".to_string(), String::new()];
    assert_eq!(v, decode::<Vec<String>>(&encode(&v)));

    let mut m = BTreeMap::new();
    m.insert(1_i32, "A".to_string());
    m.insert(2_i32, "B".to_string());
    assert_eq!(m, decode::<BTreeMap<i32, String>>(&encode(&m)));
}

#[test]
fn tuples_concatenate_in_order() {
    let t = (6_i32, "XYZ".to_string());
    assert_eq!(t, decode::<(i32, String)>(&encode(&t)));

    // A tuple is its fields back to back, nothing else.
    let mut by_hand = encode(&6_i32);
    by_hand.extend_from_slice(&encode(&"XYZ"));
    assert_eq!(by_hand, encode(&t));
}

#[test]
fn unit_occupies_no_bytes() {
    assert!(encode(&()).is_empty());
    decode::<()>(&[]);
}

#[test]
fn truncated_input_is_an_error() {
    let bytes = encode(&17_i32);
    let mut r = Reader::new(&bytes[..2]);
    assert_eq!(Err(WireError::Truncated), i32::deserialize(&mut r));

    // A string missing its sentinel is truncated, not silently accepted.
    let mut r = Reader::new(b"ABC");
    assert_eq!(Err(WireError::Truncated), String::deserialize(&mut r));
}

#[test]
fn peek_does_not_advance() {
    let bytes = encode(&"9:1");
    let r = Reader::new(&bytes);
    assert_eq!(Some(b'9'), r.peek());
    assert_eq!(Some(b'9'), r.peek());
    assert_eq!(bytes.len(), r.remaining());
}

#[test]
fn fault_roundtrip() {
    let fault = Fault::new(FaultKind::InvalidMethod, "CTest::Nope is not implemented.");
    let bytes = encode(&fault);

    // The first byte of an encoded fault is never zero, so replies can be
    // classified by a single peek.
    assert_ne!(0, bytes[0]);

    assert_eq!(fault, decode::<Fault>(&bytes));
}

#[test]
fn unknown_fault_tag_is_an_error() {
    let mut w = Writer::new();
    99_i32.serialize(&mut w);
    "?".serialize(&mut w);
    let bytes = w.into_bytes();

    let mut r = Reader::new(&bytes);
    assert_eq!(Err(WireError::InvalidFaultTag(99)), Fault::deserialize(&mut r));
}

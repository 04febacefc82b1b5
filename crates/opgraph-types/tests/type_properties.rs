//! Property-based tests for assignability and boxing
//!
//! Generators are depth-limited so that nested containers stay small.

use chrono::{Duration, TimeZone, Utc};
use opgraph_types::{box_value, unbox, BoxingMode, Type, Value};
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;

const FIELD_NAMES: [&str; 3] = ["a", "b", "c"];

fn leaf_type(g: &mut Gen) -> Type {
    let leaves = [
        Type::Unknown,
        Type::NoneType,
        Type::Bool,
        Type::Int,
        Type::Float,
        Type::String,
        Type::Timestamp,
        Type::Timedelta,
    ];
    g.choose(&leaves).cloned().unwrap_or(Type::Int)
}

fn gen_fields(g: &mut Gen, depth: u32) -> Type {
    let count = 1 + usize::arbitrary(g) % FIELD_NAMES.len();
    Type::typed_dict(
        FIELD_NAMES[..count]
            .iter()
            .map(|name| (*name, gen_type(g, depth - 1))),
    )
}

/// Any type, unions included.
fn gen_type(g: &mut Gen, depth: u32) -> Type {
    if depth == 0 {
        return leaf_type(g);
    }
    match u8::arbitrary(g) % 6 {
        0 => leaf_type(g),
        1 => Type::list(gen_type(g, depth - 1)),
        2 => Type::array(gen_type(g, depth - 1)),
        3 => Type::optional(gen_type(g, depth - 1)),
        4 => gen_fields(g, depth),
        _ => Type::union([gen_type(g, depth - 1), gen_type(g, depth - 1)]),
    }
}

/// A type whose outermost constructor is not a union.
fn gen_non_union(g: &mut Gen, depth: u32) -> Type {
    if depth == 0 {
        return leaf_type(g);
    }
    match u8::arbitrary(g) % 4 {
        0 => leaf_type(g),
        1 => Type::list(gen_type(g, depth - 1)),
        2 => Type::array(gen_type(g, depth - 1)),
        _ => gen_fields(g, depth),
    }
}

#[derive(Debug, Clone)]
struct AnyType(Type);

impl Arbitrary for AnyType {
    fn arbitrary(g: &mut Gen) -> Self {
        AnyType(gen_type(g, 3))
    }
}

#[derive(Debug, Clone)]
struct NonUnionType(Type);

impl Arbitrary for NonUnionType {
    fn arbitrary(g: &mut Gen) -> Self {
        NonUnionType(gen_non_union(g, 3))
    }
}

#[derive(Debug, Clone)]
struct AnyValue(Value);

fn leaf_value(g: &mut Gen) -> Value {
    match u8::arbitrary(g) % 7 {
        0 => Value::None,
        1 => Value::Bool(bool::arbitrary(g)),
        2 => Value::Int(i64::arbitrary(g)),
        3 => Value::Float(f64::arbitrary(g)),
        4 => Value::String(String::arbitrary(g)),
        5 => Utc
            .timestamp_opt(i64::from(i32::arbitrary(g)), 0)
            .single()
            .map(Value::Timestamp)
            .unwrap_or(Value::None),
        _ => Value::Timedelta(Duration::milliseconds(i64::from(i32::arbitrary(g)))),
    }
}

fn gen_value(g: &mut Gen, depth: u32) -> Value {
    if depth == 0 {
        return leaf_value(g);
    }
    let len = usize::arbitrary(g) % 4;
    match u8::arbitrary(g) % 4 {
        0 => leaf_value(g),
        1 => Value::List((0..len).map(|_| gen_value(g, depth - 1)).collect()),
        2 => Value::Array((0..len).map(|_| leaf_value(g)).collect()),
        _ => Value::dict(
            FIELD_NAMES[..len.min(FIELD_NAMES.len())]
                .iter()
                .map(|name| (*name, gen_value(g, depth - 1)))
                .collect::<Vec<_>>(),
        ),
    }
}

impl Arbitrary for AnyValue {
    fn arbitrary(g: &mut Gen) -> Self {
        AnyValue(gen_value(g, 2))
    }
}

#[quickcheck]
fn assignability_is_reflexive(t: AnyType) -> bool {
    t.0.assign_type(&t.0.clone())
}

#[quickcheck]
fn union_target_distributes_over_members(a: AnyType, b: AnyType, c: NonUnionType) -> bool {
    let (a, b, c) = (a.0, b.0, c.0);
    Type::union([a.clone(), b.clone()]).assign_type(&c) == (a.assign_type(&c) || b.assign_type(&c))
}

#[quickcheck]
fn union_candidate_requires_every_member(a: NonUnionType, b: NonUnionType, t: AnyType) -> bool {
    let (a, b, t) = (a.0, b.0, t.0);
    let u = Type::union([a.clone(), b.clone()]);
    // Identical types short-circuit before members are considered
    t == u || t.assign_type(&u) == (t.assign_type(&a) && t.assign_type(&b))
}

#[quickcheck]
fn unbox_inverts_box_in_trace_mode(v: AnyValue) -> bool {
    unbox(box_value(v.0.clone(), BoxingMode::Trace)) == v.0
}

#[quickcheck]
fn unbox_inverts_box_in_legacy_mode(v: AnyValue) -> bool {
    unbox(box_value(v.0.clone(), BoxingMode::Legacy)) == v.0
}

#[test]
fn union_of_optional_members_flattens() {
    let t = Type::union([Type::optional(Type::Int), Type::optional(Type::String)]);
    assert_eq!(t, Type::union([Type::Int, Type::String, Type::NoneType]));
    assert!(t.is_optional());
}

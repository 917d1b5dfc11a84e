use proptest::prelude::*;
use weave_ir::NativeOp;
use weave_runtime::{Story, StoryError, Value, apply_native};

const EMPTY: &str = r##"{"inkVersion": 21, "root": [["done", null], "done", null], "listDefs": {}}"##;

fn story() -> Story {
    Story::new(EMPTY).unwrap()
}

proptest! {
    #[test]
    fn int_arithmetic_wraps_like_i64(a in any::<i64>(), b in any::<i64>()) {
        let s = story();
        let g = s.graph();
        let args = [Value::Int(a), Value::Int(b)];
        prop_assert_eq!(apply_native(g, NativeOp::Add, &args).unwrap(), Value::Int(a.wrapping_add(b)));
        prop_assert_eq!(apply_native(g, NativeOp::Subtract, &args).unwrap(), Value::Int(a.wrapping_sub(b)));
        prop_assert_eq!(apply_native(g, NativeOp::Multiply, &args).unwrap(), Value::Int(a.wrapping_mul(b)));
    }
}

proptest! {
    #[test]
    fn int_division_truncates_toward_zero(a in -10_000i64..10_000, b in 1i64..100) {
        let s = story();
        let g = s.graph();
        let args = [Value::Int(a), Value::Int(b)];
        prop_assert_eq!(apply_native(g, NativeOp::Divide, &args).unwrap(), Value::Int(a / b));
        prop_assert_eq!(apply_native(g, NativeOp::Mod, &args).unwrap(), Value::Int(a % b));
    }
}

proptest! {
    #[test]
    fn mixed_int_and_float_promote_to_float(a in -1_000i64..1_000, b in -1_000.0f64..1_000.0) {
        let s = story();
        let g = s.graph();
        let got = apply_native(g, NativeOp::Add, &[Value::Int(a), Value::Float(b)]).unwrap();
        prop_assert_eq!(got, Value::Float(a as f64 + b));
    }
}

proptest! {
    #[test]
    fn comparisons_agree_with_i64(a in any::<i64>(), b in any::<i64>()) {
        let s = story();
        let g = s.graph();
        let args = [Value::Int(a), Value::Int(b)];
        prop_assert_eq!(apply_native(g, NativeOp::Less, &args).unwrap(), Value::Bool(a < b));
        prop_assert_eq!(apply_native(g, NativeOp::GreaterEq, &args).unwrap(), Value::Bool(a >= b));
        prop_assert_eq!(apply_native(g, NativeOp::Max, &args).unwrap(), Value::Int(a.max(b)));
    }
}

#[test]
fn division_by_zero_is_an_evaluation_error() {
    let s = story();
    let g = s.graph();
    for op in [NativeOp::Divide, NativeOp::Mod] {
        let err = apply_native(g, op, &[Value::Int(7), Value::Int(0)]).unwrap_err();
        assert!(matches!(err, StoryError::Evaluation(_)), "{op:?}: {err}");
        assert!(err.is_recoverable());
    }
    let err = apply_native(g, NativeOp::Divide, &[Value::Float(1.0), Value::Float(0.0)]).unwrap_err();
    assert!(matches!(err, StoryError::Evaluation(_)));
}

#[test]
fn void_operands_are_rejected() {
    let s = story();
    let err = apply_native(s.graph(), NativeOp::Add, &[Value::Void, Value::Int(1)]).unwrap_err();
    assert!(err.to_string().contains("void"));
}

#[test]
fn wrong_arity_is_rejected() {
    let s = story();
    let err = apply_native(s.graph(), NativeOp::Add, &[Value::Int(1)]).unwrap_err();
    assert!(matches!(err, StoryError::Evaluation(_)));
}

#[test]
fn strings_concatenate_and_compare() {
    let s = story();
    let g = s.graph();
    let args = [Value::from("ab"), Value::from("cd")];
    assert_eq!(apply_native(g, NativeOp::Add, &args).unwrap(), Value::from("abcd"));
    assert_eq!(apply_native(g, NativeOp::Equal, &args).unwrap(), Value::Bool(false));
}

use super::*;
use crate::{
    db::predicate::{Expr, normalize},
    error::{ErrorClass, ErrorOrigin},
    test_support::{arb_expr, key_columns},
    value::Value,
};
use proptest::prelude::*;

fn compare_chain_predicate() -> Expr {
    Expr::col("value1").is_null()
        & (Expr::col("value2").eq(Expr::lit("root")) | Expr::col("value3").eq(Expr::lit(1)))
}

fn nested_not(depth: usize) -> Expr {
    (1..depth).fold(Expr::col("value1"), |inner, _| !inner)
}

#[test]
fn is_null_encodes_to_golden_bytes() {
    let bytes = encode(&Expr::col("value1").is_null()).expect("predicate should encode");

    let mut expected = vec![0x09, 0, 0, 0, 1, 0x02, 0, 0, 0, 6];
    expected.extend_from_slice(b"value1");
    assert_eq!(bytes, expected);
}

#[test]
fn literals_encode_type_length_and_big_endian_payload() {
    let bytes = encode(&Expr::lit(1)).expect("literal should encode");
    assert_eq!(bytes, vec![0x01, 0x03, 0, 0, 0, 8, 0, 0, 0, 0, 0, 0, 0, 1]);

    let bytes = encode(&Expr::lit(Value::Null)).expect("null should encode");
    assert_eq!(bytes, vec![0x01, 0x01, 0, 0, 0, 0]);

    let bytes = encode(&Expr::lit(true)).expect("bool should encode");
    assert_eq!(bytes, vec![0x01, 0x02, 0, 0, 0, 1, 1]);
}

#[test]
fn logical_nodes_prefix_child_count() {
    let bytes = encode(&compare_chain_predicate()).expect("predicate should encode");

    assert_eq!(bytes[0], NodeTag::And.to_u8());
    assert_eq!(&bytes[1..5], &[0, 0, 0, 2]);
    assert_eq!(bytes[5], NodeTag::IsNull.to_u8());
}

#[test]
fn compare_chain_round_trips() {
    let expr = compare_chain_predicate();
    let bytes = encode(&expr).expect("predicate should encode");

    assert_eq!(decode(&bytes).expect("predicate should decode"), expr);
}

#[test]
fn decode_rejects_unknown_node_tag() {
    let err = decode(&[0x7f, 0, 0, 0, 0]).expect_err("unregistered tag must fail");

    assert_eq!(
        err,
        CodecError::UnknownPredicateNode {
            tag: 0x7f,
            offset: 0
        }
    );
    assert_eq!(err.kind(), CodecErrorKind::UnknownPredicateNode);
}

#[test]
fn decode_reports_offset_of_nested_unknown_tag() {
    // Not(<0x00 ...>)
    let err = decode(&[0x0f, 0, 0, 0, 1, 0x00]).expect_err("unregistered tag must fail");

    assert_eq!(err, CodecError::UnknownPredicateNode { tag: 0, offset: 5 });
}

#[test]
fn decode_rejects_unknown_literal_type() {
    let err = decode(&[0x01, 0x09, 0, 0, 0, 0]).expect_err("unknown literal type must fail");

    assert_eq!(
        err,
        CodecError::UnknownLiteralType {
            type_byte: 0x09,
            offset: 1
        }
    );
}

#[test]
fn decode_rejects_empty_and_trailing_input() {
    assert_eq!(decode(&[]).expect_err("empty input"), CodecError::Empty);

    let mut bytes = encode(&Expr::lit(1)).expect("literal should encode");
    bytes.push(0x00);
    let err = decode(&bytes).expect_err("trailing byte must fail");
    assert_eq!(
        err,
        CodecError::TrailingBytes {
            offset: 14,
            remaining: 1
        }
    );
}

#[test]
fn decode_rejects_arity_mismatch_for_fixed_nodes() {
    // Equals declaring three children
    let err = decode(&[0x03, 0, 0, 0, 3]).expect_err("wrong arity must fail");

    assert_eq!(
        err,
        CodecError::ArityMismatch {
            node: "Equals",
            expected: 2,
            found: 3
        }
    );
}

#[test]
fn decode_rejects_child_count_larger_than_input() {
    let err = decode(&[0x0c, 0xff, 0xff, 0xff, 0xff]).expect_err("oversized child count");

    assert_eq!(err.kind(), CodecErrorKind::Truncated);
}

#[test]
fn decode_rejects_malformed_literals() {
    let err = decode(&[0x01, 0x03, 0, 0, 0, 4, 0, 0, 0, 1]).expect_err("short Int literal");
    assert_eq!(err.kind(), CodecErrorKind::LiteralLength);

    let err = decode(&[0x01, 0x02, 0, 0, 0, 1, 2]).expect_err("bool byte 2");
    assert_eq!(err, CodecError::InvalidBool { byte: 2, offset: 6 });

    let mut nan = vec![0x01, 0x05, 0, 0, 0, 8];
    nan.extend_from_slice(&f64::NAN.to_bits().to_be_bytes());
    let err = decode(&nan).expect_err("NaN literal");
    assert_eq!(err.kind(), CodecErrorKind::NonFiniteFloat);

    let err = decode(&[0x01, 0x06, 0, 0, 0, 2, 0xc3, 0x28]).expect_err("invalid utf8 text");
    assert_eq!(err, CodecError::InvalidUtf8 { offset: 6 });

    let err = decode(&[0x02, 0, 0, 0, 1, 0xff]).expect_err("invalid utf8 column");
    assert_eq!(err.kind(), CodecErrorKind::InvalidUtf8);
}

#[test]
fn decode_enforces_depth_limit() {
    let limits = CodecLimits::default();
    let at_limit = encode(&nested_not(limits.max_depth)).expect("deep tree should encode");
    decode(&at_limit).expect("tree at the depth limit should decode");

    let over = encode(&nested_not(limits.max_depth + 1)).expect("deep tree should encode");
    let err = decode(&over).expect_err("tree over the depth limit must fail");
    assert_eq!(
        err,
        CodecError::DepthExceeded {
            max: limits.max_depth
        }
    );
}

#[test]
fn decode_enforces_size_limit() {
    let bytes = encode(&compare_chain_predicate()).expect("predicate should encode");
    let limits = CodecLimits::new(bytes.len() - 1, 16);

    let err = decode_with_limits(&bytes, limits).expect_err("payload over limit");

    assert_eq!(err.kind(), CodecErrorKind::PayloadTooLarge);
    decode_with_limits(&bytes, CodecLimits::new(bytes.len(), 16)).expect("payload at limit");
}

#[test]
fn codec_errors_map_to_codec_corruption() {
    let err = InternalError::from(CodecError::Empty);

    assert_eq!(err.class, ErrorClass::Corruption);
    assert_eq!(err.origin, ErrorOrigin::Codec);
    assert!(!err.is_retryable());
    assert!(err.message.ends_with(": empty"), "unexpected error: {err:?}");
}

#[test]
fn codec_limits_follow_config() {
    let config = casdb_config::CasdbConfig::from_toml_str(
        r"
        [codec]
        max_predicate_bytes = 512
        max_predicate_depth = 8
        ",
    )
    .expect("config should parse");

    let limits = CodecLimits::from(&config.codec);

    assert_eq!(limits, CodecLimits::new(512, 8));
    assert!(limits.admit_depth(8).is_ok());
    assert!(limits.admit_depth(9).is_err());
}

proptest! {
    #[test]
    fn normalized_trees_round_trip(expr in arb_expr()) {
        let normalized = normalize(&expr, &key_columns()).expect("non-key predicates normalize");
        let bytes = encode(&normalized).expect("normalized trees encode");

        prop_assert_eq!(decode(&bytes).expect("encoded trees decode"), normalized);
    }

    #[test]
    fn equal_trees_encode_identically(expr in arb_expr()) {
        let copy = expr.clone();

        prop_assert_eq!(
            encode(&expr).expect("tree encodes"),
            encode(&copy).expect("tree encodes")
        );
    }

    #[test]
    fn every_strict_prefix_fails_to_decode(expr in arb_expr()) {
        let bytes = encode(&expr).expect("tree encodes");

        for len in 0..bytes.len() {
            prop_assert!(decode(&bytes[..len]).is_err(), "prefix of {} bytes decoded", len);
        }
    }
}

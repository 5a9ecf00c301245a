//! Canonical JSON encoding for deterministic hashing.
//!
//! Every structure that feeds a digest goes through this encoder:
//! - Object keys sorted by code point (byte order of the UTF-8 key)
//! - No whitespace between tokens
//! - Strings escape only `"`, `\` and control characters; other code
//!   points are written as raw UTF-8
//! - Numbers have a single textual form: integral values print as integers
//!   (`1`, `1.0` and `1e0` all encode as `1`), other floats print in their
//!   shortest round-trip decimal form without exponent
//! - `true`, `false` and `null` as literals
//!
//! **CRITICAL**: EventHash values commit to these bytes. Changing any rule
//! invalidates every chain produced so far.

use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::{CoreError, Result};

/// Encode a JSON value to canonical bytes.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(256);
    write_value(&mut buf, value)?;
    Ok(buf)
}

/// Encode any serializable structure to canonical bytes.
///
/// The structure is first lowered to a [`Value`]; serializer failures
/// (for example a map keyed by something other than strings) surface as
/// [`CoreError::Canonicalization`].
pub fn canonicalize_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let value =
        serde_json::to_value(value).map_err(|e| CoreError::Canonicalization(e.to_string()))?;
    canonicalize(&value)
}

/// Build a JSON number from a float, rejecting NaN and infinities.
///
/// `serde_json` silently turns non-finite floats into `null`; payload code
/// that handles raw floats should go through here instead.
pub fn canonical_number(n: f64) -> Result<Value> {
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| CoreError::Canonicalization(format!("non-finite number: {n}")))
}

fn write_value(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Bool(true) => buf.extend_from_slice(b"true"),
        Value::Bool(false) => buf.extend_from_slice(b"false"),
        Value::Number(n) => write_number(buf, n)?,
        Value::String(s) => write_string(buf, s)?,
        Value::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_value(buf, item)?;
            }
            buf.push(b']');
        }
        Value::Object(map) => {
            // Sort explicitly: Map iteration order depends on serde_json features.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            buf.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_string(buf, key)?;
                buf.push(b':');
                write_value(buf, item)?;
            }
            buf.push(b'}');
        }
    }
    Ok(())
}

fn write_string(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    serde_json::to_writer(&mut *buf, s).map_err(|e| CoreError::Canonicalization(e.to_string()))
}

fn write_number(buf: &mut Vec<u8>, n: &Number) -> Result<()> {
    let text = if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else if let Some(f) = n.as_f64() {
        format_float(f)?
    } else {
        return Err(CoreError::Canonicalization(format!(
            "unrepresentable number: {n}"
        )));
    };
    buf.extend_from_slice(text.as_bytes());
    Ok(())
}

fn format_float(f: f64) -> Result<String> {
    if !f.is_finite() {
        return Err(CoreError::Canonicalization(format!(
            "non-finite number: {f}"
        )));
    }
    if f == 0.0 {
        // Covers -0.0
        return Ok("0".to_string());
    }
    if f.fract() == 0.0 {
        return Ok(format!("{f:.0}"));
    }
    Ok(format!("{f}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn canon(value: &Value) -> String {
        String::from_utf8(canonicalize(value).unwrap()).unwrap()
    }

    #[test]
    fn test_keys_sorted_no_whitespace() {
        let value = json!({"b": 1, "a": [true, false, null], "c": {"z": "x", "y": 2}});
        assert_eq!(
            canon(&value),
            r#"{"a":[true,false,null],"b":1,"c":{"y":2,"z":"x"}}"#
        );
    }

    #[test]
    fn test_insertion_order_ignored() {
        let mut first = serde_json::Map::new();
        first.insert("Symbol".into(), json!("USDJPY"));
        first.insert("EventID".into(), json!("e-1"));
        let mut second = serde_json::Map::new();
        second.insert("EventID".into(), json!("e-1"));
        second.insert("Symbol".into(), json!("USDJPY"));

        assert_eq!(
            canonicalize(&Value::Object(first)).unwrap(),
            canonicalize(&Value::Object(second)).unwrap()
        );
    }

    #[test]
    fn test_sequence_order_preserved() {
        assert_ne!(canon(&json!([1, 2])), canon(&json!([2, 1])));
    }

    #[test]
    fn test_key_order_is_code_point_order() {
        let value = json!({"a": 1, "B": 2, "é": 3, "_": 4});
        assert_eq!(canon(&value), r#"{"B":2,"_":4,"a":1,"é":3}"#);
    }

    #[test]
    fn test_numbers_single_form() {
        assert_eq!(canon(&json!(1)), "1");
        assert_eq!(canon(&json!(1.0)), "1");
        assert_eq!(canon(&json!(-0.0)), "0");
        assert_eq!(canon(&json!(0.85)), "0.85");
        assert_eq!(canon(&json!(-12.5)), "-12.5");
        assert_eq!(canon(&json!(1736870400000i64)), "1736870400000");
        assert_eq!(canon(&json!(u64::MAX)), "18446744073709551615");

        let parsed: Value = serde_json::from_str("1e2").unwrap();
        assert_eq!(canon(&parsed), "100");
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(canon(&json!("a\"b\\c")), r#""a\"b\\c""#);
        assert_eq!(canon(&json!("line\nbreak\ttab")), r#""line\nbreak\ttab""#);
        assert_eq!(canon(&json!("\u{1}")), r#""\u0001""#);
        // Non-ASCII stays raw UTF-8
        assert_eq!(canon(&json!("円")), "\"円\"");
        assert_eq!(canon(&json!("/")), "\"/\"");
    }

    #[test]
    fn test_idempotent_on_canonical_form() {
        let value = json!({"z": [1.5, {"b": null, "a": "é"}], "a": 10.0});
        let first = canonicalize(&value).unwrap();
        let reparsed: Value = serde_json::from_slice(&first).unwrap();
        let second = canonicalize(&reparsed).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(matches!(
            canonical_number(f64::NAN),
            Err(CoreError::Canonicalization(_))
        ));
        assert!(matches!(
            canonical_number(f64::INFINITY),
            Err(CoreError::Canonicalization(_))
        ));
        assert_eq!(canonical_number(2.5).unwrap(), json!(2.5));
    }

    #[test]
    fn test_non_string_keys_rejected() {
        let mut map: BTreeMap<Vec<u8>, u32> = BTreeMap::new();
        map.insert(vec![1, 2], 3);
        assert!(matches!(
            canonicalize_serialize(&map),
            Err(CoreError::Canonicalization(_))
        ));
    }

    #[test]
    fn test_serialize_matches_value() {
        #[derive(Serialize)]
        struct Vote {
            direction: &'static str,
            confidence: f64,
        }
        let bytes = canonicalize_serialize(&Vote {
            direction: "BUY",
            confidence: 0.75,
        })
        .unwrap();
        assert_eq!(bytes, br#"{"confidence":0.75,"direction":"BUY"}"#.to_vec());
    }

    proptest! {
        #[test]
        fn test_entry_order_never_changes_bytes(
            entries in prop::collection::btree_map("[a-zA-Z]{1,8}", any::<i64>(), 0..12)
        ) {
            let forward: serde_json::Map<String, Value> =
                entries.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let reverse: serde_json::Map<String, Value> =
                entries.iter().rev().map(|(k, v)| (k.clone(), json!(v))).collect();

            prop_assert_eq!(
                canonicalize(&Value::Object(forward)).unwrap(),
                canonicalize(&Value::Object(reverse)).unwrap()
            );
        }

        #[test]
        fn test_float_roundtrip_is_stable(f in -1.0e12f64..1.0e12f64) {
            let first = canonicalize(&canonical_number(f).unwrap()).unwrap();
            let reparsed: Value = serde_json::from_slice(&first).unwrap();
            prop_assert_eq!(first, canonicalize(&reparsed).unwrap());
        }
    }
}

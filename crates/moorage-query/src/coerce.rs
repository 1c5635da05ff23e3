//! Scalar coercion between the generic (JSON) and native (BSON) domains.
//!
//! Identifier coercion never fails: anything that does not look like an
//! ObjectId passes through so the store can report its own validation
//! error. Structured values go through a `Result` and the caller's
//! [`CoercionPolicy`] decides whether a failure keeps the original value or
//! surfaces.

use crate::error::CoercionError;
use crate::options::CoercionPolicy;
use bson::oid::ObjectId;
use bson::Bson;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{trace, warn};

/// Textual form of a native identifier: 24 hex characters, either case.
static OBJECT_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-fA-F0-9]{24}$").unwrap());

/// Check whether text has the shape of a native identifier
pub fn looks_like_object_id(text: &str) -> bool {
    OBJECT_ID_RE.is_match(text)
}

/// Convert identifier text into a native `ObjectId`.
///
/// Values that are already native identifiers, strings of any other shape
/// and non-string values are returned unchanged, which makes the coercion
/// idempotent.
pub fn coerce_identifier(value: Bson) -> Bson {
    if let Bson::String(text) = &value {
        if looks_like_object_id(text) {
            if let Ok(oid) = ObjectId::parse_str(text) {
                trace!(id = %oid, "coerced identifier");
                return Bson::ObjectId(oid);
            }
        }
    }
    value
}

/// Convert a generic identifier value, e.g. a filter operand or a record's `id`.
pub fn identifier_to_native(attribute: &str, value: &Value) -> Result<Bson, CoercionError> {
    to_native(attribute, value).map(coerce_identifier)
}

/// Plain conversion of a generic value into its native encoding.
///
/// Integers become `Int64`, other numbers `Double`, objects documents.
/// Objects written in extended JSON are decoded on the way, so
/// `{"$oid": "<hex>"}` lands as an `ObjectId` and `{"$date": ..}` as a
/// datetime. The only failure is an unsigned integer beyond the native
/// 64-bit signed range, which is rejected rather than silently rounded.
pub fn to_native(attribute: &str, value: &Value) -> Result<Bson, CoercionError> {
    bson::to_bson(value).map_err(|e| CoercionError::InvalidNative {
        attribute: attribute.to_string(),
        reason: e.to_string(),
    })
}

/// [`to_native`] under `policy`.
///
/// With [`CoercionPolicy::Permissive`] integers beyond the signed 64-bit
/// range are stored as their decimal text and a warning is logged; with
/// [`CoercionPolicy::Strict`] the conversion error is returned.
pub fn coerce_native(
    attribute: &str,
    value: &Value,
    policy: CoercionPolicy,
) -> Result<Bson, CoercionError> {
    match to_native(attribute, value) {
        Ok(native) => Ok(native),
        Err(err) => match policy {
            CoercionPolicy::Strict => Err(err),
            CoercionPolicy::Permissive => {
                warn!(attribute, error = %err, "storing out-of-range integers as text");
                let widened = out_of_range_as_text(value);
                Ok(bson::to_bson(&widened).unwrap_or_else(|_| Bson::String(value.to_string())))
            }
        },
    }
}

/// Identifier coercion of a value being written, under `policy`
pub fn coerce_identifier_under(
    attribute: &str,
    value: &Value,
    policy: CoercionPolicy,
) -> Result<Bson, CoercionError> {
    coerce_native(attribute, value, policy).map(coerce_identifier)
}

fn out_of_range_as_text(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.as_i64().is_none() && n.as_u64().is_some() => {
            Value::String(n.to_string())
        }
        Value::Array(items) => Value::Array(items.iter().map(out_of_range_as_text).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), out_of_range_as_text(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Parse a structured value into its native form.
///
/// Text is treated as JSON and parsed; values that already arrived
/// structured are converted directly.
pub fn try_parse_structured(attribute: &str, raw: &Value) -> Result<Bson, CoercionError> {
    match raw {
        Value::String(text) => {
            let parsed: Value =
                serde_json::from_str(text).map_err(|e| CoercionError::InvalidJson {
                    attribute: attribute.to_string(),
                    reason: e.to_string(),
                })?;
            to_native(attribute, &parsed)
        }
        other => to_native(attribute, other),
    }
}

/// Coerce a structured value under `policy`.
///
/// With [`CoercionPolicy::Permissive`] a value that fails to parse is stored
/// exactly as given and a warning is logged; with
/// [`CoercionPolicy::Strict`] the parse error is returned.
pub fn coerce_structured(
    attribute: &str,
    raw: &Value,
    policy: CoercionPolicy,
) -> Result<Bson, CoercionError> {
    match try_parse_structured(attribute, raw) {
        Ok(native) => Ok(native),
        Err(err) => match policy {
            CoercionPolicy::Strict => Err(err),
            CoercionPolicy::Permissive => {
                warn!(attribute, error = %err, "storing structured value unparsed");
                coerce_native(attribute, raw, CoercionPolicy::Permissive)
            }
        },
    }
}

/// Convert a native value back into the generic domain.
///
/// Identifiers become their 24-character hex text at any depth; everything
/// else follows relaxed extended JSON.
pub fn to_generic(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::Array(items) => Value::Array(items.into_iter().map(to_generic).collect()),
        Bson::Document(doc) => Value::Object(
            doc.into_iter()
                .map(|(key, value)| (key, to_generic(value)))
                .collect(),
        ),
        other => other.into_relaxed_extjson(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde_json::json;
    use test_case::test_case;

    const HEX: &str = "507f1f77bcf86cd799439011";

    #[test]
    fn test_coerce_identifier_hex() {
        let coerced = coerce_identifier(Bson::String(HEX.to_string()));
        assert_eq!(coerced, Bson::ObjectId(ObjectId::parse_str(HEX).unwrap()));
    }

    #[test]
    fn test_coerce_identifier_uppercase_hex() {
        let coerced = coerce_identifier(Bson::String(HEX.to_uppercase()));
        assert_eq!(coerced, Bson::ObjectId(ObjectId::parse_str(HEX).unwrap()));
    }

    #[test_case("not-an-id" ; "free text")]
    #[test_case("507f1f77bcf86cd79943901" ; "23 chars")]
    #[test_case("507f1f77bcf86cd7994390111" ; "25 chars")]
    #[test_case("507f1f77bcf86cd79943901z" ; "non hex")]
    #[test_case("" ; "empty")]
    fn test_coerce_identifier_passthrough(text: &str) {
        let value = Bson::String(text.to_string());
        assert_eq!(coerce_identifier(value.clone()), value);
    }

    #[test]
    fn test_coerce_identifier_non_string_passthrough() {
        assert_eq!(coerce_identifier(Bson::Int64(7)), Bson::Int64(7));
        assert_eq!(coerce_identifier(Bson::Null), Bson::Null);
    }

    #[test]
    fn test_coerce_identifier_idempotent() {
        let once = coerce_identifier(Bson::String(HEX.to_string()));
        let twice = coerce_identifier(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_identifier_to_native() {
        let native = identifier_to_native("id", &json!(HEX)).unwrap();
        assert!(matches!(native, Bson::ObjectId(_)));

        let native = identifier_to_native("id", &json!(12)).unwrap();
        assert_eq!(native, Bson::Int64(12));
    }

    #[test]
    fn test_to_native_shapes() {
        let native = to_native("meta", &json!({ "a": [1, 2.5, "x", null, true] })).unwrap();
        assert_eq!(
            native,
            Bson::Document(doc! { "a": [1_i64, 2.5, "x", null, true] })
        );
    }

    #[test]
    fn test_to_native_rejects_unsigned_overflow() {
        let err = to_native("big", &json!(u64::MAX)).unwrap_err();
        assert!(matches!(err, CoercionError::InvalidNative { .. }));
    }

    #[test]
    fn test_to_native_decodes_extended_json() {
        let native = to_native("other", &json!({ "$oid": HEX })).unwrap();
        assert_eq!(native, Bson::ObjectId(ObjectId::parse_str(HEX).unwrap()));
    }

    #[test]
    fn test_coerce_native_permissive_keeps_big_integers_as_text() {
        let value = json!({ "count": u64::MAX, "small": [1, u64::MAX] });
        let native = coerce_native("meta", &value, CoercionPolicy::Permissive).unwrap();

        let max = u64::MAX.to_string();
        assert_eq!(
            native,
            Bson::Document(doc! { "count": max.as_str(), "small": [1_i64, max.as_str()] })
        );
    }

    #[test]
    fn test_coerce_native_strict_rejects_big_integers() {
        let result = coerce_native("meta", &json!(u64::MAX), CoercionPolicy::Strict);
        assert!(matches!(result, Err(CoercionError::InvalidNative { .. })));
    }

    #[test]
    fn test_coerce_identifier_under_policy() {
        let native = coerce_identifier_under("id", &json!(HEX), CoercionPolicy::Strict).unwrap();
        assert!(matches!(native, Bson::ObjectId(_)));

        let native =
            coerce_identifier_under("id", &json!(u64::MAX), CoercionPolicy::Permissive).unwrap();
        assert_eq!(native, Bson::String(u64::MAX.to_string()));
    }

    #[test]
    fn test_permissive_structured_object_with_big_integer() {
        let raw = json!({ "limit": u64::MAX });
        let native = coerce_structured("settings", &raw, CoercionPolicy::Permissive).unwrap();
        assert_eq!(
            native,
            Bson::Document(doc! { "limit": u64::MAX.to_string() })
        );

        let result = coerce_structured("settings", &raw, CoercionPolicy::Strict);
        assert!(matches!(result, Err(CoercionError::InvalidNative { .. })));
    }

    #[test]
    fn test_parse_structured_text() {
        let native = try_parse_structured("tags", &json!("[\"a\",\"b\"]")).unwrap();
        assert_eq!(native, Bson::Array(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_parse_structured_already_structured() {
        let native = try_parse_structured("settings", &json!({ "theme": "dark" })).unwrap();
        assert_eq!(native, Bson::Document(doc! { "theme": "dark" }));
    }

    #[test]
    fn test_parse_structured_invalid_text() {
        let err = try_parse_structured("settings", &json!("{not valid json")).unwrap_err();
        assert!(matches!(err, CoercionError::InvalidJson { .. }));
    }

    #[test]
    fn test_permissive_keeps_original_text() {
        let raw = json!("{not valid json");
        let native = coerce_structured("settings", &raw, CoercionPolicy::Permissive).unwrap();
        assert_eq!(native, Bson::String("{not valid json".to_string()));
    }

    #[test]
    fn test_strict_surfaces_error() {
        let raw = json!("{not valid json");
        let result = coerce_structured("settings", &raw, CoercionPolicy::Strict);
        assert!(matches!(result, Err(CoercionError::InvalidJson { .. })));
    }

    #[test]
    fn test_to_generic_identifiers_at_depth() {
        let oid = ObjectId::parse_str(HEX).unwrap();
        let generic = to_generic(Bson::Document(doc! {
            "owner": oid,
            "friends": [oid],
            "age": 4_i64,
        }));

        assert_eq!(
            generic,
            json!({ "owner": HEX, "friends": [HEX], "age": 4 })
        );
    }
}

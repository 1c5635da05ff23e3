//! Document normalization between generic records and stored documents.
//!
//! Writes move the generic primary key into the native key field (coerced
//! to an ObjectId when it looks like one) and parse `json` attributes from
//! their textual form. Reads undo the key move and turn native values back
//! into plain JSON.

use crate::coerce::{coerce_identifier_under, coerce_native, coerce_structured, to_generic};
use crate::error::TranslateResult;
use crate::options::TranslateOptions;
use crate::schema::{AttributeType, ModelSchema};
use bson::{Bson, Document};
use serde_json::{Map, Value};
use tracing::debug;

/// A generic record: attribute name to value
pub type Record = Map<String, Value>;

/// Normalize a generic record for writing.
///
/// 1. The primary key, if present and not `null`, is identifier-coerced and
///    stored first under the native key. A missing key lets the store assign
///    one; a key that is not a plausible ObjectId is kept as given.
/// 2. Each remaining attribute is converted according to its declared type:
///    `json` attributes are parsed, `ref` attributes are identifier-coerced,
///    everything else (including attributes the schema does not declare) is
///    converted by [`to_native`](crate::coerce::to_native), which decodes
///    extended-JSON objects such as `{"$oid": ..}`.
///
/// Every conversion runs under the configured coercion policy, so a
/// permissive write keeps values it cannot convert instead of failing.
pub fn normalize_for_write(
    mut record: Record,
    schema: &ModelSchema,
    options: &TranslateOptions,
) -> TranslateResult<Document> {
    let mut native = Document::new();

    if let Some(id) = record.remove(&schema.primary_key) {
        if !id.is_null() {
            native.insert(
                options.native_key.as_str(),
                coerce_identifier_under(&schema.primary_key, &id, options.coercion)?,
            );
        }
    }

    for (attribute, value) in record {
        let declared = schema.attribute_type(&attribute);
        let coerced = coerce_attribute(&attribute, &value, declared, options)?;
        native.insert(attribute, coerced);
    }

    debug!(fields = native.len(), "normalized record for write");
    Ok(native)
}

fn coerce_attribute(
    attribute: &str,
    value: &Value,
    declared: Option<AttributeType>,
    options: &TranslateOptions,
) -> TranslateResult<Bson> {
    let native = match declared {
        Some(AttributeType::Json) => coerce_structured(attribute, value, options.coercion)?,
        Some(AttributeType::Ref) => coerce_identifier_under(attribute, value, options.coercion)?,
        _ => coerce_native(attribute, value, options.coercion)?,
    };
    Ok(native)
}

/// Turn a stored document back into a generic record.
///
/// The native key is renamed to the model's primary key; identifiers come
/// back as hex text.
pub fn normalize_for_read(
    document: Document,
    schema: &ModelSchema,
    options: &TranslateOptions,
) -> Record {
    document
        .into_iter()
        .map(|(field, value)| {
            let attribute = if field == options.native_key {
                schema.primary_key.clone()
            } else {
                field
            };
            (attribute, to_generic(value))
        })
        .collect()
}

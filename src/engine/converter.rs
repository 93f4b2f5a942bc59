use serde_json::{Number, Value};
use crate::document::{into_document, Document};
use crate::Result;

/// Serializes a document to its on-disk text form.
pub fn to_text(document: &Document) -> Result<String> {
    Ok(serde_json::to_string(document)?)
}

/// Parses the on-disk text form back into a document.
pub fn to_document(text: &str) -> Result<Document> {
    let value: Value = serde_json::from_str(text)?;
    into_document(value, "stored document")
}

/// Canonical string form of a value.
///
/// Object keys are emitted in sorted order and integral floats are written as
/// integers, so two values that compare equal produce the same string. Used
/// for cache keys, hash-index keys and group keys.
pub fn canonical(value: &Value) -> String {
    normalize(value).to_string()
}

/// Canonical string form of a query mapping.
pub fn canonical_query(query: &Document) -> String {
    canonical(&Value::Object(query.clone()))
}

/// Equality used by queries and `$match`: deep structural equality where
/// `1` and `1.0` are the same number.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    normalize(a) == normalize(b)
}

fn normalize(value: &Value) -> Value {
    match value {
        Value::Number(n) => normalize_number(n),
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), normalize(v))).collect())
        }
        other => other.clone(),
    }
}

// 2^63 and 2^64; both bounds are exclusive since `as` saturates.
const I64_END: f64 = 9.223_372_036_854_775_808e18;
const U64_END: f64 = 1.844_674_407_370_955_161_6e19;

fn normalize_number(n: &Number) -> Value {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 {
                if (-I64_END..I64_END).contains(&f) {
                    return Value::from(f as i64);
                }
                if (I64_END..U64_END).contains(&f) {
                    return Value::from(f as u64);
                }
            }
        }
    }
    Value::Number(n.clone())
}

/// Converts an `f64` result into a JSON number, keeping integral values integral.
pub fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

//! Recovers the structured record from a model response.
//!
//! Small local models rarely answer with bare JSON; they wrap it in prose or
//! code fences. We take everything from the first `{` to the last `}` and
//! decode that.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

/// Field values as extracted by the model. Every field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedFields {
    #[serde(deserialize_with = "lenient_string")]
    pub document_type: String,
    #[serde(deserialize_with = "lenient_string")]
    pub invoice_number: String,
    #[serde(deserialize_with = "lenient_string")]
    pub issue_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub due_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub buyer: String,
    #[serde(deserialize_with = "lenient_string")]
    pub seller: String,
    #[serde(deserialize_with = "lenient_string")]
    pub total_amount_usd: String,
    #[serde(deserialize_with = "lenient_string")]
    pub vessel_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub bbl_quantity: String,
    #[serde(deserialize_with = "lenient_string")]
    pub bl_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub port_of_loading: String,
    #[serde(deserialize_with = "lenient_string")]
    pub port_of_discharge: String,
    #[serde(deserialize_with = "lenient_string")]
    pub suggested_filename: String,
    /// Keys the model returned beyond the known fields, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keys owned by [`crate::pipeline::ExtractedRecord`] itself.
const RESERVED_KEYS: &[&str] = &["chunk_id", "pages"];

/// Models often emit amounts and quantities as bare numbers.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar, found {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
        _ => "a scalar",
    }
}

/// Locate the greedy `{ ... }` span and decode it as a JSON object.
pub fn extract_json_object(raw: &str) -> AppResult<Value> {
    let start = raw.find('{');
    let end = raw.rfind('}');

    let json_str = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            return Err(AppError::ExtractionParse(
                "no JSON object found in response".to_string(),
            ))
        }
    };

    serde_json::from_str(json_str)
        .map_err(|e| AppError::ExtractionParse(format!("invalid JSON: {}", e)))
}

pub fn parse_fields(raw: &str) -> AppResult<ExtractedFields> {
    let value = extract_json_object(raw)?;
    if value.as_object().is_some_and(|m| m.is_empty()) {
        return Err(AppError::ExtractionParse(
            "response contained an empty object".to_string(),
        ));
    }
    let mut fields: ExtractedFields = serde_json::from_value(value)
        .map_err(|e| AppError::ExtractionParse(format!("unexpected field shape: {}", e)))?;
    fields.extra.retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()));
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_object_inside_noise() {
        let value = extract_json_object("noise {\"a\":1} more noise").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn no_braces_is_an_error() {
        let err = extract_json_object("I could not read this document.").unwrap_err();
        assert!(matches!(err, AppError::ExtractionParse(_)));
    }

    #[test]
    fn closing_before_opening_is_an_error() {
        assert!(extract_json_object("} nothing {").is_err());
    }

    #[test]
    fn span_is_greedy() {
        // Two objects: the greedy span covers both and is not valid JSON.
        assert!(extract_json_object("{\"a\":1} and {\"b\":2}").is_err());
        let nested = extract_json_object("x {\"a\":{\"b\":2}} y").unwrap();
        assert_eq!(nested["a"]["b"], 2);
    }

    #[test]
    fn unquoted_keys_are_rejected() {
        assert!(extract_json_object("{document_type: Invoice}").is_err());
    }

    #[test]
    fn parses_fenced_response() {
        let raw = r#"Here is the result:
```json
{
  "document_type": "Invoice",
  "invoice_number": "INV-2024-117",
  "total_amount_usd": 1250000.5,
  "bbl_quantity": 20000,
  "due_date": null,
  "suggested_filename": "Invoice INV-2024-117",
  "confidence": "high"
}
```"#;
        let fields = parse_fields(raw).unwrap();
        assert_eq!(fields.document_type, "Invoice");
        assert_eq!(fields.invoice_number, "INV-2024-117");
        assert_eq!(fields.total_amount_usd, "1250000.5");
        assert_eq!(fields.bbl_quantity, "20000");
        assert_eq!(fields.due_date, "");
        assert_eq!(fields.vessel_name, "");
        assert_eq!(fields.extra.get("confidence"), Some(&json!("high")));
    }

    #[test]
    fn empty_object_is_an_error() {
        let err = parse_fields("Nothing found: {}").unwrap_err();
        assert!(matches!(err, AppError::ExtractionParse(ref m) if m.contains("empty object")));
    }

    #[test]
    fn extra_keys_cannot_shadow_record_keys() {
        let fields = parse_fields(r#"{"chunk_id": 99, "pages": [1], "notes": "torn"}"#).unwrap();
        assert_eq!(fields.extra.len(), 1);
        assert_eq!(fields.extra["notes"], "torn");
    }

    #[test]
    fn nested_field_value_is_rejected() {
        let err = parse_fields(r#"{"buyer": {"name": "Acme"}}"#).unwrap_err();
        assert!(err.to_string().contains("unexpected field shape"));
    }
}

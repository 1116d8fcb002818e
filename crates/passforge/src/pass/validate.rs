//! Structural validation of an assembled `pass.json`.

use crate::{Error, Result};
use serde_json::{Map, Value};

/// The five pass style keys; exactly one must be present.
pub const STYLE_KEYS: &[&str] = &["storeCard", "coupon", "eventTicket", "boardingPass", "generic"];

/// Field arrays a style object may carry.
pub const FIELD_GROUPS: &[&str] = &[
    "headerFields",
    "primaryFields",
    "secondaryFields",
    "auxiliaryFields",
    "backFields",
];

/// Top-level keys that must be present and non-empty.
pub const REQUIRED_KEYS: &[&str] = &[
    "formatVersion",
    "passTypeIdentifier",
    "serialNumber",
    "teamIdentifier",
    "organizationName",
    "description",
];

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Check that `pass.json` declares the certificate's identifier.
///
/// # Errors
///
/// Returns [`Error::PassTypeIdMismatch`] when the document's
/// `passTypeIdentifier` is not exactly `expected`.
pub fn ensure_pass_type_identifier(pass: &Map<String, Value>, expected: &str) -> Result<()> {
    match pass.get("passTypeIdentifier") {
        Some(Value::String(found)) if found == expected => Ok(()),
        other => Err(Error::PassTypeIdMismatch {
            expected: expected.to_string(),
            found: match other {
                Some(Value::String(s)) => s.clone(),
                Some(value) => value.to_string(),
                None => String::new(),
            },
        }),
    }
}

/// Validate the structure of `pass` and return its style key.
///
/// # Errors
///
/// - [`Error::MissingRequiredField`] for an absent or empty mandatory key
/// - [`Error::InvalidStyleObjectCount`] unless exactly one style key is present
/// - [`Error::TemplateInvalid`] for a style value that is not an object, or a
///   field group that is not an array of objects
/// - [`Error::EmptyFieldValue`] for a field with an empty `label` or `value`
pub fn validate_pass(pass: &Map<String, Value>) -> Result<&'static str> {
    for key in REQUIRED_KEYS {
        if pass.get(*key).map_or(true, is_blank) {
            return Err(Error::MissingRequiredField((*key).to_string()));
        }
    }

    let styles: Vec<&'static str> = STYLE_KEYS
        .iter()
        .copied()
        .filter(|key| pass.contains_key(*key))
        .collect();
    let style = match styles.as_slice() {
        [style] => *style,
        _ => {
            return Err(Error::InvalidStyleObjectCount {
                found: styles.iter().map(|s| s.to_string()).collect(),
            })
        }
    };

    let style_object = pass
        .get(style)
        .and_then(Value::as_object)
        .ok_or_else(|| Error::TemplateInvalid(format!("{} must be an object", style)))?;

    for group in FIELD_GROUPS {
        let Some(fields) = style_object.get(*group) else {
            continue;
        };
        let fields = fields
            .as_array()
            .ok_or_else(|| Error::TemplateInvalid(format!("{}.{} must be an array", style, group)))?;

        for (index, field) in fields.iter().enumerate() {
            let field = field.as_object().ok_or_else(|| {
                Error::TemplateInvalid(format!("{}.{}[{}] must be an object", style, group, index))
            })?;
            for attribute in ["label", "value"] {
                if field.get(attribute).is_some_and(is_blank) {
                    return Err(Error::EmptyFieldValue {
                        style: style.to_string(),
                        group: (*group).to_string(),
                        index,
                        attribute,
                    });
                }
            }
        }
    }

    Ok(style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pass(extra: Value) -> Map<String, Value> {
        let mut base = json!({
            "formatVersion": 1,
            "passTypeIdentifier": "pass.com.example.alpha",
            "serialNumber": "S1",
            "teamIdentifier": "ALPHA12345",
            "organizationName": "Example",
            "description": "Card"
        });
        if let (Value::Object(base), Value::Object(extra)) = (&mut base, extra) {
            base.extend(extra);
        }
        match base {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_valid_pass_returns_style() {
        let doc = pass(json!({
            "storeCard": {
                "primaryFields": [{ "key": "balance", "label": "Balance", "value": 0 }],
                "backFields": [{ "key": "terms", "value": "No refunds" }]
            }
        }));
        assert_eq!(validate_pass(&doc).unwrap(), "storeCard");
    }

    #[test]
    fn test_missing_required_field() {
        let mut doc = pass(json!({ "generic": {} }));
        doc.insert("description".into(), json!("  "));
        match validate_pass(&doc) {
            Err(Error::MissingRequiredField(key)) => assert_eq!(key, "description"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_two_styles() {
        let doc = pass(json!({ "storeCard": {}, "generic": {} }));
        match validate_pass(&doc) {
            Err(Error::InvalidStyleObjectCount { found }) => {
                assert_eq!(found, vec!["storeCard", "generic"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_no_style() {
        let doc = pass(json!({}));
        assert!(matches!(
            validate_pass(&doc),
            Err(Error::InvalidStyleObjectCount { found }) if found.is_empty()
        ));
    }

    #[test]
    fn test_empty_label() {
        let doc = pass(json!({
            "eventTicket": {
                "secondaryFields": [
                    { "key": "seat", "label": "Seat", "value": "12A" },
                    { "key": "gate", "label": "", "value": "B" }
                ]
            }
        }));
        match validate_pass(&doc) {
            Err(Error::EmptyFieldValue { style, group, index, attribute }) => {
                assert_eq!(style, "eventTicket");
                assert_eq!(group, "secondaryFields");
                assert_eq!(index, 1);
                assert_eq!(attribute, "label");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_null_value_is_empty() {
        let doc = pass(json!({
            "coupon": { "auxiliaryFields": [{ "key": "k", "label": "L", "value": null }] }
        }));
        assert!(matches!(
            validate_pass(&doc),
            Err(Error::EmptyFieldValue { attribute: "value", .. })
        ));
    }

    #[test]
    fn test_field_group_must_be_array() {
        let doc = pass(json!({ "generic": { "primaryFields": { "key": "x" } } }));
        assert!(matches!(validate_pass(&doc), Err(Error::TemplateInvalid(_))));
    }

    #[test]
    fn test_pass_type_identifier_mismatch() {
        let doc = pass(json!({}));
        assert!(ensure_pass_type_identifier(&doc, "pass.com.example.alpha").is_ok());
        match ensure_pass_type_identifier(&doc, "pass.com.example.beta") {
            Err(Error::PassTypeIdMismatch { expected, found }) => {
                assert_eq!(expected, "pass.com.example.beta");
                assert_eq!(found, "pass.com.example.alpha");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

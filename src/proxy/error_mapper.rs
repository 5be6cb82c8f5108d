//! Projection of upstream OData error bodies onto the proxy's envelope.

use crate::core::catalog::EntityCatalog;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

static PROPERTY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"property named '([^']+)'").expect("property pattern compiles"));

/// Build the error envelope returned alongside the upstream status.
///
/// `error` carries the upstream `error.message` when the body parses as
/// JSON with that shape, otherwise the raw body text. A `property named
/// '<X>'` match upgrades the suggestion and pins `invalidField`.
pub fn upstream_error_body(
    status: u16,
    body: &[u8],
    entity: &str,
    catalog: &EntityCatalog,
) -> Value {
    let text = String::from_utf8_lossy(body);
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|parsed| {
            parsed
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
        })
        .unwrap_or_else(|| text.to_string());

    let mut envelope = json!({
        "error": message,
        "status": status,
        "entity": entity,
        "suggestion": "Check the query against availableFields for this entity.",
        "availableFields": catalog.fields_for(entity),
    });

    if let Some(caps) = PROPERTY_RE.captures(&text) {
        let field = caps[1].to_string();
        envelope["suggestion"] = Value::String(format!(
            "The field '{}' does not exist on {}.",
            field, entity
        ));
        envelope["invalidField"] = Value::String(field);
    }

    envelope
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::CATALOG;

    #[test]
    fn structured_error_message_is_extracted() {
        let body = br#"{"error":{"code":"400","message":"Bad request syntax"}}"#;
        let got = upstream_error_body(400, body, "Units", &CATALOG);
        assert_eq!(got["error"], "Bad request syntax");
        assert_eq!(got["status"], 400);
        assert_eq!(got["entity"], "Units");
        assert!(got.get("invalidField").is_none());
    }

    #[test]
    fn raw_bodies_are_passed_through_as_the_message() {
        let got = upstream_error_body(500, b"<html>boom</html>", "Units", &CATALOG);
        assert_eq!(got["error"], "<html>boom</html>");
    }

    #[test]
    fn unknown_property_is_surfaced_with_a_suggestion() {
        let body = br#"{"error":{"message":"Could not find a property named 'Foo' on type 'Bloxs.Unit'."}}"#;
        let got = upstream_error_body(400, body, "Units", &CATALOG);
        assert_eq!(got["invalidField"], "Foo");
        assert_eq!(got["suggestion"], "The field 'Foo' does not exist on Units.");
        assert_eq!(
            got["availableFields"],
            json!(CATALOG.fields_for("Units"))
        );
    }

    #[test]
    fn property_pattern_is_case_sensitive() {
        let got = upstream_error_body(400, b"Property Named 'Foo'", "Units", &CATALOG);
        assert!(got.get("invalidField").is_none());
    }
}

//! Query-string sanitisation against the entity catalog.
//!
//! Pure string rewriting: `$top` is capped, `$orderby` is whitelisted,
//! every other parameter passes through byte-for-byte in its original
//! position. No network calls happen here.

use crate::core::catalog::EntityCatalog;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Escaped when re-encoding a rewritten parameter value.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'?');

#[derive(Debug)]
pub struct SanitizedQuery {
    /// `?`-prefixed rewritten query, or empty when no parameters remain.
    pub query: String,
    /// Whether a `$filter` parameter survived sanitisation.
    pub has_filter: bool,
}

pub fn sanitize_query(entity: Option<&str>, raw: &str, catalog: &EntityCatalog) -> SanitizedQuery {
    let entity = entity.unwrap_or("");
    let mut kept: Vec<String> = Vec::new();
    let mut has_filter = false;

    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = match pair.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (pair, None),
        };

        match decode_component(raw_key).as_str() {
            "$top" => {
                let value = raw_value.map(decode_component).unwrap_or_default();
                if let Some(capped) = cap_top(&value, catalog.top_cap_for(entity)) {
                    kept.push(format!("{}={}", raw_key, capped));
                }
            }
            "$orderby" => {
                let value = raw_value.map(decode_component).unwrap_or_default();
                if let Some(rewritten) = rewrite_orderby(&value, catalog.fields_for(entity)) {
                    kept.push(format!("{}={}", raw_key, encode_component(&rewritten)));
                }
            }
            key => {
                if key == "$filter" {
                    has_filter = true;
                }
                kept.push(pair.to_string());
            }
        }
    }

    let query = if kept.is_empty() {
        String::new()
    } else {
        format!("?{}", kept.join("&"))
    };
    SanitizedQuery { query, has_filter }
}

/// Cap a positive `$top` at the entity's limit; anything else drops it.
fn cap_top(value: &str, cap: u32) -> Option<u32> {
    match value.trim().parse::<i64>() {
        Ok(t) if t > 0 => Some((t as u64).min(cap as u64) as u32),
        _ => None,
    }
}

/// Rewrite `$orderby` so every field is a known sortable field in its
/// canonical spelling and every direction is either implicit or `desc`.
/// Returns None when the parameter should be deleted outright.
fn rewrite_orderby(value: &str, fields: &[&'static str]) -> Option<String> {
    if fields.is_empty() {
        return None;
    }

    let mut kept: Vec<String> = Vec::new();
    for segment in value.split(',') {
        let mut tokens = segment.split_whitespace();
        let name = match tokens.next() {
            Some(n) => n,
            None => continue,
        };
        let canonical = match fields.iter().find(|f| f.eq_ignore_ascii_case(name)) {
            Some(c) => *c,
            None => continue,
        };
        let descending = tokens
            .next()
            .map(|d| d.eq_ignore_ascii_case("desc"))
            .unwrap_or(false);
        if descending {
            kept.push(format!("{} desc", canonical));
        } else {
            kept.push(canonical.to_string());
        }
    }

    if kept.is_empty() {
        let safe = fields
            .iter()
            .find(|f| f.ends_with("Id") || **f == "Reference")
            .unwrap_or(&fields[0]);
        let descending = value.to_lowercase().contains("desc");
        return Some(if descending {
            format!("{} desc", safe)
        } else {
            (*safe).to_string()
        });
    }
    Some(kept.join(", "))
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    percent_decode_str(&raw).decode_utf8_lossy().into_owned()
}

fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, QUERY_VALUE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::CATALOG;

    fn sanitize(entity: &str, raw: &str) -> SanitizedQuery {
        sanitize_query(Some(entity), raw, &CATALOG)
    }

    #[test]
    fn top_is_capped_to_the_entity_limit() {
        let got = sanitize(
            "FinancialMutations",
            "$filter=FinancialYear%20eq%202025&$top=500",
        );
        assert_eq!(got.query, "?$filter=FinancialYear%20eq%202025&$top=100");
        assert!(got.has_filter);
    }

    #[test]
    fn top_below_the_cap_is_untouched() {
        let got = sanitize("Units", "$top=50");
        assert_eq!(got.query, "?$top=50");
    }

    #[test]
    fn unparseable_top_is_dropped_silently() {
        assert_eq!(sanitize("Units", "$top=0").query, "");
        assert_eq!(sanitize("Units", "$top=-5").query, "");
        assert_eq!(sanitize("Units", "$top=abc").query, "");
        assert_eq!(sanitize("Units", "$top=1.5").query, "");
        assert_eq!(sanitize("Units", "a=1&$top=abc&b=2").query, "?a=1&b=2");
    }

    #[test]
    fn unknown_entity_uses_the_default_cap() {
        assert_eq!(sanitize("Widgets", "$top=900").query, "?$top=500");
    }

    #[test]
    fn invalid_orderby_segments_are_dropped() {
        let got = sanitize("Units", "$orderby=Foo%20desc,UnitId%20asc");
        assert_eq!(got.query, "?$orderby=UnitId");
    }

    #[test]
    fn orderby_canonicalises_case_and_keeps_desc() {
        let got = sanitize("Units", "$orderby=unitid%20DESC,reference");
        assert_eq!(got.query, "?$orderby=UnitId%20desc,%20Reference");
    }

    #[test]
    fn all_invalid_orderby_falls_back_to_the_safe_field() {
        assert_eq!(sanitize("Units", "$orderby=Bogus").query, "?$orderby=UnitId");
        assert_eq!(
            sanitize("Units", "$orderby=Bogus%20desc").query,
            "?$orderby=UnitId%20desc"
        );
    }

    #[test]
    fn other_parameters_pass_through_in_order() {
        let raw = "$select=UnitId,City&$skip=20&$count=true";
        assert_eq!(sanitize("Units", raw).query, format!("?{}", raw));
    }

    #[test]
    fn empty_query_stays_empty() {
        let got = sanitize("Units", "");
        assert_eq!(got.query, "");
        assert!(!got.has_filter);
    }

    #[test]
    fn filter_detection_handles_encoded_keys() {
        let got = sanitize("Units", "%24filter=City%20eq%20'Utrecht'");
        assert!(got.has_filter);
        assert_eq!(got.query, "?%24filter=City%20eq%20'Utrecht'");
    }

    #[test]
    fn absent_entity_is_treated_as_unknown() {
        let got = sanitize_query(None, "$orderby=Id&$top=900", &CATALOG);
        assert_eq!(got.query, "?$orderby=Id&$top=500");
    }
}

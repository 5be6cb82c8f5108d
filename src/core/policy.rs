//! Forbidden-content policy: owner names that must never reach a client.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Owner names stripped from proxied responses. Compared as exact strings
/// after trimming and lowercasing; substring matching is deliberately not
/// performed.
static DEFAULT_FORBIDDEN_OWNERS: &[&str] = &[
    "wals huren",
    "wals huren b.v.",
    "wals vastgoed beheer",
];

pub static FORBIDDEN_OWNERS: Lazy<ForbiddenNames> =
    Lazy::new(|| ForbiddenNames::new(DEFAULT_FORBIDDEN_OWNERS.iter().copied()));

pub struct ForbiddenNames {
    names: HashSet<String>,
}

impl ForbiddenNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    pub fn matches(&self, value: &str) -> bool {
        self.names.contains(&value.trim().to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_normalises_case_and_whitespace() {
        let policy = ForbiddenNames::new(["Wals Huren"]);
        assert!(policy.matches("wals huren"));
        assert!(policy.matches("  WALS HUREN  "));
        assert!(!policy.matches("wals huren b.v."));
        assert!(!policy.matches("huren"));
    }

    #[test]
    fn empty_entries_are_dropped() {
        let policy = ForbiddenNames::new(["", "  "]);
        assert!(policy.is_empty());
        assert!(!policy.matches(""));
    }
}

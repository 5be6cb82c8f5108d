//! Static catalog of the Bloxs OData entity sets the proxy knows about.
//!
//! The catalog drives query sanitisation ($orderby whitelisting, $top caps,
//! mandatory-$filter guardrails) and the alias normalisation of the entity
//! path segment. It ships with the binary and never changes at runtime.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Fallback for entities the catalog does not know.
pub const DEFAULT_FIELDS: &[&str] = &["Id", "Reference", "DisplayName", "Name"];
pub const DEFAULT_TOP_CAP: u32 = 500;

#[derive(Debug)]
pub struct EntityDescriptor {
    /// Canonical entity-set segment as the upstream spells it.
    pub name: &'static str,
    /// Ordered; the first element doubles as the safe `$orderby` default.
    pub sortable_fields: &'static [&'static str],
    pub top_cap: u32,
    pub requires_filter: bool,
}

static ENTITIES: &[EntityDescriptor] = &[
    EntityDescriptor {
        name: "Units",
        sortable_fields: &[
            "UnitId",
            "Reference",
            "DisplayName",
            "UnitType",
            "Address",
            "City",
            "ComplexId",
        ],
        top_cap: 500,
        requires_filter: false,
    },
    EntityDescriptor {
        name: "Complexes",
        sortable_fields: &["ComplexId", "Reference", "DisplayName", "City"],
        top_cap: 500,
        requires_filter: false,
    },
    EntityDescriptor {
        name: "Relations",
        sortable_fields: &["RelationId", "Reference", "DisplayName", "City", "Email"],
        top_cap: 500,
        requires_filter: false,
    },
    EntityDescriptor {
        name: "Owners",
        sortable_fields: &["OwnerId", "Reference", "DisplayName", "City"],
        top_cap: 500,
        requires_filter: false,
    },
    EntityDescriptor {
        name: "Contracts",
        sortable_fields: &[
            "ContractId",
            "Reference",
            "StartDate",
            "EndDate",
            "UnitId",
            "RelationId",
        ],
        top_cap: 200,
        requires_filter: false,
    },
    EntityDescriptor {
        name: "Invoices",
        sortable_fields: &[
            "InvoiceId",
            "Reference",
            "InvoiceDate",
            "DueDate",
            "RelationId",
            "TotalAmount",
        ],
        top_cap: 200,
        requires_filter: false,
    },
    EntityDescriptor {
        name: "FinancialMutations",
        sortable_fields: &[
            "FinancialMutationId",
            "FinancialYear",
            "Period",
            "MutationDate",
            "LedgerCode",
            "Amount",
        ],
        top_cap: 100,
        requires_filter: true,
    },
    EntityDescriptor {
        name: "LedgerAccounts",
        sortable_fields: &["LedgerAccountId", "Code", "Description"],
        top_cap: 500,
        requires_filter: false,
    },
];

/// Alternative path spellings, beyond plain case differences.
static EXTRA_ALIASES: &[(&str, &str)] = &[
    ("unit", "Units"),
    ("complex", "Complexes"),
    ("relation", "Relations"),
    ("contacts", "Relations"),
    ("owner", "Owners"),
    ("contract", "Contracts"),
    ("invoice", "Invoices"),
    ("financialmutation", "FinancialMutations"),
    ("mutations", "FinancialMutations"),
    ("ledgeraccount", "LedgerAccounts"),
    ("ledgers", "LedgerAccounts"),
];

pub struct EntityCatalog {
    by_name: HashMap<String, &'static EntityDescriptor>,
    aliases: HashMap<String, &'static str>,
}

pub static CATALOG: Lazy<EntityCatalog> = Lazy::new(EntityCatalog::new);

impl EntityCatalog {
    fn new() -> Self {
        let mut by_name = HashMap::new();
        let mut aliases = HashMap::new();
        for descriptor in ENTITIES {
            by_name.insert(descriptor.name.to_lowercase(), descriptor);
            aliases.insert(descriptor.name.to_lowercase(), descriptor.name);
        }
        for (spelling, canonical) in EXTRA_ALIASES {
            aliases.insert((*spelling).to_string(), *canonical);
        }
        Self { by_name, aliases }
    }

    pub fn descriptor(&self, entity: &str) -> Option<&'static EntityDescriptor> {
        self.by_name.get(&entity.to_lowercase()).copied()
    }

    pub fn fields_for(&self, entity: &str) -> &'static [&'static str] {
        self.descriptor(entity)
            .map(|d| d.sortable_fields)
            .unwrap_or(DEFAULT_FIELDS)
    }

    pub fn top_cap_for(&self, entity: &str) -> u32 {
        self.descriptor(entity)
            .map(|d| d.top_cap)
            .unwrap_or(DEFAULT_TOP_CAP)
    }

    pub fn requires_filter(&self, entity: &str) -> bool {
        self.descriptor(entity)
            .map(|d| d.requires_filter)
            .unwrap_or(false)
    }

    /// Canonical spelling for a path segment, if the segment is a known alias.
    pub fn alias_for(&self, segment: &str) -> Option<&'static str> {
        self.aliases.get(&segment.to_lowercase()).copied()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &'static EntityDescriptor> {
        ENTITIES.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_case_insensitive() {
        assert_eq!(CATALOG.top_cap_for("financialmutations"), 100);
        assert!(CATALOG.requires_filter("FINANCIALMUTATIONS"));
        assert_eq!(CATALOG.fields_for("units")[0], "UnitId");
    }

    #[test]
    fn unknown_entity_gets_defaults() {
        assert_eq!(CATALOG.fields_for("Widgets"), DEFAULT_FIELDS);
        assert_eq!(CATALOG.top_cap_for("Widgets"), DEFAULT_TOP_CAP);
        assert!(!CATALOG.requires_filter("Widgets"));
    }

    #[test]
    fn aliases_resolve_to_canonical_spelling() {
        assert_eq!(CATALOG.alias_for("units"), Some("Units"));
        assert_eq!(CATALOG.alias_for("UNIT"), Some("Units"));
        assert_eq!(CATALOG.alias_for("mutations"), Some("FinancialMutations"));
        assert_eq!(CATALOG.alias_for("nope"), None);
    }

    #[test]
    fn every_entity_has_a_safe_order_field() {
        for descriptor in CATALOG.descriptors() {
            let safe = descriptor
                .sortable_fields
                .iter()
                .any(|f| f.ends_with("Id") || *f == "Reference");
            assert!(safe, "{} lacks an Id/Reference field", descriptor.name);
        }
    }
}

//! `$metadata-summary`: the curated catalog document served to agents.
//!
//! This is a human/LLM aid, not wire-critical; it enumerates the known
//! entity sets together with query guidance and business context.

use axum::http::StatusCode;
use axum::response::Response;
use serde_json::{json, Value};

use super::common;
use crate::core::catalog::CATALOG;

pub fn summary_response() -> Response {
    common::json_response(StatusCode::OK, summary_document())
}

fn fields(entity: &str) -> Value {
    json!(CATALOG.fields_for(entity))
}

pub fn summary_document() -> Value {
    json!({
        "entities": {
            "Units": {
                "description": "Rentable units (apartments, offices, parking spaces) with their address, type and parent complex.",
                "sortableFields": fields("Units"),
                "filterExamples": [
                    "$filter=City eq 'Amsterdam'",
                    "$filter=ComplexId eq 12",
                    "$filter=UnitType eq 'Apartment'"
                ],
                "joinInfo": "ComplexId links to Complexes.ComplexId; UnitId is referenced by Contracts.",
                "note": "Results are capped at $top=500.",
                "keyFields": ["UnitId"]
            },
            "Complexes": {
                "description": "Buildings and complexes grouping the individual units.",
                "sortableFields": fields("Complexes"),
                "filterExamples": ["$filter=City eq 'Rotterdam'"],
                "joinInfo": "ComplexId is referenced by Units.",
                "note": "Small entity set; fetching it whole is fine.",
                "keyFields": ["ComplexId"]
            },
            "Relations": {
                "description": "Contact records: tenants, suppliers and other counterparties.",
                "sortableFields": fields("Relations"),
                "filterExamples": [
                    "$filter=City eq 'Utrecht'",
                    "$filter=startswith(DisplayName, 'Jans')"
                ],
                "joinInfo": "RelationId is referenced by Contracts and Invoices.",
                "note": "Use $select to avoid pulling full contact records.",
                "keyFields": ["RelationId"]
            },
            "Owners": {
                "description": "Property owners on whose behalf the administration is run.",
                "sortableFields": fields("Owners"),
                "filterExamples": ["$filter=City eq 'Den Haag'"],
                "joinInfo": "OwnerId links ownership records to Units and Complexes.",
                "note": "Rows mentioning policy-restricted owners are removed from responses.",
                "keyFields": ["OwnerId"]
            },
            "Contracts": {
                "description": "Lease contracts binding a relation to a unit for a period.",
                "sortableFields": fields("Contracts"),
                "filterExamples": [
                    "$filter=EndDate eq null",
                    "$filter=StartDate ge 2025-01-01"
                ],
                "joinInfo": "UnitId links to Units; RelationId links to Relations.",
                "note": "An active contract has EndDate null or in the future. Capped at $top=200.",
                "keyFields": ["ContractId"]
            },
            "Invoices": {
                "description": "Issued invoices with due dates and totals.",
                "sortableFields": fields("Invoices"),
                "filterExamples": [
                    "$filter=DueDate lt 2026-01-01",
                    "$filter=RelationId eq 1042"
                ],
                "joinInfo": "RelationId links to Relations.",
                "note": "Capped at $top=200; sort by DueDate for ageing views.",
                "keyFields": ["InvoiceId"]
            },
            "FinancialMutations": {
                "description": "Individual ledger mutations; the largest entity set by far.",
                "sortableFields": fields("FinancialMutations"),
                "filterExamples": [
                    "$filter=FinancialYear eq 2025",
                    "$filter=FinancialYear eq 2025 and Period eq 3"
                ],
                "joinInfo": "LedgerCode links to LedgerAccounts.Code.",
                "note": "A $filter is mandatory and results are capped at $top=100. Always scope by FinancialYear.",
                "keyFields": ["FinancialMutationId"]
            },
            "LedgerAccounts": {
                "description": "Chart of accounts: ledger codes and their descriptions.",
                "sortableFields": fields("LedgerAccounts"),
                "filterExamples": ["$filter=startswith(Code, '8')"],
                "joinInfo": "Code is referenced by FinancialMutations.LedgerCode.",
                "note": "Stable reference data; cache it client-side.",
                "keyFields": ["LedgerAccountId"]
            }
        },
        "commonJoins": [
            "Units.ComplexId -> Complexes.ComplexId",
            "Contracts.UnitId -> Units.UnitId",
            "Contracts.RelationId -> Relations.RelationId",
            "Invoices.RelationId -> Relations.RelationId",
            "FinancialMutations.LedgerCode -> LedgerAccounts.Code"
        ],
        "entityLinkTypes": {
            "Units": "asset",
            "Complexes": "asset",
            "Relations": "party",
            "Owners": "party",
            "Contracts": "agreement",
            "Invoices": "document",
            "FinancialMutations": "ledger",
            "LedgerAccounts": "ledger"
        },
        "queryParameters": {
            "$filter": "OData v4 boolean expression; string literals in single quotes.",
            "$select": "Comma-separated field list; strongly recommended on wide entities.",
            "$orderby": "Validated against sortableFields; unknown fields are replaced with a safe default, directions other than desc become ascending.",
            "$top": "Capped per entity (default 500, FinancialMutations 100). Non-positive values are ignored.",
            "$skip": "Offset paging, combine with $top and a stable $orderby.",
            "$count": "true adds @odata.count to the envelope.",
            "$expand": "Forwarded unchanged; prefer explicit joins via the key fields above."
        },
        "agentRules": [
            "Always filter FinancialMutations by FinancialYear, and by Period where possible.",
            "Prefer $select with the fields you need; payloads shrink an order of magnitude.",
            "Page with $top/$skip and a stable $orderby instead of requesting everything.",
            "Dates are ISO 8601 (2025-01-31); do not quote numeric literals.",
            "When a 400 names an invalidField, re-issue the query with a field from availableFields."
        ],
        "businessInsights": [
            "Vacancy: Units with no Contract whose EndDate is null or in the future.",
            "Outstanding balance per relation: Invoices joined on RelationId, filtered on DueDate.",
            "Period results: FinancialMutations grouped by LedgerCode within one FinancialYear."
        ],
        "crossEntityInsights": [
            "Unit -> Contract -> Relation answers 'who rents what'.",
            "Complex-level reporting aggregates Units via ComplexId before joining financials.",
            "Invoice ageing needs Invoices plus Relations for counterparty names."
        ],
        "ownerWorkflows": [
            "Owner statements combine Contracts (rent roll) with FinancialMutations per period.",
            "Note that rows naming policy-restricted owners are redacted; @odata.count is not adjusted."
        ],
        "commonFilterIssues": [
            "String literals need single quotes: City eq 'Utrecht'.",
            "Supported operators are eq, ne, gt, ge, lt, le plus startswith/contains; there is no like.",
            "Field names are case-sensitive upstream; copy them from sortableFields.",
            "and/or are lowercase in OData expressions."
        ]
    })
}

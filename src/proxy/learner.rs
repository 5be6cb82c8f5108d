//! Background schema learning.
//!
//! Records which top-level field names appear in responses per entity
//! (never their values) in a durable KV, keyed `learn:entity:<entity>`
//! with a `learn:index:v1` index. Runs strictly after the client response
//! has been dispatched; every failure is swallowed.

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::BTreeSet;

pub const ENTITY_KEY_PREFIX: &str = "learn:entity:";
pub const INDEX_KEY: &str = "learn:index:v1";

/// Rows inspected per response.
const SAMPLE_ROWS: usize = 5;
/// An unchanged record is rewritten at most this often.
const REWRITE_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedEntityRecord {
    pub fields: Vec<String>,
    pub field_count: usize,
    pub sample_count: usize,
    pub last_seen_iso: String,
    pub last_write_ms: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnIndex {
    pub entities: Vec<String>,
    pub last_write_ms: i64,
}

/// String KV over the `kv_store` table.
pub struct LearnStore {
    pool: SqlitePool,
}

impl LearnStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, String> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| format!("Failed to read {}: {}", key, e))?;
        Ok(row.map(|r| {
            use sqlx::Row;
            r.get("value")
        }))
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<(), String> {
        sqlx::query(
            "INSERT INTO kv_store (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to write {}: {}", key, e))?;
        Ok(())
    }
}

pub struct SchemaLearner {
    enabled: bool,
    store: Option<LearnStore>,
}

impl SchemaLearner {
    pub fn new(enabled: bool, store: Option<LearnStore>) -> Self {
        Self { enabled, store }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.store.is_some()
    }

    /// Record the field names observed in a (redacted) response body.
    /// Never fails outward; the response has already been sent.
    pub async fn observe(&self, entity: &str, body: &[u8]) {
        if !self.is_active() || entity.is_empty() {
            return;
        }
        if let Err(e) = self.observe_inner(entity, body).await {
            tracing::debug!("Schema learning skipped for {}: {}", entity, e);
        }
    }

    async fn observe_inner(&self, entity: &str, body: &[u8]) -> Result<(), String> {
        let store = match self.store.as_ref() {
            Some(s) => s,
            None => return Ok(()),
        };

        let parsed: Value =
            serde_json::from_slice(body).map_err(|e| format!("body is not JSON: {}", e))?;
        let rows = match parsed.get("value").and_then(|v| v.as_array()) {
            Some(rows) if !rows.is_empty() => rows,
            _ => return Ok(()),
        };

        let sample = &rows[..rows.len().min(SAMPLE_ROWS)];
        let discovered = collect_row_fields(sample);
        if discovered.is_empty() {
            return Ok(());
        }

        let lc_entity = entity.to_lowercase();
        let record_key = format!("{}{}", ENTITY_KEY_PREFIX, lc_entity);
        let now = Utc::now().timestamp_millis();

        let existing: Option<LearnedEntityRecord> = store
            .get(&record_key)
            .await?
            .and_then(|raw| serde_json::from_str(&raw).ok());

        let (fields, new_field) = merge_fields(existing.as_ref(), &discovered);
        let stale = existing
            .as_ref()
            .map(|r| now - r.last_write_ms > REWRITE_WINDOW_MS)
            .unwrap_or(true);

        if new_field || stale {
            let record = LearnedEntityRecord {
                field_count: fields.len(),
                fields,
                sample_count: sample.len(),
                last_seen_iso: Utc::now().to_rfc3339(),
                last_write_ms: now,
            };
            let raw = serde_json::to_string(&record)
                .map_err(|e| format!("record serialisation failed: {}", e))?;
            store.put(&record_key, &raw).await?;
        }

        let mut index: LearnIndex = store
            .get(INDEX_KEY)
            .await?
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        if !index.entities.iter().any(|e| e == &lc_entity) {
            index.entities.push(lc_entity);
            index.entities.sort();
            index.last_write_ms = now;
            let raw = serde_json::to_string(&index)
                .map_err(|e| format!("index serialisation failed: {}", e))?;
            store.put(INDEX_KEY, &raw).await?;
        }

        Ok(())
    }

    pub async fn record_for(&self, entity: &str) -> Result<Option<LearnedEntityRecord>, String> {
        let store = self.store.as_ref().ok_or("no learning store configured")?;
        let key = format!("{}{}", ENTITY_KEY_PREFIX, entity.to_lowercase());
        Ok(store
            .get(&key)
            .await?
            .and_then(|raw| serde_json::from_str(&raw).ok()))
    }

    pub async fn index(&self) -> Result<LearnIndex, String> {
        let store = self.store.as_ref().ok_or("no learning store configured")?;
        Ok(store
            .get(INDEX_KEY)
            .await?
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default())
    }

    /// Fetch all indexed records concurrently; entries that fail to load
    /// or no longer exist are skipped.
    pub async fn records(&self, entities: &[String]) -> Vec<LearnedEntityRecord> {
        let fetches = entities.iter().map(|entity| self.record_for(entity));
        join_all(fetches)
            .await
            .into_iter()
            .filter_map(|result| result.ok().flatten())
            .collect()
    }
}

/// Union of top-level keys across the sampled rows, `@odata.`-prefixed
/// annotations excluded. Keys only; values are never collected.
fn collect_row_fields(rows: &[Value]) -> BTreeSet<String> {
    let mut fields = BTreeSet::new();
    for row in rows {
        if let Some(object) = row.as_object() {
            for key in object.keys() {
                if !key.starts_with("@odata.") {
                    fields.insert(key.clone());
                }
            }
        }
    }
    fields
}

/// Sorted merge of stored and freshly discovered fields, plus whether
/// anything new was added.
fn merge_fields(
    existing: Option<&LearnedEntityRecord>,
    discovered: &BTreeSet<String>,
) -> (Vec<String>, bool) {
    let mut merged: BTreeSet<String> = existing
        .map(|r| r.fields.iter().cloned().collect())
        .unwrap_or_default();
    let before = merged.len();
    merged.extend(discovered.iter().cloned());
    let new_field = merged.len() > before;
    (merged.into_iter().collect(), new_field)
}

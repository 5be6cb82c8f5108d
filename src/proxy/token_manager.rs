//! Upstream JWT lifecycle.
//!
//! The proxy holds one credential set and one cached token for the whole
//! process. Concurrent refreshes may race; both racers end up storing a
//! valid token, so no single-flight coalescing is done.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;

/// Cached tokens are reused while they have more than this left to live.
const REFRESH_MARGIN_MS: i64 = 5 * 60 * 1000;
/// Applied when the auth response carries no usable expiry at all.
const FALLBACK_TTL_MS: i64 = 55 * 60 * 1000;

#[derive(Debug, Clone)]
pub struct TokenCacheEntry {
    pub jwt: String,
    pub expires_at_ms: i64,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    expiration: Option<String>,
}

pub struct TokenManager {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    cache: RwLock<Option<TokenCacheEntry>>,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        api_key: String,
        api_secret: String,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
            api_secret,
            cache: RwLock::new(None),
        }
    }

    /// Return a JWT valid for at least the refresh margin, fetching a fresh
    /// one from the upstream auth endpoint when needed.
    pub async fn acquire(&self) -> Result<String, String> {
        let now = Utc::now().timestamp_millis();
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.as_ref() {
                if entry.expires_at_ms - now > REFRESH_MARGIN_MS {
                    return Ok(entry.jwt.clone());
                }
            }
        }

        let response = self
            .http
            .post(format!("{}/Authorization", self.base_url))
            .json(&serde_json::json!({
                "apiKey": self.api_key,
                "apiSecret": self.api_secret,
            }))
            .send()
            .await
            .map_err(|e| format!("Bloxs auth request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Bloxs auth failed: {}", status.as_u16()));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| format!("Bloxs auth response was not valid JSON: {}", e))?;

        let expires_at_ms = resolve_expiry_ms(&auth.token, auth.expiration.as_deref(), now);
        tracing::debug!(
            "Refreshed Bloxs token, valid for {}s",
            (expires_at_ms - now) / 1000
        );

        let jwt = auth.token.clone();
        *self.cache.write().await = Some(TokenCacheEntry {
            jwt: auth.token,
            expires_at_ms,
        });
        Ok(jwt)
    }

    /// Seed the cache so tests can exercise callers without an auth
    /// endpoint.
    #[cfg(test)]
    pub(crate) async fn prime(&self, jwt: &str, expires_at_ms: i64) {
        *self.cache.write().await = Some(TokenCacheEntry {
            jwt: jwt.to_string(),
            expires_at_ms,
        });
    }
}

/// Expiry resolution, in order: JWT `exp` claim, the `expiration` date
/// string, a 55-minute fallback.
fn resolve_expiry_ms(token: &str, expiration: Option<&str>, now_ms: i64) -> i64 {
    jwt_exp_ms(token)
        .or_else(|| expiration.and_then(parse_expiration_ms))
        .unwrap_or(now_ms + FALLBACK_TTL_MS)
}

/// `exp` claim of a three-part JWT, in epoch milliseconds.
fn jwt_exp_ms(token: &str) -> Option<i64> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&payload).ok()?;
    let exp = claims.get("exp")?;
    exp.as_i64()
        .or_else(|| exp.as_f64().map(|f| f as i64))
        .map(|secs| secs * 1000)
}

/// Parse `D/M/YYYY[ H:M[:S]]` as UTC; when day-first yields no valid
/// calendar date, retry month-first.
fn parse_expiration_ms(raw: &str) -> Option<i64> {
    const DAY_FIRST: &[&str] = &["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M", "%d/%m/%Y"];
    const MONTH_FIRST: &[&str] = &["%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M", "%m/%d/%Y"];

    let raw = raw.trim();
    DAY_FIRST
        .iter()
        .chain(MONTH_FIRST)
        .find_map(|format| parse_utc_ms(raw, format))
}

fn parse_utc_ms(raw: &str, format: &str) -> Option<i64> {
    let datetime = if format.contains("%H") {
        NaiveDateTime::parse_from_str(raw, format).ok()?
    } else {
        NaiveDate::parse_from_str(raw, format)
            .ok()?
            .and_hms_opt(0, 0, 0)?
    };
    Some(datetime.and_utc().timestamp_millis())
}

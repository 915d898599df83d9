//! Hop geolocation cache
//!
//! Resolves public traceroute hops to coordinates via ip-api.com through a
//! process-local TTL cache. Readers take a shared lock, writers an
//! exclusive one.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy)]
struct Entry {
    lat: f64,
    lon: f64,
    expires_at: Instant,
}

/// TTL cache over an HTTP geo-IP backend.
pub struct GeoCache {
    client: reqwest::Client,
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    status: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
}

impl GeoCache {
    /// Create a cache with the given entry TTL and per-resolution timeout.
    pub fn new(ttl: Duration, resolve_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(resolve_timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve an IP to `(lat, lon)`, serving unexpired entries from the
    /// cache.
    pub async fn resolve(&self, ip: &str) -> anyhow::Result<(f64, f64)> {
        if let Some(hit) = self.cached(ip).await {
            return Ok(hit);
        }

        let (lat, lon) = self.fetch(ip).await?;

        let mut entries = self.entries.write().await;
        entries.insert(
            ip.to_string(),
            Entry {
                lat,
                lon,
                expires_at: Instant::now() + self.ttl,
            },
        );

        Ok((lat, lon))
    }

    async fn cached(&self, ip: &str) -> Option<(f64, f64)> {
        let entries = self.entries.read().await;
        entries
            .get(ip)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| (entry.lat, entry.lon))
    }

    async fn fetch(&self, ip: &str) -> anyhow::Result<(f64, f64)> {
        let url = format!("http://ip-api.com/json/{ip}?fields=status,lat,lon");
        let response: GeoResponse = self.client.get(&url).send().await?.json().await?;

        if response.status != "success" {
            anyhow::bail!("geoip: not found");
        }

        Ok((response.lat, response.lon))
    }

    #[cfg(test)]
    async fn seed(&self, ip: &str, lat: f64, lon: f64, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(
            ip.to_string(),
            Entry {
                lat,
                lon,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

use crate::config::GeocodeConfig;
use crate::types::Customer;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One cached geocode result. Failed lookups are cached too (lat/lon `None`)
/// so reruns skip straight to the next candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheEntry {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub query: String,
    #[serde(default)]
    pub cidade_geocode: Option<String>,
    #[serde(default)]
    pub uf_geocode: Option<String>,
}

/// Persistent geocode cache, flushed periodically during import.
pub struct GeocodeCache {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
}

impl GeocodeCache {
    pub fn load(path: &Path) -> Self {
        let entries = fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        GeocodeCache {
            path: path.to_path_buf(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory: {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write geocode cache: {:?}", self.path))?;
        Ok(())
    }
}

pub fn cache_key(kind: &str, value: &str) -> String {
    format!("{}::{}", kind, value.trim().to_uppercase())
}

/// Geocode candidates for a record, most specific first: address override,
/// delivery site, street address, CEP, city+state, bare state.
pub fn candidates(c: &Customer, address_override: Option<&str>) -> Vec<(&'static str, String)> {
    let mut out = Vec::new();
    let mut push = |kind: &'static str, value: Option<String>| {
        if let Some(v) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            out.push((kind, v));
        }
    };
    push("CONSIDERAR", address_override.map(str::to_string));
    push("LOCAL", c.local_de_entrega.clone());
    push("END", c.endereco_cliente.clone());
    push("CEP", c.cep.clone());
    if let (Some(cidade), Some(uf)) = (c.cidade.as_deref(), c.uf) {
        if !cidade.trim().is_empty() {
            push("CIDADE", Some(format!("{} - {}", cidade.trim(), uf)));
        }
    }
    push("UF", c.uf.map(|uf| uf.as_str().to_string()));
    out
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
}

/// Thin Nominatim-style client. One query, first hit wins.
pub struct Geocoder {
    client: reqwest::Client,
    endpoint: String,
    delay: Duration,
}

impl Geocoder {
    pub fn new(config: &GeocodeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build geocoding client")?;
        Ok(Geocoder {
            client,
            endpoint: config.endpoint.clone(),
            delay: Duration::from_millis(config.delay_ms),
        })
    }

    pub async fn lookup(&self, query: &str) -> Result<CacheEntry> {
        let q = format!("{}, Brasil", query);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", q.as_str()),
                ("format", "json"),
                ("limit", "1"),
                ("addressdetails", "1"),
            ])
            .send()
            .await?
            .error_for_status()?;
        let results: Vec<NominatimResult> = response.json().await?;

        let mut entry = CacheEntry {
            query: query.to_string(),
            ..CacheEntry::default()
        };
        if let Some(hit) = results.into_iter().next() {
            entry.lat = hit.lat.parse().ok();
            entry.lon = hit.lon.parse().ok();
            if let Some(address) = hit.address {
                entry.cidade_geocode = address.city.or(address.town).or(address.village);
                entry.uf_geocode = address.state;
            }
        }
        Ok(entry)
    }
}

/// A successful geocode: coordinates plus the query that produced them.
pub struct Located {
    pub lat: f64,
    pub lon: f64,
    pub query: String,
}

/// Tries each candidate in priority order, consulting the cache before the
/// remote service. Remote results, including misses and errors, are cached
/// so a rerun never repeats the request.
pub async fn geocode_with_priority(
    candidates: &[(&'static str, String)],
    cache: &mut GeocodeCache,
    geocoder: &Geocoder,
) -> Option<Located> {
    for (kind, value) in candidates {
        let key = cache_key(kind, value);

        if let Some(entry) = cache.get(&key) {
            if let (Some(lat), Some(lon)) = (entry.lat, entry.lon) {
                return Some(Located {
                    lat,
                    lon,
                    query: value.clone(),
                });
            }
            // cached miss, try the next candidate
            continue;
        }

        let entry = match geocoder.lookup(value).await {
            Ok(entry) => entry,
            Err(err) => {
                eprintln!("Geocode failed for {:?}: {:#}", value, err);
                CacheEntry {
                    query: value.clone(),
                    ..CacheEntry::default()
                }
            }
        };
        tokio::time::sleep(geocoder.delay).await;

        let hit = entry.lat.zip(entry.lon);
        cache.insert(key, entry);
        if let Some((lat, lon)) = hit {
            return Some(Located {
                lat,
                lon,
                query: value.clone(),
            });
        }
    }
    None
}

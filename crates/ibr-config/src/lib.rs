//! ibr-config
//!
//! Effective configuration is built in three layers, later layers winning:
//! 1. built-in defaults (`GatewayConfig::default()`)
//! 2. YAML documents, deep-merged in order
//! 3. environment overrides (`IBGW_*`, `IBREST_*`)
//!
//! The effective config is canonicalised to JSON and hashed so a running
//! daemon can log exactly which settings it booted with.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::time::Duration;

pub const ENV_CONFIG_PATHS: &str = "IBREST_CONFIG";
pub const ENV_DB_URL: &str = "IBREST_DATABASE_URL";

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub gateway: UpstreamConfig,
    pub http: HttpConfig,
    pub timing: TimingConfig,
    pub ids: IdConfig,
    pub database_url: Option<String>,
}

/// Where the external trading gateway lives and how many connections we
/// open to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub host: String,
    pub port: u16,
    /// Client id of slot 0; slot `i` connects as `client_id_base + i`.
    pub client_id_base: i32,
    /// Number of shared feed slots in addition to the reserved order slot.
    pub pooled_slots: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_ms: u64,
    pub timeout_iterations: u32,
    pub lease_poll_ms: u64,
    pub lease_iterations: u32,
    pub settle_ms: u64,
    pub oca_timeout_iterations: u32,
    pub min_market_samples: usize,
    pub open_orders_refresh_every: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdConfig {
    /// Boundary between the order-id and feed-id sub-ranges.
    pub threshold: i64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway: UpstreamConfig::default(),
            http: HttpConfig::default(),
            timing: TimingConfig::default(),
            ids: IdConfig::default(),
            database_url: None,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4003,
            client_id_base: 0,
            pooled_slots: 7,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            timeout_iterations: 20,
            lease_poll_ms: 500,
            lease_iterations: 20,
            settle_ms: 1000,
            oca_timeout_iterations: 240,
            min_market_samples: 5,
            open_orders_refresh_every: 4,
        }
    }
}

impl Default for IdConfig {
    fn default() -> Self {
        Self { threshold: 10_000 }
    }
}

impl UpstreamConfig {
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    /// Total slots including the reserved one.
    pub fn total_slots(&self) -> usize {
        self.pooled_slots + 1
    }

    pub fn client_id_for(&self, slot: usize) -> i32 {
        self.client_id_base + slot as i32
    }
}

impl HttpConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn lease_poll(&self) -> Duration {
        Duration::from_millis(self.lease_poll_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.trim().is_empty() {
            bail!("CONFIG_INVALID gateway.host must not be empty");
        }
        if self.gateway.pooled_slots == 0 {
            bail!("CONFIG_INVALID gateway.pooled_slots must be at least 1");
        }
        if self.timing.poll_interval_ms == 0 || self.timing.lease_poll_ms == 0 {
            bail!("CONFIG_INVALID poll intervals must be non-zero");
        }
        if self.timing.timeout_iterations == 0 || self.timing.lease_iterations == 0 {
            bail!("CONFIG_INVALID iteration budgets must be non-zero");
        }
        if self.ids.threshold <= 0 {
            bail!("CONFIG_INVALID ids.threshold must be positive");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: GatewayConfig,
    pub config_hash: String,
    pub canonical_json: String,
}

/// Load from `IBREST_CONFIG` (comma separated YAML paths, optional) and the
/// process environment.
pub fn load_from_env() -> Result<LoadedConfig> {
    let paths: Vec<String> = std::env::var(ENV_CONFIG_PATHS)
        .ok()
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut docs = Vec::with_capacity(paths.len());
    for p in &paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered(&doc_refs, |k| std::env::var(k).ok())
}

/// Build the effective config from YAML layers and an environment lookup.
pub fn load_layered<F>(yaml_docs: &[&str], env: F) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut merged =
        serde_json::to_value(GatewayConfig::default()).context("default config serialize")?;
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null and must not wipe the defaults.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    let mut config: GatewayConfig =
        serde_json::from_value(merged).context("config does not match schema")?;
    apply_env_overrides(&mut config, env)?;
    config.validate()?;

    let canonical_json = canonicalize(&config)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config,
        config_hash,
        canonical_json,
    })
}

/// First of `names` that is set, with the name it was found under.
fn first_env<F>(env: &F, names: &[&'static str]) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|n| env(n).map(|v| (*n, v)))
}

fn apply_env_overrides<F>(cfg: &mut GatewayConfig, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    // Linked-container variables are the fallback for the plain ones.
    let first = |names: &[&'static str]| first_env(&env, names);

    if let Some((_, host)) = first(&["IBGW_HOST", "IBGW_PORT_4003_TCP_ADDR"]) {
        cfg.gateway.host = host;
    }
    if let Some((name, port)) = first(&["IBGW_PORT", "IBGW_PORT_4003_TCP_PORT"]) {
        cfg.gateway.port = parse_env(name, &port)?;
    }
    if let Some((name, id)) = first(&["IBGW_CLIENT_ID"]) {
        cfg.gateway.client_id_base = parse_env(name, &id)?;
    }
    if let Some((name, slots)) = first(&["IBREST_SLOTS"]) {
        cfg.gateway.pooled_slots = parse_env(name, &slots)?;
    }
    if let Some((_, host)) = first(&["IBREST_HOST"]) {
        cfg.http.host = host;
    }
    if let Some((name, port)) = first(&["IBREST_PORT"]) {
        cfg.http.port = parse_env(name, &port)?;
    }
    if let Some((_, url)) = first(&[ENV_DB_URL]) {
        cfg.database_url = Some(url);
    }
    Ok(())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid {name}={raw:?}: {e}"))
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize(cfg: &GatewayConfig) -> Result<String> {
    // serde_json::Map is ordered by key, so the rendering is deterministic.
    let v = serde_json::to_value(cfg).context("canonical json serialize failed")?;
    serde_json::to_string(&v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let loaded = load_layered(&[], env_of(&[])).unwrap();
        assert_eq!(loaded.config, GatewayConfig::default());
        assert_eq!(loaded.config.gateway.total_slots(), 8);
    }

    #[test]
    fn plain_env_wins_over_linked_container_env() {
        let loaded = load_layered(
            &[],
            env_of(&[
                ("IBGW_HOST", "gw"),
                ("IBGW_PORT_4003_TCP_ADDR", "10.0.0.5"),
                ("IBGW_PORT_4003_TCP_PORT", "4004"),
            ]),
        )
        .unwrap();
        assert_eq!(loaded.config.gateway.host, "gw");
        assert_eq!(loaded.config.gateway.port, 4004);
    }

    #[test]
    fn unparsable_env_is_rejected() {
        let err = load_layered(&[], env_of(&[("IBREST_SLOTS", "many")])).unwrap_err();
        assert!(err.to_string().contains("IBREST_SLOTS"));
    }

    #[test]
    fn client_ids_follow_slot_index() {
        let mut up = UpstreamConfig::default();
        up.client_id_base = 40;
        assert_eq!(up.client_id_for(0), 40);
        assert_eq!(up.client_id_for(3), 43);
    }
}

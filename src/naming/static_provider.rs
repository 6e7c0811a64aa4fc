use alloy_primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::provider::{EnsProfileSource, NamingProvider, ProviderId};
use crate::chain::ChainId;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameRecord {
    pub chain_id: ChainId,
    pub name: String,
    pub address: Address,
}

/// ENS avatar and text records for one name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    pub chain_id: ChainId,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub texts: HashMap<String, String>,
}

/// Name records per provider, as stored in the `NAMES_PATH` file.
#[derive(Debug, Default, Deserialize)]
pub struct NameTable {
    #[serde(default)]
    pub sid: Vec<NameRecord>,
    #[serde(default)]
    pub uns: Vec<NameRecord>,
    #[serde(default)]
    pub ens: Vec<NameRecord>,
    #[serde(default)]
    pub profiles: Vec<ProfileRecord>,
}

impl NameTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read name table {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid name table {}", path.display()))
    }

    pub fn providers(&self) -> Vec<Arc<dyn NamingProvider>> {
        vec![
            Arc::new(StaticNamingProvider::from_records(ProviderId::Sid, self.sid.clone())),
            Arc::new(StaticNamingProvider::from_records(ProviderId::Uns, self.uns.clone())),
            Arc::new(StaticNamingProvider::from_records(ProviderId::Ens, self.ens.clone())),
        ]
    }

    pub fn profile_source(&self) -> Arc<dyn EnsProfileSource> {
        Arc::new(StaticProfileSource::new(self.profiles.clone()))
    }
}

/// Table-backed naming provider. Names match exactly, scoped per chain.
#[derive(Debug, Clone)]
pub struct StaticNamingProvider {
    id: ProviderId,
    records: Vec<NameRecord>,
    latency: Option<Duration>,
}

impl StaticNamingProvider {
    pub fn new(id: ProviderId) -> Self {
        Self::from_records(id, Vec::new())
    }

    pub fn from_records(id: ProviderId, records: Vec<NameRecord>) -> Self {
        Self {
            id,
            records,
            latency: None,
        }
    }

    pub fn with_record(mut self, chain_id: ChainId, name: &str, address: Address) -> Self {
        self.records.push(NameRecord {
            chain_id,
            name: name.to_string(),
            address,
        });
        self
    }

    /// Delays every answer, to simulate a slow provider.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn wait(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl NamingProvider for StaticNamingProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn resolve_name(&self, name: &str, scope: ChainId) -> Result<Option<Address>> {
        self.wait().await;
        let address = self
            .records
            .iter()
            .find(|r| r.chain_id == scope && r.name == name)
            .map(|r| r.address);
        debug!("{} resolve {} on {}: {:?}", self.id, name, scope, address);
        Ok(address)
    }

    async fn lookup_address(&self, address: Address, scope: ChainId) -> Result<Option<String>> {
        self.wait().await;
        Ok(self
            .records
            .iter()
            .find(|r| r.chain_id == scope && r.address == address)
            .map(|r| r.name.clone()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticProfileSource {
    records: Vec<ProfileRecord>,
}

impl StaticProfileSource {
    pub fn new(records: Vec<ProfileRecord>) -> Self {
        Self { records }
    }

    fn record(&self, name: &str, scope: ChainId) -> Option<&ProfileRecord> {
        self.records
            .iter()
            .find(|r| r.chain_id == scope && r.name == name)
    }
}

#[async_trait]
impl EnsProfileSource for StaticProfileSource {
    async fn avatar(&self, name: &str, scope: ChainId) -> Result<Option<String>> {
        Ok(self.record(name, scope).and_then(|r| r.avatar.clone()))
    }

    async fn text(&self, name: &str, key: &str, scope: ChainId) -> Result<Option<String>> {
        Ok(self
            .record(name, scope)
            .and_then(|r| r.texts.get(key).cloned()))
    }
}

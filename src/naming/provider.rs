use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chain::ChainId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Sid,
    Uns,
    Ens,
}

impl ProviderId {
    /// Fetch order: SID first since it is the likely hit on the home chain.
    pub const FETCH_ORDER: [ProviderId; 3] = [ProviderId::Sid, ProviderId::Uns, ProviderId::Ens];

    /// Display precedence: ENS is treated as most authoritative.
    pub const PRECEDENCE: [ProviderId; 3] = [ProviderId::Ens, ProviderId::Sid, ProviderId::Uns];
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProviderId::Sid => "SID",
            ProviderId::Uns => "UNS",
            ProviderId::Ens => "ENS",
        };
        f.write_str(label)
    }
}

/// An opaque naming system. Implementations own their protocol and transport;
/// the fan-out only relies on these two lookups and their `Ok(None)` meaning
/// "this provider has no record".
#[async_trait]
pub trait NamingProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Forward resolution: name to address.
    async fn resolve_name(&self, name: &str, scope: ChainId) -> Result<Option<Address>>;

    /// Reverse resolution: address to primary name.
    async fn lookup_address(&self, address: Address, scope: ChainId) -> Result<Option<String>>;
}

/// Profile records that only exist for ENS names.
#[async_trait]
pub trait EnsProfileSource: Send + Sync {
    async fn avatar(&self, name: &str, scope: ChainId) -> Result<Option<String>>;

    async fn text(&self, name: &str, key: &str, scope: ChainId) -> Result<Option<String>>;
}

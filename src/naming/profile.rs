use alloy_primitives::Address;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::fanout::NamingFanout;
use super::provider::{EnsProfileSource, ProviderId};
use crate::chain::{self, ChainId};

const TWITTER_KEYS: [&str; 2] = ["com.twitter", "vnd.twitter"];
const GITHUB_KEY: &str = "com.github";
const URL_KEY: &str = "url";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SocialProfile {
    pub twitter: Option<String>,
    pub github: Option<String>,
    pub url: Option<String>,
}

impl SocialProfile {
    fn is_empty(&self) -> bool {
        self.twitter.is_none() && self.github.is_none() && self.url.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DomainProfile {
    pub domain_name: Option<String>,
    pub provider: Option<ProviderId>,
    pub avatar: Option<String>,
    pub social: Option<SocialProfile>,
}

/// Reverse lookup of an address to its display name, with ENS avatar and
/// social records when the name comes from ENS.
pub struct DomainResolver {
    fanout: Arc<NamingFanout>,
    profile: Option<Arc<dyn EnsProfileSource>>,
}

impl DomainResolver {
    pub fn new(fanout: Arc<NamingFanout>, profile: Option<Arc<dyn EnsProfileSource>>) -> Self {
        Self { fanout, profile }
    }

    pub async fn domain_for_address(&self, address: Address, chain_id: ChainId) -> DomainProfile {
        let names = self.fanout.lookup_address(address, chain_id).await;
        let winner = names.winner();

        let ens_name = names.slot(ProviderId::Ens).found().cloned();
        let (avatar, social) = match (ens_name, &self.profile) {
            (Some(name), Some(source)) if chain::supports_ens(chain_id) => {
                let scope = chain::ens_scope(chain_id);
                tokio::join!(
                    self.avatar(source.as_ref(), &name, scope),
                    self.social(source.as_ref(), &name, scope)
                )
            }
            _ => (None, None),
        };

        DomainProfile {
            domain_name: winner.as_ref().map(|(_, name)| name.clone()),
            provider: winner.map(|(id, _)| id),
            avatar,
            social,
        }
    }

    async fn avatar(
        &self,
        source: &dyn EnsProfileSource,
        name: &str,
        scope: ChainId,
    ) -> Option<String> {
        let call_timeout = self.fanout.call_timeout();
        match timeout(call_timeout, source.avatar(name, scope)).await {
            Ok(Ok(avatar)) => avatar.filter(|a| !a.is_empty()),
            Ok(Err(e)) => {
                warn!("ENS avatar lookup for {} failed: {}", name, e);
                None
            }
            Err(_) => {
                warn!("ENS avatar lookup for {} timed out", name);
                None
            }
        }
    }

    async fn social(
        &self,
        source: &dyn EnsProfileSource,
        name: &str,
        scope: ChainId,
    ) -> Option<SocialProfile> {
        let call_timeout = self.fanout.call_timeout();

        let twitter = async {
            for key in TWITTER_KEYS {
                if let Some(handle) = text_record(source, name, key, scope, call_timeout).await {
                    return Some(handle);
                }
            }
            None
        };

        let (twitter, github, url) = tokio::join!(
            twitter,
            text_record(source, name, GITHUB_KEY, scope, call_timeout),
            text_record(source, name, URL_KEY, scope, call_timeout)
        );

        let social = SocialProfile {
            twitter: twitter.map(strip_handle),
            github: github.map(strip_handle),
            url,
        };

        if social.is_empty() { None } else { Some(social) }
    }
}

async fn text_record(
    source: &dyn EnsProfileSource,
    name: &str,
    key: &str,
    scope: ChainId,
    call_timeout: Duration,
) -> Option<String> {
    match timeout(call_timeout, source.text(name, key, scope)).await {
        Ok(Ok(value)) => {
            debug!("ENS text {} for {}: {:?}", key, name, value);
            value.filter(|v| !v.is_empty())
        }
        Ok(Err(e)) => {
            warn!("ENS text {} for {} failed: {}", key, name, e);
            None
        }
        Err(_) => {
            warn!("ENS text {} for {} timed out", key, name);
            None
        }
    }
}

fn strip_handle(handle: String) -> String {
    match handle.strip_prefix('@') {
        Some(stripped) => stripped.to_string(),
        None => handle,
    }
}

use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

use crate::chain::ChainId;
use crate::token::TokenIdentity;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsupportedEntry {
    pub chain_id: ChainId,
    pub address: Address,
}

/// Token-list JSON as published by token list maintainers, plus an
/// `unsupported` section of addresses known not to be importable tokens.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenListFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tokens: Vec<TokenIdentity>,
    #[serde(default)]
    pub unsupported: Vec<UnsupportedEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: HashMap<(ChainId, Address), TokenIdentity>,
    unsupported: HashSet<(ChainId, Address)>,
}

impl StaticTokens {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read token list {}", path.display()))?;
        let file: TokenListFile = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid token list {}", path.display()))?;

        info!(
            "Loaded token list {:?}: {} tokens, {} unsupported",
            file.name,
            file.tokens.len(),
            file.unsupported.len()
        );
        Ok(Self::from(file))
    }

    pub fn find(&self, chain_id: ChainId, address: &Address) -> Option<&TokenIdentity> {
        self.tokens.get(&(chain_id, *address))
    }

    pub fn is_unsupported(&self, chain_id: ChainId, address: &Address) -> bool {
        self.unsupported.contains(&(chain_id, *address))
    }
}

impl From<TokenListFile> for StaticTokens {
    fn from(file: TokenListFile) -> Self {
        Self {
            tokens: file.tokens.into_iter().map(|t| (t.key(), t)).collect(),
            unsupported: file
                .unsupported
                .into_iter()
                .map(|e| (e.chain_id, e.address))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_token_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "name": "PancakeSwap Extended",
                "tokens": [{{
                    "chainId": 56,
                    "address": "0x0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82",
                    "decimals": 18,
                    "symbol": "CAKE",
                    "name": "PancakeSwap Token"
                }}],
                "unsupported": [{{ "chainId": 56, "address": "0x000000000000000000000000000000000000dEaD" }}]
            }}"#
        )
        .unwrap();

        let list = StaticTokens::load(file.path()).unwrap();
        let cake: Address = "0x0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82".parse().unwrap();
        let dead: Address = "0x000000000000000000000000000000000000dEaD".parse().unwrap();

        assert_eq!(list.find(56, &cake).map(|t| t.symbol.as_str()), Some("CAKE"));
        assert!(list.find(1, &cake).is_none());
        assert!(list.is_unsupported(56, &dead));
        assert!(!list.is_unsupported(1, &dead));
    }
}

//! Known-token registry adapter.
//!
//! Answers "is this address already a known token on this chain?" from the
//! user's persisted tokens and an optional static token list, and exposes
//! the add/remove/clear operations on the user's tokens.

pub mod token_list;

use alloy_primitives::Address;
use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::{debug, info};

use crate::chain::ChainId;
use crate::token::TokenIdentity;

pub use token_list::{StaticTokens, TokenListFile, UnsupportedEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLookup {
    Found(TokenIdentity),
    /// Known and confirmed not to be an importable token.
    Absent,
    /// Not in any list; only the chain can tell.
    Unknown,
}

/// Persisted chain-scoped ordered set of user-added tokens.
pub trait RegistryStore: Send + Sync {
    fn get(&self, chain_id: ChainId, address: &Address) -> Result<Option<TokenIdentity>>;

    fn list(&self, chain_id: ChainId) -> Result<Vec<TokenIdentity>>;

    /// Returns false when the token was already present.
    fn insert(&self, token: &TokenIdentity) -> Result<bool>;

    fn delete(&self, chain_id: ChainId, address: &Address) -> Result<bool>;

    fn snapshot(&self, chain_id: ChainId) -> Result<Vec<Address>>;

    /// Removes exactly `addresses`, atomically.
    fn delete_snapshot(&self, chain_id: ChainId, addresses: &[Address]) -> Result<usize>;
}

pub struct TokenRegistry {
    store: Arc<dyn RegistryStore>,
    static_tokens: StaticTokens,
}

impl TokenRegistry {
    pub fn new(store: Arc<dyn RegistryStore>, static_tokens: StaticTokens) -> Self {
        Self {
            store,
            static_tokens,
        }
    }

    pub fn lookup(&self, chain_id: ChainId, address: &Address) -> Result<TokenLookup> {
        if let Some(token) = self.store.get(chain_id, address)? {
            debug!("{} found in user tokens on chain {}", address, chain_id);
            return Ok(TokenLookup::Found(token));
        }

        if let Some(token) = self.static_tokens.find(chain_id, address) {
            debug!("{} found in token list on chain {}", address, chain_id);
            return Ok(TokenLookup::Found(token.clone()));
        }

        if self.static_tokens.is_unsupported(chain_id, address) {
            debug!("{} is listed as unsupported on chain {}", address, chain_id);
            return Ok(TokenLookup::Absent);
        }

        Ok(TokenLookup::Unknown)
    }

    pub fn user_tokens(&self, chain_id: ChainId) -> Result<Vec<TokenIdentity>> {
        self.store.list(chain_id)
    }

    pub fn add(&self, chain_id: ChainId, token: &TokenIdentity) -> Result<()> {
        if token.chain_id != chain_id {
            bail!(
                "Token {} belongs to chain {}, not {}",
                token.address,
                token.chain_id,
                chain_id
            );
        }

        if self.store.insert(token)? {
            info!("Added {} ({}) on chain {}", token.symbol, token.address, chain_id);
        } else {
            debug!("{} already present on chain {}", token.address, chain_id);
        }
        Ok(())
    }

    pub fn remove(&self, chain_id: ChainId, address: &Address) -> Result<()> {
        if self.store.delete(chain_id, address)? {
            info!("Removed {} on chain {}", address, chain_id);
        }
        Ok(())
    }

    /// Removes the tokens present at call time. Tokens added while this runs
    /// are kept.
    pub fn remove_all(&self, chain_id: ChainId) -> Result<usize> {
        let snapshot = self.store.snapshot(chain_id)?;
        let removed = self.store.delete_snapshot(chain_id, &snapshot)?;
        info!("Removed {} user tokens on chain {}", removed, chain_id);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{Database, SqliteRegistryStore};

    fn token(byte: u8, symbol: &str) -> TokenIdentity {
        TokenIdentity::new(56, Address::repeat_byte(byte), 18, symbol, symbol)
    }

    fn store() -> Arc<SqliteRegistryStore> {
        Arc::new(SqliteRegistryStore::new(Database::in_memory().unwrap()))
    }

    fn symbols(registry: &TokenRegistry) -> Vec<String> {
        registry
            .user_tokens(56)
            .unwrap()
            .into_iter()
            .map(|t| t.symbol)
            .collect()
    }

    #[test]
    fn test_lookup_tri_state() {
        let listed = token(1, "LISTED");
        let file = TokenListFile {
            name: "test".into(),
            tokens: vec![listed.clone()],
            unsupported: vec![UnsupportedEntry {
                chain_id: 56,
                address: Address::repeat_byte(2),
            }],
        };
        let registry = TokenRegistry::new(store(), StaticTokens::from(file));

        assert_eq!(
            registry.lookup(56, &listed.address).unwrap(),
            TokenLookup::Found(listed)
        );
        assert_eq!(
            registry.lookup(56, &Address::repeat_byte(2)).unwrap(),
            TokenLookup::Absent
        );
        assert_eq!(
            registry.lookup(56, &Address::repeat_byte(3)).unwrap(),
            TokenLookup::Unknown
        );
    }

    #[test]
    fn test_user_token_shadows_list() {
        let registry = TokenRegistry::new(store(), StaticTokens::default());
        let mine = token(4, "MINE");
        registry.add(56, &mine).unwrap();
        assert_eq!(
            registry.lookup(56, &mine.address).unwrap(),
            TokenLookup::Found(mine)
        );
    }

    #[test]
    fn test_add_is_idempotent_and_remove_missing_is_noop() {
        let registry = TokenRegistry::new(store(), StaticTokens::default());
        registry.add(56, &token(1, "A")).unwrap();
        registry.add(56, &token(1, "A")).unwrap();
        registry.remove(56, &Address::repeat_byte(9)).unwrap();
        assert_eq!(symbols(&registry), vec!["A"]);
    }

    #[test]
    fn test_add_rejects_chain_mismatch() {
        let registry = TokenRegistry::new(store(), StaticTokens::default());
        assert!(registry.add(1, &token(1, "A")).is_err());
    }

    #[test]
    fn test_remove_all_only_touches_its_chain() {
        let registry = TokenRegistry::new(store(), StaticTokens::default());
        let mut other = token(1, "ETH-A");
        other.chain_id = 1;
        registry.add(56, &token(1, "A")).unwrap();
        registry.add(1, &other).unwrap();

        assert_eq!(registry.remove_all(56).unwrap(), 1);
        assert!(registry.user_tokens(56).unwrap().is_empty());
        assert_eq!(registry.user_tokens(1).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_all_keeps_tokens_added_after_snapshot() {
        let store = store();
        let registry = TokenRegistry::new(store.clone(), StaticTokens::default());
        for (byte, symbol) in [(1, "A"), (2, "B"), (3, "C")] {
            registry.add(56, &token(byte, symbol)).unwrap();
        }

        let snapshot = store.snapshot(56).unwrap();
        registry.add(56, &token(4, "D")).unwrap();
        assert_eq!(store.delete_snapshot(56, &snapshot).unwrap(), 3);

        assert_eq!(symbols(&registry), vec!["D"]);
    }

    #[test]
    fn test_remove_all_concurrent_with_adds() {
        let registry = Arc::new(TokenRegistry::new(store(), StaticTokens::default()));
        for byte in 1..=20 {
            registry.add(56, &token(byte, &format!("T{byte}"))).unwrap();
        }

        let adder = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for byte in 21..=40 {
                    registry.add(56, &token(byte, &format!("T{byte}"))).unwrap();
                }
            })
        };
        let removed = registry.remove_all(56).unwrap();
        adder.join().unwrap();

        let remaining = registry.user_tokens(56).unwrap();
        // every token is either removed by the snapshot or survives it, never both
        assert_eq!(removed + remaining.len(), 40);
        assert!(remaining.iter().all(|t| t.address.0[0] > 20));
    }
}

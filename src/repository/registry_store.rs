use alloy_primitives::Address;
use anyhow::{Result, anyhow};
use std::sync::{Mutex, MutexGuard};

use super::database::Database;
use super::token_repository::UserTokenRepository;
use crate::chain::ChainId;
use crate::registry::RegistryStore;
use crate::token::TokenIdentity;

/// SQLite-backed store for user-added tokens. The connection sits behind a
/// mutex so every operation, including a snapshot removal, is serialized.
pub struct SqliteRegistryStore {
    db: Mutex<Database>,
}

impl SqliteRegistryStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| anyhow!("registry store lock poisoned"))
    }
}

impl RegistryStore for SqliteRegistryStore {
    fn get(&self, chain_id: ChainId, address: &Address) -> Result<Option<TokenIdentity>> {
        let db = self.db()?;
        UserTokenRepository::new(&db.conn).find(chain_id, address)
    }

    fn list(&self, chain_id: ChainId) -> Result<Vec<TokenIdentity>> {
        let db = self.db()?;
        UserTokenRepository::new(&db.conn).list(chain_id)
    }

    fn insert(&self, token: &TokenIdentity) -> Result<bool> {
        let db = self.db()?;
        UserTokenRepository::new(&db.conn).insert(token)
    }

    fn delete(&self, chain_id: ChainId, address: &Address) -> Result<bool> {
        let db = self.db()?;
        UserTokenRepository::new(&db.conn).delete(chain_id, address)
    }

    fn snapshot(&self, chain_id: ChainId) -> Result<Vec<Address>> {
        let db = self.db()?;
        UserTokenRepository::new(&db.conn).addresses(chain_id)
    }

    fn delete_snapshot(&self, chain_id: ChainId, addresses: &[Address]) -> Result<usize> {
        let db = self.db()?;
        UserTokenRepository::new(&db.conn).delete_many(chain_id, addresses)
    }
}

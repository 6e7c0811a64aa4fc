use alloy_primitives::Address;
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};
use std::str::FromStr;

use crate::chain::ChainId;
use crate::token::TokenIdentity;

pub struct UserTokenRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> UserTokenRepository<'a> {
    const INSERT_TOKEN: &'static str =
        "INSERT OR IGNORE INTO user_tokens (chain_id, address, decimals, symbol, name)
         VALUES (?1, ?2, ?3, ?4, ?5)";

    const DELETE_TOKEN: &'static str =
        "DELETE FROM user_tokens WHERE chain_id = ?1 AND address = ?2";

    const SELECT_TOKEN: &'static str = "SELECT chain_id, address, decimals, symbol, name
         FROM user_tokens WHERE chain_id = ?1 AND address = ?2";

    const SELECT_TOKENS: &'static str = "SELECT chain_id, address, decimals, symbol, name
         FROM user_tokens WHERE chain_id = ?1 ORDER BY id";

    const SELECT_ADDRESSES: &'static str =
        "SELECT address FROM user_tokens WHERE chain_id = ?1 ORDER BY id";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Returns false when the token was already present.
    pub fn insert(&self, token: &TokenIdentity) -> Result<bool> {
        let inserted = self.conn.execute(
            Self::INSERT_TOKEN,
            params![
                token.chain_id as i64,
                token.address.to_checksum(None),
                token.decimals,
                token.symbol,
                token.name
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn delete(&self, chain_id: ChainId, address: &Address) -> Result<bool> {
        let deleted = self
            .conn
            .execute(Self::DELETE_TOKEN, params![chain_id as i64, address.to_checksum(None)])?;
        Ok(deleted > 0)
    }

    /// Deletes exactly the given addresses in one transaction.
    pub fn delete_many(&self, chain_id: ChainId, addresses: &[Address]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;

        {
            let mut stmt = tx.prepare(Self::DELETE_TOKEN)?;
            for address in addresses {
                count += stmt.execute(params![chain_id as i64, address.to_checksum(None)])?;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    pub fn find(&self, chain_id: ChainId, address: &Address) -> Result<Option<TokenIdentity>> {
        let token = self
            .conn
            .query_row(
                Self::SELECT_TOKEN,
                params![chain_id as i64, address.to_checksum(None)],
                Self::row_to_token,
            )
            .optional()?;
        Ok(token)
    }

    pub fn list(&self, chain_id: ChainId) -> Result<Vec<TokenIdentity>> {
        let mut stmt = self.conn.prepare(Self::SELECT_TOKENS)?;
        let tokens = stmt
            .query_map(params![chain_id as i64], Self::row_to_token)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tokens)
    }

    pub fn addresses(&self, chain_id: ChainId) -> Result<Vec<Address>> {
        let mut stmt = self.conn.prepare(Self::SELECT_ADDRESSES)?;
        let addresses = stmt
            .query_map(params![chain_id as i64], |row| {
                let address: String = row.get(0)?;
                parse_address(0, &address)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(addresses)
    }

    fn row_to_token(row: &Row) -> rusqlite::Result<TokenIdentity> {
        let address: String = row.get(1)?;
        Ok(TokenIdentity {
            chain_id: row.get::<_, i64>(0)? as ChainId,
            address: parse_address(1, &address)?,
            decimals: row.get(2)?,
            symbol: row.get(3)?,
            name: row.get(4)?,
        })
    }
}

fn parse_address(column: usize, value: &str) -> rusqlite::Result<Address> {
    Address::from_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

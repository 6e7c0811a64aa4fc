//! Token metadata verifier.
//!
//! Reads `decimals`, `symbol` and `name` in one batch and decides whether the
//! address is a token. Outcomes are cached per `(chain, address)` for the
//! life of the verifier and never re-queried. A transport failure is returned
//! as an error and not cached, since it says nothing about the contract.

pub mod chain_reader;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::chain::ChainId;
use crate::registry::TokenLookup;
use crate::token::{TokenIdentity, UNKNOWN_NAME, UNKNOWN_SYMBOL};

pub use chain_reader::{CallOutcome, ChainReader, FieldValue, TokenField};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Unknown,
    Confirmed(TokenIdentity),
    NotAToken,
}

impl VerificationOutcome {
    pub fn is_settled(&self) -> bool {
        !matches!(self, VerificationOutcome::Unknown)
    }
}

/// Gate for the chain read: there is an address, a chain, the registry could
/// not answer, and the address has a concrete basis (a name resolved to it,
/// or the raw input is itself an address).
pub fn should_check_contract(
    address: Option<Address>,
    chain_id: Option<ChainId>,
    lookup: Option<&TokenLookup>,
    has_basis: bool,
) -> bool {
    address.is_some()
        && chain_id.is_some()
        && matches!(lookup, Some(TokenLookup::Unknown))
        && has_basis
}

/// All three calls must succeed. A successful but empty symbol or name falls
/// back to a placeholder; an empty decimals cannot.
pub fn synthesize(
    chain_id: ChainId,
    address: Address,
    outcomes: &[CallOutcome],
) -> VerificationOutcome {
    let [decimals, symbol, name] = outcomes else {
        return VerificationOutcome::NotAToken;
    };

    match (decimals, symbol, name) {
        (
            CallOutcome::Success(Some(FieldValue::Decimals(decimals))),
            CallOutcome::Success(symbol),
            CallOutcome::Success(name),
        ) => VerificationOutcome::Confirmed(TokenIdentity::new(
            chain_id,
            address,
            *decimals,
            text_or(symbol, UNKNOWN_SYMBOL),
            text_or(name, UNKNOWN_NAME),
        )),
        _ => VerificationOutcome::NotAToken,
    }
}

fn text_or(value: &Option<FieldValue>, fallback: &str) -> String {
    match value {
        Some(FieldValue::Text(text)) if !text.is_empty() => text.clone(),
        _ => fallback.to_string(),
    }
}

pub struct TokenVerifier {
    reader: Arc<dyn ChainReader>,
    cache: Mutex<HashMap<(ChainId, Address), VerificationOutcome>>,
}

impl TokenVerifier {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self {
            reader,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached(&self, chain_id: ChainId, address: &Address) -> Option<VerificationOutcome> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(chain_id, *address))
            .cloned()
    }

    pub async fn verify(&self, chain_id: ChainId, address: Address) -> Result<VerificationOutcome> {
        if let Some(outcome) = self.cached(chain_id, &address) {
            debug!("Verification cache hit for {} on chain {}", address, chain_id);
            return Ok(outcome);
        }

        info!("Reading token metadata of {} on chain {}", address, chain_id);
        let outcomes = self
            .reader
            .batch_read(chain_id, address, &TokenField::METADATA)
            .await
            .with_context(|| format!("Failed to read token metadata of {}", address))?;

        for (field, outcome) in TokenField::METADATA.iter().zip(&outcomes) {
            if let CallOutcome::Failure(reason) = outcome {
                debug!("{:?} call on {} failed: {}", field, address, reason);
            }
        }

        let outcome = synthesize(chain_id, address, &outcomes);
        match &outcome {
            VerificationOutcome::Confirmed(token) => {
                info!("{} is {} ({})", address, token.symbol, token.name)
            }
            _ => info!("{} is not a token contract", address),
        }

        // First settled outcome wins if two reads raced.
        Ok(self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((chain_id, address))
            .or_insert(outcome)
            .clone())
    }
}

use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;

use crate::chain::ChainId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenField {
    Decimals,
    Symbol,
    Name,
}

impl TokenField {
    /// The three reads that make up token metadata, in result order.
    pub const METADATA: [TokenField; 3] =
        [TokenField::Decimals, TokenField::Symbol, TokenField::Name];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Decimals(u8),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call succeeded; `None` when it returned no data.
    Success(Option<FieldValue>),
    Failure(String),
}

/// Batched, failure-tolerant contract reads. Results come back in call
/// order, one per requested field; one call failing does not abort the
/// others. `Err` is reserved for the batch as a whole not reaching the chain.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn batch_read(
        &self,
        chain_id: ChainId,
        address: Address,
        fields: &[TokenField],
    ) -> Result<Vec<CallOutcome>>;
}

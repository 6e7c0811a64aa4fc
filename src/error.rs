use alloy_primitives::Address;
use thiserror::Error;

use crate::naming::ProviderId;

/// User-facing outcomes that stop a resolution short of a confirmed token.
///
/// None of these are fatal. Provider and chain-read failures are captured at
/// their boundary and folded into state; this type only names them so the
/// display layer can pick a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("enter a valid token address or name, got {query:?}")]
    InvalidQuery { query: String },

    #[error("naming provider {provider} unavailable: {reason}")]
    NamingProviderUnavailable { provider: ProviderId, reason: String },

    #[error("no naming provider resolved {name}")]
    NameNotFound { name: String },

    #[error("failed to read token metadata from {address}: {reason}")]
    ChainReadFailure { address: Address, reason: String },

    #[error("{name} resolved to {address}, but this address is not a token contract")]
    AmbiguousNoToken { name: String, address: Address },
}

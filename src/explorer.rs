use alloy_primitives::Address;
use std::fmt;

use crate::chain::{BSC_TESTNET, ChainId, ETHEREUM, GOERLI};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Address,
    Token,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Address => write!(f, "address"),
            LinkKind::Token => write!(f, "token"),
        }
    }
}

/// Unknown chains fall back to BscScan.
pub fn explorer_base(chain_id: ChainId) -> &'static str {
    match chain_id {
        ETHEREUM => "https://etherscan.io",
        GOERLI => "https://goerli.etherscan.io",
        BSC_TESTNET => "https://testnet.bscscan.com",
        _ => "https://bscscan.com",
    }
}

pub fn explorer_link(address: &Address, kind: LinkKind, chain_id: ChainId) -> String {
    format!(
        "{}/{}/{}",
        explorer_base(chain_id),
        kind,
        address.to_checksum(None)
    )
}

pub type ChainId = u64;

pub const ETHEREUM: ChainId = 1;
pub const GOERLI: ChainId = 5;
pub const BSC: ChainId = 56;
pub const BSC_TESTNET: ChainId = 97;

/// ENS is not deployed on BSC or its testnet; every other chain reads ENS
/// from Ethereum (or Goerli when the user is on Goerli).
pub fn supports_ens(chain_id: ChainId) -> bool {
    chain_id != BSC && chain_id != BSC_TESTNET
}

pub fn ens_scope(chain_id: ChainId) -> ChainId {
    if chain_id == GOERLI { GOERLI } else { ETHEREUM }
}

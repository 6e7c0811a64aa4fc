use alloy_primitives::Address;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::chain::{BSC, ChainId};

pub const DEFAULT_MULTICALL_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

#[derive(Debug, Clone)]
pub struct Config {
    pub json_rpc_urls: Vec<String>,
    pub chain_id: ChainId,
    pub database_url: String,
    pub debounce: Duration,
    pub provider_timeout: Duration,
    pub multicall_address: Address,
    pub token_list_path: Option<PathBuf>,
    pub names_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let json_rpc_urls = std::env::var("JSON_RPC_URLS")
            .or_else(|_| std::env::var("JSON_RPC_URL"))
            .map(|urls| parse_urls(&urls))
            .unwrap_or_default();

        let chain_id = parse_or("CHAIN_ID", BSC)?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:./tokens.db".to_string());

        let debounce = Duration::from_millis(parse_or("DEBOUNCE_MS", 500)?);
        let provider_timeout = Duration::from_millis(parse_or("PROVIDER_TIMEOUT_MS", 5000)?);

        let multicall_str = std::env::var("MULTICALL_ADDRESS")
            .unwrap_or_else(|_| DEFAULT_MULTICALL_ADDRESS.to_string());
        let multicall_address =
            Address::from_str(&multicall_str).context("Invalid MULTICALL_ADDRESS format")?;

        let token_list_path = std::env::var("TOKEN_LIST_PATH").ok().map(PathBuf::from);
        let names_path = std::env::var("NAMES_PATH").ok().map(PathBuf::from);

        Ok(Config {
            json_rpc_urls,
            chain_id,
            database_url,
            debounce,
            provider_timeout,
            multicall_address,
            token_list_path,
            names_path,
        })
    }

    /// Chain reads need at least one endpoint; everything else works without.
    pub fn require_rpc(&self) -> Result<&[String]> {
        if self.json_rpc_urls.is_empty() {
            anyhow::bail!("JSON_RPC_URLS (or JSON_RPC_URL) must be set in .env for chain reads");
        }
        Ok(&self.json_rpc_urls)
    }
}

fn parse_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(String::from)
        .collect()
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key}: {value}")),
        Err(_) => Ok(default),
    }
}

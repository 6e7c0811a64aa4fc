use crate::chain::ChainId;
use crate::naming::DomainResolver;
use crate::normalizer;
use crate::orchestrator::{ImportSink, Observation, Resolver, Status};
use crate::query::formatters::{OutputFormat, format_domain, format_observation, format_tokens};
use crate::registry::TokenRegistry;
use crate::token::TokenIdentity;
use alloy_primitives::Address;
use anyhow::Result;

/// Points the user at `add` when `resolve` confirms a token.
pub struct ImportHint;

impl ImportSink for ImportHint {
    fn offer(&self, token: &TokenIdentity) {
        eprintln!(
            "{} ({}) can be imported with: tokens add {}",
            token.symbol,
            token.name,
            token.address.to_checksum(None)
        );
    }
}

fn parse_address(address: &str) -> Result<Address> {
    normalizer::parse_address(address.trim())
        .ok_or_else(|| anyhow::anyhow!("Invalid address format: {}", address))
}

pub async fn cmd_resolve(
    resolver: &Resolver,
    query: &str,
    format: &OutputFormat,
) -> Result<Observation> {
    resolver.submit(query)?;
    let observation = resolver.settled().await?;
    let output = format_observation(&observation, format);
    println!("{output}");

    Ok(observation)
}

pub async fn cmd_add(
    resolver: &Resolver,
    registry: &TokenRegistry,
    chain_id: ChainId,
    query: &str,
    format: &OutputFormat,
) -> Result<()> {
    let observation = cmd_resolve(resolver, query, format).await?;

    let token = match (observation.status, observation.identity) {
        (Status::Confirmed, Some(token)) => token,
        (status, _) => {
            let reason = observation
                .error
                .map_or_else(|| format!("{status:?}"), |e| e.to_string());
            return Err(anyhow::anyhow!("Cannot add {}: {}", query, reason));
        }
    };

    registry.add(chain_id, &token)?;
    println!("Added {} to the token list.", token.symbol);

    Ok(())
}

pub fn cmd_remove(registry: &TokenRegistry, chain_id: ChainId, address: &str) -> Result<()> {
    let address = parse_address(address)?;
    registry.remove(chain_id, &address)?;
    println!("Removed {}.", address.to_checksum(None));

    Ok(())
}

pub fn cmd_clear(registry: &TokenRegistry, chain_id: ChainId) -> Result<()> {
    let removed = registry.remove_all(chain_id)?;
    println!("Removed {removed} tokens.");

    Ok(())
}

pub fn cmd_list(registry: &TokenRegistry, chain_id: ChainId, format: &OutputFormat) -> Result<()> {
    let tokens = registry.user_tokens(chain_id)?;
    let output = format_tokens(&tokens, chain_id, format);
    println!("{output}");

    Ok(())
}

pub async fn cmd_domain(
    resolver: &DomainResolver,
    chain_id: ChainId,
    address: &str,
    format: &OutputFormat,
) -> Result<()> {
    let address = parse_address(address)?;
    let profile = resolver.domain_for_address(address, chain_id).await;
    let output = format_domain(&address, &profile, chain_id, format);
    println!("{output}");

    Ok(())
}

use crate::chain::ChainId;
use crate::explorer::{LinkKind, explorer_link};
use crate::naming::DomainProfile;
use crate::orchestrator::{Observation, Provenance};
use crate::token::TokenIdentity;
use alloy_primitives::Address;
use comfy_table::{Cell, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use csv::Writer;
use serde_json::json;

#[derive(Debug, Clone)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            _ => OutputFormat::Table,
        }
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table
}

fn finish_csv(wtr: Writer<Vec<u8>>) -> String {
    String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
}

fn provenance_label(provenance: Provenance) -> String {
    match provenance {
        Provenance::DirectInput => "input".to_string(),
        Provenance::NamingProvider(id) => id.to_string(),
    }
}

/// Key/value rows shared by every observation format.
fn observation_rows(observation: &Observation) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("query", observation.query.clone()),
        ("status", format!("{:?}", observation.status)),
    ];

    if let Some(resolved) = observation.resolved {
        rows.push(("address", resolved.address.to_checksum(None)));
        rows.push(("resolved_by", provenance_label(resolved.provenance)));
    }

    if let Some(token) = &observation.identity {
        rows.push(("symbol", token.symbol.clone()));
        rows.push(("name", token.name.clone()));
        rows.push(("decimals", token.decimals.to_string()));
    }

    for result in &observation.naming {
        let value = result
            .value
            .map_or("-".to_string(), |address| address.to_checksum(None));
        rows.push(("naming", format!("{}: {}", result.provider, value)));
    }

    for failure in &observation.provider_failures {
        rows.push(("warning", failure.to_string()));
    }

    if let Some(error) = &observation.error {
        rows.push(("error", error.to_string()));
    }

    rows
}

pub fn format_observation(observation: &Observation, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(vec!["Field", "Value"]);
            for (key, value) in observation_rows(observation) {
                table.add_row(vec![Cell::new(key), Cell::new(value)]);
            }
            table.to_string()
        }
        OutputFormat::Json => {
            let output = json!({
                "query": observation.query,
                "status": observation.status,
                "phase": observation.phase,
                "resolved": observation.resolved,
                "token": observation.identity,
                "flags": observation.flags,
                "naming": observation.naming,
                "naming_loading": observation.naming_loading,
                "warnings": observation
                    .provider_failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>(),
                "error": observation.error.as_ref().map(ToString::to_string),
            });
            serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Csv => {
            let mut wtr = Writer::from_writer(vec![]);
            let _ = wtr.write_record(["field", "value"]);
            for (key, value) in observation_rows(observation) {
                let _ = wtr.write_record([key, value.as_str()]);
            }
            finish_csv(wtr)
        }
    }
}

pub fn format_tokens(tokens: &[TokenIdentity], chain_id: ChainId, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            if tokens.is_empty() {
                return "No tokens added.".to_string();
            }

            let mut table = new_table();
            table.set_header(vec!["Symbol", "Name", "Decimals", "Address", "Explorer"]);
            for token in tokens {
                table.add_row(vec![
                    Cell::new(&token.symbol),
                    Cell::new(&token.name),
                    Cell::new(token.decimals),
                    Cell::new(format_address_short(&token.address)),
                    Cell::new(explorer_link(&token.address, LinkKind::Token, chain_id)),
                ]);
            }
            table.to_string()
        }
        OutputFormat::Json => {
            let json_tokens: Vec<_> = tokens
                .iter()
                .map(|t| {
                    json!({
                        "chainId": t.chain_id,
                        "address": t.address.to_checksum(None),
                        "symbol": t.symbol,
                        "name": t.name,
                        "decimals": t.decimals,
                        "explorer": explorer_link(&t.address, LinkKind::Token, chain_id),
                    })
                })
                .collect();
            serde_json::to_string_pretty(&json_tokens).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => {
            let mut wtr = Writer::from_writer(vec![]);
            let _ = wtr.write_record([
                "chain_id", "address", "symbol", "name", "decimals", "explorer",
            ]);
            for token in tokens {
                let _ = wtr.write_record([
                    &token.chain_id.to_string(),
                    &token.address.to_checksum(None),
                    &token.symbol,
                    &token.name,
                    &token.decimals.to_string(),
                    &explorer_link(&token.address, LinkKind::Token, chain_id),
                ]);
            }
            finish_csv(wtr)
        }
    }
}

pub fn format_domain(
    address: &Address,
    profile: &DomainProfile,
    chain_id: ChainId,
    format: &OutputFormat,
) -> String {
    let social = profile.social.clone().unwrap_or_default();
    let rows = [
        ("address", Some(address.to_checksum(None))),
        ("domain", profile.domain_name.clone()),
        ("provider", profile.provider.map(|p| p.to_string())),
        ("avatar", profile.avatar.clone()),
        ("twitter", social.twitter),
        ("github", social.github),
        ("url", social.url),
        ("explorer", Some(explorer_link(address, LinkKind::Address, chain_id))),
    ];

    match format {
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(vec!["Field", "Value"]);
            for (key, value) in &rows {
                table.add_row(vec![
                    Cell::new(key),
                    Cell::new(value.as_deref().unwrap_or("-")),
                ]);
            }
            table.to_string()
        }
        OutputFormat::Json => {
            let output = json!({
                "address": address.to_checksum(None),
                "profile": profile,
                "explorer": explorer_link(address, LinkKind::Address, chain_id),
            });
            serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Csv => {
            let mut wtr = Writer::from_writer(vec![]);
            let _ = wtr.write_record(["field", "value"]);
            for (key, value) in &rows {
                let _ = wtr.write_record([*key, value.as_deref().unwrap_or("")]);
            }
            finish_csv(wtr)
        }
    }
}

fn format_address_short(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

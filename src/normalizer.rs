//! Query classification.
//!
//! Every keystroke passes through [`normalize`]. It is pure and synchronous:
//! hex input is checksum-normalized, name-like input is kept verbatim since
//! case matters to naming providers.

use alloy_primitives::Address;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static ADDRESS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid address regex"));

// Labels separated by '.', a 1-6 character suffix, then an optional path-like tail.
static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_+.~#?&/=]*)?$",
    )
    .expect("valid name regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Empty,
    Address(Address),
    Name(String),
    Invalid(String),
}

impl Query {
    /// The text the search box should hold after normalization.
    pub fn text(&self) -> String {
        match self {
            Query::Empty => String::new(),
            Query::Address(address) => address.to_checksum(None),
            Query::Name(name) => name.clone(),
            Query::Invalid(raw) => raw.clone(),
        }
    }

    pub fn address(&self) -> Option<Address> {
        match self {
            Query::Address(address) => Some(*address),
            _ => None,
        }
    }

    pub fn is_name(&self) -> bool {
        matches!(self, Query::Name(_))
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Query::Invalid(_))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Empty => write!(f, "<empty>"),
            Query::Address(address) => write!(f, "address {}", address.to_checksum(None)),
            Query::Name(name) => write!(f, "name {name}"),
            Query::Invalid(raw) => write!(f, "invalid {raw:?}"),
        }
    }
}

pub fn normalize(raw: &str) -> Query {
    if raw.is_empty() {
        return Query::Empty;
    }

    if let Some(address) = parse_address(raw) {
        return Query::Address(address);
    }

    if is_name(raw) {
        return Query::Name(raw.to_string());
    }

    Query::Invalid(raw.to_string())
}

/// Accepts all-lowercase or all-uppercase hex, and mixed case only when it
/// carries a valid EIP-55 checksum.
pub fn parse_address(raw: &str) -> Option<Address> {
    if !ADDRESS_REGEX.is_match(raw) {
        return None;
    }

    let hex = &raw[2..];
    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());

    if has_lower && has_upper {
        Address::parse_checksummed(raw, None).ok()
    } else {
        raw.parse::<Address>().ok()
    }
}

pub fn is_name(raw: &str) -> bool {
    NAME_REGEX.is_match(raw)
}

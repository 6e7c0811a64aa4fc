//! Resolution state machine.
//!
//! A pure reducer: [`ResolutionState::apply`] takes an [`Event`] and returns
//! the [`Command`]s the driver should run. Every asynchronous result carries
//! the generation of the input that spawned it and is dropped when a newer
//! input has arrived since.
//!
//! ```text
//! Idle --(address)-----------------------------> CheckingRegistry
//!      --(name)--> NameDebouncing -> ResolvingName -> CheckingRegistry | Settled
//! CheckingRegistry -> Settled | CheckingChain -> Settled
//! ```
//!
//! A chain read that never reached the node settles as
//! [`Status::Inconclusive`] rather than [`Status::NotAToken`].

use alloy_primitives::Address;
use serde::Serialize;
use tracing::debug;

use crate::chain::ChainId;
use crate::error::ResolutionError;
use crate::naming::{NamingResult, ProviderId};
use crate::normalizer::{self, Query};
use crate::registry::TokenLookup;
use crate::token::TokenIdentity;
use crate::verifier::{self, VerificationOutcome};

pub type Generation = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Empty,
    Invalid,
    Resolving,
    Unresolved,
    CheckingToken,
    Confirmed,
    NotAToken,
    /// The chain could not be reached, so token-ness is undecided.
    Inconclusive,
}

impl Status {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Status::Resolving | Status::CheckingToken)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    NameDebouncing,
    ResolvingName,
    CheckingRegistry,
    CheckingChain,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    DirectInput,
    NamingProvider(ProviderId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedAddress {
    pub address: Address,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusFlags {
    pub invalid_query: bool,
    pub resolving_name: bool,
    pub checking_token: bool,
    pub resolved_but_not_token: bool,
}

#[derive(Debug, Clone)]
pub enum Event {
    Input(String),
    DebounceElapsed {
        generation: Generation,
    },
    /// Snapshot of the fan-out while providers are still answering.
    NamingProgress {
        generation: Generation,
        results: Vec<NamingResult<Address>>,
        loading: bool,
    },
    NameResolved {
        generation: Generation,
        winner: Option<(ProviderId, Address)>,
        results: Vec<NamingResult<Address>>,
        failures: Vec<ResolutionError>,
    },
    RegistryChecked {
        generation: Generation,
        lookup: TokenLookup,
    },
    ChainChecked {
        generation: Generation,
        outcome: VerificationOutcome,
    },
    ChainUnreachable {
        generation: Generation,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Debounce {
        generation: Generation,
    },
    ResolveName {
        generation: Generation,
        name: String,
        chain_id: ChainId,
    },
    CheckRegistry {
        generation: Generation,
        chain_id: ChainId,
        address: Address,
    },
    CheckChain {
        generation: Generation,
        chain_id: ChainId,
        address: Address,
    },
    /// Hand a confirmed token to the import collaborator.
    Surface(TokenIdentity),
}

/// What the display layer sees.
#[derive(Debug, Clone)]
pub struct Observation {
    pub generation: Generation,
    pub query: String,
    pub status: Status,
    pub phase: Phase,
    pub resolved: Option<ResolvedAddress>,
    pub identity: Option<TokenIdentity>,
    pub flags: StatusFlags,
    pub naming: Vec<NamingResult<Address>>,
    /// Some provider that could still decide the winner has not answered.
    pub naming_loading: bool,
    pub provider_failures: Vec<ResolutionError>,
    pub error: Option<ResolutionError>,
}

impl Observation {
    pub fn is_settled(&self) -> bool {
        self.status.is_settled()
    }
}

#[derive(Debug, Clone)]
pub struct ResolutionState {
    chain_id: ChainId,
    generation: Generation,
    raw: String,
    query: Query,
    debounced: Option<String>,
    phase: Phase,
    resolved: Option<ResolvedAddress>,
    naming: Vec<NamingResult<Address>>,
    naming_loading: bool,
    provider_failures: Vec<ResolutionError>,
    lookup: Option<TokenLookup>,
    verification: VerificationOutcome,
    chain_failure: Option<String>,
}

impl ResolutionState {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            generation: 0,
            raw: String::new(),
            query: Query::Empty,
            debounced: None,
            phase: Phase::Idle,
            resolved: None,
            naming: Vec::new(),
            naming_loading: false,
            provider_failures: Vec::new(),
            lookup: None,
            verification: VerificationOutcome::Unknown,
            chain_failure: None,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn apply(&mut self, event: Event) -> Vec<Command> {
        match event {
            Event::Input(raw) => self.on_input(raw),
            Event::DebounceElapsed { generation } => {
                if !self.is_current(generation, Phase::NameDebouncing) {
                    return Vec::new();
                }
                self.debounced = Some(self.raw.clone());
                self.phase = Phase::ResolvingName;
                self.naming_loading = true;
                vec![Command::ResolveName {
                    generation,
                    name: self.raw.clone(),
                    chain_id: self.chain_id,
                }]
            }
            Event::NamingProgress {
                generation,
                results,
                loading,
            } => {
                if self.is_current(generation, Phase::ResolvingName) {
                    self.naming = results;
                    self.naming_loading = loading;
                }
                Vec::new()
            }
            Event::NameResolved {
                generation,
                winner,
                results,
                failures,
            } => {
                if !self.is_current(generation, Phase::ResolvingName) {
                    return Vec::new();
                }
                self.naming = results;
                self.naming_loading = false;
                self.provider_failures = failures;
                match winner {
                    Some((provider, address)) => {
                        self.resolved = Some(ResolvedAddress {
                            address,
                            provenance: Provenance::NamingProvider(provider),
                        });
                        self.phase = Phase::CheckingRegistry;
                        vec![self.check_registry(address)]
                    }
                    None => {
                        self.phase = Phase::Settled;
                        Vec::new()
                    }
                }
            }
            Event::RegistryChecked { generation, lookup } => {
                if !self.is_current(generation, Phase::CheckingRegistry) {
                    return Vec::new();
                }
                self.lookup = Some(lookup.clone());
                match lookup {
                    TokenLookup::Found(token) => {
                        self.phase = Phase::Settled;
                        vec![Command::Surface(token)]
                    }
                    TokenLookup::Absent => {
                        self.phase = Phase::Settled;
                        Vec::new()
                    }
                    TokenLookup::Unknown => match self.resolved {
                        Some(resolved) if self.should_check_contract() => {
                            self.phase = Phase::CheckingChain;
                            vec![Command::CheckChain {
                                generation,
                                chain_id: self.chain_id,
                                address: resolved.address,
                            }]
                        }
                        _ => {
                            self.phase = Phase::Settled;
                            Vec::new()
                        }
                    },
                }
            }
            Event::ChainChecked {
                generation,
                outcome,
            } => {
                if !self.is_current(generation, Phase::CheckingChain)
                    || self.verification.is_settled()
                {
                    return Vec::new();
                }
                self.verification = outcome.clone();
                self.phase = Phase::Settled;
                match outcome {
                    VerificationOutcome::Confirmed(token) => vec![Command::Surface(token)],
                    _ => Vec::new(),
                }
            }
            Event::ChainUnreachable { generation, reason } => {
                if !self.is_current(generation, Phase::CheckingChain) {
                    return Vec::new();
                }
                self.chain_failure = Some(reason);
                self.phase = Phase::Settled;
                Vec::new()
            }
        }
    }

    fn on_input(&mut self, raw: String) -> Vec<Command> {
        let chain_id = self.chain_id;
        *self = Self {
            generation: self.generation + 1,
            query: normalizer::normalize(&raw),
            raw,
            ..Self::new(chain_id)
        };

        debug!("Generation {}: {}", self.generation, self.query);
        match &self.query {
            Query::Empty | Query::Invalid(_) => Vec::new(),
            Query::Address(address) => {
                let address = *address;
                self.resolved = Some(ResolvedAddress {
                    address,
                    provenance: Provenance::DirectInput,
                });
                self.phase = Phase::CheckingRegistry;
                vec![self.check_registry(address)]
            }
            Query::Name(_) => {
                self.phase = Phase::NameDebouncing;
                vec![Command::Debounce {
                    generation: self.generation,
                }]
            }
        }
    }

    fn is_current(&self, generation: Generation, phase: Phase) -> bool {
        if generation != self.generation {
            debug!(
                "Discarding stale result from generation {} (current {})",
                generation, self.generation
            );
            return false;
        }
        if self.phase != phase {
            debug!("Discarding result for {:?}, now in {:?}", phase, self.phase);
            return false;
        }
        true
    }

    fn check_registry(&self, address: Address) -> Command {
        Command::CheckRegistry {
            generation: self.generation,
            chain_id: self.chain_id,
            address,
        }
    }

    /// Whether the current state warrants a chain read.
    pub fn should_check_contract(&self) -> bool {
        let has_basis = if self.is_resolving_name() {
            matches!(
                self.resolved,
                Some(ResolvedAddress {
                    provenance: Provenance::NamingProvider(_),
                    ..
                })
            )
        } else {
            normalizer::parse_address(&self.raw).is_some()
        };

        verifier::should_check_contract(
            self.resolved.map(|r| r.address),
            Some(self.chain_id),
            self.lookup.as_ref(),
            has_basis,
        )
    }

    /// The settled input is name-like and not itself an address.
    fn is_resolving_name(&self) -> bool {
        self.debounced.as_deref().is_some_and(|text| {
            normalizer::is_name(text) && normalizer::parse_address(text).is_none()
        })
    }

    fn identity(&self) -> Option<TokenIdentity> {
        match (&self.lookup, &self.verification) {
            (Some(TokenLookup::Found(token)), _) => Some(token.clone()),
            (_, VerificationOutcome::Confirmed(token)) => Some(token.clone()),
            _ => None,
        }
    }

    fn status(&self, identity: Option<&TokenIdentity>) -> Status {
        match self.query {
            Query::Empty => return Status::Empty,
            Query::Invalid(_) => return Status::Invalid,
            Query::Address(_) | Query::Name(_) => {}
        }

        match self.phase {
            Phase::Idle | Phase::NameDebouncing | Phase::ResolvingName => Status::Resolving,
            Phase::CheckingRegistry | Phase::CheckingChain => Status::CheckingToken,
            Phase::Settled if identity.is_some() => Status::Confirmed,
            Phase::Settled if self.resolved.is_none() => Status::Unresolved,
            Phase::Settled if self.chain_failure.is_some() => Status::Inconclusive,
            Phase::Settled => Status::NotAToken,
        }
    }

    fn flags(&self) -> StatusFlags {
        let resolving_name = self.is_resolving_name();
        let checking_token = self.phase == Phase::CheckingChain;
        let from_name = matches!(
            self.resolved,
            Some(ResolvedAddress {
                provenance: Provenance::NamingProvider(_),
                ..
            })
        );

        // A registry "absent" answer is a decision, not an open question.
        let undecided = self.lookup == Some(TokenLookup::Unknown)
            && !self.verification.is_settled()
            && self.chain_failure.is_none();
        let resolved_but_not_token = resolving_name
            && from_name
            && self.phase == Phase::Settled
            && !checking_token
            && (self.verification == VerificationOutcome::NotAToken || undecided)
            && self.debounced.as_deref() == Some(self.raw.as_str());

        StatusFlags {
            invalid_query: matches!(self.query, Query::Invalid(_)),
            resolving_name,
            checking_token,
            resolved_but_not_token,
        }
    }

    fn error(&self, status: Status, flags: &StatusFlags) -> Option<ResolutionError> {
        if flags.invalid_query {
            return Some(ResolutionError::InvalidQuery {
                query: self.raw.clone(),
            });
        }

        if status == Status::Unresolved {
            return Some(ResolutionError::NameNotFound {
                name: self.raw.clone(),
            });
        }

        let address = self.resolved?.address;
        if let Some(reason) = &self.chain_failure {
            return Some(ResolutionError::ChainReadFailure {
                address,
                reason: reason.clone(),
            });
        }

        if flags.resolved_but_not_token {
            return Some(ResolutionError::AmbiguousNoToken {
                name: self.raw.clone(),
                address,
            });
        }

        if self.verification == VerificationOutcome::NotAToken {
            return Some(ResolutionError::ChainReadFailure {
                address,
                reason: "decimals, symbol and name could not all be read".to_string(),
            });
        }

        None
    }

    pub fn observe(&self) -> Observation {
        let identity = self.identity();
        let status = self.status(identity.as_ref());
        let flags = self.flags();
        let error = self.error(status, &flags);

        Observation {
            generation: self.generation,
            query: self.query.text(),
            status,
            phase: self.phase,
            resolved: self.resolved,
            identity,
            flags,
            naming: self.naming.clone(),
            naming_loading: self.naming_loading,
            provider_failures: self.provider_failures.clone(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::BSC;

    const CAKE: &str = "0x0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82";

    fn cake() -> Address {
        CAKE.parse().unwrap()
    }

    fn cake_token() -> TokenIdentity {
        TokenIdentity::new(BSC, cake(), 18, "CAKE", "PancakeSwap Token")
    }

    fn resolved_by_sid(generation: Generation) -> Event {
        Event::NameResolved {
            generation,
            winner: Some((ProviderId::Sid, cake())),
            results: Vec::new(),
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_empty_and_invalid_issue_nothing() {
        let mut state = ResolutionState::new(BSC);
        assert!(state.apply(Event::Input(String::new())).is_empty());
        assert_eq!(state.observe().status, Status::Empty);

        assert!(state.apply(Event::Input("not a token".into())).is_empty());
        let observed = state.observe();
        assert_eq!(observed.status, Status::Invalid);
        assert!(observed.flags.invalid_query);
        assert!(matches!(observed.error, Some(ResolutionError::InvalidQuery { .. })));
    }

    #[test]
    fn test_address_goes_straight_to_registry() {
        let mut state = ResolutionState::new(BSC);
        let commands = state.apply(Event::Input(CAKE.to_lowercase()));
        assert_eq!(
            commands,
            vec![Command::CheckRegistry {
                generation: 1,
                chain_id: BSC,
                address: cake()
            }]
        );
        let observed = state.observe();
        assert_eq!(observed.query, CAKE);
        assert_eq!(observed.status, Status::CheckingToken);
        assert_eq!(
            observed.resolved.unwrap().provenance,
            Provenance::DirectInput
        );
    }

    #[test]
    fn test_registry_hit_skips_chain_read() {
        let mut state = ResolutionState::new(BSC);
        state.apply(Event::Input(CAKE.into()));
        let commands = state.apply(Event::RegistryChecked {
            generation: 1,
            lookup: TokenLookup::Found(cake_token()),
        });

        assert_eq!(commands, vec![Command::Surface(cake_token())]);
        assert!(!state.should_check_contract());
        assert_eq!(state.observe().status, Status::Confirmed);
    }

    #[test]
    fn test_registry_absent_is_not_a_token_without_chain_read() {
        let mut state = ResolutionState::new(BSC);
        state.apply(Event::Input(CAKE.into()));
        let commands = state.apply(Event::RegistryChecked {
            generation: 1,
            lookup: TokenLookup::Absent,
        });
        assert!(commands.is_empty());
        assert_eq!(state.observe().status, Status::NotAToken);
    }

    #[test]
    fn test_unknown_address_is_checked_on_chain() {
        let mut state = ResolutionState::new(BSC);
        state.apply(Event::Input(CAKE.into()));
        let commands = state.apply(Event::RegistryChecked {
            generation: 1,
            lookup: TokenLookup::Unknown,
        });
        assert_eq!(
            commands,
            vec![Command::CheckChain {
                generation: 1,
                chain_id: BSC,
                address: cake()
            }]
        );
        assert!(state.observe().flags.checking_token);

        let commands = state.apply(Event::ChainChecked {
            generation: 1,
            outcome: VerificationOutcome::Confirmed(cake_token()),
        });
        assert_eq!(commands, vec![Command::Surface(cake_token())]);
        let observed = state.observe();
        assert_eq!(observed.status, Status::Confirmed);
        assert_eq!(observed.identity, Some(cake_token()));
        assert!(observed.error.is_none());
    }

    #[test]
    fn test_direct_address_not_a_token() {
        let mut state = ResolutionState::new(BSC);
        state.apply(Event::Input(CAKE.into()));
        state.apply(Event::RegistryChecked {
            generation: 1,
            lookup: TokenLookup::Unknown,
        });
        state.apply(Event::ChainChecked {
            generation: 1,
            outcome: VerificationOutcome::NotAToken,
        });

        let observed = state.observe();
        assert_eq!(observed.status, Status::NotAToken);
        assert!(!observed.flags.resolved_but_not_token);
        assert!(matches!(observed.error, Some(ResolutionError::ChainReadFailure { .. })));
    }

    #[test]
    fn test_name_flow() {
        let mut state = ResolutionState::new(BSC);
        let commands = state.apply(Event::Input("cake.bnb".into()));
        assert_eq!(commands, vec![Command::Debounce { generation: 1 }]);
        assert_eq!(state.observe().status, Status::Resolving);

        let commands = state.apply(Event::DebounceElapsed { generation: 1 });
        assert_eq!(
            commands,
            vec![Command::ResolveName {
                generation: 1,
                name: "cake.bnb".into(),
                chain_id: BSC
            }]
        );
        assert!(state.observe().flags.resolving_name);

        let commands = state.apply(resolved_by_sid(1));
        assert_eq!(
            commands,
            vec![Command::CheckRegistry {
                generation: 1,
                chain_id: BSC,
                address: cake()
            }]
        );
        assert_eq!(
            state.observe().resolved.unwrap().provenance,
            Provenance::NamingProvider(ProviderId::Sid)
        );
    }

    #[test]
    fn test_name_resolved_but_not_token() {
        let mut state = ResolutionState::new(BSC);
        state.apply(Event::Input("wallet.bnb".into()));
        state.apply(Event::DebounceElapsed { generation: 1 });
        state.apply(resolved_by_sid(1));
        state.apply(Event::RegistryChecked {
            generation: 1,
            lookup: TokenLookup::Unknown,
        });
        assert!(!state.observe().flags.resolved_but_not_token, "still checking");

        state.apply(Event::ChainChecked {
            generation: 1,
            outcome: VerificationOutcome::NotAToken,
        });
        let observed = state.observe();
        assert_eq!(observed.status, Status::NotAToken);
        assert!(observed.flags.resolved_but_not_token);
        assert_eq!(
            observed.error,
            Some(ResolutionError::AmbiguousNoToken {
                name: "wallet.bnb".into(),
                address: cake()
            })
        );
    }

    #[test]
    fn test_name_resolving_to_unsupported_address_is_not_ambiguous() {
        let mut state = ResolutionState::new(BSC);
        state.apply(Event::Input("alice.bnb".into()));
        state.apply(Event::DebounceElapsed { generation: 1 });
        state.apply(resolved_by_sid(1));
        let commands = state.apply(Event::RegistryChecked {
            generation: 1,
            lookup: TokenLookup::Absent,
        });

        assert!(commands.is_empty());
        let observed = state.observe();
        assert_eq!(observed.status, Status::NotAToken);
        assert!(!observed.flags.resolved_but_not_token);
        assert!(observed.error.is_none());
    }

    #[test]
    fn test_unreachable_chain_is_inconclusive() {
        let mut state = ResolutionState::new(BSC);
        state.apply(Event::Input("wallet.bnb".into()));
        state.apply(Event::DebounceElapsed { generation: 1 });
        state.apply(resolved_by_sid(1));
        state.apply(Event::RegistryChecked {
            generation: 1,
            lookup: TokenLookup::Unknown,
        });
        let commands = state.apply(Event::ChainUnreachable {
            generation: 1,
            reason: "connection refused".into(),
        });

        assert!(commands.is_empty());
        let observed = state.observe();
        assert_eq!(observed.status, Status::Inconclusive);
        assert!(observed.is_settled());
        assert!(!observed.flags.resolved_but_not_token);
        assert_eq!(
            observed.error,
            Some(ResolutionError::ChainReadFailure {
                address: cake(),
                reason: "connection refused".into()
            })
        );
    }

    #[test]
    fn test_naming_progress_is_observed_while_resolving() {
        let mut state = ResolutionState::new(BSC);
        state.apply(Event::Input("cake.bnb".into()));
        assert!(!state.observe().naming_loading);

        state.apply(Event::DebounceElapsed { generation: 1 });
        assert!(state.observe().naming_loading);

        let pending_sid = vec![NamingResult {
            provider: ProviderId::Sid,
            value: None,
            is_loading: true,
        }];
        let commands = state.apply(Event::NamingProgress {
            generation: 1,
            results: pending_sid.clone(),
            loading: true,
        });
        assert!(commands.is_empty());
        let observed = state.observe();
        assert_eq!(observed.status, Status::Resolving);
        assert_eq!(observed.naming, pending_sid);
        assert!(observed.naming_loading);

        state.apply(resolved_by_sid(1));
        assert!(!state.observe().naming_loading);

        // Late progress from the finished fan-out changes nothing.
        state.apply(Event::NamingProgress {
            generation: 1,
            results: pending_sid,
            loading: true,
        });
        assert!(state.observe().naming.is_empty());
        assert!(!state.observe().naming_loading);
    }

    #[test]
    fn test_unresolved_name() {
        let mut state = ResolutionState::new(BSC);
        state.apply(Event::Input("nobody.bnb".into()));
        state.apply(Event::DebounceElapsed { generation: 1 });
        let commands = state.apply(Event::NameResolved {
            generation: 1,
            winner: None,
            results: Vec::new(),
            failures: Vec::new(),
        });
        assert!(commands.is_empty());
        let observed = state.observe();
        assert_eq!(observed.status, Status::Unresolved);
        assert!(matches!(observed.error, Some(ResolutionError::NameNotFound { .. })));
    }

    #[test]
    fn test_new_input_discards_stale_results() {
        let mut state = ResolutionState::new(BSC);
        state.apply(Event::Input("cake.bnb".into()));
        state.apply(Event::Input("cake.bnbx".into()));

        assert!(state.apply(Event::DebounceElapsed { generation: 1 }).is_empty());
        assert_eq!(state.phase(), Phase::NameDebouncing);

        state.apply(Event::DebounceElapsed { generation: 2 });
        assert!(state.apply(resolved_by_sid(1)).is_empty());
        assert_eq!(state.phase(), Phase::ResolvingName);
    }

    #[test]
    fn test_superseded_address_never_confirms() {
        let mut state = ResolutionState::new(BSC);
        state.apply(Event::Input(CAKE.into()));
        state.apply(Event::RegistryChecked {
            generation: 1,
            lookup: TokenLookup::Unknown,
        });

        let other = "0x55d398326f99059fF775485246999027B3197955";
        state.apply(Event::Input(other.into()));
        let commands = state.apply(Event::ChainChecked {
            generation: 1,
            outcome: VerificationOutcome::Confirmed(cake_token()),
        });

        assert!(commands.is_empty());
        let observed = state.observe();
        assert_eq!(observed.status, Status::CheckingToken);
        assert!(observed.identity.is_none());
    }

    #[test]
    fn test_verification_does_not_regress() {
        let mut state = ResolutionState::new(BSC);
        state.apply(Event::Input(CAKE.into()));
        state.apply(Event::RegistryChecked {
            generation: 1,
            lookup: TokenLookup::Unknown,
        });
        state.apply(Event::ChainChecked {
            generation: 1,
            outcome: VerificationOutcome::Confirmed(cake_token()),
        });
        let commands = state.apply(Event::ChainChecked {
            generation: 1,
            outcome: VerificationOutcome::NotAToken,
        });

        assert!(commands.is_empty());
        assert_eq!(state.observe().status, Status::Confirmed);
    }
}

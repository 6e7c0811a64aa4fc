//! Fan-out over the three naming providers.
//!
//! [`Fanout`] is the pure gating/precedence state for one query; the
//! [`NamingFanout`] driver runs it against real providers. The same policy
//! serves forward (name to address) and reverse (address to name) lookups.
//!
//! Gating:
//! - SID is always attempted.
//! - UNS is attempted only once SID has settled without a result.
//! - ENS runs in parallel, except on chains without ENS where it is skipped.
//!
//! Precedence of the final answer is ENS, then SID, then UNS.

use alloy_primitives::Address;
use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::provider::{NamingProvider, ProviderId};
use crate::chain::{self, ChainId};
use crate::error::ResolutionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    Idle,
    Pending,
    Skipped,
    Settled(Option<T>),
}

impl<T> Slot<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending)
    }

    pub fn found(&self) -> Option<&T> {
        match self {
            Slot::Settled(Some(value)) => Some(value),
            _ => None,
        }
    }
}

/// Per-provider view of a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamingResult<T> {
    pub provider: ProviderId,
    pub value: Option<T>,
    pub is_loading: bool,
}

#[derive(Debug, Clone)]
pub struct Fanout<T> {
    chain_id: ChainId,
    sid: Slot<T>,
    uns: Slot<T>,
    ens: Slot<T>,
    failures: Vec<ResolutionError>,
}

impl<T: Clone> Fanout<T> {
    pub fn new(chain_id: ChainId) -> Self {
        let ens = if chain::supports_ens(chain_id) {
            Slot::Idle
        } else {
            Slot::Skipped
        };

        Self {
            chain_id,
            sid: Slot::Idle,
            uns: Slot::Idle,
            ens,
            failures: Vec::new(),
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn slot(&self, id: ProviderId) -> &Slot<T> {
        match id {
            ProviderId::Sid => &self.sid,
            ProviderId::Uns => &self.uns,
            ProviderId::Ens => &self.ens,
        }
    }

    fn slot_mut(&mut self, id: ProviderId) -> &mut Slot<T> {
        match id {
            ProviderId::Sid => &mut self.sid,
            ProviderId::Uns => &mut self.uns,
            ProviderId::Ens => &mut self.ens,
        }
    }

    /// Chain the provider should be queried on.
    pub fn scope(&self, id: ProviderId) -> ChainId {
        match id {
            ProviderId::Ens => chain::ens_scope(self.chain_id),
            ProviderId::Sid | ProviderId::Uns => self.chain_id,
        }
    }

    /// Marks every provider that may start now as pending and returns them.
    pub fn dispatch(&mut self) -> Vec<ProviderId> {
        let mut started = Vec::new();

        if matches!(self.sid, Slot::Idle) {
            self.sid = Slot::Pending;
            started.push(ProviderId::Sid);
        }

        if matches!(self.uns, Slot::Idle) && matches!(self.sid, Slot::Settled(None)) {
            self.uns = Slot::Pending;
            started.push(ProviderId::Uns);
        }

        if matches!(self.ens, Slot::Idle) {
            self.ens = Slot::Pending;
            started.push(ProviderId::Ens);
        }

        started
    }

    /// Records a provider answer. Answers for providers that are not pending
    /// are ignored.
    pub fn settle(&mut self, id: ProviderId, value: Option<T>) {
        let slot = self.slot_mut(id);
        if slot.is_pending() {
            *slot = Slot::Settled(value);
        } else {
            debug!("Ignoring {} answer, slot is not pending", id);
        }
    }

    /// A failed or timed out provider counts as "no result".
    pub fn fail(&mut self, id: ProviderId, reason: impl Into<String>) {
        self.failures.push(ResolutionError::NamingProviderUnavailable {
            provider: id,
            reason: reason.into(),
        });
        self.settle(id, None);
    }

    pub fn failures(&self) -> &[ResolutionError] {
        &self.failures
    }

    /// True while a provider that could still change the answer is pending.
    pub fn is_loading(&self) -> bool {
        self.ens.is_pending()
            || (self.ens.found().is_none() && self.sid.is_pending())
            || (self.sid.found().is_none() && self.uns.is_pending())
    }

    pub fn winner(&self) -> Option<(ProviderId, T)> {
        ProviderId::PRECEDENCE
            .iter()
            .find_map(|id| self.slot(*id).found().map(|value| (*id, value.clone())))
    }

    pub fn results(&self) -> Vec<NamingResult<T>> {
        ProviderId::FETCH_ORDER
            .iter()
            .map(|id| {
                let slot = self.slot(*id);
                NamingResult {
                    provider: *id,
                    value: slot.found().cloned(),
                    is_loading: slot.is_pending(),
                }
            })
            .collect()
    }
}

/// Runs [`Fanout`] against configured providers.
pub struct NamingFanout {
    providers: Vec<Arc<dyn NamingProvider>>,
    call_timeout: Duration,
}

impl NamingFanout {
    pub fn new(providers: Vec<Arc<dyn NamingProvider>>, call_timeout: Duration) -> Self {
        Self {
            providers,
            call_timeout,
        }
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    fn provider(&self, id: ProviderId) -> Option<Arc<dyn NamingProvider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    pub async fn resolve_name(&self, name: &str, chain_id: ChainId) -> Fanout<Address> {
        self.resolve_name_with_progress(name, chain_id, |_| {}).await
    }

    /// Like [`Self::resolve_name`], reporting the fan-out after the initial
    /// dispatch and after every provider answer.
    pub async fn resolve_name_with_progress<P>(
        &self,
        name: &str,
        chain_id: ChainId,
        on_progress: P,
    ) -> Fanout<Address>
    where
        P: Fn(&Fanout<Address>),
    {
        info!("Resolving name {} on chain {}", name, chain_id);
        let call = move |provider: Arc<dyn NamingProvider>, scope| async move {
            provider.resolve_name(name, scope).await
        };
        self.drive(chain_id, call, on_progress).await
    }

    pub async fn lookup_address(&self, address: Address, chain_id: ChainId) -> Fanout<String> {
        info!("Looking up domain name for {} on chain {}", address, chain_id);
        let call = move |provider: Arc<dyn NamingProvider>, scope| async move {
            provider.lookup_address(address, scope).await
        };
        self.drive(chain_id, call, |_| {}).await
    }

    async fn drive<T, F, Fut, P>(&self, chain_id: ChainId, call: F, on_progress: P) -> Fanout<T>
    where
        T: Clone,
        F: Fn(Arc<dyn NamingProvider>, ChainId) -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
        P: Fn(&Fanout<T>),
    {
        let mut fanout = Fanout::new(chain_id);
        let mut pending = FuturesUnordered::new();
        let call_timeout = self.call_timeout;

        let start = |id: ProviderId, provider: Arc<dyn NamingProvider>, scope: ChainId| {
            let request = call(provider, scope);
            async move { (id, timeout(call_timeout, request).await) }
        };

        let mut ready = fanout.dispatch();
        loop {
            while let Some(id) = ready.pop() {
                match self.provider(id) {
                    Some(provider) => {
                        debug!("Querying {} on chain {}", id, fanout.scope(id));
                        pending.push(start(id, provider, fanout.scope(id)));
                    }
                    None => {
                        fanout.fail(id, "provider not configured");
                        ready.extend(fanout.dispatch());
                    }
                }
            }

            if !fanout.is_loading() {
                break;
            }
            on_progress(&fanout);

            let Some((id, outcome)) = pending.next().await else {
                break;
            };

            match outcome {
                Ok(Ok(value)) => {
                    debug!("{} settled, found: {}", id, value.is_some());
                    fanout.settle(id, value);
                }
                Ok(Err(e)) => {
                    warn!("{} lookup failed: {}", id, e);
                    fanout.fail(id, e.to_string());
                }
                Err(_) => {
                    warn!(
                        "{} lookup timed out after {}ms",
                        id,
                        call_timeout.as_millis()
                    );
                    fanout.fail(id, format!("timed out after {}ms", call_timeout.as_millis()));
                }
            }

            ready = fanout.dispatch();
        }

        fanout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{BSC, ETHEREUM};
    use crate::naming::StaticNamingProvider;
    use std::sync::Mutex;

    #[test]
    fn test_initial_dispatch_skips_uns_and_ens_on_bsc() {
        let mut fanout: Fanout<String> = Fanout::new(BSC);
        assert_eq!(fanout.dispatch(), vec![ProviderId::Sid]);
        assert_eq!(fanout.slot(ProviderId::Ens), &Slot::Skipped);
        assert!(fanout.is_loading());
    }

    #[test]
    fn test_ens_runs_in_parallel_off_bsc() {
        let mut fanout: Fanout<String> = Fanout::new(ETHEREUM);
        assert_eq!(fanout.dispatch(), vec![ProviderId::Sid, ProviderId::Ens]);
        assert!(fanout.dispatch().is_empty());
    }

    #[test]
    fn test_uns_waits_for_sid_miss() {
        let mut fanout: Fanout<String> = Fanout::new(BSC);
        fanout.dispatch();
        assert_eq!(fanout.slot(ProviderId::Uns), &Slot::Idle);

        fanout.settle(ProviderId::Sid, None);
        assert!(!fanout.is_loading());
        assert_eq!(fanout.dispatch(), vec![ProviderId::Uns]);
        assert!(fanout.is_loading());

        fanout.settle(ProviderId::Uns, Some("brad.crypto".to_string()));
        assert!(!fanout.is_loading());
        assert_eq!(
            fanout.winner(),
            Some((ProviderId::Uns, "brad.crypto".to_string()))
        );
    }

    #[test]
    fn test_uns_never_starts_after_sid_hit() {
        let mut fanout: Fanout<String> = Fanout::new(BSC);
        fanout.dispatch();
        fanout.settle(ProviderId::Sid, Some("pancake.bnb".to_string()));
        assert!(fanout.dispatch().is_empty());
        assert_eq!(fanout.slot(ProviderId::Uns), &Slot::Idle);
        assert!(!fanout.is_loading());
    }

    #[test]
    fn test_ens_wins_over_sid() {
        let mut fanout: Fanout<String> = Fanout::new(ETHEREUM);
        fanout.dispatch();
        fanout.settle(ProviderId::Sid, Some("sid.bnb".to_string()));
        assert!(fanout.is_loading(), "ENS still pending");

        fanout.settle(ProviderId::Ens, Some("vitalik.eth".to_string()));
        assert_eq!(
            fanout.winner(),
            Some((ProviderId::Ens, "vitalik.eth".to_string()))
        );
    }

    #[test]
    fn test_ens_hit_makes_pending_sid_irrelevant() {
        let mut fanout: Fanout<String> = Fanout::new(ETHEREUM);
        fanout.dispatch();
        fanout.settle(ProviderId::Ens, Some("vitalik.eth".to_string()));
        assert!(!fanout.is_loading());

        let results = fanout.results();
        assert!(results[0].is_loading, "SID slot still reports its own state");
    }

    #[test]
    fn test_failure_counts_as_no_result() {
        let mut fanout: Fanout<String> = Fanout::new(BSC);
        fanout.dispatch();
        fanout.fail(ProviderId::Sid, "connection refused");
        assert_eq!(fanout.slot(ProviderId::Sid), &Slot::Settled(None));
        assert_eq!(fanout.failures().len(), 1);
        assert_eq!(fanout.dispatch(), vec![ProviderId::Uns]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_reported_while_providers_answer() {
        let wallet: Address = "0x8894E0a0c962CB723c1976a4421c95949bE2D4E3".parse().unwrap();
        let providers: Vec<Arc<dyn NamingProvider>> = vec![
            Arc::new(
                StaticNamingProvider::new(ProviderId::Sid).with_latency(Duration::from_millis(100)),
            ),
            Arc::new(
                StaticNamingProvider::new(ProviderId::Uns)
                    .with_record(BSC, "alice.crypto", wallet)
                    .with_latency(Duration::from_millis(100)),
            ),
        ];
        let naming = NamingFanout::new(providers, Duration::from_secs(5));
        let snapshots = Mutex::new(Vec::new());

        let fanout = naming
            .resolve_name_with_progress("alice.crypto", BSC, |fanout| {
                snapshots.lock().unwrap().push(fanout.results());
            })
            .await;

        assert_eq!(fanout.winner(), Some((ProviderId::Uns, wallet)));
        let snapshots = snapshots.into_inner().unwrap();
        assert_eq!(snapshots.len(), 2);
        // SID in flight, UNS not yet started
        assert!(snapshots[0][0].is_loading);
        assert!(!snapshots[0][1].is_loading);
        // SID missed, UNS in flight
        assert!(!snapshots[1][0].is_loading);
        assert!(snapshots[1][1].is_loading);
    }

    #[test]
    fn test_late_answer_for_idle_slot_is_ignored() {
        let mut fanout: Fanout<String> = Fanout::new(BSC);
        fanout.settle(ProviderId::Uns, Some("early.crypto".to_string()));
        assert_eq!(fanout.slot(ProviderId::Uns), &Slot::Idle);
    }
}

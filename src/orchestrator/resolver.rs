use alloy_primitives::Address;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::state::{Command, Event, Generation, Observation, ResolutionState};
use crate::chain::ChainId;
use crate::naming::NamingFanout;
use crate::registry::{TokenLookup, TokenRegistry};
use crate::token::TokenIdentity;
use crate::verifier::TokenVerifier;

/// Receives tokens the resolver has confirmed, e.g. an import prompt.
pub trait ImportSink: Send + Sync {
    fn offer(&self, token: &TokenIdentity);
}

#[derive(Clone)]
pub struct ResolverContext {
    pub chain_id: ChainId,
    pub debounce: Duration,
    pub naming: Arc<NamingFanout>,
    pub registry: Arc<TokenRegistry>,
    pub verifier: Arc<TokenVerifier>,
    pub import: Option<Arc<dyn ImportSink>>,
}

/// Handle to a running resolution worker. Dropping it stops the worker.
pub struct Resolver {
    events: mpsc::UnboundedSender<Event>,
    observations: watch::Receiver<Observation>,
    submitted: AtomicU64,
    worker: JoinHandle<()>,
}

impl Resolver {
    pub fn spawn(ctx: ResolverContext) -> Self {
        let state = ResolutionState::new(ctx.chain_id);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (observations_tx, observations_rx) = watch::channel(state.observe());

        let worker = Worker {
            ctx: Arc::new(ctx),
            state,
            events: events_tx.clone(),
            observations: observations_tx,
            in_flight: Vec::new(),
        };
        let worker = tokio::spawn(worker.run(events_rx));

        Self {
            events: events_tx,
            observations: observations_rx,
            submitted: AtomicU64::new(0),
            worker,
        }
    }

    /// Feeds raw query text, superseding whatever was in flight. Returns the
    /// generation this input will be observed under.
    pub fn submit(&self, raw: impl Into<String>) -> Result<Generation> {
        self.events
            .send(Event::Input(raw.into()))
            .context("Resolver worker has stopped")?;
        Ok(self.submitted.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn observe(&self) -> Observation {
        self.observations.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Observation> {
        self.observations.clone()
    }

    /// Waits until the most recent input has settled.
    pub async fn settled(&self) -> Result<Observation> {
        let target = self.submitted.load(Ordering::SeqCst);
        let mut rx = self.observations.clone();
        let observation = rx
            .wait_for(|obs| obs.generation >= target && obs.is_settled())
            .await
            .context("Resolver worker has stopped")?;
        Ok(observation.clone())
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

struct Worker {
    ctx: Arc<ResolverContext>,
    state: ResolutionState,
    events: mpsc::UnboundedSender<Event>,
    observations: watch::Sender<Observation>,
    in_flight: Vec<JoinHandle<()>>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = rx.recv().await {
            if matches!(event, Event::Input(_)) {
                self.cancel_in_flight();
            }

            let commands = self.state.apply(event);
            self.observations.send_replace(self.state.observe());

            for command in commands {
                self.execute(command);
            }
        }
    }

    fn cancel_in_flight(&mut self) {
        let cancelled = self.in_flight.len();
        for task in self.in_flight.drain(..) {
            task.abort();
        }
        if cancelled > 0 {
            debug!("Cancelled {} in-flight tasks", cancelled);
        }
    }

    fn execute(&mut self, command: Command) {
        let events = self.events.clone();
        let ctx = self.ctx.clone();

        let task = match command {
            Command::Debounce { generation } => tokio::spawn(async move {
                tokio::time::sleep(ctx.debounce).await;
                let _ = events.send(Event::DebounceElapsed { generation });
            }),
            Command::ResolveName {
                generation,
                name,
                chain_id,
            } => tokio::spawn(async move {
                let progress = events.clone();
                let fanout = ctx
                    .naming
                    .resolve_name_with_progress(&name, chain_id, move |fanout| {
                        let _ = progress.send(Event::NamingProgress {
                            generation,
                            results: fanout.results(),
                            loading: fanout.is_loading(),
                        });
                    })
                    .await;
                let _ = events.send(Event::NameResolved {
                    generation,
                    winner: fanout.winner(),
                    results: fanout.results(),
                    failures: fanout.failures().to_vec(),
                });
            }),
            Command::CheckRegistry {
                generation,
                chain_id,
                address,
            } => tokio::spawn(async move {
                let lookup = lookup_registry(ctx.registry.clone(), chain_id, address).await;
                let _ = events.send(Event::RegistryChecked { generation, lookup });
            }),
            Command::CheckChain {
                generation,
                chain_id,
                address,
            } => tokio::spawn(async move {
                let event = match ctx.verifier.verify(chain_id, address).await {
                    Ok(outcome) => Event::ChainChecked {
                        generation,
                        outcome,
                    },
                    Err(e) => {
                        warn!("Token check of {} is inconclusive: {:#}", address, e);
                        Event::ChainUnreachable {
                            generation,
                            reason: format!("{:#}", e),
                        }
                    }
                };
                let _ = events.send(event);
            }),
            Command::Surface(token) => {
                info!(
                    "Confirmed {} ({}) at {}",
                    token.symbol, token.name, token.address
                );
                if let Some(sink) = &self.ctx.import {
                    sink.offer(&token);
                }
                return;
            }
        };

        self.in_flight.retain(|task| !task.is_finished());
        self.in_flight.push(task);
    }
}

async fn lookup_registry(
    registry: Arc<TokenRegistry>,
    chain_id: ChainId,
    address: Address,
) -> TokenLookup {
    // Registry reads hit SQLite
    match tokio::task::spawn_blocking(move || registry.lookup(chain_id, &address)).await {
        Ok(Ok(lookup)) => lookup,
        Ok(Err(e)) => {
            warn!("Registry lookup for {} failed: {}", address, e);
            TokenLookup::Unknown
        }
        Err(e) => {
            warn!("Registry lookup task for {} failed: {}", address, e);
            TokenLookup::Unknown
        }
    }
}

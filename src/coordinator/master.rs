//! Master Phase State Machine
//!
//! Drives ASSIGN -> REDUCE -> REDISTRIBUTE -> GATHER -> FINALIZE against the
//! whole worker set. Each phase arms a fresh [`PhaseBarrier`] sized to the
//! replies it expects, broadcasts its control message, and blocks until the
//! dispatch handler has counted every reply of the matching kind.

use super::barrier::PhaseBarrier;
use super::payload;
use crate::config::types::{ClusterConfig, NodeInfo};
use crate::partition::hashing::split_document;
use crate::partition::thresholds::compute_thresholds;
use crate::transport::service::{MessageHandler, Transport};
use crate::transport::types::{Envelope, MessageKind};

use anyhow::{Context, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Phases that wait on worker replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Assign,
    Reduce,
    Redistribute,
    Gather,
}

impl Phase {
    /// The only reply kind that counts toward this phase's barrier.
    pub fn reply_kind(self) -> MessageKind {
        match self {
            Phase::Assign => MessageKind::TaskDone,
            Phase::Reduce => MessageKind::LocalMinMax,
            Phase::Redistribute => MessageKind::RedistributionDone,
            Phase::Gather => MessageKind::FinalResult,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Assign => "ASSIGN",
            Phase::Reduce => "REDUCE",
            Phase::Redistribute => "REDISTRIBUTE",
            Phase::Gather => "GATHER",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consolidated output of a run: each worker's payload, keyed by worker id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalReport {
    pub results: BTreeMap<u32, String>,
}

impl FinalReport {
    /// `Node <id>` header followed by the worker's text, ids ascending.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (id, text) in &self.results {
            out.push_str(&format!("Node {}\n", id));
            out.push_str(text);
            out.push('\n');
        }
        out
    }
}

pub struct Master {
    config: Arc<ClusterConfig>,
    transport: Arc<Transport>,
    current: Mutex<Option<(Phase, Arc<PhaseBarrier>)>>,
    local_mins: Mutex<Vec<u64>>,
    local_maxs: Mutex<Vec<u64>>,
    final_results: DashMap<u32, String>,
    cancel: CancellationToken,
}

impl Master {
    /// Binds the master's listening port. Links to workers open on [`Master::run`].
    pub async fn new(config: Arc<ClusterConfig>) -> Result<Arc<Self>> {
        let transport = Transport::bind(
            config.master.clone(),
            config.workers.clone(),
            config.reconnect_delay(),
        )
        .await
        .context("failed to start master transport")?;

        Ok(Arc::new(Self {
            config,
            transport,
            current: Mutex::new(None),
            local_mins: Mutex::new(Vec::new()),
            local_maxs: Mutex::new(Vec::new()),
            final_results: DashMap::new(),
            cancel: CancellationToken::new(),
        }))
    }

    /// Cancelling this token makes the pending phase wait return `Cancelled`.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Runs the full pipeline over `documents` and writes the report to
    /// `config.output_path`.
    pub async fn run(self: &Arc<Self>, documents: &[String]) -> Result<FinalReport> {
        let started = Instant::now();
        self.transport.start(self.clone())?;

        tokio::select! {
            _ = self.cancel.cancelled() => anyhow::bail!("master cancelled before all workers connected"),
            res = self.transport.wait_for_routes() => res?,
        }

        info!("Master started. Assigning tasks...");
        let barrier = self.assign(documents);
        barrier.wait().await?;

        info!("All tasks completed. Initiating reduction...");
        let barrier = self.start_reduce();
        barrier.wait().await?;

        info!("All min/max received. Initiating redistribution...");
        let barrier = self.start_redistribute()?;
        barrier.wait().await?;

        info!("All redistribution done. Requesting final results...");
        let barrier = self.request_final_results();
        barrier.wait().await?;

        let report = self.finalize();
        self.write_report(&report).await?;
        self.disarm();
        self.transport.shutdown();

        info!(
            "Total running time: {:.3}s.",
            started.elapsed().as_secs_f64()
        );

        Ok(report)
    }

    fn arm(&self, phase: Phase, expected: usize) -> Arc<PhaseBarrier> {
        let barrier = Arc::new(PhaseBarrier::new(
            phase.as_str(),
            expected,
            self.cancel.child_token(),
        ));
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((phase, barrier.clone()));
        debug!("Armed {} barrier expecting {} replies", phase, expected);
        barrier
    }

    fn disarm(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Barrier of the running phase, if `kind` is what that phase waits for.
    fn barrier_for(&self, kind: MessageKind) -> Option<Arc<PhaseBarrier>> {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match current.as_ref() {
            Some((phase, barrier)) if phase.reply_kind() == kind => Some(barrier.clone()),
            Some((phase, _)) => {
                warn!("Ignoring {} received during {}", kind, phase);
                None
            }
            None => {
                warn!("Ignoring {} received outside any phase", kind);
                None
            }
        }
    }

    fn send_to(&self, worker: &NodeInfo, envelope: Envelope) {
        let kind = envelope.kind;
        if let Err(e) = self.transport.send(worker, envelope) {
            warn!("{} to worker {} dropped: {}", kind, worker.id, e);
        }
    }

    fn broadcast(&self, kind: MessageKind, payload: &str) {
        for worker in &self.config.workers {
            self.send_to(worker, Envelope::from_master(kind, payload));
        }
    }

    /// ASSIGN: one contiguous slice of every document per worker.
    fn assign(&self, documents: &[String]) -> Arc<PhaseBarrier> {
        let num_workers = self.config.num_workers();
        let barrier = self.arm(Phase::Assign, documents.len() * num_workers);

        for (doc_index, document) in documents.iter().enumerate() {
            let parts = split_document(document, num_workers);
            for (worker, part) in self.config.workers.iter().zip(parts) {
                debug!(
                    "Assigning {} bytes of document {} to worker {}",
                    part.len(),
                    doc_index,
                    worker.id
                );
                self.send_to(worker, Envelope::from_master(MessageKind::TaskAssignment, part));
            }
        }

        barrier
    }

    fn start_reduce(&self) -> Arc<PhaseBarrier> {
        let barrier = self.arm(Phase::Reduce, self.config.num_workers());
        self.broadcast(MessageKind::StartReduce, "");
        barrier
    }

    fn start_redistribute(&self) -> Result<Arc<PhaseBarrier>> {
        let global_min = self
            .local_mins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .min()
            .context("no local minimum reported")?;
        let global_max = self
            .local_maxs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .max()
            .context("no local maximum reported")?;

        let thresholds = compute_thresholds(global_min, global_max, self.config.num_workers());
        info!(
            "Global count range [{}, {}], thresholds {:?}",
            global_min, global_max, thresholds
        );

        let barrier = self.arm(Phase::Redistribute, self.config.num_workers());
        self.broadcast(
            MessageKind::StartRedistribute,
            &payload::encode_thresholds(&thresholds),
        );
        Ok(barrier)
    }

    fn request_final_results(&self) -> Arc<PhaseBarrier> {
        let barrier = self.arm(Phase::Gather, self.config.num_workers());
        self.broadcast(
            MessageKind::SortAndSendResult,
            self.config.result_mode.control_string(),
        );
        barrier
    }

    fn finalize(&self) -> FinalReport {
        let results = self
            .final_results
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        FinalReport { results }
    }

    async fn write_report(&self, report: &FinalReport) -> Result<()> {
        let path = &self.config.output_path;
        tokio::fs::write(path, report.render())
            .await
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!("Final result written to {}", path.display());
        Ok(())
    }

    fn handle_message(&self, envelope: Envelope, from: SocketAddr) -> Result<()> {
        match envelope.kind {
            MessageKind::TaskDone => {
                if let Some(barrier) = self.barrier_for(envelope.kind) {
                    let remaining = barrier.count_down();
                    info!("One task marked done. Remaining: {}", remaining);
                }
            }

            MessageKind::LocalMinMax => {
                let (min, max) = payload::decode_min_max(&envelope.payload)?;
                if let Some(barrier) = self.barrier_for(envelope.kind) {
                    self.local_mins
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(min);
                    self.local_maxs
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(max);
                    barrier.count_down();
                    info!(
                        "Received min/max ({}, {}) from worker {:?}",
                        min, max, envelope.sender_id
                    );
                }
            }

            MessageKind::RedistributionDone => {
                if let Some(barrier) = self.barrier_for(envelope.kind) {
                    barrier.count_down();
                    info!("Redistribution done from worker {:?}", envelope.sender_id);
                }
            }

            MessageKind::FinalResult => {
                let (id, text) = payload::decode_final_result(&envelope.payload)?;
                if let Some(barrier) = self.barrier_for(envelope.kind) {
                    match self.final_results.entry(id) {
                        Entry::Occupied(_) => {
                            warn!("Duplicate final result from worker {} ignored", id);
                            return Ok(());
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(text);
                        }
                    }
                    barrier.count_down();
                    info!("Received final result from worker {}", id);
                }
            }

            MessageKind::TaskAssignment
            | MessageKind::WordPair
            | MessageKind::ReqAck
            | MessageKind::Ack
            | MessageKind::StartReduce
            | MessageKind::StartRedistribute
            | MessageKind::Redistribution
            | MessageKind::SortAndSendResult => {
                warn!("Master ignoring {} from {}", envelope.kind, from);
            }
        }

        Ok(())
    }
}

impl MessageHandler for Master {
    async fn on_message(&self, envelope: Envelope, from: SocketAddr) {
        let kind = envelope.kind;
        if let Err(e) = self.handle_message(envelope, from) {
            error!("Error handling {} from {}: {:#}", kind, from, e);
        }
    }
}

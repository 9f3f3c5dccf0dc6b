//! Worker Phase State Machine
//!
//! Purely reactive: every transition is triggered by an inbound envelope.
//!
//! - `TASK_ASSIGNMENT` -> tokenize, hash-shuffle words, ACK quorum, `TASK_DONE`.
//! - `WORD_PAIR` / `REDISTRIBUTION` -> append to the matching pair list.
//! - `START_REDUCE` -> merge received pairs into local counts, report `min,max`.
//! - `START_REDISTRIBUTE` -> route every local count by threshold, ACK quorum,
//!   `REDISTRIBUTION_DONE`.
//! - `SORT_AND_SEND_RESULT` -> sort, then ship or keep the listing.
//! - `REQ_ACK` / `ACK` -> the quorum round trip.
//!
//! The ACK quorum runs on the receive task of the triggering envelope. Because
//! each outbound link is FIFO and each inbound link is processed in order, an
//! `ACK` from a peer proves every pair queued to that peer before the `REQ_ACK`
//! has already been appended on its side.

use super::barrier::AckQuorum;
use super::payload::{self, PayloadError, SAVED_LOCALLY_MARKER, WordPair};
use crate::config::types::{ClusterConfig, NodeInfo, ResultMode};
use crate::partition::hashing::word_target;
use crate::partition::thresholds::{bucket_for, min_max};
use crate::partition::tokenizer::tokenize;
use crate::transport::service::{MessageHandler, Transport};
use crate::transport::types::{Envelope, MessageKind};

use anyhow::{Context, Result};
use dashmap::DashMap;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

pub struct Worker {
    id: usize,
    config: Arc<ClusterConfig>,
    transport: Arc<Transport>,
    local_counts: DashMap<String, u64>,
    received_pairs: Mutex<Vec<WordPair>>,
    redistributed_pairs: Mutex<Vec<WordPair>>,
    ack_quorum: Mutex<Option<Arc<AckQuorum>>>,
    cancel: CancellationToken,
}

impl Worker {
    /// Binds the listening port configured for worker `id`.
    pub async fn new(config: Arc<ClusterConfig>, id: usize) -> Result<Arc<Self>> {
        let local = config.worker(id)?.clone();
        let transport = Transport::bind(local, config.worker_peers(id), config.reconnect_delay())
            .await
            .with_context(|| format!("failed to start transport for worker {}", id))?;

        Ok(Arc::new(Self {
            id,
            config,
            transport,
            local_counts: DashMap::new(),
            received_pairs: Mutex::new(Vec::new()),
            redistributed_pairs: Mutex::new(Vec::new()),
            ack_quorum: Mutex::new(None),
            cancel: CancellationToken::new(),
        }))
    }

    /// Starts accepting and dialing peers; returns immediately.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        self.transport.start(self.clone())?;
        info!("Worker {} started.", self.id);
        Ok(())
    }

    /// Releases any pending ACK wait and tears the transport down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.transport.shutdown();
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Copy of the reduced word counts.
    pub fn local_counts(&self) -> HashMap<String, u64> {
        self.local_counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Copy of the pairs received during redistribution, in arrival order.
    pub fn redistributed_pairs(&self) -> Vec<WordPair> {
        self.redistributed_pairs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn wire_id(&self) -> u32 {
        self.id as u32
    }

    fn to_master(&self, kind: MessageKind, payload: impl Into<String>) {
        let envelope = Envelope::from_worker(kind, payload, self.wire_id());
        if let Err(e) = self.transport.send(&self.config.master, envelope) {
            warn!("Worker {}: {} to master dropped: {}", self.id, kind, e);
        }
    }

    fn to_peer(&self, peer: &NodeInfo, kind: MessageKind, payload: impl Into<String>) {
        let envelope = Envelope::from_worker(kind, payload, self.wire_id());
        if let Err(e) = self.transport.send(peer, envelope) {
            warn!("Worker {}: {} to worker {} dropped: {}", self.id, kind, peer.id, e);
        }
    }

    fn other_workers(&self) -> impl Iterator<Item = &NodeInfo> {
        self.config
            .workers
            .iter()
            .filter(move |w| w.id as usize != self.id)
    }

    async fn handle_message(&self, envelope: Envelope, from: SocketAddr) -> Result<()> {
        match envelope.kind {
            MessageKind::TaskAssignment => self.handle_task(&envelope.payload).await,
            MessageKind::WordPair | MessageKind::Redistribution => self.on_receiving_pair(&envelope),
            MessageKind::ReqAck => self.handle_req_ack(&envelope),
            MessageKind::Ack => self.handle_ack(&envelope),
            MessageKind::StartReduce => {
                self.perform_reduction();
                Ok(())
            }
            MessageKind::StartRedistribute => self.redistribute(&envelope.payload).await,
            MessageKind::SortAndSendResult => self.send_final_result(&envelope.payload).await,
            MessageKind::TaskDone
            | MessageKind::LocalMinMax
            | MessageKind::RedistributionDone
            | MessageKind::FinalResult => {
                warn!("Worker {} ignoring {} from {}", self.id, envelope.kind, from);
                Ok(())
            }
        }
    }

    async fn handle_task(&self, text: &str) -> Result<()> {
        debug!("Worker {} received a task ({} bytes).", self.id, text.len());
        self.transport.wait_for_routes().await?;

        let num_workers = self.config.num_workers();
        let mut kept = 0usize;
        let mut shuffled = 0usize;

        for word in tokenize(text) {
            let target = word_target(&word, num_workers);
            let pair = WordPair::new(word, 1);

            if target == self.id {
                self.received_pairs
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(pair);
                kept += 1;
            } else {
                trace!("Worker {} shuffling {:?} to worker {}", self.id, pair.word, target);
                self.to_peer(self.config.worker(target)?, MessageKind::WordPair, pair.encode());
                shuffled += 1;
            }
        }

        debug!(
            "Worker {} kept {} word(s), shuffled {} word(s)",
            self.id, kept, shuffled
        );

        self.await_peer_acks().await?;
        self.to_master(MessageKind::TaskDone, self.id.to_string());
        Ok(())
    }

    /// Sends `REQ_ACK` to every other worker and blocks until each has answered once.
    async fn await_peer_acks(&self) -> Result<()> {
        let expected = self.config.num_workers() - 1;
        let quorum = Arc::new(AckQuorum::new(expected, self.cancel.child_token()));
        *self
            .ack_quorum
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(quorum.clone());

        for peer in self.other_workers() {
            self.to_peer(peer, MessageKind::ReqAck, "");
        }

        let outcome = quorum.wait().await;
        *self
            .ack_quorum
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        outcome?;

        debug!("Worker {} received all {} ACK(s)", self.id, expected);
        Ok(())
    }

    fn sender_of(&self, envelope: &Envelope) -> Result<u32> {
        envelope
            .sender_id
            .with_context(|| format!("{} without a sender id", envelope.kind))
    }

    fn handle_req_ack(&self, envelope: &Envelope) -> Result<()> {
        let requester = self.sender_of(envelope)?;
        let peer = self.config.worker(requester as usize)?;
        self.to_peer(peer, MessageKind::Ack, "");
        Ok(())
    }

    fn handle_ack(&self, envelope: &Envelope) -> Result<()> {
        let peer = self.sender_of(envelope)?;
        // Only the other workers take part in the quorum.
        if !self.other_workers().any(|w| w.id == peer as i32) {
            warn!("Worker {} ignoring ACK from non-peer {}", self.id, peer);
            return Ok(());
        }

        let quorum = self
            .ack_quorum
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match quorum {
            Some(quorum) => {
                if !quorum.acknowledge(peer) {
                    warn!("Worker {} got a repeated ACK from {}", self.id, peer);
                }
            }
            None => warn!("Worker {} got an ACK from {} with no quorum pending", self.id, peer),
        }
        Ok(())
    }

    fn on_receiving_pair(&self, envelope: &Envelope) -> Result<()> {
        let pair = WordPair::decode(envelope.kind, &envelope.payload)?;
        let target = match envelope.kind {
            MessageKind::Redistribution => &self.redistributed_pairs,
            _ => &self.received_pairs,
        };
        target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pair);
        Ok(())
    }

    fn perform_reduction(&self) {
        let pairs = std::mem::take(
            &mut *self
                .received_pairs
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        for pair in pairs {
            *self.local_counts.entry(pair.word).or_insert(0) += pair.count;
        }

        let (local_min, local_max) = min_max(self.local_counts.iter().map(|entry| *entry.value()));
        info!(
            "Worker {} reduced {} distinct word(s), min {} max {}",
            self.id,
            self.local_counts.len(),
            local_min,
            local_max
        );

        self.to_master(
            MessageKind::LocalMinMax,
            payload::encode_min_max(local_min, local_max),
        );
    }

    async fn redistribute(&self, raw: &str) -> Result<()> {
        debug!("Worker {} redistributing...", self.id);
        let thresholds = payload::decode_thresholds(raw)?;
        if thresholds.len() != self.config.num_workers() - 1 {
            return Err(PayloadError::Malformed {
                kind: MessageKind::StartRedistribute,
                payload: raw.to_string(),
            }
            .into());
        }
        self.transport.wait_for_routes().await?;

        let counts: Vec<WordPair> = self
            .local_counts
            .iter()
            .map(|entry| WordPair::new(entry.key().clone(), *entry.value()))
            .collect();

        for pair in counts {
            let bucket = bucket_for(pair.count, &thresholds);
            if bucket == self.id {
                self.redistributed_pairs
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(pair);
            } else {
                trace!("Worker {} moving {:?} to bucket {}", self.id, pair.word, bucket);
                self.to_peer(
                    self.config.worker(bucket)?,
                    MessageKind::Redistribution,
                    pair.encode(),
                );
            }
        }

        self.await_peer_acks().await?;
        self.to_master(MessageKind::RedistributionDone, "");
        Ok(())
    }

    async fn send_final_result(&self, ctrl: &str) -> Result<()> {
        let mut pairs = self.redistributed_pairs();
        payload::sort_pairs(&mut pairs);
        let listing = payload::render_pairs(&pairs);

        let text = match ResultMode::from_control_string(ctrl) {
            ResultMode::Explicit => listing,
            ResultMode::KeepLocal => {
                self.save_locally(&listing).await?;
                SAVED_LOCALLY_MARKER.to_string()
            }
        };

        self.to_master(
            MessageKind::FinalResult,
            payload::encode_final_result(self.wire_id(), &text),
        );
        debug!("Worker {} sent final result.", self.id);
        Ok(())
    }

    async fn save_locally(&self, listing: &str) -> Result<()> {
        let Some(dir) = &self.config.local_result_dir else {
            return Ok(());
        };

        let path = dir.join(format!("worker_{}_result.txt", self.id));
        tokio::fs::write(&path, listing)
            .await
            .with_context(|| format!("failed to save result to {}", path.display()))?;
        info!("Worker {} saved result to {}", self.id, path.display());
        Ok(())
    }
}

impl MessageHandler for Worker {
    async fn on_message(&self, envelope: Envelope, from: SocketAddr) {
        let kind = envelope.kind;
        if let Err(e) = self.handle_message(envelope, from).await {
            error!("Worker {} failed to handle {} from {}: {:#}", self.id, kind, from, e);
        }
    }
}

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BarrierError {
    #[error("wait for {phase} cancelled with {remaining} reply(ies) outstanding")]
    Cancelled { phase: &'static str, remaining: usize },
}

/// Single-use countdown for one phase.
///
/// Created at phase entry with the number of replies the phase expects, counted
/// down by the dispatch handler, awaited by the phase driver. Never reused: the
/// next phase allocates a fresh barrier.
#[derive(Debug)]
pub struct PhaseBarrier {
    phase: &'static str,
    remaining: watch::Sender<usize>,
    cancel: CancellationToken,
}

impl PhaseBarrier {
    pub fn new(phase: &'static str, expected: usize, cancel: CancellationToken) -> Self {
        let (remaining, _) = watch::channel(expected);
        Self {
            phase,
            remaining,
            cancel,
        }
    }

    pub fn phase(&self) -> &'static str {
        self.phase
    }

    /// Records one reply and returns how many are still outstanding. Extra
    /// replies past zero are absorbed.
    pub fn count_down(&self) -> usize {
        let mut left = 0;
        self.remaining.send_modify(|n| {
            *n = n.saturating_sub(1);
            left = *n;
        });
        left
    }

    pub fn remaining(&self) -> usize {
        *self.remaining.borrow()
    }

    /// Blocks until the count reaches zero (`Ok`) or the barrier's cancellation
    /// token fires (`Err(Cancelled)`). No timeout.
    pub async fn wait(&self) -> Result<(), BarrierError> {
        let mut remaining = self.remaining.subscribe();

        let satisfied = tokio::select! {
            biased;
            res = remaining.wait_for(|n| *n == 0) => res.is_ok(),
            _ = self.cancel.cancelled() => false,
        };

        if satisfied {
            Ok(())
        } else {
            Err(BarrierError::Cancelled {
                phase: self.phase,
                remaining: self.remaining(),
            })
        }
    }
}

/// Barrier that only counts distinct acknowledging peers.
#[derive(Debug)]
pub struct AckQuorum {
    barrier: PhaseBarrier,
    acked: Mutex<HashSet<u32>>,
}

impl AckQuorum {
    pub fn new(expected: usize, cancel: CancellationToken) -> Self {
        Self {
            barrier: PhaseBarrier::new("ack quorum", expected, cancel),
            acked: Mutex::new(HashSet::with_capacity(expected)),
        }
    }

    /// Counts `peer` once. Returns `false` for a repeated ACK.
    pub fn acknowledge(&self, peer: u32) -> bool {
        let fresh = self
            .acked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer);
        if fresh {
            self.barrier.count_down();
        }
        fresh
    }

    pub fn remaining(&self) -> usize {
        self.barrier.remaining()
    }

    pub async fn wait(&self) -> Result<(), BarrierError> {
        self.barrier.wait().await
    }
}

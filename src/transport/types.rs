use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of message kinds exchanged by the master and the workers.
///
/// - `TaskAssignment/TaskDone`: ASSIGN phase, master <-> worker.
/// - `WordPair/Redistribution`: worker -> worker shuffle units.
/// - `ReqAck/Ack`: ACK-quorum round trip between workers.
/// - `StartReduce/LocalMinMax`: REDUCE phase.
/// - `StartRedistribute/RedistributionDone`: REDISTRIBUTE phase.
/// - `SortAndSendResult/FinalResult`: GATHER phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MessageKind {
    TaskAssignment,
    TaskDone,
    WordPair,
    ReqAck,
    Ack,
    StartReduce,
    LocalMinMax,
    StartRedistribute,
    Redistribution,
    RedistributionDone,
    SortAndSendResult,
    FinalResult,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::TaskAssignment => "TASK_ASSIGNMENT",
            MessageKind::TaskDone => "TASK_DONE",
            MessageKind::WordPair => "WORD_PAIR",
            MessageKind::ReqAck => "REQ_ACK",
            MessageKind::Ack => "ACK",
            MessageKind::StartReduce => "START_REDUCE",
            MessageKind::LocalMinMax => "LOCAL_MIN_MAX",
            MessageKind::StartRedistribute => "START_REDISTRIBUTE",
            MessageKind::Redistribution => "REDISTRIBUTION",
            MessageKind::RedistributionDone => "REDISTRIBUTION_DONE",
            MessageKind::SortAndSendResult => "SORT_AND_SEND_RESULT",
            MessageKind::FinalResult => "FINAL_RESULT",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The wire record. Immutable once built; the payload grammar depends on `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    pub kind: MessageKind,
    pub payload: String,
    /// Worker id of the sender. `None` for the master.
    pub sender_id: Option<u32>,
}

impl Envelope {
    pub fn new(kind: MessageKind, payload: impl Into<String>, sender_id: Option<u32>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            sender_id,
        }
    }

    /// Envelope originating from the master.
    pub fn from_master(kind: MessageKind, payload: impl Into<String>) -> Self {
        Self::new(kind, payload, None)
    }

    /// Envelope originating from worker `id`.
    pub fn from_worker(kind: MessageKind, payload: impl Into<String>, id: u32) -> Self {
        Self::new(kind, payload, Some(id))
    }
}

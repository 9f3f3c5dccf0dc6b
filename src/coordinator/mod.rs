//! Coordination Module
//!
//! The phase state machines run by the master and by every worker, plus the
//! synchronization primitives and payload grammar they share.
//!
//! ## Pipeline
//! ```text
//! Master --TASK_ASSIGNMENT--> Workers --WORD_PAIR--> Workers
//! Workers --TASK_DONE / LOCAL_MIN_MAX--> Master
//! Master --START_REDISTRIBUTE(thresholds)--> Workers --REDISTRIBUTION--> Workers
//! Workers --REDISTRIBUTION_DONE / FINAL_RESULT--> Master
//! ```
//!
//! ## Liveness
//! No wait has a timeout. A lost envelope, a crashed peer or an unparsable
//! payload leaves the owning barrier short forever; only cancellation releases it.
//!
//! ## Submodules
//! - **`barrier`**: `PhaseBarrier` (per-phase countdown) and `AckQuorum`.
//! - **`master`**: `Master`, `Phase`, `FinalReport`.
//! - **`payload`**: `WordPair` and the kind-specific payload encodings.
//! - **`worker`**: `Worker`.

pub mod barrier;
pub mod master;
pub mod payload;
pub mod worker;

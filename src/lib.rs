//! Distributed Word-Count Cluster Library
//!
//! A master and a fixed pool of workers count words across input documents,
//! talking only over raw TCP. The binary (`main.rs`) wires these modules into
//! the `master` and `worker` process roles.
//!
//! ## Architecture Modules
//! - **`config`**: Static cluster description (master address, ordered worker list,
//!   verbosity, result mode) and logging setup.
//! - **`transport`**: Persistent full-mesh TCP links with reconnection, FIFO per link,
//!   and length-delimited envelope framing.
//! - **`partition`**: Document splitting, tokenizing, hash shuffle targets and the
//!   log-scale threshold rebalancing math.
//! - **`coordinator`**: The master and worker phase state machines, phase barriers
//!   and the ACK-quorum sub-protocol.

pub mod config;
pub mod coordinator;
pub mod partition;
pub mod transport;

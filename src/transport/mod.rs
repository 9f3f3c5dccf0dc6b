//! Peer-to-Peer Transport Module
//!
//! Keeps a persistent full mesh of TCP links between the master and the workers
//! and delivers typed envelopes over them.
//!
//! ## Core Mechanisms
//! - **Inbound**: one accept loop; every accepted connection gets its own receive
//!   task that decodes envelopes one at a time and awaits the dispatch handler.
//!   A read error ends only that connection.
//! - **Outbound**: one task per configured peer owns a FIFO queue. It dials the
//!   peer (retrying forever at a fixed delay), then writes and flushes one
//!   envelope at a time. On a write error it redials and resumes the same queue.
//! - **Ordering**: FIFO per directed link. Nothing is ordered across links.
//! - **Loss**: the envelope being written when a link breaks is not replayed.
//!   A `send` before the first link to a peer exists fails with `NoRoute`.
//!
//! ## Submodules
//! - **`types`**: `Envelope` and the closed `MessageKind` enum.
//! - **`codec`**: length-delimited bincode framing.
//! - **`service`**: the `Transport` itself and the `MessageHandler` callback trait.

pub mod codec;
pub mod service;
pub mod types;

//! Cluster Configuration Module
//!
//! Holds the static description of the cluster: where the master listens, the
//! ordered worker list (position = worker id) and the console verbosity.
//!
//! ## Overview
//! A single `ClusterConfig` is built once at startup (from a JSON file or the
//! built-in defaults) and shared by reference with the transport, the master and
//! every worker. Nothing in the crate reads configuration from globals.
//!
//! ## Submodules
//! - **`types`**: `NodeInfo`, `ClusterConfig`, `Verbosity`, `ResultMode`, validation.
//! - **`logging`**: installs the `tracing` subscriber for a given verbosity.

pub mod logging;
pub mod types;

#[cfg(test)]
mod tests;

//! Partitioning Module
//!
//! Pure functions that decide where words and text go.
//!
//! ## Overview
//! - **Splitting**: the master cuts each document into one contiguous range per worker.
//! - **Tokenizing**: workers split on whitespace, lower-case and strip non-word characters.
//! - **Hash shuffle**: `hash(word) mod n` picks the worker that counts a word.
//! - **Rebalancing**: log-scale thresholds over the observed count range pick the
//!   worker that finally holds a word, by its count.
//!
//! ## Submodules
//! - **`hashing`**: `word_target`, `split_ranges`, `split_document`.
//! - **`thresholds`**: `compute_thresholds`, `bucket_for`, `min_max`.
//! - **`tokenizer`**: `tokenize`, `normalize_token`.

pub mod hashing;
pub mod thresholds;
pub mod tokenizer;

#[cfg(test)]
mod tests;

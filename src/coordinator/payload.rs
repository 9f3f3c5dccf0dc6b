//! Payload grammar for each message kind.
//!
//! | kind                   | payload                 |
//! |------------------------|-------------------------|
//! | `WORD_PAIR`, `REDISTRIBUTION` | `word:count`     |
//! | `LOCAL_MIN_MAX`        | `min,max`               |
//! | `START_REDISTRIBUTE`   | `t1,t2,...` (may be empty) |
//! | `FINAL_RESULT`         | `id:text`               |

use crate::transport::types::MessageKind;

use std::num::ParseIntError;
use thiserror::Error;

/// Text a worker reports in place of its listing under `KEEP_LOCAL`.
pub const SAVED_LOCALLY_MARKER: &str = " result saved locally";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed {kind} payload: {payload:?}")]
    Malformed { kind: MessageKind, payload: String },

    #[error("invalid number in {kind} payload {payload:?}: {source}")]
    InvalidNumber {
        kind: MessageKind,
        payload: String,
        #[source]
        source: ParseIntError,
    },
}

fn parse_number<T: std::str::FromStr<Err = ParseIntError>>(
    kind: MessageKind,
    payload: &str,
    raw: &str,
) -> Result<T, PayloadError> {
    raw.trim()
        .parse()
        .map_err(|source| PayloadError::InvalidNumber {
            kind,
            payload: payload.to_string(),
            source,
        })
}

/// Shuffle unit: a word and how many times it was seen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WordPair {
    pub word: String,
    pub count: u64,
}

impl WordPair {
    pub fn new(word: impl Into<String>, count: u64) -> Self {
        Self {
            word: word.into(),
            count,
        }
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.word, self.count)
    }

    pub fn decode(kind: MessageKind, payload: &str) -> Result<Self, PayloadError> {
        let (word, count) = payload
            .rsplit_once(':')
            .ok_or_else(|| PayloadError::Malformed {
                kind,
                payload: payload.to_string(),
            })?;

        Ok(Self {
            word: word.to_string(),
            count: parse_number(kind, payload, count)?,
        })
    }
}

/// Orders by count ascending, then word ascending.
pub fn sort_pairs(pairs: &mut [WordPair]) {
    pairs.sort_by(|a, b| a.count.cmp(&b.count).then_with(|| a.word.cmp(&b.word)));
}

/// One `word: count` line per pair.
pub fn render_pairs(pairs: &[WordPair]) -> String {
    let mut out = String::new();
    for pair in pairs {
        out.push_str(&format!("{}: {}\n", pair.word, pair.count));
    }
    out
}

pub fn encode_min_max(min: u64, max: u64) -> String {
    format!("{},{}", min, max)
}

pub fn decode_min_max(payload: &str) -> Result<(u64, u64), PayloadError> {
    let kind = MessageKind::LocalMinMax;
    let (min, max) = payload
        .split_once(',')
        .ok_or_else(|| PayloadError::Malformed {
            kind,
            payload: payload.to_string(),
        })?;

    Ok((
        parse_number(kind, payload, min)?,
        parse_number(kind, payload, max)?,
    ))
}

pub fn encode_thresholds(thresholds: &[u64]) -> String {
    thresholds
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn decode_thresholds(payload: &str) -> Result<Vec<u64>, PayloadError> {
    if payload.trim().is_empty() {
        return Ok(Vec::new());
    }

    payload
        .split(',')
        .map(|raw| parse_number(MessageKind::StartRedistribute, payload, raw))
        .collect()
}

pub fn encode_final_result(worker_id: u32, text: &str) -> String {
    format!("{}:{}", worker_id, text)
}

/// Splits `id:text` at the first colon; `text` is returned verbatim.
pub fn decode_final_result(payload: &str) -> Result<(u32, String), PayloadError> {
    let kind = MessageKind::FinalResult;
    let (id, text) = payload
        .split_once(':')
        .ok_or_else(|| PayloadError::Malformed {
            kind,
            payload: payload.to_string(),
        })?;

    Ok((parse_number(kind, payload, id)?, text.to_string()))
}

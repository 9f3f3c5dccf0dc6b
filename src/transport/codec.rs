//! Length-delimited bincode framing for [`Envelope`].
//!
//! Each frame is a big-endian `u32` length followed by the bincode encoding of
//! one envelope.

use super::types::Envelope;

use bytes::{Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

#[derive(Debug)]
pub struct EnvelopeCodec {
    inner: LengthDelimitedCodec,
}

impl EnvelopeCodec {
    pub fn new() -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .max_frame_length(MAX_FRAME_LENGTH)
                .new_codec(),
        }
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>, io::Error> {
        match self.inner.decode(src)? {
            Some(frame) => bincode::deserialize(&frame)
                .map(Some)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            None => Ok(None),
        }
    }
}

impl Encoder<Envelope> for EnvelopeCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), io::Error> {
        let bytes =
            bincode::serialize(&item).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.inner.encode(Bytes::from(bytes), dst)
    }
}

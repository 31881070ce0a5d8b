// src/core/protocol/codec.rs

//! Implements newline-delimited JSON framing as a `tokio_util` codec.

use super::message::Request;
use crate::core::StratumError;
use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder};

const DELIMITER: u8 = b'\n';

/// The default upper bound on a single inbound line, delimiter excluded.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

/// The codec used by the server side of a connection.
pub type StratumCodec = JsonLineCodec<Request>;

/// One decoded line.
///
/// Bad lines are reported in-band instead of as a decoder error, because a
/// decoder error ends the `Framed` stream and a bad line must not end the
/// connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound<T> {
    Message(T),
    Malformed(StratumError),
}

/// Decodes `T` from newline-terminated JSON lines and encodes any `Serialize`
/// value as compact JSON followed by a newline.
#[derive(Debug)]
pub struct JsonLineCodec<T> {
    max_length: usize,
    /// Where to resume the delimiter scan, so bytes are examined once.
    next_index: usize,
    /// Set while dropping the tail of an oversized line.
    discarding: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonLineCodec<T> {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
            _marker: PhantomData,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl<T> Default for JsonLineCodec<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl<T: DeserializeOwned> JsonLineCodec<T> {
    fn parse_line(line: &[u8]) -> Inbound<T> {
        match serde_json::from_slice::<T>(line) {
            Ok(msg) => Inbound::Message(msg),
            Err(e) => Inbound::Malformed(StratumError::MalformedJson(e.to_string())),
        }
    }
}

impl<T: DeserializeOwned> Decoder for JsonLineCodec<T> {
    type Item = Inbound<T>;
    type Error = StratumError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            // Never look further than one byte past the limit.
            let read_to = src.len().min(self.max_length.saturating_add(1));
            let newline = src[self.next_index..read_to]
                .iter()
                .position(|b| *b == DELIMITER);

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    src.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    src.advance(read_to);
                    self.next_index = 0;
                    if src.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = src.split_to(end + 1);
                    let line = line[..end].trim_ascii();
                    if line.is_empty() {
                        continue;
                    }
                    return Ok(Some(Self::parse_line(line)));
                }
                (false, None) if src.len() > self.max_length => {
                    self.discarding = true;
                    self.next_index = 0;
                    return Ok(Some(Inbound::Malformed(StratumError::RequestTooLarge {
                        limit: self.max_length,
                    })));
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(buf)? {
            return Ok(Some(item));
        }
        // A final line the peer never terminated.
        self.next_index = 0;
        if self.discarding || buf.is_empty() {
            buf.clear();
            self.discarding = false;
            return Ok(None);
        }
        let line = buf.split_to(buf.len());
        let line = line.trim_ascii();
        if line.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::parse_line(line)))
    }
}

impl<T, M: Serialize> Encoder<M> for JsonLineCodec<T> {
    type Error = StratumError;

    fn encode(&mut self, item: M, dst: &mut BytesMut) -> Result<(), Self::Error> {
        serde_json::to_writer((&mut *dst).writer(), &item)
            .map_err(|e| StratumError::Internal(format!("failed to encode message: {e}")))?;
        dst.put_u8(DELIMITER);
        Ok(())
    }
}

//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use crate::{CodecError, CodecResult, Frame};
use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// Carriage return + line feed, the manager protocol line terminator
pub const CRLF: &[u8] = b"\r\n";

/// A codec that splits a byte stream on a fixed delimiter token.
///
/// Inbound bytes are cut into [`Frame`]s that keep their trailing token.
/// Outbound data is passed through untouched; the encoder never inserts or
/// splits on tokens, so callers decide where frames end.
///
/// The decoder remembers how much of the buffer it has already searched, so
/// a large frame arriving in many small reads is scanned only once.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    token: Bytes,
    next_index: usize,
}

impl TokenCodec {
    /// Creates a codec splitting on `token`.
    ///
    /// # Errors
    /// Returns [`CodecError::EmptyToken`] if `token` is empty.
    ///
    /// # Example
    /// ```
    /// use amilink_tokencodec::TokenCodec;
    ///
    /// let codec = TokenCodec::new(&b"\n"[..]).unwrap();
    /// assert_eq!(codec.token(), b"\n");
    /// ```
    pub fn new(token: impl Into<Bytes>) -> CodecResult<TokenCodec> {
        let token = token.into();
        if token.is_empty() {
            return Err(CodecError::EmptyToken);
        }
        Ok(TokenCodec {
            token,
            next_index: 0,
        })
    }

    /// Creates a codec splitting on CR LF.
    pub fn crlf() -> TokenCodec {
        TokenCodec {
            token: Bytes::from_static(CRLF),
            next_index: 0,
        }
    }

    /// The delimiter token this codec splits on
    pub fn token(&self) -> &[u8] {
        &self.token
    }

    fn find_token(&self, src: &[u8]) -> Option<usize> {
        let start = self.next_index.min(src.len());
        src[start..]
            .windows(self.token.len())
            .position(|window| window == self.token.as_ref())
            .map(|offset| start + offset)
    }
}

impl Default for TokenCodec {
    fn default() -> Self {
        TokenCodec::crlf()
    }
}

impl Decoder for TokenCodec {
    type Item = Frame;
    type Error = CodecError;

    /// Splits the next complete frame off the front of `src`.
    ///
    /// Returns `Ok(None)` when `src` holds no delimiter yet; the bytes stay in
    /// the buffer until more data arrives.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        match self.find_token(src) {
            Some(index) => {
                let end = index + self.token.len();
                self.next_index = 0;
                let frame = src.split_to(end).freeze();
                trace!(len = frame.len(), "Decoded frame");
                Ok(Some(Frame::terminated(frame)))
            }
            None => {
                // A token may straddle the next read, keep its prefix in range.
                self.next_index = src.len().saturating_sub(self.token.len() - 1);
                Ok(None)
            }
        }
    }

    /// Drains complete frames, then the undelimited remainder exactly once.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        self.next_index = 0;
        if src.is_empty() {
            Ok(None)
        } else {
            let rest = src.split().freeze();
            trace!(len = rest.len(), "Flushing unterminated remainder");
            Ok(Some(Frame::unterminated(rest)))
        }
    }
}

impl Encoder<&[u8]> for TokenCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len());
        dst.put_slice(item);
        Ok(())
    }
}

impl Encoder<&str> for TokenCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode(item.as_bytes(), dst)
    }
}

impl Encoder<Bytes> for TokenCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode(item.as_ref(), dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_all(codec: &mut TokenCodec, src: &mut BytesMut) -> Vec<Frame> {
        let mut out = Vec::new();
        while let Some(frame) = codec.decode(src).expect("decode should not error") {
            out.push(frame);
        }
        out
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(matches!(
            TokenCodec::new(Bytes::new()),
            Err(CodecError::EmptyToken)
        ));
    }

    #[test]
    fn decode_keeps_token_on_frame() {
        let mut codec = TokenCodec::crlf();
        let mut src = BytesMut::from(&b"Response: Success\r\nActionID: 1\r\n\r\n"[..]);
        let frames = collect_all(&mut codec, &mut src);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].as_bytes(), b"Response: Success\r\n");
        assert_eq!(frames[1].as_bytes(), b"ActionID: 1\r\n");
        assert_eq!(frames[2].as_bytes(), b"\r\n");
        assert!(frames.iter().all(Frame::is_terminated));
        assert!(src.is_empty());
    }

    #[test]
    fn decode_waits_for_split_token() {
        let mut codec = TokenCodec::crlf();
        let mut src = BytesMut::from(&b"Ping: Pong\r"[..]);
        assert!(codec.decode(&mut src).unwrap().is_none());
        src.extend_from_slice(b"\nTail");
        let frame = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(frame.as_bytes(), b"Ping: Pong\r\n");
        assert_eq!(&src[..], b"Tail");
    }

    #[test]
    fn decode_eof_flushes_remainder_once() {
        let mut codec = TokenCodec::crlf();
        let mut src = BytesMut::from(&b"Event: Hangup\r\nChann"[..]);
        let first = codec.decode_eof(&mut src).unwrap().unwrap();
        assert!(first.is_terminated());
        let rest = codec.decode_eof(&mut src).unwrap().unwrap();
        assert!(!rest.is_terminated());
        assert_eq!(rest.as_bytes(), b"Chann");
        assert!(codec.decode_eof(&mut src).unwrap().is_none());
    }

    #[test]
    fn decode_eof_on_empty_buffer_yields_nothing() {
        let mut codec = TokenCodec::crlf();
        let mut src = BytesMut::new();
        assert!(codec.decode_eof(&mut src).unwrap().is_none());
    }

    #[test]
    fn multi_byte_token_is_not_matched_partially() {
        let mut codec = TokenCodec::new(&b"--END--"[..]).unwrap();
        let mut src = BytesMut::from(&b"a--EN"[..]);
        assert!(codec.decode(&mut src).unwrap().is_none());
        src.extend_from_slice(b"D--b");
        let frame = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(frame.as_bytes(), b"a--END--");
    }

    #[test]
    fn encoder_passes_bytes_through() {
        let mut codec = TokenCodec::crlf();
        let mut dst = BytesMut::new();
        codec.encode("Action: Ping\r\n", &mut dst).unwrap();
        codec.encode(Bytes::from_static(b"\r\n"), &mut dst).unwrap();
        assert_eq!(&dst[..], b"Action: Ping\r\n\r\n");
    }
}

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

//! Frame type produced by the [`TokenCodec`](crate::TokenCodec)

use bytes::Bytes;
use std::fmt;

/// One token-delimited unit of an inbound byte stream.
///
/// A frame normally ends with (and includes) the delimiter token. The only
/// exception is the final frame flushed when a stream terminates abnormally,
/// which carries whatever trailing bytes never saw their delimiter.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    data: Bytes,
    terminated: bool,
}

impl Frame {
    /// Create a frame that ends with its delimiter token.
    pub fn terminated(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            terminated: true,
        }
    }

    /// Create a trailing frame that never received its delimiter token.
    pub fn unterminated(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            terminated: false,
        }
    }

    /// Whether the frame ends with the delimiter token
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Raw bytes of the frame, delimiter included
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Length of the frame in bytes, delimiter included
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Frame contents with `token` removed from the end, if present.
    pub fn strip_token(&self, token: &[u8]) -> &[u8] {
        self.data.strip_suffix(token).unwrap_or(&self.data)
    }

    /// Lossy UTF-8 view of the frame, delimiter included
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Consume the frame, returning the underlying bytes
    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("data", &String::from_utf8_lossy(&self.data))
            .field("terminated", &self.terminated)
            .finish()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_token_removes_only_trailing_delimiter() {
        let frame = Frame::terminated(&b"Key: Value\r\n"[..]);
        assert_eq!(frame.strip_token(b"\r\n"), b"Key: Value");

        let frame = Frame::unterminated(&b"Key: Val"[..]);
        assert_eq!(frame.strip_token(b"\r\n"), b"Key: Val");
        assert!(!frame.is_terminated());
    }
}

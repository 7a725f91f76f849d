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

//! # Token Frame Codec
//!
//! Splits a raw byte stream into frames ending with a fixed delimiter token,
//! the framing used by line-oriented text protocols such as the Asterisk
//! manager interface (CR LF).
//!
//! The [`TokenCodec`] implements [`Decoder`](tokio_util::codec::Decoder) and
//! [`Encoder`](tokio_util::codec::Encoder) from `tokio_util::codec`:
//!
//! - every decoded [`Frame`] keeps its delimiter, so a blank line decodes to
//!   the bare token;
//! - `decode_eof` flushes a trailing, undelimited remainder exactly once so
//!   data cut off by a disconnect is not lost;
//! - encoding is a pass-through, output is never split on tokens.
//!
//! ## Usage Example
//!
//! ```rust
//! use amilink_tokencodec::TokenCodec;
//! use bytes::BytesMut;
//! use tokio_util::codec::Decoder;
//!
//! let mut codec = TokenCodec::crlf();
//! let mut input = BytesMut::from(&b"Asterisk Call Manager/1.1\r\nResp"[..]);
//!
//! let banner = codec.decode(&mut input).unwrap().unwrap();
//! assert_eq!(banner.as_bytes(), b"Asterisk Call Manager/1.1\r\n");
//! assert!(codec.decode(&mut input).unwrap().is_none());
//!
//! let rest = codec.decode_eof(&mut input).unwrap().unwrap();
//! assert!(!rest.is_terminated());
//! ```

mod codec;
mod frame;
mod result;

pub use codec::{CRLF, TokenCodec};
pub use frame::Frame;
pub use result::{CodecError, CodecResult};

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

//! # amilink Token Stream
//!
//! A buffered, token-framed, non-blocking TCP socket for line-oriented
//! protocols. The stream is driven by repeated calls to
//! [`TokenStream::tick`], which multiplexes reads and writes on the socket
//! with a short bounded wait, so many streams can share a single task.
//!
//! ```text
//! TokenStream::tick
//!     ├── alarm expired? → StreamHandler::on_alarm
//!     ├── readable       → TokenCodec → StreamHandler::on_frame
//!     └── writable       → drain queued output
//! ```
//!
//! # Example
//!
//! ```no_run
//! use amilink_service::{StreamConfig, StreamError, StreamHandler, TokenStream};
//! use amilink_tokencodec::Frame;
//!
//! struct Printer;
//!
//! impl StreamHandler<()> for Printer {
//!     type Error = StreamError;
//!
//!     fn on_frame(&mut self, _stream: &mut TokenStream, frame: Frame) -> Result<(), StreamError> {
//!         print!("{}", frame.to_string_lossy());
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StreamError> {
//!     let mut stream = TokenStream::connect("localhost", 5038, StreamConfig::default()).await?;
//!     stream.write("Action: Ping\r\n\r\n", false)?;
//!     stream.run(&mut Printer, None, Some(std::time::Duration::from_secs(2))).await
//! }
//! ```

mod config;
mod error;
mod handler;
mod stream;

pub use config::StreamConfig;
pub use error::{Result, StreamError};
pub use handler::StreamHandler;
pub use stream::TokenStream;

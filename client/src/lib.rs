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

//! # amilink Manager Client
//!
//! Client for line-oriented PBX manager protocols: log in, run a list of
//! actions, match replies and events back to them and keep the connection
//! alive, all without a thread or task per connection.
//!
//! ## Features
//!
//! - **Plain and MD5 Challenge Login** - Chosen through [`Credentials`]
//! - **Ordered Action Queue** - Strict FIFO with explicit front insertion
//! - **Reply Correlation** - By `ActionID`, with stop events for list actions
//! - **Keepalive** - Ping/pong with fault detection
//! - **Many Hosts at Once** - [`Orchestrator`] drives sessions concurrently
//!
//! ## Quick Start
//!
//! ```no_run
//! use amilink_client::{ActionRequest, DisconnectMode, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = "admin:secret@pbx1:5038"
//!         .parse::<SessionConfig>()?
//!         .with_disconnect_mode(DisconnectMode::WhenDone);
//!
//!     let mut session = Session::connect(config).await?;
//!     session.add_action(
//!         ActionRequest::new("QueueStatus")
//!             .with_stop_event("QueueStatusComplete")
//!             .with_callback(|message, _request| println!("{}", message)),
//!     );
//!     session.process(None, None).await?;
//!     Ok(())
//! }
//! ```

mod action;
mod auth;
mod config;
mod error;
mod handler;
mod message;
mod orchestrator;
mod session;

pub use action::{ActionCallback, ActionId, ActionRequest};
pub use auth::{Credentials, challenge_digest};
pub use config::{DEFAULT_BANNER_PREFIX, DEFAULT_PORT, DisconnectMode, SessionConfig};
pub use error::{Result, SessionError, TimeoutKind};
pub use handler::{CallbackHandler, LoggingHandler, SessionHandler};
pub use message::{END_COMMAND, Message};
pub use orchestrator::{HostError, Orchestrator};
pub use session::{Advance, Session, SessionState};

// Re-export transport types
pub use amilink_service::{StreamConfig, StreamError};

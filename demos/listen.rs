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

//! Print every event a manager sends until the connection drops
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example listen -- admin:secret@pbx1
//! ```

use amilink_client::{CallbackHandler, DisconnectMode, Message, Session, SessionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let endpoint = std::env::args().nth(1).unwrap_or_default();
    let mut config: SessionConfig = endpoint.parse()?;
    config = config
        .with_disconnect_mode(DisconnectMode::Never)
        .with_events(true);
    config.credentials = config.credentials.into_challenge();

    let handler = CallbackHandler(|message: &Message| {
        if let Some(event) = message.event() {
            println!("== {}", event);
            for (key, value) in message.iter().filter(|(key, _)| *key != "Event") {
                println!("   {}: {}", key, value);
            }
        }
    });

    let mut session = Session::with_handler(config, handler).await?;
    session.process(None, None).await?;
    Ok(())
}

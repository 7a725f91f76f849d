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

//! Reload the dialplan, func_odbc and SIP on several managers at once
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example reload -- admin:secret@pbx1 admin:secret@pbx2:5039
//! ```

use amilink_client::{ActionRequest, Orchestrator, SessionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let endpoints: Vec<String> = std::env::args().skip(1).collect();
    if endpoints.is_empty() {
        eprintln!("Usage: reload <user:secret@host[:port]>...");
        std::process::exit(2);
    }

    let mut orchestrator = Orchestrator::new();
    for command in ["dialplan reload", "module reload func_odbc", "sip reload"] {
        orchestrator.add_action(
            ActionRequest::new("Command")
                .with_field("Command", command)
                .with_callback(|response, request| {
                    println!(
                        "{}: {}",
                        request.get("Command").unwrap_or_default(),
                        response.payload().unwrap_or_default().trim_end()
                    );
                }),
        );
    }

    for endpoint in &endpoints {
        let config: SessionConfig = endpoint.parse()?;
        orchestrator.add_connection(config).await;
    }

    let failures = orchestrator.process().await;
    for failure in &failures {
        eprintln!("{}", failure);
    }
    println!("{} of {} hosts failed", failures.len(), endpoints.len());

    if !failures.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

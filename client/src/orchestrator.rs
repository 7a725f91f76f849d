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

//! Concurrent driving of many sessions

use crate::{ActionRequest, Advance, Session, SessionConfig, SessionError};
use futures::stream::{FuturesUnordered, StreamExt};
use metrics::gauge;
use std::fmt;
use tracing::{debug, info, warn};

/// A session that failed, with the configuration it was created from
#[derive(Debug)]
pub struct HostError {
    /// Configuration of the failed session
    pub config: SessionConfig,
    /// What went wrong
    pub error: SessionError,
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.config.host, self.error)
    }
}

impl std::error::Error for HostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Runs the same list of actions on several managers at once.
///
/// All sessions are driven from the calling task; their sockets share one
/// reactor wait, so a slow manager never holds up the others. A failing
/// session is recorded and dropped without disturbing the rest.
///
/// # Example
///
/// ```no_run
/// use amilink_client::{ActionRequest, Orchestrator};
///
/// #[tokio::main]
/// async fn main() -> amilink_client::Result<()> {
///     let mut orchestrator = Orchestrator::new();
///     orchestrator.add_action(ActionRequest::new("Command").with_field("Command", "sip reload"));
///     for endpoint in ["admin:secret@pbx1", "admin:secret@pbx2"] {
///         orchestrator.add_connection(endpoint.parse()?).await;
///     }
///     for failure in orchestrator.process().await {
///         eprintln!("{}", failure);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Default)]
pub struct Orchestrator {
    actions: Vec<ActionRequest>,
    sessions: Vec<Session>,
    errors: Vec<HostError>,
}

impl Orchestrator {
    /// Create an orchestrator with no sessions
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action to run on every session, in the order added
    pub fn add_action(&mut self, request: ActionRequest) {
        self.actions.push(request);
    }

    /// Connect a new session.
    ///
    /// A connection failure is recorded as a [`HostError`] straight away.
    pub async fn add_connection(&mut self, config: SessionConfig) {
        match Session::connect(config.clone()).await {
            Ok(session) => {
                debug!(address = %config.address(), "Session added");
                self.sessions.push(session);
            }
            Err(error) => {
                warn!(address = %config.address(), "Connection failed: {}", error);
                self.errors.push(HostError { config, error });
            }
        }
    }

    /// Number of sessions not yet driven to completion
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Failures recorded so far
    pub fn errors(&self) -> &[HostError] {
        &self.errors
    }

    /// Run the actions on every session until each completes or fails.
    ///
    /// Returns every failure recorded, connection failures included.
    pub async fn process(&mut self) -> Vec<HostError> {
        let mut running = FuturesUnordered::new();
        for mut session in self.sessions.drain(..) {
            for request in &self.actions {
                session.add_action(request.clone());
            }
            running.push(drive(session));
        }
        gauge!("amilink.orchestrator.active").set(running.len() as f64);
        info!(sessions = running.len(), "Processing sessions");

        while let Some(outcome) = running.next().await {
            gauge!("amilink.orchestrator.active").set(running.len() as f64);
            if let Some(failure) = outcome {
                self.errors.push(failure);
            }
        }

        std::mem::take(&mut self.errors)
    }
}

async fn drive(mut session: Session) -> Option<HostError> {
    loop {
        match session.advance().await {
            Advance::Continue { .. } => continue,
            Advance::Completed => return None,
            Advance::Failed(error) => {
                return Some(HostError {
                    config: session.config().clone(),
                    error,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_error_display() {
        let failure = HostError {
            config: "abc:def@pbx1".parse().unwrap(),
            error: SessionError::Reset("connection closed by peer".to_string()),
        };
        assert_eq!(
            failure.to_string(),
            "pbx1: Connection reset: connection closed by peer"
        );
    }

    #[tokio::test]
    async fn test_refused_connection_is_recorded() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut orchestrator = Orchestrator::new();
        orchestrator
            .add_connection(SessionConfig::new("127.0.0.1", port))
            .await;
        assert_eq!(orchestrator.active_count(), 0);
        assert_eq!(orchestrator.errors().len(), 1);

        let errors = orchestrator.process().await;
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].error, SessionError::ConnectFailed { .. }));
        assert!(orchestrator.errors().is_empty());
    }
}

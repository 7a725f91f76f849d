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

//! Session error types

use crate::Message;
use amilink_service::StreamError;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// What ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// No pong arrived within the grace period after a keepalive ping
    Keepalive,
    /// A bounded `process` call ended before the session was done
    Process,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutKind::Keepalive => write!(f, "keepalive pong not received"),
            TimeoutKind::Process => write!(f, "session not done before deadline"),
        }
    }
}

/// Session error types
///
/// Every variant except [`SessionError::Finished`] is fatal for the session
/// it came from. Nothing is retried internally.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The TCP connection could not be established
    #[error("Failed to connect to {address}: {source}")]
    ConnectFailed {
        /// `host:port` the connection was attempted against
        address: String,
        /// Underlying cause
        #[source]
        source: io::Error,
    },

    /// Malformed banner, malformed message line or a peer close mid-message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A matched response reported failure
    ///
    /// The request has credential fields redacted.
    #[error("Action {} failed: {}", action_name(.request), failure_reason(.response))]
    ActionFailed {
        /// The request, with credentials hidden
        request: Message,
        /// The response that reported failure
        response: Message,
    },

    /// The connection was severed
    #[error("Connection reset: {0}")]
    Reset(String),

    /// A deadline passed
    #[error("Timeout: {0}")]
    Timeout(TimeoutKind),

    /// The session already ended abnormally and cannot advance
    #[error("Session already finished")]
    Finished,

    /// An endpoint string could not be parsed
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Any other stream failure
    #[error("Stream error: {0}")]
    Stream(#[source] StreamError),
}

fn action_name(request: &Message) -> &str {
    request.get("Action").unwrap_or("?")
}

fn failure_reason(response: &Message) -> &str {
    response
        .get("Message")
        .or(response.response())
        .unwrap_or("no response")
}

impl SessionError {
    /// Check if the error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Timeout(_))
    }

    /// Check if the error is the "already finished" signal
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionError::Finished)
    }

    /// Check if the error came from the connection rather than the protocol
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            SessionError::ConnectFailed { .. } | SessionError::Reset(_) | SessionError::Stream(_)
        )
    }
}

impl From<StreamError> for SessionError {
    fn from(error: StreamError) -> Self {
        match error {
            StreamError::ConnectFailed { address, source } => {
                SessionError::ConnectFailed { address, source }
            }
            StreamError::Reset(source) => SessionError::Reset(source.to_string()),
            other => SessionError::Stream(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_errors_convert() {
        let reset =
            StreamError::Reset(io::Error::new(io::ErrorKind::ConnectionReset, "peer gone"));
        assert!(matches!(
            SessionError::from(reset),
            SessionError::Reset(ref m) if m == "peer gone"
        ));

        let closed = SessionError::from(StreamError::Closed);
        assert!(matches!(closed, SessionError::Stream(StreamError::Closed)));
        assert!(closed.is_connection_error());
    }

    #[test]
    fn test_error_display() {
        let request: Message = [("Action", "Login"), ("Secret", "(hidden)")].into_iter().collect();
        let response: Message = [("Response", "Error"), ("Message", "Authentication failed")]
            .into_iter()
            .collect();
        let err = SessionError::ActionFailed { request, response };
        assert_eq!(err.to_string(), "Action Login failed: Authentication failed");

        let err = SessionError::Timeout(TimeoutKind::Keepalive);
        assert_eq!(err.to_string(), "Timeout: keepalive pong not received");
        assert!(err.is_timeout());
        assert!(SessionError::Finished.is_finished());
    }
}

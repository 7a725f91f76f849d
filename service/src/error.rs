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

//! Error types for the token stream

use amilink_tokencodec::CodecError;
use thiserror::Error;

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Token stream error types
#[derive(Debug, Error)]
pub enum StreamError {
    /// The TCP connection could not be established
    #[error("Failed to connect to {address}: {source}")]
    ConnectFailed {
        /// `host:port` the connection was attempted against
        address: String,
        /// Underlying cause
        #[source]
        source: std::io::Error,
    },

    /// The I/O layer reported a severed connection
    #[error("Connection reset: {0}")]
    Reset(#[source] std::io::Error),

    /// The stream has already been aborted
    #[error("Connection closed")]
    Closed,

    /// Framing error from the codec layer
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl StreamError {
    /// Check if the error is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            StreamError::ConnectFailed { .. } | StreamError::Reset(_) | StreamError::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_is_connection_error() {
        let err = StreamError::Reset(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(err.is_connection_error());
        assert!(StreamError::Closed.is_connection_error());
        assert!(!StreamError::Codec(CodecError::EmptyToken).is_connection_error());
    }

    #[test]
    fn test_error_display() {
        let err = StreamError::ConnectFailed {
            address: "pbx1:5038".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(err.to_string(), "Failed to connect to pbx1:5038: refused");
        assert_eq!(StreamError::Closed.to_string(), "Connection closed");
    }
}

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

//! Token stream configuration

use amilink_tokencodec::CRLF;
use bytes::Bytes;
use std::time::Duration;

/// Token stream configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Delimiter token splitting inbound frames
    pub token: Bytes,

    /// Upper bound on establishing the TCP connection
    pub connect_timeout: Duration,

    /// Upper bound on one readiness wait inside a tick
    pub poll_timeout: Duration,

    /// Maximum bytes moved by a single read or write attempt
    pub block_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            token: Bytes::from_static(CRLF),
            connect_timeout: Duration::from_secs(4),
            poll_timeout: Duration::from_millis(333),
            block_size: 4096,
        }
    }
}

impl StreamConfig {
    /// Create a new stream configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the frame delimiter token
    pub fn with_token(mut self, token: impl Into<Bytes>) -> Self {
        self.token = token.into();
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the readiness poll timeout
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the I/O block size
    pub fn with_block_size(mut self, size: usize) -> Self {
        self.block_size = size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.token.as_ref(), b"\r\n");
        assert_eq!(config.connect_timeout, Duration::from_secs(4));
        assert_eq!(config.poll_timeout, Duration::from_millis(333));
        assert_eq!(config.block_size, 4096);
    }

    #[test]
    fn test_block_size_never_zero() {
        let config = StreamConfig::new().with_block_size(0);
        assert_eq!(config.block_size, 1);
    }
}

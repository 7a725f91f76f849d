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

//! Session configuration

use crate::{Credentials, SessionError};
use amilink_service::StreamConfig;
use std::str::FromStr;
use std::time::Duration;

/// Default manager port
pub const DEFAULT_PORT: u16 = 5038;

/// Default prefix of the welcome banner
pub const DEFAULT_BANNER_PREFIX: &str = "Asterisk Call Manager/";

/// When the session closes its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectMode {
    /// Stay connected until aborted
    Never,
    /// Close once every queued action has been answered
    #[default]
    WhenDone,
    /// Close as soon as the last queued action has been written, without
    /// waiting for its reply
    Immediately,
}

/// Manager session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Manager hostname or IP address
    pub host: String,

    /// Manager port
    pub port: u16,

    /// Login credentials
    pub credentials: Credentials,

    /// When to disconnect
    pub disconnect_mode: DisconnectMode,

    /// Ask the manager to send unsolicited events
    pub events: bool,

    /// Expected start of the welcome banner
    pub banner_prefix: String,

    /// How long to wait for the welcome banner
    pub banner_timeout: Duration,

    /// Idle time before a keepalive ping (None disables keepalive)
    pub keepalive_interval: Option<Duration>,

    /// How long to wait for the pong
    pub pong_timeout: Duration,

    /// Transport settings
    pub stream: StreamConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let stream = StreamConfig::default();
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            credentials: Credentials::default(),
            disconnect_mode: DisconnectMode::default(),
            events: false,
            banner_prefix: DEFAULT_BANNER_PREFIX.to_string(),
            banner_timeout: stream.poll_timeout * 10,
            keepalive_interval: Some(Duration::from_secs(60)),
            pong_timeout: Duration::from_secs(5),
            stream,
        }
    }
}

impl SessionConfig {
    /// Create a new session configuration with the given host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the credentials
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the disconnect mode
    pub fn with_disconnect_mode(mut self, mode: DisconnectMode) -> Self {
        self.disconnect_mode = mode;
        self
    }

    /// Enable or disable unsolicited events
    pub fn with_events(mut self, events: bool) -> Self {
        self.events = events;
        self
    }

    /// Set the expected banner prefix
    pub fn with_banner_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.banner_prefix = prefix.into();
        self
    }

    /// Set the banner timeout
    pub fn with_banner_timeout(mut self, timeout: Duration) -> Self {
        self.banner_timeout = timeout;
        self
    }

    /// Set the keepalive interval
    pub fn with_keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Set the pong timeout
    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Set the transport settings
    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    /// Get the manager address as a string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromStr for SessionConfig {
    type Err = SessionError;

    /// Parse `user:secret@host:port`.
    ///
    /// Every part may be left out: `""` yields `username:secret@localhost:5038`.
    /// IPv6 hosts are written in brackets.
    fn from_str(endpoint: &str) -> Result<Self, Self::Err> {
        let invalid = || SessionError::InvalidEndpoint(endpoint.to_string());

        let (userinfo, hostport) = match endpoint.rsplit_once('@') {
            Some((userinfo, hostport)) => (Some(userinfo), hostport),
            None => (None, endpoint),
        };

        let mut username = "username";
        let mut secret = "secret";
        if let Some(userinfo) = userinfo {
            let (user, pass) = match userinfo.split_once(':') {
                Some((user, pass)) => (user, Some(pass)),
                None => (userinfo, None),
            };
            if !user.is_empty() {
                username = user;
            }
            if let Some(pass) = pass.filter(|pass| !pass.is_empty()) {
                secret = pass;
            }
        }

        let (host, port) = if let Some(bracketed) = hostport.strip_prefix('[') {
            let (host, rest) = bracketed.split_once(']').ok_or_else(invalid)?;
            match rest {
                "" => (host, None),
                rest => (host, Some(rest.strip_prefix(':').ok_or_else(invalid)?)),
            }
        } else {
            match hostport.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (hostport, None),
            }
        };

        let port = match port.filter(|port| !port.is_empty()) {
            Some(port) => port.parse::<u16>().map_err(|_| invalid())?,
            None => DEFAULT_PORT,
        };
        let host = if host.is_empty() { "localhost" } else { host };

        Ok(SessionConfig::new(host, port).with_credentials(Credentials::plain(username, secret)))
    }
}

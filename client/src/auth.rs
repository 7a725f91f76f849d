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

//! Authentication schemes

use crate::action::{Action, ActionId, Responder};
use md5::{Digest, Md5};
use std::fmt;

/// Login credentials
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Send the secret as is
    Plain {
        /// Manager user name
        username: String,
        /// Manager secret
        secret: String,
    },
    /// Request a nonce and send `md5(nonce ‖ secret)` instead of the secret
    Challenge {
        /// Manager user name
        username: String,
        /// Manager secret
        secret: String,
    },
}

impl Credentials {
    /// Plain text credentials
    pub fn plain(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Credentials::Plain {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Challenge/response credentials
    pub fn challenge(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Credentials::Challenge {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Manager user name
    pub fn username(&self) -> &str {
        match self {
            Credentials::Plain { username, .. } | Credentials::Challenge { username, .. } => {
                username
            }
        }
    }

    pub(crate) fn secret(&self) -> &str {
        match self {
            Credentials::Plain { secret, .. } | Credentials::Challenge { secret, .. } => secret,
        }
    }

    /// The same user and secret under a different scheme
    pub fn into_challenge(self) -> Self {
        match self {
            Credentials::Plain { username, secret } => Credentials::Challenge { username, secret },
            other => other,
        }
    }

    /// The first action sent after the banner
    pub(crate) fn initial_action(&self, id: ActionId, events: bool) -> Action {
        match self {
            Credentials::Plain { username, secret } => Action::build(
                id,
                "Login",
                [
                    ("Username".to_string(), username.clone()),
                    ("Secret".to_string(), secret.clone()),
                    ("Events".to_string(), events_flag(events).to_string()),
                ],
                None,
                Responder::Login,
            ),
            Credentials::Challenge { .. } => Action::build(
                id,
                "Challenge",
                [("AuthType".to_string(), "MD5".to_string())],
                None,
                Responder::Challenge,
            ),
        }
    }

    /// The digest login answering `challenge`
    pub(crate) fn challenge_login(&self, id: ActionId, challenge: &str, events: bool) -> Action {
        Action::build(
            id,
            "Login",
            [
                ("AuthType".to_string(), "MD5".to_string()),
                ("Username".to_string(), self.username().to_string()),
                ("Key".to_string(), challenge_digest(challenge, self.secret())),
                ("Events".to_string(), events_flag(events).to_string()),
            ],
            None,
            Responder::Login,
        )
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Credentials::plain("username", "secret")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self {
            Credentials::Plain { .. } => "Plain",
            Credentials::Challenge { .. } => "Challenge",
        };
        f.debug_struct(scheme)
            .field("username", &self.username())
            .field("secret", &"(hidden)")
            .finish()
    }
}

/// Lowercase hex MD5 of the challenge followed by the secret
pub fn challenge_digest(challenge: &str, secret: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(challenge.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn events_flag(events: bool) -> &'static str {
    if events { "on" } else { "off" }
}

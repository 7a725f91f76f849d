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

//! Action requests and identifiers

use crate::Message;
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

static NEXT_ACTION: AtomicU64 = AtomicU64::new(1);

/// Fields the session always sets itself
const RESERVED_FIELDS: [&str; 2] = ["Action", "ActionID"];

/// Callback run with `(response, request)` for every successful reply or
/// event matched to an action.
pub type ActionCallback = Arc<dyn Fn(&Message, &Message) + Send + Sync>;

/// Correlation identifier sent as the `ActionID` field.
///
/// The numeric part comes from a process-wide counter, so identifiers never
/// repeat within a process. The prefix is a time based nonce chosen once per
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(String);

impl ActionId {
    /// The identifier as sent on the wire
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ActionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Hands out identifiers with a fixed per-session prefix
#[derive(Debug, Clone)]
pub(crate) struct ActionIdGenerator {
    prefix: String,
}

impl ActionIdGenerator {
    pub(crate) fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            prefix: format!("{}.{:06}-", now.as_secs(), now.subsec_micros()),
        }
    }

    pub(crate) fn next_id(&self) -> ActionId {
        let sequence = NEXT_ACTION.fetch_add(1, Ordering::Relaxed);
        ActionId(format!("{}{}", self.prefix, sequence))
    }
}

/// A request to be sent on a session.
///
/// # Example
///
/// ```
/// use amilink_client::ActionRequest;
///
/// let reload = ActionRequest::new("Command")
///     .with_field("Command", "dialplan reload")
///     .with_callback(|response, _request| {
///         println!("{}", response.payload().unwrap_or_default());
///     });
/// assert_eq!(reload.name(), "Command");
/// ```
#[derive(Clone)]
pub struct ActionRequest {
    name: String,
    fields: Vec<(String, String)>,
    callback: Option<ActionCallback>,
    stop_event: Option<String>,
}

impl ActionRequest {
    /// Create a request for the action `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            callback: None,
            stop_event: None,
        }
    }

    /// Add a parameter
    ///
    /// `Action` and `ActionID` are owned by the session; caller values for
    /// them are dropped.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Add several parameters
    pub fn with_fields<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Run `callback` for each successful message matched to this action
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Message, &Message) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Keep the action outstanding until an event named `event` arrives.
    ///
    /// Used by actions such as `QueueStatus` whose reply is followed by a
    /// list of events and a closing `...Complete` event.
    pub fn with_stop_event(mut self, event: impl Into<String>) -> Self {
        self.stop_event = Some(event.into());
        self
    }

    /// Action name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop event, if any
    pub fn stop_event(&self) -> Option<&str> {
        self.stop_event.as_deref()
    }

    pub(crate) fn into_action(self, id: ActionId) -> Action {
        let responder = Responder::Caller(self.callback);
        Action::build(id, self.name, self.fields, self.stop_event, responder)
    }
}

impl fmt::Debug for ActionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRequest")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("callback", &self.callback.is_some())
            .field("stop_event", &self.stop_event)
            .finish()
    }
}

/// What happens when a successful message settles an action
#[derive(Clone)]
pub(crate) enum Responder {
    /// Caller supplied action with an optional callback
    Caller(Option<ActionCallback>),
    /// Challenge request; the reply carries the digest nonce
    Challenge,
    /// Login; success authenticates the session
    Login,
    /// Keepalive ping
    Ping,
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Responder::Caller(callback) => {
                write!(f, "Caller(callback: {})", callback.is_some())
            }
            Responder::Challenge => f.write_str("Challenge"),
            Responder::Login => f.write_str("Login"),
            Responder::Ping => f.write_str("Ping"),
        }
    }
}

/// An action with its identifier assigned
#[derive(Debug, Clone)]
pub(crate) struct Action {
    pub(crate) id: ActionId,
    pub(crate) request: Message,
    pub(crate) stop_event: Option<String>,
    pub(crate) responder: Responder,
}

impl Action {
    pub(crate) fn build(
        id: ActionId,
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (String, String)>,
        stop_event: Option<String>,
        responder: Responder,
    ) -> Self {
        let mut request = Message::new();
        request.insert("Action", name);
        request.insert("ActionID", id.as_str());
        for (key, value) in fields {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                warn!(field = key.as_str(), "Ignoring caller override of a reserved field");
                continue;
            }
            request.insert(key, value);
        }
        Self {
            id,
            request,
            stop_event,
            responder,
        }
    }

    /// Whether this action was queued by the session itself
    pub(crate) fn is_internal(&self) -> bool {
        !matches!(self.responder, Responder::Caller(_))
    }

    /// Whether `message` ends the action
    pub(crate) fn is_settled_by(&self, message: &Message) -> bool {
        self.stop_event
            .as_deref()
            .is_none_or(|stop| message.event() == Some(stop))
    }
}

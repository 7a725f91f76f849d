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

//! Protocol messages
//!
//! A message is a block of `Key: Value` lines closed by a blank line. The
//! same shape is used for requests, responses and events. Field order is
//! kept as it appeared on the wire.

use crate::{Result, SessionError};
use std::fmt;

/// Sentinel line closing the payload of a `Response: Follows` reply
pub const END_COMMAND: &str = "--END COMMAND--\r\n";

/// `Response` values of replies that succeeded
const SUCCESS_RESPONSES: [&str; 2] = ["Success", "Follows"];

const REDACTED_KEYS: [&str; 2] = ["Secret", "Key"];
const HIDDEN: &str = "(hidden)";

/// An insertion-ordered field map.
///
/// Inserting an existing key replaces its value in place. The empty key
/// ([`Message::PAYLOAD_KEY`]) is reserved for the raw body of a
/// `Response: Follows` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    fields: Vec<(String, String)>,
}

impl Message {
    /// Key holding the raw multi-line payload of a `Follows` reply
    pub const PAYLOAD_KEY: &'static str = "";

    /// Create an empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `key`, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// Set `key` to `value`, keeping the original position of an existing key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Remove `key`, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(index).1)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the message has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields in wire order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The `Event` field
    pub fn event(&self) -> Option<&str> {
        self.get("Event")
    }

    /// The `Response` field
    pub fn response(&self) -> Option<&str> {
        self.get("Response")
    }

    /// The `ActionID` field
    pub fn action_id(&self) -> Option<&str> {
        self.get("ActionID")
    }

    /// Raw payload of a `Follows` reply
    pub fn payload(&self) -> Option<&str> {
        self.get(Self::PAYLOAD_KEY)
    }

    /// Whether the message reports that its action failed.
    ///
    /// Events never fail; a reply fails unless its `Response` is `Success`
    /// or `Follows`.
    pub fn is_failure(&self) -> bool {
        self.event().is_none()
            && !self
                .response()
                .is_some_and(|response| SUCCESS_RESPONSES.contains(&response))
    }

    /// Copy with credential values (`Secret`, `Key`) replaced by `(hidden)`
    pub fn redacted(&self) -> Message {
        let mut copy = self.clone();
        for (key, value) in copy.fields.iter_mut() {
            if REDACTED_KEYS.contains(&key.as_str()) {
                *value = HIDDEN.to_string();
            }
        }
        copy
    }

    /// Render as request lines closed by a blank line
    pub fn to_wire(&self) -> String {
        let mut wire = String::new();
        for (key, value) in &self.fields {
            wire.push_str(key);
            wire.push_str(": ");
            wire.push_str(value);
            wire.push_str("\r\n");
        }
        wire.push_str("\r\n");
        wire
    }

    /// Rebuild a message from its received lines, terminators included.
    ///
    /// Lines are `Key: Value` pairs with surrounding whitespace trimmed. Once
    /// a `Response: Follows` line has been seen, a line without a colon
    /// starts the raw payload, which continues verbatim up to the
    /// `--END COMMAND--` sentinel.
    pub fn from_lines<I, S>(lines: I) -> Result<Message>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut message = Message::new();
        let mut payload: Option<String> = None;

        for line in lines {
            let line = line.as_ref();
            let follows = message.response() == Some("Follows");

            if follows {
                if let Some(body) = line.strip_suffix(END_COMMAND) {
                    payload.get_or_insert_with(String::new).push_str(body);
                    continue;
                }
                if payload.is_some() || !line.contains(':') {
                    payload.get_or_insert_with(String::new).push_str(line);
                    continue;
                }
            }

            let Some((key, value)) = line.split_once(':') else {
                return Err(SessionError::Protocol(format!(
                    "malformed message line: {:?}",
                    line
                )));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(SessionError::Protocol(format!(
                    "message line without a field name: {:?}",
                    line
                )));
            }
            message.insert(key, value.trim());
        }

        if let Some(payload) = payload {
            message.insert(Self::PAYLOAD_KEY, payload);
        }
        Ok(message)
    }
}

impl<K, V> FromIterator<(K, V)> for Message
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut message = Message::new();
        for (key, value) in iter {
            message.insert(key, value);
        }
        message
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, (key, value)) in self.fields.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:?}: {:?}", key, value)?;
        }
        f.write_str("}")
    }
}

/// Collects lines until a blank line closes the message
#[derive(Debug, Default)]
pub(crate) struct MessageAssembler {
    lines: Vec<String>,
}

impl MessageAssembler {
    pub(crate) fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Parse and clear the collected lines; `None` if there were none.
    pub(crate) fn finish(&mut self) -> Result<Option<Message>> {
        if self.lines.is_empty() {
            return Ok(None);
        }
        let lines = std::mem::take(&mut self.lines);
        Message::from_lines(lines).map(Some)
    }
}

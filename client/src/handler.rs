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

//! Session event handler traits

use crate::Message;
use tracing::debug;

/// Receives messages that no outstanding action claims.
///
/// Unsolicited events (with `Events: on`) and replies to actions that have
/// already settled end up here.
///
/// # Example
///
/// ```no_run
/// use amilink_client::{Message, SessionHandler};
///
/// struct HangupCounter(usize);
///
/// impl SessionHandler for HangupCounter {
///     fn on_unexpected(&mut self, message: &Message) {
///         if message.event() == Some("Hangup") {
///             self.0 += 1;
///         }
///     }
/// }
/// ```
pub trait SessionHandler: Send {
    /// Called for every message without a matching outstanding action
    fn on_unexpected(&mut self, message: &Message) {
        debug!("Unexpected message: {}", message);
    }
}

/// Logs unexpected messages and otherwise ignores them
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl SessionHandler for LoggingHandler {}

/// Adapts a closure into a [`SessionHandler`]
pub struct CallbackHandler<F>(pub F);

impl<F> SessionHandler for CallbackHandler<F>
where
    F: FnMut(&Message) + Send,
{
    fn on_unexpected(&mut self, message: &Message) {
        (self.0)(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_logging_handler_logs() {
        let message: Message = [("Event", "FullyBooted")].into_iter().collect();
        LoggingHandler.on_unexpected(&message);
        assert!(logs_contain("Unexpected message"));
        assert!(logs_contain("FullyBooted"));
    }

    #[test]
    fn test_callback_handler() {
        let mut seen = Vec::new();
        {
            let mut handler = CallbackHandler(|message: &Message| {
                seen.push(message.event().unwrap_or_default().to_string())
            });
            let message: Message = [("Event", "Hangup")].into_iter().collect();
            handler.on_unexpected(&message);
        }
        assert_eq!(seen, vec!["Hangup"]);
    }
}

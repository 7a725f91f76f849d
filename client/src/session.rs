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

//! Manager session state machine

use crate::action::{Action, ActionIdGenerator, Responder};
use crate::message::MessageAssembler;
use crate::{
    ActionId, ActionRequest, DisconnectMode, LoggingHandler, Message, Result, SessionConfig,
    SessionError, SessionHandler, TimeoutKind,
};
use amilink_service::{StreamHandler, TokenStream};
use amilink_tokencodec::Frame;
use metrics::counter;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Where a session is in its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, waiting for the welcome banner
    AwaitingBanner,
    /// Banner accepted, login in progress
    Authenticating,
    /// Logged in and working through the queue
    Authenticated,
    /// Logged in, queue empty, final action outstanding, about to close
    Draining,
    /// Finished normally
    Done,
    /// Finished abnormally
    Faulted,
}

/// Outcome of one [`Session::advance`] step
#[derive(Debug)]
pub enum Advance {
    /// More work remains; `active` tells whether any I/O happened
    Continue {
        /// Whether the step moved any bytes
        active: bool,
    },
    /// The session is done and its connection closed
    Completed,
    /// The session faulted
    ///
    /// Every later call reports [`SessionError::Finished`].
    Failed(SessionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alarm {
    Banner,
    Keepalive,
    Pong,
}

/// One authenticated conversation with a manager.
///
/// Actions are written strictly one at a time in queue order. The next
/// action goes out once the previous one has been answered, or, for actions
/// with a stop event, once that event arrives. Replies and events are matched
/// to actions through their `ActionID`.
///
/// A session is driven by calling [`advance`](Self::advance) (or
/// [`process`](Self::process)) until it completes or fails.
///
/// # Example
///
/// ```no_run
/// use amilink_client::{ActionRequest, Session, SessionConfig};
///
/// #[tokio::main]
/// async fn main() -> amilink_client::Result<()> {
///     let config: SessionConfig = "admin:secret@pbx1".parse()?;
///     let mut session = Session::connect(config).await?;
///     session.add_action(
///         ActionRequest::new("Command")
///             .with_field("Command", "sip reload")
///             .with_callback(|response, _| println!("{:?}", response.payload())),
///     );
///     session.process(None, None).await
/// }
/// ```
pub struct Session {
    stream: TokenStream<Alarm>,
    protocol: Protocol,
}

impl Session {
    /// Connect to the configured manager and queue the login
    pub async fn connect(config: SessionConfig) -> Result<Session> {
        Self::with_handler(config, LoggingHandler).await
    }

    /// Connect, routing unmatched messages to `handler`
    #[instrument(skip_all, fields(address = %config.address()))]
    pub async fn with_handler<H>(config: SessionConfig, handler: H) -> Result<Session>
    where
        H: SessionHandler + 'static,
    {
        let mut protocol = Protocol::new(config, Box::new(handler));
        let login = protocol
            .config
            .credentials
            .initial_action(protocol.ids.next_id(), protocol.config.events);
        protocol.queue.push_back(login);

        let mut stream = TokenStream::connect(
            &protocol.config.host,
            protocol.config.port,
            protocol.config.stream.clone(),
        )
        .await?;
        stream.alarm(protocol.config.banner_timeout, Alarm::Banner);

        Ok(Session { stream, protocol })
    }

    /// Queue `request` behind everything already queued
    pub fn add_action(&mut self, request: ActionRequest) -> ActionId {
        let id = self.protocol.ids.next_id();
        debug!(action = request.name(), %id, "Queued action");
        self.protocol.queue.push_back(request.into_action(id.clone()));
        id
    }

    /// Queue `request` ahead of every other caller action.
    ///
    /// Login steps still queued keep their place in front.
    pub fn insert_action(&mut self, request: ActionRequest) -> ActionId {
        let id = self.protocol.ids.next_id();
        debug!(action = request.name(), %id, "Inserted action");
        let queue = &mut self.protocol.queue;
        let position = queue
            .iter()
            .position(|action| !action.is_internal())
            .unwrap_or(queue.len());
        queue.insert(position, request.into_action(id.clone()));
        id
    }

    /// Whether the login succeeded
    pub fn is_authenticated(&self) -> bool {
        self.protocol.authenticated
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.protocol.state()
    }

    /// Number of actions waiting to be written
    pub fn queued_actions(&self) -> usize {
        self.protocol.queue.len()
    }

    /// Number of written actions awaiting their reply or stop event
    pub fn pending_actions(&self) -> usize {
        self.protocol.pending.len()
    }

    /// Configuration the session was created with
    pub fn config(&self) -> &SessionConfig {
        &self.protocol.config
    }

    /// Drop the connection now, discarding everything queued or pending
    pub fn abort(&mut self) {
        if matches!(self.protocol.state, SessionState::Done | SessionState::Faulted) {
            return;
        }
        info!(address = %self.protocol.config.address(), "Session aborted");
        self.protocol.state = SessionState::Done;
        self.protocol.queue.clear();
        self.protocol.pending.clear();
        self.protocol.in_flight = None;
        self.close();
    }

    /// Do one step of work.
    ///
    /// Releases actions added while the session sat idle, then runs one
    /// stream tick.
    pub async fn advance(&mut self) -> Advance {
        match self.protocol.state {
            SessionState::Faulted => return Advance::Failed(SessionError::Finished),
            SessionState::Done if self.stream.is_closed() => return Advance::Completed,
            _ => {}
        }

        if let Err(error) = self.protocol.release_queued(&mut self.stream) {
            return Advance::Failed(self.fault(error));
        }

        match self.stream.tick(&mut self.protocol).await {
            Ok(active) if !self.stream.is_closed() => Advance::Continue { active },
            Ok(_) if self.protocol.state == SessionState::Done => {
                info!(address = %self.protocol.config.address(), "Session complete");
                Advance::Completed
            }
            Ok(_) if !self.protocol.assembler.is_empty() => Advance::Failed(self.fault(
                SessionError::Protocol("connection closed mid-message".to_string()),
            )),
            Ok(_) => Advance::Failed(self.fault(SessionError::Reset(
                "connection closed by peer".to_string(),
            ))),
            Err(error) => Advance::Failed(self.fault(error)),
        }
    }

    /// Advance until done.
    ///
    /// `absolute_timeout` bounds the whole call, `relative_timeout` the time
    /// spent without I/O. Sessions that never disconnect ignore both and run
    /// until they fail; the banner still has to arrive within
    /// `banner_timeout`.
    pub async fn process(
        &mut self,
        absolute_timeout: Option<Duration>,
        relative_timeout: Option<Duration>,
    ) -> Result<()> {
        let (absolute_timeout, relative_timeout) =
            match self.protocol.config.disconnect_mode {
                DisconnectMode::Never => (None, None),
                _ => (absolute_timeout, relative_timeout),
            };

        let started = Instant::now();
        let mut last_activity = started;

        loop {
            match self.advance().await {
                Advance::Completed => return Ok(()),
                Advance::Failed(error) => return Err(error),
                Advance::Continue { active } => {
                    let now = Instant::now();
                    if active {
                        last_activity = now;
                    }
                    let expired = absolute_timeout
                        .is_some_and(|limit| now.duration_since(started) > limit)
                        || relative_timeout
                            .is_some_and(|limit| now.duration_since(last_activity) > limit);
                    if expired {
                        return Err(self.fault(SessionError::Timeout(TimeoutKind::Process)));
                    }
                }
            }
        }
    }

    fn fault(&mut self, error: SessionError) -> SessionError {
        warn!(address = %self.protocol.config.address(), "Session failed: {}", error);
        counter!("amilink.session.faults").increment(1);
        self.protocol.state = SessionState::Faulted;
        self.close();
        error
    }

    fn close(&mut self) {
        self.stream.cancel_alarm();
        if let Err(error) = self.stream.abort(&mut self.protocol, None) {
            debug!("Error while closing: {}", error);
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.protocol.config.address())
            .field("state", &self.state())
            .field("queued", &self.queued_actions())
            .field("pending", &self.pending_actions())
            .field("stream", &self.stream)
            .finish()
    }
}

/// Protocol side of a session, fed by its stream
struct Protocol {
    config: SessionConfig,
    state: SessionState,
    authenticated: bool,
    ids: ActionIdGenerator,
    queue: VecDeque<Action>,
    pending: HashMap<ActionId, Action>,
    in_flight: Option<ActionId>,
    assembler: MessageAssembler,
    handler: Box<dyn SessionHandler>,
}

impl Protocol {
    fn new(config: SessionConfig, handler: Box<dyn SessionHandler>) -> Self {
        Self {
            config,
            state: SessionState::AwaitingBanner,
            authenticated: false,
            ids: ActionIdGenerator::new(),
            queue: VecDeque::new(),
            pending: HashMap::new(),
            in_flight: None,
            assembler: MessageAssembler::default(),
            handler,
        }
    }

    fn state(&self) -> SessionState {
        let closing = self.config.disconnect_mode != DisconnectMode::Never;
        match self.state {
            SessionState::Authenticated
                if closing && self.queue.is_empty() && self.in_flight.is_some() =>
            {
                SessionState::Draining
            }
            state => state,
        }
    }

    fn release_queued(&mut self, stream: &mut TokenStream<Alarm>) -> Result<()> {
        if self.state == SessionState::Authenticated
            && self.in_flight.is_none()
            && !self.queue.is_empty()
        {
            self.next_action(stream)
        } else {
            Ok(())
        }
    }

    fn handle_frame(&mut self, stream: &mut TokenStream<Alarm>, frame: Frame) -> Result<()> {
        match self.state {
            SessionState::Done | SessionState::Faulted => Ok(()),
            SessionState::AwaitingBanner => {
                let banner = frame.to_string_lossy();
                if !frame.is_terminated() || !banner.starts_with(&self.config.banner_prefix) {
                    return Err(SessionError::Protocol(format!(
                        "unexpected welcome banner: {:?}",
                        banner
                    )));
                }
                info!(banner = banner.trim_end(), "Welcome banner received");
                stream.cancel_alarm();
                self.state = SessionState::Authenticating;
                self.next_action(stream)
            }
            _ if !frame.is_terminated() => {
                self.assembler.push(frame.to_string_lossy());
                self.finish_message(stream)?;
                Err(SessionError::Protocol(
                    "connection closed mid-message".to_string(),
                ))
            }
            _ if frame.as_bytes() == stream.token() => self.finish_message(stream),
            _ => {
                self.assembler.push(frame.to_string_lossy());
                Ok(())
            }
        }
    }

    fn finish_message(&mut self, stream: &mut TokenStream<Alarm>) -> Result<()> {
        match self.assembler.finish()? {
            Some(message) => self.on_message(stream, message),
            None => Ok(()),
        }
    }

    fn on_message(&mut self, stream: &mut TokenStream<Alarm>, message: Message) -> Result<()> {
        debug!("Received {}", message);

        let Some(action) = message
            .action_id()
            .and_then(|id| self.pending.remove(id))
        else {
            self.handler.on_unexpected(&message);
            return Ok(());
        };

        if message.is_failure() {
            return Err(SessionError::ActionFailed {
                request: action.request.redacted(),
                response: message,
            });
        }

        match &action.responder {
            Responder::Caller(Some(callback)) => callback(&message, &action.request),
            Responder::Caller(None) => {}
            Responder::Challenge => {
                let challenge = message.get("Challenge").ok_or_else(|| {
                    SessionError::Protocol("challenge reply without a Challenge".to_string())
                })?;
                let login = self.config.credentials.challenge_login(
                    self.ids.next_id(),
                    challenge,
                    self.config.events,
                );
                self.queue.push_front(login);
            }
            Responder::Login => {
                info!(
                    username = self.config.credentials.username(),
                    "Authenticated"
                );
                self.authenticated = true;
                self.state = SessionState::Authenticated;
                self.arm_keepalive(stream);
            }
            Responder::Ping => self.arm_keepalive(stream),
        }

        if !action.is_settled_by(&message) {
            self.pending.insert(action.id.clone(), action);
            return Ok(());
        }
        if self.in_flight.as_ref() == Some(&action.id) {
            self.in_flight = None;
            self.next_action(stream)?;
        }
        Ok(())
    }

    /// Write the next queued action, or close when there is none left
    fn next_action(&mut self, stream: &mut TokenStream<Alarm>) -> Result<()> {
        if self.in_flight.is_some() {
            return Ok(());
        }

        let Some(action) = self.queue.pop_front() else {
            if !self.authenticated || self.config.disconnect_mode == DisconnectMode::Never {
                return Ok(());
            }
            info!("All actions answered, disconnecting");
            self.state = SessionState::Done;
            stream.cancel_alarm();
            return stream.abort(self, None);
        };

        let last = !action.is_internal()
            && self.queue.is_empty()
            && self.config.disconnect_mode == DisconnectMode::Immediately;

        debug!(
            action = action.request.get("Action").unwrap_or_default(),
            id = %action.id,
            last,
            "Sending action"
        );
        stream.write(action.request.to_wire(), last)?;
        counter!("amilink.session.actions_sent").increment(1);

        if last {
            info!("Last action written, disconnecting");
            self.state = SessionState::Done;
            stream.cancel_alarm();
        } else {
            self.in_flight = Some(action.id.clone());
            self.pending.insert(action.id.clone(), action);
        }
        Ok(())
    }

    fn arm_keepalive(&mut self, stream: &mut TokenStream<Alarm>) {
        if let Some(interval) = self.config.keepalive_interval {
            stream.alarm(interval, Alarm::Keepalive);
        }
    }

    fn handle_alarm(&mut self, stream: &mut TokenStream<Alarm>, alarm: Alarm) -> Result<()> {
        if matches!(self.state, SessionState::Done | SessionState::Faulted) {
            return Ok(());
        }
        match alarm {
            Alarm::Banner => Err(SessionError::Protocol(
                "no timely welcome banner".to_string(),
            )),
            Alarm::Keepalive => {
                let ping = Action::build(
                    self.ids.next_id(),
                    "Ping",
                    Vec::new(),
                    None,
                    Responder::Ping,
                );
                debug!(id = %ping.id, "Sending keepalive");
                stream.write(ping.request.to_wire(), false)?;
                counter!("amilink.session.actions_sent").increment(1);
                self.pending.insert(ping.id.clone(), ping);
                stream.alarm(self.config.pong_timeout, Alarm::Pong);
                Ok(())
            }
            Alarm::Pong => Err(SessionError::Timeout(TimeoutKind::Keepalive)),
        }
    }
}

impl StreamHandler<Alarm> for Protocol {
    type Error = SessionError;

    fn on_frame(&mut self, stream: &mut TokenStream<Alarm>, frame: Frame) -> Result<()> {
        let result = self.handle_frame(stream, frame);
        if result.is_err() {
            self.state = SessionState::Faulted;
        }
        result
    }

    fn on_alarm(&mut self, stream: &mut TokenStream<Alarm>, alarm: Alarm) -> Result<()> {
        let result = self.handle_alarm(stream, alarm);
        if result.is_err() {
            self.state = SessionState::Faulted;
        }
        result
    }
}

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

//! # amilink Test Suite
//!
//! An in-process manager server for end-to-end tests. It greets with a
//! banner, checks plain and challenge logins, answers pings and hands every
//! other request to a scripted responder.

use amilink_client::{Credentials, Message, SessionConfig, challenge_digest};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Banner sent by default
pub const DEFAULT_BANNER: &str = "Asterisk Call Manager/1.1\r\n";

/// Nonce handed out for challenge logins
pub const CHALLENGE: &str = "840414211";

/// Scripted answer to one request
#[derive(Debug, Clone, Default)]
pub struct Reply {
    /// Raw bytes to send back
    pub text: String,
    /// Close the connection after sending
    pub hangup: bool,
}

impl Reply {
    /// Send `text` verbatim
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            hangup: false,
        }
    }

    /// Send nothing
    pub fn silence() -> Self {
        Self::default()
    }

    /// Send nothing and close the connection
    pub fn hangup() -> Self {
        Self {
            text: String::new(),
            hangup: true,
        }
    }

    /// `Response: Success` echoing the request's `ActionID`
    pub fn success(request: &Message) -> Self {
        Self::raw(block(&[
            ("Response", "Success"),
            ("ActionID", action_id(request)),
            ("Message", "OK"),
        ]))
    }

    /// `Response: Error` echoing the request's `ActionID`
    pub fn error(request: &Message, reason: &str) -> Self {
        Self::raw(block(&[
            ("Response", "Error"),
            ("ActionID", action_id(request)),
            ("Message", reason),
        ]))
    }

    /// `Response: Follows` with `body` as payload
    pub fn follows(request: &Message, body: &str) -> Self {
        Self::raw(format!(
            "Response: Follows\r\nPrivilege: Command\r\nActionID: {}\r\n{}--END COMMAND--\r\n\r\n",
            action_id(request),
            body
        ))
    }

    /// Append an event block carrying the request's `ActionID`
    pub fn then_event(mut self, request: &Message, event: &str) -> Self {
        self.text.push_str(&block(&[
            ("Event", event),
            ("ActionID", action_id(request)),
        ]));
        self
    }

    /// Append raw text
    pub fn then_raw(mut self, text: &str) -> Self {
        self.text.push_str(text);
        self
    }

    /// Close the connection after sending
    pub fn and_hangup(mut self) -> Self {
        self.hangup = true;
        self
    }
}

/// Render `fields` as one message block
pub fn block(fields: &[(&str, &str)]) -> String {
    let mut text = String::new();
    for (key, value) in fields {
        text.push_str(&format!("{}: {}\r\n", key, value));
    }
    text.push_str("\r\n");
    text
}

fn action_id(request: &Message) -> &str {
    request.action_id().unwrap_or_default()
}

type Responder = Arc<dyn Fn(&Message) -> Option<Reply> + Send + Sync>;

/// Behaviour of a [`MockManager`]
#[derive(Clone)]
pub struct MockConfig {
    /// Banner to greet with; `None` stays silent
    pub banner: Option<String>,
    /// Accepted user name
    pub username: String,
    /// Accepted secret
    pub secret: String,
    /// Answer `Ping` requests
    pub answer_pings: bool,
    responder: Option<Responder>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            banner: Some(DEFAULT_BANNER.to_string()),
            username: "admin".to_string(),
            secret: "hunter2".to_string(),
            answer_pings: true,
            responder: None,
        }
    }
}

impl MockConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the banner
    pub fn with_banner(mut self, banner: Option<&str>) -> Self {
        self.banner = banner.map(str::to_string);
        self
    }

    /// Set the accepted secret
    pub fn with_secret(mut self, secret: &str) -> Self {
        self.secret = secret.to_string();
        self
    }

    /// Enable or disable pong replies
    pub fn with_answer_pings(mut self, answer: bool) -> Self {
        self.answer_pings = answer;
        self
    }

    /// Script replies to requests other than login.
    ///
    /// Returning `None` falls back to the built-in answer.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&Message) -> Option<Reply> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    fn reply(&self, request: &Message) -> Reply {
        match request.get("Action") {
            Some("Login") => self.login(request),
            Some("Challenge") => Reply::raw(block(&[
                ("Response", "Success"),
                ("ActionID", action_id(request)),
                ("Challenge", CHALLENGE),
            ])),
            Some("Ping") if !self.answer_pings => Reply::silence(),
            Some("Ping") => Reply::raw(block(&[
                ("Response", "Success"),
                ("ActionID", action_id(request)),
                ("Ping", "Pong"),
                ("Timestamp", "1333717971.398761"),
            ])),
            _ => self
                .responder
                .as_ref()
                .and_then(|responder| responder(request))
                .unwrap_or_else(|| Reply::success(request)),
        }
    }

    fn login(&self, request: &Message) -> Reply {
        let user_ok = request.get("Username") == Some(self.username.as_str());
        let secret_ok = match request.get("AuthType") {
            Some("MD5") => {
                request.get("Key") == Some(challenge_digest(CHALLENGE, &self.secret).as_str())
            }
            _ => request.get("Secret") == Some(self.secret.as_str()),
        };
        if user_ok && secret_ok {
            Reply::raw(block(&[
                ("Response", "Success"),
                ("ActionID", action_id(request)),
                ("Message", "Authentication accepted"),
            ]))
        } else {
            Reply::error(request, "Authentication failed")
        }
    }
}

/// A manager server listening on an ephemeral local port.
///
/// The server stops when dropped.
pub struct MockManager {
    address: SocketAddr,
    config: MockConfig,
    log: Arc<Log>,
    task: JoinHandle<()>,
}

/// What the server has seen, shared with its connection tasks
#[derive(Default)]
struct Log {
    requests: Mutex<Vec<Message>>,
    closed: AtomicUsize,
}

impl MockManager {
    /// Bind to `127.0.0.1:0` and start accepting connections
    pub async fn start(config: MockConfig) -> io::Result<MockManager> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        let log = Arc::new(Log::default());

        let task = tokio::spawn(accept_loop(listener, config.clone(), log.clone()));
        Ok(MockManager {
            address,
            config,
            log,
            task,
        })
    }

    /// Listening address
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Session configuration pointing at this server with valid credentials
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new("127.0.0.1", self.address.port()).with_credentials(Credentials::plain(
            self.config.username.as_str(),
            self.config.secret.as_str(),
        ))
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<Message> {
        self.log
            .requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// `Action` names of every request received so far
    pub fn actions(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|request| request.get("Action").map(str::to_string))
            .collect()
    }

    /// Wait until `count` requests have arrived or `limit` passes
    pub async fn wait_for_requests(&self, count: usize, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if self.requests().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.requests().len() >= count
    }

    /// Number of connections that have ended
    pub fn closed_connections(&self) -> usize {
        self.log.closed.load(Ordering::SeqCst)
    }

    /// Wait until `count` connections have ended or `limit` passes
    pub async fn wait_for_closed(&self, count: usize, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if self.closed_connections() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.closed_connections() >= count
    }
}

impl Drop for MockManager {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(listener: TcpListener, config: MockConfig, log: Arc<Log>) {
    while let Ok((socket, peer)) = listener.accept().await {
        debug!(%peer, "Mock manager accepted connection");
        let config = config.clone();
        let log = log.clone();
        tokio::spawn(async move {
            if let Err(error) = serve(socket, config, &log).await {
                debug!(%peer, "Mock manager connection ended: {}", error);
            }
            log.closed.fetch_add(1, Ordering::SeqCst);
        });
    }
}

async fn serve(
    socket: TcpStream,
    config: MockConfig,
    log: &Log,
) -> io::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);

    if let Some(banner) = &config.banner {
        writer.write_all(banner.as_bytes()).await?;
    }

    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        trace!("mock << {:?}", line);
        if line != "\r\n" {
            lines.push(line);
            continue;
        }
        if lines.is_empty() {
            continue;
        }

        let request = Message::from_lines(lines.drain(..)).map_err(io::Error::other)?;
        if let Ok(mut requests) = log.requests.lock() {
            requests.push(request.clone());
        }

        let reply = config.reply(&request);
        if !reply.text.is_empty() {
            trace!("mock >> {:?}", reply.text);
            writer.write_all(reply.text.as_bytes()).await?;
        }
        if reply.hangup {
            writer.shutdown().await?;
            return Ok(());
        }
    }
}

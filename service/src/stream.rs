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

//! Token-framed non-blocking TCP stream

use crate::{Result, StreamConfig, StreamError, StreamHandler};
use amilink_tokencodec::TokenCodec;
use bytes::{Buf, BytesMut};
use metrics::counter;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::Interest;
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, info, instrument, trace};

/// A single TCP connection that splits input into token-delimited frames.
///
/// The stream never spawns a task and never blocks beyond one bounded
/// readiness wait. Callers drive it by calling [`tick`](Self::tick)
/// repeatedly; each tick fires an expired alarm, waits for the socket to
/// become readable (or writable while output is queued) and hands every
/// complete frame to a [`StreamHandler`].
///
/// Output is buffered by [`write`](Self::write) and sent as the peer accepts
/// it, so partial writes are tolerated. When the connection goes away the
/// stream makes a best effort to deliver everything it holds: undelivered
/// input, including a trailing fragment without its delimiter, is flushed to
/// the handler.
///
/// One alarm slot is available. It carries a payload of type `A` that is
/// passed to [`StreamHandler::on_alarm`] when the deadline passes.
pub struct TokenStream<A = ()> {
    socket: Option<TcpStream>,
    peer_addr: SocketAddr,
    config: StreamConfig,
    codec: TokenCodec,
    inbound: BytesMut,
    outbound: BytesMut,
    scratch: Vec<u8>,
    shutdown_when_written: bool,
    alarm: Option<(Instant, A)>,
}

impl<A> TokenStream<A> {
    /// Connect to `host:port`, giving up after `config.connect_timeout`.
    #[instrument(skip(config), fields(timeout = ?config.connect_timeout))]
    pub async fn connect(host: &str, port: u16, config: StreamConfig) -> Result<Self> {
        let address = format!("{}:{}", host, port);
        debug!("Connecting to {}", address);

        let socket = match timeout(config.connect_timeout, TcpStream::connect((host, port))).await
        {
            Ok(Ok(socket)) => socket,
            Ok(Err(source)) => return Err(StreamError::ConnectFailed { address, source }),
            Err(_) => {
                return Err(StreamError::ConnectFailed {
                    address,
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                });
            }
        };

        counter!("amilink.stream.connections").increment(1);
        Self::from_stream(socket, config)
    }

    /// Wrap an already connected TCP stream.
    pub fn from_stream(socket: TcpStream, config: StreamConfig) -> Result<Self> {
        let codec = TokenCodec::new(config.token.clone())?;
        let peer_addr = socket.peer_addr().map_err(StreamError::Reset)?;
        info!(peer_addr = %peer_addr, "Connected");

        Ok(Self {
            socket: Some(socket),
            peer_addr,
            scratch: vec![0; config.block_size],
            config,
            codec,
            inbound: BytesMut::new(),
            outbound: BytesMut::new(),
            shutdown_when_written: false,
            alarm: None,
        })
    }

    /// Address of the remote end
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Configuration the stream was created with
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The delimiter token frames are split on
    pub fn token(&self) -> &[u8] {
        self.codec.token()
    }

    /// Whether the stream has been aborted
    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    /// Number of bytes queued but not yet accepted by the peer
    pub fn pending_output(&self) -> usize {
        self.outbound.len()
    }

    /// Queue `data` for sending. No I/O happens until the next tick.
    ///
    /// With `shutdown_when_written` the stream aborts itself as soon as the
    /// output buffer has fully drained, without waiting for more input.
    pub fn write(&mut self, data: impl AsRef<[u8]>, shutdown_when_written: bool) -> Result<()> {
        if self.socket.is_none() {
            return Err(StreamError::Closed);
        }
        self.codec.encode(data.as_ref(), &mut self.outbound)?;
        if shutdown_when_written {
            self.shutdown_when_written = true;
        }
        Ok(())
    }

    /// Schedule the alarm `delay` from now, replacing any pending alarm.
    pub fn alarm(&mut self, delay: Duration, payload: A) {
        trace!(?delay, "Alarm set");
        self.alarm = Some((Instant::now() + delay, payload));
    }

    /// Remove the pending alarm, returning its payload
    pub fn cancel_alarm(&mut self) -> Option<A> {
        self.alarm.take().map(|(_, payload)| payload)
    }

    /// Whether an alarm is pending
    pub fn has_alarm(&self) -> bool {
        self.alarm.is_some()
    }

    /// Do whatever work is pending.
    ///
    /// 1. Fire the alarm if its deadline has passed.
    /// 2. Wait up to the poll timeout (or until the alarm is due) for the
    ///    socket to become readable, or writable when output is queued.
    /// 3. Read one block and dispatch every complete frame; EOF or a read
    ///    error aborts the stream.
    /// 4. Write as much queued output as the peer accepts.
    ///
    /// Returns `true` if any I/O happened, letting callers detect idleness.
    /// A closed stream still fires its alarm but otherwise returns `false`.
    pub async fn tick<H>(&mut self, handler: &mut H) -> std::result::Result<bool, H::Error>
    where
        H: StreamHandler<A>,
    {
        if let Some(payload) = self.take_expired_alarm() {
            trace!("Alarm fired");
            if let Err(error) = handler.on_alarm(self, payload) {
                return self.fail(handler, error);
            }
        }

        let wait = self.wait_time();
        let Some(socket) = self.socket.as_ref() else {
            return Ok(false);
        };
        let interest = if self.outbound.is_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        };

        let waited = timeout(wait, socket.ready(interest)).await;
        let ready = match waited {
            Err(_) => return Ok(false),
            Ok(Ok(ready)) => ready,
            Ok(Err(error)) => return self.fail(handler, StreamError::Reset(error).into()),
        };

        let mut active = false;
        if ready.is_readable() || ready.is_read_closed() {
            active |= self.read(handler)?;
        }
        if ready.is_writable() && !self.outbound.is_empty() {
            active |= self.flush(handler)?;
        }
        Ok(active)
    }

    /// Tick until the stream closes or a timeout elapses, then abort.
    ///
    /// `absolute_timeout` bounds the whole loop; `relative_timeout` bounds
    /// the time spent without any I/O.
    pub async fn run<H>(
        &mut self,
        handler: &mut H,
        absolute_timeout: Option<Duration>,
        relative_timeout: Option<Duration>,
    ) -> std::result::Result<(), H::Error>
    where
        H: StreamHandler<A>,
    {
        let started = Instant::now();
        let mut last_activity = started;

        while self.socket.is_some() {
            let now = Instant::now();
            if let Some(limit) = absolute_timeout {
                if now.duration_since(started) > limit {
                    debug!("Absolute timeout of {:?} reached", limit);
                    break;
                }
            }

            let active = self.tick(handler).await?;

            if let Some(limit) = relative_timeout {
                if active {
                    last_activity = now;
                } else if now.duration_since(last_activity) > limit {
                    debug!("Idle for longer than {:?}", limit);
                    break;
                }
            }
        }

        self.abort(handler, None)
    }

    /// Close the connection.
    ///
    /// Queued output is discarded and all buffered input is delivered to the
    /// handler, including a final fragment lacking its delimiter. Calling
    /// this on a closed stream does nothing. If `cause` is given it is
    /// returned once the flush completes; an error raised by the handler
    /// during the flush is returned instead.
    pub fn abort<H>(
        &mut self,
        handler: &mut H,
        cause: Option<H::Error>,
    ) -> std::result::Result<(), H::Error>
    where
        H: StreamHandler<A>,
    {
        if let Some(socket) = self.socket.take() {
            debug!(peer_addr = %self.peer_addr, "Closing connection");
            drop(socket);
            self.outbound.clear();
            self.shutdown_when_written = false;

            loop {
                match self.codec.decode_eof(&mut self.inbound) {
                    Ok(Some(frame)) => {
                        counter!("amilink.stream.frames").increment(1);
                        handler.on_frame(self, frame)?;
                    }
                    Ok(None) => break,
                    Err(error) => return Err(StreamError::from(error).into()),
                }
            }
        }

        match cause {
            Some(cause) => Err(cause),
            None => Ok(()),
        }
    }

    fn fail<H>(&mut self, handler: &mut H, error: H::Error) -> std::result::Result<bool, H::Error>
    where
        H: StreamHandler<A>,
    {
        self.abort(handler, Some(error)).map(|()| false)
    }

    fn take_expired_alarm(&mut self) -> Option<A> {
        match &self.alarm {
            Some((deadline, _)) if *deadline <= Instant::now() => self.cancel_alarm(),
            _ => None,
        }
    }

    fn wait_time(&self) -> Duration {
        match &self.alarm {
            Some((deadline, _)) => self
                .config
                .poll_timeout
                .min(deadline.saturating_duration_since(Instant::now())),
            None => self.config.poll_timeout,
        }
    }

    fn read<H>(&mut self, handler: &mut H) -> std::result::Result<bool, H::Error>
    where
        H: StreamHandler<A>,
    {
        let Some(socket) = self.socket.as_ref() else {
            return Ok(false);
        };

        match socket.try_read(&mut self.scratch) {
            Ok(0) => {
                debug!("Recv yielded EOF");
                self.abort(handler, None)?;
                Ok(true)
            }
            Ok(count) => {
                trace!(
                    "<< {:?} ({})",
                    String::from_utf8_lossy(&self.scratch[..count]),
                    count
                );
                counter!("amilink.stream.bytes_received").increment(count as u64);
                self.inbound.extend_from_slice(&self.scratch[..count]);
                if let Err(error) = self.dispatch(handler) {
                    return self.fail(handler, error).map(|_| true);
                }
                Ok(true)
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(error) => {
                debug!("Recv yielded: {}", error);
                self.fail(handler, StreamError::Reset(error).into())
                    .map(|_| true)
            }
        }
    }

    fn dispatch<H>(&mut self, handler: &mut H) -> std::result::Result<(), H::Error>
    where
        H: StreamHandler<A>,
    {
        loop {
            let frame = match self.codec.decode(&mut self.inbound) {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(()),
                Err(error) => return Err(StreamError::from(error).into()),
            };
            counter!("amilink.stream.frames").increment(1);
            handler.on_frame(self, frame)?;
        }
    }

    fn flush<H>(&mut self, handler: &mut H) -> std::result::Result<bool, H::Error>
    where
        H: StreamHandler<A>,
    {
        let mut wrote = false;

        while !self.outbound.is_empty() {
            let Some(socket) = self.socket.as_ref() else {
                break;
            };
            let size = self.outbound.len().min(self.config.block_size);
            match socket.try_write(&self.outbound[..size]) {
                Ok(count) => {
                    wrote = true;
                    trace!(
                        ">> {:?} ({})",
                        String::from_utf8_lossy(&self.outbound[..count]),
                        count
                    );
                    counter!("amilink.stream.bytes_sent").increment(count as u64);
                    self.outbound.advance(count);
                    if count < size {
                        debug!("Wrote less than expected ({})", count);
                        break;
                    }
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) => {
                    debug!("Send yielded: {}", error);
                    return self
                        .fail(handler, StreamError::Reset(error).into())
                        .map(|_| true);
                }
            }
        }

        if self.outbound.is_empty() && self.shutdown_when_written && self.socket.is_some() {
            debug!("Output drained, shutting down");
            self.abort(handler, None)?;
        }
        Ok(wrote)
    }
}

impl<A> std::fmt::Debug for TokenStream<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStream")
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.is_closed())
            .field("inbound", &self.inbound.len())
            .field("outbound", &self.outbound.len())
            .field("alarm", &self.alarm.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amilink_tokencodec::Frame;
    use tokio::net::TcpListener;
    use tracing_test::traced_test;

    struct Sink;

    impl StreamHandler<()> for Sink {
        type Error = StreamError;

        fn on_frame(&mut self, _stream: &mut TokenStream, _frame: Frame) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_abort_is_logged_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (stream, accepted) = tokio::join!(
            TokenStream::<()>::connect("127.0.0.1", port, StreamConfig::default()),
            listener.accept()
        );
        let mut stream = stream.unwrap();
        let _server = accepted.unwrap();

        assert!(logs_contain("Connected"));
        stream.abort(&mut Sink, None).unwrap();
        stream.abort(&mut Sink, None).unwrap();
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|line| line.contains("Closing connection")).count() {
                1 => Ok(()),
                n => Err(format!("expected one close, saw {}", n)),
            }
        });
    }
}

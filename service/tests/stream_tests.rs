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

//! Socket-level tests for TokenStream

use amilink_service::{StreamConfig, StreamError, StreamHandler, TokenStream};
use amilink_tokencodec::Frame;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Default)]
struct Recorder {
    frames: Vec<Frame>,
    alarms: Vec<u32>,
    fail_on_frame: bool,
}

impl StreamHandler<u32> for Recorder {
    type Error = StreamError;

    fn on_frame(
        &mut self,
        _stream: &mut TokenStream<u32>,
        frame: Frame,
    ) -> Result<(), StreamError> {
        self.frames.push(frame);
        if self.fail_on_frame {
            return Err(StreamError::Closed);
        }
        Ok(())
    }

    fn on_alarm(&mut self, _stream: &mut TokenStream<u32>, alarm: u32) -> Result<(), StreamError> {
        self.alarms.push(alarm);
        Ok(())
    }
}

fn test_config() -> StreamConfig {
    StreamConfig::new().with_poll_timeout(Duration::from_millis(10))
}

/// Helper to create a connected stream and the server side of the socket
async fn create_pair() -> (TokenStream<u32>, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (stream, accepted) = tokio::join!(
        TokenStream::connect("127.0.0.1", port, test_config()),
        listener.accept()
    );
    (stream.unwrap(), accepted.unwrap().0)
}

async fn tick_until_closed(stream: &mut TokenStream<u32>, handler: &mut Recorder) {
    for _ in 0..500 {
        if stream.is_closed() {
            return;
        }
        stream.tick(handler).await.unwrap();
    }
    panic!("stream did not close");
}

#[tokio::test]
async fn test_frames_then_remainder_on_peer_close() {
    let (mut stream, mut server) = create_pair().await;
    let mut recorder = Recorder::default();

    server
        .write_all(b"Asterisk Call Manager/1.1\r\nResponse: Success\r\nPart")
        .await
        .unwrap();
    drop(server);

    tick_until_closed(&mut stream, &mut recorder).await;

    let frames: Vec<_> = recorder.frames.iter().map(Frame::as_bytes).collect();
    assert_eq!(
        frames,
        vec![
            &b"Asterisk Call Manager/1.1\r\n"[..],
            &b"Response: Success\r\n"[..],
            &b"Part"[..],
        ]
    );
    assert!(recorder.frames[1].is_terminated());
    assert!(!recorder.frames[2].is_terminated());
}

#[tokio::test]
async fn test_clean_close_emits_no_empty_frame() {
    let (mut stream, mut server) = create_pair().await;
    let mut recorder = Recorder::default();

    server.write_all(b"Ping: Pong\r\n").await.unwrap();
    drop(server);

    tick_until_closed(&mut stream, &mut recorder).await;
    assert_eq!(recorder.frames.len(), 1);
    assert!(recorder.frames[0].is_terminated());
}

#[tokio::test]
async fn test_write_reaches_peer() {
    let (mut stream, mut server) = create_pair().await;
    let mut recorder = Recorder::default();

    stream.write("Action: Ping\r\n", false).unwrap();
    stream.write(b"ActionID: 1\r\n\r\n", false).unwrap();
    assert_eq!(stream.pending_output(), 29);

    for _ in 0..50 {
        if stream.pending_output() == 0 {
            break;
        }
        stream.tick(&mut recorder).await.unwrap();
    }
    assert_eq!(stream.pending_output(), 0);

    let mut buf = vec![0u8; 29];
    server.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf[..], b"Action: Ping\r\nActionID: 1\r\n\r\n");
    assert!(!stream.is_closed());
}

#[tokio::test]
async fn test_shutdown_when_written() {
    let (mut stream, mut server) = create_pair().await;
    let mut recorder = Recorder::default();

    stream.write("Action: Logoff\r\n\r\n", true).unwrap();
    tick_until_closed(&mut stream, &mut recorder).await;

    let mut received = Vec::new();
    server.read_to_end(&mut received).await.unwrap();
    assert_eq!(&received[..], b"Action: Logoff\r\n\r\n");
}

#[tokio::test]
async fn test_abort_is_idempotent_and_refuses_writes() {
    let (mut stream, _server) = create_pair().await;
    let mut recorder = Recorder::default();

    stream.write("queued\r\n", false).unwrap();
    stream.abort(&mut recorder, None).unwrap();
    stream.abort(&mut recorder, None).unwrap();

    assert!(stream.is_closed());
    assert_eq!(stream.pending_output(), 0);
    assert!(matches!(stream.write("late", false), Err(StreamError::Closed)));
    assert!(!stream.tick(&mut recorder).await.unwrap());
}

#[tokio::test]
async fn test_abort_returns_cause_after_flush() {
    let (mut stream, mut server) = create_pair().await;
    let mut recorder = Recorder::default();

    server.write_all(b"Event: Newchannel\r\nChan").await.unwrap();
    for _ in 0..50 {
        if !recorder.frames.is_empty() {
            break;
        }
        stream.tick(&mut recorder).await.unwrap();
    }
    for _ in 0..3 {
        stream.tick(&mut recorder).await.unwrap();
    }
    assert_eq!(recorder.frames.len(), 1);

    let result = stream.abort(&mut recorder, Some(StreamError::Closed));
    assert!(matches!(result, Err(StreamError::Closed)));
    assert_eq!(recorder.frames.len(), 2);
    assert_eq!(recorder.frames[1].as_bytes(), b"Chan");
}

#[tokio::test]
async fn test_handler_error_aborts_stream() {
    let (mut stream, mut server) = create_pair().await;
    let mut recorder = Recorder {
        fail_on_frame: true,
        ..Default::default()
    };

    server.write_all(b"Garbage\r\n").await.unwrap();
    let mut outcome = Ok(false);
    for _ in 0..50 {
        outcome = stream.tick(&mut recorder).await;
        if outcome.is_err() {
            break;
        }
    }
    assert!(matches!(outcome, Err(StreamError::Closed)));
    assert!(stream.is_closed());
}

#[tokio::test]
async fn test_second_alarm_replaces_first() {
    let (mut stream, _server) = create_pair().await;
    let mut recorder = Recorder::default();

    stream.alarm(Duration::from_millis(30), 1);
    stream.alarm(Duration::from_millis(60), 2);
    assert!(stream.has_alarm());

    for _ in 0..100 {
        stream.tick(&mut recorder).await.unwrap();
    }
    assert_eq!(recorder.alarms, vec![2]);
    assert!(!stream.has_alarm());
}

#[tokio::test]
async fn test_alarm_fires_on_closed_stream() {
    let (mut stream, _server) = create_pair().await;
    let mut recorder = Recorder::default();

    stream.abort(&mut recorder, None).unwrap();
    stream.alarm(Duration::ZERO, 7);
    assert!(!stream.tick(&mut recorder).await.unwrap());
    assert_eq!(recorder.alarms, vec![7]);
}

#[tokio::test]
async fn test_alarm_waits_for_deadline() {
    let (mut stream, _server) = create_pair().await;
    let mut recorder = Recorder::default();
    stream.abort(&mut recorder, None).unwrap();

    // No socket I/O is awaited from here on, so the clock can be driven by hand
    tokio::time::pause();
    stream.alarm(Duration::from_secs(60), 3);

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(!stream.tick(&mut recorder).await.unwrap());
    assert!(recorder.alarms.is_empty());
    assert!(stream.has_alarm());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(!stream.tick(&mut recorder).await.unwrap());
    assert_eq!(recorder.alarms, vec![3]);
    assert!(!stream.has_alarm());
}

#[tokio::test]
async fn test_connect_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = TokenStream::<()>::connect("127.0.0.1", port, test_config()).await;
    match result {
        Err(StreamError::ConnectFailed { address, .. }) => {
            assert_eq!(address, format!("127.0.0.1:{}", port));
        }
        other => panic!("expected ConnectFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_run_stops_when_idle() {
    let (mut stream, _server) = create_pair().await;
    let mut recorder = Recorder::default();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        stream.run(&mut recorder, None, Some(Duration::from_millis(50))),
    )
    .await
    .expect("run should return on idleness");
    assert!(result.is_ok());
    assert!(stream.is_closed());
}

#[tokio::test]
async fn test_run_stops_at_absolute_timeout() {
    let (mut stream, mut server) = create_pair().await;
    let mut recorder = Recorder::default();

    let chatter = tokio::spawn(async move {
        loop {
            if server.write_all(b"Event: Tick\r\n").await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    stream
        .run(&mut recorder, Some(Duration::from_millis(100)), None)
        .await
        .unwrap();
    assert!(stream.is_closed());
    assert!(!recorder.frames.is_empty());
    chatter.abort();
}

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

//! Property tests for token framing

use amilink_tokencodec::{Frame, TokenCodec};
use bytes::BytesMut;
use proptest::prelude::*;
use tokio_util::codec::Decoder;

/// Feed `input` to a fresh CR LF codec in chunks of `chunk` bytes and
/// collect every frame, then terminate the stream.
fn frames_of(input: &[u8], chunk: usize) -> (Vec<Frame>, Option<Frame>) {
    let mut codec = TokenCodec::crlf();
    let mut buffer = BytesMut::new();
    let mut frames = Vec::new();
    for piece in input.chunks(chunk.max(1)) {
        buffer.extend_from_slice(piece);
        while let Some(frame) = codec.decode(&mut buffer).unwrap() {
            frames.push(frame);
        }
    }
    let last = codec.decode_eof(&mut buffer).unwrap();
    assert!(codec.decode_eof(&mut buffer).unwrap().is_none());
    (frames, last)
}

fn count_crlf(input: &[u8]) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i + 1 < input.len() {
        if &input[i..i + 2] == b"\r\n" {
            count += 1;
            i += 2;
        } else {
            i += 1;
        }
    }
    count
}

proptest! {
    #[test]
    fn one_frame_per_token(
        input in proptest::collection::vec(
            prop_oneof![Just(b'\r'), Just(b'\n'), Just(b'a'), any::<u8>()],
            0..256,
        ),
        chunk in 1usize..17,
    ) {
        let (frames, last) = frames_of(&input, chunk);

        prop_assert_eq!(frames.len(), count_crlf(&input));
        for frame in &frames {
            prop_assert!(frame.is_terminated());
            prop_assert!(frame.as_bytes().ends_with(b"\r\n"));
            // No frame spans a delimiter boundary.
            let body = &frame.as_bytes()[..frame.len() - 2];
            prop_assert_eq!(count_crlf(body), 0);
        }

        let mut rebuilt: Vec<u8> = frames.iter().flat_map(|f| f.as_bytes().to_vec()).collect();
        match last {
            Some(rest) => {
                prop_assert!(!rest.is_terminated());
                prop_assert!(!rest.is_empty());
                rebuilt.extend_from_slice(rest.as_bytes());
            }
            None => prop_assert!(input.is_empty() || input.ends_with(b"\r\n")),
        }
        prop_assert_eq!(rebuilt, input);
    }
}

#[test]
fn chunking_does_not_change_frames() {
    let input = b"Asterisk Call Manager/1.2\r\n\
        Response: Success\r\nMessage: Authentication accepted\r\n\r\n";
    let (whole, _) = frames_of(input, input.len());
    for chunk in 1..8 {
        let (pieces, last) = frames_of(input, chunk);
        assert_eq!(pieces, whole);
        assert!(last.is_none());
    }
}

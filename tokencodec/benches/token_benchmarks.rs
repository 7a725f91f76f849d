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

//! Benchmarks for token framing performance

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use amilink_tokencodec::TokenCodec;
use tokio_util::codec::Decoder;

// ============================================================================
// Decoding Benchmarks
// ============================================================================

fn bench_decode_message(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_message");
    let message = b"Event: QueueMember\r\nQueue: 22\r\nName: Local/ID22@route\r\n\
        Status: 1\r\nPaused: 0\r\nActionID: 1333717971.398761-3\r\n\r\n";
    group.throughput(Throughput::Bytes(message.len() as u64));

    group.bench_function("queue_member", |b| {
        let mut codec = TokenCodec::crlf();
        let mut buffer = BytesMut::with_capacity(message.len());

        b.iter(|| {
            buffer.extend_from_slice(black_box(message));
            while let Some(frame) = codec.decode(&mut buffer).unwrap() {
                black_box(frame);
            }
        });
    });

    group.finish();
}

fn bench_decode_chunked(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_chunked");
    let line: Vec<u8> = std::iter::repeat_n(b'x', 4000)
        .chain(b"\r\n".iter().copied())
        .collect();
    group.throughput(Throughput::Bytes(line.len() as u64));

    for chunk in [1usize, 16, 256, 4096].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), chunk, |b, &chunk| {
            let mut codec = TokenCodec::crlf();
            let mut buffer = BytesMut::with_capacity(line.len());

            b.iter(|| {
                for piece in line.chunks(chunk) {
                    buffer.extend_from_slice(piece);
                    if let Some(frame) = codec.decode(&mut buffer).unwrap() {
                        black_box(frame);
                    }
                }
            });
        });
    }

    group.finish();
}

criterion_group!(decoding_benches, bench_decode_message, bench_decode_chunked);

criterion_main!(decoding_benches);

// ABOUTME: Benchmark suite for frame decoding/encoding across the message catalogue
// ABOUTME: Measures decode_frame, Encodable::to_bytes, and payload-size scaling

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pk_ipc::codec::Encodable;
use pk_ipc::frame::{decode_frame, ClosePortRequest, OpenPortRequest, SendMessage};
use std::time::Duration;

fn sample_open_port_request() -> OpenPortRequest {
    OpenPortRequest {
        request_id: 1,
        requested_port: 0,
    }
}

fn sample_close_port_request() -> ClosePortRequest {
    ClosePortRequest {
        request_id: 1,
        port: 16384,
    }
}

fn sample_send_message(payload_len: usize) -> SendMessage {
    SendMessage {
        source: 16384,
        destination: 16385,
        payload: Bytes::from(vec![b'x'; payload_len]),
    }
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.measurement_time(Duration::from_secs(5));

    let open_bytes = sample_open_port_request().to_bytes();
    group.bench_function("open_port_request", |b| {
        b.iter(|| decode_frame(black_box(&open_bytes)).unwrap())
    });

    let close_bytes = sample_close_port_request().to_bytes();
    group.bench_function("close_port_request", |b| {
        b.iter(|| decode_frame(black_box(&close_bytes)).unwrap())
    });

    let send_bytes = sample_send_message(64).to_bytes();
    group.bench_function("send_message_64b", |b| {
        b.iter(|| decode_frame(black_box(&send_bytes)).unwrap())
    });

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.measurement_time(Duration::from_secs(5));

    let open = sample_open_port_request();
    group.bench_function("open_port_request", |b| b.iter(|| black_box(&open).to_bytes()));

    let send = sample_send_message(64);
    group.bench_function("send_message_64b", |b| b.iter(|| black_box(&send).to_bytes()));

    group.finish();
}

fn bench_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("roundtrip");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("send_message_64b", |b| {
        b.iter(|| {
            let message = sample_send_message(64);
            let bytes = black_box(message).to_bytes();
            decode_frame(black_box(&bytes)).unwrap()
        })
    });

    group.finish();
}

fn bench_payload_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("payload_sizes");
    group.measurement_time(Duration::from_secs(5));

    for &size in &[0usize, 16, 256, 4096, 65536 - 28] {
        let bytes = sample_send_message(size).to_bytes();
        group.bench_with_input(BenchmarkId::new("decode_send_message", size), &bytes, |b, bytes| {
            b.iter(|| decode_frame(black_box(bytes)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_decode,
    bench_encode,
    bench_roundtrip,
    bench_payload_sizes
);
criterion_main!(benches);

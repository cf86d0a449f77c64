//! Frame and handshake codec benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gridlink_protocol::{
    encode_frame, Frame, HandshakeRequest, HandshakeResponse, MessageCodec, ProtocolVersion,
};

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [64, 4096, 65536] {
        let payload = vec![0x5a; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| black_box(encode_frame(payload).unwrap()));
        });
    }

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in [64, 4096, 65536] {
        let encoded = Frame::new(Bytes::from(vec![0x5a; size])).encode().unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut buf = encoded.clone();
                black_box(Frame::decode(&mut buf).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_handshake_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("handshake_codec");
    let codec = MessageCodec::new();

    let request = HandshakeRequest::new(ProtocolVersion::current())
        .with_distributed_joins(true)
        .with_lazy(true);
    group.bench_function("encode_request", |b| {
        b.iter(|| black_box(codec.encode_handshake_request(&request)));
    });

    let rejected = codec.encode_handshake_response(&HandshakeResponse::rejected(
        ProtocolVersion::new(2, 0, 0),
        Some("Unsupported protocol version.".to_string()),
    ));
    group.bench_function("decode_rejected_response", |b| {
        b.iter(|| black_box(codec.decode_handshake_response(&rejected).unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_frame_decode,
    bench_handshake_codec,
);

criterion_main!(benches);

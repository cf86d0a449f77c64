//! Framer and session benchmarks over the in-memory transport.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gridlink_client::{Configuration, Connection, Framer, MemoryTransport, Transport};
use gridlink_protocol::{encode_frame, HandshakeResponse, MessageCodec};

fn loopback(chunk: Option<usize>) -> Framer<MemoryTransport> {
    let mut transport = match chunk {
        Some(chunk) => MemoryTransport::loopback().with_max_chunk(chunk),
        None => MemoryTransport::loopback(),
    };
    transport.connect("localhost", 10800).unwrap();
    Framer::new(transport)
}

fn bench_framer_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("framer_roundtrip");

    for size in [64, 4096, 65536] {
        let payload = vec![0x5a; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("whole", size), &payload, |b, payload| {
            let mut framer = loopback(None);
            b.iter(|| {
                framer.transport_mut().clear_sent();
                framer.send(payload).unwrap();
                black_box(framer.receive().unwrap())
            });
        });

        // Every transport call moves at most 512 bytes
        group.bench_with_input(BenchmarkId::new("chunked", size), &payload, |b, payload| {
            let mut framer = loopback(Some(512));
            b.iter(|| {
                framer.transport_mut().clear_sent();
                framer.send(payload).unwrap();
                black_box(framer.receive().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_establish(c: &mut Criterion) {
    let codec = MessageCodec::new();
    let accepted =
        encode_frame(&codec.encode_handshake_response(&HandshakeResponse::accepted())).unwrap();

    c.bench_function("establish", |b| {
        b.iter(|| {
            let mut transport = MemoryTransport::new();
            transport.push_inbound(&accepted);
            let mut conn = Connection::with_transport(transport);
            black_box(conn.establish(Configuration::default()))
        });
    });
}

criterion_group!(benches, bench_framer_roundtrip, bench_establish);

criterion_main!(benches);

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qrstream_core::{
    content::encode_content,
    framer::{decode_content_frame, ContentBuilder},
    vlq,
};

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    for size in [1024, 16384, 262144] {
        let payload = Bytes::from(vec![b'A'; size]);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                ContentBuilder::new("bench/payload.bin")
                    .payload(payload.clone())
                    .data_capacity(201)
                    .build()
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_decode_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_frame");

    let frames = ContentBuilder::new("bench/payload.bin")
        .payload(vec![b'A'; 4096])
        .data_capacity(201)
        .build()
        .unwrap();
    let raw = frames.frames()[3].clone();

    group.throughput(Throughput::Bytes(raw.len() as u64));
    group.bench_function("content_frame", |b| {
        b.iter(|| decode_content_frame(black_box(&raw)).unwrap());
    });

    let stream = encode_content("bench/payload.bin", &[b'A'; 4096]).unwrap();
    group.bench_function("vlq_field", |b| {
        b.iter(|| vlq::decode(black_box(&stream), 0).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_frame, bench_decode_frame);
criterion_main!(benches);

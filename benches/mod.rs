use criterion::{criterion_group, criterion_main};

mod transfer;

criterion_group!(
    benches,
    transfer::framing::bench_frame_body,
    transfer::pipeline::bench_get_to_serial
);
criterion_main!(benches);

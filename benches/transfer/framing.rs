use bncurl::network::IoPort;
use bncurl::transfer::Framer;
use criterion::{BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng, rngs::StdRng};

const BODY_LEN: usize = 256 * 1024;

fn random_body(rng: &mut StdRng) -> Vec<u8> {
    let mut body = vec![0u8; BODY_LEN];
    rng.fill(&mut body[..]);
    body
}

/// Splits `body` into the uneven slices a real transport hands over.
fn pieces(rng: &mut StdRng, body: &[u8]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut at = 0;
    while at < body.len() {
        let len = rng.gen_range(1..=16 * 1024).min(body.len() - at);
        out.push((at, at + len));
        at += len;
    }
    out
}

pub fn bench_frame_body(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let body = random_body(&mut rng);
    let slices = pieces(&mut rng, &body);

    let mut group = c.benchmark_group("frame_body");
    group.throughput(Throughput::Bytes(BODY_LEN as u64));
    for chunk_size in [256usize, 1024, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk_size), &chunk_size, |b, &size| {
            b.iter_batched_ref(
                || Framer::new(IoPort::new(Vec::with_capacity(BODY_LEN + BODY_LEN / 16)), size),
                |framer| {
                    framer.declare(Some(BODY_LEN as u64));
                    for &(start, end) in &slices {
                        framer.body(&body[start..end]).expect("Failed to frame body");
                    }
                    framer.finish().expect("Failed to finish body");
                    framer.succeed().expect("Failed to terminate");
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

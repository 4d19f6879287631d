use bncurl::network::IoPort;
use bncurl::network::error::Error as NetError;
use bncurl::network::transport::{Exchange, Flow, Handler, Progress, Transport};
use bncurl::storage::StdFileSystem;
use bncurl::transfer::{Config, Context, Pipeline, Request};
use criterion::{Criterion, Throughput};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::io::Sink;
use std::sync::Arc;

/// Answers every GET with the same body, in 1460-byte segments.
struct Loopback {
    body: Vec<u8>,
}

impl Transport for Loopback {
    fn perform(&mut self, _exchange: &Exchange<'_>, handler: &mut dyn Handler) -> Result<u16, NetError> {
        handler.header(b"HTTP/1.1 200 OK\r\n");
        handler.header(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        handler.header(b"\r\n");
        let mut progress = Progress {
            download_total: self.body.len() as u64,
            ..Progress::default()
        };
        for segment in self.body.chunks(1460) {
            if handler.body(segment) != segment.len() {
                return Err(NetError::WriteAborted);
            }
            progress.download_now += segment.len() as u64;
            if handler.progress(progress) == Flow::Abort {
                return Err(NetError::Aborted);
            }
        }
        Ok(200)
    }
}

fn setup_pipeline(len: usize) -> Pipeline<Loopback, IoPort<Sink>, StdFileSystem> {
    let mut rng = StdRng::seed_from_u64(11);
    let mut body = vec![0u8; len];
    rng.fill(&mut body[..]);
    let config = Config {
        probe_length: false,
        ..Config::default()
    };
    Pipeline::new(
        config,
        Arc::new(Context::new()),
        Loopback { body },
        IoPort::new(std::io::sink()),
        StdFileSystem::new(),
    )
    .expect("Failed to build pipeline")
}

pub fn bench_get_to_serial(c: &mut Criterion) {
    const LEN: usize = 1024 * 1024;
    let mut group = c.benchmark_group("get_to_serial");
    group.throughput(Throughput::Bytes(LEN as u64));
    let request = Request::get("http://bench.local/blob.bin")
        .build()
        .expect("Failed to build request");
    group.bench_function("get_1mib", |b| {
        b.iter_batched_ref(
            || setup_pipeline(LEN),
            |pipeline| {
                pipeline.run(&request).expect("Failed to run request");
            },
            criterion::BatchSize::LargeInput,
        )
    });
    group.finish();
}

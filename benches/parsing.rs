use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use phasor_codec::channel::frame::Frame;
use phasor_codec::ieee_c37_118::common::Version;
use phasor_codec::ieee_c37_118::config::ConfigurationFrame;
use phasor_codec::ieee_c37_118::data::DataFrame;
use phasor_codec::ieee_c37_118::random::{random_configuration_frame, random_data_frame};
use phasor_codec::ieee_c37_118::C37Settings;

fn bench_decode_configuration(c: &mut Criterion) {
    let settings = C37Settings::new(Version::V2011, 1_000_000);
    let mut group = c.benchmark_group("decode_configuration");

    for &num_pmus in &[1usize, 8, 64] {
        let frame = random_configuration_frame(num_pmus, Version::V2011, false, false).unwrap();
        let bytes = frame.encode();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(num_pmus), &bytes, |b, bytes| {
            b.iter(|| {
                ConfigurationFrame::decode(black_box(bytes), 0, settings.configuration_state())
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_decode_data(c: &mut Criterion) {
    let settings = C37Settings::new(Version::V2011, 1_000_000);
    let mut group = c.benchmark_group("decode_data");

    for &(num_pmus, use_float) in &[(1usize, false), (8, false), (8, true), (64, false)] {
        let configuration =
            Arc::new(random_configuration_frame(num_pmus, Version::V2011, false, use_float).unwrap());
        let data = random_data_frame(&configuration).unwrap();
        let bytes = data.encode();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(
            BenchmarkId::new(
                if use_float { "float" } else { "fixed" },
                num_pmus,
            ),
            &bytes,
            |b, bytes| {
                b.iter(|| {
                    DataFrame::decode(black_box(bytes), 0, settings.data_state(&configuration))
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

fn bench_encode_data(c: &mut Criterion) {
    let configuration =
        Arc::new(random_configuration_frame(8, Version::V2011, false, false).unwrap());
    let data = random_data_frame(&configuration).unwrap();

    c.bench_function("encode_data_8_pmus", |b| {
        b.iter(|| black_box(&data).encode());
    });
}

criterion_group!(
    benches,
    bench_decode_configuration,
    bench_decode_data,
    bench_encode_data
);
criterion_main!(benches);

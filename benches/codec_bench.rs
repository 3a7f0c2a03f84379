//! Performance benchmarks for the radio frame and whitelist codecs.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench codec_bench
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use hrbridge_core::{Address, DeviceInfo, IdentityKey};
use hrbridge_protocol::{
    RadioFrame, RepeaterStatus, WhitelistRequest, WhitelistResponse, parse_heart_rate,
};
use std::hint::black_box;

const OWN: Address = Address::new([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);
const MONITOR: Address = Address::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Routine sample frame.
fn create_hr_frame() -> RadioFrame {
    RadioFrame::HrData {
        key: IdentityKey::new(7),
        heart_rate: 72,
    }
}

/// Largest status frame: bound device with a full-length name.
fn create_status_frame() -> RadioFrame {
    RadioFrame::RepeaterStatus(RepeaterStatus {
        address: OWN,
        key: IdentityKey::new(7),
        device: Some(DeviceInfo::new("Polar H10 ABCDEFG", MONITOR)),
    })
}

/// Benchmark encoding each frame shape.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(1));

    for (name, frame) in [
        ("hr_data", create_hr_frame()),
        ("repeater_status", create_status_frame()),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &frame, |b, frame| {
            b.iter(|| black_box(black_box(frame).encode()));
        });
    }

    group.finish();
}

/// Benchmark decoding each frame shape.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(1));

    for (name, frame) in [
        ("hr_data", create_hr_frame()),
        ("repeater_status", create_status_frame()),
    ] {
        let bytes = frame.encode();
        group.bench_with_input(BenchmarkId::from_parameter(name), &bytes, |b, bytes| {
            b.iter(|| RadioFrame::decode(black_box(bytes)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark the per-notification hot path: decode the measurement and
/// encode the outgoing frame.
fn bench_sample_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_path");
    group.throughput(Throughput::Elements(1));

    let payload = [0x16u8, 74, 0x20, 0x03];
    group.bench_function("measurement_to_frame", |b| {
        b.iter(|| {
            let heart_rate = parse_heart_rate(black_box(&payload)).unwrap();
            let frame = RadioFrame::HrData {
                key: IdentityKey::new(7),
                heart_rate,
            };
            black_box(frame.encode());
        });
    });

    group.finish();
}

/// Benchmark the whitelist request/response exchange.
fn bench_whitelist(c: &mut Criterion) {
    let mut group = c.benchmark_group("whitelist");
    group.throughput(Throughput::Elements(1));

    let write = [0x01u8, 0x01, 0x02, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
    group.bench_function("decode_set_target", |b| {
        b.iter(|| WhitelistRequest::decode(black_box(&write)).unwrap());
    });
    group.bench_function("encode_target_response", |b| {
        b.iter(|| {
            WhitelistResponse::for_target(black_box(Some(MONITOR)))
                .encode()
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_sample_path,
    bench_whitelist,
);

criterion_main!(benches);

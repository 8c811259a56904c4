//! Criterion benchmarks for the Rover Link binary codec.
//!
//! The interesting case is `SendImage`: the streaming loop encodes one per
//! camera per frame interval, so its cost bounds the achievable frame rate.
//!
//! Run with:
//! ```bash
//! cargo bench --package rover-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rover_core::protocol::codec::{decode_message, encode_message};
use rover_core::protocol::messages::{
    MoveMessage, Resolution, RoverMessage, SendCameraPropMessage, SendImageMessage,
};

// ── Message fixtures ──────────────────────────────────────────────────────────

fn make_move() -> RoverMessage {
    RoverMessage::Move(MoveMessage {
        left_speed: 10,
        left_dir: 1,
        right_speed: 10,
        right_dir: 1,
    })
}

fn make_camera_prop() -> RoverMessage {
    RoverMessage::SendCameraProp(SendCameraPropMessage {
        camera_id: 0,
        resolutions: vec![
            Resolution::new(320, 240),
            Resolution::new(640, 480),
            Resolution::new(1280, 720),
            Resolution::new(1920, 1080),
        ],
    })
}

fn make_raw_image(width: u16, height: u16) -> RoverMessage {
    RoverMessage::SendImage(SendImageMessage {
        camera_id: 0,
        encoded: false,
        channels: 3,
        width,
        height,
        data: vec![0x7F; width as usize * height as usize * 3],
    })
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_small_messages(c: &mut Criterion) {
    let mut group = c.benchmark_group("small");
    for (name, msg) in [("move", make_move()), ("camera_prop", make_camera_prop())] {
        let bytes = encode_message(&msg).unwrap();
        group.bench_function(BenchmarkId::new("encode", name), |b| {
            b.iter(|| encode_message(black_box(&msg)).unwrap())
        });
        group.bench_function(BenchmarkId::new("decode", name), |b| {
            b.iter(|| decode_message(black_box(&bytes)).unwrap())
        });
    }
    group.finish();
}

fn bench_raw_images(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_image_raw");
    for (w, h) in [(320u16, 240u16), (640, 480), (1280, 720)] {
        let msg = make_raw_image(w, h);
        let bytes = encode_message(&msg).unwrap();
        let label = format!("{w}x{h}");
        group.bench_with_input(BenchmarkId::new("encode", &label), &msg, |b, m| {
            b.iter(|| encode_message(black_box(m)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("decode", &label), &bytes, |b, raw| {
            b.iter(|| decode_message(black_box(raw)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_small_messages, bench_raw_images);
criterion_main!(benches);

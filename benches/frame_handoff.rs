//! Frame Hand-off Benchmarks
//!
//! Measures the latest-value slot between the render loop and the export
//! pump, and one software render cycle (composite, copy to export surface,
//! read back) at common call resolutions.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::{Duration, Instant};

use arcall::call::{control_channel, EventSink};
use arcall::capture::{CaptureFormat, Orientation, PixelFormat, RawFrame};
use arcall::config::types::RenderConfig;
use arcall::effect::{EffectProcessor, EffectRef, OverlayEngine};
use arcall::handoff::LatestSlot;
use arcall::render::{CompositedFrame, CpuBackend, GraphicsBackend, SurfaceConfig};

/// Generate an NV21 frame with a gradient luma plane
fn generate_nv21_frame(width: u32, height: u32) -> RawFrame {
    let format = CaptureFormat {
        width,
        height,
        fps: 30,
        format: PixelFormat::Nv21,
        orientation: Orientation::Deg0,
        mirrored: true,
    };
    let luma = (width * height) as usize;
    let mut data = vec![128u8; PixelFormat::Nv21.frame_size(width, height)];
    for (i, byte) in data[..luma].iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }
    RawFrame::new(0, Duration::ZERO, &format, Bytes::from(data))
}

fn ready_engine() -> OverlayEngine {
    let (tx, _rx) = control_channel();
    let engine = OverlayEngine::new(Duration::ZERO);
    engine
        .initialize(EventSink::effect(tx))
        .expect("engine initialization");

    let deadline = Instant::now() + Duration::from_secs(5);
    while !engine.is_initialized() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    engine.switch_effect(EffectRef::new("mask", "aviators"));
    engine
}

/// Benchmark offer/take on the export hand-off slot
fn bench_latest_slot(c: &mut Criterion) {
    let mut group = c.benchmark_group("latest_slot");

    group.bench_function("offer_take", |b| {
        let slot = LatestSlot::new();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            slot.offer(black_box(n));
            black_box(slot.try_take())
        });
    });

    group.bench_function("offer_overwrite", |b| {
        let slot = LatestSlot::new();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            black_box(slot.offer(black_box(n)))
        });
    });

    group.finish();
}

/// Benchmark one render cycle into a shared-context surface pair
fn bench_render_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_cycle");
    let engine = ready_engine();
    let backend = CpuBackend::new();

    let resolutions = [(320, 240, "240p"), (480, 480, "480sq"), (640, 480, "480p")];

    for (width, height, name) in resolutions {
        let render = RenderConfig {
            display_width: width,
            display_height: height,
            export_width: width,
            export_height: height,
            ..RenderConfig::default()
        };
        let mut pair = backend
            .create_context(&SurfaceConfig::from(&render))
            .expect("surface pair");

        engine.submit_frame(generate_nv21_frame(width, height));

        group.throughput(Throughput::Bytes(u64::from(width * height * 4)));
        group.bench_with_input(BenchmarkId::new("composite_export", name), &(), |b, _| {
            let mut sequence = 0u64;
            b.iter(|| {
                sequence += 1;
                engine.draw_composite(&mut pair.display);
                pair.display.present();
                pair.export.copy_from(&pair.display);
                black_box(CompositedFrame::read_back(sequence, &pair.export))
            });
        });
    }

    group.finish();
    engine.release();
}

criterion_group!(benches, bench_latest_slot, bench_render_cycle);
criterion_main!(benches);

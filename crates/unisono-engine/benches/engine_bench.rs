//! Criterion benchmarks for the software engine
//!
//! Run with: cargo bench -p unisono-engine
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use unisono_engine::{EngineProfile, NativeContext, OscillatorType};

const SAMPLE_RATE: f32 = 48000.0;
const LENGTHS: &[usize] = &[4800, 48000];

/// Oscillator -> gain -> IIR -> destination, with a delay feedback loop around the gain.
fn build_patch(length: usize) -> NativeContext {
    let ctx = NativeContext::offline(2, length, SAMPLE_RATE, EngineProfile::reference()).unwrap();
    let osc = ctx.create_oscillator().unwrap();
    osc.set_oscillator_type(OscillatorType::Sawtooth).unwrap();
    let gain = ctx.create_gain().unwrap();
    let delay = ctx.create_delay(1.0).unwrap();
    let feedback = ctx.create_gain().unwrap();
    let iir = ctx
        .create_iir_filter(&[0.0675, 0.1349, 0.0675], &[1.0, -1.1430, 0.4128])
        .unwrap();

    gain.param("gain")
        .unwrap()
        .set_value_at_time(0.0, 0.0)
        .unwrap()
        .linear_ramp_to_value_at_time(0.8, 0.05)
        .unwrap();
    delay.param("delayTime").unwrap().set_value_at_time(0.25, 0.0).unwrap();
    feedback.param("gain").unwrap().set_value_at_time(0.5, 0.0).unwrap();

    osc.connect(&gain, 0, 0).unwrap();
    gain.connect(&delay, 0, 0).unwrap();
    delay.connect(&feedback, 0, 0).unwrap();
    feedback.connect(&gain, 0, 0).unwrap();
    gain.connect(&iir, 0, 0).unwrap();
    iir.connect(&ctx.destination(), 0, 0).unwrap();
    osc.start(0.0).unwrap();
    ctx
}

fn bench_offline_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("OfflineRender");
    for &length in LENGTHS {
        group.bench_with_input(BenchmarkId::new("feedback_patch", length), &length, |b, &len| {
            b.iter_with_setup(
                || build_patch(len),
                |ctx| {
                    let rendered = ctx.start_rendering().unwrap();
                    black_box(rendered);
                },
            );
        });
    }
    group.finish();
}

fn bench_realtime_advance(c: &mut Criterion) {
    let ctx = NativeContext::realtime(SAMPLE_RATE, EngineProfile::reference()).unwrap();
    let osc = ctx.create_oscillator().unwrap();
    osc.connect(&ctx.destination(), 0, 0).unwrap();
    osc.start(0.0).unwrap();

    c.bench_function("realtime_advance_quantum", |b| {
        b.iter(|| black_box(ctx.advance(128).unwrap()));
    });
}

criterion_group!(benches, bench_offline_render, bench_realtime_advance);
criterion_main!(benches);

//! Criterion benchmarks for the graph layer
//!
//! Run with: cargo bench -p unisono-graph
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use unisono_engine::{EngineProfile, OscillatorType};
use unisono_graph::{BaseAudioContext, OfflineAudioContext, Runtime};

const SAMPLE_RATE: f32 = 48000.0;
const LENGTHS: &[usize] = &[4800, 48000];

/// Oscillator -> gain -> IIR -> destination, with a delay feedback loop around the gain.
fn build_patch(ctx: &BaseAudioContext) {
    let osc = ctx.create_oscillator().unwrap();
    osc.set_type(OscillatorType::Sawtooth).unwrap();
    let gain = ctx.create_gain().unwrap();
    let delay = ctx.create_delay(1.0).unwrap();
    let feedback = ctx.create_gain().unwrap();
    let iir = ctx
        .create_iir_filter(&[0.0675, 0.1349, 0.0675], &[1.0, -1.1430, 0.4128])
        .unwrap();

    gain.gain()
        .set_value_at_time(0.0, 0.0)
        .unwrap()
        .linear_ramp_to_value_at_time(0.8, 0.05)
        .unwrap()
        .cancel_and_hold_at_time(0.04)
        .unwrap();
    delay.delay_time().set_value(0.25).unwrap();
    feedback.gain().set_value(0.5).unwrap();

    osc.connect(&gain, 0, 0).unwrap();
    gain.connect(&delay, 0, 0).unwrap();
    delay.connect(&feedback, 0, 0).unwrap();
    feedback.connect(&gain, 0, 0).unwrap();
    gain.connect(&iir, 0, 0).unwrap();
    iir.connect(&ctx.destination(), 0, 0).unwrap();
    osc.start(0.0).unwrap();
}

fn bench_offline_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_offline_render");
    for profile in EngineProfile::builtins() {
        for &length in LENGTHS {
            let id = BenchmarkId::new(profile.name.clone(), length);
            group.bench_with_input(id, &length, |b, &length| {
                let runtime = Runtime::new();
                b.iter_with_setup(
                    || {
                        let ctx =
                            OfflineAudioContext::new(&runtime, 2, length, SAMPLE_RATE, profile.clone())
                                .unwrap();
                        build_patch(&ctx);
                        ctx
                    },
                    |ctx| black_box(pollster::block_on(ctx.start_rendering()).unwrap()),
                );
            });
        }
    }
    group.finish();
}

fn bench_automation_recording(c: &mut Criterion) {
    let runtime = Runtime::new();
    let ctx = OfflineAudioContext::new(&runtime, 1, 128, SAMPLE_RATE, EngineProfile::strict())
        .unwrap();
    c.bench_function("graph_emulated_cancel_and_hold", |b| {
        b.iter_with_setup(
            || {
                let gain = ctx.create_gain().unwrap();
                for i in 0..32 {
                    let t = f64::from(i) * 0.01;
                    gain.gain().linear_ramp_to_value_at_time(0.5, t).unwrap();
                }
                gain
            },
            |gain| {
                gain.gain().cancel_and_hold_at_time(black_box(0.155)).unwrap();
                gain
            },
        );
    });
}

criterion_group!(benches, bench_offline_render, bench_automation_recording);
criterion_main!(benches);

//! Property-based tests for automation recording and replay.
//!
//! Whatever is scheduled on a parameter, the offline rebuild must play it
//! back exactly as the live engine does.

use proptest::prelude::*;
use unisono_engine::{EngineProfile, NativeContext};
use unisono_graph::{AudioContext, AudioParam, BaseAudioContext, OfflineAudioContext, Runtime};

const SAMPLE_RATE: f32 = 2000.0;
const LENGTH: usize = 512;

fn schedule() -> impl Strategy<Value = Vec<(usize, f32, f64)>> {
    prop::collection::vec((0usize..3, -1.0f32..=1.0f32, 0.0f64..0.25), 0..12)
}

fn apply(param: &AudioParam, events: &[(usize, f32, f64)]) {
    for &(kind, value, time) in events {
        let scheduled = match kind {
            0 => param.set_value_at_time(value, time),
            1 => param.linear_ramp_to_value_at_time(value, time),
            _ => param.set_target_at_time(value, time, 0.02),
        };
        scheduled.unwrap();
    }
}

fn patch(ctx: &BaseAudioContext, events: &[(usize, f32, f64)]) -> AudioParam {
    let source = ctx.create_constant_source().unwrap();
    apply(source.offset(), events);
    source.connect(&ctx.destination(), 0, 0).unwrap();
    source.start(0.0).unwrap();
    source.offset().clone()
}

/// (kind, value, gap before the call, curve points, curve duration)
type Call = (usize, f32, f64, Vec<f32>, f64);

fn chronological_calls() -> impl Strategy<Value = Vec<Call>> {
    prop::collection::vec(
        (
            0usize..5,
            0.05f32..=1.0f32,
            0.0f64..0.05,
            prop::collection::vec(-1.0f32..=1.0f32, 2..6),
            0.01f64..0.1,
        ),
        0..16,
    )
}

/// Issues every call at increasing times, never inside a running curve.
fn apply_chronological(param: &AudioParam, calls: &[Call]) {
    let mut time = 0.0;
    for (kind, value, gap, curve, duration) in calls {
        time += gap;
        let scheduled = match *kind {
            0 => param.set_value_at_time(*value, time),
            1 => param.linear_ramp_to_value_at_time(*value, time),
            2 => param.exponential_ramp_to_value_at_time(*value, time),
            3 => param.set_target_at_time(*value, time, 0.01),
            _ => {
                let start = time;
                time += duration;
                param.set_value_curve_at_time(curve, start, *duration)
            }
        };
        scheduled.unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Replay reissues exactly the calls the live engine received.
    #[test]
    fn replay_reproduces_native_calls(calls in chronological_calls()) {
        let runtime = Runtime::new();
        let ctx = OfflineAudioContext::new(&runtime, 1, LENGTH, SAMPLE_RATE, EngineProfile::reference()).unwrap();
        let source = ctx.create_constant_source().unwrap();
        let param = source.offset();
        apply_chronological(param, &calls);

        let live_calls = param.native().scheduled_calls();
        prop_assert_eq!(live_calls.len(), calls.len());
        prop_assert_eq!(&param.events(), &live_calls);

        let target_ctx = NativeContext::offline(1, 128, SAMPLE_RATE, EngineProfile::reference()).unwrap();
        let target = target_ctx.create_constant_source().unwrap().param("offset").unwrap();
        param.renderer().unwrap().replay(&target).unwrap();
        prop_assert_eq!(target.scheduled_calls(), live_calls);
    }

    /// Offline rebuild renders the same samples as the live graph.
    #[test]
    fn offline_replay_matches_live(events in schedule(), engine in 0usize..3) {
        let profile = EngineProfile::builtins().swap_remove(engine);
        let runtime = Runtime::new();

        let offline = OfflineAudioContext::new(&runtime, 1, LENGTH, SAMPLE_RATE, profile.clone()).unwrap();
        patch(&offline, &events);
        let rendered = pollster::block_on(offline.start_rendering()).unwrap();

        let live = AudioContext::new(&runtime, SAMPLE_RATE, profile).unwrap();
        patch(&live, &events);
        let played = live.advance(LENGTH).unwrap();

        let a = rendered.get_channel_data(0).unwrap();
        let b = played.get_channel_data(0).unwrap();
        prop_assert_eq!(a.len(), LENGTH);
        for i in 0..LENGTH {
            prop_assert!((a[i] - b[i]).abs() < 1e-6, "frame {}: {} vs {}", i, a[i], b[i]);
        }
    }

    /// Cancelling never leaves an event that starts after the cancel time.
    #[test]
    fn cancel_removes_later_events(events in schedule(), cancel in 0.0f64..0.25) {
        let runtime = Runtime::new();
        let ctx = OfflineAudioContext::new(&runtime, 1, LENGTH, SAMPLE_RATE, EngineProfile::reference()).unwrap();
        let param = patch(&ctx, &events);
        param.cancel_scheduled_values(cancel).unwrap();
        for event in param.events() {
            prop_assert!(event.time() < cancel);
        }
    }
}

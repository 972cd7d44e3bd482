//! Parameter automation timelines.
//!
//! An [`AutomationEventList`] is the per-parameter log of scheduled changes.
//! It serves two roles:
//!
//! - **Record**: the normalization layer appends every scheduling call made on
//!   a parameter of an offline graph, so the schedule can be replayed onto a
//!   freshly built parameter at render time.
//! - **Evaluate**: [`value_at()`](AutomationEventList::value_at) computes the
//!   parameter value at any time, which the software engine uses to produce
//!   per-sample parameter values.
//!
//! ## Ordering
//!
//! Scheduling events are kept in time order. Ramps are ordered by their end
//! time, every other event by its start time. Events with equal times keep
//! their call order.
//!
//! ## Cancellation
//!
//! Cancel events are never stored. [`add()`](AutomationEventList::add) applies
//! them immediately: `CancelScheduledValues` drops every event at or after
//! the cancel time, `CancelAndHold` additionally rewrites the tail so that the
//! value reached at the cancel time is held by a single terminal event.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use libm::{exp, floor, pow};

/// One scheduled parameter change, tagged by its scheduling method.
#[derive(Debug, Clone, PartialEq)]
pub enum AutomationEvent {
    /// Jump to `value` at `start_time`.
    SetValue {
        /// Target value.
        value: f32,
        /// Time in seconds at which the value takes effect.
        start_time: f64,
    },
    /// Linear ramp from the previous event's value, reaching `value` at `end_time`.
    LinearRampToValue {
        /// Value reached at the end of the ramp.
        value: f32,
        /// Time in seconds at which the ramp ends.
        end_time: f64,
    },
    /// Exponential ramp from the previous event's value, reaching `value` at `end_time`.
    ExponentialRampToValue {
        /// Value reached at the end of the ramp.
        value: f32,
        /// Time in seconds at which the ramp ends.
        end_time: f64,
    },
    /// Exponential approach towards `target`, starting at `start_time`.
    SetTarget {
        /// Value approached asymptotically.
        target: f32,
        /// Time in seconds at which the approach starts.
        start_time: f64,
        /// First-order time constant in seconds.
        time_constant: f64,
    },
    /// Linearly interpolated curve spread evenly over `duration`.
    SetValueCurve {
        /// Curve points.
        values: Vec<f32>,
        /// Time in seconds of the first point.
        start_time: f64,
        /// Duration in seconds from the first to the last point.
        duration: f64,
    },
    /// Remove every event at or after `cancel_time`.
    CancelScheduledValues {
        /// Time in seconds from which events are removed.
        cancel_time: f64,
    },
    /// Remove every event after `cancel_time` and hold the value reached then.
    CancelAndHold {
        /// Time in seconds at which the value is held.
        cancel_time: f64,
    },
}

impl AutomationEvent {
    /// The time used to order this event: the end time for ramps, the start
    /// time for everything else.
    pub fn time(&self) -> f64 {
        match self {
            Self::SetValue { start_time, .. }
            | Self::SetTarget { start_time, .. }
            | Self::SetValueCurve { start_time, .. } => *start_time,
            Self::LinearRampToValue { end_time, .. }
            | Self::ExponentialRampToValue { end_time, .. } => *end_time,
            Self::CancelScheduledValues { cancel_time } | Self::CancelAndHold { cancel_time } => {
                *cancel_time
            }
        }
    }

    /// The time at which this event stops changing the value.
    ///
    /// Identical to [`time()`](Self::time) except for value curves, which end
    /// at `start_time + duration`.
    pub fn end_time(&self) -> f64 {
        match self {
            Self::SetValueCurve {
                start_time,
                duration,
                ..
            } => start_time + duration,
            other => other.time(),
        }
    }

    /// Returns `true` for the two cancel variants.
    pub fn is_cancel(&self) -> bool {
        matches!(
            self,
            Self::CancelScheduledValues { .. } | Self::CancelAndHold { .. }
        )
    }

    /// Returns `true` for linear and exponential ramps.
    pub fn is_ramp(&self) -> bool {
        matches!(
            self,
            Self::LinearRampToValue { .. } | Self::ExponentialRampToValue { .. }
        )
    }

    /// Name of the scheduling method that produces this event.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::SetValue { .. } => "set_value_at_time",
            Self::LinearRampToValue { .. } => "linear_ramp_to_value_at_time",
            Self::ExponentialRampToValue { .. } => "exponential_ramp_to_value_at_time",
            Self::SetTarget { .. } => "set_target_at_time",
            Self::SetValueCurve { .. } => "set_value_curve_at_time",
            Self::CancelScheduledValues { .. } => "cancel_scheduled_values",
            Self::CancelAndHold { .. } => "cancel_and_hold_at_time",
        }
    }
}

/// Ordered automation log of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationEventList {
    events: Vec<AutomationEvent>,
    default_value: f32,
}

impl AutomationEventList {
    /// Creates an empty list for a parameter with the given default value.
    pub fn new(default_value: f32) -> Self {
        Self {
            events: Vec::new(),
            default_value,
        }
    }

    /// The value the parameter has before any event takes effect.
    pub fn default_value(&self) -> f32 {
        self.default_value
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if no events are stored.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterates the stored events in time order.
    pub fn iter(&self) -> core::slice::Iter<'_, AutomationEvent> {
        self.events.iter()
    }

    /// The last (latest) stored event.
    pub fn last(&self) -> Option<&AutomationEvent> {
        self.events.last()
    }

    /// Adds an event.
    ///
    /// Scheduling events are inserted after every event with an equal or
    /// earlier time; for chronological calls this is an append. Cancel events
    /// are applied to the stored events instead of being stored.
    ///
    /// Returns `false` (and leaves the list untouched) when a scheduling event
    /// would start inside a value curve that is still running, or when a value
    /// curve has fewer than two points.
    pub fn add(&mut self, event: AutomationEvent) -> bool {
        match event {
            AutomationEvent::CancelScheduledValues { cancel_time } => {
                self.cancel(cancel_time, false);
                true
            }
            AutomationEvent::CancelAndHold { cancel_time } => {
                self.cancel(cancel_time, true);
                true
            }
            event => self.insert(event),
        }
    }

    /// Discards history that no longer influences the value at `time`.
    ///
    /// Keeps the event in effect at `time` and every later event. If the first
    /// kept event is a `SetTarget`, a `SetValue` holding its starting value is
    /// prepended so evaluation is unchanged. Calling `flush` twice with the
    /// same time leaves the list unchanged.
    pub fn flush(&mut self, time: f64) {
        let index = self
            .events
            .iter()
            .position(|event| event.time() > time)
            .unwrap_or(self.events.len());
        if index <= 1 {
            return;
        }

        let mut remaining = self.events.split_off(index - 1);
        if let Some(AutomationEvent::SetTarget { start_time, .. }) = remaining.first() {
            let start_time = *start_time;
            let held = evaluate(&self.events, self.default_value, start_time);
            remaining.insert(
                0,
                AutomationEvent::SetValue {
                    value: held,
                    start_time,
                },
            );
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            "automation_flush: dropped {} events before t={time}",
            self.events.len()
        );
        self.events = remaining;
    }

    /// Computes the automated value at `time`.
    pub fn value_at(&self, time: f64) -> f32 {
        evaluate(&self.events, self.default_value, time)
    }

    fn insert(&mut self, event: AutomationEvent) -> bool {
        if let AutomationEvent::SetValueCurve { values, .. } = &event
            && values.len() < 2
        {
            #[cfg(feature = "tracing")]
            tracing::debug!("automation_add: value curve with {} points", values.len());
            return false;
        }
        let time = event.time();
        let index = self
            .events
            .iter()
            .position(|existing| existing.time() > time)
            .unwrap_or(self.events.len());

        if let Some(previous) = index.checked_sub(1).map(|i| &self.events[i])
            && let AutomationEvent::SetValueCurve { .. } = previous
            && previous.end_time() > time
        {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "automation_add: {} at t={time} overlaps a running value curve",
                event.method_name()
            );
            return false;
        }

        self.events.insert(index, event);
        true
    }

    fn cancel(&mut self, cancel_time: f64, hold: bool) {
        let held = self.value_at(cancel_time);
        let index = self.events.iter().position(|event| match event {
            AutomationEvent::SetValueCurve { .. } if !hold => event.end_time() > cancel_time,
            _ => event.time() >= cancel_time,
        });

        let removed = index.map(|i| {
            let mut tail = self.events.split_off(i);
            tail.swap_remove(0)
        });

        if !hold {
            return;
        }

        match removed {
            Some(AutomationEvent::LinearRampToValue { .. }) => {
                self.events.push(AutomationEvent::LinearRampToValue {
                    value: held,
                    end_time: cancel_time,
                });
                return;
            }
            Some(AutomationEvent::ExponentialRampToValue { .. }) => {
                self.events.push(AutomationEvent::ExponentialRampToValue {
                    value: held,
                    end_time: cancel_time,
                });
                return;
            }
            _ => {}
        }

        let truncated = match self.events.last() {
            Some(AutomationEvent::SetTarget { .. }) => Some(AutomationEvent::SetValue {
                value: held,
                start_time: cancel_time,
            }),
            Some(AutomationEvent::SetValueCurve {
                values,
                start_time,
                duration,
            }) if start_time + duration > cancel_time => Some(truncate_curve(
                values,
                *start_time,
                *duration,
                cancel_time,
            )),
            _ => None,
        };

        match truncated {
            Some(event @ AutomationEvent::SetValue { .. }) => self.events.push(event),
            Some(curve) => {
                if let Some(last) = self.events.last_mut() {
                    *last = curve;
                }
            }
            None => {}
        }
    }
}

impl<'a> IntoIterator for &'a AutomationEventList {
    type Item = &'a AutomationEvent;
    type IntoIter = core::slice::Iter<'a, AutomationEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Shortens a running value curve so that it ends at `cancel_time`.
///
/// The kept part is resampled with the curve's original point density; its
/// last point is the value the curve had reached at `cancel_time`.
fn truncate_curve(
    values: &[f32],
    start_time: f64,
    duration: f64,
    cancel_time: f64,
) -> AutomationEvent {
    let kept = (cancel_time - start_time).max(0.0);
    let ratio = (values.len().saturating_sub(1)) as f64 / duration;
    let length = ((1.0 + libm::ceil(kept * ratio)) as usize).max(2);
    let step = kept * ratio / (length - 1) as f64;

    let resampled = (0..length)
        .map(|i| curve_point(values, step * i as f64))
        .collect();

    AutomationEvent::SetValueCurve {
        values: resampled,
        start_time,
        duration: kept,
    }
}

/// Linear interpolation at fractional index `position` of a curve.
fn curve_point(values: &[f32], position: f64) -> f32 {
    let Some(&last) = values.last() else {
        return 0.0;
    };
    let index = floor(position);
    let k = index as usize;
    if k + 1 >= values.len() {
        return last;
    }
    let frac = (position - index) as f32;
    values[k] + (values[k + 1] - values[k]) * frac
}

/// The shape of the value between the last anchoring event and the next one.
enum Segment<'a> {
    Constant(f32),
    Target {
        from: f32,
        start_time: f64,
        target: f32,
        time_constant: f64,
    },
    Curve {
        values: &'a [f32],
        start_time: f64,
        duration: f64,
    },
}

impl Segment<'_> {
    fn value(&self, time: f64) -> f32 {
        match *self {
            Self::Constant(value) => value,
            Self::Target {
                from,
                start_time,
                target,
                time_constant,
            } => {
                if time_constant <= 0.0 {
                    return target;
                }
                let decay = exp(-(time - start_time) / time_constant) as f32;
                target + (from - target) * decay
            }
            Self::Curve {
                values,
                start_time,
                duration,
            } => {
                if duration <= 0.0 || time >= start_time + duration {
                    return values.last().copied().unwrap_or(0.0);
                }
                let position =
                    (time - start_time) / duration * values.len().saturating_sub(1) as f64;
                curve_point(values, position.max(0.0))
            }
        }
    }
}

fn linear_ramp(v0: f32, v1: f32, t0: f64, t1: f64, time: f64) -> f32 {
    if t1 <= t0 {
        return v1;
    }
    let fraction = ((time - t0) / (t1 - t0)) as f32;
    v0 + (v1 - v0) * fraction
}

/// Exponential ramps between values of different sign, or touching zero,
/// hold the start value until the ramp ends.
fn exponential_ramp(v0: f32, v1: f32, t0: f64, t1: f64, time: f64) -> f32 {
    if t1 <= t0 {
        return v1;
    }
    if v0 == 0.0 || v1 == 0.0 || (v0 < 0.0) != (v1 < 0.0) {
        return v0;
    }
    let fraction = (time - t0) / (t1 - t0);
    (v0 as f64 * pow(v1 as f64 / v0 as f64, fraction)) as f32
}

/// Evaluates an ordered event slice at `time`.
fn evaluate(events: &[AutomationEvent], default_value: f32, time: f64) -> f32 {
    let mut segment = Segment::Constant(default_value);
    let mut anchor_time = 0.0_f64;

    for event in events {
        match event {
            AutomationEvent::SetValue { value, start_time } => {
                if *start_time > time {
                    break;
                }
                segment = Segment::Constant(*value);
                anchor_time = *start_time;
            }
            AutomationEvent::LinearRampToValue { value, end_time } => {
                if *end_time > time {
                    let v0 = segment.value(anchor_time);
                    return linear_ramp(v0, *value, anchor_time, *end_time, time);
                }
                segment = Segment::Constant(*value);
                anchor_time = *end_time;
            }
            AutomationEvent::ExponentialRampToValue { value, end_time } => {
                if *end_time > time {
                    let v0 = segment.value(anchor_time);
                    return exponential_ramp(v0, *value, anchor_time, *end_time, time);
                }
                segment = Segment::Constant(*value);
                anchor_time = *end_time;
            }
            AutomationEvent::SetTarget {
                target,
                start_time,
                time_constant,
            } => {
                if *start_time > time {
                    break;
                }
                segment = Segment::Target {
                    from: segment.value(*start_time),
                    start_time: *start_time,
                    target: *target,
                    time_constant: *time_constant,
                };
                anchor_time = *start_time;
            }
            AutomationEvent::SetValueCurve {
                values,
                start_time,
                duration,
            } => {
                if *start_time > time {
                    break;
                }
                segment = Segment::Curve {
                    values,
                    start_time: *start_time,
                    duration: *duration,
                };
                anchor_time = start_time + duration;
            }
            AutomationEvent::CancelScheduledValues { .. } | AutomationEvent::CancelAndHold { .. } => {}
        }
    }

    segment.value(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(not(feature = "std"))]
    use alloc::vec;

    fn set(value: f32, start_time: f64) -> AutomationEvent {
        AutomationEvent::SetValue { value, start_time }
    }

    fn linear(value: f32, end_time: f64) -> AutomationEvent {
        AutomationEvent::LinearRampToValue { value, end_time }
    }

    #[test]
    fn default_value_before_any_event() {
        let list = AutomationEventList::new(0.25);
        assert_eq!(list.value_at(0.0), 0.25);
        assert_eq!(list.value_at(100.0), 0.25);
    }

    #[test]
    fn set_value_steps() {
        let mut list = AutomationEventList::new(1.0);
        list.add(set(0.5, 1.0));
        list.add(set(0.75, 2.0));
        assert_eq!(list.value_at(0.5), 1.0);
        assert_eq!(list.value_at(1.0), 0.5);
        assert_eq!(list.value_at(1.5), 0.5);
        assert_eq!(list.value_at(2.5), 0.75);
    }

    #[test]
    fn linear_ramp_from_previous_event() {
        let mut list = AutomationEventList::new(0.0);
        list.add(set(0.0, 1.0));
        list.add(linear(1.0, 2.0));
        assert!((list.value_at(1.5) - 0.5).abs() < 1e-6);
        assert_eq!(list.value_at(2.0), 1.0);
        assert_eq!(list.value_at(3.0), 1.0);
    }

    #[test]
    fn exponential_ramp_midpoint_is_geometric_mean() {
        let mut list = AutomationEventList::new(1.0);
        list.add(set(1.0, 0.0));
        list.add(AutomationEvent::ExponentialRampToValue {
            value: 4.0,
            end_time: 2.0,
        });
        assert!((list.value_at(1.0) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn exponential_ramp_towards_zero_holds_start() {
        let mut list = AutomationEventList::new(1.0);
        list.add(set(0.5, 0.0));
        list.add(AutomationEvent::ExponentialRampToValue {
            value: 0.0,
            end_time: 1.0,
        });
        assert_eq!(list.value_at(0.5), 0.5);
        assert_eq!(list.value_at(1.0), 0.0);
    }

    #[test]
    fn set_target_approaches_target() {
        let mut list = AutomationEventList::new(1.0);
        list.add(AutomationEvent::SetTarget {
            target: 0.0,
            start_time: 0.0,
            time_constant: 1.0,
        });
        let expected = libm::expf(-1.0);
        assert!((list.value_at(1.0) - expected).abs() < 1e-6);
    }

    #[test]
    fn value_curve_interpolates() {
        let mut list = AutomationEventList::new(0.0);
        list.add(AutomationEvent::SetValueCurve {
            values: vec![0.0, 1.0, 0.0],
            start_time: 0.0,
            duration: 2.0,
        });
        assert!((list.value_at(0.5) - 0.5).abs() < 1e-6);
        assert!((list.value_at(1.0) - 1.0).abs() < 1e-6);
        assert_eq!(list.value_at(5.0), 0.0);
    }

    #[test]
    fn event_inside_running_curve_is_rejected() {
        let mut list = AutomationEventList::new(0.0);
        list.add(AutomationEvent::SetValueCurve {
            values: vec![0.0, 1.0],
            start_time: 0.0,
            duration: 2.0,
        });
        assert!(!list.add(set(0.5, 1.0)));
        assert_eq!(list.len(), 1);
        assert!(list.add(set(0.5, 2.0)));
    }

    #[test]
    fn short_value_curve_is_rejected() {
        let mut list = AutomationEventList::new(0.25);
        for values in [vec![], vec![1.0]] {
            assert!(!list.add(AutomationEvent::SetValueCurve {
                values,
                start_time: 0.0,
                duration: 1.0,
            }));
        }
        assert!(list.is_empty());
        assert_eq!(list.value_at(0.5), 0.25);
    }

    #[test]
    fn out_of_order_event_is_sorted() {
        let mut list = AutomationEventList::new(0.0);
        list.add(set(1.0, 2.0));
        list.add(set(0.5, 1.0));
        let times: Vec<f64> = list.iter().map(AutomationEvent::time).collect();
        assert_eq!(times, vec![1.0, 2.0]);
    }

    #[test]
    fn cancel_scheduled_values_drops_tail() {
        let mut list = AutomationEventList::new(0.0);
        list.add(set(1.0, 1.0));
        list.add(set(2.0, 2.0));
        list.add(set(3.0, 3.0));
        list.add(AutomationEvent::CancelScheduledValues { cancel_time: 2.0 });
        assert_eq!(list.len(), 1);
        assert_eq!(list.value_at(10.0), 1.0);
    }

    #[test]
    fn cancel_and_hold_truncates_linear_ramp() {
        let mut list = AutomationEventList::new(0.0);
        list.add(set(0.0, 0.0));
        list.add(linear(1.0, 2.0));
        list.add(AutomationEvent::CancelAndHold { cancel_time: 1.0 });

        assert_eq!(list.len(), 2);
        match list.last() {
            Some(AutomationEvent::LinearRampToValue { value, end_time }) => {
                assert!((value - 0.5).abs() < 1e-6);
                assert_eq!(*end_time, 1.0);
            }
            other => panic!("expected truncated ramp, got {other:?}"),
        }
        assert!((list.value_at(5.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn cancel_and_hold_freezes_set_target() {
        let mut list = AutomationEventList::new(1.0);
        list.add(AutomationEvent::SetTarget {
            target: 0.0,
            start_time: 0.0,
            time_constant: 1.0,
        });
        let before = list.value_at(1.0);
        list.add(AutomationEvent::CancelAndHold { cancel_time: 1.0 });
        assert!(matches!(list.last(), Some(AutomationEvent::SetValue { .. })));
        assert!((list.value_at(3.0) - before).abs() < 1e-6);
    }

    #[test]
    fn cancel_and_hold_shortens_running_curve() {
        let mut list = AutomationEventList::new(0.0);
        list.add(AutomationEvent::SetValueCurve {
            values: vec![0.0, 1.0, 2.0, 3.0, 4.0],
            start_time: 0.0,
            duration: 4.0,
        });
        list.add(AutomationEvent::CancelAndHold { cancel_time: 2.5 });
        match list.last() {
            Some(AutomationEvent::SetValueCurve { duration, values, .. }) => {
                assert_eq!(*duration, 2.5);
                assert!((values.last().copied().unwrap() - 2.5).abs() < 1e-6);
            }
            other => panic!("expected truncated curve, got {other:?}"),
        }
        assert!((list.value_at(10.0) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn flush_keeps_active_event() {
        let mut list = AutomationEventList::new(0.0);
        list.add(set(1.0, 1.0));
        list.add(set(2.0, 2.0));
        list.add(set(3.0, 3.0));
        list.add(set(4.0, 4.0));
        list.flush(2.5);
        assert_eq!(list.len(), 3);
        assert_eq!(list.value_at(2.5), 2.0);
    }

    #[test]
    fn flush_is_idempotent() {
        let mut list = AutomationEventList::new(0.0);
        list.add(set(1.0, 1.0));
        list.add(AutomationEvent::SetTarget {
            target: 0.0,
            start_time: 2.0,
            time_constant: 0.5,
        });
        list.add(set(3.0, 4.0));
        list.flush(3.0);
        let once = list.clone();
        list.flush(3.0);
        assert_eq!(list, once);
    }

    #[test]
    fn flush_prepends_hold_for_set_target() {
        let mut list = AutomationEventList::new(0.0);
        list.add(set(0.25, 0.0));
        list.add(set(0.5, 1.0));
        list.add(AutomationEvent::SetTarget {
            target: 1.0,
            start_time: 2.0,
            time_constant: 1.0,
        });
        let reference = list.value_at(3.0);
        list.flush(3.0);
        assert_eq!(list.len(), 2);
        assert_eq!(list.iter().next(), Some(&set(0.5, 2.0)));
        assert!((list.value_at(3.0) - reference).abs() < 1e-6);
    }
}

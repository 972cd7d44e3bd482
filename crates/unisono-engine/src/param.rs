//! Native parameter handles.
//!
//! A [`NativeParam`] schedules automation directly on the engine's timeline.
//! The engine evaluates that timeline once per frame while rendering, so a
//! scheduling call takes effect at the exact frame it names.

use std::fmt;
use std::rc::Rc;

use unisono_core::{AudioError, AutomationEvent, Result};

use crate::context::ContextInner;
use crate::node::check_time;
use crate::render::ParamState;

/// Handle to one parameter of a native node.
#[derive(Clone)]
pub struct NativeParam {
    context: Rc<ContextInner>,
    node: usize,
    slot: usize,
}

impl NativeParam {
    pub(crate) fn new(context: Rc<ContextInner>, node: usize, slot: usize) -> Self {
        Self {
            context,
            node,
            slot,
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&ParamState) -> R) -> R {
        let graph = self.context.graph.borrow();
        f(&graph.nodes[self.node].params[self.slot])
    }

    /// Parameter name, e.g. `"gain"`.
    pub fn name(&self) -> &'static str {
        self.with_state(|p| p.name)
    }

    /// Value before any automation.
    pub fn default_value(&self) -> f32 {
        self.with_state(|p| p.default_value)
    }

    /// Lowest value the parameter takes while rendering.
    pub fn min_value(&self) -> f32 {
        self.with_state(|p| p.min_value)
    }

    /// Highest value the parameter takes while rendering.
    pub fn max_value(&self) -> f32 {
        self.with_state(|p| p.max_value)
    }

    /// Value at the context's current time.
    pub fn value(&self) -> f32 {
        let now = self.context.graph.borrow().current_time();
        self.value_at(now)
    }

    /// Value at `time`, clamped to the nominal range.
    pub fn value_at(&self, time: f64) -> f32 {
        self.with_state(|p| p.value_at(time))
    }

    /// Sets the value from the current time on.
    pub fn set_value(&self, value: f32) -> Result<&Self> {
        let now = self.context.graph.borrow().current_time();
        self.set_value_at_time(value, now)
    }

    /// Every scheduling call accepted so far, in call order.
    pub fn scheduled_calls(&self) -> Vec<AutomationEvent> {
        self.with_state(|p| p.calls.clone())
    }

    /// Schedules a jump to `value` at `start_time`.
    pub fn set_value_at_time(&self, value: f32, start_time: f64) -> Result<&Self> {
        check_value(value)?;
        check_time(start_time)?;
        self.schedule(AutomationEvent::SetValue { value, start_time })
    }

    /// Schedules a linear ramp ending at `end_time`.
    pub fn linear_ramp_to_value_at_time(&self, value: f32, end_time: f64) -> Result<&Self> {
        check_value(value)?;
        check_time(end_time)?;
        self.schedule(AutomationEvent::LinearRampToValue { value, end_time })
    }

    /// Schedules an exponential ramp ending at `end_time`.
    ///
    /// # Errors
    ///
    /// [`AudioError::IndexSize`] if `value` is zero.
    pub fn exponential_ramp_to_value_at_time(&self, value: f32, end_time: f64) -> Result<&Self> {
        check_value(value)?;
        check_time(end_time)?;
        if value == 0.0 {
            return Err(AudioError::index_size(
                "exponential ramps cannot reach zero",
            ));
        }
        self.schedule(AutomationEvent::ExponentialRampToValue { value, end_time })
    }

    /// Schedules an exponential approach towards `target`.
    pub fn set_target_at_time(
        &self,
        target: f32,
        start_time: f64,
        time_constant: f64,
    ) -> Result<&Self> {
        check_value(target)?;
        check_time(start_time)?;
        if !time_constant.is_finite() || time_constant < 0.0 {
            return Err(AudioError::index_size(format!(
                "time constant must be non-negative, got {time_constant}"
            )));
        }
        self.schedule(AutomationEvent::SetTarget {
            target,
            start_time,
            time_constant,
        })
    }

    /// Schedules a value curve spread over `duration` seconds.
    ///
    /// # Errors
    ///
    /// - [`AudioError::InvalidState`] if the curve has fewer than two points.
    /// - [`AudioError::IndexSize`] if `duration` is not positive.
    pub fn set_value_curve_at_time(
        &self,
        values: &[f32],
        start_time: f64,
        duration: f64,
    ) -> Result<&Self> {
        if values.len() < 2 {
            return Err(AudioError::invalid_state(format!(
                "a value curve needs at least 2 points, got {}",
                values.len()
            )));
        }
        for &value in values {
            check_value(value)?;
        }
        check_time(start_time)?;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(AudioError::index_size(format!(
                "curve duration must be positive, got {duration}"
            )));
        }
        self.schedule(AutomationEvent::SetValueCurve {
            values: values.to_vec(),
            start_time,
            duration,
        })
    }

    /// Removes every event at or after `cancel_time`.
    pub fn cancel_scheduled_values(&self, cancel_time: f64) -> Result<&Self> {
        check_time(cancel_time)?;
        self.schedule(AutomationEvent::CancelScheduledValues { cancel_time })
    }

    /// Removes every event after `cancel_time` and holds the value reached then.
    ///
    /// # Errors
    ///
    /// [`AudioError::NotSupported`] on engines without cancel-and-hold.
    pub fn cancel_and_hold_at_time(&self, cancel_time: f64) -> Result<&Self> {
        if !self.context.profile.native_cancel_and_hold {
            return Err(AudioError::not_supported(
                "this engine has no cancel_and_hold_at_time",
            ));
        }
        check_time(cancel_time)?;
        self.schedule(AutomationEvent::CancelAndHold { cancel_time })
    }

    fn schedule(&self, event: AutomationEvent) -> Result<&Self> {
        let mut graph = self.context.graph.borrow_mut();
        let state = &mut graph.nodes[self.node].params[self.slot];
        let method = event.method_name();
        if !state.events.add(event.clone()) {
            return Err(AudioError::not_supported(format!(
                "{method} at t={} overlaps a running value curve on {}",
                event.time(),
                state.name
            )));
        }
        tracing::trace!(
            "native_param: {} #{} {} {method} t={}",
            self.context.id,
            self.node,
            state.name,
            event.time()
        );
        state.calls.push(event);
        Ok(self)
    }
}

fn check_value(value: f32) -> Result<()> {
    if !value.is_finite() {
        return Err(AudioError::not_supported(format!(
            "automation values must be finite, got {value}"
        )));
    }
    Ok(())
}

impl PartialEq for NativeParam {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.context, &other.context)
            && self.node == other.node
            && self.slot == other.slot
    }
}

impl fmt::Debug for NativeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeParam")
            .field("context", &self.context.id)
            .field("node", &self.node)
            .field("name", &self.name())
            .finish()
    }
}

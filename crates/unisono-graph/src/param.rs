//! Recording audio parameters.
//!
//! An [`AudioParam`] forwards every scheduling call to its live native
//! parameter and records it in an [`AutomationEventList`]. Parameters of an
//! offline graph keep the full record and carry a [`ParamRenderer`] that
//! replays it at render time. Real-time parameters are never replayed, so
//! their list is flushed to the current time before each record.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use unisono_core::{AudioError, AutomationEvent, AutomationEventList, Result};
use unisono_engine::{NativeContext, NativeParam};

use crate::param_renderer::{ParamRenderer, issue};

/// How `cancel_and_hold_at_time` reaches the engine, chosen once per parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAndHoldPath {
    /// The engine implements it.
    Native,
    /// Emulated with `cancel_scheduled_values` plus one residual event.
    Emulated,
}

struct ParamInner {
    native: NativeParam,
    clock: NativeContext,
    events: Rc<RefCell<AutomationEventList>>,
    renderer: Option<ParamRenderer>,
    cancel_and_hold: CancelAndHoldPath,
}

/// A scheduling handle that keeps an engine-independent record.
///
/// Clones share the same parameter.
#[derive(Clone)]
pub struct AudioParam {
    inner: Rc<ParamInner>,
}

impl AudioParam {
    pub(crate) fn new(
        native: NativeParam,
        clock: NativeContext,
        offline: bool,
        cancel_and_hold: CancelAndHoldPath,
    ) -> Self {
        let events = Rc::new(RefCell::new(AutomationEventList::new(
            native.default_value(),
        )));
        let renderer = offline.then(|| ParamRenderer::new(Rc::clone(&events)));
        Self {
            inner: Rc::new(ParamInner {
                native,
                clock,
                events,
                renderer,
                cancel_and_hold,
            }),
        }
    }

    /// Parameter name, e.g. `"gain"`.
    pub fn name(&self) -> &'static str {
        self.inner.native.name()
    }

    /// Value before any automation.
    pub fn default_value(&self) -> f32 {
        self.inner.native.default_value()
    }

    /// Lowest value the parameter takes.
    pub fn min_value(&self) -> f32 {
        self.inner.native.min_value()
    }

    /// Highest value the parameter takes.
    pub fn max_value(&self) -> f32 {
        self.inner.native.max_value()
    }

    /// Current value.
    pub fn value(&self) -> f32 {
        self.inner.native.value()
    }

    /// Sets the value from the current time on, replacing later automation.
    pub fn set_value(&self, value: f32) -> Result<&Self> {
        let now = self.inner.clock.current_time();
        self.cancel_scheduled_values(now)?.set_value_at_time(value, now)
    }

    /// The replay half, present for parameters of offline graphs.
    pub fn renderer(&self) -> Option<&ParamRenderer> {
        self.inner.renderer.as_ref()
    }

    /// The path `cancel_and_hold_at_time` takes on this parameter.
    pub fn cancel_and_hold_path(&self) -> CancelAndHoldPath {
        self.inner.cancel_and_hold
    }

    /// A copy of the recorded automation.
    pub fn events(&self) -> Vec<AutomationEvent> {
        self.inner.events.borrow().iter().cloned().collect()
    }

    /// The live native parameter.
    pub fn native(&self) -> &NativeParam {
        &self.inner.native
    }

    /// Schedules a jump to `value` at `start_time`.
    pub fn set_value_at_time(&self, value: f32, start_time: f64) -> Result<&Self> {
        self.inner.native.set_value_at_time(value, start_time)?;
        self.record(AutomationEvent::SetValue { value, start_time });
        Ok(self)
    }

    /// Schedules a linear ramp ending at `end_time`.
    pub fn linear_ramp_to_value_at_time(&self, value: f32, end_time: f64) -> Result<&Self> {
        self.inner.native.linear_ramp_to_value_at_time(value, end_time)?;
        self.record(AutomationEvent::LinearRampToValue { value, end_time });
        Ok(self)
    }

    /// Schedules an exponential ramp ending at `end_time`.
    pub fn exponential_ramp_to_value_at_time(&self, value: f32, end_time: f64) -> Result<&Self> {
        self.inner
            .native
            .exponential_ramp_to_value_at_time(value, end_time)?;
        self.record(AutomationEvent::ExponentialRampToValue { value, end_time });
        Ok(self)
    }

    /// Schedules an exponential approach towards `target`.
    pub fn set_target_at_time(
        &self,
        target: f32,
        start_time: f64,
        time_constant: f64,
    ) -> Result<&Self> {
        self.inner
            .native
            .set_target_at_time(target, start_time, time_constant)?;
        self.record(AutomationEvent::SetTarget {
            target,
            start_time,
            time_constant,
        });
        Ok(self)
    }

    /// Schedules a value curve spread over `duration` seconds.
    pub fn set_value_curve_at_time(
        &self,
        values: &[f32],
        start_time: f64,
        duration: f64,
    ) -> Result<&Self> {
        self.inner
            .native
            .set_value_curve_at_time(values, start_time, duration)?;
        self.record(AutomationEvent::SetValueCurve {
            values: values.to_vec(),
            start_time,
            duration,
        });
        Ok(self)
    }

    /// Removes every event at or after `cancel_time`.
    pub fn cancel_scheduled_values(&self, cancel_time: f64) -> Result<&Self> {
        self.inner.native.cancel_scheduled_values(cancel_time)?;
        self.record(AutomationEvent::CancelScheduledValues { cancel_time });
        Ok(self)
    }

    /// Removes every event after `cancel_time` and holds the value reached then.
    ///
    /// On engines without a native implementation the hold is emulated: the
    /// record computes the single residual event that survives the cut, the
    /// native parameter is cancelled, and that residual event is reissued.
    pub fn cancel_and_hold_at_time(&self, cancel_time: f64) -> Result<&Self> {
        match self.inner.cancel_and_hold {
            CancelAndHoldPath::Native => {
                self.inner.native.cancel_and_hold_at_time(cancel_time)?;
                self.record(AutomationEvent::CancelAndHold { cancel_time });
            }
            CancelAndHoldPath::Emulated => self.emulate_cancel_and_hold(cancel_time)?,
        }
        Ok(self)
    }

    fn emulate_cancel_and_hold(&self, cancel_time: f64) -> Result<()> {
        if !cancel_time.is_finite() || cancel_time < 0.0 {
            return Err(AudioError::index_size(format!(
                "cancel time must be a finite, non-negative number of seconds, got {cancel_time}"
            )));
        }
        self.flush_if_realtime();

        let (cut, held) = {
            let events = self.inner.events.borrow();
            let mut cut = events.clone();
            cut.add(AutomationEvent::CancelScheduledValues { cancel_time });
            let mut held = events.clone();
            held.add(AutomationEvent::CancelAndHold { cancel_time });
            (cut, held)
        };
        let residual = held.last().filter(|&last| cut.last() != Some(last)).cloned();

        if let Some(event) = &residual {
            self.check_issuable(event).map_err(|err| {
                AudioError::invalid_state(format!(
                    "cannot express cancel_and_hold_at_time({cancel_time}) on {}: {err}",
                    self.name()
                ))
            })?;
        }

        self.inner.native.cancel_scheduled_values(cancel_time)?;
        if let Some(event) = &residual {
            tracing::trace!(
                "param: emulated hold on {} reissues {} at t={cancel_time}",
                self.name(),
                event.method_name()
            );
            issue(&self.inner.native, event)?;
        }
        *self.inner.events.borrow_mut() = held;
        Ok(())
    }

    /// Issues `event` on a throwaway parameter of the same engine.
    ///
    /// The live parameter is only touched once this succeeds.
    fn check_issuable(&self, event: &AutomationEvent) -> Result<()> {
        let scratch = NativeContext::offline(
            1,
            1,
            self.inner.clock.sample_rate(),
            self.inner.clock.profile().clone(),
        )?;
        let param = scratch
            .create_constant_source()?
            .param("offset")
            .ok_or_else(|| AudioError::invalid_state("constant source has no offset"))?;
        issue(&param, event)
    }

    fn record(&self, event: AutomationEvent) {
        self.flush_if_realtime();
        self.inner.events.borrow_mut().add(event);
    }

    fn flush_if_realtime(&self) {
        if self.inner.renderer.is_none() {
            let now = self.inner.clock.current_time();
            self.inner.events.borrow_mut().flush(now);
        }
    }
}

impl PartialEq for AudioParam {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for AudioParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioParam")
            .field("name", &self.name())
            .field("events", &self.inner.events.borrow().len())
            .field("offline", &self.inner.renderer.is_some())
            .field("cancel_and_hold", &self.inner.cancel_and_hold)
            .finish()
    }
}

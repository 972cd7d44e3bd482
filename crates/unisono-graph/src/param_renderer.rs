//! Replaying recorded automation onto native parameters.

use std::cell::RefCell;
use std::rc::Rc;

use unisono_core::{AudioError, AutomationEvent, AutomationEventList, Result};
use unisono_engine::NativeParam;

/// Replays one parameter's recorded automation.
///
/// Holds only a shared reference to the parameter's event list, so it always
/// replays the schedule as it stands when rendering starts.
#[derive(Debug, Clone)]
pub struct ParamRenderer {
    events: Rc<RefCell<AutomationEventList>>,
}

impl ParamRenderer {
    pub(crate) fn new(events: Rc<RefCell<AutomationEventList>>) -> Self {
        Self { events }
    }

    /// Reissues every recorded event on `target`, in recorded order.
    ///
    /// `target` must not have received automation before; replaying twice
    /// onto the same parameter schedules everything twice.
    pub fn replay(&self, target: &NativeParam) -> Result<()> {
        let events = self.events.borrow();
        tracing::trace!("param_replay: {} events onto {}", events.len(), target.name());
        for event in events.iter() {
            issue(target, event)?;
        }
        Ok(())
    }
}

/// Issues `event` as the matching native scheduling call.
pub(crate) fn issue(target: &NativeParam, event: &AutomationEvent) -> Result<()> {
    match event {
        AutomationEvent::SetValue { value, start_time } => {
            target.set_value_at_time(*value, *start_time)?;
        }
        AutomationEvent::LinearRampToValue { value, end_time } => {
            target.linear_ramp_to_value_at_time(*value, *end_time)?;
        }
        AutomationEvent::ExponentialRampToValue { value, end_time } => {
            target.exponential_ramp_to_value_at_time(*value, *end_time)?;
        }
        AutomationEvent::SetTarget {
            target: value,
            start_time,
            time_constant,
        } => {
            target.set_target_at_time(*value, *start_time, *time_constant)?;
        }
        AutomationEvent::SetValueCurve {
            values,
            start_time,
            duration,
        } => {
            target.set_value_curve_at_time(values, *start_time, *duration)?;
        }
        AutomationEvent::CancelScheduledValues { .. } | AutomationEvent::CancelAndHold { .. } => {
            return Err(AudioError::invalid_state(format!(
                "{} cannot be reissued as a scheduling call",
                event.method_name()
            )));
        }
    }
    Ok(())
}

//! Native node handles.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use unisono_core::{AudioError, Result};

use crate::context::{ContextId, ContextInner, NativeContext};
use crate::param::NativeParam;
use crate::render::Processor;

/// The node types the engine implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeNodeKind {
    /// The context's output.
    Destination,
    /// Multiplies its input by the `gain` parameter.
    Gain,
    /// Delays its input by the `delayTime` parameter.
    Delay,
    /// Outputs the `offset` parameter while scheduled.
    ConstantSource,
    /// Periodic waveform source.
    Oscillator,
    /// General IIR filter.
    IirFilter,
    /// Drives a boxed `SampleProcessor`.
    ScriptProcessor,
}

/// Oscillator waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OscillatorType {
    /// Sine wave.
    #[default]
    Sine,
    /// Square wave.
    Square,
    /// Rising sawtooth.
    Sawtooth,
    /// Triangle wave.
    Triangle,
}

/// Handle to a node inside a native context.
#[derive(Clone)]
pub struct NativeNode {
    context: Rc<ContextInner>,
    index: usize,
}

impl NativeNode {
    pub(crate) fn new(context: Rc<ContextInner>, index: usize) -> Self {
        Self { context, index }
    }

    /// Node type.
    pub fn kind(&self) -> NativeNodeKind {
        self.context.graph.borrow().nodes[self.index].kind
    }

    /// Index of the node inside its context.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Identity of the owning context.
    pub fn context_id(&self) -> ContextId {
        self.context.id
    }

    /// The owning context.
    pub fn context(&self) -> NativeContext {
        NativeContext {
            inner: Rc::clone(&self.context),
        }
    }

    /// Number of inputs.
    pub fn number_of_inputs(&self) -> usize {
        self.context.graph.borrow().nodes[self.index].inputs.len()
    }

    /// Number of outputs.
    pub fn number_of_outputs(&self) -> usize {
        self.context.graph.borrow().nodes[self.index].number_of_outputs
    }

    /// Connects `output` of this node to `input` of `destination`.
    ///
    /// Connecting the same pair twice has no effect.
    ///
    /// # Errors
    ///
    /// - [`AudioError::InvalidState`] if the nodes belong to different contexts.
    /// - [`AudioError::IndexSize`] if `output` or `input` is out of range.
    pub fn connect(&self, destination: &NativeNode, output: usize, input: usize) -> Result<()> {
        if !Rc::ptr_eq(&self.context, &destination.context) {
            return Err(AudioError::invalid_state(format!(
                "cannot connect a node of {} to a node of {}",
                self.context.id, destination.context.id
            )));
        }
        if output >= self.number_of_outputs() {
            return Err(AudioError::index_size(format!(
                "output index {output} out of range"
            )));
        }
        if input >= destination.number_of_inputs() {
            return Err(AudioError::index_size(format!(
                "input index {input} out of range"
            )));
        }

        let mut graph = self.context.graph.borrow_mut();
        let connections = &mut graph.nodes[destination.index].inputs[input];
        if !connections.contains(&(self.index, output)) {
            connections.push((self.index, output));
        }
        Ok(())
    }

    /// Removes every outgoing connection of this node.
    pub fn disconnect(&self) {
        let mut graph = self.context.graph.borrow_mut();
        for node in &mut graph.nodes {
            for input in &mut node.inputs {
                input.retain(|&(source, _)| source != self.index);
            }
        }
    }

    /// The nodes connected to `input`, with the output they connect from.
    pub fn inputs(&self, input: usize) -> Vec<(NativeNode, usize)> {
        let graph = self.context.graph.borrow();
        graph.nodes[self.index]
            .inputs
            .get(input)
            .map(|sources| {
                sources
                    .iter()
                    .map(|&(source, output)| (NativeNode::new(Rc::clone(&self.context), source), output))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<NativeParam> {
        let graph = self.context.graph.borrow();
        graph.nodes[self.index]
            .params
            .iter()
            .position(|p| p.name == name)
            .map(|slot| NativeParam::new(Rc::clone(&self.context), self.index, slot))
    }

    /// All parameters, in declaration order.
    pub fn params(&self) -> Vec<NativeParam> {
        let count = self.context.graph.borrow().nodes[self.index].params.len();
        (0..count)
            .map(|slot| NativeParam::new(Rc::clone(&self.context), self.index, slot))
            .collect()
    }

    /// Schedules a source to start at `when`.
    ///
    /// # Errors
    ///
    /// - [`AudioError::InvalidState`] if the node is not a scheduled source or
    ///   was already started.
    /// - [`AudioError::IndexSize`] if `when` is negative or not finite.
    pub fn start(&self, when: f64) -> Result<()> {
        check_time(when)?;
        self.with_schedule(|schedule| {
            if schedule.start.is_some() {
                return Err(AudioError::invalid_state("source was already started"));
            }
            schedule.start = Some(when);
            Ok(())
        })
    }

    /// Schedules a source to stop at `when`.
    ///
    /// # Errors
    ///
    /// - [`AudioError::InvalidState`] if the node is not a scheduled source or
    ///   was never started.
    /// - [`AudioError::IndexSize`] if `when` is negative or not finite.
    pub fn stop(&self, when: f64) -> Result<()> {
        check_time(when)?;
        self.with_schedule(|schedule| {
            if schedule.start.is_none() {
                return Err(AudioError::invalid_state("source was never started"));
            }
            schedule.stop = Some(when);
            Ok(())
        })
    }

    /// Recorded `(start, stop)` times of a scheduled source.
    pub fn scheduled_times(&self) -> Option<(Option<f64>, Option<f64>)> {
        let graph = self.context.graph.borrow();
        match &graph.nodes[self.index].processor {
            Processor::ConstantSource(schedule) | Processor::Oscillator { schedule, .. } => {
                Some((schedule.start, schedule.stop))
            }
            _ => None,
        }
    }

    fn with_schedule(
        &self,
        f: impl FnOnce(&mut crate::render::Schedule) -> Result<()>,
    ) -> Result<()> {
        let mut graph = self.context.graph.borrow_mut();
        match &mut graph.nodes[self.index].processor {
            Processor::ConstantSource(schedule) | Processor::Oscillator { schedule, .. } => {
                f(schedule)
            }
            _ => Err(AudioError::invalid_state(
                "only source nodes can be started or stopped",
            )),
        }
    }

    /// Sets the oscillator waveform.
    ///
    /// # Errors
    ///
    /// [`AudioError::InvalidState`] if the node is not an oscillator.
    pub fn set_oscillator_type(&self, waveform: OscillatorType) -> Result<()> {
        let mut graph = self.context.graph.borrow_mut();
        match &mut graph.nodes[self.index].processor {
            Processor::Oscillator { waveform: w, .. } => {
                *w = waveform;
                Ok(())
            }
            _ => Err(AudioError::invalid_state("node is not an oscillator")),
        }
    }

    /// The oscillator waveform, if this node is an oscillator.
    pub fn oscillator_type(&self) -> Option<OscillatorType> {
        match &self.context.graph.borrow().nodes[self.index].processor {
            Processor::Oscillator { waveform, .. } => Some(*waveform),
            _ => None,
        }
    }

    /// Frequency response of an IIR filter node.
    ///
    /// Engines that skip the length check fill as many entries as the
    /// shortest slice holds.
    ///
    /// # Errors
    ///
    /// [`AudioError::NotSupported`] if the node is not an IIR filter, or the
    /// slices differ in length on an engine that checks them.
    pub fn get_frequency_response(
        &self,
        frequency_hz: &[f32],
        magnitude: &mut [f32],
        phase: &mut [f32],
    ) -> Result<()> {
        let graph = self.context.graph.borrow();
        let Processor::IirFilter(filter) = &graph.nodes[self.index].processor else {
            return Err(AudioError::not_supported("node is not an IIR filter"));
        };
        let nyquist = self.context.sample_rate / 2.0;
        let coefficients = filter.coefficients();
        if self.context.profile.checks_response_lengths {
            coefficients.frequency_response(nyquist, frequency_hz, magnitude, phase)
        } else {
            coefficients.fill_response(nyquist, frequency_hz, magnitude, phase);
            Ok(())
        }
    }
}

pub(crate) fn check_time(time: f64) -> Result<()> {
    if !time.is_finite() || time < 0.0 {
        return Err(AudioError::index_size(format!(
            "time must be a finite, non-negative number of seconds, got {time}"
        )));
    }
    Ok(())
}

impl PartialEq for NativeNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.context, &other.context) && self.index == other.index
    }
}

impl Eq for NativeNode {}

impl fmt::Debug for NativeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeNode")
            .field("context", &self.context.id)
            .field("index", &self.index)
            .field("kind", &self.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::EngineProfile;

    fn offline(profile: EngineProfile) -> NativeContext {
        NativeContext::offline(1, 256, 44100.0, profile).unwrap()
    }

    #[test]
    fn test_connect_validates_indices() {
        let ctx = offline(EngineProfile::reference());
        let gain = ctx.create_gain().unwrap();
        let dest = ctx.destination();
        assert!(matches!(
            gain.connect(&dest, 1, 0),
            Err(AudioError::IndexSize(_))
        ));
        assert!(matches!(
            gain.connect(&dest, 0, 3),
            Err(AudioError::IndexSize(_))
        ));
        gain.connect(&dest, 0, 0).unwrap();
        gain.connect(&dest, 0, 0).unwrap();
        assert_eq!(dest.inputs(0).len(), 1);
    }

    #[test]
    fn test_cross_context_connect() {
        let a = offline(EngineProfile::reference());
        let b = offline(EngineProfile::reference());
        let gain = a.create_gain().unwrap();
        assert!(matches!(
            gain.connect(&b.destination(), 0, 0),
            Err(AudioError::InvalidState(_))
        ));
    }

    #[test]
    fn test_source_scheduling() {
        let ctx = offline(EngineProfile::reference());
        let source = ctx.create_constant_source().unwrap();
        assert!(source.stop(1.0).is_err());
        source.start(0.5).unwrap();
        assert!(source.start(0.6).is_err());
        source.stop(1.0).unwrap();
        assert_eq!(source.scheduled_times(), Some((Some(0.5), Some(1.0))));
        assert!(ctx.create_gain().unwrap().start(0.0).is_err());
        assert!(source.stop(-1.0).is_err());
    }

    #[test]
    fn test_response_length_quirk() {
        let checked = NativeContext::realtime(44100.0, EngineProfile::reference()).unwrap();
        let iir = checked.create_iir_filter(&[1.0], &[1.0]).unwrap();
        let mut mag = [0.0; 2];
        let mut phase = [0.0; 3];
        assert!(iir
            .get_frequency_response(&[0.0, 100.0, 200.0], &mut mag, &mut phase)
            .is_err());

        let mut profile = EngineProfile::reference();
        profile.checks_response_lengths = false;
        let unchecked = NativeContext::realtime(44100.0, profile).unwrap();
        let iir = unchecked.create_iir_filter(&[1.0], &[1.0]).unwrap();
        assert!(iir
            .get_frequency_response(&[0.0, 100.0, 200.0], &mut mag, &mut phase)
            .is_ok());
        assert_eq!(mag, [1.0, 1.0]);
    }

    #[test]
    fn test_oscillator_type() {
        let ctx = offline(EngineProfile::reference());
        let osc = ctx.create_oscillator().unwrap();
        assert_eq!(osc.oscillator_type(), Some(OscillatorType::Sine));
        osc.set_oscillator_type(OscillatorType::Square).unwrap();
        assert_eq!(osc.oscillator_type(), Some(OscillatorType::Square));
        assert!(ctx.create_gain().unwrap().set_oscillator_type(OscillatorType::Sine).is_err());
    }
}

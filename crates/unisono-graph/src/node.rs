//! High-level node handles.
//!
//! [`AudioNode`] is the untyped handle every node type dereferences to. Live
//! work goes to the native node straight away; connections, source schedules
//! and waveform changes are also written into the context's recorded graph.

use std::fmt;
use std::ops::Deref;

use unisono_core::{AudioError, IirCoefficients, Result};
use unisono_engine::{NativeNode, OscillatorType};

use crate::context::BaseAudioContext;
use crate::faker::{IirBackend, iir};
use crate::graph::{Connection, NodeId, NodeKind, NodeOptions};
use crate::param::AudioParam;

/// An untyped node handle. Clones refer to the same node.
#[derive(Clone)]
pub struct AudioNode {
    context: BaseAudioContext,
    id: NodeId,
    kind: NodeKind,
    native: NativeNode,
}

impl AudioNode {
    pub(crate) fn new(
        context: BaseAudioContext,
        id: NodeId,
        kind: NodeKind,
        native: NativeNode,
    ) -> Self {
        Self {
            context,
            id,
            kind,
            native,
        }
    }

    /// Identity within the recorded graph.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Node type.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The owning context.
    pub fn context(&self) -> &BaseAudioContext {
        &self.context
    }

    /// The live native node.
    ///
    /// On a closed context this may live in a substitute context.
    pub fn native(&self) -> &NativeNode {
        &self.native
    }

    /// Number of inputs.
    pub fn number_of_inputs(&self) -> usize {
        self.kind.number_of_inputs()
    }

    /// Number of outputs.
    pub fn number_of_outputs(&self) -> usize {
        self.kind.number_of_outputs()
    }

    /// Connects output `output` of this node to input `input` of `destination`.
    ///
    /// # Errors
    ///
    /// - [`AudioError::InvalidState`] if the nodes belong to different contexts
    /// - [`AudioError::IndexSize`] for an out-of-range output or input
    pub fn connect(&self, destination: &AudioNode, output: usize, input: usize) -> Result<()> {
        if self.context != destination.context {
            return Err(AudioError::invalid_state(format!(
                "cannot connect {} to {} from another context",
                self.id, destination.id
            )));
        }
        if output >= self.number_of_outputs() {
            return Err(AudioError::index_size(format!(
                "output {output} out of range for {} ({} outputs)",
                self.kind,
                self.number_of_outputs()
            )));
        }
        if input >= destination.number_of_inputs() {
            return Err(AudioError::index_size(format!(
                "input {input} out of range for {} ({} inputs)",
                destination.kind,
                destination.number_of_inputs()
            )));
        }

        // Offline graphs are wired only when rendered.
        if !self.context.is_offline() {
            if self.native.context_id() == destination.native.context_id() {
                self.native.connect(&destination.native, output, input)?;
            } else {
                tracing::debug!(
                    "node: {} and {} live in different engine contexts, not wired",
                    self.id,
                    destination.id
                );
            }
        }

        self.context.shared.graph.borrow_mut().connect(
            destination.id,
            Connection {
                source: self.id,
                output,
                input,
            },
        );
        Ok(())
    }

    /// Removes every outgoing connection.
    pub fn disconnect(&self) {
        if !self.context.is_offline() {
            self.native.disconnect();
        }
        self.context.shared.graph.borrow_mut().disconnect(self.id);
    }

    /// Upstream connections recorded into this node.
    pub fn inputs(&self) -> Vec<Connection> {
        self.context
            .shared
            .graph
            .borrow()
            .get(self.id)
            .map(|record| record.inputs.clone())
            .unwrap_or_default()
    }

    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<AudioParam> {
        self.params().into_iter().find(|p| p.name() == name)
    }

    /// All parameters of this node.
    pub fn params(&self) -> Vec<AudioParam> {
        self.context
            .shared
            .graph
            .borrow()
            .get(self.id)
            .map(|record| record.params.clone())
            .unwrap_or_default()
    }

    /// The construction options recorded for this node.
    pub fn options(&self) -> Option<NodeOptions> {
        self.context
            .shared
            .graph
            .borrow()
            .get(self.id)
            .map(|record| record.options.clone())
    }

    fn required_param(&self, name: &str) -> Result<AudioParam> {
        self.param(name).ok_or_else(|| {
            AudioError::invalid_state(format!("{} {} has no parameter {name}", self.kind, self.id))
        })
    }

    /// Starts a scheduled source at context time `when`.
    ///
    /// # Errors
    ///
    /// [`AudioError::InvalidState`] for nodes that are not sources or were
    /// already started; [`AudioError::IndexSize`] for a negative time.
    pub fn start(&self, when: f64) -> Result<()> {
        self.native.start(when)?;
        if let Some(record) = self.context.shared.graph.borrow_mut().get_mut(self.id) {
            record.start = Some(when);
        }
        Ok(())
    }

    /// Stops a started source at context time `when`.
    pub fn stop(&self, when: f64) -> Result<()> {
        self.native.stop(when)?;
        if let Some(record) = self.context.shared.graph.borrow_mut().get_mut(self.id) {
            record.stop = Some(when);
        }
        Ok(())
    }
}

impl PartialEq for AudioNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for AudioNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioNode")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("native", &self.native)
            .finish()
    }
}

macro_rules! impl_deref_node {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Deref for $ty {
                type Target = AudioNode;

                fn deref(&self) -> &AudioNode {
                    &self.node
                }
            }
        )*
    };
}

impl_deref_node!(
    AudioDestinationNode,
    GainNode,
    DelayNode,
    ConstantSourceNode,
    OscillatorNode,
    IirFilterNode,
);

/// The context output.
#[derive(Debug, Clone)]
pub struct AudioDestinationNode {
    node: AudioNode,
}

impl AudioDestinationNode {
    pub(crate) fn new(node: AudioNode) -> Self {
        Self { node }
    }

    /// Channels delivered to the output.
    pub fn channel_count(&self) -> usize {
        self.node.context.native().number_of_channels()
    }
}

/// Multiplies its input by `gain`.
#[derive(Debug, Clone)]
pub struct GainNode {
    node: AudioNode,
    gain: AudioParam,
}

impl GainNode {
    pub(crate) fn new(node: AudioNode) -> Result<Self> {
        let gain = node.required_param("gain")?;
        Ok(Self { node, gain })
    }

    /// The gain parameter.
    pub fn gain(&self) -> &AudioParam {
        &self.gain
    }
}

/// Delays its input by `delayTime` seconds.
#[derive(Debug, Clone)]
pub struct DelayNode {
    node: AudioNode,
    delay_time: AudioParam,
    max_delay_time: f64,
}

impl DelayNode {
    pub(crate) fn new(node: AudioNode, max_delay_time: f64) -> Result<Self> {
        let delay_time = node.required_param("delayTime")?;
        Ok(Self {
            node,
            delay_time,
            max_delay_time,
        })
    }

    /// The delay time parameter.
    pub fn delay_time(&self) -> &AudioParam {
        &self.delay_time
    }

    /// Longest supported delay in seconds.
    pub fn max_delay_time(&self) -> f64 {
        self.max_delay_time
    }
}

/// Outputs `offset` once started with [`AudioNode::start`].
#[derive(Debug, Clone)]
pub struct ConstantSourceNode {
    node: AudioNode,
    offset: AudioParam,
}

impl ConstantSourceNode {
    pub(crate) fn new(node: AudioNode) -> Result<Self> {
        let offset = node.required_param("offset")?;
        Ok(Self { node, offset })
    }

    /// The output level parameter.
    pub fn offset(&self) -> &AudioParam {
        &self.offset
    }
}

/// Periodic waveform generator.
#[derive(Debug, Clone)]
pub struct OscillatorNode {
    node: AudioNode,
    frequency: AudioParam,
    detune: AudioParam,
}

impl OscillatorNode {
    pub(crate) fn new(node: AudioNode) -> Result<Self> {
        let frequency = node.required_param("frequency")?;
        let detune = node.required_param("detune")?;
        Ok(Self {
            node,
            frequency,
            detune,
        })
    }

    /// Frequency in Hz.
    pub fn frequency(&self) -> &AudioParam {
        &self.frequency
    }

    /// Detune in cents.
    pub fn detune(&self) -> &AudioParam {
        &self.detune
    }

    /// The current waveform.
    pub fn oscillator_type(&self) -> OscillatorType {
        match self.node.options() {
            Some(NodeOptions::Oscillator { waveform }) => waveform,
            _ => OscillatorType::default(),
        }
    }

    /// Changes the waveform.
    pub fn set_type(&self, waveform: OscillatorType) -> Result<()> {
        self.node.native.set_oscillator_type(waveform)?;
        let mut graph = self.node.context.shared.graph.borrow_mut();
        if let Some(record) = graph.get_mut(self.node.id) {
            record.options = NodeOptions::Oscillator { waveform };
        }
        Ok(())
    }
}

/// General IIR filter.
#[derive(Debug, Clone)]
pub struct IirFilterNode {
    node: AudioNode,
    backend: IirBackend,
    coefficients: IirCoefficients,
}

impl IirFilterNode {
    pub(crate) fn new(node: AudioNode) -> Result<Self> {
        let Some(NodeOptions::IirFilter {
            feedforward,
            feedback,
        }) = node.options()
        else {
            return Err(AudioError::invalid_state(format!(
                "{} is not an IIR filter",
                node.id
            )));
        };
        let coefficients = IirCoefficients::new(&feedforward, &feedback)?;
        let backend = IirBackend::for_capabilities(&node.context.capabilities());
        Ok(Self {
            node,
            backend,
            coefficients,
        })
    }

    /// Whether the engine's node or the faker runs this filter.
    pub fn backend(&self) -> IirBackend {
        self.backend
    }

    /// Normalized coefficients.
    pub fn coefficients(&self) -> &IirCoefficients {
        &self.coefficients
    }

    /// Fills `magnitude` and `phase` with the response at `frequency_hz`.
    ///
    /// # Errors
    ///
    /// [`AudioError::NotSupported`] when the three slices differ in length,
    /// on every engine.
    pub fn get_frequency_response(
        &self,
        frequency_hz: &[f32],
        magnitude: &mut [f32],
        phase: &mut [f32],
    ) -> Result<()> {
        iir::get_frequency_response(
            self.backend,
            &self.node.native,
            &self.coefficients,
            &self.node.context.capabilities(),
            frequency_hz,
            magnitude,
            phase,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AudioContext, OfflineAudioContext};
    use crate::runtime::Runtime;
    use unisono_engine::EngineProfile;

    #[test]
    fn test_connect_checks_indices() {
        let runtime = Runtime::new();
        let ctx = AudioContext::new(&runtime, 48000.0, EngineProfile::reference()).unwrap();
        let source = ctx.create_constant_source().unwrap();
        let gain = ctx.create_gain().unwrap();
        assert_eq!(source.connect(&gain, 1, 0).unwrap_err().code(), 1);
        assert_eq!(gain.connect(&source, 0, 0).unwrap_err().code(), 1);
        assert_eq!(ctx.destination().connect(&gain, 0, 0).unwrap_err().code(), 1);
        source.connect(&gain, 0, 0).unwrap();
        assert_eq!(gain.inputs().len(), 1);
    }

    #[test]
    fn test_cross_context_connect_rejected() {
        let runtime = Runtime::new();
        let a = AudioContext::new(&runtime, 48000.0, EngineProfile::reference()).unwrap();
        let b = AudioContext::new(&runtime, 48000.0, EngineProfile::reference()).unwrap();
        let gain = a.create_gain().unwrap();
        let err = gain.connect(&b.destination(), 0, 0).unwrap_err();
        assert!(matches!(err, AudioError::InvalidState(_)));
    }

    #[test]
    fn test_realtime_connect_is_native() {
        let runtime = Runtime::new();
        let ctx = AudioContext::new(&runtime, 48000.0, EngineProfile::reference()).unwrap();
        let gain = ctx.create_gain().unwrap();
        gain.connect(&ctx.destination(), 0, 0).unwrap();
        assert_eq!(ctx.destination().native().inputs(0).len(), 1);

        gain.disconnect();
        assert!(ctx.destination().native().inputs(0).is_empty());
        assert!(ctx.destination().inputs().is_empty());
    }

    #[test]
    fn test_offline_connect_is_recorded_only() {
        let runtime = Runtime::new();
        let ctx =
            OfflineAudioContext::new(&runtime, 1, 128, 48000.0, EngineProfile::reference()).unwrap();
        let gain = ctx.create_gain().unwrap();
        gain.connect(&ctx.destination(), 0, 0).unwrap();
        assert!(ctx.destination().native().inputs(0).is_empty());
        assert_eq!(ctx.destination().inputs()[0].source, gain.id());
    }

    #[test]
    fn test_source_schedule_recorded() {
        let runtime = Runtime::new();
        let ctx =
            OfflineAudioContext::new(&runtime, 1, 128, 48000.0, EngineProfile::reference()).unwrap();
        let source = ctx.create_constant_source().unwrap();
        assert!(source.stop(0.5).is_err());
        source.start(0.25).unwrap();
        source.stop(0.5).unwrap();
        assert_eq!(
            source.native().scheduled_times(),
            Some((Some(0.25), Some(0.5)))
        );
        assert!(source.start(0.3).is_err());
    }

    #[test]
    fn test_oscillator_type_tracked() {
        let runtime = Runtime::new();
        let ctx = AudioContext::new(&runtime, 48000.0, EngineProfile::reference()).unwrap();
        let osc = ctx.create_oscillator().unwrap();
        assert_eq!(osc.oscillator_type(), OscillatorType::Sine);
        osc.set_type(OscillatorType::Square).unwrap();
        assert_eq!(osc.oscillator_type(), OscillatorType::Square);
        assert_eq!(osc.native().oscillator_type(), Some(OscillatorType::Square));
    }

    #[test]
    fn test_typed_params() {
        let runtime = Runtime::new();
        let ctx = AudioContext::new(&runtime, 48000.0, EngineProfile::reference()).unwrap();
        let delay = ctx.create_delay(2.0).unwrap();
        assert_eq!(delay.delay_time().name(), "delayTime");
        assert!((delay.max_delay_time() - 2.0).abs() < f64::EPSILON);
        assert_eq!(delay.param("delayTime"), Some(delay.delay_time().clone()));
        assert!(delay.param("gain").is_none());
    }

    #[test]
    fn test_iir_backend_per_engine() {
        let runtime = Runtime::new();
        let legacy = AudioContext::new(&runtime, 48000.0, EngineProfile::legacy()).unwrap();
        let reference = AudioContext::new(&runtime, 48000.0, EngineProfile::reference()).unwrap();
        assert_eq!(
            legacy.create_iir_filter(&[1.0], &[1.0]).unwrap().backend(),
            IirBackend::Faked
        );
        assert_eq!(
            reference.create_iir_filter(&[1.0], &[1.0]).unwrap().backend(),
            IirBackend::Native
        );
    }
}

//! Native audio contexts.
//!
//! A [`NativeContext`] owns one engine graph. Real-time contexts are driven
//! explicitly with [`advance`](NativeContext::advance); offline contexts
//! render their whole length once with
//! [`start_rendering`](NativeContext::start_rendering) and close afterwards.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use unisono_core::{
    AudioBuffer, AudioError, IirCoefficients, IirFilter, RENDER_QUANTUM_SIZE, Result,
    SampleProcessor,
};

use crate::deferred::Deferred;
use crate::node::{NativeNode, NativeNodeKind, OscillatorType};
use crate::profile::EngineProfile;
use crate::render::{DelayLine, EngineGraph, NodeState, ParamState, Processor, Schedule};

/// Lowest supported sample rate in Hz.
pub const MIN_SAMPLE_RATE: f32 = 3000.0;
/// Highest supported sample rate in Hz.
pub const MAX_SAMPLE_RATE: f32 = 768_000.0;
/// Highest supported channel count.
pub const MAX_CHANNELS: usize = 32;
/// Longest delay a delay node can be created with, in seconds.
pub const MAX_DELAY_TIME: f64 = 180.0;

const REALTIME_CHANNELS: usize = 2;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique context identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn mint() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Real-time or offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Driven block by block via [`NativeContext::advance`].
    Realtime,
    /// Rendered once via [`NativeContext::start_rendering`].
    Offline,
}

/// Lifecycle state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Not producing audio.
    Suspended,
    /// Producing audio.
    Running,
    /// Released; never produces audio again.
    Closed,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Suspended => "suspended",
            Self::Running => "running",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

type CompletionCallback = Box<dyn FnOnce(AudioBuffer)>;

pub(crate) struct ContextInner {
    pub id: ContextId,
    pub kind: ContextKind,
    pub sample_rate: f32,
    pub length: usize,
    pub profile: EngineProfile,
    pub state: Cell<ContextState>,
    pub graph: RefCell<EngineGraph>,
    rendering_started: Cell<bool>,
    oncomplete: RefCell<Option<CompletionCallback>>,
}

/// Handle to a native context. Clones share the same context.
#[derive(Clone)]
pub struct NativeContext {
    pub(crate) inner: Rc<ContextInner>,
}

impl NativeContext {
    /// Creates a running real-time context with a stereo destination.
    ///
    /// # Errors
    ///
    /// [`AudioError::NotSupported`] if the sample rate is out of range.
    pub fn realtime(sample_rate: f32, profile: EngineProfile) -> Result<Self> {
        check_sample_rate(sample_rate)?;
        Ok(Self::build(
            ContextKind::Realtime,
            REALTIME_CHANNELS,
            0,
            sample_rate,
            profile,
            ContextState::Running,
        ))
    }

    /// Creates a suspended offline context.
    ///
    /// # Errors
    ///
    /// [`AudioError::NotSupported`] if the channel count, length or sample
    /// rate is out of range.
    pub fn offline(
        number_of_channels: usize,
        length: usize,
        sample_rate: f32,
        profile: EngineProfile,
    ) -> Result<Self> {
        if number_of_channels == 0 || number_of_channels > MAX_CHANNELS {
            return Err(AudioError::not_supported(format!(
                "number of channels must be in 1..={MAX_CHANNELS}, got {number_of_channels}"
            )));
        }
        if length == 0 {
            return Err(AudioError::not_supported("length must be at least 1 frame"));
        }
        check_sample_rate(sample_rate)?;
        Ok(Self::build(
            ContextKind::Offline,
            number_of_channels,
            length,
            sample_rate,
            profile,
            ContextState::Suspended,
        ))
    }

    fn build(
        kind: ContextKind,
        channels: usize,
        length: usize,
        sample_rate: f32,
        profile: EngineProfile,
        state: ContextState,
    ) -> Self {
        let id = ContextId::mint();
        tracing::debug!(
            "native_context: {id} {kind:?} channels={channels} length={length} sr={sample_rate} profile={}",
            profile.name
        );

        let mut graph = EngineGraph::new(sample_rate, channels);
        graph.add(NodeState::new(
            NativeNodeKind::Destination,
            Processor::Destination,
            Vec::new(),
            1,
            sample_rate,
        ));

        Self {
            inner: Rc::new(ContextInner {
                id,
                kind,
                sample_rate,
                length,
                profile,
                state: Cell::new(state),
                graph: RefCell::new(graph),
                rendering_started: Cell::new(false),
                oncomplete: RefCell::new(None),
            }),
        }
    }

    /// Process-unique identity.
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// Real-time or offline.
    pub fn kind(&self) -> ContextKind {
        self.inner.kind
    }

    /// Returns `true` for offline contexts.
    pub fn is_offline(&self) -> bool {
        self.inner.kind == ContextKind::Offline
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.inner.sample_rate
    }

    /// Rendered length in frames (0 for real-time contexts).
    pub fn length(&self) -> usize {
        self.inner.length
    }

    /// Destination channel count.
    pub fn number_of_channels(&self) -> usize {
        self.inner.graph.borrow().channels
    }

    /// Seconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        self.inner.graph.borrow().current_time()
    }

    /// Lifecycle state.
    pub fn state(&self) -> ContextState {
        self.inner.state.get()
    }

    /// Returns `true` once the context is closed.
    pub fn is_closed(&self) -> bool {
        self.state() == ContextState::Closed
    }

    /// The quirk set this context was created with.
    pub fn profile(&self) -> &EngineProfile {
        &self.inner.profile
    }

    /// Number of nodes in the graph, destination included.
    pub fn number_of_nodes(&self) -> usize {
        self.inner.graph.borrow().nodes.len()
    }

    /// The destination node.
    pub fn destination(&self) -> NativeNode {
        NativeNode::new(Rc::clone(&self.inner), 0)
    }

    /// Creates a gain node.
    pub fn create_gain(&self) -> Result<NativeNode> {
        self.create(
            NativeNodeKind::Gain,
            Processor::Gain,
            vec![ParamState::new("gain", 1.0, f32::MIN, f32::MAX)],
            1,
        )
    }

    /// Creates a delay node.
    ///
    /// # Errors
    ///
    /// [`AudioError::IndexSize`] if `max_delay_time` is not in `(0, 180)`.
    pub fn create_delay(&self, max_delay_time: f64) -> Result<NativeNode> {
        if !(max_delay_time > 0.0 && max_delay_time < MAX_DELAY_TIME) {
            return Err(AudioError::index_size(format!(
                "max delay time must be in (0, {MAX_DELAY_TIME}), got {max_delay_time}"
            )));
        }
        self.create(
            NativeNodeKind::Delay,
            Processor::Delay(DelayLine::new(max_delay_time, self.sample_rate())),
            vec![ParamState::new("delayTime", 0.0, 0.0, max_delay_time as f32)],
            1,
        )
    }

    /// Creates a constant source node.
    pub fn create_constant_source(&self) -> Result<NativeNode> {
        self.create(
            NativeNodeKind::ConstantSource,
            Processor::ConstantSource(Schedule::default()),
            vec![ParamState::new("offset", 1.0, f32::MIN, f32::MAX)],
            0,
        )
    }

    /// Creates a sine oscillator.
    pub fn create_oscillator(&self) -> Result<NativeNode> {
        let nyquist = self.sample_rate() / 2.0;
        self.create(
            NativeNodeKind::Oscillator,
            Processor::Oscillator {
                schedule: Schedule::default(),
                waveform: OscillatorType::Sine,
                phase: 0.0,
            },
            vec![
                ParamState::new("frequency", 440.0, -nyquist, nyquist),
                ParamState::new("detune", 0.0, -153_600.0, 153_600.0),
            ],
            0,
        )
    }

    /// Creates an IIR filter node.
    ///
    /// # Errors
    ///
    /// - [`AudioError::NotSupported`] if the engine has no IIR filter node,
    ///   or a coefficient array is empty or too long.
    /// - [`AudioError::InvalidState`] if a leading coefficient is zero or the
    ///   context refuses construction.
    pub fn create_iir_filter(&self, feedforward: &[f64], feedback: &[f64]) -> Result<NativeNode> {
        if !self.inner.profile.native_iir_filter {
            return Err(AudioError::not_supported(
                "this engine has no IIR filter node",
            ));
        }
        let coefficients = IirCoefficients::new(feedforward, feedback)?;
        self.create(
            NativeNodeKind::IirFilter,
            Processor::IirFilter(IirFilter::new(coefficients, 1)),
            Vec::new(),
            1,
        )
    }

    /// Creates a node that drives `processor` once per render quantum.
    pub fn create_script_processor(
        &self,
        processor: Box<dyn SampleProcessor>,
    ) -> Result<NativeNode> {
        self.create(
            NativeNodeKind::ScriptProcessor,
            Processor::Script(processor),
            Vec::new(),
            1,
        )
    }

    fn create(
        &self,
        kind: NativeNodeKind,
        processor: Processor,
        params: Vec<ParamState>,
        number_of_inputs: usize,
    ) -> Result<NativeNode> {
        self.check_can_construct()?;
        let index = self.inner.graph.borrow_mut().add(NodeState::new(
            kind,
            processor,
            params,
            number_of_inputs,
            self.sample_rate(),
        ));
        tracing::trace!("native_node: {} {kind:?} #{index}", self.inner.id);
        Ok(NativeNode::new(Rc::clone(&self.inner), index))
    }

    fn check_can_construct(&self) -> Result<()> {
        if self.is_closed() && !self.inner.profile.constructs_on_closed_context {
            return Err(AudioError::invalid_state(format!(
                "cannot create nodes on closed context {}",
                self.inner.id
            )));
        }
        Ok(())
    }

    /// Resumes a real-time context.
    pub fn resume(&self) -> Deferred<()> {
        self.transition(ContextState::Running)
    }

    /// Suspends a real-time context.
    pub fn suspend(&self) -> Deferred<()> {
        self.transition(ContextState::Suspended)
    }

    /// Closes a real-time context.
    pub fn close(&self) -> Deferred<()> {
        self.transition(ContextState::Closed)
    }

    fn transition(&self, next: ContextState) -> Deferred<()> {
        if self.is_offline() {
            return Deferred::rejected(AudioError::invalid_state(
                "offline contexts change state only by rendering",
            ));
        }
        if self.is_closed() {
            return Deferred::rejected(AudioError::invalid_state(format!(
                "context {} is closed",
                self.inner.id
            )));
        }
        tracing::debug!("native_context: {} -> {next}", self.inner.id);
        self.inner.state.set(next);
        Deferred::resolved(())
    }

    /// Renders at least `frames` frames of a real-time context.
    ///
    /// Renders whole quanta, so the returned buffer's length is `frames`
    /// rounded up to a multiple of [`RENDER_QUANTUM_SIZE`]. A suspended
    /// context returns silence and its clock does not move.
    ///
    /// # Errors
    ///
    /// [`AudioError::InvalidState`] for offline or closed contexts.
    pub fn advance(&self, frames: usize) -> Result<AudioBuffer> {
        if self.is_offline() {
            return Err(AudioError::invalid_state(
                "offline contexts render with start_rendering",
            ));
        }
        let quanta = frames.div_ceil(RENDER_QUANTUM_SIZE);
        let channels = self.number_of_channels();
        match self.state() {
            ContextState::Closed => Err(AudioError::invalid_state(format!(
                "context {} is closed",
                self.inner.id
            ))),
            ContextState::Suspended => Ok(AudioBuffer::new(
                channels,
                quanta * RENDER_QUANTUM_SIZE,
                self.sample_rate(),
            )),
            ContextState::Running => Ok(self.render_quanta(quanta)),
        }
    }

    /// Registers the completion callback of an offline context.
    pub fn set_oncomplete(&self, callback: impl FnOnce(AudioBuffer) + 'static) {
        *self.inner.oncomplete.borrow_mut() = Some(Box::new(callback));
    }

    /// Renders an offline context.
    ///
    /// Returns the deferred result when the engine offers one; the completion
    /// callback fires when the engine offers that path. The context is closed
    /// afterwards.
    ///
    /// # Errors
    ///
    /// [`AudioError::InvalidState`] for real-time contexts and on a second call.
    pub fn start_rendering(&self) -> Result<Option<Deferred<AudioBuffer>>> {
        if !self.is_offline() {
            return Err(AudioError::invalid_state(
                "only offline contexts can start rendering",
            ));
        }
        if self.inner.rendering_started.replace(true) {
            return Err(AudioError::invalid_state(format!(
                "context {} has already rendered",
                self.inner.id
            )));
        }

        self.inner.state.set(ContextState::Running);
        let quanta = self.inner.length.div_ceil(RENDER_QUANTUM_SIZE);
        tracing::debug!(
            "native_render: {} {} frames in {quanta} quanta",
            self.inner.id,
            self.inner.length
        );

        let mut result = self.render_quanta(quanta);
        if !self.inner.profile.pads_rendered_length {
            result.truncate(self.inner.length);
        }
        self.inner.state.set(ContextState::Closed);

        let completion = self.inner.profile.completion;
        let deferred = completion
            .has_deferred()
            .then(|| Deferred::resolved(result.clone()));
        if completion.has_event() {
            let callback = self.inner.oncomplete.borrow_mut().take();
            if let Some(callback) = callback {
                callback(result);
            }
        }
        Ok(deferred)
    }

    fn render_quanta(&self, quanta: usize) -> AudioBuffer {
        let mut graph = self.inner.graph.borrow_mut();
        let mut output = AudioBuffer::new(graph.channels, 0, self.inner.sample_rate);
        for _ in 0..quanta {
            output.append(&graph.render_quantum());
        }
        output
    }
}

impl PartialEq for NativeContext {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for NativeContext {}

impl fmt::Debug for NativeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeContext")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("state", &self.state())
            .field("sample_rate", &self.inner.sample_rate)
            .field("profile", &self.inner.profile.name)
            .finish()
    }
}

fn check_sample_rate(sample_rate: f32) -> Result<()> {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        return Err(AudioError::not_supported(format!(
            "sample rate must be in {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE}, got {sample_rate}"
        )));
    }
    Ok(())
}

//! High-level audio contexts.
//!
//! [`AudioContext`] is real-time: nodes are built and wired on the engine as
//! they are created. [`OfflineAudioContext`] records its graph and rebuilds
//! it at render time. Both dereference to [`BaseAudioContext`], which holds
//! the node constructors.
//!
//! Live nodes of an offline context are built on a one-frame staging context
//! of the same engine, so the context that renders holds only the rebuilt
//! graph. Construction on a closed context is redirected to a substitute
//! context when the engine would refuse it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use unisono_core::{AudioBuffer, Result};
use unisono_engine::{ContextState, Deferred, EngineProfile, NativeContext, OscillatorType};

use crate::capabilities::Capabilities;
use crate::coordinator;
use crate::graph::{GraphRecord, NodeId, NodeKind, NodeOptions, NodeRecord};
use crate::native::create_native;
use crate::node::{
    AudioDestinationNode, AudioNode, ConstantSourceNode, DelayNode, GainNode, IirFilterNode,
    OscillatorNode,
};
use crate::param::{AudioParam, CancelAndHoldPath};
use crate::renderer::renderer_for;
use crate::runtime::Runtime;

pub(crate) struct ContextShared {
    pub runtime: Runtime,
    pub native: NativeContext,
    /// Where live nodes are built; `native` itself for real-time contexts.
    pub staging: NativeContext,
    pub capabilities: Capabilities,
    pub graph: RefCell<GraphRecord>,
    pub destination: NodeId,
    pub rendering_started: Cell<bool>,
}

impl Drop for ContextShared {
    fn drop(&mut self) {
        self.runtime.release_backup(self.native.id());
    }
}

/// State and constructors shared by both context kinds.
///
/// Clones share the same context.
#[derive(Clone)]
pub struct BaseAudioContext {
    pub(crate) shared: Rc<ContextShared>,
}

impl BaseAudioContext {
    fn new(runtime: &Runtime, native: NativeContext) -> Result<Self> {
        let capabilities = runtime.capabilities(native.profile());
        let offline = native.is_offline();
        let staging = if offline {
            NativeContext::offline(1, 1, native.sample_rate(), native.profile().clone())?
        } else {
            native.clone()
        };
        let destination = NodeId::mint();
        let mut graph = GraphRecord::default();
        graph.insert(NodeRecord::new(
            destination,
            NodeOptions::Destination,
            Vec::new(),
            offline.then(|| renderer_for(NodeKind::Destination)),
        ));
        tracing::debug!(
            "context: {} offline={offline} engine={}",
            native.id(),
            native.profile().name
        );
        Ok(Self {
            shared: Rc::new(ContextShared {
                runtime: runtime.clone(),
                native,
                staging,
                capabilities,
                graph: RefCell::new(graph),
                destination,
                rendering_started: Cell::new(false),
            }),
        })
    }

    /// The runtime this context belongs to.
    pub fn runtime(&self) -> &Runtime {
        &self.shared.runtime
    }

    /// The native context that plays (real-time) or renders (offline).
    pub fn native(&self) -> &NativeContext {
        &self.shared.native
    }

    /// Probed capabilities of the engine.
    pub fn capabilities(&self) -> Capabilities {
        self.shared.capabilities
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.shared.native.sample_rate()
    }

    /// Seconds rendered so far.
    pub fn current_time(&self) -> f64 {
        self.shared.native.current_time()
    }

    /// Lifecycle state.
    pub fn state(&self) -> ContextState {
        self.shared.native.state()
    }

    /// Returns `true` for offline contexts.
    pub fn is_offline(&self) -> bool {
        self.shared.native.is_offline()
    }

    /// Number of recorded nodes, destination included.
    pub fn number_of_nodes(&self) -> usize {
        self.shared.graph.borrow().len()
    }

    /// The context output.
    pub fn destination(&self) -> AudioDestinationNode {
        AudioDestinationNode::new(AudioNode::new(
            self.clone(),
            self.shared.destination,
            NodeKind::Destination,
            self.shared.staging.destination(),
        ))
    }

    /// Creates a gain node.
    pub fn create_gain(&self) -> Result<GainNode> {
        GainNode::new(self.create_node(NodeOptions::Gain)?)
    }

    /// Creates a delay node.
    pub fn create_delay(&self, max_delay_time: f64) -> Result<DelayNode> {
        DelayNode::new(
            self.create_node(NodeOptions::Delay { max_delay_time })?,
            max_delay_time,
        )
    }

    /// Creates a constant source.
    pub fn create_constant_source(&self) -> Result<ConstantSourceNode> {
        ConstantSourceNode::new(self.create_node(NodeOptions::ConstantSource)?)
    }

    /// Creates a sine oscillator.
    pub fn create_oscillator(&self) -> Result<OscillatorNode> {
        OscillatorNode::new(self.create_node(NodeOptions::Oscillator {
            waveform: OscillatorType::Sine,
        })?)
    }

    /// Creates an IIR filter, faked on engines without one.
    pub fn create_iir_filter(&self, feedforward: &[f64], feedback: &[f64]) -> Result<IirFilterNode> {
        IirFilterNode::new(self.create_node(NodeOptions::IirFilter {
            feedforward: feedforward.to_vec(),
            feedback: feedback.to_vec(),
        })?)
    }

    /// Builds any node type from its options.
    pub fn create_node(&self, options: NodeOptions) -> Result<AudioNode> {
        if options == NodeOptions::Destination {
            return Ok(self.destination().deref().clone());
        }
        let target = self.construction_target();
        let native = create_native(&target, &self.shared.capabilities, &options)?;

        let offline = self.is_offline();
        let cancel_and_hold = if self.shared.capabilities.native_cancel_and_hold {
            CancelAndHoldPath::Native
        } else {
            CancelAndHoldPath::Emulated
        };
        let params = native
            .params()
            .into_iter()
            .map(|param| {
                AudioParam::new(param, self.shared.native.clone(), offline, cancel_and_hold)
            })
            .collect();

        let kind = options.kind();
        let id = NodeId::mint();
        self.shared.graph.borrow_mut().insert(NodeRecord::new(
            id,
            options,
            params,
            offline.then(|| renderer_for(kind)),
        ));
        tracing::trace!("context: {} created {kind} {id}", self.shared.native.id());
        Ok(AudioNode::new(self.clone(), id, kind, native))
    }

    fn construction_target(&self) -> NativeContext {
        match self.shared.runtime.backup_for(&self.shared.native) {
            Some(backup) => {
                tracing::debug!(
                    "context: {} is closed, constructing on {}",
                    self.shared.native.id(),
                    backup.id()
                );
                backup
            }
            None => self.shared.staging.clone(),
        }
    }
}

impl PartialEq for BaseAudioContext {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for BaseAudioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseAudioContext")
            .field("native", &self.shared.native)
            .field("nodes", &self.number_of_nodes())
            .finish()
    }
}

/// A real-time context.
#[derive(Debug, Clone)]
pub struct AudioContext {
    base: BaseAudioContext,
}

impl AudioContext {
    /// Creates a running real-time context.
    pub fn new(runtime: &Runtime, sample_rate: f32, profile: EngineProfile) -> Result<Self> {
        let native = NativeContext::realtime(sample_rate, profile)?;
        Ok(Self {
            base: BaseAudioContext::new(runtime, native)?,
        })
    }

    /// Resumes rendering.
    pub fn resume(&self) -> Deferred<()> {
        self.native().resume()
    }

    /// Suspends rendering.
    pub fn suspend(&self) -> Deferred<()> {
        self.native().suspend()
    }

    /// Closes the context for good.
    pub fn close(&self) -> Deferred<()> {
        self.native().close()
    }

    /// Renders at least `frames` frames of output.
    pub fn advance(&self, frames: usize) -> Result<AudioBuffer> {
        self.native().advance(frames)
    }
}

impl Deref for AudioContext {
    type Target = BaseAudioContext;

    fn deref(&self) -> &BaseAudioContext {
        &self.base
    }
}

/// A context that renders its whole length at once.
#[derive(Debug, Clone)]
pub struct OfflineAudioContext {
    base: BaseAudioContext,
}

impl OfflineAudioContext {
    /// Creates an offline context of `length` frames.
    pub fn new(
        runtime: &Runtime,
        number_of_channels: usize,
        length: usize,
        sample_rate: f32,
        profile: EngineProfile,
    ) -> Result<Self> {
        let native = NativeContext::offline(number_of_channels, length, sample_rate, profile)?;
        Ok(Self {
            base: BaseAudioContext::new(runtime, native)?,
        })
    }

    /// Requested length in frames.
    pub fn length(&self) -> usize {
        self.native().length()
    }

    /// Requested channel count.
    pub fn number_of_channels(&self) -> usize {
        self.native().number_of_channels()
    }

    /// Rebuilds the recorded graph and renders it.
    ///
    /// A second call is rejected with InvalidState and leaves the first
    /// result untouched.
    pub fn start_rendering(&self) -> Deferred<AudioBuffer> {
        coordinator::start_rendering(&self.destination(), self.native())
    }
}

impl Deref for OfflineAudioContext {
    type Target = BaseAudioContext;

    fn deref(&self) -> &BaseAudioContext {
        &self.base
    }
}

//! The recorded graph of a context.
//!
//! Every high-level node has a [`NodeRecord`] holding what is needed to
//! rebuild it elsewhere: its configuration, its upstream connections, its
//! parameters and, for scheduled sources, its start and stop times.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use unisono_engine::OscillatorType;

use crate::param::AudioParam;
use crate::renderer::NodeRenderer;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn mint() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// High-level node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The context output.
    Destination,
    /// Gain.
    Gain,
    /// Delay line.
    Delay,
    /// Constant source.
    ConstantSource,
    /// Oscillator.
    Oscillator,
    /// General IIR filter, native or faked.
    IirFilter,
}

impl NodeKind {
    /// Number of inputs of nodes of this kind.
    pub fn number_of_inputs(self) -> usize {
        match self {
            Self::ConstantSource | Self::Oscillator => 0,
            _ => 1,
        }
    }

    /// Number of outputs of nodes of this kind.
    pub fn number_of_outputs(self) -> usize {
        match self {
            Self::Destination => 0,
            _ => 1,
        }
    }

    /// Returns `true` for nodes with `start`/`stop`.
    pub fn is_scheduled_source(self) -> bool {
        matches!(self, Self::ConstantSource | Self::Oscillator)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Destination => "destination",
            Self::Gain => "gain",
            Self::Delay => "delay",
            Self::ConstantSource => "constant_source",
            Self::Oscillator => "oscillator",
            Self::IirFilter => "iir_filter",
        };
        f.write_str(name)
    }
}

/// Construction-time configuration of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOptions {
    /// The context output.
    Destination,
    /// Gain node.
    Gain,
    /// Delay node with its maximum delay in seconds.
    Delay {
        /// Longest delay the node supports.
        max_delay_time: f64,
    },
    /// Constant source node.
    ConstantSource,
    /// Oscillator with its waveform.
    Oscillator {
        /// Waveform.
        waveform: OscillatorType,
    },
    /// IIR filter with its coefficients as given.
    IirFilter {
        /// Numerator coefficients.
        feedforward: Vec<f64>,
        /// Denominator coefficients.
        feedback: Vec<f64>,
    },
}

impl NodeOptions {
    /// The node type these options build.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Destination => NodeKind::Destination,
            Self::Gain => NodeKind::Gain,
            Self::Delay { .. } => NodeKind::Delay,
            Self::ConstantSource => NodeKind::ConstantSource,
            Self::Oscillator { .. } => NodeKind::Oscillator,
            Self::IirFilter { .. } => NodeKind::IirFilter,
        }
    }
}

/// One recorded audio connection into a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// Upstream node.
    pub source: NodeId,
    /// Output index on the upstream node.
    pub output: usize,
    /// Input index on the receiving node.
    pub input: usize,
}

/// Everything recorded about one node.
pub(crate) struct NodeRecord {
    pub id: NodeId,
    pub options: NodeOptions,
    pub inputs: Vec<Connection>,
    pub params: Vec<AudioParam>,
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub renderer: Option<Box<dyn NodeRenderer>>,
}

impl NodeRecord {
    pub fn new(
        id: NodeId,
        options: NodeOptions,
        params: Vec<AudioParam>,
        renderer: Option<Box<dyn NodeRenderer>>,
    ) -> Self {
        Self {
            id,
            options,
            inputs: Vec::new(),
            params,
            start: None,
            stop: None,
            renderer,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.options.kind()
    }
}

/// All node records of one context, ordered by id.
#[derive(Default)]
pub(crate) struct GraphRecord {
    nodes: BTreeMap<NodeId, NodeRecord>,
}

impl GraphRecord {
    pub fn insert(&mut self, record: NodeRecord) {
        self.nodes.insert(record.id, record);
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Adds a connection unless the same one is already recorded.
    pub fn connect(&mut self, destination: NodeId, connection: Connection) {
        if let Some(record) = self.nodes.get_mut(&destination)
            && !record.inputs.contains(&connection)
        {
            record.inputs.push(connection);
        }
    }

    /// Removes every connection leaving `source`.
    pub fn disconnect(&mut self, source: NodeId) {
        for record in self.nodes.values_mut() {
            record.inputs.retain(|c| c.source != source);
        }
    }
}

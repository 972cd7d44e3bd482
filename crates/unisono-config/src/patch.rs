//! Patch file format and graph building.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use unisono_engine::{EngineProfile, OscillatorType};
use unisono_graph::{AudioNode, AudioParam, NodeOptions, OfflineAudioContext, Runtime};

use crate::error::ConfigError;
use crate::validation::validate_patch;

/// Node id that names the context output in connections.
pub const DESTINATION: &str = "destination";

/// An offline render described as data.
///
/// # TOML Format
///
/// ```toml
/// name = "echo"
/// sample_rate = 48000
/// length = 96000
/// channels = 2
///
/// [[nodes]]
/// id = "osc"
/// type = "oscillator"
/// waveform = "sawtooth"
/// start = 0.0
/// stop = 0.5
/// [nodes.params.frequency]
/// value = 220.0
///
/// [[nodes]]
/// id = "amp"
/// type = "gain"
/// [nodes.params.gain]
/// automation = [
///     { method = "set_value", value = 0.0, time = 0.0 },
///     { method = "linear_ramp", value = 0.8, time = 0.05 },
/// ]
///
/// [[connections]]
/// from = "osc"
/// to = "amp"
///
/// [[connections]]
/// from = "amp"
/// to = "destination"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patch {
    /// Name of the patch.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Render sample rate in Hz (defaults to 48000).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f32,

    /// Render length in frames.
    pub length: usize,

    /// Output channel count (defaults to 2).
    #[serde(default = "default_channels")]
    pub channels: usize,

    /// Nodes in creation order.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    /// Audio connections.
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

fn default_sample_rate() -> f32 {
    48000.0
}

fn default_channels() -> usize {
    2
}

/// One node of a patch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    /// Name used by connections.
    pub id: String,

    /// Node type and its construction options.
    #[serde(flatten)]
    pub spec: NodeSpec,

    /// Parameter values and automation, by parameter name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, ParamConfig>,

    /// Source start time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,

    /// Source stop time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<f64>,
}

impl NodeConfig {
    /// A node with no parameters and no schedule.
    pub fn new(id: impl Into<String>, spec: NodeSpec) -> Self {
        Self {
            id: id.into(),
            spec,
            params: BTreeMap::new(),
            start: None,
            stop: None,
        }
    }

    /// Sets a parameter's initial value.
    pub fn with_value(mut self, param: impl Into<String>, value: f32) -> Self {
        self.params.entry(param.into()).or_default().value = Some(value);
        self
    }

    /// Appends an automation event to a parameter.
    pub fn with_automation(mut self, param: impl Into<String>, event: AutomationConfig) -> Self {
        self.params
            .entry(param.into())
            .or_default()
            .automation
            .push(event);
        self
    }

    /// Schedules a source.
    pub fn with_schedule(mut self, start: f64, stop: Option<f64>) -> Self {
        self.start = Some(start);
        self.stop = stop;
        self
    }
}

/// Node type with its construction options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeSpec {
    /// Gain node.
    Gain,
    /// Delay node.
    Delay {
        /// Longest delay in seconds (defaults to 1).
        #[serde(default = "default_max_delay_time")]
        max_delay_time: f64,
    },
    /// Constant source.
    ConstantSource,
    /// Oscillator.
    Oscillator {
        /// Waveform (defaults to sine).
        #[serde(default)]
        waveform: OscillatorType,
    },
    /// General IIR filter.
    IirFilter {
        /// Numerator coefficients.
        feedforward: Vec<f64>,
        /// Denominator coefficients.
        feedback: Vec<f64>,
    },
}

fn default_max_delay_time() -> f64 {
    1.0
}

impl NodeSpec {
    /// Type name as written in patch files.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Gain => "gain",
            Self::Delay { .. } => "delay",
            Self::ConstantSource => "constant_source",
            Self::Oscillator { .. } => "oscillator",
            Self::IirFilter { .. } => "iir_filter",
        }
    }

    /// Parameter names nodes of this type have.
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            Self::Gain => &["gain"],
            Self::Delay { .. } => &["delayTime"],
            Self::ConstantSource => &["offset"],
            Self::Oscillator { .. } => &["frequency", "detune"],
            Self::IirFilter { .. } => &[],
        }
    }

    /// Returns `true` for types that take `start`/`stop`.
    pub fn is_source(&self) -> bool {
        matches!(self, Self::ConstantSource | Self::Oscillator { .. })
    }
}

impl From<&NodeSpec> for NodeOptions {
    fn from(spec: &NodeSpec) -> Self {
        match spec {
            NodeSpec::Gain => NodeOptions::Gain,
            NodeSpec::Delay { max_delay_time } => NodeOptions::Delay {
                max_delay_time: *max_delay_time,
            },
            NodeSpec::ConstantSource => NodeOptions::ConstantSource,
            NodeSpec::Oscillator { waveform } => NodeOptions::Oscillator {
                waveform: *waveform,
            },
            NodeSpec::IirFilter {
                feedforward,
                feedback,
            } => NodeOptions::IirFilter {
                feedforward: feedforward.clone(),
                feedback: feedback.clone(),
            },
        }
    }
}

/// Initial value and automation of one parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParamConfig {
    /// Value set before any automation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f32>,

    /// Automation events in call order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub automation: Vec<AutomationConfig>,
}

/// One automation call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AutomationConfig {
    /// `set_value_at_time`
    SetValue {
        /// Value.
        value: f32,
        /// Start time.
        time: f64,
    },
    /// `linear_ramp_to_value_at_time`
    LinearRamp {
        /// Value reached at `time`.
        value: f32,
        /// End time.
        time: f64,
    },
    /// `exponential_ramp_to_value_at_time`
    ExponentialRamp {
        /// Value reached at `time`.
        value: f32,
        /// End time.
        time: f64,
    },
    /// `set_target_at_time`
    SetTarget {
        /// Value approached.
        target: f32,
        /// Start time.
        time: f64,
        /// Time constant in seconds.
        time_constant: f64,
    },
    /// `set_value_curve_at_time`
    SetValueCurve {
        /// Curve points.
        values: Vec<f32>,
        /// Start time.
        time: f64,
        /// Duration in seconds.
        duration: f64,
    },
    /// `cancel_scheduled_values`
    CancelScheduledValues {
        /// Cancel time.
        time: f64,
    },
    /// `cancel_and_hold_at_time`
    CancelAndHold {
        /// Cancel time.
        time: f64,
    },
}

impl AutomationConfig {
    /// Time argument of the call.
    pub fn time(&self) -> f64 {
        match self {
            Self::SetValue { time, .. }
            | Self::LinearRamp { time, .. }
            | Self::ExponentialRamp { time, .. }
            | Self::SetTarget { time, .. }
            | Self::SetValueCurve { time, .. }
            | Self::CancelScheduledValues { time }
            | Self::CancelAndHold { time } => *time,
        }
    }

    /// Issues the call on `param`.
    pub fn apply(&self, param: &AudioParam) -> unisono_core::Result<()> {
        let scheduled = match self {
            Self::SetValue { value, time } => param.set_value_at_time(*value, *time),
            Self::LinearRamp { value, time } => param.linear_ramp_to_value_at_time(*value, *time),
            Self::ExponentialRamp { value, time } => {
                param.exponential_ramp_to_value_at_time(*value, *time)
            }
            Self::SetTarget {
                target,
                time,
                time_constant,
            } => param.set_target_at_time(*target, *time, *time_constant),
            Self::SetValueCurve {
                values,
                time,
                duration,
            } => param.set_value_curve_at_time(values, *time, *duration),
            Self::CancelScheduledValues { time } => param.cancel_scheduled_values(*time),
            Self::CancelAndHold { time } => param.cancel_and_hold_at_time(*time),
        };
        scheduled.map(|_| ())
    }
}

/// One audio connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    /// Upstream node id.
    pub from: String,
    /// Downstream node id, or [`DESTINATION`].
    pub to: String,
    /// Output index on `from`.
    #[serde(default)]
    pub output: usize,
    /// Input index on `to`.
    #[serde(default)]
    pub input: usize,
}

impl ConnectionConfig {
    /// A connection from output 0 to input 0.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            output: 0,
            input: 0,
        }
    }
}

/// A patch built into an offline context, ready to render.
#[derive(Debug)]
pub struct BuiltPatch {
    /// The context holding the recorded graph.
    pub context: OfflineAudioContext,
    /// Built nodes by patch id.
    pub nodes: BTreeMap<String, AudioNode>,
}

impl Patch {
    /// Create an empty patch.
    pub fn new(name: impl Into<String>, length: usize) -> Self {
        Self {
            name: name.into(),
            description: None,
            sample_rate: default_sample_rate(),
            length,
            channels: default_channels(),
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Set the sample rate.
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the channel count.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    /// Add a node.
    pub fn with_node(mut self, node: NodeConfig) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add a connection.
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connections.push(connection);
        self
    }

    /// Load a patch from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let patch: Patch = toml::from_str(&content)?;
        tracing::debug!("patch: loaded '{}' from {}", patch.name, path.display());
        Ok(patch)
    }

    /// Load a patch from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the patch to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the patch to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Validates the patch and builds it into a new offline context.
    ///
    /// Nodes are created in file order, then parameter values and automation
    /// are applied, then sources are scheduled, then connections are made.
    pub fn build(&self, runtime: &Runtime, profile: EngineProfile) -> Result<BuiltPatch, ConfigError> {
        validate_patch(self)?;
        let context =
            OfflineAudioContext::new(runtime, self.channels, self.length, self.sample_rate, profile)?;

        let mut nodes = BTreeMap::new();
        for config in &self.nodes {
            let node = context.create_node(NodeOptions::from(&config.spec))?;
            for (name, param_config) in &config.params {
                let Some(param) = node.param(name) else {
                    continue;
                };
                if let Some(value) = param_config.value {
                    param.set_value(value)?;
                }
                for event in &param_config.automation {
                    event.apply(&param)?;
                }
            }
            if let Some(start) = config.start {
                node.start(start)?;
                if let Some(stop) = config.stop {
                    node.stop(stop)?;
                }
            }
            nodes.insert(config.id.clone(), node);
        }

        let destination = context.destination();
        for connection in &self.connections {
            let from = nodes.get(&connection.from);
            let to = if connection.to == DESTINATION {
                Some(&*destination)
            } else {
                nodes.get(&connection.to)
            };
            if let (Some(from), Some(to)) = (from, to) {
                from.connect(to, connection.output, connection.input)?;
            }
        }

        tracing::debug!(
            "patch: built '{}' with {} nodes and {} connections",
            self.name,
            nodes.len(),
            self.connections.len()
        );
        Ok(BuiltPatch { context, nodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ECHO: &str = r#"
name = "echo"
sample_rate = 8000
length = 800
channels = 1

[[nodes]]
id = "src"
type = "constant_source"
start = 0.0
stop = 0.016

[[nodes]]
id = "mix"
type = "gain"

[[nodes]]
id = "delay"
type = "delay"
max_delay_time = 1
[nodes.params.delayTime]
value = 0.05

[[nodes]]
id = "fb"
type = "gain"
[nodes.params.gain]
value = 0.5

[[connections]]
from = "src"
to = "mix"

[[connections]]
from = "mix"
to = "delay"

[[connections]]
from = "delay"
to = "fb"

[[connections]]
from = "fb"
to = "mix"

[[connections]]
from = "mix"
to = "destination"
"#;

    #[test]
    fn test_parse_patch() {
        let patch = Patch::from_toml(ECHO).unwrap();
        assert_eq!(patch.name, "echo");
        assert!((patch.sample_rate - 8000.0).abs() < f32::EPSILON);
        assert_eq!(patch.nodes.len(), 4);
        assert_eq!(
            patch.node("delay").unwrap().spec,
            NodeSpec::Delay {
                max_delay_time: 1.0
            }
        );
        assert_eq!(patch.node("fb").unwrap().params["gain"].value, Some(0.5));
        assert_eq!(patch.connections[4].to, DESTINATION);
    }

    #[test]
    fn test_defaults() {
        let patch = Patch::from_toml(
            r#"
name = "osc"
length = 128

[[nodes]]
id = "osc"
type = "oscillator"
"#,
        )
        .unwrap();
        assert_eq!(patch.channels, 2);
        assert!((patch.sample_rate - 48000.0).abs() < f32::EPSILON);
        assert_eq!(
            patch.nodes[0].spec,
            NodeSpec::Oscillator {
                waveform: OscillatorType::Sine
            }
        );
    }

    #[test]
    fn test_automation_methods_parse() {
        let patch = Patch::from_toml(
            r#"
name = "auto"
length = 128

[[nodes]]
id = "amp"
type = "gain"
[nodes.params.gain]
automation = [
    { method = "set_value", value = 0.0, time = 0.0 },
    { method = "exponential_ramp", value = 1.0, time = 0.5 },
    { method = "set_value_curve", values = [0.0, 1.0], time = 0.6, duration = 0.1 },
    { method = "cancel_and_hold", time = 0.65 },
]
"#,
        )
        .unwrap();
        let automation = &patch.nodes[0].params["gain"].automation;
        assert_eq!(automation.len(), 4);
        assert!(matches!(automation[3], AutomationConfig::CancelAndHold { .. }));
        assert!((automation[2].time() - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_build_and_render() {
        let patch = Patch::from_toml(ECHO).unwrap();
        let runtime = Runtime::new();
        let built = patch.build(&runtime, EngineProfile::legacy()).unwrap();
        assert_eq!(built.nodes.len(), 4);
        assert_eq!(built.context.number_of_nodes(), 5);

        let buffer = pollster::block_on(built.context.start_rendering()).unwrap();
        assert_eq!(buffer.length(), 800);
        let data = buffer.get_channel_data(0).unwrap();
        assert!((data[10] - 1.0).abs() < 1e-6);
        assert!(data[300].abs() < 1e-6);
        assert!((data[410] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_builder_round_trips_through_toml() {
        let patch = Patch::new("built", 256)
            .with_sample_rate(8000.0)
            .with_channels(1)
            .with_node(
                NodeConfig::new("src", NodeSpec::ConstantSource)
                    .with_value("offset", 0.25)
                    .with_automation(
                        "offset",
                        AutomationConfig::LinearRamp {
                            value: 1.0,
                            time: 0.01,
                        },
                    )
                    .with_schedule(0.0, None),
            )
            .with_connection(ConnectionConfig::new("src", DESTINATION));
        let parsed = Patch::from_toml(&patch.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, patch);
    }
}

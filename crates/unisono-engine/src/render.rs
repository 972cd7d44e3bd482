//! Per-quantum block rendering.
//!
//! The engine pulls every node once per render quantum, depth first, starting
//! at the destination. Delay nodes are split in two halves:
//!
//! - the **read** half runs when the delay is pulled and produces output from
//!   samples written in earlier quanta, without pulling the delay's inputs;
//! - the **write** half runs after every node has been pulled, and stores the
//!   delay's mixed input.
//!
//! Feedback through a delay is therefore well defined. A cycle with no delay
//! on it is detected when the pull reaches a node that is still in progress;
//! that node contributes the output it produced in the previous quantum.

use std::f64::consts::TAU;

use unisono_core::{
    AudioBuffer, AutomationEvent, AutomationEventList, IirFilter, RENDER_QUANTUM_SIZE,
    SampleProcessor,
};

use crate::node::{NativeNodeKind, OscillatorType};

/// Automation state of one native parameter.
pub(crate) struct ParamState {
    pub name: &'static str,
    pub default_value: f32,
    pub min_value: f32,
    pub max_value: f32,
    pub events: AutomationEventList,
    pub calls: Vec<AutomationEvent>,
}

impl ParamState {
    pub fn new(name: &'static str, default_value: f32, min_value: f32, max_value: f32) -> Self {
        Self {
            name,
            default_value,
            min_value,
            max_value,
            events: AutomationEventList::new(default_value),
            calls: Vec::new(),
        }
    }

    pub fn value_at(&self, time: f64) -> f32 {
        self.events
            .value_at(time)
            .clamp(self.min_value, self.max_value)
    }
}

/// Start/stop times of a scheduled source.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Schedule {
    pub start: Option<f64>,
    pub stop: Option<f64>,
}

impl Schedule {
    fn is_active(&self, time: f64) -> bool {
        self.start.is_some_and(|start| time >= start) && self.stop.is_none_or(|stop| time < stop)
    }
}

/// Circular multi-channel delay memory.
pub(crate) struct DelayLine {
    ring: Vec<Vec<f32>>,
    capacity: usize,
    write_pos: usize,
}

impl DelayLine {
    pub fn new(max_delay_time: f64, sample_rate: f32) -> Self {
        let capacity =
            (max_delay_time * f64::from(sample_rate)).ceil() as usize + 2 * RENDER_QUANTUM_SIZE;
        Self {
            ring: Vec::new(),
            capacity,
            write_pos: 0,
        }
    }

    fn read(&self, delay_times: &[f32], sample_rate: f32) -> AudioBuffer {
        let mut output = AudioBuffer::new(self.ring.len().max(1), RENDER_QUANTUM_SIZE, sample_rate);
        for (ring, out) in self.ring.iter().zip(output.channels_mut()) {
            for (frame, sample) in out.iter_mut().enumerate() {
                let delay = (f64::from(delay_times[frame]) * f64::from(sample_rate)).round() as usize;
                let delay = delay.clamp(RENDER_QUANTUM_SIZE, self.capacity - RENDER_QUANTUM_SIZE);
                let index = (self.write_pos + self.capacity + frame - delay) % self.capacity;
                *sample = ring[index];
            }
        }
        output
    }

    fn write(&mut self, input: &AudioBuffer) {
        let channels = input.number_of_channels();
        if self.ring.len() < channels {
            self.ring.resize_with(channels, || vec![0.0; self.capacity]);
        }
        for (channel, ring) in self.ring.iter_mut().enumerate() {
            for frame in 0..RENDER_QUANTUM_SIZE {
                let sample = input
                    .channels()
                    .get(channel)
                    .map_or(0.0, |samples| samples[frame]);
                ring[(self.write_pos + frame) % self.capacity] = sample;
            }
        }
        self.write_pos = (self.write_pos + RENDER_QUANTUM_SIZE) % self.capacity;
    }
}

/// The sample-producing part of a node.
pub(crate) enum Processor {
    Destination,
    Gain,
    Delay(DelayLine),
    ConstantSource(Schedule),
    Oscillator {
        schedule: Schedule,
        waveform: OscillatorType,
        phase: f64,
    },
    IirFilter(IirFilter),
    Script(Box<dyn SampleProcessor>),
}

impl Processor {
    fn process(
        &mut self,
        input: &AudioBuffer,
        params: &[Vec<f32>],
        start_time: f64,
        sample_rate: f32,
    ) -> AudioBuffer {
        let frame_time = |frame: usize| start_time + frame as f64 / f64::from(sample_rate);
        match self {
            Self::Destination => input.clone(),
            Self::Gain => {
                let mut output = input.clone();
                for channel in output.channels_mut() {
                    for (sample, gain) in channel.iter_mut().zip(&params[0]) {
                        *sample *= gain;
                    }
                }
                output
            }
            Self::ConstantSource(schedule) => {
                let mut output = AudioBuffer::new(1, RENDER_QUANTUM_SIZE, sample_rate);
                for (frame, sample) in output.channels_mut()[0].iter_mut().enumerate() {
                    if schedule.is_active(frame_time(frame)) {
                        *sample = params[0][frame];
                    }
                }
                output
            }
            Self::Oscillator {
                schedule,
                waveform,
                phase,
            } => {
                let mut output = AudioBuffer::new(1, RENDER_QUANTUM_SIZE, sample_rate);
                for (frame, sample) in output.channels_mut()[0].iter_mut().enumerate() {
                    if !schedule.is_active(frame_time(frame)) {
                        continue;
                    }
                    let frequency = f64::from(params[0][frame])
                        * 2f64.powf(f64::from(params[1][frame]) / 1200.0);
                    *sample = waveform.sample(*phase) as f32;
                    *phase = (*phase + frequency / f64::from(sample_rate)).rem_euclid(1.0);
                }
                output
            }
            Self::IirFilter(filter) => {
                let mut output = AudioBuffer::new(
                    input.number_of_channels(),
                    RENDER_QUANTUM_SIZE,
                    sample_rate,
                );
                SampleProcessor::process(filter, input.channels(), output.channels_mut());
                output
            }
            Self::Script(processor) => {
                let channels = processor.output_channel_count(input.number_of_channels());
                let mut output = AudioBuffer::new(channels, RENDER_QUANTUM_SIZE, sample_rate);
                processor.process(input.channels(), output.channels_mut());
                output
            }
            // Delays produce output in the read half.
            Self::Delay(_) => input.clone(),
        }
    }
}

impl OscillatorType {
    fn sample(self, phase: f64) -> f64 {
        match self {
            Self::Sine => (TAU * phase).sin(),
            Self::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::Sawtooth => 2.0 * (phase + 0.5).fract() - 1.0,
            Self::Triangle => 1.0 - 4.0 * ((phase + 0.25).fract() - 0.5).abs(),
        }
    }
}

/// One node of the engine graph.
pub(crate) struct NodeState {
    pub kind: NativeNodeKind,
    pub processor: Processor,
    pub params: Vec<ParamState>,
    /// Per input: the (source node, source output) pairs feeding it.
    pub inputs: Vec<Vec<(usize, usize)>>,
    pub number_of_outputs: usize,
    /// Output of the most recent quantum.
    pub output: AudioBuffer,
}

impl NodeState {
    pub fn new(
        kind: NativeNodeKind,
        processor: Processor,
        params: Vec<ParamState>,
        number_of_inputs: usize,
        sample_rate: f32,
    ) -> Self {
        Self {
            kind,
            processor,
            params,
            inputs: vec![Vec::new(); number_of_inputs],
            number_of_outputs: 1,
            output: AudioBuffer::new(1, RENDER_QUANTUM_SIZE, sample_rate),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// All nodes of one context plus its render clock.
pub(crate) struct EngineGraph {
    pub nodes: Vec<NodeState>,
    pub sample_rate: f32,
    pub channels: usize,
    pub frame: u64,
}

impl EngineGraph {
    pub fn new(sample_rate: f32, channels: usize) -> Self {
        Self {
            nodes: Vec::new(),
            sample_rate,
            channels,
            frame: 0,
        }
    }

    pub fn current_time(&self) -> f64 {
        self.frame as f64 / f64::from(self.sample_rate)
    }

    pub fn add(&mut self, node: NodeState) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Renders one quantum and returns the destination's output.
    pub fn render_quantum(&mut self) -> AudioBuffer {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        for index in 0..self.nodes.len() {
            self.pull(index, &mut marks);
        }

        let delays: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| matches!(self.nodes[i].processor, Processor::Delay(_)))
            .collect();
        for index in delays {
            for source in self.sources(index) {
                self.pull(source, &mut marks);
            }
            let input = self.mix_inputs(index);
            if let Processor::Delay(line) = &mut self.nodes[index].processor {
                line.write(&input);
            }
        }

        self.frame += RENDER_QUANTUM_SIZE as u64;
        self.nodes
            .first()
            .map(|destination| destination.output.clone())
            .unwrap_or_else(|| AudioBuffer::new(self.channels, RENDER_QUANTUM_SIZE, self.sample_rate))
    }

    fn pull(&mut self, index: usize, marks: &mut [Mark]) {
        if marks[index] != Mark::Unvisited {
            return;
        }
        marks[index] = Mark::InProgress;

        let params: Vec<Vec<f32>> = (0..self.nodes[index].params.len())
            .map(|slot| self.param_values(index, slot))
            .collect();

        if let Processor::Delay(line) = &self.nodes[index].processor {
            let output = line.read(&params[0], self.sample_rate);
            self.nodes[index].output = output;
            marks[index] = Mark::Done;
            return;
        }

        for source in self.sources(index) {
            self.pull(source, marks);
        }
        let input = self.mix_inputs(index);
        let start_time = self.current_time();
        let sample_rate = self.sample_rate;
        let node = &mut self.nodes[index];
        node.output = node
            .processor
            .process(&input, &params, start_time, sample_rate);
        marks[index] = Mark::Done;
    }

    fn sources(&self, index: usize) -> Vec<usize> {
        self.nodes[index]
            .inputs
            .iter()
            .flatten()
            .map(|&(source, _)| source)
            .collect()
    }

    fn mix_inputs(&self, index: usize) -> AudioBuffer {
        let node = &self.nodes[index];
        let connections: Vec<&AudioBuffer> = node
            .inputs
            .iter()
            .flatten()
            .map(|&(source, _)| &self.nodes[source].output)
            .collect();

        let channels = if node.kind == NativeNodeKind::Destination {
            self.channels
        } else {
            connections
                .iter()
                .map(|buffer| buffer.number_of_channels())
                .max()
                .unwrap_or(1)
        };

        let mut mixed = AudioBuffer::new(channels, RENDER_QUANTUM_SIZE, self.sample_rate);
        for buffer in connections {
            mixed.accumulate_from(buffer);
        }
        mixed
    }

    fn param_values(&self, index: usize, slot: usize) -> Vec<f32> {
        let param = &self.nodes[index].params[slot];
        let sample_rate = f64::from(self.sample_rate);
        (0..RENDER_QUANTUM_SIZE)
            .map(|frame| param.value_at((self.frame + frame as u64) as f64 / sample_rate))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gain_node(sample_rate: f32) -> NodeState {
        NodeState::new(
            NativeNodeKind::Gain,
            Processor::Gain,
            vec![ParamState::new("gain", 1.0, f32::MIN, f32::MAX)],
            1,
            sample_rate,
        )
    }

    fn constant_node(sample_rate: f32) -> NodeState {
        NodeState::new(
            NativeNodeKind::ConstantSource,
            Processor::ConstantSource(Schedule {
                start: Some(0.0),
                stop: None,
            }),
            vec![ParamState::new("offset", 1.0, f32::MIN, f32::MAX)],
            0,
            sample_rate,
        )
    }

    fn destination(sample_rate: f32) -> NodeState {
        NodeState::new(
            NativeNodeKind::Destination,
            Processor::Destination,
            Vec::new(),
            1,
            sample_rate,
        )
    }

    #[test]
    fn test_constant_through_gain() {
        let mut graph = EngineGraph::new(48000.0, 1);
        let dest = graph.add(destination(48000.0));
        let source = graph.add(constant_node(48000.0));
        let gain = graph.add(gain_node(48000.0));
        graph.nodes[gain].params[0].events.add(AutomationEvent::SetValue {
            value: 0.5,
            start_time: 0.0,
        });
        graph.nodes[gain].inputs[0].push((source, 0));
        graph.nodes[dest].inputs[0].push((gain, 0));

        let out = graph.render_quantum();
        assert!(out.channels()[0].iter().all(|&s| s == 0.5));
        assert_eq!(graph.frame, RENDER_QUANTUM_SIZE as u64);
    }

    #[test]
    fn test_delay_feedback_cycle() {
        let sr = 1000.0;
        let mut graph = EngineGraph::new(sr, 1);
        let dest = graph.add(destination(sr));
        let source = graph.add(NodeState::new(
            NativeNodeKind::ConstantSource,
            Processor::ConstantSource(Schedule {
                start: Some(0.0),
                stop: Some(RENDER_QUANTUM_SIZE as f64 / f64::from(sr)),
            }),
            vec![ParamState::new("offset", 1.0, f32::MIN, f32::MAX)],
            0,
            sr,
        ));
        let mix = graph.add(gain_node(sr));
        let delay = graph.add(NodeState::new(
            NativeNodeKind::Delay,
            Processor::Delay(DelayLine::new(1.0, sr)),
            vec![ParamState::new("delayTime", 0.0, 0.0, 1.0)],
            1,
            sr,
        ));

        graph.nodes[mix].inputs[0].push((source, 0));
        graph.nodes[mix].inputs[0].push((delay, 0));
        graph.nodes[delay].inputs[0].push((mix, 0));
        graph.nodes[dest].inputs[0].push((mix, 0));

        let first = graph.render_quantum();
        let second = graph.render_quantum();
        let third = graph.render_quantum();
        assert!(first.channels()[0].iter().all(|&s| s == 1.0));
        // The source stopped; the delayed copy circulates once per quantum.
        assert!(second.channels()[0].iter().all(|&s| s == 1.0));
        assert!(third.channels()[0].iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_cycle_without_delay_reads_stale_output() {
        let mut graph = EngineGraph::new(48000.0, 1);
        let dest = graph.add(destination(48000.0));
        let a = graph.add(gain_node(48000.0));
        let b = graph.add(gain_node(48000.0));
        graph.nodes[a].inputs[0].push((b, 0));
        graph.nodes[b].inputs[0].push((a, 0));
        graph.nodes[dest].inputs[0].push((a, 0));

        let out = graph.render_quantum();
        assert!(out.channels()[0].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_oscillator_waveforms_are_bounded() {
        for waveform in [
            OscillatorType::Sine,
            OscillatorType::Square,
            OscillatorType::Sawtooth,
            OscillatorType::Triangle,
        ] {
            for i in 0..100 {
                let s = waveform.sample(f64::from(i) / 100.0);
                assert!((-1.0..=1.0).contains(&s), "{waveform:?} out of range: {s}");
            }
        }
    }
}

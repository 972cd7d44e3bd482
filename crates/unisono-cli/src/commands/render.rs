//! Offline patch rendering command.

use anyhow::Context;
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use unisono_config::{Patch, resolve_engine};
use unisono_graph::Runtime;

use crate::wav::write_buffer;

/// Render a patch file offline to WAV.
#[derive(Args)]
pub struct RenderArgs {
    /// Patch file (TOML)
    #[arg(value_name = "PATCH")]
    pub patch: PathBuf,

    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Built-in engine name or engine profile file
    #[arg(short, long, default_value = "reference")]
    pub engine: String,

    /// Output bit depth
    #[arg(long, value_enum, default_value = "32")]
    pub bit_depth: BitDepth,
}

/// WAV sample formats the CLI writes.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum BitDepth {
    /// 16-bit PCM
    #[value(name = "16")]
    Pcm16,
    /// 24-bit PCM
    #[value(name = "24")]
    Pcm24,
    /// 32-bit float
    #[default]
    #[value(name = "32")]
    Float32,
}

impl BitDepth {
    fn bits(self) -> u16 {
        match self {
            Self::Pcm16 => 16,
            Self::Pcm24 => 24,
            Self::Float32 => 32,
        }
    }
}

/// Run the render command.
pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let patch = Patch::load(&args.patch)?;
    let profile = resolve_engine(&args.engine)?;
    let engine = profile.name.clone();

    let runtime = Runtime::new();
    let built = patch.build(&runtime, profile)?;
    let buffer = pollster::block_on(built.context.start_rendering())
        .with_context(|| format!("rendering '{}' on {engine}", patch.name))?;

    write_buffer(&args.output, &buffer, args.bit_depth.bits())
        .with_context(|| format!("writing {}", args.output.display()))?;

    let peak = buffer
        .channels()
        .iter()
        .flatten()
        .fold(0.0f32, |peak, &s| peak.max(s.abs()));
    println!("Patch:       {}", patch.name);
    println!("Engine:      {engine}");
    println!("Nodes:       {}", built.nodes.len());
    println!(
        "Rendered:    {} frames x {} channels at {} Hz",
        buffer.length(),
        buffer.number_of_channels(),
        buffer.sample_rate()
    );
    println!("Peak:        {peak:.4}");
    println!("Output:      {}", args.output.display());
    Ok(())
}

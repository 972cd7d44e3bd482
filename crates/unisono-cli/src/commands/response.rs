//! IIR frequency response command.

use clap::Args;
use unisono_config::resolve_engine;
use unisono_graph::{AudioContext, Runtime};

/// Print the frequency response of an IIR filter.
#[derive(Args)]
pub struct ResponseArgs {
    /// Feedforward (numerator) coefficients, comma separated
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub feedforward: Vec<f64>,

    /// Feedback (denominator) coefficients, comma separated
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub feedback: Vec<f64>,

    /// Sample rate in Hz
    #[arg(long, default_value = "48000")]
    pub sample_rate: f32,

    /// Number of log-spaced frequencies from 20 Hz to Nyquist
    #[arg(long, default_value = "16")]
    pub points: usize,

    /// Built-in engine name or engine profile file
    #[arg(short, long, default_value = "reference")]
    pub engine: String,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// `points` frequencies spaced logarithmically from 20 Hz to `nyquist`.
pub fn log_frequencies(nyquist: f32, points: usize) -> Vec<f32> {
    const LOW: f32 = 20.0;
    match points {
        0 => Vec::new(),
        1 => vec![LOW],
        _ => {
            let ratio = nyquist / LOW;
            (0..points)
                .map(|i| LOW * ratio.powf(i as f32 / (points - 1) as f32))
                .collect()
        }
    }
}

/// Run the response command.
pub fn run(args: ResponseArgs) -> anyhow::Result<()> {
    let profile = resolve_engine(&args.engine)?;
    let runtime = Runtime::new();
    let context = AudioContext::new(&runtime, args.sample_rate, profile)?;
    let filter = context.create_iir_filter(&args.feedforward, &args.feedback)?;

    let frequencies = log_frequencies(args.sample_rate / 2.0, args.points);
    let mut magnitude = vec![0.0; frequencies.len()];
    let mut phase = vec![0.0; frequencies.len()];
    filter.get_frequency_response(&frequencies, &mut magnitude, &mut phase)?;

    if args.json {
        let points: Vec<_> = frequencies
            .iter()
            .zip(&magnitude)
            .zip(&phase)
            .map(|((f, m), p)| {
                serde_json::json!({
                    "frequency_hz": f,
                    "magnitude": m,
                    "magnitude_db": 20.0 * m.log10(),
                    "phase": p,
                })
            })
            .collect();
        let report = serde_json::json!({
            "engine": context.native().profile().name,
            "backend": format!("{:?}", filter.backend()).to_lowercase(),
            "sample_rate": args.sample_rate,
            "feedforward": filter.coefficients().feedforward(),
            "feedback": filter.coefficients().feedback(),
            "response": points,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "IIR response ({:?} backend on {}, {} Hz)",
        filter.backend(),
        context.native().profile().name,
        args.sample_rate
    );
    println!("{:>12} {:>12} {:>10} {:>10}", "freq (Hz)", "magnitude", "dB", "phase");
    for ((f, m), p) in frequencies.iter().zip(&magnitude).zip(&phase) {
        println!("{f:>12.1} {m:>12.6} {:>10.2} {p:>10.4}", 20.0 * m.log10());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_frequencies_span() {
        let freqs = log_frequencies(24000.0, 4);
        assert_eq!(freqs.len(), 4);
        assert!((freqs[0] - 20.0).abs() < 1e-3);
        assert!((freqs[3] - 24000.0).abs() < 0.5);
        assert!(freqs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(log_frequencies(24000.0, 1), [20.0]);
        assert!(log_frequencies(24000.0, 0).is_empty());
    }
}

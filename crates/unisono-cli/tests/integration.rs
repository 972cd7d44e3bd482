//! Integration tests for unisono-cli.
//!
//! Tests run the `unisono` binary end to end: patch files in, WAV files and
//! reports out.

use std::process::Command;
use tempfile::TempDir;

/// Helper to get the path to the `unisono` binary built by cargo.
fn unisono_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_unisono"))
}

const ECHO_PATCH: &str = r#"
name = "echo"
sample_rate = 8000
length = 1000
channels = 2

[[nodes]]
id = "src"
type = "constant_source"
start = 0.0
stop = 0.016

[[nodes]]
id = "mix"
type = "gain"
[nodes.params.gain]
value = 0.5

[[nodes]]
id = "delay"
type = "delay"
[nodes.params.delayTime]
value = 0.05

[[connections]]
from = "src"
to = "mix"

[[connections]]
from = "mix"
to = "delay"

[[connections]]
from = "delay"
to = "mix"

[[connections]]
from = "mix"
to = "destination"
"#;

#[test]
fn cli_render_writes_wav_on_every_engine() {
    let dir = TempDir::new().unwrap();
    let patch = dir.path().join("echo.toml");
    std::fs::write(&patch, ECHO_PATCH).unwrap();

    for engine in ["reference", "legacy", "strict"] {
        let output = dir.path().join(format!("echo-{engine}.wav"));
        let result = unisono_bin()
            .arg("render")
            .arg(&patch)
            .arg(&output)
            .args(["--engine", engine])
            .output()
            .expect("failed to run unisono render");
        assert!(
            result.status.success(),
            "render on {engine} failed: {}",
            String::from_utf8_lossy(&result.stderr)
        );

        let stdout = String::from_utf8_lossy(&result.stdout);
        assert!(stdout.contains("1000 frames x 2 channels"), "got: {stdout}");

        let mut reader = hound::WavReader::open(&output).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 8000);
        let samples: Vec<f32> = reader.samples::<f32>().map(Result::unwrap).collect();
        assert_eq!(samples.len(), 2000);
        // frame 10: 0.5, frame 410: 0.25 after one trip around the loop
        assert!((samples[20] - 0.5).abs() < 1e-6);
        assert!((samples[820] - 0.25).abs() < 1e-6);
    }
}

#[test]
fn cli_render_16_bit() {
    let dir = TempDir::new().unwrap();
    let patch = dir.path().join("echo.toml");
    let output = dir.path().join("echo.wav");
    std::fs::write(&patch, ECHO_PATCH).unwrap();

    let result = unisono_bin()
        .arg("render")
        .arg(&patch)
        .arg(&output)
        .args(["--bit-depth", "16"])
        .output()
        .unwrap();
    assert!(result.status.success());
    let reader = hound::WavReader::open(&output).unwrap();
    assert_eq!(reader.spec().bits_per_sample, 16);
}

#[test]
fn cli_render_with_profile_file() {
    let dir = TempDir::new().unwrap();
    let patch = dir.path().join("echo.toml");
    let engine = dir.path().join("engine.toml");
    let output = dir.path().join("echo.wav");
    std::fs::write(&patch, ECHO_PATCH).unwrap();
    std::fs::write(
        &engine,
        "name = \"padded\"\npads_rendered_length = true\ncompletion = \"event\"\n",
    )
    .unwrap();

    let result = unisono_bin()
        .arg("render")
        .arg(&patch)
        .arg(&output)
        .arg("--engine")
        .arg(&engine)
        .output()
        .unwrap();
    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("padded"));
    assert!(stdout.contains("1000 frames"));
}

#[test]
fn cli_render_rejects_invalid_patch() {
    let dir = TempDir::new().unwrap();
    let patch = dir.path().join("bad.toml");
    std::fs::write(
        &patch,
        "name = \"bad\"\nlength = 128\n[[connections]]\nfrom = \"ghost\"\nto = \"destination\"\n",
    )
    .unwrap();

    let result = unisono_bin()
        .arg("render")
        .arg(&patch)
        .arg(dir.path().join("out.wav"))
        .output()
        .unwrap();
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("ghost"), "got: {stderr}");
}

#[test]
fn cli_render_unknown_engine() {
    let dir = TempDir::new().unwrap();
    let patch = dir.path().join("echo.toml");
    std::fs::write(&patch, ECHO_PATCH).unwrap();
    let result = unisono_bin()
        .arg("render")
        .arg(&patch)
        .arg(dir.path().join("out.wav"))
        .args(["--engine", "no-such-engine"])
        .output()
        .unwrap();
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("unknown engine"));
}

#[test]
fn cli_engines_lists_builtins() {
    let output = unisono_bin().arg("engines").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["reference", "legacy", "strict"] {
        assert!(stdout.contains(name), "should list '{name}'");
    }
    assert!(stdout.contains("native_cancel_and_hold"));
}

#[test]
fn cli_engines_json() {
    let output = unisono_bin().args(["engines", "--json"]).output().unwrap();
    assert!(output.status.success());
    let engines: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let engines = engines.as_array().unwrap();
    assert_eq!(engines.len(), 3);
    let legacy = engines.iter().find(|e| e["name"] == "legacy").unwrap();
    assert_eq!(legacy["native_iir_filter"], false);
    assert_eq!(legacy["event_completion"], true);
    assert_eq!(legacy["deferred_completion"], false);
}

#[test]
fn cli_response_agrees_across_engines() {
    let mut reports = Vec::new();
    for engine in ["reference", "legacy"] {
        let output = unisono_bin()
            .args([
                "response",
                "--feedforward=0.5,0.5",
                "--feedback=1,-0.2",
                "--sample-rate=8000",
                "--points=5",
                "--json",
                "--engine",
                engine,
            ])
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "{}",
            String::from_utf8_lossy(&output.stderr)
        );
        let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        reports.push(report);
    }
    assert_eq!(reports[0]["backend"], "native");
    assert_eq!(reports[1]["backend"], "faked");
    let native = reports[0]["response"].as_array().unwrap();
    let faked = reports[1]["response"].as_array().unwrap();
    assert_eq!(native.len(), 5);
    for (a, b) in native.iter().zip(faked) {
        let a = a["magnitude"].as_f64().unwrap();
        let b = b["magnitude"].as_f64().unwrap();
        assert!((a - b).abs() < 1e-5, "{a} vs {b}");
    }
}

#[test]
fn cli_response_invalid_coefficients() {
    let output = unisono_bin()
        .args(["response", "--feedforward=1", "--feedback=0,1"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("InvalidStateError"));
}

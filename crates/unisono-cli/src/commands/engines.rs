//! Engine listing command.

use clap::Args;
use unisono_engine::EngineProfile;
use unisono_graph::{Capabilities, Runtime};

/// List built-in engines and what probing finds in each.
#[derive(Args)]
pub struct EnginesArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

fn flags(capabilities: &Capabilities) -> [(&'static str, bool); 7] {
    [
        ("native_iir_filter", capabilities.native_iir_filter),
        ("native_cancel_and_hold", capabilities.native_cancel_and_hold),
        (
            "constructs_on_closed_context",
            capabilities.constructs_on_closed_context,
        ),
        ("checks_response_lengths", capabilities.checks_response_lengths),
        ("deferred_completion", capabilities.deferred_completion),
        ("event_completion", capabilities.event_completion),
        ("pads_rendered_length", capabilities.pads_rendered_length),
    ]
}

/// Run the engines command.
pub fn run(args: EnginesArgs) -> anyhow::Result<()> {
    let runtime = Runtime::new();
    let probed: Vec<_> = EngineProfile::builtins()
        .into_iter()
        .map(|profile| {
            let capabilities = runtime.capabilities(&profile);
            (profile.name, capabilities)
        })
        .collect();

    if args.json {
        let engines: Vec<_> = probed
            .iter()
            .map(|(name, capabilities)| {
                let mut entry = serde_json::Map::new();
                entry.insert("name".to_string(), serde_json::Value::from(name.as_str()));
                for (flag, value) in flags(capabilities) {
                    entry.insert(flag.to_string(), serde_json::Value::from(value));
                }
                serde_json::Value::Object(entry)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&engines)?);
        return Ok(());
    }

    println!("Built-in Engines");
    println!("================");
    for (name, capabilities) in &probed {
        println!();
        println!("{name}");
        for (flag, value) in flags(capabilities) {
            println!("  {flag:<30} {}", if value { "yes" } else { "no" });
        }
    }
    Ok(())
}

// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::env;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use the_relay::config::{load_config, validate_pipeline, Config, RuntimeBuilder};
use the_relay::errors::ConfigError;

/// Install the fmt subscriber. `RUST_LOG` wins over the config's filter.
fn init_tracing(config: &Config) {
    let fallback = config.logging.filter.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Input is JSON when it parses as JSON, a plain string otherwise.
fn parse_input(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <config.yaml|config.toml> [json-input]", args[0]);
        eprintln!("Example: {} configs/fan-out.yaml '[1, 2, 3]'", args[0]);
        eprintln!("Without input the pipeline serves its queues until Ctrl-C.");
        std::process::exit(1);
    }

    let config_file = &args[1];
    let config = load_config(config_file).with_context(|| format!("loading {}", config_file))?;
    init_tracing(&config);
    validate_pipeline(&config).map_err(ConfigError::Invalid)?;

    let pipeline = RuntimeBuilder::from_config(&config).await?;
    pipeline.start().await?;
    println!("🚀 The Relay: {} workers from {}", config.workers.len(), config_file);

    let Some(raw) = args.get(2) else {
        println!("⏳ Serving queues, press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        pipeline.stop();
        return Ok(());
    };

    let mut completions = pipeline.completions()?;
    let started = Instant::now();
    pipeline.call(parse_input(raw)).await?;

    let outcome = tokio::select! {
        outcome = completions.recv() => outcome,
        _ = tokio::signal::ctrl_c() => None,
    };
    pipeline.stop();

    match outcome {
        Some(Ok(payload)) => {
            println!("✅ {}", serde_json::to_string_pretty(&payload.value)?);
            println!("⏱️  {:?}", started.elapsed());
            Ok(())
        }
        Some(Err(error)) => bail!("pipeline failed: {}", error),
        None => bail!("interrupted before the pipeline completed"),
    }
}

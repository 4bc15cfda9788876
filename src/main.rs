//! llmgateway-core - operator tooling for the routing core
//!
//! Dry-run provider selection against the built-in catalog and heal JSON
//! from stdin.

#![allow(missing_docs)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use llmgateway_core::core::catalog::AllowedProviders;
use llmgateway_core::core::metrics::{
    InMemoryMetricsStore, MetricsKey, MetricsSnapshot, ProviderMetrics,
};
use llmgateway_core::core::router::{ProviderSelector, SelectionConfig};
use llmgateway_core::utils::init_tracing;
use llmgateway_core::{Config, ProviderId, RoutingCore, heal_json_response};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "llmgateway-core", version, about = "LLM gateway routing core tools")]
struct Cli {
    /// YAML configuration file; defaults and LLMGATEWAY_* variables otherwise
    #[arg(short, long, env = "LLMGATEWAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show which provider would serve a model, with per-provider scores
    Select {
        /// Catalog id, upstream name or `provider/model`
        model: String,
        /// Restrict to these providers (comma separated)
        #[arg(long, value_delimiter = ',')]
        allow: Vec<String>,
        /// JSON file with provider metrics: [{"model_id", "provider_id", "uptime", ...}]
        #[arg(long)]
        metrics: Option<PathBuf>,
        /// Seed for reproducible exploration
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Repair JSON read from stdin
    Heal,
}

#[derive(serde::Deserialize)]
struct MetricsRow {
    model_id: String,
    provider_id: ProviderId,
    #[serde(flatten)]
    metrics: ProviderMetrics,
}

async fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .await
            .with_context(|| format!("loading {}", path.display())),
        None => Config::from_env().context("loading configuration from environment"),
    }
}

fn load_metrics(path: &Path) -> Result<MetricsSnapshot> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let rows: Vec<MetricsRow> = serde_json::from_str(&text).context("parsing metrics file")?;
    Ok(rows
        .into_iter()
        .map(|r| (MetricsKey::new(r.model_id, r.provider_id), r.metrics))
        .collect())
}

async fn select(
    config: Config,
    model: &str,
    allow: &[String],
    metrics: Option<&Path>,
    seed: Option<u64>,
) -> Result<()> {
    let window = config.router.metrics_window_minutes;
    let selection_config = SelectionConfig::from(&config.router);

    let mut builder = RoutingCore::builder(config);
    if let Some(path) = metrics {
        builder = builder.metrics_store(Arc::new(InMemoryMetricsStore::with_snapshot(
            window,
            load_metrics(path)?,
        )));
    }
    if let Some(seed) = seed {
        builder = builder.selector(ProviderSelector::with_seed(selection_config, seed));
    }
    let core = builder.build()?;

    let allowed = if allow.is_empty() {
        None
    } else {
        let providers = allow
            .iter()
            .map(|p| p.parse::<ProviderId>().map_err(|e| anyhow::anyhow!(e)))
            .collect::<Result<Vec<_>>>()?;
        Some(AllowedProviders::new(providers))
    };

    let selection = core.select(model, allowed.as_ref()).await?;
    println!(
        "{} -> {} ({}) [{}]",
        model,
        selection.selected.provider_id,
        selection.selected.model_name,
        selection.reason.as_str()
    );
    for score in &selection.scores {
        println!(
            "  {:<18} score {:.4}  price {:.8}  uptime {:.1}  latency {:.0}ms  throughput {:.1}{}",
            score.provider_id.as_str(),
            score.score,
            score.price,
            score.uptime,
            score.latency_ms,
            score.throughput,
            if score.measured { "" } else { "  (defaults)" }
        );
    }
    core.shutdown().await;
    Ok(())
}

fn heal() -> Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading stdin")?;
    let result = heal_json_response(&input);
    match result.method {
        Some(method) => eprintln!("healed: {}", method),
        None if !result.healed => eprintln!("unchanged"),
        None => {}
    }
    println!("{}", result.content);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref()).await?;
    init_tracing(&config.logging)?;

    match cli.command {
        Command::Select {
            model,
            allow,
            metrics,
            seed,
        } => select(config, &model, &allow, metrics.as_deref(), seed).await,
        Command::Heal => heal(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

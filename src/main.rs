use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use trend_radar::config::AppConfig;
use trend_radar::logger;
use trend_radar::pipeline::TrendRadar;

#[derive(Parser)]
#[command(name = "trend-radar", about = "全网选题雷达 — multi-source trend discovery")]
struct Cli {
    /// Steer the run toward a specific topic (e.g. "Coze").
    #[arg(short, long)]
    topic: Option<String>,

    /// Alternate configuration file.
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Write placeholder artifacts without touching the network.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, secrets) = AppConfig::load_from(&cli.config)?;

    logger::init_logging(&config.monitoring)?;

    tracing::info!(
        sources = config.sources.len(),
        directed = cli.topic.as_deref().unwrap_or("(none)"),
        dry_run = cli.dry_run,
        "Trend radar starting"
    );

    let radar = TrendRadar::new(config, &secrets);
    let artifacts = if cli.dry_run {
        radar.run_dry(cli.topic.as_deref())?
    } else {
        radar.run(cli.topic.as_deref()).await?
    };

    println!("主推选题: {}", artifacts.primary_topic);
    println!("报告: {}", artifacts.report_path.display());
    println!("决策: {}", artifacts.decision_path.display());

    Ok(())
}

// src/main.rs

use std::io::IsTerminal;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use tracing::info;

mod config;
mod core;
mod logging;
mod report;

use crate::config::ScanConfig;
use crate::core::models::Target;
use crate::core::scanner::Scanner;

/// External security posture scan of a single web target.
#[derive(Debug, Parser)]
#[command(name = "sentinel-rs-scanner", version, about)]
struct Cli {
    /// Target URL or host name; `https://` is assumed when no scheme is given.
    target: String,

    /// Probes to run (tls, headers, robots, cms, ports). Unknown names are ignored.
    #[arg(short, long, value_delimiter = ',', default_value = "tls,headers,robots,cms,ports")]
    tools: Vec<String>,

    /// Comma-separated ports for the port probe.
    #[arg(long, value_delimiter = ',')]
    ports: Option<Vec<u16>>,

    /// Maximum simultaneous connection attempts in the port probe.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-port connect timeout in milliseconds.
    #[arg(long)]
    port_timeout_ms: Option<u64>,

    /// Skip requesting well-known CMS admin paths.
    #[arg(long)]
    no_path_probing: bool,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        let mut config = ScanConfig::from_env();
        if let Some(ports) = &self.ports {
            config.ports = ports.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrency = concurrency;
        }
        if let Some(ms) = self.port_timeout_ms {
            config.port_timeout = Duration::from_millis(ms);
        }
        if self.no_path_probing {
            config.cms_path_probing = false;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let log_path = logging::initialize_logging().wrap_err("Failed to initialize logging")?;

    let target = Target::normalize(&cli.target).map_err(|e| eyre!("{}", e.message))?;
    if Scanner::accepted_probes(&cli.tools).is_empty() {
        return Err(eyre!(
            "No recognized probes selected; choose from tls, headers, robots, cms, ports"
        ));
    }

    let config = cli.scan_config();
    info!(target = %target, log = %log_path.display(), "Scan requested.");
    let scanner = Scanner::new(&config);
    let report = scanner.run_scan(&target, &cli.tools).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report::render_report(&report, std::io::stdout().is_terminal()));
    }
    Ok(())
}

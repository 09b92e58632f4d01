use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use drawboard_core::config::{Config, GatewayConfig};
use drawboard_gateway::GatewayState;

#[derive(Parser)]
#[command(
    name = "drawboard",
    about = "Shared real-time drawing canvas where people and AI agents draw together",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the canvas server
    Serve {
        /// Port to listen on (default: 8000)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (default: 0.0.0.0)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Query a running server's health
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Check the configuration for problems
    Validate,
}

/// Install the tracing subscriber. RUST_LOG wins over the config file.
fn init_logging(config: &Config, verbose: bool) {
    let logging = config.logging.clone().unwrap_or_default();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = logging
            .level
            .clone()
            .unwrap_or_else(|| if verbose { "debug" } else { "info" }.to_string());
        let mut filter = EnvFilter::new(level);
        for directive in &logging.filters {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("Ignoring log filter '{directive}': {e}"),
            }
        }
        filter
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let to_stdout = logging.output == "stdout";
    match (logging.format.as_str(), to_stdout) {
        ("json", true) => builder.json().with_writer(std::io::stdout).init(),
        ("json", false) => builder.json().with_writer(std::io::stderr).init(),
        (_, true) => builder.with_writer(std::io::stdout).init(),
        (_, false) => builder.with_writer(std::io::stderr).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config
    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_dir);

    let mut config = Config::load(&config_path)?;
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Serve { port, bind } => {
            if let Some(bind) = bind {
                config.gateway.get_or_insert_with(GatewayConfig::default).bind = Some(bind);
            }
            let port = port.unwrap_or_else(|| config.gateway_port());

            let (warnings, errors) = config.validate();
            for w in &warnings {
                tracing::warn!("{w}");
            }
            if !errors.is_empty() {
                anyhow::bail!("invalid configuration: {}", errors.join("; "));
            }

            tracing::info!(
                config = %config_path.display(),
                allow_clear = config.allow_clear(),
                "Starting Drawboard on port {port}"
            );
            let state = GatewayState::new(Arc::new(config));
            #[cfg(feature = "metrics")]
            let state = state.with_prometheus();
            drawboard_gateway::start_gateway(Arc::new(state), port).await?;
        }
        Commands::Status => {
            println!("Drawboard v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!("Data dir: {}", drawboard_core::config::data_dir().display());
            let port = config.gateway_port();
            println!("Port: {port}");

            let url = format!("http://127.0.0.1:{port}/health");
            match reqwest::get(&url).await {
                Ok(resp) if resp.status().is_success() => {
                    let health: serde_json::Value = resp.json().await?;
                    println!("Status: running (v{})", health["version"].as_str().unwrap_or("?"));
                    println!("Viewers: {}", health["viewers"]);
                    println!("Events: {}", health["events"]);
                    println!("Running agents: {}", health["agents"]);
                }
                Ok(resp) => println!("Status: unhealthy ({})", resp.status()),
                Err(_) => println!("Status: not running"),
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for w in &warnings {
                    println!("warning: {w}");
                }
                for e in &errors {
                    println!("error: {e}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} error(s) in {}", errors.len(), config_path.display());
                }
                println!("Config OK ({} warning(s))", warnings.len());
            }
        },
    }

    Ok(())
}

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dap_driver::EngineConfig;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dap_driver")]
#[command(about = "Drive CodeLLDB over the Debug Adapter Protocol from an MCP client", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server listening on STDIO
    Serve {
        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,

        /// Set log level (trace, debug, info, warn, error)
        #[arg(long, default_value = "info")]
        log_level: String,

        /// Log line format on stderr
        #[arg(long, value_enum, default_value = "text")]
        log_format: LogFormat,

        /// CodeLLDB binary; overrides DAP_DRIVER_ADAPTER and the search path
        #[arg(long)]
        adapter_path: Option<String>,

        /// Seconds to wait for each adapter response
        #[arg(long, default_value_t = 30)]
        request_timeout_secs: u64,

        /// Seconds to wait for `initialized` and `stopped` events
        #[arg(long, default_value_t = 30)]
        event_timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            verbose,
            log_level,
            log_format,
            adapter_path,
            request_timeout_secs,
            event_timeout_secs,
        } => {
            // stdout carries the protocol; logs go to stderr only.
            let level = if verbose { "debug" } else { &log_level };
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr);
            match log_format {
                LogFormat::Text => subscriber.init(),
                LogFormat::Json => subscriber.json().init(),
            }

            let mut config = EngineConfig::default()
                .with_request_timeout(Duration::from_secs(request_timeout_secs))
                .with_event_timeout(Duration::from_secs(event_timeout_secs));
            if let Some(path) = adapter_path {
                config = config.with_adapter_path(path);
            }

            dap_driver::serve(config)
                .await
                .context("MCP server terminated with an error")?;
        }
    }

    Ok(())
}

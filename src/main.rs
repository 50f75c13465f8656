use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mcp_report_server::config::ServerConfig;
use mcp_report_server::introspect;
use mcp_report_server::server::McpServer;

/// MCP server exposing SQL Server report-configuration tools.
#[derive(Debug, Parser)]
#[command(name = "mcp-report-server", version, about)]
struct Cli {
    /// Serve JSON-RPC over TCP on this address instead of stdio.
    #[arg(
        long,
        value_name = "ADDR",
        num_args = 0..=1,
        default_missing_value = "0.0.0.0:9095"
    )]
    listen: Option<String>,

    /// Write the tool catalog to this path and exit.
    #[arg(long, value_name = "PATH")]
    introspect: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is reserved for the JSON-RPC stream.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mcp_report_server=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    // Introspection needs no database configuration and must never fail the
    // surrounding build step.
    if let Some(path) = cli.introspect {
        if let Err(e) = introspect::write_artifact(&path) {
            tracing::warn!("could not write catalog artifact: {e}");
        }
        return;
    }

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("mcp-report-server: configuration error: {e}");
            std::process::exit(1);
        }
    };

    let server = McpServer::new(config);
    let result = match &cli.listen {
        Some(addr) => server.run_tcp(addr).await,
        None => server.run_stdio().await,
    };
    if let Err(e) = result {
        eprintln!("mcp-report-server: fatal error: {e}");
        std::process::exit(1);
    }
}

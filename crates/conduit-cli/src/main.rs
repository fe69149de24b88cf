//! Conduit CLI: entry point.
//!
//! # Commands
//!
//! - `conduit query -m MESSAGE`: answer one query and exit
//! - `conduit repl`: interactive prompt, every line is a fresh query
//! - `conduit serve`: HTTP query endpoint + static frontend
//! - `conduit status`: show configuration and reachable tool servers
//! - `conduit init`: write a default config file

mod helpers;
mod init;
mod repl;
mod server;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use conduit_agent::AgentLoop;
use conduit_core::config::{load_config, Config, ServerConfig};
use conduit_providers::create_invoker;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Conduit: answer questions with a language model and MCP tool servers
#[derive(Parser)]
#[command(name = "conduit", version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.conduit/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that runs the agent.
#[derive(Args, Debug, Default)]
struct AgentArgs {
    /// Extra tool server, as `name=path` or a bare path (repeatable)
    #[arg(short, long = "server", value_name = "SERVER")]
    servers: Vec<String>,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single query
    Query {
        /// The query text
        #[arg(short, long)]
        message: String,

        #[command(flatten)]
        agent: AgentArgs,
    },

    /// Interactive prompt; each line is answered independently
    Repl {
        #[command(flatten)]
        agent: AgentArgs,
    },

    /// Serve the HTTP query endpoint and the static frontend
    Serve {
        /// Bind address (overrides gateway.host)
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides gateway.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Static frontend directory (overrides gateway.staticDir)
        #[arg(long)]
        static_dir: Option<String>,

        #[command(flatten)]
        agent: AgentArgs,
    },

    /// Show configuration and tool server status
    Status,

    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Tool server to include, as `name=path` or a bare path (repeatable)
        #[arg(short, long = "server", value_name = "SERVER")]
        servers: Vec<String>,
    },
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Query { message, agent } => {
            init_logging(agent.logs);
            let config = prepare_config(load_config(config_path), &agent.servers);
            run_query(&config, &message).await
        }
        Commands::Repl { agent } => {
            init_logging(agent.logs);
            let config = prepare_config(load_config(config_path), &agent.servers);
            repl::run(build_agent_loop(&config)?).await
        }
        Commands::Serve {
            host,
            port,
            static_dir,
            agent,
        } => {
            init_server_logging(agent.logs);
            let mut config = prepare_config(load_config(config_path), &agent.servers);
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(dir) = static_dir {
                config.gateway.static_dir = dir;
            }
            server::run(&config).await
        }
        Commands::Status => {
            init_logging(false);
            status::run(config_path).await
        }
        Commands::Init { force, servers } => init::run(config_path, force, &servers),
    }
}

// ─────────────────────────────────────────────
// Query command
// ─────────────────────────────────────────────

async fn run_query(config: &Config, message: &str) -> Result<()> {
    let agent_loop = build_agent_loop(config)?;

    info!("processing single query");
    let outcome = agent_loop
        .process_query(message)
        .await
        .context("query processing failed")?;

    helpers::print_response(&outcome.response_text());
    if outcome.budget_exhausted {
        helpers::print_budget_note(outcome.tool_turns);
    }
    Ok(())
}

/// Append `--server` arguments to the configured tool servers.
fn prepare_config(mut config: Config, servers: &[String]) -> Config {
    config
        .servers
        .extend(servers.iter().map(|raw| ServerConfig::parse_pair(raw)));
    config
}

/// Build an `AgentLoop` from the loaded configuration.
pub fn build_agent_loop(config: &Config) -> Result<AgentLoop> {
    let invoker = create_invoker(config).context(
        "failed to create model client (set model.apiKey in the config or GEMINI_API_KEY)",
    )?;
    Ok(AgentLoop::from_config(Arc::new(invoker), config))
}

/// Initialize tracing/logging for interactive commands.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("conduit=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Server logging honours `RUST_LOG` and defaults to info.
fn init_server_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "conduit=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

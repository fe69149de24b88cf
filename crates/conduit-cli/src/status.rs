//! `conduit status`: show configuration, model and tool server status.
//!
//! Every configured server is started, asked for its tools, and stopped
//! again, so this also works as a smoke test for the server list.

use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;

use conduit_agent::tools::{ProviderConnector, StdioConnector, ToolProvider};
use conduit_core::config::{get_config_path, load_config, ServerConfig};

use crate::helpers::mark;

/// Run the status command.
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    let path = config_path.map(PathBuf::from).unwrap_or_else(get_config_path);

    println!();
    println!("{}", "◆ Conduit Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        path.display(),
        mark(path.exists(), "(not found)")
    );
    println!("  {:<18} {}", "Model:".bold(), config.agent.model);
    println!(
        "  {:<18} {}",
        "API key:".bold(),
        if config.model.is_configured() {
            format!("{} (key set)", "✓".green())
        } else {
            format!("{}", "· not configured".dimmed())
        }
    );
    println!(
        "  {:<18} {}:{}  {} {}",
        "Gateway:".bold(),
        config.gateway.host,
        config.gateway.port,
        config.gateway.static_dir.dimmed(),
        mark(Path::new(&config.gateway.static_dir).is_dir(), "(no frontend)")
    );

    println!();
    println!("  {}", "Tool servers:".bold());
    if config.servers.is_empty() {
        println!("    {}", "· none configured".dimmed());
    }
    for server in &config.servers {
        println!("    {:<20} {}", server.name, probe(server).await);
    }
    println!();

    Ok(())
}

/// Connect to one server and describe what it offers.
async fn probe(server: &ServerConfig) -> String {
    let provider = match StdioConnector.connect(server).await {
        Ok(p) => p,
        Err(e) => return format!("{} {}", "✗".red(), e.to_string().dimmed()),
    };

    let line = match provider.list_tools().await {
        Ok(tools) => {
            let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
            format!("{} {}", "✓".green(), names.join(", "))
        }
        Err(e) => format!("{} {}", "✗".red(), e.to_string().dimmed()),
    };
    provider.shutdown().await;
    line
}

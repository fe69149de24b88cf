//! `conduit init`: write a default configuration file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use conduit_core::config::{get_config_path, save_config, Config, ServerConfig};

/// Run the init command.
pub fn run(config_path: Option<&Path>, force: bool, servers: &[String]) -> Result<()> {
    let path = config_path.map(PathBuf::from).unwrap_or_else(get_config_path);

    println!();
    println!("{}", "◆ Conduit — Setup".cyan().bold());
    println!();

    if write_default_config(&path, force, servers)? {
        println!("  {} created config at {}", "✓".green(), path.display());
    } else {
        println!(
            "  {} config already exists at {} (use --force to overwrite)",
            "✓".green(),
            path.display()
        );
    }

    println!();
    println!(
        "{}",
        "  Set model.apiKey (or GEMINI_API_KEY), then run `conduit query -m \"...\"`.".green()
    );
    println!();
    Ok(())
}

/// Returns false when the file exists and `force` is not set.
fn write_default_config(path: &Path, force: bool, servers: &[String]) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }

    let mut config = Config::default();
    config
        .servers
        .extend(servers.iter().map(|raw| ServerConfig::parse_pair(raw)));

    save_config(&config, Some(path))
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    Ok(true)
}

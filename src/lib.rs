pub mod bar;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod logging;
pub mod serial;

use anyhow::{Context, Result};

use cli::{Cli, CliCommand};
use config::AppConfig;
use serial::protocol::ControlAction;

/// Resolve configuration from the file and command line flags.
pub fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(port) = &cli.serial {
        config.serial.port = port.clone();
    }
    if let Some(catalog) = &cli.catalog {
        config.catalog_path = Some(catalog.clone());
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    log::debug!("Configuration: {:?}", config);

    match &cli.command {
        CliCommand::Ports => commands::list_ports(),
        CliCommand::Menu => {
            let catalog = commands::load_catalog(&config)?;
            commands::show_menu(&catalog)
        }
        CliCommand::Dispensers => {
            let catalog = commands::load_catalog(&config)?;
            commands::list_dispensers(&catalog)
        }
        CliCommand::Assign(args) => {
            let catalog = commands::load_catalog(&config)?;
            commands::assign_dispenser(&catalog, &config, args)
        }
        CliCommand::Compile { order } => {
            commands::compile_order(commands::load_catalog(&config)?, &config, *order)
        }
        CliCommand::Make(args) => {
            commands::make_order(commands::load_catalog(&config)?, &config, args).await
        }
        CliCommand::Reset => commands::control(&config, ControlAction::Reset).await.map(|_| ()),
        CliCommand::Zero => commands::control(&config, ControlAction::Zero).await.map(|_| ()),
        CliCommand::Monitor => commands::monitor(&config).await,
    }
}

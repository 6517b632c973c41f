//! Command handlers behind the `barbot` binary.
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast::error::RecvError;

use crate::bar::{BarError, BarManager};
use crate::catalog::{MemoryCatalog, OrderId};
use crate::cli::{AssignArgs, MakeArgs};
use crate::compiler::OrderCompiler;
use crate::config::AppConfig;
use crate::serial::link::{DeliveryReceipt, LinkBuilder, LinkHandle};
use crate::serial::protocol::ControlAction;
use crate::serial::{SerialConnector, SerialInterface};

pub fn list_ports() -> Result<()> {
    let ports = SerialInterface::discover_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => println!(
                "{}\t{}\t{:04x}:{:04x}\t{}",
                port.port_name,
                port.kind,
                vid,
                pid,
                port.product.unwrap_or_default()
            ),
            _ => println!("{}\t{}", port.port_name, port.kind),
        }
    }
    Ok(())
}

pub fn load_catalog(config: &AppConfig) -> Result<Arc<MemoryCatalog>> {
    let path = config
        .catalog_path
        .as_ref()
        .context("No catalog configured; pass --catalog or set catalog_path")?;
    let catalog = MemoryCatalog::load(path)
        .with_context(|| format!("Failed to load catalog {}", path.display()))?;
    Ok(Arc::new(catalog))
}

/// Persist catalog changes to the file it was loaded from.
fn save_catalog(catalog: &MemoryCatalog, config: &AppConfig) -> Result<()> {
    let path = config
        .catalog_path
        .as_ref()
        .context("No catalog configured; pass --catalog or set catalog_path")?;
    catalog
        .save(path)
        .with_context(|| format!("Failed to save catalog {}", path.display()))
}

pub fn show_menu(catalog: &MemoryCatalog) -> Result<()> {
    let recipes = catalog.available_recipes()?;
    if recipes.is_empty() {
        println!("Nothing can be made with the current dispenser setup");
    }
    for recipe in recipes {
        println!("{:>4}  {}", recipe.id, recipe.name);
    }
    Ok(())
}

pub fn list_dispensers(catalog: &MemoryCatalog) -> Result<()> {
    for dispenser in catalog.dispensers()? {
        let content = match dispenser.ingredient_id {
            Some(ingredient_id) => catalog.ingredient(ingredient_id)?.name,
            None => "(empty)".to_string(),
        };
        println!(
            "{:>4}  {:<16} rail {:>4}  {}",
            dispenser.id, dispenser.name, dispenser.rail_position, content
        );
    }
    Ok(())
}

pub fn assign_dispenser(catalog: &MemoryCatalog, config: &AppConfig, args: &AssignArgs) -> Result<()> {
    let ingredient_id = if args.content.empty { None } else { args.content.ingredient };
    catalog
        .assign_dispenser(args.dispenser, ingredient_id)
        .with_context(|| format!("Cannot update dispenser {}", args.dispenser))?;
    save_catalog(catalog, config)?;

    match ingredient_id {
        Some(ingredient_id) => println!(
            "Dispenser {} now holds {}",
            args.dispenser,
            catalog.ingredient(ingredient_id)?.name
        ),
        None => println!("Dispenser {} emptied", args.dispenser),
    }
    Ok(())
}

pub fn compile_order(catalog: Arc<MemoryCatalog>, config: &AppConfig, order_id: OrderId) -> Result<()> {
    let compiler = OrderCompiler::new(catalog).with_home_position(config.home_position);
    let batch = compiler
        .compile(order_id)
        .map_err(BarError::from)
        .with_context(|| format!("Cannot compile order {:05}", order_id))?;
    for line in batch.lines() {
        println!("{}", line);
    }
    Ok(())
}

pub fn open_link(config: &AppConfig) -> LinkHandle {
    let connector = SerialConnector::new(config.serial.port.clone()).with_baud_rate(config.serial.baud_rate);
    LinkBuilder::new(connector).with_config(config.link_config()).build()
}

pub async fn make_order(catalog: Arc<MemoryCatalog>, config: &AppConfig, args: &MakeArgs) -> Result<()> {
    let order_id = match (args.order, args.recipe) {
        (Some(order_id), _) => order_id,
        (None, Some(recipe_id)) => {
            // Saved before compiling, so an order that cannot be made yet
            // can be retried with --order once its ingredients are loaded.
            let order = catalog.place_order(recipe_id)?;
            save_catalog(&catalog, config)?;
            println!("Order {:05} placed", order.id);
            order.id
        }
        (None, None) => bail!("Either --order or --recipe is required"),
    };

    let compiler = OrderCompiler::new(catalog).with_home_position(config.home_position);
    let manager = BarManager::new(compiler, open_link(config));
    let result = manager.make_order(order_id).await;
    manager.shutdown().await;

    match result {
        Ok(dispatch) => {
            println!("Order {:05} sent ({} commands)", dispatch.order_id, dispatch.receipt.commands);
            if dispatch.requires_id_check {
                println!("Contains alcohol: check ID before serving");
            }
            Ok(())
        }
        // The order stays on record so it can be retried once the
        // ingredient is loaded.
        Err(e) if e.is_unfulfillable() => {
            Err(anyhow::Error::new(e).context(format!("Order {:05} cannot be made", order_id)))
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("Order {:05} was not delivered", order_id))),
    }
}

pub async fn control(config: &AppConfig, action: ControlAction) -> Result<DeliveryReceipt> {
    let link = open_link(config);
    let result = link.submit(crate::serial::CommandBatch::control(action)).await;
    link.shutdown().await;
    let receipt = result.with_context(|| format!("Failed to send {:?}", action))?;
    println!("{:?} sent", action);
    Ok(receipt)
}

/// Log every line the rig sends until Ctrl-C.
pub async fn monitor(config: &AppConfig) -> Result<()> {
    let link = open_link(config);
    let mut lines = link.subscribe_lines();
    let mut states = link.state_receiver();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                log::info!("Hardware link {}", state);
            }
            line = lines.recv() => match line {
                Ok(line) => println!("{}", line),
                Err(RecvError::Lagged(skipped)) => log::warn!("Monitor fell behind; {} line(s) skipped", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    link.shutdown().await;
    Ok(())
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::catalog::{DispenserId, IngredientId, OrderId, RecipeId};

#[derive(Debug, Parser)]
#[command(name = "barbot")]
#[command(about = "Compile drink orders and drive the Barbot dispensing rig over serial")]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Serial port of the rig (overrides the config file)
    #[arg(long, global = true)]
    pub serial: Option<String>,

    /// JSON catalog of dispensers, ingredients, recipes and orders
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// List serial ports on this host
    Ports,
    /// Show the drinks that can be made with the current dispenser setup
    Menu,
    /// List dispensers and what each one holds
    Dispensers,
    /// Load an ingredient into a dispenser, or empty it
    Assign(AssignArgs),
    /// Print the command batch for an order without touching the rig
    Compile {
        #[arg(long)]
        order: OrderId,
    },
    /// Compile an order and send it to the rig
    Make(MakeArgs),
    /// Send a full device reset
    Reset,
    /// Zero the rail position
    Zero,
    /// Log status lines from the rig until interrupted
    Monitor,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct MakeArgs {
    /// Existing order to make
    #[arg(long)]
    pub order: Option<OrderId>,

    /// Place a new order for this recipe and make it
    #[arg(long)]
    pub recipe: Option<RecipeId>,
}

#[derive(Debug, Args)]
pub struct AssignArgs {
    #[arg(long)]
    pub dispenser: DispenserId,

    #[command(flatten)]
    pub content: AssignContent,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct AssignContent {
    /// Ingredient to load
    #[arg(long)]
    pub ingredient: Option<IngredientId>,

    /// Leave the dispenser empty
    #[arg(long)]
    pub empty: bool,
}

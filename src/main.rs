use clap::Parser;

use barbot_lib::cli::Cli;
use barbot_lib::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    log::info!("Barbot starting");
    if let Err(e) = barbot_lib::run(cli).await {
        log::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

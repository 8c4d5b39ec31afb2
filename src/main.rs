//! Bus master daemon entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use poolbus::{JxiHeater, Master, SlaveRegistry, JXI_HEATER_ADDR};

#[derive(Parser, Debug)]
#[command(name = "poolbus", version, about = "RS-485 bus master for pool equipment")]
struct Args {
    /// Serial device connected to the RS-485 bus
    #[arg(long, default_value = "/dev/ttyS0")]
    tty: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("starting up on {}", args.tty);

    let port = match poolbus::serial::open(&args.tty) {
        Ok(port) => port,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut registry = SlaveRegistry::new();
    if let Err(err) = registry.add(JXI_HEATER_ADDR, Box::new(JxiHeater::new())) {
        error!("internal error: {}", err);
        return ExitCode::FAILURE;
    }

    let mut master = Master::new(port, registry);
    match master.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("bus master stopped: {}", err);
            ExitCode::FAILURE
        }
    }
}

use anyhow::Result;
use clap::Parser;
use ferry::{config, config::ServerArgs, server::FerryServer};
use log4rs::config::Deserializers;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    log4rs::init_file(config::LOG4RS_CONFIG_FILE_PATH, Deserializers::default()).unwrap();
    // Parse config
    let args = ServerArgs::parse();
    // Create server
    let server = FerryServer::new(args.server_config());
    // Bind and serve clients "forever"
    server.run().await?;
    Ok(())
}

use anyhow::Result;
use clap::Parser;
use ferry::{config, config::HttpProxyArgs, http::FerryHttpProxy};
use log::error;
use log4rs::config::Deserializers;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    log4rs::init_file(config::LOG4RS_CONFIG_FILE_PATH, Deserializers::default()).unwrap();
    // Parse config
    let args = HttpProxyArgs::parse();
    // Validate upstream settings before binding anything
    let client_config = match args.client_config() {
        Ok(client_config) => client_config,
        Err(err) => {
            error!("Invalid upstream configuration: {err:#}");
            std::process::exit(1);
        }
    };
    // Create proxy
    let proxy = FerryHttpProxy::new(args.bind_addr(), client_config);
    // Bind and translate requests "forever"
    proxy.run().await?;
    Ok(())
}

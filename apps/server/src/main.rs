use anyhow::Context;
use dhub::domain::config::{LoggingConfig, ServerConfig};
use dhub::kernel::config::load_config;
use dhub_logger::Logger;
use dhub_server::Server;

/// Overrides the `server.toml` lookup in the working directory.
const CONFIG_ENV: &str = "DHUB_CONFIG";

#[dhub_runtime::main(server)]
async fn main() -> anyhow::Result<()> {
    let path = std::env::var_os(CONFIG_ENV);
    let cfg: ServerConfig = load_config(path.as_ref()).context("Critical: Configuration is malformed")?;

    let _log = init_logger(&cfg.logging)?;

    Server::builder().config(cfg).build()?.run().await
}

fn init_logger(cfg: &LoggingConfig) -> anyhow::Result<Logger> {
    let mut builder =
        Logger::builder().name(env!("CARGO_PKG_NAME")).level(Logger::parse_level(&cfg.level)?).console(cfg.console);
    if let Some(filter) = &cfg.env_filter {
        builder = builder.env_filter(filter);
    }

    let logger = match &cfg.path {
        Some(path) => builder.path(path).json(cfg.json).max_files(cfg.max_files).init()?,
        None => builder.init()?,
    };
    Ok(logger)
}

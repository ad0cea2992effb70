use chatforge_server::logging::{LoggingConfig, init_logging};
use chatforge_server::{ServerConfig, run};
use clap::Parser;

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();
    init_logging(&LoggingConfig {
        level: config.log_level.clone(),
        json_format: config.log_json,
    });
    tracing::debug!(?config, "starting");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "server failed");
        eprintln!("chatforge: {e}");
        std::process::exit(1);
    }
}

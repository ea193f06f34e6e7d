//! `concierge gateway` — Start the HTTP API server.

use concierge_config::AppConfig;
use tracing::info;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Concierge Gateway");
    println!("   Listening:      {}:{}", config.gateway.host, config.gateway.port);
    println!("   Knowledge base: {}", config.knowledge_base.url);
    println!("   Rate limit:     {}/min per user", config.gateway.rate_limit_per_minute);

    info!(host = %config.gateway.host, port = config.gateway.port, "Starting gateway");
    concierge_gateway::start(config).await?;

    Ok(())
}

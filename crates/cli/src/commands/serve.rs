//! `smartday serve`: start the HTTP chat server.

use smartday_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("☀️ SmartDay Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.models.basic);
    println!("   Origins:   {}", config.gateway.allowed_origins.join(", "));

    smartday_gateway::start(config).await?;

    Ok(())
}

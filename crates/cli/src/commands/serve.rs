//! `roomscout serve`: start the HTTP gateway and web UI.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    super::require_api_key(&config)?;

    println!("RoomScout Gateway");
    println!("   Listening:     http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:         {}", config.agent.model);
    println!("   Tool server:   {} {}", config.mcp.command, config.mcp.args.join(" "));
    println!("   Single-flight: {}", config.gateway.single_flight);

    roomscout_gateway::start(config).await?;

    Ok(())
}

//! `roomscout config`: configuration management commands.

use roomscout_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed and validated");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Model:        {}", config.agent.model);
            println!("   Tool budget:  {}", config.agent.max_tool_calls);
            println!("   Tool server:  {} {}", config.mcp.command, config.mcp.args.join(" "));
            println!("   Gateway:      {}:{}", config.gateway.host, config.gateway.port);
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Problems that do not stop loading but will bite at run time.
fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if !config.has_api_key() {
        warnings.push("No API key set (set ANTHROPIC_API_KEY or ROOMSCOUT_API_KEY)");
    }
    if config.agent.inter_call_delay_secs == 0 && config.agent.llm_call_delay_secs == 0 {
        warnings.push("All rate-limit delays are zero; the LLM API may throttle requests");
    }
    if config.gateway.host == "0.0.0.0" {
        warnings.push("Gateway bound to 0.0.0.0; the search UI has no authentication");
    }
    warnings
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;
    if config.api_key.is_some() {
        config.api_key = Some("[REDACTED]".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

pub async fn defaults() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::default_toml());
    Ok(())
}

pub mod config_cmd;
pub mod search;
pub mod serve;
pub mod tools;

use roomscout_config::AppConfig;

/// Load the configuration, with a readable message on failure.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// The API key, or setup instructions on stderr and an error.
pub fn require_api_key(config: &AppConfig) -> Result<String, Box<dyn std::error::Error>> {
    match config.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => Ok(key.to_string()),
        None => {
            eprintln!();
            eprintln!("  ERROR: No API key configured!");
            eprintln!();
            eprintln!("  Set one of these environment variables:");
            eprintln!("    ANTHROPIC_API_KEY = 'sk-ant-...'");
            eprintln!("    ROOMSCOUT_API_KEY = 'sk-ant-...'");
            eprintln!();
            eprintln!("  Or add it to your config file:");
            eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
            eprintln!();
            Err("No API key found. See above for setup instructions.".into())
        }
    }
}

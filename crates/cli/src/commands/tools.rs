//! `roomscout tools`: start the tool server and list what it offers.

use roomscout_core::tool::{ToolDescriptor, ToolSession};
use roomscout_tools::McpSession;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    eprintln!("  Starting {} {} ...", config.mcp.command, config.mcp.args.join(" "));
    let session = McpSession::spawn(&config.mcp).await?;
    let info = session.server_info();
    println!("Tool server: {} {}", info.name, info.version);

    let listed = session.list_tools().await;
    session.shutdown().await;

    let tools = listed?;
    println!("{} tools", tools.len());
    for tool in &tools {
        println!();
        println!("{}", describe(tool));
    }

    Ok(())
}

fn describe(tool: &ToolDescriptor) -> String {
    let required: Vec<&str> = tool.input_schema["required"]
        .as_array()
        .map(|names| names.iter().filter_map(|n| n.as_str()).collect())
        .unwrap_or_default();

    let mut out = format!("  {}", tool.name);
    if !tool.description.is_empty() {
        out.push_str(&format!("\n    {}", tool.description));
    }
    if !required.is_empty() {
        out.push_str(&format!("\n    required: {}", required.join(", ")));
    }
    out
}

//! `agentry tools` — print the advertised tool capabilities.

use agentry_tools::{ToolSet, UserService};

pub fn run(tool_set: ToolSet) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", describe(tool_set)?);
    Ok(())
}

/// The capability list as pretty JSON, in registration order.
pub fn describe(tool_set: ToolSet) -> Result<String, Box<dyn std::error::Error>> {
    let registry = tool_set.registry(UserService::default())?;
    Ok(serde_json::to_string_pretty(&registry.describe_all())?)
}

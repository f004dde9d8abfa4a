//! `agentry demo` — the canned customer-service queries.
//!
//! All queries share one user store, so a cancellation in one query is
//! visible to the next.

use std::sync::Arc;

use agentry_core::event::LogSink;
use agentry_tools::{DEMO_QUERIES, ToolSet, UserService};

use super::run::render;
use super::{Overrides, build_agent, cancel_on_ctrl_c, load_config};

pub async fn run(tool_set: ToolSet) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(Overrides::default())?;
    let client = agentry_providers::build_client(&config)?;
    let agent = build_agent(
        &config,
        client,
        tool_set,
        UserService::default(),
        Arc::new(LogSink),
    )?;
    let cancel = cancel_on_ctrl_c();

    println!("🤖 Customer Service Agent Demo ({tool_set} tools)");
    println!("================================");
    println!();

    for query in DEMO_QUERIES {
        println!("Query: {query}");
        match agent.run_with_cancel(query, cancel.clone()).await {
            Ok(result) => println!("Response: {}", render(&result)),
            Err(e) if cancel.is_cancelled() => return Err(e.into()),
            Err(e) => eprintln!("  [Error] {e}"),
        }
        println!("---");
        println!();
    }

    Ok(())
}

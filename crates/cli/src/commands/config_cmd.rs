//! `agentry config` — configuration inspection.

use agentry_config::AppConfig;

pub fn run(default: bool, path: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path {
        println!("{}", AppConfig::config_dir().join("config.toml").display());
        return Ok(());
    }

    if default {
        println!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", redacted_toml(&config)?);
    if !config.has_api_key() {
        eprintln!("⚠️  No API key set (OPENAI_API_KEY, BRAINTRUST_API_KEY or AGENTRY_API_KEY)");
    }
    Ok(())
}

/// The effective config as TOML with the API key masked.
pub fn redacted_toml(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some("[REDACTED]".into());
    }
    toml::to_string_pretty(&shown)
}

//! Configuration display.

use anyhow::Result;
use heron_config::HeronConfig;

use crate::ConfigFormat;
use crate::style::SemanticStyle;

/// Show the effective configuration with the session secret masked.
pub fn show(config: &HeronConfig, format: ConfigFormat) -> Result<()> {
    let config = config.redacted();

    match format {
        ConfigFormat::Toml => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigFormat::Text => {
            println!("{}", "HERON Configuration".header());
            println!("===================\n");

            println!("CAS:");
            println!("  Base: {}", config.cas.base);
            println!("  Secret: {}", config.cas.app_secret);
            println!("  Session timeout: {}s", config.cas.session_timeout_secs);
            println!("  Reissue after: {}s", config.cas.reissue_after_secs);
            println!("  Cookie: {}", config.cas.cookie_name);
            println!();

            println!("Oversight:");
            println!("  Project: {}", config.oversight.project_id);
            println!(
                "  Executives: {}",
                config
                    .oversight
                    .executives
                    .as_deref()
                    .unwrap_or_default()
                    .join(", ")
            );
            println!("  Institutions: {}", config.oversight.institutions.join(", "));
            println!("  Survey: {}", config.oversight.survey_url);
            println!();

            println!("System access agreement:");
            println!("  Survey id: {}", config.saa.survey_id);
            println!("  Survey: {}", config.saa.survey_url);
            println!();

            println!("Cache:");
            println!("  Training TTL: {}s", config.cache.training_ttl_secs);
        }
    }

    Ok(())
}

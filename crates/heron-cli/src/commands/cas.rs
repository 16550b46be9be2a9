//! CAS protocol commands.

use anyhow::{Context, Result};
use heron_config::HeronConfig;
use url::Url;

use crate::style::print_pass;

/// Prints where a browser without a session is sent.
pub fn login_url(config: &HeronConfig, service: &Url) -> Result<()> {
    let validator = super::validator(config)?;
    println!("{}", validator.login_url(service));
    Ok(())
}

/// One validation round-trip against the configured CAS server.
///
/// Single attempt: a ticket is spent whether or not CAS accepts it.
pub fn validate(config: &HeronConfig, ticket: &str, service: &Url) -> Result<()> {
    let validator = super::validator(config)?;
    let credential = validator
        .validate(ticket, service)
        .context("Ticket validation failed")?;
    print_pass("authenticated", credential.user.as_str());
    Ok(())
}

//! CLI command implementations.

pub mod cas;
pub mod check;
pub mod config;
pub mod decisions;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use heron_cas::{SessionTimings, TicketValidator, UreqCasClient, ValidatorConfig};
use heron_config::{ConfigLoader, HeronConfig};
use heron_policy::{
    ExecutiveAllowList, Fixtures, InMemoryAgreementStore, InMemoryDirectory, PolicyEngine,
    PolicySettings,
};
use heron_types::{Clock, Institution, ManualClock, ProjectId, SurveyId, SystemClock};
use tracing::debug;

/// Loads and validates configuration; every command needs it first.
pub fn load_config(project: &Path) -> Result<HeronConfig> {
    ConfigLoader::new()
        .with_project_dir(project)
        .load()
        .with_context(|| format!("Failed to load configuration from {}", project.display()))
}

/// Validator wired to the configured CAS server.
pub fn validator(config: &HeronConfig) -> Result<TicketValidator> {
    let timings = SessionTimings::new(config.session_timeout(), config.reissue_after())?;
    let validator_config = ValidatorConfig::new(config.cas_base_url()?, config.cas.app_secret.clone())
        .with_timings(timings)
        .with_cookie_name(config.cas.cookie_name.clone())
        .with_ticket_retention(config.ticket_retention());

    Ok(TicketValidator::new(
        validator_config,
        Arc::new(UreqCasClient::new()),
        Arc::new(SystemClock),
    )?)
}

fn policy_settings(config: &HeronConfig) -> Result<PolicySettings> {
    Ok(PolicySettings {
        executives: ExecutiveAllowList::from_config(config.oversight.executives.clone())?,
        oversight_project: ProjectId::new(config.oversight.project_id),
        institutions: config
            .oversight
            .institutions
            .iter()
            .map(|name| Institution::new(name.as_str()))
            .collect(),
        saa_survey: SurveyId::new(config.saa.survey_id),
        saa_survey_url: config.saa_survey_url()?,
        oversight_survey_url: config.oversight_survey_url()?,
    })
}

/// Policy engine over a fixtures snapshot.
pub fn engine(config: &HeronConfig, fixtures: &Path, as_of: Option<NaiveDate>) -> Result<PolicyEngine> {
    let text = fs::read_to_string(fixtures)
        .with_context(|| format!("Failed to read fixtures at {}", fixtures.display()))?;
    let snapshot: Fixtures = toml::from_str(&text)
        .with_context(|| format!("Failed to parse fixtures at {}", fixtures.display()))?;
    debug!(
        people = snapshot.people.len(),
        oversight = snapshot.oversight.len(),
        "loaded fixtures"
    );

    let fallback_ttl = Duration::from_secs(config.cache.training_ttl_secs);
    let (directory, store): (InMemoryDirectory, InMemoryAgreementStore) =
        snapshot.into_collaborators(fallback_ttl);

    let clock: Arc<dyn Clock> = match as_of {
        Some(date) => Arc::new(ManualClock::at_date(date)),
        None => Arc::new(SystemClock),
    };

    Ok(PolicyEngine::new(
        policy_settings(config)?,
        Arc::new(directory),
        Arc::new(store),
        clock,
    )?)
}

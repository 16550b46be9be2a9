//! Entitlement walk-through for one user.

use std::path::Path;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use heron_config::HeronConfig;
use heron_policy::{Capability, PolicyError, Sponsor};
use heron_types::UserId;

use crate::style::{print_fail, print_hint, print_labeled, print_pass};

/// Issues a capability for `user` and reports each check.
///
/// Every check runs so the operator sees the whole picture; the exit status
/// follows `repository_authz`, which stops at the first failure.
pub fn run(config: &HeronConfig, user: &str, fixtures: &Path, as_of: Option<NaiveDate>) -> Result<()> {
    let engine = super::engine(config, fixtures, as_of)?;
    let capability = engine.issue_for(&UserId::new(user))?;

    println!();
    print_labeled("User", &capability.identity().to_string());
    print_labeled("Tier", &capability.tier().to_string());
    println!();

    report("sponsor", capability.sponsor().map(|s| describe_sponsor(&s)));
    report(
        "agreement",
        capability.agreement().map(|()| "on file".to_string()),
    );
    report(
        "training",
        capability.training().map(|date| format!("current until {date}")),
    );
    println!();

    match capability.repository_authz() {
        Ok(access) => {
            print_pass("repository", &access.to_string());
            Ok(())
        }
        Err(err) => {
            print_fail("repository", &err.to_string());
            bail!(denied(&capability, &err))
        }
    }
}

fn report(label: &str, outcome: Result<String, PolicyError>) {
    match outcome {
        Ok(detail) => print_pass(label, &detail),
        Err(err) => {
            print_fail(label, &err.to_string());
            print_hint(&err.remediation());
        }
    }
}

fn describe_sponsor(sponsor: &Sponsor) -> String {
    match sponsor {
        Sponsor::SelfSponsored(tier) => format!("self ({tier})"),
        Sponsor::Committee {
            record,
            expires: Some(date),
        } => format!("oversight record {record}, expires {date}"),
        Sponsor::Committee {
            record,
            expires: None,
        } => format!("oversight record {record}"),
    }
}

fn denied(capability: &Capability, err: &PolicyError) -> String {
    format!("{} denied: {err}", capability.identity().id)
}

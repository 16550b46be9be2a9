//! Oversight decision listing.

use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use heron_config::HeronConfig;

use crate::style::{SemanticStyle, table};

pub fn run(config: &HeronConfig, fixtures: &Path, as_of: Option<NaiveDate>) -> Result<()> {
    let engine = super::engine(config, fixtures, as_of)?;
    let decisions = engine.decisions()?;

    if decisions.is_empty() {
        println!("{}", "No oversight decisions.".muted());
        return Ok(());
    }

    let total = engine.settings().institutions.len();
    let rows: Vec<Vec<String>> = decisions
        .iter()
        .map(|(decision, verdict)| {
            vec![
                decision.record.to_string(),
                decision.candidate.to_string(),
                format!("{}/{total}", decision.approvals),
                decision.rejections.to_string(),
                decision
                    .expiration
                    .map_or_else(|| "never".to_string(), |d| d.to_string()),
                verdict.to_string(),
            ]
        })
        .collect();

    let columns = [
        "record",
        "candidate",
        "approvals",
        "rejections",
        "expires",
        "verdict",
    ];
    println!("{}", table(&columns, &rows));

    let count = rows.len();
    let noun = if count == 1 { "decision" } else { "decisions" };
    println!("{}", format!("({count} {noun})").muted());
    Ok(())
}

//! Sponsorship aggregation.
//!
//! The oversight store hands back raw, per-field events for each request
//! record: one vote per institution, the candidates named on the request and
//! an optional expiration date. [`aggregate`] folds them into one
//! [`PolicyDecision`] per (record, candidate).
//!
//! ```text
//! (project, record, approve_kuh = yes)  ┐
//! (project, record, approve_kumc = yes) ├──▶ PolicyDecision { approvals: 3, ... }
//! (project, record, approve_kupi = yes) │       candidate = some.one
//! (project, record, user_id_1 = some.one)┘
//! ```
//!
//! Aggregation runs on every query; nothing here is cached.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};

use chrono::NaiveDate;
use heron_types::{Institution, ProjectId, RecordId, UserId};
use serde::{Deserialize, Serialize};

/// An institution's decision on an oversight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Yes,
    No,
}

/// One field of an oversight request record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "field")]
pub enum OversightField {
    /// `approve_<institution>`.
    Approval { institution: Institution, vote: Vote },
    /// `user_id_<n>`.
    Candidate { user: UserId },
    /// `date_of_expiration`; `None` when the field is blank.
    Expiration { date: Option<NaiveDate> },
}

/// A raw decision event as stored by the oversight survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OversightEntry {
    pub project: ProjectId,
    pub record: RecordId,
    #[serde(flatten)]
    pub field: OversightField,
}

impl OversightEntry {
    pub fn approval(project: ProjectId, record: &str, institution: &str, vote: Vote) -> Self {
        Self {
            project,
            record: RecordId::new(record),
            field: OversightField::Approval {
                institution: Institution::new(institution),
                vote,
            },
        }
    }

    pub fn candidate(project: ProjectId, record: &str, user: &str) -> Self {
        Self {
            project,
            record: RecordId::new(record),
            field: OversightField::Candidate {
                user: UserId::new(user),
            },
        }
    }

    pub fn expiration(project: ProjectId, record: &str, date: Option<NaiveDate>) -> Self {
        Self {
            project,
            record: RecordId::new(record),
            field: OversightField::Expiration { date },
        }
    }
}

/// Aggregated committee outcome for one candidate on one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub project: ProjectId,
    pub record: RecordId,
    pub candidate: UserId,
    /// Distinct participating institutions that voted yes.
    pub approvals: usize,
    /// Distinct participating institutions that voted no.
    pub rejections: usize,
    pub expiration: Option<NaiveDate>,
}

impl PolicyDecision {
    /// Unanimous and not yet expired. An absent expiration never expires;
    /// the expiration date itself is still valid.
    pub fn is_approved(&self, institutions: usize, today: NaiveDate) -> bool {
        self.approvals == institutions && self.is_current(today)
    }

    fn is_current(&self, today: NaiveDate) -> bool {
        self.expiration.is_none_or(|expires| today <= expires)
    }

    /// Operator-facing classification. Only `Approved` sponsors anyone.
    pub fn verdict(&self, institutions: usize, today: NaiveDate) -> Verdict {
        if self.rejections > 0 {
            Verdict::Rejected
        } else if self.approvals < institutions {
            Verdict::Incomplete
        } else if !self.is_current(today) {
            Verdict::Expired
        } else {
            Verdict::Approved
        }
    }
}

/// Summary of a [`PolicyDecision`] for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Approved,
    Incomplete,
    Rejected,
    Expired,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Approved => "approved",
            Self::Incomplete => "incomplete",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        };
        f.write_str(label)
    }
}

#[derive(Default)]
struct RecordFold {
    votes: BTreeMap<Institution, Vote>,
    candidates: BTreeSet<UserId>,
    expiration: Option<NaiveDate>,
}

/// Folds raw events for `project` into per-candidate decisions.
///
/// Events for other projects are ignored, as are votes from institutions
/// outside `institutions`. When an institution votes more than once on a
/// record the last vote stands.
pub fn aggregate(
    entries: &[OversightEntry],
    project: ProjectId,
    institutions: &BTreeSet<Institution>,
) -> Vec<PolicyDecision> {
    let mut records: BTreeMap<&RecordId, RecordFold> = BTreeMap::new();

    for entry in entries.iter().filter(|e| e.project == project) {
        let fold = records.entry(&entry.record).or_default();
        match &entry.field {
            OversightField::Approval { institution, vote } => {
                if institutions.contains(institution) {
                    fold.votes.insert(institution.clone(), *vote);
                }
            }
            OversightField::Candidate { user } => {
                fold.candidates.insert(user.clone());
            }
            OversightField::Expiration { date } => fold.expiration = *date,
        }
    }

    records
        .into_iter()
        .flat_map(|(record, fold)| {
            let approvals = fold.votes.values().filter(|v| **v == Vote::Yes).count();
            let rejections = fold.votes.len() - approvals;
            fold.candidates
                .into_iter()
                .map(move |candidate| PolicyDecision {
                    project,
                    record: record.clone(),
                    candidate,
                    approvals,
                    rejections,
                    expiration: fold.expiration,
                })
        })
        .collect()
}

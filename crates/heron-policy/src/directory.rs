//! External collaborators: the medical-center directory and the
//! agreement/oversight store.
//!
//! Every call is blocking, synchronous and single-attempt. A failure surfaces
//! immediately as a typed error; retry and timeout policy belong to whoever
//! wraps these traits.

use std::time::Duration;

use chrono::NaiveDate;
use heron_types::{Identity, ProjectId, SurveyId, UserId};

use crate::error::{DirectoryError, StoreError};
use crate::sponsorship::OversightEntry;

/// Directory attribute holding the user id.
pub const UID_ATTRIBUTE: &str = "cn";

/// Team-member search criteria. Empty fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub id: String,
    pub surname: String,
    pub given_name: String,
}

impl SearchFilter {
    pub fn matches(&self, identity: &Identity) -> bool {
        field_matches(&self.id, identity.id.as_str())
            && field_matches(&self.surname, &identity.surname)
            && field_matches(&self.given_name, &identity.given_name)
    }
}

fn field_matches(wanted: &str, actual: &str) -> bool {
    wanted.is_empty() || actual.to_lowercase().starts_with(&wanted.to_lowercase())
}

/// Identity and training lookups.
pub trait Directory: Send + Sync {
    /// Finds exactly one entry whose `attribute` equals `value`.
    fn resolve_unique(&self, attribute: &str, value: &str) -> Result<Identity, DirectoryError>;

    /// Finds the entry for a user id.
    fn resolve(&self, id: &UserId) -> Result<Identity, DirectoryError> {
        self.resolve_unique(UID_ATTRIBUTE, id.as_str())
    }

    /// Up to `max` entries matching `filter`.
    fn search(&self, max: usize, filter: &SearchFilter) -> Result<Vec<Identity>, DirectoryError>;

    /// Whether the directory lists this user as qualified faculty.
    fn is_faculty(&self, id: &UserId) -> Result<bool, DirectoryError>;

    /// Training expiration date, with how long the answer may be cached.
    fn training_date(&self, id: &UserId) -> Result<(Duration, NaiveDate), DirectoryError>;
}

/// Signed agreements and raw oversight-committee decisions.
pub trait AgreementStore: Send + Sync {
    /// Whether `contact` has a completed response to survey `survey`.
    fn has_agreement(&self, contact: &str, survey: SurveyId) -> Result<bool, StoreError>;

    /// Raw per-institution decision events for an oversight project.
    fn sponsorship_decisions(&self, project: ProjectId) -> Result<Vec<OversightEntry>, StoreError>;
}

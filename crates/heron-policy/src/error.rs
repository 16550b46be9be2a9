//! Error types for policy decisions and their collaborators.

use chrono::NaiveDate;
use heron_types::UserId;
use thiserror::Error;

use crate::capability::{Permission, Tier};

/// Result type for entitlement checks.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// "Not yet entitled" outcomes.
///
/// These are expected, user-facing answers. They travel unmodified to the
/// boundary, where [`PolicyError::remediation`] supplies the next step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// No unexpired, unanimous oversight approval names this user.
    #[error("not sponsored")]
    NotSponsored,

    /// No current human subjects training on file.
    #[error("{}", no_training_message(.expired))]
    NoTraining {
        /// Last known training date, when it exists but has lapsed.
        expired: Option<NaiveDate>,
    },

    /// No signed system access agreement on file.
    #[error("no system access agreement on file")]
    NoAgreement,

    /// The operation is reserved for executives.
    #[error("not an executive")]
    NotExecutive,

    /// The operation is reserved for qualified faculty.
    #[error("not qualified faculty")]
    NotFaculty,

    /// The directory matched more than one person.
    #[error("ambiguous identity: {0}")]
    AmbiguousIdentity(String),

    /// The directory has no such person (or could not be asked).
    #[error("identity not found: {0}")]
    IdentityNotFound(String),

    /// The capability does not carry the required permission, or was not
    /// issued by this engine.
    #[error("capability of tier {tier:?} does not grant {required:?}")]
    TypeMismatch { required: Permission, tier: Tier },
}

fn no_training_message(expired: &Option<NaiveDate>) -> String {
    match expired {
        Some(date) => format!("human subjects training expired on {date}"),
        None => "no human subjects training on file".to_string(),
    }
}

impl PolicyError {
    /// Next step to show the user.
    pub fn remediation(&self) -> String {
        match self {
            Self::NotSponsored => {
                "Ask a qualified faculty member to request sponsorship from the oversight committee."
                    .to_string()
            }
            Self::NoTraining { expired: Some(date) } => format!(
                "Your human subjects training expired on {date}. Complete the refresher course and try again."
            ),
            Self::NoTraining { expired: None } => {
                "Complete human subjects training; records can take a day to reach us.".to_string()
            }
            Self::NoAgreement => "Sign the system access agreement.".to_string(),
            Self::NotExecutive => "This operation is limited to executives.".to_string(),
            Self::NotFaculty => {
                "This operation is limited to qualified faculty.".to_string()
            }
            Self::AmbiguousIdentity(who) => {
                format!("More than one directory entry matches {who}; contact the help desk.")
            }
            Self::IdentityNotFound(who) => {
                format!("No directory entry for {who}; contact the help desk.")
            }
            Self::TypeMismatch { .. } => {
                "Your session does not grant this operation; log in again.".to_string()
            }
        }
    }
}

/// Directory lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("no directory entry for {0}")]
    NotFound(String),

    #[error("more than one directory entry for {0}")]
    Ambiguous(String),

    /// Transport or server failure. Treated exactly like `NotFound` by
    /// every entitlement check.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

impl DirectoryError {
    /// Fail-closed mapping for identity lookups.
    pub(crate) fn into_identity_error(self, who: &UserId) -> PolicyError {
        match self {
            Self::Ambiguous(_) => PolicyError::AmbiguousIdentity(who.to_string()),
            Self::NotFound(_) | Self::Unavailable(_) => {
                PolicyError::IdentityNotFound(who.to_string())
            }
        }
    }
}

/// Agreement/oversight store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("agreement store unavailable: {0}")]
    Unavailable(String),
}

/// Startup-fatal engine construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("executive allow-list is not configured")]
    MissingExecutives,

    #[error("no participating institutions configured")]
    NoInstitutions,
}

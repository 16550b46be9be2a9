//! # heron-types: Core types for HERON access control
//!
//! This crate contains the types shared by the CAS front door and the policy
//! engine:
//! - Identifiers ([`UserId`], [`ProjectId`], [`RecordId`], [`Institution`], [`SurveyId`])
//! - Directory identity ([`Identity`])
//! - Time sources ([`Clock`], [`SystemClock`], [`ManualClock`])

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

// ============================================================================
// Identifiers
// ============================================================================

/// Directory user id (the CAS principal, e.g. `john.smith`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Oversight-committee survey project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(u64);

impl ProjectId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ProjectId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ProjectId> for u64 {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

/// A single oversight request within a project.
///
/// Record ids are opaque strings assigned by the survey system.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A participating institution whose approval is required for sponsorship.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Institution(String);

impl Institution {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Institution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Institution {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Survey whose completed responses count as a signed agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurveyId(u64);

impl SurveyId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for SurveyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SurveyId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Directory attributes of an authenticated person.
///
/// Resolved once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub given_name: String,
    pub surname: String,
    pub email: String,
    #[serde(default)]
    pub org_unit: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl Identity {
    pub fn new(
        id: impl Into<UserId>,
        given_name: impl Into<String>,
        surname: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            given_name: given_name.into(),
            surname: surname.into(),
            email: email.into(),
            org_unit: String::new(),
            title: None,
        }
    }

    #[must_use]
    pub fn with_org_unit(mut self, org_unit: impl Into<String>) -> Self {
        self.org_unit = org_unit.into();
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// "Given Surname".
    pub fn display_name(&self) -> String {
        format!("{} {}", self.given_name, self.surname)
    }

    /// "Surname, Given", as used on survey forms.
    pub fn sort_name(&self) -> String {
        format!("{}, {}", self.surname, self.given_name)
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} <{}>", self.given_name, self.surname, self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn john() -> Identity {
        Identity::new("john.smith", "John", "Smith", "john.smith@js.example")
            .with_org_unit("Neurology")
            .with_title("Chair of Department of Neurology")
    }

    #[test]
    fn identity_display_matches_directory_format() {
        assert_eq!(john().to_string(), "John Smith <john.smith@js.example>");
    }

    #[test]
    fn sort_name_puts_surname_first() {
        assert_eq!(john().sort_name(), "Smith, John");
        assert_eq!(john().display_name(), "John Smith");
    }

    #[test]
    fn user_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&UserId::new("bill.student")).unwrap();
        assert_eq!(json, "\"bill.student\"");
    }

    #[test]
    fn identity_deserializes_without_optional_fields() {
        let identity: Identity = serde_json::from_str(
            r#"{"id":"some.one","given_name":"Some","surname":"One","email":"some.one@js.example"}"#,
        )
        .unwrap();
        assert_eq!(identity.id, UserId::new("some.one"));
        assert!(identity.org_unit.is_empty());
        assert_eq!(identity.title, None);
    }
}

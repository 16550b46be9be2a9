//! In-memory collaborators.
//!
//! Used by the test suites and by the `heron` diagnostic binary, which loads
//! a [`Fixtures`] snapshot from disk. Both stores count their calls and can
//! be switched to fail like an unreachable server.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use heron_types::{Identity, Institution, ProjectId, RecordId, SurveyId, UserId};
use serde::{Deserialize, Serialize};

use crate::directory::{AgreementStore, Directory, SearchFilter, UID_ATTRIBUTE};
use crate::error::{DirectoryError, StoreError};
use crate::sponsorship::{OversightEntry, Vote};

/// Default lifetime of a training answer.
pub const DEFAULT_TRAINING_TTL: Duration = Duration::from_secs(60 * 60);

/// A directory entry plus the facts the directory knows about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(default)]
    pub faculty: bool,
    /// Human subjects training expiration.
    #[serde(default)]
    pub training: Option<NaiveDate>,
}

impl Person {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            faculty: false,
            training: None,
        }
    }

    #[must_use]
    pub fn faculty(mut self) -> Self {
        self.faculty = true;
        self
    }

    #[must_use]
    pub fn trained_until(mut self, date: NaiveDate) -> Self {
        self.training = Some(date);
        self
    }
}

// ============================================================================
// Directory
// ============================================================================

#[derive(Debug, Default)]
struct Counters {
    lookups: AtomicUsize,
    training_lookups: AtomicUsize,
}

/// Directory backed by a fixed list of people.
#[derive(Debug)]
pub struct InMemoryDirectory {
    people: Vec<Person>,
    training_ttl: Duration,
    unavailable: AtomicBool,
    counters: Counters,
}

impl InMemoryDirectory {
    pub fn new(people: Vec<Person>) -> Self {
        Self {
            people,
            training_ttl: DEFAULT_TRAINING_TTL,
            unavailable: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    #[must_use]
    pub fn with_training_ttl(mut self, ttl: Duration) -> Self {
        self.training_ttl = ttl;
        self
    }

    /// Makes every call fail with [`DirectoryError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Identity lookups answered so far (including failures).
    pub fn lookups(&self) -> usize {
        self.counters.lookups.load(Ordering::SeqCst)
    }

    /// Training lookups answered so far (including failures).
    pub fn training_lookups(&self) -> usize {
        self.counters.training_lookups.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), DirectoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable(
                "directory server not responding".to_string(),
            ));
        }
        Ok(())
    }

    fn person(&self, attribute: &str, value: &str) -> Result<&Person, DirectoryError> {
        let mut matches = self.people.iter().filter(|p| {
            let identity = &p.identity;
            match attribute {
                UID_ATTRIBUTE => identity.id.as_str() == value,
                "mail" => identity.email == value,
                "sn" => identity.surname == value,
                "givenname" => identity.given_name == value,
                _ => false,
            }
        });

        match (matches.next(), matches.next()) {
            (Some(person), None) => Ok(person),
            (None, _) => Err(DirectoryError::NotFound(value.to_string())),
            (Some(_), Some(_)) => Err(DirectoryError::Ambiguous(value.to_string())),
        }
    }
}

impl Directory for InMemoryDirectory {
    fn resolve_unique(&self, attribute: &str, value: &str) -> Result<Identity, DirectoryError> {
        self.counters.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.person(attribute, value).map(|p| p.identity.clone())
    }

    fn search(&self, max: usize, filter: &SearchFilter) -> Result<Vec<Identity>, DirectoryError> {
        self.counters.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .people
            .iter()
            .map(|p| &p.identity)
            .filter(|identity| filter.matches(identity))
            .take(max)
            .cloned()
            .collect())
    }

    fn is_faculty(&self, id: &UserId) -> Result<bool, DirectoryError> {
        self.counters.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.person(UID_ATTRIBUTE, id.as_str()).map(|p| p.faculty)
    }

    fn training_date(&self, id: &UserId) -> Result<(Duration, NaiveDate), DirectoryError> {
        self.counters.training_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.person(UID_ATTRIBUTE, id.as_str())?
            .training
            .map(|date| (self.training_ttl, date))
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))
    }
}

// ============================================================================
// Agreement store
// ============================================================================

/// Agreement and oversight store backed by fixed data.
#[derive(Debug, Default)]
pub struct InMemoryAgreementStore {
    agreements: HashSet<(String, SurveyId)>,
    entries: Vec<OversightEntry>,
    unavailable: AtomicBool,
    agreement_lookups: AtomicUsize,
    decision_lookups: AtomicUsize,
}

impl InMemoryAgreementStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_agreement(mut self, contact: impl Into<String>, survey: SurveyId) -> Self {
        self.agreements.insert((contact.into(), survey));
        self
    }

    #[must_use]
    pub fn with_entries(mut self, entries: impl IntoIterator<Item = OversightEntry>) -> Self {
        self.entries.extend(entries);
        self
    }

    /// Makes every call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn agreement_lookups(&self) -> usize {
        self.agreement_lookups.load(Ordering::SeqCst)
    }

    pub fn decision_lookups(&self) -> usize {
        self.decision_lookups.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "database connection refused".to_string(),
            ));
        }
        Ok(())
    }
}

impl AgreementStore for InMemoryAgreementStore {
    fn has_agreement(&self, contact: &str, survey: SurveyId) -> Result<bool, StoreError> {
        self.agreement_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.agreements.contains(&(contact.to_string(), survey)))
    }

    fn sponsorship_decisions(&self, project: ProjectId) -> Result<Vec<OversightEntry>, StoreError> {
        self.decision_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .entries
            .iter()
            .filter(|e| e.project == project)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Snapshot format
// ============================================================================

/// A signed agreement on file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementRecord {
    pub email: String,
    pub survey_id: SurveyId,
}

/// One oversight request as the committee sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OversightRequest {
    pub project_id: ProjectId,
    pub record: RecordId,
    pub candidates: Vec<UserId>,
    #[serde(default)]
    pub approvals: BTreeMap<Institution, Vote>,
    #[serde(default)]
    pub expiration: Option<NaiveDate>,
}

impl OversightRequest {
    /// The raw events the oversight store would hold for this request.
    pub fn entries(&self) -> Vec<OversightEntry> {
        let project = self.project_id;
        let record = self.record.as_str();

        let candidates = self
            .candidates
            .iter()
            .map(|user| OversightEntry::candidate(project, record, user.as_str()));
        let votes = self.approvals.iter().map(|(institution, vote)| {
            OversightEntry::approval(project, record, institution.as_str(), *vote)
        });
        let expiration = std::iter::once(OversightEntry::expiration(
            project,
            record,
            self.expiration,
        ));

        candidates.chain(votes).chain(expiration).collect()
    }
}

/// Serializable snapshot of directory and agreement-store contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixtures {
    /// Overrides the caller's fallback training TTL.
    #[serde(default)]
    pub training_ttl_secs: Option<u64>,
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub agreements: Vec<AgreementRecord>,
    #[serde(default)]
    pub oversight: Vec<OversightRequest>,
}

impl Fixtures {
    /// Builds collaborators holding this snapshot. Training answers live for
    /// `training_ttl_secs` when the snapshot sets it, else `fallback_ttl`.
    pub fn into_collaborators(
        self,
        fallback_ttl: Duration,
    ) -> (InMemoryDirectory, InMemoryAgreementStore) {
        let ttl = self
            .training_ttl_secs
            .map_or(fallback_ttl, Duration::from_secs);
        let directory = InMemoryDirectory::new(self.people).with_training_ttl(ttl);

        let store = self
            .agreements
            .into_iter()
            .fold(InMemoryAgreementStore::new(), |store, a| {
                store.with_agreement(a.email, a.survey_id)
            })
            .with_entries(self.oversight.iter().flat_map(OversightRequest::entries));

        (directory, store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> InMemoryDirectory {
        InMemoryDirectory::new(vec![
            Person::new(Identity::new("john.smith", "John", "Smith", "john.smith@js.example"))
                .faculty(),
            Person::new(Identity::new("bill.student", "Bill", "Student", "bill@js.example")),
            Person::new(Identity::new("jane.student", "Jane", "Student", "jane@js.example")),
        ])
    }

    #[test]
    fn resolve_by_uid() {
        let identity = directory().resolve(&UserId::new("john.smith")).unwrap();
        assert_eq!(identity.display_name(), "John Smith");
    }

    #[test]
    fn resolve_unique_reports_ambiguity() {
        let result = directory().resolve_unique("sn", "Student");
        assert_eq!(result, Err(DirectoryError::Ambiguous("Student".into())));
    }

    #[test]
    fn unknown_user_is_not_found() {
        let dir = directory();
        assert_eq!(
            dir.is_faculty(&UserId::new("nobody")),
            Err(DirectoryError::NotFound("nobody".into()))
        );
        assert_eq!(dir.lookups(), 1);
    }

    #[test]
    fn search_honours_max() {
        let found = directory()
            .search(1, &SearchFilter {
                surname: "student".into(),
                ..SearchFilter::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn unavailable_directory_fails_every_call() {
        let dir = directory();
        dir.set_unavailable(true);
        assert!(matches!(
            dir.training_date(&UserId::new("john.smith")),
            Err(DirectoryError::Unavailable(_))
        ));
        assert_eq!(dir.training_lookups(), 1);
    }

    #[test]
    fn oversight_request_expands_to_raw_entries() {
        let request = OversightRequest {
            project_id: ProjectId::new(34),
            record: RecordId::new("6373469799195807417"),
            candidates: vec![UserId::new("bill.student")],
            approvals: [(Institution::new("kuh"), Vote::Yes)].into_iter().collect(),
            expiration: None,
        };

        let entries = request.entries();

        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.project == ProjectId::new(34)));
    }

    #[test]
    fn store_filters_by_project() {
        let store = InMemoryAgreementStore::new().with_entries([
            OversightEntry::candidate(ProjectId::new(1), "r", "a"),
            OversightEntry::candidate(ProjectId::new(2), "r", "b"),
        ]);
        let entries = store.sponsorship_decisions(ProjectId::new(1)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.decision_lookups(), 1);
    }
}

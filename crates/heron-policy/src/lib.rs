//! # heron-policy: Capability issuance for the HERON repository
//!
//! Classifies an authenticated identity into exactly one trust tier and
//! enforces that tier's entitlements lazily:
//! - **Executive** (configured allow-list): exempt from sponsorship
//! - **Faculty** (directory faculty flag): self-sponsoring, may file
//!   oversight requests
//! - **Affiliate** (everyone else): needs unanimous, unexpired oversight
//!   committee sponsorship
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Authenticated Identity                      │
//! └─────────────────┬───────────────────────────┘
//!                   │ issue()
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  PolicyEngine                                │
//! │  ├─ executive allow-list                     │
//! │  ├─ Directory::is_faculty                    │
//! │  └─ brand (audit rejects foreign capability) │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Capability (request-scoped)                 │
//! │  repository_authz():                         │
//! │    sponsor() → agreement() → training()      │
//! │    first failure wins                        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Entitlements
//!
//! | Tier      | Sponsor       | Agreement | Training | Oversight requests |
//! |-----------|---------------|-----------|----------|--------------------|
//! | Affiliate | committee     | required  | required | ✗                  |
//! | Faculty   | self          | required  | required | ✓                  |
//! | Executive | self          | required  | required | ✗                  |
//!
//! Directory and store faults fail closed: an unreachable collaborator
//! reads as "no record".
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use heron_policy::{
//!     ExecutiveAllowList, InMemoryAgreementStore, InMemoryDirectory, Person, PolicyEngine,
//!     PolicyError, PolicySettings, Tier,
//! };
//! use heron_types::{Identity, ManualClock, ProjectId, SurveyId};
//! use url::Url;
//!
//! let today = NaiveDate::from_ymd_opt(2012, 1, 1).unwrap();
//! let bill = Identity::new("bill.student", "Bill", "Student", "bill.student@js.example");
//! let directory = InMemoryDirectory::new(vec![Person::new(bill.clone())]);
//!
//! let settings = PolicySettings {
//!     executives: ExecutiveAllowList::new(["big.wig"]),
//!     oversight_project: ProjectId::new(34),
//!     institutions: ["kuh", "kupi", "kumc"].into_iter().map(Into::into).collect(),
//!     saa_survey: SurveyId::new(11),
//!     saa_survey_url: Url::parse("http://redcap.example/surveys/")?,
//!     oversight_survey_url: Url::parse("http://redcap.example/surveys/")?,
//! };
//! let engine = PolicyEngine::new(
//!     settings,
//!     Arc::new(directory),
//!     Arc::new(InMemoryAgreementStore::new()),
//!     Arc::new(ManualClock::at_date(today)),
//! )?;
//!
//! let capability = engine.issue(bill);
//! assert_eq!(capability.tier(), Tier::Affiliate);
//! assert_eq!(capability.repository_authz().unwrap_err(), PolicyError::NotSponsored);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod capability;
pub mod directory;
pub mod engine;
pub mod error;
pub mod memory;
pub mod sponsorship;
pub mod survey;

pub use cache::{CacheEntry, TtlCache};
pub use capability::{
    Affiliate, Browser, Capability, Executive, Faculty, Permission, RepositoryAccess, Sponsor,
    Tier,
};
pub use directory::{AgreementStore, Directory, SearchFilter};
pub use engine::{ExecutiveAllowList, PolicyEngine, PolicySettings};
pub use error::{DirectoryError, EngineError, PolicyError, PolicyResult, StoreError};
pub use memory::{
    AgreementRecord, DEFAULT_TRAINING_TTL, Fixtures, InMemoryAgreementStore, InMemoryDirectory,
    OversightRequest, Person,
};
pub use sponsorship::{OversightEntry, OversightField, PolicyDecision, Verdict, Vote, aggregate};
pub use survey::OversightPurpose;

//! Capabilities: request-scoped proof of rights.
//!
//! A [`Capability`] is only ever built by [`PolicyEngine::issue`]. Each
//! variant wraps the same identity-bound [`Record`] port, so an Affiliate
//! can ask about its own training, agreement and sponsorship but never about
//! anybody else's. Checks run lazily, when an operation is invoked.
//!
//! ```text
//!                 Capability
//!        ┌────────────┼─────────────┐
//!   Affiliate      Faculty      Executive
//!   sponsor():     sponsor():   sponsor():
//!   committee      self         self
//!   (memoized)     + oversight  + oversight
//!                    requests     decisions
//! ```
//!
//! [`PolicyEngine::issue`]: crate::PolicyEngine::issue

use std::cell::OnceCell;
use std::fmt::{self, Display};
use std::sync::Arc;

use chrono::NaiveDate;
use heron_types::{Identity, RecordId, UserId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::directory::SearchFilter;
use crate::engine::Ports;
use crate::error::{DirectoryError, PolicyError, PolicyResult, StoreError};
use crate::sponsorship::{PolicyDecision, Verdict};
use crate::survey::{self, OversightPurpose};

// ============================================================================
// Tiers and permissions
// ============================================================================

/// Trust tier of an issued capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Affiliate,
    Faculty,
    Executive,
}

impl Tier {
    /// Whether a capability of this tier may exercise `permission`.
    pub fn satisfies(self, permission: Permission) -> bool {
        match permission {
            Permission::User => true,
            Permission::Faculty => self == Tier::Faculty,
            Permission::Executive => self == Tier::Executive,
        }
    }
}

impl Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Affiliate => "Affiliate",
            Self::Faculty => "Faculty",
            Self::Executive => "Executive",
        };
        f.write_str(label)
    }
}

/// What a caller on the far side of a trust boundary requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Any authenticated user.
    User,
    /// Qualified faculty only.
    Faculty,
    /// Executives only.
    Executive,
}

/// Who vouches for a user's repository access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sponsor {
    /// Faculty and executives sponsor themselves.
    SelfSponsored(Tier),
    /// An unexpired, unanimous oversight approval.
    Committee {
        record: RecordId,
        expires: Option<NaiveDate>,
    },
}

// ============================================================================
// Identity-bound ports
// ============================================================================

/// Policy lookups bound to exactly one user.
pub(crate) struct Record {
    user: UserId,
    contact: String,
    ports: Arc<Ports>,
}

impl Record {
    pub(crate) fn new(identity: &Identity, ports: Arc<Ports>) -> Self {
        Self {
            user: identity.id.clone(),
            contact: identity.email.clone(),
            ports,
        }
    }

    /// Current human subjects training, or `NoTraining`.
    ///
    /// Directory faults fail closed exactly like a missing record.
    fn training(&self) -> PolicyResult<NaiveDate> {
        let ports = &self.ports;
        let completed = ports
            .training
            .get_or_fetch(&self.user, || ports.directory.training_date(&self.user));

        match completed {
            Ok(date) if date >= ports.clock.today() => Ok(date),
            Ok(date) => {
                info!(user_id = %self.user, expired = %date, "training expired");
                Err(PolicyError::NoTraining {
                    expired: Some(date),
                })
            }
            Err(DirectoryError::Unavailable(reason)) => {
                warn!(user_id = %self.user, %reason, "training lookup failed; treating as absent");
                Err(PolicyError::NoTraining { expired: None })
            }
            Err(_) => {
                info!(user_id = %self.user, "no training on file");
                Err(PolicyError::NoTraining { expired: None })
            }
        }
    }

    fn agreement(&self) -> PolicyResult<()> {
        let survey = self.ports.settings.saa_survey;
        match self.ports.agreements.has_agreement(&self.contact, survey) {
            Ok(true) => Ok(()),
            Ok(false) => {
                info!(user_id = %self.user, "no system access agreement");
                Err(PolicyError::NoAgreement)
            }
            Err(StoreError::Unavailable(reason)) => {
                warn!(user_id = %self.user, %reason, "agreement lookup failed; treating as absent");
                Err(PolicyError::NoAgreement)
            }
        }
    }

    fn sponsorship(&self) -> PolicyResult<Sponsor> {
        let today = self.ports.clock.today();
        let institutions = self.ports.settings.institutions.len();

        let decisions = self.ports.decisions().map_err(|StoreError::Unavailable(reason)| {
            warn!(user_id = %self.user, %reason, "sponsorship lookup failed; treating as absent");
            PolicyError::NotSponsored
        })?;

        decisions
            .into_iter()
            .find(|d| d.candidate == self.user && d.is_approved(institutions, today))
            .map(|d| Sponsor::Committee {
                record: d.record,
                expires: d.expiration,
            })
            .ok_or_else(|| {
                info!(user_id = %self.user, "not sponsored");
                PolicyError::NotSponsored
            })
    }
}

/// Directory browsing. Finding someone does not confer their rights.
#[derive(Clone)]
pub struct Browser {
    ports: Arc<Ports>,
}

impl Browser {
    pub fn lookup(&self, id: &UserId) -> PolicyResult<Identity> {
        self.ports
            .directory
            .resolve(id)
            .map_err(|e| e.into_identity_error(id))
    }

    /// At most `max` matches. An unreachable directory finds nobody.
    pub fn search(&self, max: usize, filter: &SearchFilter) -> PolicyResult<Vec<Identity>> {
        match self.ports.directory.search(max, filter) {
            Ok(found) => Ok(found),
            Err(DirectoryError::NotFound(_)) => Ok(Vec::new()),
            Err(DirectoryError::Unavailable(reason)) => {
                warn!(reason = %reason, "directory search failed; returning no matches");
                Ok(Vec::new())
            }
            Err(DirectoryError::Ambiguous(who)) => Err(PolicyError::AmbiguousIdentity(who)),
        }
    }
}

impl fmt::Debug for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Browser").finish_non_exhaustive()
    }
}

/// State shared by every tier.
pub(crate) struct Account {
    identity: Identity,
    record: Record,
    brand: u64,
}

impl Account {
    pub(crate) fn new(identity: Identity, ports: Arc<Ports>, brand: u64) -> Self {
        let record = Record::new(&identity, ports);
        Self {
            identity,
            record,
            brand,
        }
    }
}

// ============================================================================
// Tier variants
// ============================================================================

/// Behaviour each tier supplies; everything else is shared.
pub(crate) trait Entitlements {
    fn account(&self) -> &Account;

    fn tier(&self) -> Tier;

    fn sponsor(&self) -> PolicyResult<Sponsor>;
}

/// Baseline tier; needs committee sponsorship.
pub struct Affiliate {
    account: Account,
    sponsor: OnceCell<PolicyResult<Sponsor>>,
}

impl Affiliate {
    pub(crate) fn new(account: Account) -> Self {
        Self {
            account,
            sponsor: OnceCell::new(),
        }
    }
}

impl Entitlements for Affiliate {
    fn account(&self) -> &Account {
        &self.account
    }

    fn tier(&self) -> Tier {
        Tier::Affiliate
    }

    /// Computed at most once per capability; the first answer sticks.
    fn sponsor(&self) -> PolicyResult<Sponsor> {
        self.sponsor
            .get_or_init(|| self.account.record.sponsorship())
            .clone()
    }
}

/// Qualified faculty; self-sponsoring, may request oversight.
pub struct Faculty {
    account: Account,
}

impl Faculty {
    pub(crate) fn new(account: Account) -> Self {
        Self { account }
    }

    /// Link to the oversight request survey, pre-filled with the requesting
    /// faculty member and each member of `team`.
    pub fn oversight_survey_link(
        &self,
        code: &str,
        team: &[UserId],
        purpose: OversightPurpose,
    ) -> PolicyResult<Url> {
        let ports = &self.account.record.ports;
        let members = team
            .iter()
            .map(|id| {
                ports
                    .directory
                    .resolve(id)
                    .map_err(|e| e.into_identity_error(id))
            })
            .collect::<PolicyResult<Vec<_>>>()?;

        let mut params = survey::team_params(&members);
        params.extend(survey::agreement_params(&self.account.identity));
        params.push(("what_for".to_string(), purpose.code().to_string()));
        params.push(("multi".to_string(), "yes".to_string()));

        Ok(survey::survey_link(
            &ports.settings.oversight_survey_url,
            code,
            params,
        ))
    }
}

impl Entitlements for Faculty {
    fn account(&self) -> &Account {
        &self.account
    }

    fn tier(&self) -> Tier {
        Tier::Faculty
    }

    fn sponsor(&self) -> PolicyResult<Sponsor> {
        Ok(Sponsor::SelfSponsored(Tier::Faculty))
    }
}

/// Allow-listed executives; exempt from sponsorship.
pub struct Executive {
    account: Account,
}

impl Executive {
    pub(crate) fn new(account: Account) -> Self {
        Self { account }
    }

    /// Every aggregated oversight decision with its verdict.
    pub fn oversight_decisions(&self) -> Result<Vec<(PolicyDecision, Verdict)>, StoreError> {
        self.account.record.ports.verdicts()
    }
}

impl Entitlements for Executive {
    fn account(&self) -> &Account {
        &self.account
    }

    fn tier(&self) -> Tier {
        Tier::Executive
    }

    fn sponsor(&self) -> PolicyResult<Sponsor> {
        Ok(Sponsor::SelfSponsored(Tier::Executive))
    }
}

// ============================================================================
// Capability
// ============================================================================

/// The one capability issued for an identity on a request.
pub enum Capability {
    Affiliate(Affiliate),
    Faculty(Faculty),
    Executive(Executive),
}

impl Capability {
    fn entitlements(&self) -> &dyn Entitlements {
        match self {
            Self::Affiliate(a) => a,
            Self::Faculty(f) => f,
            Self::Executive(e) => e,
        }
    }

    pub fn tier(&self) -> Tier {
        self.entitlements().tier()
    }

    pub fn identity(&self) -> &Identity {
        &self.entitlements().account().identity
    }

    pub(crate) fn brand(&self) -> u64 {
        self.entitlements().account().brand
    }

    /// Who vouches for this user. Affiliates consult the oversight
    /// decisions once per capability.
    pub fn sponsor(&self) -> PolicyResult<Sponsor> {
        self.entitlements().sponsor()
    }

    /// Current training date.
    pub fn training(&self) -> PolicyResult<NaiveDate> {
        self.entitlements().account().record.training()
    }

    /// Signed system access agreement on file.
    pub fn agreement(&self) -> PolicyResult<()> {
        self.entitlements().account().record.agreement()
    }

    /// Sponsor, then agreement, then training; stops at the first failure.
    pub fn repository_authz(&self) -> PolicyResult<RepositoryAccess<'_>> {
        let outcome = self
            .sponsor()
            .and_then(|_| self.agreement())
            .and_then(|()| self.training());

        match outcome {
            Ok(_) => {
                info!(user_id = %self.identity().id, tier = ?self.tier(), "repository access granted");
                Ok(RepositoryAccess { capability: self })
            }
            Err(err) => {
                info!(user_id = %self.identity().id, tier = ?self.tier(), reason = %err, "repository access denied");
                Err(err)
            }
        }
    }

    /// Link to the system access agreement survey for this user.
    pub fn saa_survey_link(&self, code: &str) -> Url {
        let account = self.entitlements().account();
        survey::survey_link(
            &account.record.ports.settings.saa_survey_url,
            code,
            survey::agreement_params(&account.identity),
        )
    }

    pub fn browser(&self) -> Browser {
        Browser {
            ports: Arc::clone(&self.entitlements().account().record.ports),
        }
    }

    pub fn as_faculty(&self) -> PolicyResult<&Faculty> {
        match self {
            Self::Faculty(f) => Ok(f),
            _ => Err(PolicyError::NotFaculty),
        }
    }

    pub fn as_executive(&self) -> PolicyResult<&Executive> {
        match self {
            Self::Executive(e) => Ok(e),
            _ => Err(PolicyError::NotExecutive),
        }
    }
}

impl Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.tier(), self.identity())
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("tier", &self.tier())
            .field("user", &self.identity().id)
            .finish_non_exhaustive()
    }
}

/// Proof that [`Capability::repository_authz`] passed for one capability.
pub struct RepositoryAccess<'a> {
    capability: &'a Capability,
}

impl RepositoryAccess<'_> {
    pub fn capability(&self) -> &Capability {
        self.capability
    }

    pub fn user(&self) -> &UserId {
        &self.capability.identity().id
    }
}

impl Display for RepositoryAccess<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Access({})", self.capability)
    }
}

impl fmt::Debug for RepositoryAccess<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepositoryAccess({:?})", self.capability)
    }
}

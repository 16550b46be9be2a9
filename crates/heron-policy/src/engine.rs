//! Capability issuance and audit.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use heron_types::{Clock, Identity, Institution, ProjectId, SurveyId, UserId};
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::TtlCache;
use crate::capability::{Account, Affiliate, Capability, Executive, Faculty, Permission};
use crate::directory::{AgreementStore, Directory};
use crate::error::{DirectoryError, EngineError, PolicyError, PolicyResult, StoreError};
use crate::sponsorship::{PolicyDecision, Verdict, aggregate};

/// User ids that are issued [`Capability::Executive`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutiveAllowList(BTreeSet<UserId>);

impl ExecutiveAllowList {
    pub fn new<I, U>(ids: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<UserId>,
    {
        Self(ids.into_iter().map(Into::into).collect())
    }

    /// The list must be configured, even if it is empty.
    pub fn from_config(ids: Option<Vec<String>>) -> Result<Self, EngineError> {
        ids.map(Self::new).ok_or(EngineError::MissingExecutives)
    }

    pub fn contains(&self, id: &UserId) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fixed governance settings.
#[derive(Debug, Clone)]
pub struct PolicySettings {
    pub executives: ExecutiveAllowList,
    pub oversight_project: ProjectId,
    /// Every one of these must approve a sponsorship request.
    pub institutions: BTreeSet<Institution>,
    pub saa_survey: SurveyId,
    pub saa_survey_url: Url,
    pub oversight_survey_url: Url,
}

/// Collaborators shared by every capability an engine issues.
pub(crate) struct Ports {
    pub(crate) directory: Arc<dyn Directory>,
    pub(crate) agreements: Arc<dyn AgreementStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) training: TtlCache<UserId, NaiveDate>,
    pub(crate) settings: PolicySettings,
}

impl Ports {
    /// Aggregated decisions for the oversight project, recomputed per call.
    pub(crate) fn decisions(&self) -> Result<Vec<PolicyDecision>, StoreError> {
        let project = self.settings.oversight_project;
        let entries = self.agreements.sponsorship_decisions(project)?;
        Ok(aggregate(&entries, project, &self.settings.institutions))
    }

    pub(crate) fn verdicts(&self) -> Result<Vec<(PolicyDecision, Verdict)>, StoreError> {
        let today = self.clock.today();
        let total = self.settings.institutions.len();
        Ok(self
            .decisions()?
            .into_iter()
            .map(|d| {
                let verdict = d.verdict(total, today);
                (d, verdict)
            })
            .collect())
    }
}

/// Classifies identities into capabilities and audits capabilities handed
/// back across a trust boundary.
pub struct PolicyEngine {
    ports: Arc<Ports>,
    brand: u64,
}

impl PolicyEngine {
    /// Builds an engine; fails at startup rather than on the first request.
    pub fn new(
        settings: PolicySettings,
        directory: Arc<dyn Directory>,
        agreements: Arc<dyn AgreementStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        if settings.institutions.is_empty() {
            return Err(EngineError::NoInstitutions);
        }

        let training = TtlCache::new("training", Arc::clone(&clock));
        Ok(Self {
            ports: Arc::new(Ports {
                directory,
                agreements,
                clock,
                training,
                settings,
            }),
            brand: rand::random(),
        })
    }

    pub fn settings(&self) -> &PolicySettings {
        &self.ports.settings
    }

    /// Returns exactly one capability for `identity`.
    ///
    /// Executive allow-list first, then the directory's faculty flag, else
    /// Affiliate. A directory fault while checking faculty status yields the
    /// least-privileged tier.
    pub fn issue(&self, identity: Identity) -> Capability {
        let id = identity.id.clone();
        let ports = Arc::clone(&self.ports);

        let capability = if self.ports.settings.executives.contains(&id) {
            Capability::Executive(Executive::new(Account::new(identity, ports, self.brand)))
        } else {
            let faculty = match self.ports.directory.is_faculty(&id) {
                Ok(faculty) => faculty,
                Err(DirectoryError::Unavailable(reason)) => {
                    warn!(user_id = %id, reason = %reason, "faculty lookup failed; issuing affiliate");
                    false
                }
                Err(err) => {
                    debug!(user_id = %id, error = %err, "no faculty record");
                    false
                }
            };
            let account = Account::new(identity, ports, self.brand);
            if faculty {
                Capability::Faculty(Faculty::new(account))
            } else {
                Capability::Affiliate(Affiliate::new(account))
            }
        };

        info!(user_id = %id, tier = ?capability.tier(), "issued capability");
        capability
    }

    /// Resolves `id` in the directory, then [`issue`](Self::issue)s.
    pub fn issue_for(&self, id: &UserId) -> PolicyResult<Capability> {
        let identity = self
            .ports
            .directory
            .resolve(id)
            .map_err(|e| e.into_identity_error(id))?;
        Ok(self.issue(identity))
    }

    /// Checks a capability presented at a trust boundary.
    ///
    /// It must come from this engine, its tier must grant `required`, and its
    /// identity must still resolve in the directory.
    pub fn audit(&self, capability: &Capability, required: Permission) -> PolicyResult<()> {
        let tier = capability.tier();
        let id = &capability.identity().id;
        debug!(user_id = %id, ?tier, ?required, "audit");

        if capability.brand() != self.brand || !tier.satisfies(required) {
            warn!(user_id = %id, ?tier, ?required, "capability rejected");
            return Err(PolicyError::TypeMismatch { required, tier });
        }

        self.ports
            .directory
            .resolve(id)
            .map(|_| ())
            .map_err(|e| e.into_identity_error(id))
    }

    /// Every aggregated oversight decision with its verdict.
    pub fn decisions(&self) -> Result<Vec<(PolicyDecision, Verdict)>, StoreError> {
        self.ports.verdicts()
    }
}

impl fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("settings", &self.ports.settings)
            .finish_non_exhaustive()
    }
}

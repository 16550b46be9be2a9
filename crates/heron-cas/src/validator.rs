//! CAS protocol state machine.
//!
//! ```text
//! Anonymous ──▶ AwaitingTicket ──▶ Validating ──▶ Authenticated ──▶ Expired ──▶ Anonymous
//!                                       │                │
//!                                       ▼                ▼
//!                                  Anonymous         LoggedOut ──▶ Anonymous
//! ```
//!
//! The validator never writes a response itself. Each request yields an
//! [`AuthOutcome`] and the transport decides how to emit it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use heron_types::{Clock, UserId};
use tracing::{debug, info, warn};
use url::Url;

use crate::client::{CasClient, parse_validation};
use crate::credential::{Freshness, SessionCredential, SessionSigner, SessionTimings};
use crate::error::{AuthError, AuthResult, FailureReason};

/// Query parameter CAS uses to hand back the service ticket.
pub const TICKET_PARAM: &str = "ticket";

/// Default cookie carrying the session credential.
pub const DEFAULT_COOKIE_NAME: &str = "auth_tkt";

/// HTTP status for every redirect the validator asks for.
pub const SEE_OTHER: u16 = 303;

/// Protocol states, reported with every outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    AwaitingTicket,
    Validating,
    Authenticated,
    Expired,
    LoggedOut,
}

/// What the transport should do with the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieDirective {
    /// Set the cookie to this signed value.
    Set(String),
    /// Remove the cookie.
    Clear,
}

/// Result of running a request through the validator.
#[derive(Debug)]
pub enum AuthOutcome {
    /// Authenticated: proceed to policy evaluation.
    Continue {
        credential: SessionCredential,
        /// Present when the credential was silently reissued.
        refresh: Option<CookieDirective>,
    },
    /// Send a `303 See Other` to `location`.
    Redirect {
        location: Url,
        cookie: Option<CookieDirective>,
        state: AuthState,
    },
    /// The presented ticket failed. `challenge` is a fresh login URL for the
    /// same service, stripped of the failed ticket.
    Unauthorized { error: AuthError, challenge: Url },
}

impl AuthOutcome {
    pub fn state(&self) -> AuthState {
        match self {
            Self::Continue { .. } => AuthState::Authenticated,
            Self::Redirect { state, .. } => *state,
            Self::Unauthorized { .. } => AuthState::Anonymous,
        }
    }

    /// The authenticated user, if any.
    pub fn user(&self) -> Option<&UserId> {
        match self {
            Self::Continue { credential, .. } => Some(&credential.user),
            _ => None,
        }
    }
}

/// The parts of an inbound request the protocol looks at.
#[derive(Debug, Clone)]
pub struct CasRequest {
    pub url: Url,
    /// Raw value of the session cookie, if the client sent one.
    pub credential: Option<String>,
}

impl CasRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            credential: None,
        }
    }

    #[must_use]
    pub fn with_credential(mut self, value: impl Into<String>) -> Self {
        self.credential = Some(value.into());
        self
    }

    /// The `ticket` query parameter, if present and non-empty.
    pub fn ticket(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == TICKET_PARAM)
            .map(|(_, v)| v.into_owned())
            .filter(|t| !t.is_empty())
    }

    /// The request URL with every `ticket` parameter removed.
    pub fn service_url(&self) -> Url {
        strip_ticket(&self.url)
    }
}

fn strip_ticket(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != TICKET_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}

/// Validator construction parameters.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub cas_base: Url,
    pub app_secret: String,
    pub timings: SessionTimings,
    pub cookie_name: String,
    /// How long a presented ticket is remembered as spent.
    pub ticket_retention: Duration,
}

impl ValidatorConfig {
    pub fn new(cas_base: Url, app_secret: impl Into<String>) -> Self {
        Self {
            cas_base,
            app_secret: app_secret.into(),
            timings: SessionTimings::default(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            ticket_retention: crate::credential::DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timings(mut self, timings: SessionTimings) -> Self {
        self.timings = timings;
        self
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_ticket_retention(mut self, retention: Duration) -> Self {
        self.ticket_retention = retention;
        self
    }
}

/// Tickets already presented, remembered for a bounded time.
#[derive(Debug)]
struct SpentTickets {
    retention: chrono::Duration,
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl SpentTickets {
    fn new(retention: Duration) -> Self {
        Self {
            retention: chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX),
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Records `ticket` as spent. Returns false if it already was.
    fn claim(&self, ticket: &str, now: DateTime<Utc>) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        let retention = self.retention;
        seen.retain(|_, spent_at| now.signed_duration_since(*spent_at) < retention);

        if seen.contains_key(ticket) {
            return false;
        }
        seen.insert(ticket.to_string(), now);
        true
    }
}

/// CAS ticket validator and session credential authority.
pub struct TicketValidator {
    cas_base: Url,
    client: Arc<dyn CasClient>,
    signer: SessionSigner,
    timings: SessionTimings,
    cookie_name: String,
    clock: Arc<dyn Clock>,
    spent: SpentTickets,
}

impl TicketValidator {
    /// Creates a validator. A missing secret, unusable CAS address or zero
    /// ticket retention fails here rather than on the first request.
    pub fn new(
        config: ValidatorConfig,
        client: Arc<dyn CasClient>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        let signer = SessionSigner::new(config.app_secret.as_bytes())?;
        let cas_base = normalize_base(config.cas_base)?;
        if config.ticket_retention.is_zero() {
            return Err(AuthError::ZeroTicketRetention);
        }

        info!(cas = %cas_base, timeout_secs = config.timings.timeout().as_secs(), "CAS validator ready");

        Ok(Self {
            cas_base,
            client,
            signer,
            timings: config.timings,
            cookie_name: config.cookie_name,
            clock,
            spent: SpentTickets::new(config.ticket_retention),
        })
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn timings(&self) -> SessionTimings {
        self.timings
    }

    /// Runs one request through the protocol.
    pub fn on_request(&self, request: &CasRequest) -> AuthOutcome {
        let now = self.clock.now();
        let mut expired = false;

        if let Some(credential) = request
            .credential
            .as_deref()
            .and_then(|raw| self.signer.verify(raw))
        {
            match self.timings.freshness(&credential, now) {
                Freshness::Fresh => {
                    return AuthOutcome::Continue {
                        credential,
                        refresh: None,
                    };
                }
                Freshness::Reissue => {
                    let renewed = SessionCredential::new(credential.user, now);
                    debug!(user_id = %renewed.user, "reissuing session credential");
                    let cookie = self.signer.sign(&renewed);
                    return AuthOutcome::Continue {
                        credential: renewed,
                        refresh: Some(CookieDirective::Set(cookie)),
                    };
                }
                Freshness::Expired => {
                    info!(user_id = %credential.user, "session expired");
                    expired = true;
                }
            }
        }

        let service = request.service_url();

        if let Some(ticket) = request.ticket() {
            return match self.validate(&ticket, &service) {
                Ok(credential) => {
                    let cookie = self.signer.sign(&credential);
                    AuthOutcome::Redirect {
                        location: service,
                        cookie: Some(CookieDirective::Set(cookie)),
                        state: AuthState::Authenticated,
                    }
                }
                Err(error) => AuthOutcome::Unauthorized {
                    error,
                    challenge: self.login_url(&service),
                },
            };
        }

        debug!(service = %service, "no credential and no ticket; challenging");
        AuthOutcome::Redirect {
            location: self.login_url(&service),
            cookie: expired.then_some(CookieDirective::Clear),
            state: if expired {
                AuthState::Expired
            } else {
                AuthState::AwaitingTicket
            },
        }
    }

    /// Exchanges a service ticket for a session credential.
    ///
    /// A ticket is spent on first presentation whatever the answer, so a
    /// second attempt with the same value fails without contacting CAS.
    pub fn validate(&self, ticket: &str, service: &Url) -> AuthResult<SessionCredential> {
        let now = self.clock.now();

        if !self.spent.claim(ticket, now) {
            warn!(service = %service, "ticket presented twice");
            return Err(FailureReason::Replayed.into());
        }

        let mut endpoint = self.endpoint("validate");
        endpoint
            .query_pairs_mut()
            .append_pair("service", service.as_str())
            .append_pair(TICKET_PARAM, ticket);

        let body = self.client.fetch(&endpoint).map_err(|e| {
            warn!(error = %e, "CAS validation request failed");
            FailureReason::Unreachable(e.reason)
        })?;

        let user = parse_validation(&body).inspect_err(|reason| {
            info!(reason = %reason, service = %service, "CAS validation refused");
        })?;

        info!(user_id = %user, "CAS ticket validated");
        Ok(SessionCredential::new(user, now))
    }

    /// `<cas>/login?service=<service>`.
    pub fn login_url(&self, service: &Url) -> Url {
        let mut login = self.endpoint("login");
        login
            .query_pairs_mut()
            .append_pair("service", service.as_str());
        login
    }

    /// Ends the local session and sends the browser to CAS logout.
    ///
    /// The CAS server's own single-sign-on session is outside our control.
    pub fn logout(&self) -> AuthOutcome {
        AuthOutcome::Redirect {
            location: self.endpoint("logout"),
            cookie: Some(CookieDirective::Clear),
            state: AuthState::LoggedOut,
        }
    }

    /// Signs a fresh credential for `user` at the current time.
    pub fn mint(&self, user: UserId) -> String {
        self.signer
            .sign(&SessionCredential::new(user, self.clock.now()))
    }

    fn endpoint(&self, name: &str) -> Url {
        // `normalize_base` guarantees a trailing slash, so join appends.
        self.cas_base
            .join(name)
            .unwrap_or_else(|_| self.cas_base.clone())
    }
}

impl std::fmt::Debug for TicketValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketValidator")
            .field("cas_base", &self.cas_base.as_str())
            .field("timings", &self.timings)
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

fn normalize_base(mut base: Url) -> AuthResult<Url> {
    if base.cannot_be_a_base() {
        return Err(AuthError::InvalidCasAddress {
            address: base.to_string(),
            reason: "not a hierarchical URL".to_string(),
        });
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.set_query(None);
    base.set_fragment(None);
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TransportError;
    use chrono::NaiveDate;
    use heron_types::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct ScriptedCas {
        body: String,
        calls: AtomicUsize,
        last_url: Mutex<Option<Url>>,
    }

    impl ScriptedCas {
        fn answering(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_string(),
                ..Self::default()
            })
        }
    }

    impl CasClient for ScriptedCas {
        fn fetch(&self, url: &Url) -> Result<String, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_url.lock().unwrap() = Some(url.clone());
            Ok(self.body.clone())
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::at_date(
            NaiveDate::from_ymd_opt(2012, 1, 1).unwrap(),
        ))
    }

    fn validator(cas: Arc<ScriptedCas>, clock: Arc<ManualClock>) -> TicketValidator {
        let config = ValidatorConfig::new(Url::parse("http://example/cas/").unwrap(), "sekrit");
        TicketValidator::new(config, cas, clock).unwrap()
    }

    #[test]
    fn strip_ticket_keeps_other_params() {
        let url = Url::parse("http://localhost/x?a=1&ticket=ST-1&b=2").unwrap();
        assert_eq!(strip_ticket(&url).as_str(), "http://localhost/x?a=1&b=2");

        let url = Url::parse("http://localhost/?ticket=ST-1").unwrap();
        assert_eq!(strip_ticket(&url).as_str(), "http://localhost/");
    }

    #[test]
    fn base_without_trailing_slash_is_normalized() {
        let base = normalize_base(Url::parse("http://example/cas").unwrap()).unwrap();
        assert_eq!(base.join("login").unwrap().as_str(), "http://example/cas/login");
    }

    #[test]
    fn login_url_encodes_service() {
        let v = validator(ScriptedCas::answering("no\n"), clock());
        let service = Url::parse("http://localhost/").unwrap();
        assert_eq!(
            v.login_url(&service).as_str(),
            "http://example/cas/login?service=http%3A%2F%2Flocalhost%2F"
        );
    }

    #[test]
    fn validation_request_carries_service_and_ticket() {
        let cas = ScriptedCas::answering("yes\njohn.smith\n");
        let v = validator(Arc::clone(&cas), clock());
        let service = Url::parse("http://localhost/").unwrap();

        v.validate("ST-381409", &service).unwrap();

        let sent = cas.last_url.lock().unwrap().clone().unwrap();
        assert_eq!(sent.path(), "/cas/validate");
        let params: HashMap<String, String> = sent.query_pairs().into_owned().collect();
        assert_eq!(params["service"], "http://localhost/");
        assert_eq!(params["ticket"], "ST-381409");
    }

    #[test]
    fn spent_tickets_expire_after_retention() {
        let spent = SpentTickets::new(Duration::from_secs(600));
        let t0 = Utc::now();
        assert!(spent.claim("ST-1", t0));
        assert!(!spent.claim("ST-1", t0 + chrono::Duration::seconds(599)));
        assert!(spent.claim("ST-1", t0 + chrono::Duration::seconds(600)));
    }

    #[test]
    fn empty_secret_fails_at_construction() {
        let config = ValidatorConfig::new(Url::parse("http://example/cas/").unwrap(), "");
        let result = TicketValidator::new(config, ScriptedCas::answering("no\n"), clock());
        assert!(matches!(result, Err(AuthError::MissingSecret)));
    }

    #[test]
    fn zero_ticket_retention_fails_at_construction() {
        let config = ValidatorConfig::new(Url::parse("http://example/cas/").unwrap(), "sekrit")
            .with_ticket_retention(Duration::ZERO);
        let result = TicketValidator::new(config, ScriptedCas::answering("yes\njohn.smith\n"), clock());
        assert!(matches!(result, Err(AuthError::ZeroTicketRetention)));
    }

    #[test]
    fn empty_ticket_param_is_ignored() {
        let request = CasRequest::new(Url::parse("http://localhost/?ticket=").unwrap());
        assert_eq!(request.ticket(), None);
    }
}

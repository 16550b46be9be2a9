//! End-to-end walks through the CAS login protocol.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use heron_cas::{
    AuthError, AuthOutcome, AuthState, CasClient, CasRequest, CookieDirective, FailureReason,
    TicketValidator, TransportError, ValidatorConfig,
};
use heron_types::{ManualClock, UserId};
use url::Url;

// ============================================================================
// Fixtures
// ============================================================================

/// CAS stand-in that answers every validation with scripted lines.
#[derive(Debug)]
struct LinesCas {
    lines: Mutex<Vec<&'static str>>,
    reachable: bool,
    calls: AtomicUsize,
}

impl LinesCas {
    fn new(lines: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            lines: Mutex::new(lines.to_vec()),
            reachable: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            lines: Mutex::new(Vec::new()),
            reachable: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CasClient for LinesCas {
    fn fetch(&self, url: &Url) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.reachable {
            return Err(TransportError {
                endpoint: url.path().to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.lines.lock().unwrap().join("\n"))
    }
}

struct Harness {
    cas: Arc<LinesCas>,
    clock: Arc<ManualClock>,
    validator: TicketValidator,
}

fn harness(cas: Arc<LinesCas>) -> Harness {
    let clock = Arc::new(ManualClock::at_date(
        NaiveDate::from_ymd_opt(2012, 1, 1).unwrap(),
    ));
    let config = ValidatorConfig::new(Url::parse("http://example/cas/").unwrap(), "sekrit");
    let validator = TicketValidator::new(config, cas.clone(), clock.clone()).unwrap();
    Harness {
        cas,
        clock,
        validator,
    }
}

fn get(url: &str) -> CasRequest {
    CasRequest::new(Url::parse(url).unwrap())
}

const TICKET_URL: &str = "http://localhost/?ticket=ST-381409-fsFVbSPrkoD9nANruV4B-example";

/// Logs in with a ticket and returns the cookie value.
fn login(h: &Harness) -> String {
    match h.validator.on_request(&get(TICKET_URL)) {
        AuthOutcome::Redirect {
            cookie: Some(CookieDirective::Set(cookie)),
            ..
        } => cookie,
        other => panic!("expected login redirect, got {other:?}"),
    }
}

// ============================================================================
// Challenge and ticket exchange
// ============================================================================

#[test]
fn first_visit_redirects_to_cas_login() {
    let h = harness(LinesCas::new(&["yes", "john.smith"]));

    let outcome = h.validator.on_request(&get("http://localhost/"));

    match outcome {
        AuthOutcome::Redirect {
            location,
            cookie,
            state,
        } => {
            assert_eq!(
                location.as_str(),
                "http://example/cas/login?service=http%3A%2F%2Flocalhost%2F"
            );
            assert_eq!(cookie, None);
            assert_eq!(state, AuthState::AwaitingTicket);
        }
        other => panic!("expected redirect, got {other:?}"),
    }
    assert_eq!(h.cas.calls(), 0);
}

#[test]
fn valid_ticket_sets_cookie_and_strips_ticket() {
    let h = harness(LinesCas::new(&["yes", "john.smith"]));

    let outcome = h.validator.on_request(&get(TICKET_URL));

    match outcome {
        AuthOutcome::Redirect {
            location,
            cookie: Some(CookieDirective::Set(_)),
            state: AuthState::Authenticated,
        } => assert_eq!(location.as_str(), "http://localhost/"),
        other => panic!("expected authenticated redirect, got {other:?}"),
    }
}

#[test]
fn cookie_then_authenticates_without_cas() {
    let h = harness(LinesCas::new(&["yes", "john.smith"]));
    let cookie = login(&h);

    let outcome = h
        .validator
        .on_request(&get("http://localhost/").with_credential(cookie));

    assert_eq!(outcome.user(), Some(&UserId::new("john.smith")));
    assert_eq!(outcome.state(), AuthState::Authenticated);
    assert_eq!(h.cas.calls(), 1);
}

#[test]
fn same_ticket_fails_on_second_validation() {
    let h = harness(LinesCas::new(&["yes", "john.smith"]));
    let service = Url::parse("http://localhost/").unwrap();

    assert!(h.validator.validate("ST-1", &service).is_ok());
    let second = h.validator.validate("ST-1", &service);

    assert!(matches!(
        second,
        Err(AuthError::AuthenticationFailed(FailureReason::Replayed))
    ));
    assert_eq!(h.cas.calls(), 1, "a replayed ticket never reaches CAS");
}

#[test]
fn rejected_ticket_is_not_retried() {
    let h = harness(LinesCas::new(&["no", ""]));

    let first = h.validator.on_request(&get(TICKET_URL));
    let second = h.validator.on_request(&get(TICKET_URL));

    match first {
        AuthOutcome::Unauthorized { error, challenge } => {
            assert!(matches!(
                error,
                AuthError::AuthenticationFailed(FailureReason::Rejected)
            ));
            assert_eq!(
                challenge.as_str(),
                "http://example/cas/login?service=http%3A%2F%2Flocalhost%2F"
            );
        }
        other => panic!("expected unauthorized, got {other:?}"),
    }
    assert!(matches!(
        second,
        AuthOutcome::Unauthorized {
            error: AuthError::AuthenticationFailed(FailureReason::Replayed),
            ..
        }
    ));
    assert_eq!(h.cas.calls(), 1);
}

#[test]
fn unreachable_cas_is_authentication_failure() {
    let h = harness(LinesCas::unreachable());

    let outcome = h.validator.on_request(&get(TICKET_URL));

    match outcome {
        AuthOutcome::Unauthorized { error, .. } => {
            assert!(error.is_authentication_failure());
            assert!(matches!(
                error,
                AuthError::AuthenticationFailed(FailureReason::Unreachable(_))
            ));
        }
        other => panic!("expected unauthorized, got {other:?}"),
    }
    assert_eq!(outcome_state_after_failure(&h), AuthState::AwaitingTicket);
}

/// After a failure the next plain request starts a fresh challenge.
fn outcome_state_after_failure(h: &Harness) -> AuthState {
    h.validator.on_request(&get("http://localhost/")).state()
}

#[test]
fn malformed_response_is_authentication_failure() {
    let h = harness(LinesCas::new(&["<html>", "oops"]));
    let service = Url::parse("http://localhost/").unwrap();

    let result = h.validator.validate("ST-2", &service);

    assert!(matches!(
        result,
        Err(AuthError::AuthenticationFailed(FailureReason::Malformed(_)))
    ));
}

// ============================================================================
// Session lifetime
// ============================================================================

#[test]
fn credential_valid_at_599s_and_expired_at_601s() {
    let h = harness(LinesCas::new(&["yes", "john.smith"]));
    let cookie = login(&h);

    h.clock.advance(Duration::from_secs(599));
    let at_599 = h
        .validator
        .on_request(&get("http://localhost/").with_credential(cookie.clone()));
    assert_eq!(at_599.state(), AuthState::Authenticated);

    h.clock.advance(Duration::from_secs(2));
    let at_601 = h
        .validator
        .on_request(&get("http://localhost/").with_credential(cookie));
    match at_601 {
        AuthOutcome::Redirect {
            location,
            cookie,
            state,
        } => {
            assert_eq!(state, AuthState::Expired);
            assert_eq!(cookie, Some(CookieDirective::Clear));
            assert!(location.as_str().starts_with("http://example/cas/login?"));
        }
        other => panic!("expected challenge, got {other:?}"),
    }
}

#[test]
fn credential_reissued_after_threshold() {
    let h = harness(LinesCas::new(&["yes", "john.smith"]));
    let cookie = login(&h);

    h.clock.advance(Duration::from_secs(30));
    let early = h
        .validator
        .on_request(&get("http://localhost/").with_credential(cookie.clone()));
    assert!(matches!(early, AuthOutcome::Continue { refresh: None, .. }));

    h.clock.advance(Duration::from_secs(40));
    let refreshed = match h
        .validator
        .on_request(&get("http://localhost/").with_credential(cookie))
    {
        AuthOutcome::Continue {
            credential,
            refresh: Some(CookieDirective::Set(refreshed)),
        } => {
            assert_eq!(credential.user, UserId::new("john.smith"));
            refreshed
        }
        other => panic!("expected reissue, got {other:?}"),
    };

    // The refreshed credential restarts the clock: 9 more minutes is fine.
    h.clock.advance(Duration::from_secs(9 * 60));
    let later = h
        .validator
        .on_request(&get("http://localhost/").with_credential(refreshed));
    assert_eq!(later.state(), AuthState::Authenticated);
    assert_eq!(h.cas.calls(), 1, "reissue never round-trips to CAS");
}

#[test]
fn forged_cookie_is_treated_as_anonymous() {
    let h = harness(LinesCas::new(&["yes", "john.smith"]));

    let outcome = h
        .validator
        .on_request(&get("http://localhost/").with_credential("eyJ1aWQiOiJiaWcud2lnIn0.AAAA"));

    assert_eq!(outcome.state(), AuthState::AwaitingTicket);
}

#[test]
fn logout_clears_cookie_and_redirects_to_cas() {
    let h = harness(LinesCas::new(&["yes", "john.smith"]));
    let _cookie = login(&h);

    match h.validator.logout() {
        AuthOutcome::Redirect {
            location,
            cookie,
            state,
        } => {
            assert_eq!(location.as_str(), "http://example/cas/logout");
            assert_eq!(cookie, Some(CookieDirective::Clear));
            assert_eq!(state, AuthState::LoggedOut);
        }
        other => panic!("expected logout redirect, got {other:?}"),
    }

    let after = h.validator.on_request(&get("http://localhost/"));
    assert_eq!(after.state(), AuthState::AwaitingTicket);
}

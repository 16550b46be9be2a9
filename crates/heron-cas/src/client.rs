//! CAS validation transport and response parsing.
//!
//! The CAS 1.0 `validate` endpoint answers with two newline-separated lines:
//! `yes\n<userid>\n` on success, `no\n` otherwise.

use heron_types::UserId;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::error::FailureReason;

/// Transport failure talking to the CAS server.
#[derive(Debug, Error)]
#[error("CAS request to {endpoint} failed: {reason}")]
pub struct TransportError {
    pub endpoint: String,
    pub reason: String,
}

/// Fetches a CAS endpoint body.
///
/// Implementations are blocking and make exactly one attempt: no retry, no
/// timeout policy of their own. Callers that want resilience wrap the client.
pub trait CasClient: Send + Sync {
    fn fetch(&self, url: &Url) -> Result<String, TransportError>;
}

/// `CasClient` backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqCasClient {
    agent: ureq::Agent,
}

impl UreqCasClient {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqCasClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CasClient for UreqCasClient {
    fn fetch(&self, url: &Url) -> Result<String, TransportError> {
        // Only scheme, host and path go to the log; the query carries the ticket.
        let endpoint = format!("{}{}", url.origin().ascii_serialization(), url.path());
        debug!(endpoint = %endpoint, "cas validation request");

        let response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|e| TransportError {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        response.into_string().map_err(|e| TransportError {
            endpoint,
            reason: e.to_string(),
        })
    }
}

/// Parses a CAS 1.0 validation body into the authenticated user id.
pub fn parse_validation(body: &str) -> Result<UserId, FailureReason> {
    let mut lines = body.split('\n').map(|line| line.trim_end_matches('\r'));

    match lines.next() {
        Some("yes") => {
            let uid = lines.next().map(str::trim).unwrap_or_default();
            if uid.is_empty() {
                return Err(FailureReason::Malformed(
                    "`yes` without a user id".to_string(),
                ));
            }
            Ok(UserId::new(uid))
        }
        Some("no") => Err(FailureReason::Rejected),
        Some(other) => Err(FailureReason::Malformed(format!(
            "unexpected first line {:?}",
            truncate(other, 32)
        ))),
        None => Err(FailureReason::Malformed("empty response".to_string())),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn yes_yields_user_id() {
        assert_eq!(
            parse_validation("yes\njohn.smith\n"),
            Ok(UserId::new("john.smith"))
        );
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        assert_eq!(
            parse_validation("yes\r\njohn.smith\r\n"),
            Ok(UserId::new("john.smith"))
        );
    }

    #[test]
    fn no_is_rejection() {
        assert_eq!(parse_validation("no\n\n"), Err(FailureReason::Rejected));
    }

    #[test_case("" ; "empty body")]
    #[test_case("yes" ; "yes without user")]
    #[test_case("yes\n   \n" ; "yes with blank user")]
    #[test_case("<html>500</html>" ; "html error page")]
    #[test_case("YES\njohn.smith" ; "wrong case")]
    fn malformed_bodies(body: &str) {
        assert!(matches!(
            parse_validation(body),
            Err(FailureReason::Malformed(_))
        ));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ab", 10), "ab");
    }
}

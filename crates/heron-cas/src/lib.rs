//! # heron-cas: CAS front door for HERON
//!
//! Converts a one-time CAS service ticket into a signed, time-bounded
//! session credential and keeps that credential alive with sliding
//! expiration.
//!
//! ## Protocol
//!
//! ```text
//! browser ──GET /──────────────────────────▶ TicketValidator
//!         ◀──303 <cas>/login?service=/─────  (no credential, no ticket)
//! browser ──GET <cas>/login ──────────────▶ CAS
//!         ◀──302 /?ticket=ST-…──────────────
//! browser ──GET /?ticket=ST-… ────────────▶ TicketValidator ──GET <cas>/validate──▶ CAS
//!                                                            ◀── "yes\n<uid>" ─────
//!         ◀──303 / + Set-Cookie auth_tkt ───  (ticket stripped from the URL)
//! browser ──GET / + auth_tkt ─────────────▶ Continue (reissued after 60s, expired at 600s)
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use heron_cas::{AuthOutcome, CasClient, CasRequest, TicketValidator, TransportError, ValidatorConfig};
//! use heron_types::SystemClock;
//! use url::Url;
//!
//! struct AlwaysYes;
//! impl CasClient for AlwaysYes {
//!     fn fetch(&self, _url: &Url) -> Result<String, TransportError> {
//!         Ok("yes\njohn.smith\n".to_string())
//!     }
//! }
//!
//! let config = ValidatorConfig::new(Url::parse("https://cas.example/cas/")?, "sekrit");
//! let validator = TicketValidator::new(config, Arc::new(AlwaysYes), Arc::new(SystemClock))?;
//!
//! let request = CasRequest::new(Url::parse("https://heron.example/?ticket=ST-1")?);
//! match validator.on_request(&request) {
//!     AuthOutcome::Redirect { location, .. } => assert_eq!(location.as_str(), "https://heron.example/"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod credential;
pub mod error;
pub mod validator;

pub use client::{CasClient, TransportError, UreqCasClient, parse_validation};
pub use credential::{Freshness, SessionCredential, SessionSigner, SessionTimings};
pub use error::{AuthError, AuthResult, FailureReason};
pub use validator::{
    AuthOutcome, AuthState, CasRequest, CookieDirective, SEE_OTHER, TicketValidator,
    ValidatorConfig,
};

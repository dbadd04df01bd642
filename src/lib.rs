pub mod config;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod roots;
pub mod tls;
pub mod urkel;
pub mod verifier;

pub use config::VerifierConfig;
pub use error::{ErrorCategory, VerifyError};
pub use verifier::{CertificateInfo, Orchestrator, VerificationOutcome};

//! Fetching proofs from external services when a certificate lacks them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, select_ok};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::ErrorCategory;

/// The two proofs a certificate needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProofKind {
    Dnssec,
    Urkel,
}

impl ProofKind {
    /// Query string selecting this proof on a proof service
    pub fn query(&self) -> &'static str {
        match self {
            Self::Dnssec => "dnssec",
            Self::Urkel => "urkel",
        }
    }
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dnssec => f.write_str("DNSSEC"),
            Self::Urkel => f.write_str("Urkel"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("Fetching {0} proof timed out")]
    Timeout(ProofKind),

    #[error("No external service configured for {0} proofs")]
    NoServices(ProofKind),
}

impl FetchError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Transport
    }
}

/// Anything that can hand out a proof payload for a name
#[async_trait]
pub trait ProofSource: Send + Sync {
    /// `name` is the full DNS name for DNSSEC and the TLD for Urkel.
    async fn fetch(&self, kind: ProofKind, name: &str) -> Result<Vec<u8>, FetchError>;

    fn describe(&self) -> String;
}

#[derive(Deserialize)]
struct ProofResponse {
    dnssec: Option<String>,
    urkel: Option<String>,
}

/// Proof service answering `GET <base>/<name>?dnssec|urkel` with hex in JSON
#[derive(Debug, Clone)]
pub struct HttpProofService {
    base: String,
    client: reqwest::Client,
}

impl HttpProofService {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sane-verifier/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            base: base.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn url(&self, kind: ProofKind, name: &str) -> String {
        format!(
            "{}/{}?{}",
            self.base,
            name.trim_end_matches('.'),
            kind.query()
        )
    }
}

#[async_trait]
impl ProofSource for HttpProofService {
    async fn fetch(&self, kind: ProofKind, name: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.url(kind, name);
        debug!("Fetching {} proof from {}", kind, url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Http {
                url: url.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let invalid = |message: String| FetchError::InvalidResponse {
            url: url.clone(),
            message,
        };
        let body: ProofResponse = response.json().await.map_err(|e| invalid(e.to_string()))?;
        let field = match kind {
            ProofKind::Dnssec => body.dnssec,
            ProofKind::Urkel => body.urkel,
        };
        let hex_payload = field.ok_or_else(|| invalid(format!("missing {:?} field", kind.query())))?;
        hex::decode(hex_payload.trim()).map_err(|e| invalid(e.to_string()))
    }

    fn describe(&self) -> String {
        self.base.clone()
    }
}

/// An ordered list of proof sources raced against each other
#[derive(Clone, Default)]
pub struct FallbackServices {
    sources: Vec<Arc<dyn ProofSource>>,
    timeout: Option<Duration>,
}

impl fmt::Debug for FallbackServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackServices")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.describe()).collect::<Vec<_>>(),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FallbackServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// One HTTP service per base URL
    pub fn http<I, S>(bases: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sources = bases
            .into_iter()
            .map(|b| Arc::new(HttpProofService::new(b, timeout)) as Arc<dyn ProofSource>)
            .collect();
        Self {
            sources,
            timeout: Some(timeout),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn ProofSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Bound the whole race, on top of any per-source limit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// First well-formed answer from any source wins; the rest are dropped.
    pub async fn fetch(&self, kind: ProofKind, name: &str) -> Result<Vec<u8>, FetchError> {
        if self.sources.is_empty() {
            return Err(FetchError::NoServices(kind));
        }

        let attempts: Vec<BoxFuture<'_, Result<Vec<u8>, FetchError>>> = self
            .sources
            .iter()
            .map(|source| {
                Box::pin(async move {
                    let result = source.fetch(kind, name).await;
                    if let Err(e) = &result {
                        warn!("{} proof from {} failed: {}", kind, source.describe(), e);
                    }
                    result
                }) as BoxFuture<'_, _>
            })
            .collect();

        let race = select_ok(attempts);
        let (payload, _remaining) = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, race)
                .await
                .map_err(|_| FetchError::Timeout(kind))??,
            None => race.await?,
        };

        info!("Fetched {} proof for {} ({} bytes)", kind, name, payload.len());
        Ok(payload)
    }
}

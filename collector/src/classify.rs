use crate::{
    authorization::TokenRequestLookup,
    prometheus::{
        QueryError,
        Warnings,
    },
};
use url::Url;

const FORBIDDEN_MARKER: &str = "client error: 403";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The backend rejected the token.
    Authorization,
    /// Anything else: network trouble, malformed responses, backend errors.
    Query,
}

impl FailureClass {
    pub fn of(message: &str) -> Self {
        if message.contains(FORBIDDEN_MARKER) {
            FailureClass::Authorization
        } else {
            FailureClass::Query
        }
    }
}

/// Why a single getter did not contribute a datapoint in a poll cycle.
#[derive(thiserror::Error, Debug)]
pub enum PollError {
    #[error("metrics getter failed with 403 (Forbidden), a new token is required: {source}")]
    Forbidden { source: QueryError },
    #[error("metrics getter failed with 403 (Forbidden) - retrieve a new token from {token_url}: {source}")]
    ForbiddenWithTokenUrl { source: QueryError, token_url: Url },
    #[error("metrics getter failed - check whether prometheus is still healthy in the cluster: {source}")]
    Query { source: QueryError },
    #[error("metrics getter had unexpected warnings: {}", .0.join("; "))]
    Warnings(Warnings),
    #[error("metrics value could not be retrieved for getter {0}")]
    EmptyVector(String),
}

impl PollError {
    pub fn is_authorization(&self) -> bool {
        matches!(self, PollError::Forbidden { .. } | PollError::ForbiddenWithTokenUrl { .. })
    }
}

/// Turns a failed query into a [`PollError`], resolving the token request page for
/// authorization failures when a lookup is available.
pub async fn classify(source: QueryError, token_lookup: Option<&dyn TokenRequestLookup>) -> PollError {
    match FailureClass::of(&source.to_string()) {
        FailureClass::Query => PollError::Query { source },
        FailureClass::Authorization => {
            let Some(lookup) = token_lookup else {
                return PollError::Forbidden { source };
            };
            match lookup.token_request_url().await {
                Ok(token_url) => PollError::ForbiddenWithTokenUrl { source, token_url },
                Err(err) => {
                    debug!("could not resolve token request url: {err:#}");
                    PollError::Forbidden { source }
                }
            }
        }
    }
}

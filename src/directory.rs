//! Order directory interface
//!
//! The directory is the system of record for orders and their collection
//! status. `mark_collected` must be atomic server-side, conditional on
//! `collected = false`; the conflict outcome is how a concurrent redemption
//! from another kiosk shows up here.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::DirectoryConfig;
use crate::errors::KioskError;
use crate::types::RedeemableOrder;

/// Error talking to the order directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Network-level failure: timeout, refused connection, dropped stream.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Directory reachable but the exchange failed (5xx, bad payload).
    #[error("Directory error: {0}")]
    Protocol(String),
}

/// Result of the conditional mark-collected mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The order transitioned collected false -> true in this call.
    Updated,
    /// The precondition failed: someone else collected it first.
    Conflict,
}

/// External order store consumed by the redemption engine.
#[async_trait]
pub trait OrderDirectory: Send + Sync {
    /// Resolve a redemption code to an order, if any.
    async fn find_by_code(&self, code: &str) -> Result<Option<RedeemableOrder>, DirectoryError>;

    /// Atomically mark an order collected, conditional on it not being
    /// collected yet.
    async fn mark_collected(&self, order_id: &str) -> Result<MarkOutcome, DirectoryError>;
}

/// HTTP-backed order directory.
pub struct HttpOrderDirectory {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpOrderDirectory {
    pub fn new(config: &DirectoryConfig) -> Result<Self, KioskError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| KioskError::DirectoryError(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl OrderDirectory for HttpOrderDirectory {
    async fn find_by_code(&self, code: &str) -> Result<Option<RedeemableOrder>, DirectoryError> {
        let url = format!("{}/orders/by-code/{}", self.base_url, code);
        log::debug!("Looking up order by code at {}", url);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let order = response
                    .json::<RedeemableOrder>()
                    .await
                    .map_err(|e| DirectoryError::Protocol(format!("Bad order payload: {}", e)))?;
                Ok(Some(order))
            }
            status => Err(DirectoryError::Protocol(format!(
                "Lookup returned {}",
                status
            ))),
        }
    }

    async fn mark_collected(&self, order_id: &str) -> Result<MarkOutcome, DirectoryError> {
        let url = format!("{}/orders/{}/collect", self.base_url, order_id);
        log::debug!("Marking order collected at {}", url);

        let response = self
            .authorize(self.client.post(&url))
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::CONFLICT => Ok(MarkOutcome::Conflict),
            status if status.is_success() => Ok(MarkOutcome::Updated),
            status => Err(DirectoryError::Protocol(format!(
                "Mark-collected returned {}",
                status
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let config = DirectoryConfig {
            base_url: "http://localhost:8080/api/".to_string(),
            auth_token: None,
            timeout_ms: 1000,
        };
        let directory = HttpOrderDirectory::new(&config).unwrap();
        assert_eq!(directory.base_url, "http://localhost:8080/api");
    }

    #[test]
    fn test_mark_outcome_equality() {
        assert_eq!(MarkOutcome::Updated, MarkOutcome::Updated);
        assert_ne!(MarkOutcome::Updated, MarkOutcome::Conflict);
    }
}

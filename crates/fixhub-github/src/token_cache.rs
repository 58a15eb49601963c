//! Installation access token cache
//!
//! An installation token is valid for an hour. The cache hands out the
//! current token while more than a minute of validity remains and otherwise
//! signs a new App JWT and exchanges it. Readers only take a short read lock
//! to clone an `Arc`; a refresh swaps the whole token. Two callers racing on
//! an expired token may both exchange, which GitHub tolerates.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fixhub_core::{Clock, FixhubError, Result, SystemClock};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::signer::TokenSigner;

/// Tokens this close to expiry are refreshed
const REFRESH_MARGIN_SECS: i64 = 60;

/// An installation token and its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl SignedToken {
    fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + Duration::seconds(REFRESH_MARGIN_SECS)
    }
}

/// `POST /app/installations/{id}/access_tokens`
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn create_installation_token(&self, installation_id: u64, jwt: &str)
        -> Result<SignedToken>;
}

/// Shared installation token state
pub struct InstallationTokenCache {
    signer: Arc<TokenSigner>,
    exchange: Arc<dyn TokenExchange>,
    installation_id: Option<u64>,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<Arc<SignedToken>>>,
}

impl InstallationTokenCache {
    pub fn new(
        signer: Arc<TokenSigner>,
        exchange: Arc<dyn TokenExchange>,
        installation_id: Option<u64>,
    ) -> Self {
        Self {
            signer,
            exchange,
            installation_id,
            clock: Arc::new(SystemClock),
            current: RwLock::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current token, refreshed when missing or within a minute of expiry
    pub async fn get_installation_token(&self) -> Result<String> {
        if let Some(token) = self.cached() {
            if token.is_fresh_at(self.clock.now()) {
                return Ok(token.value.clone());
            }
        }

        let installation_id = self.installation_id.ok_or_else(|| {
            FixhubError::Config("GitHub installation id is required".to_string())
        })?;

        tracing::info!(
            app_id = %self.signer.masked_app_id(),
            installation_id,
            "Requesting GitHub installation token"
        );

        let jwt = self.signer.create_jwt()?;
        let token = self
            .exchange
            .create_installation_token(installation_id, &jwt)
            .await
            .map_err(|e| {
                tracing::error!(
                    app_id = %self.signer.masked_app_id(),
                    installation_id,
                    "Failed to obtain GitHub installation token: {}",
                    e
                );
                e
            })?;

        let value = token.value.clone();
        *self.current.write() = Some(Arc::new(token));
        Ok(value)
    }

    /// The cached token, fresh or not
    pub fn cached(&self) -> Option<Arc<SignedToken>> {
        self.current.read().clone()
    }

    /// Drop the cached token
    pub fn reset(&self) {
        *self.current.write() = None;
    }
}

/// Hands out numbered tokens and counts exchanges
pub struct MockTokenExchange {
    clock: Arc<dyn Clock>,
    lifetime: Duration,
    calls: AtomicUsize,
    last_jwt: parking_lot::Mutex<Option<String>>,
}

impl MockTokenExchange {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            lifetime: Duration::hours(1),
            calls: AtomicUsize::new(0),
            last_jwt: parking_lot::Mutex::new(None),
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_jwt(&self) -> Option<String> {
        self.last_jwt.lock().clone()
    }
}

#[async_trait]
impl TokenExchange for MockTokenExchange {
    async fn create_installation_token(
        &self,
        installation_id: u64,
        jwt: &str,
    ) -> Result<SignedToken> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_jwt.lock() = Some(jwt.to_string());
        Ok(SignedToken {
            value: format!("ghs_{}_{}", installation_id, n),
            expires_at: self.clock.now() + self.lifetime,
        })
    }
}

//! Server application state

use std::sync::Arc;

use crate::auth::Authenticator;
use crate::billing::BillingProvider;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::PdfLimits;
use crate::fetch::Fetcher;
use crate::generate::StudyGenerator;
use crate::ratelimit::GuestLimiter;
use crate::storage::{BlobStore, StudyStore};

/// Shared application state for all route handlers
pub struct AppState {
    pub config: Config,
    pub store: StudyStore,
    pub blobs: BlobStore,
    pub fetcher: Fetcher,
    pub generator: Arc<dyn StudyGenerator>,
    pub auth: Arc<dyn Authenticator>,
    /// `None` when no Stripe key is configured for the active mode
    pub billing: Option<Arc<dyn BillingProvider>>,
    pub guest_limiter: GuestLimiter,
}

impl AppState {
    pub fn new(
        config: Config,
        store: StudyStore,
        generator: Arc<dyn StudyGenerator>,
        auth: Arc<dyn Authenticator>,
        billing: Option<Arc<dyn BillingProvider>>,
    ) -> Result<Self> {
        let blobs = BlobStore::new(config.storage_dir(), &config.server.public_base_url);
        let guest_limiter = GuestLimiter::from_config(&config.limits);
        Ok(Self {
            config,
            store,
            blobs,
            fetcher: Fetcher::new()?,
            generator,
            auth,
            billing,
            guest_limiter,
        })
    }

    pub fn pdf_limits(&self) -> PdfLimits {
        PdfLimits::from_config(&self.config.limits)
    }

    pub fn billing(&self) -> Result<&dyn BillingProvider> {
        self.billing
            .as_deref()
            .ok_or_else(|| Error::Config("Stripe is not configured".to_string()))
    }
}

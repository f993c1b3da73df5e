//! Shared handler state

use crate::billing::BillingService;
use crate::config::AppConfig;
use crate::error::Result;
use crate::images::ImageService;
use crate::services::hosting::{CloudinaryClient, HostingProvider};
use crate::services::notify::{NotificationSink, TracingNotifier};
use crate::services::payments::{PayPalClient, PaymentGateway};
use crate::services::removal::{BackgroundRemover, RemoveBgClient};
use crate::store::{DocumentStore, MemoryStore};
use std::sync::Arc;

/// Services every handler can reach
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub hosting: Arc<dyn HostingProvider>,
    pub images: Arc<ImageService>,
    pub billing: Arc<BillingService>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl AppState {
    /// Wire services over the given store and providers
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        hosting: Arc<dyn HostingProvider>,
        remover: Arc<dyn BackgroundRemover>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let images = ImageService::new(Arc::clone(&store), Arc::clone(&hosting), remover);
        let billing = BillingService::new(gateway, Arc::clone(&store));
        Self {
            store,
            hosting,
            images: Arc::new(images),
            billing: Arc::new(billing),
            notifier: Arc::new(TracingNotifier),
        }
    }

    /// Replace the image service, e.g. to change folder or page size
    #[must_use]
    pub fn with_images(mut self, images: ImageService) -> Self {
        self.images = Arc::new(images);
        self
    }

    /// Live provider clients and an in-memory store
    ///
    /// # Errors
    /// - Any provider HTTP client fails to build
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = config.request_timeout();
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let hosting: Arc<dyn HostingProvider> =
            Arc::new(CloudinaryClient::new(config.hosting.clone(), timeout)?);
        let remover: Arc<dyn BackgroundRemover> =
            Arc::new(RemoveBgClient::new(config.removal.clone(), timeout)?);
        let gateway: Arc<dyn PaymentGateway> =
            Arc::new(PayPalClient::new(config.payments.clone(), timeout)?);

        let images = ImageService::new(Arc::clone(&store), Arc::clone(&hosting), Arc::clone(&remover))
            .with_folder(config.hosting.folder.clone())
            .with_page_size(config.page_size);

        Ok(Self::new(store, hosting, remover, gateway).with_images(images))
    }
}

//! Services around the pure composition core
//!
//! Provider clients talk to the hosting, background-removal and payment
//! APIs. The remaining modules hold session-side helpers: request
//! sequencing, debouncing, preview orchestration and user notifications.

pub mod debounce;
pub mod hosting;
pub mod notify;
pub mod payments;
pub mod preview;
pub mod removal;
pub mod sequence;
pub mod testing;

pub use debounce::{Debouncer, DEFAULT_DEBOUNCE};
pub use hosting::{CloudinaryClient, HostingProvider};
pub use notify::{
    CollectingNotifier, NoOpNotifier, Notification, NotificationLevel, NotificationSink,
    TracingNotifier,
};
pub use payments::{CapturedOrder, PayPalClient, PaymentGateway, PaymentOrder};
pub use preview::{Preview, PreviewSession};
pub use removal::{validate_png, BackgroundRemover, RemoveBgClient};
pub use sequence::{RequestSequencer, Ticket};

use crate::error::{ImaginariumError, Result, Upstream};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Build the HTTP client shared by one provider
pub(crate) fn http_client(service: Upstream, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("imaginarium/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ImaginariumError::network_error(service, "create HTTP client", &e))
}

/// Fail with the status and body when the provider did not answer 2xx
pub(crate) async fn ensure_success(
    service: Upstream,
    operation: &str,
    response: Response,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(%service, operation, %status, "Provider returned an error status");
    Err(ImaginariumError::upstream_status(service, operation, status, &body))
}

/// Check the status and decode a JSON body
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: Upstream,
    operation: &str,
    response: Response,
) -> Result<T> {
    let response = ensure_success(service, operation, response).await?;
    response.json::<T>().await.map_err(|e| {
        ImaginariumError::upstream(service, format!("{operation} returned an unreadable body: {e}"))
    })
}

//! Preview session for background replacement
//!
//! Holds the inputs of one composition, applies edits through the pure
//! reducer and turns the current inputs into a delivery URL. Responses that
//! lose the race against a newer request are dropped.

use crate::composition::{compose, Composition};
use crate::error::Result;
use crate::services::hosting::HostingProvider;
use crate::services::notify::NotificationSink;
use crate::services::sequence::{RequestSequencer, Ticket};
use crate::tracing_config::{events, spans};
use crate::types::{CompositionInputs, InputChange};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::Instrument;

/// A rendered preview
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    #[serde(skip)]
    pub ticket: Ticket,
    pub url: String,
    #[serde(flatten)]
    pub composition: Composition,
}

/// One user's background-replacement editor state
pub struct PreviewSession {
    hosting: Arc<dyn HostingProvider>,
    notifier: Arc<dyn NotificationSink>,
    sequencer: RequestSequencer,
    inputs: Mutex<CompositionInputs>,
    current: Mutex<Option<Preview>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PreviewSession {
    #[must_use]
    pub fn new(
        hosting: Arc<dyn HostingProvider>,
        notifier: Arc<dyn NotificationSink>,
        inputs: CompositionInputs,
    ) -> Self {
        Self {
            hosting,
            notifier,
            sequencer: RequestSequencer::new(),
            inputs: Mutex::new(inputs),
            current: Mutex::new(None),
        }
    }

    /// Snapshot of the current inputs
    #[must_use]
    pub fn inputs(&self) -> CompositionInputs {
        lock(&self.inputs).clone()
    }

    /// Latest applied preview
    #[must_use]
    pub fn current(&self) -> Option<Preview> {
        lock(&self.current).clone()
    }

    /// Apply one edit and return the new inputs; no network call
    pub fn update(&self, change: InputChange) -> CompositionInputs {
        let mut inputs = lock(&self.inputs);
        *inputs = inputs.apply(change);
        inputs.clone()
    }

    /// Apply an edit, then render
    ///
    /// # Errors
    /// Same as [`PreviewSession::refresh`]
    pub async fn change(&self, change: InputChange) -> Result<Option<Preview>> {
        self.update(change);
        self.refresh().await
    }

    /// Render the current inputs
    ///
    /// Returns `Ok(None)` when a newer request superseded this one.
    ///
    /// # Errors
    /// - `InvalidDimensions` before any network call
    /// - `UpstreamUnavailable` or `NotFound` from the host; also reported to
    ///   the notification sink
    pub async fn refresh(&self) -> Result<Option<Preview>> {
        let ticket = self.sequencer.issue();
        let inputs = self.inputs();
        let span = spans::composition(
            &inputs.background.public_id,
            &inputs.subject.public_id,
            ticket.value(),
        );
        self.render(ticket, inputs).instrument(span).await
    }

    async fn render(&self, ticket: Ticket, mut inputs: CompositionInputs) -> Result<Option<Preview>> {
        let started = Instant::now();

        // Local validation first; a bad input never reaches the host
        compose(&inputs)?;

        let background = match self.hosting.resource(&inputs.background.public_id).await {
            Ok(background) => background,
            Err(error) => {
                events::upstream_failure(&error, "preview background lookup");
                self.notifier.notify_error(&error);
                return Err(error);
            },
        };

        // The host knows the real size; the client-side copy may be stale
        if background.dimensions() != inputs.background.dimensions() {
            tracing::debug!(
                public_id = %background.public_id,
                width = background.width,
                height = background.height,
                "Background size refreshed from host"
            );
        }
        inputs.background = background;

        let composition = compose(&inputs)?;
        let url = self
            .hosting
            .build_url(&inputs.background.public_id, &composition.transformation());
        let preview = Preview {
            ticket,
            url,
            composition,
        };

        // Check and store under one lock so a newer preview is never overwritten
        let applied = {
            let mut current = lock(&self.current);
            self.sequencer
                .apply_if_latest(ticket, preview.clone(), |preview| *current = Some(preview))
        };
        events::performance_metric("preview", started.elapsed().as_millis() as u64);

        Ok(applied.then_some(preview))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImaginariumError;
    use crate::services::notify::CollectingNotifier;
    use crate::services::testing::MockHosting;
    use crate::types::fixtures::asset;

    fn session(hosting: Arc<MockHosting>, notifier: &CollectingNotifier) -> PreviewSession {
        let inputs = CompositionInputs::new(asset("bg", 1920, 1280), asset("subject", 613, 407));
        PreviewSession::new(hosting, Arc::new(notifier.clone()), inputs)
    }

    #[tokio::test]
    async fn test_refresh_builds_url() {
        let hosting = Arc::new(MockHosting::new().with_asset(asset("bg", 1920, 1280)));
        let notifier = CollectingNotifier::new();
        let session = session(hosting, &notifier);

        let preview = session.refresh().await.unwrap().unwrap();
        assert!(preview.url.starts_with("https://images.test/upload/c_scale,w_1280,h_853/"));
        assert!(preview.url.ends_with("/bg"));
        assert_eq!(session.current(), Some(preview));
        assert!(notifier.is_empty());
    }

    #[tokio::test]
    async fn test_host_size_wins() {
        // Host reports a portrait background although the client thinks landscape
        let hosting = Arc::new(MockHosting::new().with_asset(asset("bg", 1280, 1920)));
        let session = session(hosting, &CollectingNotifier::new());

        let preview = session.refresh().await.unwrap().unwrap();
        assert_eq!(preview.composition.geometry.canvas_width, 853);
        assert_eq!(preview.composition.geometry.canvas_height, 1280);
    }

    #[tokio::test]
    async fn test_change_applies_reducer() {
        let hosting = Arc::new(MockHosting::new().with_asset(asset("bg", 1920, 1280)));
        let session = session(hosting, &CollectingNotifier::new());

        let preview = session
            .change(InputChange::Scale(50.0))
            .await
            .unwrap()
            .unwrap();
        assert!((session.inputs().scale - 5.0).abs() < f64::EPSILON);
        assert!(preview.url.contains("c_crop,w_"));
    }

    #[tokio::test]
    async fn test_upstream_failure_notifies() {
        let hosting = Arc::new(MockHosting::new().with_asset(asset("bg", 1920, 1280)));
        hosting.set_failing(true);
        let notifier = CollectingNotifier::new();
        let session = session(Arc::clone(&hosting), &notifier);

        let err = session.refresh().await.unwrap_err();
        assert!(err.is_upstream());
        assert_eq!(notifier.len(), 1);
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn test_invalid_inputs_skip_network() {
        let hosting = Arc::new(MockHosting::new());
        hosting.set_failing(true);
        let notifier = CollectingNotifier::new();
        let inputs = CompositionInputs::new(asset("bg", 0, 1280), asset("subject", 613, 407));
        let session = PreviewSession::new(hosting, Arc::new(notifier.clone()), inputs);

        let err = session.refresh().await.unwrap_err();
        assert!(matches!(err, ImaginariumError::InvalidDimensions(_)));
        // A failing host would have produced a notification
        assert!(notifier.is_empty());
    }

    #[tokio::test]
    async fn test_stale_response_discarded() {
        let hosting = Arc::new(MockHosting::new().with_asset(asset("bg", 1920, 1280)));
        let session = session(hosting, &CollectingNotifier::new());

        let stale = session.sequencer.issue();
        let newer = session.refresh().await.unwrap();
        assert!(newer.is_some());

        let late = session.render(stale, session.inputs()).await.unwrap();
        assert!(late.is_none());
        assert_eq!(session.current(), newer);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refreshes_keep_latest() {
        let hosting = Arc::new(MockHosting::new().with_asset(asset("bg", 1920, 1280)));
        let session = Arc::new(session(hosting, &CollectingNotifier::new()));

        let mut handles = Vec::new();
        for n in 0..32 {
            let session = Arc::clone(&session);
            handles.push(tokio::spawn(async move {
                session.change(InputChange::OffsetX(n)).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let current = session.current().unwrap();
        assert!(session.sequencer.is_latest(current.ticket));
    }
}

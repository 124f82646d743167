//! Submission controller: runs encode → send → receive → present for one
//! form snapshot and owns the lifecycle state the UI renders.

use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use shared::{
    error::ApiError,
    protocol::{ResponseKeys, SubmissionPayload},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::Settings,
    error::SubmitError,
    form::FormState,
    logo::LogoEncoder,
    transport::{BackendResponse, HttpReportBackend, ReportBackend},
    viewer::{DocumentViewer, ReportDocument, ViewHandle},
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
    Success,
    Error,
}

impl SubmissionState {
    pub fn is_busy(self) -> bool {
        self == SubmissionState::Submitting
    }

    /// Label for the submit trigger; it is disabled while busy.
    pub fn action_label(self) -> &'static str {
        if self.is_busy() {
            "Generating..."
        } else {
            "Generate and view PDF"
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleSnapshot {
    pub state: SubmissionState,
    pub status_message: String,
    pub last_report: Option<ViewHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionEvent {
    pub submission_id: Option<Uuid>,
    pub state: SubmissionState,
    pub status_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub submission_id: Uuid,
    pub report: ViewHandle,
}

impl SubmissionOutcome {
    pub fn status_message(&self) -> String {
        format!("PDF report ready: {}", self.report.describe())
    }
}

pub struct SubmissionController {
    backend: Arc<dyn ReportBackend>,
    viewer: Arc<dyn DocumentViewer>,
    encoder: LogoEncoder,
    response_keys: ResponseKeys,
    inner: Arc<Mutex<LifecycleSnapshot>>,
    events: broadcast::Sender<SubmissionEvent>,
}

impl SubmissionController {
    pub fn new(backend: Arc<dyn ReportBackend>, viewer: Arc<dyn DocumentViewer>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            viewer,
            encoder: LogoEncoder::default(),
            response_keys: ResponseKeys::default(),
            inner: Arc::new(Mutex::new(LifecycleSnapshot::default())),
            events,
        }
    }

    /// HTTP backend, logo limit and key style taken from `settings`.
    pub fn from_settings(settings: &Settings, viewer: Arc<dyn DocumentViewer>) -> Result<Self> {
        let backend = HttpReportBackend::new(&settings.api_base_url, settings.request_timeout)?;
        Ok(Self::new(Arc::new(backend), viewer)
            .with_logo_encoder(LogoEncoder::new(settings.max_logo_bytes))
            .with_response_keys(settings.response_keys))
    }

    pub fn with_logo_encoder(mut self, encoder: LogoEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_response_keys(mut self, keys: ResponseKeys) -> Self {
        self.response_keys = keys;
        self
    }

    pub async fn state(&self) -> SubmissionState {
        self.inner.lock().await.state
    }

    pub async fn status_message(&self) -> String {
        self.inner.lock().await.status_message.clone()
    }

    pub async fn snapshot(&self) -> LifecycleSnapshot {
        self.inner.lock().await.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SubmissionEvent> {
        self.events.subscribe()
    }

    /// Runs one submission for a snapshot of `form`. The form itself is never
    /// modified, so every failure leaves the user's input in place.
    pub async fn submit(&self, form: &FormState) -> Result<SubmissionOutcome, SubmitError> {
        let snapshot = form.clone();
        let submission_id = Uuid::new_v4();

        {
            let mut lifecycle = self.inner.lock().await;
            if lifecycle.state.is_busy() {
                warn!("rejecting submit while another submission is in flight");
                return Err(SubmitError::AlreadySubmitting);
            }

            if let Err(err) = snapshot.validate() {
                lifecycle.state = SubmissionState::Idle;
                lifecycle.status_message = err.to_string();
                publish(&self.events, &lifecycle, None);
                return Err(err.into());
            }

            lifecycle.state = SubmissionState::Submitting;
            lifecycle.status_message.clear();
            publish(&self.events, &lifecycle, Some(submission_id));
        }

        // Dropping this future before it finishes must not leave the
        // controller stuck in `Submitting`.
        let in_flight = InFlight {
            lifecycle: Arc::clone(&self.inner),
            events: self.events.clone(),
            submission_id,
            armed: true,
        };

        let result = self.run(submission_id, &snapshot).await;

        let mut lifecycle = self.inner.lock().await;
        match &result {
            Ok(outcome) => {
                info!(%submission_id, report = %outcome.report.describe(), "submission succeeded");
                lifecycle.state = SubmissionState::Success;
                lifecycle.status_message = outcome.status_message();
                lifecycle.last_report = Some(outcome.report.clone());
            }
            Err(err) => {
                warn!(%submission_id, error = %err, "submission failed");
                lifecycle.state = SubmissionState::Error;
                lifecycle.status_message = err.to_string();
            }
        }
        publish(&self.events, &lifecycle, Some(submission_id));
        in_flight.disarm();

        result
    }

    async fn run(
        &self,
        submission_id: Uuid,
        form: &FormState,
    ) -> Result<SubmissionOutcome, SubmitError> {
        // The logo is fully encoded before anything goes on the wire.
        let logo = match form.pending_logo() {
            Some(path) => Some(self.encoder.encode(path).await?),
            None => form.logo().cloned(),
        };
        let payload = form.to_payload(self.response_keys, logo)?;
        info!(
            %submission_id,
            has_logo = payload.logo_base64.is_some(),
            answers = payload.responses.len(),
            "sending questionnaire"
        );

        let response = self.backend.analyze(&payload).await?;
        let document = interpret_response(response, &payload)?;

        let report = self
            .viewer
            .open(document)
            .await
            .map_err(|err| SubmitError::Presentation(format!("{err:#}")))?;

        Ok(SubmissionOutcome {
            submission_id,
            report,
        })
    }

}

fn publish(
    events: &broadcast::Sender<SubmissionEvent>,
    lifecycle: &LifecycleSnapshot,
    submission_id: Option<Uuid>,
) {
    // No subscribers is fine.
    let _ = events.send(SubmissionEvent {
        submission_id,
        state: lifecycle.state,
        status_message: lifecycle.status_message.clone(),
    });
}

/// Moves the lifecycle out of `Submitting` if a submission is abandoned
/// midway (timeout, `select!`, aborted task).
struct InFlight {
    lifecycle: Arc<Mutex<LifecycleSnapshot>>,
    events: broadcast::Sender<SubmissionEvent>,
    submission_id: Uuid,
    armed: bool,
}

impl InFlight {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let submission_id = self.submission_id;
        warn!(%submission_id, "submission dropped before completing");

        match self.lifecycle.try_lock() {
            Ok(mut lifecycle) => interrupt(&self.events, &mut lifecycle, submission_id),
            Err(_) => {
                // Someone holds the lock briefly; finish the reset on the runtime.
                let Ok(handle) = tokio::runtime::Handle::try_current() else {
                    return;
                };
                let lifecycle = Arc::clone(&self.lifecycle);
                let events = self.events.clone();
                handle.spawn(async move {
                    let mut lifecycle = lifecycle.lock().await;
                    interrupt(&events, &mut lifecycle, submission_id);
                });
            }
        }
    }
}

fn interrupt(
    events: &broadcast::Sender<SubmissionEvent>,
    lifecycle: &mut LifecycleSnapshot,
    submission_id: Uuid,
) {
    if lifecycle.state.is_busy() {
        lifecycle.state = SubmissionState::Error;
        lifecycle.status_message = SubmitError::Interrupted.to_string();
        publish(events, lifecycle, Some(submission_id));
    }
}

fn interpret_response(
    response: BackendResponse,
    payload: &SubmissionPayload,
) -> Result<ReportDocument, SubmitError> {
    if !response.is_success() {
        let message = serde_json::from_slice::<ApiError>(&response.body)
            .ok()
            .and_then(|body| body.message().map(str::to_string))
            .unwrap_or_else(|| format!("report service error (HTTP {})", response.status));
        return Err(SubmitError::Backend {
            status: response.status,
            message,
        });
    }

    if response.body.is_empty() {
        return Err(SubmitError::UnexpectedResponse(format!(
            "report service returned an empty document (HTTP {})",
            response.status
        )));
    }

    Ok(ReportDocument::from_response(
        response,
        &payload.name,
        Local::now(),
    ))
}

#[cfg(test)]
#[path = "tests/submission_tests.rs"]
mod tests;

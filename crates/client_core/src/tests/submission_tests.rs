use super::*;

use std::{
    env,
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use shared::{
    domain::{Answer, QuestionId},
    protocol::EncodedImage,
};
use tokio::sync::Notify;

use crate::transport::TransportError;

enum Reply {
    Response(BackendResponse),
    Refused,
}

struct TestBackend {
    reply: Reply,
    calls: AtomicUsize,
    payloads: Mutex<Vec<SubmissionPayload>>,
    gate: Option<Arc<Notify>>,
    entered: Arc<Notify>,
}

impl TestBackend {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
            gate: None,
            entered: Arc::new(Notify::new()),
        }
    }

    fn pdf(body: &[u8]) -> Self {
        Self::new(Reply::Response(BackendResponse {
            status: 200,
            content_type: Some("application/pdf".into()),
            content_disposition: Some("inline; filename=\"relatorio.pdf\"".into()),
            body: body.to_vec(),
        }))
    }

    fn status(status: u16, body: &str) -> Self {
        Self::new(Reply::Response(BackendResponse {
            status,
            content_type: Some("application/json".into()),
            content_disposition: None,
            body: body.as_bytes().to_vec(),
        }))
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportBackend for TestBackend {
    async fn analyze(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<BackendResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().await.push(payload.clone());
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.reply {
            Reply::Response(response) => Ok(response.clone()),
            Reply::Refused => Err(TransportError::Connect("connection refused".into())),
        }
    }
}

#[derive(Default)]
struct RecordingViewer {
    opened: Mutex<Vec<ReportDocument>>,
    fail_with: Option<String>,
}

#[async_trait]
impl DocumentViewer for RecordingViewer {
    async fn open(&self, document: ReportDocument) -> Result<ViewHandle> {
        if let Some(err) = &self.fail_with {
            return Err(anyhow::anyhow!(err.clone()));
        }
        let handle = ViewHandle::for_document(&document, None);
        self.opened.lock().await.push(document);
        Ok(handle)
    }
}

fn completed_form() -> FormState {
    let mut form = FormState::new();
    form.set_name("Ana Souza");
    form.set_email("ana@example.com");
    form.set_answer(QuestionId::SleepQuality, Answer::text("bom"));
    form.set_answer(QuestionId::PhysicalActivityHours, Answer::Number(4));
    form.set_answer(QuestionId::Diet, Answer::text("precisa melhorar"));
    form.set_answer(QuestionId::StressLevel, Answer::Number(7));
    form
}

fn controller(
    backend: Arc<TestBackend>,
    viewer: Arc<RecordingViewer>,
) -> SubmissionController {
    SubmissionController::new(backend, viewer)
}

#[tokio::test]
async fn successful_submission_opens_the_returned_document() {
    let backend = Arc::new(TestBackend::pdf(b"%PDF-1.7 report"));
    let viewer = Arc::new(RecordingViewer::default());
    let controller = controller(backend.clone(), viewer.clone());
    let mut events = controller.subscribe_events();

    let outcome = controller
        .submit(&completed_form())
        .await
        .expect("submission succeeds");

    assert_eq!(controller.state().await, SubmissionState::Success);
    assert!(controller.status_message().await.contains("relatorio.pdf"));
    assert_eq!(outcome.report.filename, "relatorio.pdf");
    assert_eq!(outcome.report.size_bytes, b"%PDF-1.7 report".len());

    let opened = viewer.opened.lock().await;
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].bytes, b"%PDF-1.7 report");
    assert_eq!(opened[0].content_type, "application/pdf");
    assert_eq!(backend.calls(), 1);

    let first = events.recv().await.expect("submitting event");
    assert_eq!(first.state, SubmissionState::Submitting);
    assert!(first.status_message.is_empty());
    let second = events.recv().await.expect("success event");
    assert_eq!(second.state, SubmissionState::Success);
    assert_eq!(first.submission_id, second.submission_id);
    assert_eq!(second.submission_id, Some(outcome.submission_id));
}

#[tokio::test]
async fn backend_error_message_is_surfaced_verbatim() {
    let backend = Arc::new(TestBackend::status(500, r#"{"error":"boom"}"#));
    let viewer = Arc::new(RecordingViewer::default());
    let controller = controller(backend.clone(), viewer.clone());

    let err = controller
        .submit(&completed_form())
        .await
        .expect_err("backend failure");

    assert!(matches!(err, SubmitError::Backend { status: 500, .. }));
    assert_eq!(controller.state().await, SubmissionState::Error);
    assert_eq!(controller.status_message().await, "boom");
    assert!(viewer.opened.lock().await.is_empty());
}

#[tokio::test]
async fn backend_error_whitespace_is_kept() {
    let backend = Arc::new(TestBackend::status(422, r#"{"error":" dados inválidos "}"#));
    let controller = controller(backend, Arc::new(RecordingViewer::default()));

    controller
        .submit(&completed_form())
        .await
        .expect_err("backend failure");

    assert_eq!(controller.status_message().await, " dados inválidos ");
}

#[tokio::test]
async fn unparseable_error_body_falls_back_to_generic_message() {
    let backend = Arc::new(TestBackend::status(502, "<html>bad gateway</html>"));
    let controller = controller(backend, Arc::new(RecordingViewer::default()));

    controller
        .submit(&completed_form())
        .await
        .expect_err("backend failure");

    assert_eq!(controller.state().await, SubmissionState::Error);
    assert_eq!(
        controller.status_message().await,
        "report service error (HTTP 502)"
    );
}

#[tokio::test]
async fn empty_success_body_is_an_unexpected_response() {
    let backend = Arc::new(TestBackend::pdf(b""));
    let viewer = Arc::new(RecordingViewer::default());
    let controller = controller(backend, viewer.clone());

    let err = controller
        .submit(&completed_form())
        .await
        .expect_err("empty body");

    assert!(matches!(err, SubmitError::UnexpectedResponse(_)));
    assert_eq!(controller.state().await, SubmissionState::Error);
    assert!(viewer.opened.lock().await.is_empty());
}

#[tokio::test]
async fn network_failure_lands_in_error_state() {
    let backend = Arc::new(TestBackend::new(Reply::Refused));
    let controller = controller(backend.clone(), Arc::new(RecordingViewer::default()));

    let err = controller
        .submit(&completed_form())
        .await
        .expect_err("refused");

    assert!(matches!(err, SubmitError::Network(_)));
    assert_eq!(controller.state().await, SubmissionState::Error);
    assert!(controller
        .status_message()
        .await
        .starts_with("could not reach the report service"));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn blank_name_never_reaches_the_backend() {
    let backend = Arc::new(TestBackend::pdf(b"%PDF"));
    let controller = controller(backend.clone(), Arc::new(RecordingViewer::default()));
    let mut events = controller.subscribe_events();
    let mut form = completed_form();
    form.set_name("");

    let err = controller.submit(&form).await.expect_err("validation");

    assert!(matches!(
        err,
        SubmitError::Validation(shared::error::ValidationError::MissingName)
    ));
    assert_eq!(backend.calls(), 0);
    assert_eq!(controller.state().await, SubmissionState::Idle);
    assert_eq!(controller.status_message().await, "name is required");

    let event = events.recv().await.expect("validation event");
    assert_eq!(event.state, SubmissionState::Idle);
    assert_eq!(event.submission_id, None);
}

#[tokio::test]
async fn unanswered_question_never_reaches_the_backend() {
    let backend = Arc::new(TestBackend::pdf(b"%PDF"));
    let controller = controller(backend.clone(), Arc::new(RecordingViewer::default()));
    let mut form = FormState::new();
    form.set_name("Ana");

    controller.submit(&form).await.expect_err("validation");
    assert_eq!(backend.calls(), 0);
    assert_ne!(controller.state().await, SubmissionState::Submitting);
}

#[tokio::test]
async fn second_submit_while_in_flight_is_rejected() {
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(TestBackend::pdf(b"%PDF").gated(gate.clone()));
    let controller = Arc::new(controller(
        backend.clone(),
        Arc::new(RecordingViewer::default()),
    ));
    let form = completed_form();

    let first = {
        let controller = Arc::clone(&controller);
        let form = form.clone();
        tokio::spawn(async move { controller.submit(&form).await })
    };

    tokio::time::timeout(Duration::from_secs(5), backend.entered.notified())
        .await
        .expect("first request reaches backend");
    assert_eq!(controller.state().await, SubmissionState::Submitting);
    assert_eq!(controller.state().await.action_label(), "Generating...");

    let err = controller.submit(&form).await.expect_err("re-entrant submit");
    assert!(matches!(err, SubmitError::AlreadySubmitting));
    assert_eq!(controller.state().await, SubmissionState::Submitting);

    gate.notify_one();
    first
        .await
        .expect("join")
        .expect("first submission succeeds");

    assert_eq!(backend.calls(), 1);
    assert_eq!(controller.state().await, SubmissionState::Success);
}

#[tokio::test]
async fn abandoned_submission_does_not_block_the_next_one() {
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(TestBackend::pdf(b"%PDF").gated(gate.clone()));
    let controller = controller(backend.clone(), Arc::new(RecordingViewer::default()));
    let mut events = controller.subscribe_events();
    let form = completed_form();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), controller.submit(&form)).await;
    assert!(abandoned.is_err(), "gated submission should not finish");

    assert_eq!(controller.state().await, SubmissionState::Error);
    assert_eq!(
        controller.status_message().await,
        "submission was interrupted before it finished"
    );
    let submitting = events.recv().await.expect("submitting event");
    assert_eq!(submitting.state, SubmissionState::Submitting);
    let interrupted = events.recv().await.expect("interrupted event");
    assert_eq!(interrupted.state, SubmissionState::Error);
    assert_eq!(interrupted.submission_id, submitting.submission_id);

    // Stored permit lets the next request through the gate.
    gate.notify_one();
    controller.submit(&form).await.expect("retry succeeds");

    assert_eq!(backend.calls(), 2);
    assert_eq!(controller.state().await, SubmissionState::Success);
}

#[tokio::test]
async fn attached_logo_survives_the_file_going_away() {
    let backend = Arc::new(TestBackend::pdf(b"%PDF"));
    let controller = controller(backend.clone(), Arc::new(RecordingViewer::default()));
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("questionnaire_attached_{suffix}.png"));
    std::fs::write(&path, b"png-bytes").expect("write logo");

    let mut form = completed_form();
    form.attach_logo(&path, &LogoEncoder::default())
        .await
        .expect("attach");
    std::fs::remove_file(&path).expect("remove logo");

    controller.submit(&form).await.expect("first");
    controller.submit(&form).await.expect("second");

    let payloads = backend.payloads.lock().await;
    assert_eq!(payloads.len(), 2);
    assert_eq!(
        payloads[0].logo_base64,
        Some(EncodedImage::from_bytes("image/png", b"png-bytes"))
    );
    assert_eq!(payloads[0].logo_base64, payloads[1].logo_base64);
}

#[tokio::test]
async fn unreadable_logo_aborts_before_network_and_keeps_previous_logo() {
    let backend = Arc::new(TestBackend::pdf(b"%PDF"));
    let controller = controller(backend.clone(), Arc::new(RecordingViewer::default()));

    let previous = EncodedImage::from_bytes("image/png", b"old-logo");
    let mut form = completed_form();
    form.set_logo(Some(previous.clone()));
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    form.select_logo_file(env::temp_dir().join(format!("questionnaire_gone_{suffix}.png")));

    let err = controller.submit(&form).await.expect_err("logo read fails");

    assert!(matches!(err, SubmitError::FileRead(_)));
    assert_eq!(controller.state().await, SubmissionState::Error);
    assert!(controller
        .status_message()
        .await
        .starts_with("could not read logo"));
    assert_eq!(backend.calls(), 0);
    assert_eq!(form.logo(), Some(&previous));
}

#[tokio::test]
async fn held_logo_is_sent_inline() {
    let backend = Arc::new(TestBackend::pdf(b"%PDF"));
    let controller = controller(backend.clone(), Arc::new(RecordingViewer::default()));
    let logo = EncodedImage::from_bytes("image/png", b"logo");
    let mut form = completed_form();
    form.set_logo(Some(logo.clone()));

    controller.submit(&form).await.expect("submit");

    let payloads = backend.payloads.lock().await;
    assert_eq!(payloads[0].logo_base64, Some(logo));
}

#[tokio::test]
async fn viewer_failure_is_reported_as_error() {
    let backend = Arc::new(TestBackend::pdf(b"%PDF"));
    let viewer = Arc::new(RecordingViewer {
        opened: Mutex::new(Vec::new()),
        fail_with: Some("disk full".into()),
    });
    let controller = controller(backend, viewer);

    let err = controller
        .submit(&completed_form())
        .await
        .expect_err("viewer fails");

    assert!(matches!(err, SubmitError::Presentation(_)));
    assert_eq!(controller.state().await, SubmissionState::Error);
    assert!(controller.status_message().await.contains("disk full"));
}

#[tokio::test]
async fn consecutive_submissions_are_independent() {
    let backend = Arc::new(TestBackend::pdf(b"%PDF-same"));
    let viewer = Arc::new(RecordingViewer::default());
    let controller = controller(backend.clone(), viewer.clone());
    let form = completed_form();

    let first = controller.submit(&form).await.expect("first");
    let first_message = controller.status_message().await;
    let second = controller.submit(&form).await.expect("second");

    assert_ne!(first.submission_id, second.submission_id);
    assert_ne!(first.report.id, second.report.id);
    assert_eq!(controller.state().await, SubmissionState::Success);
    assert_eq!(controller.status_message().await, first_message);
    assert_eq!(
        controller.snapshot().await.last_report,
        Some(second.report.clone())
    );

    let payloads = backend.payloads.lock().await;
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0], payloads[1]);
    assert_eq!(viewer.opened.lock().await.len(), 2);
}

#[tokio::test]
async fn validation_after_error_returns_to_idle() {
    let failing = Arc::new(TestBackend::status(500, r#"{"error":"boom"}"#));
    let viewer = Arc::new(RecordingViewer::default());
    let controller = controller(failing, viewer);
    let mut form = completed_form();

    controller.submit(&form).await.expect_err("first fails");
    assert_eq!(controller.state().await, SubmissionState::Error);

    form.set_name("");
    controller.submit(&form).await.expect_err("validation");
    assert_eq!(controller.state().await, SubmissionState::Idle);
    assert_eq!(form.email(), "ana@example.com");
}

#[tokio::test]
async fn prompt_keyed_payload_uses_question_text() {
    let backend = Arc::new(TestBackend::pdf(b"%PDF"));
    let controller = controller(backend.clone(), Arc::new(RecordingViewer::default()))
        .with_response_keys(ResponseKeys::Prompt);

    controller.submit(&completed_form()).await.expect("submit");

    let payloads = backend.payloads.lock().await;
    assert_eq!(
        payloads[0].responses.get("Nível de estresse diário (0-10)"),
        Some(&Answer::Number(7))
    );
}

pub mod config;
pub mod error;
pub mod form;
pub mod logo;
pub mod submission;
pub mod transport;
pub mod viewer;

pub use config::{load_settings, Settings};
pub use error::SubmitError;
pub use form::{AnswerSet, FormState};
pub use logo::{LogoEncoder, LogoError};
pub use submission::{
    LifecycleSnapshot, SubmissionController, SubmissionEvent, SubmissionOutcome, SubmissionState,
};
pub use transport::{BackendResponse, HttpReportBackend, ReportBackend, TransportError};
pub use viewer::{DirectoryViewer, DocumentViewer, ReportDocument, ViewHandle};

use shared::error::ValidationError;
use thiserror::Error;

use crate::{logo::LogoError, transport::TransportError};

/// Every way a submit attempt can end without a report.
///
/// The `Display` text is what the controller stores as its status message,
/// so backend messages are rendered verbatim.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("a submission is already in progress")]
    AlreadySubmitting,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("could not read logo: {0}")]
    FileRead(#[from] LogoError),
    #[error("{message}")]
    Backend { status: u16, message: String },
    #[error("could not reach the report service: {0}")]
    Network(#[from] TransportError),
    #[error("{0}")]
    UnexpectedResponse(String),
    #[error("could not open the generated report: {0}")]
    Presentation(String),
    #[error("submission was interrupted before it finished")]
    Interrupted,
}

use log::{error, warn};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, status, Responder},
    serde::json::serde_json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    /// A required field was missing or blank. The message echoes the payload.
    #[error("{0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// A validation failure for the given client payload, echoing it back.
    pub fn invalid_payload<T: Serialize>(payload: &T) -> Self {
        let echoed = serde_json::to_string(payload)
            .unwrap_or_else(|_| "<unprintable payload>".to_string());
        Self::Validation(format!("Failed to validate {echoed}."))
    }

    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::InvalidState(_) => Status::Conflict,
            Self::Db(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let detail = self.to_string();
        match status.class() {
            StatusClass::ServerError => error!("{} {}: {detail}", req.method(), req.uri()),
            _ => warn!("{} {}: {detail}", req.method(), req.uri()),
        }
        status::Custom(status, detail).respond_to(req)
    }
}

use rusoto_core::RusotoError;
use rusoto_s3::{DeleteObjectError, PutObjectError};
use serde::Serialize;
use thiserror::Error;

use crate::document::DocumentType;
use crate::ids::EntityId;
use crate::trip::TripStatus;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Represents an SQL error.
    #[error("database error")]
    Sqlx { source: sqlx::Error },

    /// An identifier could not be parsed.
    #[error("invalid ID: {0}")]
    InvalidId(String),

    #[error("tutor not found: {username}")]
    TutorNotFound { username: String },

    #[error("tutor not found: {id}")]
    TutorIdNotFound { id: EntityId },

    #[error("trip not found: {id}")]
    TripNotFound { id: EntityId },

    #[error("pet not found: {id}")]
    PetNotFound { id: EntityId },

    #[error("document not found: {id}")]
    DocumentNotFound { id: EntityId },

    /// The acting tutor does not own the targeted trip.
    #[error("trip {trip} does not belong to {username}")]
    TripNotOwned { trip: EntityId, username: String },

    /// The acting tutor does not own the targeted pet.
    #[error("pet {pet} does not belong to {username}")]
    PetNotOwned { pet: EntityId, username: String },

    #[error("pet {pet} is not enrolled in trip {trip}")]
    PetNotEnrolled { pet: EntityId, trip: EntityId },

    /// The document type is not declared for the tutor of this trip.
    #[error("document '{document_type}' is not required for this trip")]
    DocumentNotRequired { document_type: DocumentType },

    /// The document type is not declared for this pet within the trip.
    #[error("document '{document_type}' is not required for pet {pet} on this trip")]
    PetDocumentNotRequired {
        document_type: DocumentType,
        pet: EntityId,
    },

    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),

    /// A standalone upload of a type that belongs to the other side.
    #[error("document '{document_type}' cannot be kept on a {entity}")]
    MisplacedDocument {
        document_type: DocumentType,
        entity: &'static str,
    },

    #[error("no file selected")]
    EmptyFile,

    #[error("file type not allowed: {filename}")]
    DisallowedFileType { filename: String },

    #[error("file is too large: {size} bytes exceeds {limit}")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("form submission is malformed")]
    MalformedFormSubmission,

    #[error("missing form parts")]
    PartsMissing,

    #[error("upload metadata is malformed")]
    MalformedUploadMetadata(#[source] serde_json::Error),

    #[error("required documents are malformed")]
    MalformedRequiredDocuments(#[source] serde_json::Error),

    #[error("trip is already {status}")]
    TerminalTripStatus { status: TripStatus },

    /// The binary upload to the storage collaborator failed.
    #[error("storage upload failed")]
    UploadFailed { source: RusotoError<PutObjectError> },

    #[error("storage upload timed out after {seconds} seconds")]
    UploadTimedOut { seconds: u64 },

    #[error("storage delete failed")]
    DeleteFailed {
        source: RusotoError<DeleteObjectError>,
    },

    /// A storage failure from a collaborator that is not S3.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("could not write temporary file")]
    TemporaryFileError(#[source] std::io::Error),

    #[error("could not generate URL")]
    FailedToGenerateUrl { source: url::ParseError },
}

/// The error taxonomy exposed to callers, independent of the variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Authorization,
    Validation,
    UpstreamStorage,
    Internal,
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        use BackendError::*;

        match self {
            TutorNotFound { .. }
            | TutorIdNotFound { .. }
            | TripNotFound { .. }
            | PetNotFound { .. }
            | DocumentNotFound { .. } => ErrorKind::NotFound,
            TripNotOwned { .. } | PetNotOwned { .. } => ErrorKind::Authorization,
            InvalidId(_)
            | PetNotEnrolled { .. }
            | DocumentNotRequired { .. }
            | PetDocumentNotRequired { .. }
            | UnknownDocumentType(_)
            | MisplacedDocument { .. }
            | EmptyFile
            | DisallowedFileType { .. }
            | FileTooLarge { .. }
            | MalformedFormSubmission
            | PartsMissing
            | MalformedUploadMetadata(_)
            | MalformedRequiredDocuments(_)
            | TerminalTripStatus { .. } => ErrorKind::Validation,
            UploadFailed { .. } | UploadTimedOut { .. } | DeleteFailed { .. } | Storage(_) => {
                ErrorKind::UpstreamStorage
            }
            Sqlx { .. } | TemporaryFileError(_) | FailedToGenerateUrl { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendError, ErrorKind};
    use crate::document::DocumentType;
    use crate::ids::EntityId;

    #[test]
    fn kinds_follow_taxonomy() {
        let trip = EntityId::new();

        assert_eq!(BackendError::TripNotFound { id: trip }.kind(), ErrorKind::NotFound);
        assert_eq!(
            BackendError::TripNotOwned {
                trip,
                username: "ana".to_owned()
            }
            .kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            BackendError::DocumentNotRequired {
                document_type: DocumentType::Cvi
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            BackendError::UploadTimedOut { seconds: 3 }.kind(),
            ErrorKind::UpstreamStorage
        );
    }

    #[test]
    fn messages_are_readable() {
        let e = BackendError::DocumentNotRequired {
            document_type: DocumentType::Cvi,
        };

        assert_eq!(e.to_string(), "document 'cvi' is not required for this trip");
    }
}

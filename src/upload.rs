use std::sync::Arc;

use log::{debug, error, o, warn, Logger};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::db::SafeDb;
use crate::document::{
    DocumentFilter, DocumentRecord, DocumentType, EntityType, NewDocument, Side,
};
use crate::environment::Environment;
use crate::errors::BackendError;
use crate::ids::EntityId;
use crate::mime_type::MimeType;
use crate::normalization::sanitize_filename;
use crate::pet::Pet;
use crate::requirements::Owner;
use crate::store::{SafeStore, StoredObject};
use crate::trip::{load_owned_trip, EventKind, Trip, TripEvent};
use crate::tutor::Tutor;

pub mod layout;

use self::layout::{Placement, Target};

/// What the client says an upload is for.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadContext {
    /// Present for documents required by a trip.
    #[serde(default)]
    pub trip_id: Option<EntityId>,

    /// Present for pet documents, within a trip or not.
    #[serde(default)]
    pub pet_id: Option<EntityId>,

    pub document_type: DocumentType,
}

/// The uploaded file as received.
#[derive(Clone, Debug)]
pub struct UploadFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// The resolved destination of an upload, before the file is looked at.
enum Destination {
    Trip { trip: Trip, pet: Option<Pet> },
    Pet(Pet),
    Tutor,
}

/// Validates an upload and, if it is acceptable, stores the file and records
/// it.
///
/// No record is written unless the binary was stored. A re-upload for the
/// same `(entity type, entity id, document type, pet id)` key replaces the
/// existing record in place.
pub async fn validate_and_accept_upload(
    environment: &Environment,
    username: &str,
    context: UploadContext,
    file: UploadFile,
) -> Result<DocumentRecord, BackendError> {
    let Environment {
        logger, db, store, ..
    } = environment;

    let logger = logger.new(o!(
        "username" => username.to_owned(),
        "document_type" => context.document_type.to_string(),
        "trip" => context.trip_id.map(|t| t.to_string()),
        "pet" => context.pet_id.map(|p| p.to_string()),
    ));

    debug!(logger, "Resolving upload destination...");
    let (tutor, destination) = resolve_destination(db.as_ref(), username, &context).await?;

    debug!(logger, "Checking requirements...");
    check_requirement(&destination, &context.document_type)?;

    debug!(logger, "Checking file..."; "filename" => &file.filename, "size" => file.data.len());
    let (filename, mime_type) = check_file(&file, environment.config.max_upload_bytes)?;

    let target = match &destination {
        Destination::Trip { trip, pet: None } => Target::TripTutor { trip: trip.id },
        Destination::Trip {
            trip,
            pet: Some(pet),
        } => Target::TripPet {
            trip: trip.id,
            pet: pet.id,
            pet_name: &pet.name,
        },
        Destination::Pet(pet) => Target::Pet {
            pet: pet.id,
            pet_name: &pet.name,
        },
        Destination::Tutor => Target::Tutor { tutor: tutor.id },
    };

    let placement = Placement::new(
        target,
        &tutor.username,
        &context.document_type,
        &filename,
        OffsetDateTime::now_utc(),
    );

    let identity = DocumentFilter::identity(
        placement.entity_type,
        placement.entity_id,
        context.document_type.clone(),
        placement.pet_id,
    );
    let existing = db.find_document(&identity).await?;

    let stored = store_binary(environment, &logger, &placement, &mime_type, &file.data).await?;

    let new_document = NewDocument {
        entity_type: placement.entity_type,
        entity_id: placement.entity_id,
        pet_id: placement.pet_id,
        document_type: context.document_type.clone(),
        filename,
        path: stored.storage_ref.clone(),
        public_url: Some(stored.public_url.clone()),
        file_kind: mime_type.kind,
        size: file.data.len() as i64,
        description: Some(placement.description.clone()),
        subfolder: Some(placement.subfolder.clone()),
    };

    let record = match save_record(db.as_ref(), existing.as_ref(), new_document).await {
        Ok(record) => record,
        Err(e) => {
            error!(logger, "Binary stored but record not saved"; "storage_ref" => &stored.storage_ref, "error" => %e);
            return Err(e);
        }
    };
    let logger = logger.new(o!("document" => record.id.to_string()));

    if let Some(previous) = existing.filter(|p| p.path != record.path) {
        discard_binary(store.clone(), &logger, previous.path);
    }

    debug!(logger, "Linking document..."; "key" => &placement.link_key);
    db.link_document(
        placement.entity_type,
        &placement.entity_id,
        placement.link_key.clone(),
        &record.id,
    )
    .await?;

    if let Destination::Trip { trip, pet } = &destination {
        let description = match pet {
            Some(pet) => format!(
                "Document uploaded: {} (pet: {})",
                context.document_type.label(),
                pet.name
            ),
            None => format!("Document uploaded: {}", context.document_type.label()),
        };

        db.append_trip_event(&trip.id, TripEvent::now(EventKind::DocumentUpload, description))
            .await?;
    }

    Ok(record)
}

async fn resolve_destination(
    db: &SafeDb,
    username: &str,
    context: &UploadContext,
) -> Result<(Tutor, Destination), BackendError> {
    if let Some(trip_id) = context.trip_id {
        let (tutor, trip) = load_owned_trip(db, username, trip_id).await?;

        let pet = match context.pet_id {
            Some(pet_id) => {
                if !trip.is_enrolled(&pet_id) {
                    return Err(BackendError::PetNotEnrolled {
                        pet: pet_id,
                        trip: trip_id,
                    });
                }

                let pet = db
                    .retrieve_pet(&pet_id)
                    .await?
                    .ok_or(BackendError::PetNotFound { id: pet_id })?;

                Some(pet)
            }
            None => None,
        };

        return Ok((tutor, Destination::Trip { trip, pet }));
    }

    let tutor = db
        .retrieve_tutor_by_username(username)
        .await?
        .ok_or_else(|| BackendError::TutorNotFound {
            username: username.to_owned(),
        })?;

    match context.pet_id {
        Some(pet_id) => {
            let pet = db
                .retrieve_pet(&pet_id)
                .await?
                .ok_or(BackendError::PetNotFound { id: pet_id })?;

            if pet.owner_id != tutor.id {
                return Err(BackendError::PetNotOwned {
                    pet: pet_id,
                    username: username.to_owned(),
                });
            }

            Ok((tutor, Destination::Pet(pet)))
        }
        None => Ok((tutor, Destination::Tutor)),
    }
}

fn check_requirement(
    destination: &Destination,
    document_type: &DocumentType,
) -> Result<(), BackendError> {
    match destination {
        Destination::Trip { trip, pet } => {
            let owner = match pet {
                Some(pet) => Owner::Pet(pet.id),
                None => Owner::Tutor,
            };

            if trip.required_documents.requires(owner, document_type) {
                Ok(())
            } else {
                match owner {
                    Owner::Tutor => Err(BackendError::DocumentNotRequired {
                        document_type: document_type.clone(),
                    }),
                    Owner::Pet(pet) => Err(BackendError::PetDocumentNotRequired {
                        document_type: document_type.clone(),
                        pet,
                    }),
                }
            }
        }
        Destination::Pet(_) => check_side(document_type, Side::Pet, EntityType::Pet),
        Destination::Tutor => check_side(document_type, Side::Human, EntityType::User),
    }
}

/// Standalone documents must be of a known type that belongs to `side` or to
/// neither side.
fn check_side(
    document_type: &DocumentType,
    side: Side,
    entity: EntityType,
) -> Result<(), BackendError> {
    match document_type.side() {
        None => Err(BackendError::UnknownDocumentType(document_type.to_string())),
        Some(s) if s == side || s == Side::Standalone => Ok(()),
        Some(_) => Err(BackendError::MisplacedDocument {
            document_type: document_type.clone(),
            entity: entity.as_str(),
        }),
    }
}

fn check_file(file: &UploadFile, limit: u64) -> Result<(String, MimeType), BackendError> {
    if file.data.is_empty() {
        return Err(BackendError::EmptyFile);
    }

    let size = file.data.len() as u64;
    if size > limit {
        return Err(BackendError::FileTooLarge { size, limit });
    }

    let filename = sanitize_filename(&file.filename).ok_or(BackendError::EmptyFile)?;
    let mime_type = MimeType::for_filename(&filename)?;

    Ok((filename, mime_type))
}

/// Writes the data to a temporary file and uploads it. The temporary file is
/// removed whatever the outcome.
async fn store_binary(
    environment: &Environment,
    logger: &Logger,
    placement: &Placement,
    mime_type: &MimeType,
    data: &[u8],
) -> Result<StoredObject, BackendError> {
    use std::io::Write;

    use tempfile::NamedTempFile;

    let local_path = {
        let mut output = NamedTempFile::new().map_err(BackendError::TemporaryFileError)?;
        output
            .write_all(data)
            .map_err(BackendError::TemporaryFileError)?;
        output.into_temp_path()
    };

    let timeout = environment.config.upload_timeout;

    debug!(logger, "Saving document to store..."; "key" => &placement.key);
    let result = tokio::time::timeout(
        timeout,
        environment.store.upload(
            local_path.to_path_buf(),
            placement.key.clone(),
            mime_type.essence.to_string(),
        ),
    )
    .await
    .map_err(|_| BackendError::UploadTimedOut {
        seconds: timeout.as_secs(),
    })
    .and_then(|r| r);

    if let Err(e) = local_path.close() {
        warn!(logger, "Could not remove temporary file"; "error" => %e);
    }

    result
}

async fn save_record(
    db: &SafeDb,
    existing: Option<&DocumentRecord>,
    document: NewDocument,
) -> Result<DocumentRecord, BackendError> {
    let existing = match existing {
        Some(existing) => existing,
        None => return db.insert_document(document).await,
    };

    let count = db.update_document(&existing.id, document.as_patch()).await?;

    if count == 0 {
        // removed in the meantime
        return db.insert_document(document).await;
    }

    db.find_document(&existing.identity())
        .await?
        .ok_or(BackendError::DocumentNotFound { id: existing.id })
}

/// Deletes a superseded binary without waiting for the outcome.
fn discard_binary(store: Arc<SafeStore>, logger: &Logger, storage_ref: String) {
    let logger = logger.new(o!("superseded" => storage_ref.clone()));

    tokio::spawn(async move {
        match store.delete(storage_ref).await {
            Ok(true) => debug!(logger, "Deleted superseded binary"),
            Ok(false) => warn!(logger, "Superseded binary was already gone"),
            Err(e) => warn!(logger, "Failed to delete superseded binary"; "error" => %e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::{check_file, check_side, UploadContext, UploadFile};
    use crate::document::{DocumentType, EntityType, Side};
    use crate::errors::{BackendError, ErrorKind};
    use crate::mime_type::FileKind;

    fn file(name: &str, data: &[u8]) -> UploadFile {
        UploadFile {
            filename: name.to_owned(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn files_are_checked() {
        let (name, mime) = check_file(&file("Cartão.PDF", b"%PDF"), 10).unwrap();
        assert_eq!(name, "Cartao.PDF");
        assert_eq!(mime.kind, FileKind::Pdf);

        assert!(matches!(
            check_file(&file("a.pdf", b""), 10),
            Err(BackendError::EmptyFile)
        ));
        assert!(matches!(
            check_file(&file("a.pdf", b"12345"), 4),
            Err(BackendError::FileTooLarge { size: 5, limit: 4 })
        ));
        assert!(matches!(
            check_file(&file("...", b"1"), 4),
            Err(BackendError::EmptyFile)
        ));

        let e = check_file(&file("a.exe", b"1"), 4).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Validation);
    }

    #[test]
    fn standalone_types_stay_on_their_side() {
        assert!(check_side(&DocumentType::VaccinationCard, Side::Pet, EntityType::Pet).is_ok());
        assert!(check_side(&DocumentType::PetPhoto, Side::Pet, EntityType::Pet).is_ok());
        assert!(check_side(&DocumentType::Other, Side::Human, EntityType::User).is_ok());

        let e = check_side(&DocumentType::Passport, Side::Pet, EntityType::Pet).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Validation);
        assert_eq!(e.to_string(), "document 'passport' cannot be kept on a pet");

        assert!(matches!(
            check_side(&DocumentType::Cvi, Side::Human, EntityType::User),
            Err(BackendError::MisplacedDocument { entity: "user", .. })
        ));
        assert!(matches!(
            check_side(&DocumentType::from("visa"), Side::Human, EntityType::User),
            Err(BackendError::UnknownDocumentType(_))
        ));
    }

    #[test]
    fn context_reads_camel_case() {
        let context: UploadContext = serde_json::from_str(
            r#"{"tripId": "6a2f41a3-c54c-fce8-32d2-0324e1c32e22", "documentType": "passport"}"#,
        )
        .unwrap();

        assert!(context.trip_id.is_some());
        assert_eq!(context.pet_id, None);
        assert_eq!(context.document_type, DocumentType::Passport);
    }
}

use time::OffsetDateTime;

use crate::document::{DocumentType, EntityType};
use crate::ids::EntityId;
use crate::normalization::sanitize_filename;

/// What an accepted upload is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target<'a> {
    /// A tutor document required by a trip.
    TripTutor { trip: EntityId },
    /// A pet document required by a trip.
    TripPet {
        trip: EntityId,
        pet: EntityId,
        pet_name: &'a str,
    },
    /// A document kept on a pet, outside any trip.
    Pet { pet: EntityId, pet_name: &'a str },
    /// A document kept on the tutor's account, outside any trip.
    Tutor { tutor: EntityId },
}

/// Where an upload is stored and how its record is labelled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub pet_id: Option<EntityId>,

    /// The storage key of the binary.
    pub key: String,

    pub subfolder: String,
    pub description: String,

    /// The key under which the owning entity links to the document.
    pub link_key: String,
}

impl Placement {
    /// Lays out an upload. `filename` must already be sanitized.
    pub fn new(
        target: Target,
        username: &str,
        document_type: &DocumentType,
        filename: &str,
        at: OffsetDateTime,
    ) -> Self {
        let stamp = at.format("%Y%m%d_%H%M%S");
        let root = sanitize_filename(username).unwrap_or_else(|| "_".to_owned());
        let name = |pet_name: &str| sanitize_filename(pet_name).unwrap_or_else(|| "pet".to_owned());

        match target {
            Target::TripTutor { trip } => Placement {
                entity_type: EntityType::Travel,
                entity_id: trip,
                pet_id: None,
                key: format!(
                    "{}/travels/{}/{}/{}_{}_{}",
                    root, trip, document_type, stamp, document_type, filename
                ),
                subfolder: document_type.to_string(),
                description: format!("Travel document: {}", document_type),
                link_key: document_type.to_string(),
            },
            Target::TripPet {
                trip,
                pet,
                pet_name,
            } => Placement {
                entity_type: EntityType::Travel,
                entity_id: trip,
                pet_id: Some(pet),
                key: format!(
                    "{}/travels/{}/pets/{}/{}/{}_{}_{}",
                    root,
                    trip,
                    pet,
                    document_type,
                    stamp,
                    name(pet_name),
                    filename
                ),
                subfolder: format!("pets/{}/{}", pet, document_type),
                description: format!("Travel document: {} (pet: {})", document_type, pet_name),
                link_key: format!("pets.{}.{}", pet, document_type),
            },
            Target::Pet { pet, pet_name } => Placement {
                entity_type: EntityType::Pet,
                entity_id: pet,
                pet_id: None,
                key: format!(
                    "{}/pets/{}/{}/{}_{}_{}",
                    root,
                    pet,
                    document_type,
                    stamp,
                    name(pet_name),
                    filename
                ),
                subfolder: document_type.to_string(),
                description: format!("Pet document: {}", document_type),
                link_key: document_type.to_string(),
            },
            Target::Tutor { tutor } => Placement {
                entity_type: EntityType::User,
                entity_id: tutor,
                pet_id: None,
                key: format!(
                    "{}/documents/{}/{}_{}",
                    root, document_type, stamp, filename
                ),
                subfolder: document_type.to_string(),
                description: format!("User document: {}", document_type),
                link_key: document_type.to_string(),
            },
        }
    }
}

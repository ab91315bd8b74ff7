use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ids::EntityId;
use crate::mime_type::FileKind;
use crate::times::Times;

/// Which checklist a document type belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Human,
    Pet,
    Standalone,
}

macro_rules! document_types {
    ($($variant:ident => $raw:literal, $label:literal, $side:ident;)+) => {
        /// The required-document vocabulary.
        ///
        /// The raw strings are part of the stored data and must not change.
        /// Anything outside the vocabulary is kept verbatim as `Unknown`.
        #[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
        #[serde(from = "String", into = "String")]
        pub enum DocumentType {
            $($variant,)+
            Unknown(String),
        }

        impl DocumentType {
            pub const KNOWN: &'static [DocumentType] = &[$(DocumentType::$variant,)+];

            pub fn as_str(&self) -> &str {
                match self {
                    $(DocumentType::$variant => $raw,)+
                    DocumentType::Unknown(raw) => raw,
                }
            }

            /// The display name; unknown types fall back to their raw string.
            pub fn label(&self) -> &str {
                match self {
                    $(DocumentType::$variant => $label,)+
                    DocumentType::Unknown(raw) => raw,
                }
            }

            pub fn side(&self) -> Option<Side> {
                match self {
                    $(DocumentType::$variant => Some(Side::$side),)+
                    DocumentType::Unknown(_) => None,
                }
            }
        }

        impl From<String> for DocumentType {
            fn from(raw: String) -> Self {
                match raw.as_str() {
                    $($raw => DocumentType::$variant,)+
                    _ => DocumentType::Unknown(raw),
                }
            }
        }
    };
}

document_types! {
    IdentityDocument => "identityDocument", "Identity Document", Human;
    Passport => "passport", "Passport", Human;
    TravelTicket => "travelTicket", "Travel Ticket", Human;
    TravelAuthorization => "travelAuthorization", "Travel Authorization", Human;
    CarDocument => "carDocument", "Car Document", Human;
    AddressProof => "addressProof", "Proof of Address", Human;
    CviIssuanceAuthorization => "cviIssuanceAuthorization", "CVI Issuance Authorization", Human;
    VaccinationCard => "vaccinationCard", "Vaccination Card", Pet;
    MicrochipCertificate => "microchipCertificate", "Microchip Certificate", Pet;
    RabiesSerologyReport => "rabiesSerologyReport", "Rabies Serology Report", Pet;
    LeishmaniasisSerologyReport => "leishmaniasisSerologyReport", "Leishmaniasis Serology Report", Pet;
    ImportPermit => "importPermit", "Import Permit", Pet;
    PetPassport => "petPassport", "Pet Passport", Pet;
    Cvi => "cvi", "CVI (International Veterinary Certificate)", Pet;
    ImportAuthorization => "importAuthorization", "Import Authorization", Pet;
    ArrivalNotice => "arrivalNotice", "Arrival Notice", Pet;
    EndorsedCvi => "endorsedCvi", "Endorsed CVI", Pet;
    AwbCargo => "awbCargo", "AWB Cargo", Pet;
    PetFacilities => "petFacilities", "Pet Facilities", Pet;
    PetPhoto => "petPhoto", "Pet Photo", Standalone;
    Other => "other", "Other", Standalone;
}

impl DocumentType {
    pub fn is_known(&self) -> bool {
        !matches!(self, DocumentType::Unknown(_))
    }
}

impl From<&str> for DocumentType {
    fn from(raw: &str) -> Self {
        DocumentType::from(raw.to_owned())
    }
}

impl From<DocumentType> for String {
    fn from(t: DocumentType) -> Self {
        t.as_str().to_owned()
    }
}

impl FromStr for DocumentType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DocumentType::from(s))
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of entity a document is attached to.
#[derive(Clone, Copy, Debug, Deserialize, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    User,
    Pet,
    Travel,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::User => "user",
            EntityType::Pet => "pet",
            EntityType::Travel => "travel",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(EntityType::User),
            "pet" => Some(EntityType::Pet),
            "travel" => Some(EntityType::Travel),
            _ => None,
        }
    }
}

/// A persisted record describing one uploaded file.
#[derive(Clone, Debug, Serialize)]
pub struct DocumentRecord {
    pub id: EntityId,

    pub entity_type: EntityType,

    /// The owning entity. For trip documents this is always the trip, even
    /// when the document belongs to one of its pets.
    pub entity_id: EntityId,

    /// The pet a trip document belongs to, if any.
    pub pet_id: Option<EntityId>,

    pub document_type: DocumentType,

    /// The sanitized original filename.
    pub filename: String,

    /// The storage key of the binary.
    pub path: String,

    pub public_url: Option<String>,

    pub file_kind: FileKind,

    pub size: i64,

    pub description: Option<String>,

    /// The storage subfolder, e.g. `pets/{pet}/vaccinationCard`.
    pub subfolder: Option<String>,

    #[serde(flatten)]
    pub times: Times,
}

impl DocumentRecord {
    pub fn identity(&self) -> DocumentFilter {
        DocumentFilter::identity(
            self.entity_type,
            self.entity_id,
            self.document_type.clone(),
            self.pet_id,
        )
    }
}

/// A document about to be inserted.
#[derive(Clone, Debug)]
pub struct NewDocument {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub pet_id: Option<EntityId>,
    pub document_type: DocumentType,
    pub filename: String,
    pub path: String,
    pub public_url: Option<String>,
    pub file_kind: FileKind,
    pub size: i64,
    pub description: Option<String>,
    pub subfolder: Option<String>,
}

impl NewDocument {
    /// The fields that replace an existing record's file on re-upload.
    pub fn as_patch(&self) -> DocumentPatch {
        DocumentPatch {
            filename: Some(self.filename.clone()),
            path: Some(self.path.clone()),
            public_url: self.public_url.clone(),
            file_kind: Some(self.file_kind),
            size: Some(self.size),
            description: self.description.clone(),
            subfolder: self.subfolder.clone(),
        }
    }
}

/// An in-place update; `None` leaves a field untouched.
#[derive(Clone, Debug, Default)]
pub struct DocumentPatch {
    pub filename: Option<String>,
    pub path: Option<String>,
    pub public_url: Option<String>,
    pub file_kind: Option<FileKind>,
    pub size: Option<i64>,
    pub description: Option<String>,
    pub subfolder: Option<String>,
}

impl DocumentPatch {
    pub fn apply(&self, record: &mut DocumentRecord) {
        if let Some(filename) = &self.filename {
            record.filename = filename.clone();
        }
        if let Some(path) = &self.path {
            record.path = path.clone();
        }
        if let Some(url) = &self.public_url {
            record.public_url = Some(url.clone());
        }
        if let Some(kind) = self.file_kind {
            record.file_kind = kind;
        }
        if let Some(size) = self.size {
            record.size = size;
        }
        if let Some(description) = &self.description {
            record.description = Some(description.clone());
        }
        if let Some(subfolder) = &self.subfolder {
            record.subfolder = Some(subfolder.clone());
        }
    }
}

/// How a filter treats `pet_id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PetScope {
    /// Any value, including none.
    Any,
    /// Documents not attributed to a pet.
    Tutor,
    Pet(EntityId),
}

/// Selects documents of one owning entity.
#[derive(Clone, Debug)]
pub struct DocumentFilter {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub document_type: Option<DocumentType>,
    pub pet: PetScope,
}

impl DocumentFilter {
    pub fn entity(entity_type: EntityType, entity_id: EntityId) -> Self {
        DocumentFilter {
            entity_type,
            entity_id,
            document_type: None,
            pet: PetScope::Any,
        }
    }

    /// The filter selecting exactly one identity key
    /// `(entity type, entity id, document type, pet id)`.
    pub fn identity(
        entity_type: EntityType,
        entity_id: EntityId,
        document_type: DocumentType,
        pet_id: Option<EntityId>,
    ) -> Self {
        DocumentFilter {
            entity_type,
            entity_id,
            document_type: Some(document_type),
            pet: match pet_id {
                Some(pet) => PetScope::Pet(pet),
                None => PetScope::Tutor,
            },
        }
    }

    pub fn matches(&self, record: &DocumentRecord) -> bool {
        record.entity_type == self.entity_type
            && record.entity_id == self.entity_id
            && self
                .document_type
                .as_ref()
                .map_or(true, |t| *t == record.document_type)
            && match self.pet {
                PetScope::Any => true,
                PetScope::Tutor => record.pet_id.is_none(),
                PetScope::Pet(pet) => record.pet_id == Some(pet),
            }
    }
}

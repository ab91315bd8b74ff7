#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use petransport::config::Config;
use petransport::db::memory::MemoryDb;
use petransport::document::DocumentType;
use petransport::environment::Environment;
use petransport::ids::EntityId;
use petransport::pet::Pet;
use petransport::requirements::RequiredDocuments;
use petransport::store::memory::MemoryStore;
use petransport::times::Times;
use petransport::trip::{Trip, TripStatus};
use petransport::tutor::Tutor;
use petransport::upload::{UploadContext, UploadFile};

pub const USERNAME: &str = "ana";
pub const MAX_UPLOAD_BYTES: u64 = 1024 * 1024;

/// A tutor with one trip and one enrolled pet, Rex, backed by in-memory
/// collaborators.
pub struct Fixture {
    pub db: Arc<MemoryDb>,
    pub store: Arc<MemoryStore>,
    pub environment: Environment,
    pub tutor: Tutor,
    pub rex: Pet,
    pub trip: Trip,
}

impl Fixture {
    /// The checklist of the end-to-end scenario: a passport for the tutor and
    /// a vaccination card for Rex.
    pub fn scenario() -> Self {
        let rex = EntityId::new();

        Self::with_requirements(
            rex,
            Some(json!({
                "humanDocs": ["passport"],
                "petDocs": { rex.to_string(): ["vaccinationCard"] },
            })),
        )
    }

    pub fn with_requirements(rex_id: EntityId, required_documents: Option<Value>) -> Self {
        Self::with_config(
            rex_id,
            required_documents,
            Config::new(Duration::from_secs(5), MAX_UPLOAD_BYTES),
        )
    }

    pub fn with_config(rex_id: EntityId, required_documents: Option<Value>, config: Config) -> Self {
        let db = Arc::new(MemoryDb::new());
        let store = Arc::new(MemoryStore::new());

        let tutor = Tutor::new(EntityId::new(), USERNAME, "Ana Souza");
        let rex = Pet::new(rex_id, tutor.id, "Rex");

        let trip = Trip {
            id: EntityId::new(),
            owner_id: tutor.id,
            origin: "São Paulo".to_owned(),
            destination: "Lisboa".to_owned(),
            travel_method: Some("plane".to_owned()),
            status: TripStatus::Upcoming,
            pet_ids: vec![rex.id],
            required_documents: RequiredDocuments::default(),
            history: vec![],
            times: Times::now(),
        };

        db.insert_tutor(tutor.clone());
        db.insert_pet(rex.clone());
        db.insert_trip(trip.clone(), required_documents);

        let environment = Environment::new(
            Arc::new(log::discard()),
            db.clone(),
            store.clone(),
            config,
        );

        Fixture {
            db,
            store,
            environment,
            tutor,
            rex,
            trip,
        }
    }

    /// Registers another tutor and returns them.
    pub fn add_tutor(&self, username: &str) -> Tutor {
        let tutor = Tutor::new(EntityId::new(), username, username);
        self.db.insert_tutor(tutor.clone());

        tutor
    }

    /// Registers another pet of the fixture tutor, not enrolled in the trip.
    pub fn add_pet(&self, name: &str) -> Pet {
        let pet = Pet::new(EntityId::new(), self.tutor.id, name);
        self.db.insert_pet(pet.clone());

        pet
    }
}

pub fn context(
    trip_id: Option<EntityId>,
    pet_id: Option<EntityId>,
    document_type: DocumentType,
) -> UploadContext {
    UploadContext {
        trip_id,
        pet_id,
        document_type,
    }
}

pub fn pdf(name: &str) -> UploadFile {
    UploadFile {
        filename: name.to_owned(),
        data: b"%PDF-1.4 test document".to_vec(),
    }
}

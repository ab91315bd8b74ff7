use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use time::OffsetDateTime;

use super::Db;
use crate::document::{DocumentFilter, DocumentPatch, DocumentRecord, EntityType, NewDocument};
use crate::errors::BackendError;
use crate::ids::EntityId;
use crate::pet::Pet;
use crate::requirements::RequiredDocuments;
use crate::times::Times;
use crate::trip::{Trip, TripEvent, TripStatus};
use crate::tutor::Tutor;

/// A back-reference from an owning entity to one of its documents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentLink {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub key: String,
    pub document_id: EntityId,
}

struct StoredTrip {
    trip: Trip,
    required_documents: Option<Value>,
}

#[derive(Default)]
struct State {
    tutors: Vec<Tutor>,
    pets: Vec<Pet>,
    trips: Vec<StoredTrip>,
    documents: Vec<DocumentRecord>,
    links: Vec<DocumentLink>,
}

/// A record store kept in process memory.
///
/// Documents keep their insertion order, which stands in for the
/// `created_at, id` ordering of the database. Requirements are stored as raw
/// JSON and normalized on every read, exactly like the JSONB column.
#[derive(Default)]
pub struct MemoryDb {
    state: RwLock<State>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tutor(&self, tutor: Tutor) {
        self.write().tutors.push(tutor);
    }

    pub fn insert_pet(&self, pet: Pet) {
        self.write().pets.push(pet);
    }

    /// Adds a trip whose requirements are the given raw value, which may be
    /// missing or malformed.
    pub fn insert_trip(&self, trip: Trip, required_documents: Option<Value>) {
        self.write().trips.push(StoredTrip {
            trip,
            required_documents,
        });
    }

    /// Adds a record as-is, bypassing the identity key. Used to reproduce
    /// records written before pet back-references existed.
    pub fn push_document(&self, record: DocumentRecord) {
        self.write().documents.push(record);
    }

    pub fn documents(&self) -> Vec<DocumentRecord> {
        self.read().documents.clone()
    }

    pub fn links(&self) -> Vec<DocumentLink> {
        self.read().links.clone()
    }

    fn read(&self) -> RwLockReadGuard<State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_trip(&self, id: &EntityId) -> Option<Trip> {
        let state = self.read();
        let stored = state.trips.iter().find(|t| t.trip.id == *id)?;

        let mut trip = stored.trip.clone();
        trip.required_documents = RequiredDocuments::from_value(stored.required_documents.as_ref());

        Some(trip)
    }

    fn with_trip<T>(
        &self,
        id: &EntityId,
        f: impl FnOnce(&mut StoredTrip) -> T,
    ) -> Result<T, BackendError> {
        let mut state = self.write();
        let stored = state
            .trips
            .iter_mut()
            .find(|t| t.trip.id == *id)
            .ok_or(BackendError::TripNotFound { id: *id })?;

        Ok(f(stored))
    }
}

impl Db for MemoryDb {
    fn retrieve_tutor(&self, id: &EntityId) -> BoxFuture<Result<Option<Tutor>, BackendError>> {
        let tutor = self.read().tutors.iter().find(|t| t.id == *id).cloned();

        async move { Ok(tutor) }.boxed()
    }

    fn retrieve_tutor_by_username(
        &self,
        username: &str,
    ) -> BoxFuture<Result<Option<Tutor>, BackendError>> {
        let tutor = self
            .read()
            .tutors
            .iter()
            .find(|t| t.username == username)
            .cloned();

        async move { Ok(tutor) }.boxed()
    }

    fn retrieve_pet(&self, id: &EntityId) -> BoxFuture<Result<Option<Pet>, BackendError>> {
        let pet = self.read().pets.iter().find(|p| p.id == *id).cloned();

        async move { Ok(pet) }.boxed()
    }

    fn retrieve_pets(&self, ids: &[EntityId]) -> BoxFuture<Result<Vec<Pet>, BackendError>> {
        let state = self.read();
        let pets = ids
            .iter()
            .filter_map(|id| state.pets.iter().find(|p| p.id == *id).cloned())
            .collect();

        async move { Ok(pets) }.boxed()
    }

    fn retrieve_trip(&self, id: &EntityId) -> BoxFuture<Result<Option<Trip>, BackendError>> {
        let trip = self.load_trip(id);

        async move { Ok(trip) }.boxed()
    }

    fn retrieve_trips_by_owner(
        &self,
        owner: &EntityId,
    ) -> BoxFuture<Result<Vec<Trip>, BackendError>> {
        let ids: Vec<EntityId> = self
            .read()
            .trips
            .iter()
            .filter(|t| t.trip.owner_id == *owner)
            .map(|t| t.trip.id)
            .collect();
        let trips = ids.iter().filter_map(|id| self.load_trip(id)).collect();

        async move { Ok(trips) }.boxed()
    }

    fn insert_document(
        &self,
        document: NewDocument,
    ) -> BoxFuture<Result<DocumentRecord, BackendError>> {
        let mut state = self.write();

        let filter = DocumentFilter::identity(
            document.entity_type,
            document.entity_id,
            document.document_type.clone(),
            document.pet_id,
        );

        let record = match state.documents.iter_mut().find(|d| filter.matches(d)) {
            Some(existing) => {
                existing.filename = document.filename;
                existing.path = document.path;
                existing.public_url = document.public_url;
                existing.file_kind = document.file_kind;
                existing.size = document.size;
                existing.description = document.description;
                existing.subfolder = document.subfolder;
                existing.times.updated_at = OffsetDateTime::now_utc();

                existing.clone()
            }
            None => {
                let record = DocumentRecord {
                    id: EntityId::new(),
                    entity_type: document.entity_type,
                    entity_id: document.entity_id,
                    pet_id: document.pet_id,
                    document_type: document.document_type,
                    filename: document.filename,
                    path: document.path,
                    public_url: document.public_url,
                    file_kind: document.file_kind,
                    size: document.size,
                    description: document.description,
                    subfolder: document.subfolder,
                    times: Times::now(),
                };
                state.documents.push(record.clone());

                record
            }
        };

        async move { Ok(record) }.boxed()
    }

    fn documents_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: &EntityId,
    ) -> BoxFuture<Result<Vec<DocumentRecord>, BackendError>> {
        let filter = DocumentFilter::entity(entity_type, *entity_id);
        let documents = self
            .read()
            .documents
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();

        async move { Ok(documents) }.boxed()
    }

    fn find_document(
        &self,
        filter: &DocumentFilter,
    ) -> BoxFuture<Result<Option<DocumentRecord>, BackendError>> {
        let document = self
            .read()
            .documents
            .iter()
            .find(|d| filter.matches(d))
            .cloned();

        async move { Ok(document) }.boxed()
    }

    fn update_document(
        &self,
        id: &EntityId,
        patch: DocumentPatch,
    ) -> BoxFuture<Result<u64, BackendError>> {
        let mut state = self.write();

        let count = match state.documents.iter_mut().find(|d| d.id == *id) {
            Some(record) => {
                patch.apply(record);
                record.times.updated_at = OffsetDateTime::now_utc();
                1
            }
            None => 0,
        };

        async move { Ok(count) }.boxed()
    }

    fn link_document(
        &self,
        entity_type: EntityType,
        entity_id: &EntityId,
        key: String,
        document_id: &EntityId,
    ) -> BoxFuture<Result<(), BackendError>> {
        let link = DocumentLink {
            entity_type,
            entity_id: *entity_id,
            key,
            document_id: *document_id,
        };

        let mut state = self.write();
        state.links.retain(|l| {
            !(l.entity_type == link.entity_type && l.entity_id == link.entity_id && l.key == link.key)
        });
        state.links.push(link);

        async move { Ok(()) }.boxed()
    }

    fn set_required_documents(
        &self,
        trip: &EntityId,
        required: &RequiredDocuments,
    ) -> BoxFuture<Result<(), BackendError>> {
        let value = required.to_value();
        let result = self.with_trip(trip, |stored| {
            stored.required_documents = Some(value);
            stored.trip.times.updated_at = OffsetDateTime::now_utc();
        });

        async move { result }.boxed()
    }

    fn update_trip_status(
        &self,
        trip: &EntityId,
        status: TripStatus,
    ) -> BoxFuture<Result<(), BackendError>> {
        let result = self.with_trip(trip, |stored| {
            stored.trip.status = status;
            stored.trip.times.updated_at = OffsetDateTime::now_utc();
        });

        async move { result }.boxed()
    }

    fn append_trip_event(
        &self,
        trip: &EntityId,
        event: TripEvent,
    ) -> BoxFuture<Result<(), BackendError>> {
        let result = self.with_trip(trip, |stored| stored.trip.history.push(event));

        async move { result }.boxed()
    }
}

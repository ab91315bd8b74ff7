use futures::future::BoxFuture;

use crate::document::{DocumentFilter, DocumentPatch, DocumentRecord, EntityType, NewDocument};
use crate::errors::BackendError;
use crate::ids::EntityId;
use crate::pet::Pet;
use crate::requirements::RequiredDocuments;
use crate::trip::{Trip, TripEvent, TripStatus};
use crate::tutor::Tutor;

pub mod memory;

pub type SafeDb = dyn Db + Send + Sync;

/// The record store and entity lookups the core depends on.
pub trait Db {
    fn retrieve_tutor(&self, id: &EntityId) -> BoxFuture<Result<Option<Tutor>, BackendError>>;

    fn retrieve_tutor_by_username(
        &self,
        username: &str,
    ) -> BoxFuture<Result<Option<Tutor>, BackendError>>;

    fn retrieve_pet(&self, id: &EntityId) -> BoxFuture<Result<Option<Pet>, BackendError>>;

    /// Returns the pets that exist among `ids`, in the order given.
    fn retrieve_pets(&self, ids: &[EntityId]) -> BoxFuture<Result<Vec<Pet>, BackendError>>;

    /// Returns the trip with its requirements already normalized.
    fn retrieve_trip(&self, id: &EntityId) -> BoxFuture<Result<Option<Trip>, BackendError>>;

    fn retrieve_trips_by_owner(
        &self,
        owner: &EntityId,
    ) -> BoxFuture<Result<Vec<Trip>, BackendError>>;

    /// Inserts a document, or replaces the live record with the same
    /// identity key.
    fn insert_document(
        &self,
        document: NewDocument,
    ) -> BoxFuture<Result<DocumentRecord, BackendError>>;

    /// Returns live documents of one entity, oldest first.
    fn documents_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: &EntityId,
    ) -> BoxFuture<Result<Vec<DocumentRecord>, BackendError>>;

    fn find_document(
        &self,
        filter: &DocumentFilter,
    ) -> BoxFuture<Result<Option<DocumentRecord>, BackendError>>;

    /// Returns the number of records updated.
    fn update_document(
        &self,
        id: &EntityId,
        patch: DocumentPatch,
    ) -> BoxFuture<Result<u64, BackendError>>;

    /// Points `key` on the owning entity at a document.
    fn link_document(
        &self,
        entity_type: EntityType,
        entity_id: &EntityId,
        key: String,
        document_id: &EntityId,
    ) -> BoxFuture<Result<(), BackendError>>;

    fn set_required_documents(
        &self,
        trip: &EntityId,
        required: &RequiredDocuments,
    ) -> BoxFuture<Result<(), BackendError>>;

    fn update_trip_status(
        &self,
        trip: &EntityId,
        status: TripStatus,
    ) -> BoxFuture<Result<(), BackendError>>;

    fn append_trip_event(
        &self,
        trip: &EntityId,
        event: TripEvent,
    ) -> BoxFuture<Result<(), BackendError>>;
}

pub use self::postgres::*;

mod postgres {
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use serde_json::Value;
    use sqlx::{
        self,
        postgres::{PgPool, PgRow},
    };
    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::document::{
        DocumentFilter, DocumentPatch, DocumentRecord, DocumentType, EntityType, NewDocument,
        PetScope,
    };
    use crate::errors::BackendError;
    use crate::ids::EntityId;
    use crate::mime_type::FileKind;
    use crate::pet::Pet;
    use crate::requirements::RequiredDocuments;
    use crate::times::Times;
    use crate::trip::{EventKind, Trip, TripEvent, TripStatus};
    use crate::tutor::Tutor;

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }

        async fn trip_events(&self, id: Uuid) -> Result<Vec<TripEvent>, BackendError> {
            let query = sqlx::query(include_str!("queries/retrieve_trip_events.sql"));

            query
                .bind(id)
                .try_map(|row: PgRow| {
                    let kind: String = try_get(&row, "kind")?;
                    let kind = EventKind::parse(&kind)
                        .ok_or_else(|| decode_error(format!("unknown event kind {}", kind)))?;

                    Ok(TripEvent {
                        kind,
                        description: try_get(&row, "description")?,
                        occurred_at: try_get(&row, "occurred_at")?,
                    })
                })
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)
        }

        async fn with_history(&self, mut trip: Trip) -> Result<Trip, BackendError> {
            trip.history = self.trip_events(trip.id.as_uuid()).await?;

            Ok(trip)
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn retrieve_tutor(
            &self,
            id: &EntityId,
        ) -> BoxFuture<Result<Option<Tutor>, BackendError>> {
            let id = id.as_uuid();

            async move {
                sqlx::query(include_str!("queries/retrieve_tutor.sql"))
                    .bind(id)
                    .try_map(|row: PgRow| new_tutor(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)
            }
            .boxed()
        }

        fn retrieve_tutor_by_username(
            &self,
            username: &str,
        ) -> BoxFuture<Result<Option<Tutor>, BackendError>> {
            let username = username.to_owned();

            async move {
                sqlx::query(include_str!("queries/retrieve_tutor_by_username.sql"))
                    .bind(username)
                    .try_map(|row: PgRow| new_tutor(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)
            }
            .boxed()
        }

        fn retrieve_pet(&self, id: &EntityId) -> BoxFuture<Result<Option<Pet>, BackendError>> {
            let id = id.as_uuid();

            async move {
                sqlx::query(include_str!("queries/retrieve_pet.sql"))
                    .bind(id)
                    .try_map(|row: PgRow| new_pet(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)
            }
            .boxed()
        }

        fn retrieve_pets(&self, ids: &[EntityId]) -> BoxFuture<Result<Vec<Pet>, BackendError>> {
            let ids = ids.to_vec();

            async move {
                let uuids: Vec<Uuid> = ids.iter().map(EntityId::as_uuid).collect();

                let pets = sqlx::query(include_str!("queries/retrieve_pets.sql"))
                    .bind(uuids)
                    .try_map(|row: PgRow| new_pet(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                // keep the caller's order, which is the trip's enrolment order
                Ok(ids
                    .iter()
                    .filter_map(|id| pets.iter().find(|p| p.id == *id).cloned())
                    .collect())
            }
            .boxed()
        }

        fn retrieve_trip(&self, id: &EntityId) -> BoxFuture<Result<Option<Trip>, BackendError>> {
            let id = id.as_uuid();

            async move {
                let trip = sqlx::query(include_str!("queries/retrieve_trip.sql"))
                    .bind(id)
                    .try_map(|row: PgRow| new_trip(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                match trip {
                    Some(trip) => Ok(Some(self.with_history(trip).await?)),
                    None => Ok(None),
                }
            }
            .boxed()
        }

        fn retrieve_trips_by_owner(
            &self,
            owner: &EntityId,
        ) -> BoxFuture<Result<Vec<Trip>, BackendError>> {
            let owner = owner.as_uuid();

            async move {
                let trips = sqlx::query(include_str!("queries/retrieve_trips_by_owner.sql"))
                    .bind(owner)
                    .try_map(|row: PgRow| new_trip(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                let mut results = Vec::with_capacity(trips.len());

                for trip in trips {
                    results.push(self.with_history(trip).await?);
                }

                Ok(results)
            }
            .boxed()
        }

        fn insert_document(
            &self,
            document: NewDocument,
        ) -> BoxFuture<Result<DocumentRecord, BackendError>> {
            async move {
                sqlx::query(include_str!("queries/insert_document.sql"))
                    .bind(EntityId::new().as_uuid())
                    .bind(document.entity_type.as_str())
                    .bind(document.entity_id.as_uuid())
                    .bind(document.pet_id.map(|p| p.as_uuid()))
                    .bind(document.document_type.as_str())
                    .bind(&document.filename)
                    .bind(&document.path)
                    .bind(&document.public_url)
                    .bind(document.file_kind.as_str())
                    .bind(document.size)
                    .bind(&document.description)
                    .bind(&document.subfolder)
                    .try_map(|row: PgRow| new_document(&row))
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)
            }
            .boxed()
        }

        fn documents_by_entity(
            &self,
            entity_type: EntityType,
            entity_id: &EntityId,
        ) -> BoxFuture<Result<Vec<DocumentRecord>, BackendError>> {
            let entity_id = entity_id.as_uuid();

            async move {
                sqlx::query(include_str!("queries/documents_by_entity.sql"))
                    .bind(entity_type.as_str())
                    .bind(entity_id)
                    .try_map(|row: PgRow| new_document(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)
            }
            .boxed()
        }

        fn find_document(
            &self,
            filter: &DocumentFilter,
        ) -> BoxFuture<Result<Option<DocumentRecord>, BackendError>> {
            let filter = filter.clone();

            async move {
                let (constrain_pet, pet_id) = match filter.pet {
                    PetScope::Any => (false, None),
                    PetScope::Tutor => (true, None),
                    PetScope::Pet(pet) => (true, Some(pet.as_uuid())),
                };

                sqlx::query(include_str!("queries/find_document.sql"))
                    .bind(filter.entity_type.as_str())
                    .bind(filter.entity_id.as_uuid())
                    .bind(filter.document_type.as_ref().map(|t| t.as_str().to_owned()))
                    .bind(constrain_pet)
                    .bind(pet_id)
                    .try_map(|row: PgRow| new_document(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)
            }
            .boxed()
        }

        fn update_document(
            &self,
            id: &EntityId,
            patch: DocumentPatch,
        ) -> BoxFuture<Result<u64, BackendError>> {
            let id = id.as_uuid();

            async move {
                let count = sqlx::query(include_str!("queries/update_document.sql"))
                    .bind(id)
                    .bind(patch.filename)
                    .bind(patch.path)
                    .bind(patch.public_url)
                    .bind(patch.file_kind.map(|k| k.as_str()))
                    .bind(patch.size)
                    .bind(patch.description)
                    .bind(patch.subfolder)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                Ok(count)
            }
            .boxed()
        }

        fn link_document(
            &self,
            entity_type: EntityType,
            entity_id: &EntityId,
            key: String,
            document_id: &EntityId,
        ) -> BoxFuture<Result<(), BackendError>> {
            let entity_id = entity_id.as_uuid();
            let document_id = document_id.as_uuid();

            async move {
                sqlx::query(include_str!("queries/link_document.sql"))
                    .bind(entity_type.as_str())
                    .bind(entity_id)
                    .bind(key)
                    .bind(document_id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn set_required_documents(
            &self,
            trip: &EntityId,
            required: &RequiredDocuments,
        ) -> BoxFuture<Result<(), BackendError>> {
            let trip = *trip;
            let value = required.to_value();

            async move {
                let count = sqlx::query(include_str!("queries/set_required_documents.sql"))
                    .bind(trip.as_uuid())
                    .bind(value)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(BackendError::TripNotFound { id: trip })
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn update_trip_status(
            &self,
            trip: &EntityId,
            status: TripStatus,
        ) -> BoxFuture<Result<(), BackendError>> {
            let trip = *trip;

            async move {
                let count = sqlx::query(include_str!("queries/update_trip_status.sql"))
                    .bind(trip.as_uuid())
                    .bind(status.as_str())
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(BackendError::TripNotFound { id: trip })
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn append_trip_event(
            &self,
            trip: &EntityId,
            event: TripEvent,
        ) -> BoxFuture<Result<(), BackendError>> {
            let trip = trip.as_uuid();

            async move {
                sqlx::query(include_str!("queries/append_trip_event.sql"))
                    .bind(trip)
                    .bind(event.kind.as_str())
                    .bind(event.description)
                    .bind(event.occurred_at)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }
    }

    fn new_tutor(row: &PgRow) -> Result<Tutor, sqlx::Error> {
        Ok(Tutor {
            id: get_id(row, "id")?,
            username: try_get(row, "username")?,
            name: try_get(row, "name")?,
            email: try_get(row, "email")?,
            residential_address_id: get_optional_id(row, "residential_address_id")?,
            delivery_address_id: get_optional_id(row, "delivery_address_id")?,
        })
    }

    fn new_pet(row: &PgRow) -> Result<Pet, sqlx::Error> {
        Ok(Pet {
            id: get_id(row, "id")?,
            owner_id: get_id(row, "owner_id")?,
            name: try_get(row, "name")?,
            species: try_get(row, "species")?,
            breed: try_get(row, "breed")?,
            gender: try_get(row, "gender")?,
            weight: try_get(row, "weight")?,
            microchip: try_get(row, "microchip")?,
            photo_id: get_optional_id(row, "photo_id")?,
        })
    }

    fn new_trip(row: &PgRow) -> Result<Trip, sqlx::Error> {
        let status: String = try_get(row, "status")?;
        let status = TripStatus::parse(&status)
            .ok_or_else(|| decode_error(format!("unknown trip status {}", status)))?;

        let pet_ids: Vec<Uuid> = try_get(row, "pet_ids")?;
        let mut unique: Vec<EntityId> = Vec::with_capacity(pet_ids.len());
        for id in pet_ids.into_iter().map(EntityId::from) {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }

        let required: Option<Value> = try_get(row, "required_documents")?;

        Ok(Trip {
            id: get_id(row, "id")?,
            owner_id: get_id(row, "owner_id")?,
            origin: try_get(row, "origin")?,
            destination: try_get(row, "destination")?,
            travel_method: try_get(row, "travel_method")?,
            status,
            pet_ids: unique,
            required_documents: RequiredDocuments::from_value(required.as_ref()),
            history: vec![],
            times: Times {
                created_at: try_get(row, "created_at")?,
                updated_at: try_get(row, "updated_at")?,
            },
        })
    }

    fn new_document(row: &PgRow) -> Result<DocumentRecord, sqlx::Error> {
        let entity_type: String = try_get(row, "entity_type")?;
        let entity_type = EntityType::parse(&entity_type)
            .ok_or_else(|| decode_error(format!("unknown entity type {}", entity_type)))?;

        let file_kind: String = try_get(row, "file_kind")?;
        let file_kind = FileKind::parse(&file_kind)
            .ok_or_else(|| decode_error(format!("unknown file kind {}", file_kind)))?;

        let document_type: String = try_get(row, "document_type")?;
        let created_at: OffsetDateTime = try_get(row, "created_at")?;
        let updated_at: OffsetDateTime = try_get(row, "updated_at")?;

        Ok(DocumentRecord {
            id: get_id(row, "id")?,
            entity_type,
            entity_id: get_id(row, "entity_id")?,
            pet_id: get_optional_id(row, "pet_id")?,
            document_type: DocumentType::from(document_type),
            filename: try_get(row, "filename")?,
            path: try_get(row, "path")?,
            public_url: try_get(row, "public_url")?,
            file_kind,
            size: try_get(row, "size")?,
            description: try_get(row, "description")?,
            subfolder: try_get(row, "subfolder")?,
            times: Times {
                created_at,
                updated_at,
            },
        })
    }

    fn get_id(row: &PgRow, column: &str) -> Result<EntityId, sqlx::Error> {
        let id: Uuid = try_get(row, column)?;

        Ok(EntityId::from(id))
    }

    fn get_optional_id(row: &PgRow, column: &str) -> Result<Option<EntityId>, sqlx::Error> {
        let id: Option<Uuid> = try_get(row, column)?;

        Ok(id.map(EntityId::from))
    }

    fn try_get<'a, T: sqlx::Type<sqlx::Postgres> + sqlx::decode::Decode<'a, sqlx::Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, sqlx::Error> {
        use sqlx::prelude::*;

        row.try_get(column)
    }

    fn decode_error(message: String) -> sqlx::Error {
        sqlx::Error::Decode(message.into())
    }

    fn map_sqlx_error(error: sqlx::Error) -> BackendError {
        BackendError::Sqlx { source: error }
    }
}

use std::collections::BTreeMap;

use log::{debug, o, Logger};
use serde::Serialize;

use crate::db::SafeDb;
use crate::document::EntityType;
use crate::errors::BackendError;
use crate::ids::EntityId;
use crate::matcher::{match_documents, DocumentLine, MatchOutcome, Strategy};
use crate::pet::Pet;
use crate::requirements::RequiredDocuments;
use crate::trip::{Trip, TripStatus};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    fn count(&mut self, sent: bool) {
        self.total += 1;
        if sent {
            self.completed += 1;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PetProgress {
    /// Absent for pets no longer enrolled in the trip.
    pub name: Option<String>,

    #[serde(flatten)]
    pub progress: Progress,
}

/// The detailed completion view of one trip.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripProgress {
    pub trip_id: EntityId,
    pub status: TripStatus,
    pub tutor_progress: Progress,
    pub per_pet_progress: BTreeMap<EntityId, PetProgress>,
    pub sent_docs: Vec<DocumentLine>,
    pub missing_docs: Vec<DocumentLine>,
}

/// Folds a match outcome into per-owner counters.
///
/// Every pet the checklist covers gets an entry, including enrolled pets with
/// nothing to supply.
pub fn aggregate(trip: &Trip, pets: &[Pet], outcome: MatchOutcome) -> TripProgress {
    let required = &trip.required_documents;
    let mut tutor_progress = Progress::default();

    let mut per_pet_progress: BTreeMap<EntityId, PetProgress> = required
        .pets(&trip.pet_ids)
        .into_iter()
        .map(|pet| {
            let name = pets
                .iter()
                .find(|p| p.id == pet && trip.is_enrolled(&p.id))
                .map(|p| p.name.clone());

            (
                pet,
                PetProgress {
                    name,
                    progress: Progress::default(),
                },
            )
        })
        .collect();

    let lines = outcome
        .sent
        .iter()
        .map(|l| (l, true))
        .chain(outcome.missing.iter().map(|l| (l, false)));

    for (line, sent) in lines {
        match line.pet_id {
            None => tutor_progress.count(sent),
            Some(pet) => {
                if let Some(entry) = per_pet_progress.get_mut(&pet) {
                    entry.progress.count(sent);
                }
            }
        }
    }

    TripProgress {
        trip_id: trip.id,
        status: trip.status,
        tutor_progress,
        per_pet_progress,
        sent_docs: outcome.sent,
        missing_docs: outcome.missing,
    }
}

/// Computes the progress of an already loaded trip.
pub async fn trip_progress(
    db: &SafeDb,
    logger: &Logger,
    trip: &Trip,
) -> Result<TripProgress, BackendError> {
    let logger = logger.new(o!("trip" => trip.id.to_string()));

    let pets = db.retrieve_pets(&trip.pet_ids).await?;
    let documents = db.documents_by_entity(EntityType::Travel, &trip.id).await?;
    debug!(logger, "Matching documents..."; "documents" => documents.len(), "pets" => pets.len());

    let outcome = match_documents(
        &logger,
        &trip.required_documents,
        &trip.pet_ids,
        &pets,
        &documents,
        Strategy::Full,
    );

    Ok(aggregate(trip, &pets, outcome))
}

/// The authoritative completion view of one trip. Recomputed on every call.
pub async fn compute_trip_progress(
    db: &SafeDb,
    logger: &Logger,
    trip_id: EntityId,
) -> Result<TripProgress, BackendError> {
    let trip = db
        .retrieve_trip(&trip_id)
        .await?
        .ok_or(BackendError::TripNotFound { id: trip_id })?;

    trip_progress(db, logger, &trip).await
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    pub trip_id: EntityId,
    pub origin: String,
    pub destination: String,
    pub status: TripStatus,
    pub completed: usize,
    pub total: usize,
    pub sent: Vec<DocumentLine>,
    pub missing: Vec<DocumentLine>,
}

/// The cheap overview shown on a tutor's home page.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub tutor_id: EntityId,
    pub per_trip_progress: Vec<TripSummary>,

    /// Every document type required by any of the tutor's trips.
    pub required_documents: RequiredDocuments,

    pub completed: usize,
    pub total: usize,
}

/// Summarizes every trip of a tutor using exact matches only.
pub async fn compute_dashboard_summary(
    db: &SafeDb,
    logger: &Logger,
    tutor_id: EntityId,
) -> Result<DashboardSummary, BackendError> {
    let logger = logger.new(o!("tutor" => tutor_id.to_string()));

    db.retrieve_tutor(&tutor_id)
        .await?
        .ok_or(BackendError::TutorIdNotFound { id: tutor_id })?;

    let trips = db.retrieve_trips_by_owner(&tutor_id).await?;
    debug!(logger, "Summarizing trips..."; "trips" => trips.len());

    let mut per_trip_progress = Vec::with_capacity(trips.len());

    for trip in &trips {
        let pets = db.retrieve_pets(&trip.pet_ids).await?;
        let documents = db.documents_by_entity(EntityType::Travel, &trip.id).await?;

        let outcome = match_documents(
            &logger,
            &trip.required_documents,
            &trip.pet_ids,
            &pets,
            &documents,
            Strategy::ExactOnly,
        );

        per_trip_progress.push(TripSummary {
            trip_id: trip.id,
            origin: trip.origin.clone(),
            destination: trip.destination.clone(),
            status: trip.status,
            completed: outcome.completed(),
            total: outcome.total(),
            sent: outcome.sent,
            missing: outcome.missing,
        });
    }

    let required_documents = RequiredDocuments::new(
        trips
            .iter()
            .flat_map(|t| t.required_documents.human_docs.iter().cloned()),
        trips.iter().flat_map(|t| {
            t.required_documents
                .pet_docs
                .iter()
                .map(|(pet, docs)| (*pet, docs.clone()))
        }),
    );

    Ok(DashboardSummary {
        tutor_id,
        completed: per_trip_progress.iter().map(|t| t.completed).sum(),
        total: per_trip_progress.iter().map(|t| t.total).sum(),
        per_trip_progress,
        required_documents,
    })
}

#[cfg(test)]
mod tests {
    use super::aggregate;
    use crate::document::DocumentType;
    use crate::ids::EntityId;
    use crate::matcher::{DocumentLine, MatchOutcome};
    use crate::pet::Pet;
    use crate::requirements::RequiredDocuments;
    use crate::times::Times;
    use crate::trip::{Trip, TripStatus};

    fn line(t: DocumentType, pet: Option<EntityId>) -> DocumentLine {
        DocumentLine {
            label: t.label().to_owned(),
            document_type: t,
            pet_id: pet,
            pet_name: None,
            matched_by: None,
            document_id: None,
        }
    }

    #[test]
    fn counters_split_by_owner() {
        let owner = EntityId::new();
        let rex = Pet::new(EntityId::new(), owner, "Rex");
        let quiet = Pet::new(EntityId::new(), owner, "Mia");

        let trip = Trip {
            id: EntityId::new(),
            owner_id: owner,
            origin: "GRU".to_owned(),
            destination: "LIS".to_owned(),
            travel_method: None,
            status: TripStatus::Upcoming,
            pet_ids: vec![rex.id, quiet.id],
            required_documents: RequiredDocuments::new(
                vec![DocumentType::Passport],
                vec![(rex.id, vec![DocumentType::Cvi, DocumentType::VaccinationCard])],
            ),
            history: vec![],
            times: Times::now(),
        };

        let outcome = MatchOutcome {
            sent: vec![line(DocumentType::Cvi, Some(rex.id))],
            missing: vec![
                line(DocumentType::Passport, None),
                line(DocumentType::VaccinationCard, Some(rex.id)),
            ],
        };

        let progress = aggregate(&trip, &[rex.clone(), quiet.clone()], outcome);

        assert_eq!(progress.tutor_progress.completed, 0);
        assert_eq!(progress.tutor_progress.total, 1);

        let rex_progress = &progress.per_pet_progress[&rex.id];
        assert_eq!((rex_progress.progress.completed, rex_progress.progress.total), (1, 2));
        assert_eq!(rex_progress.name.as_deref(), Some("Rex"));

        let quiet_progress = &progress.per_pet_progress[&quiet.id];
        assert_eq!((quiet_progress.progress.completed, quiet_progress.progress.total), (0, 0));
    }
}

use std::fmt;

use log::{debug, o, Logger};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::db::SafeDb;
use crate::errors::BackendError;
use crate::ids::EntityId;
use crate::requirements::RequiredDocuments;
use crate::times::Times;
use crate::tutor::Tutor;

/// A single pet-travel engagement and its document checklist.
#[derive(Clone, Debug, Serialize)]
pub struct Trip {
    pub id: EntityId,

    /// The tutor who owns the trip.
    pub owner_id: EntityId,

    pub origin: String,

    pub destination: String,

    pub travel_method: Option<String>,

    pub status: TripStatus,

    /// The enrolled pets, without duplicates.
    pub pet_ids: Vec<EntityId>,

    /// Already normalized; never missing.
    pub required_documents: RequiredDocuments,

    pub history: Vec<TripEvent>,

    #[serde(flatten)]
    pub times: Times,
}

impl Trip {
    pub fn is_enrolled(&self, pet: &EntityId) -> bool {
        self.pet_ids.contains(pet)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Upcoming,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Upcoming => "upcoming",
            TripStatus::InProgress => "in_progress",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "upcoming" => Some(TripStatus::Upcoming),
            "in_progress" => Some(TripStatus::InProgress),
            "completed" => Some(TripStatus::Completed),
            "cancelled" => Some(TripStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }

    /// Moves to `target`, refusing to leave a terminal status.
    pub fn transition(self, target: TripStatus) -> Result<TripStatus, BackendError> {
        if self.is_terminal() {
            return Err(BackendError::TerminalTripStatus { status: self });
        }

        Ok(target)
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StatusChange,
    DocumentUpload,
    RequirementsUpdate,
    Update,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StatusChange => "status_change",
            EventKind::DocumentUpload => "document_upload",
            EventKind::RequirementsUpdate => "requirements_update",
            EventKind::Update => "update",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "status_change" => Some(EventKind::StatusChange),
            "document_upload" => Some(EventKind::DocumentUpload),
            "requirements_update" => Some(EventKind::RequirementsUpdate),
            "update" => Some(EventKind::Update),
            _ => None,
        }
    }
}

/// An entry in a trip's append-only history.
#[derive(Clone, Debug, Serialize)]
pub struct TripEvent {
    pub kind: EventKind,

    pub description: String,

    #[serde(with = "time::serde::timestamp")]
    pub occurred_at: OffsetDateTime,
}

impl TripEvent {
    pub fn now(kind: EventKind, description: impl Into<String>) -> Self {
        TripEvent {
            kind,
            description: description.into(),
            occurred_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Resolves the acting tutor and a trip they own.
pub async fn load_owned_trip(
    db: &SafeDb,
    username: &str,
    trip_id: EntityId,
) -> Result<(Tutor, Trip), BackendError> {
    let tutor = db
        .retrieve_tutor_by_username(username)
        .await?
        .ok_or_else(|| BackendError::TutorNotFound {
            username: username.to_owned(),
        })?;

    let trip = db
        .retrieve_trip(&trip_id)
        .await?
        .ok_or(BackendError::TripNotFound { id: trip_id })?;

    if trip.owner_id != tutor.id {
        return Err(BackendError::TripNotOwned {
            trip: trip_id,
            username: username.to_owned(),
        });
    }

    Ok((tutor, trip))
}

/// Cancels or completes a trip on behalf of its owner.
pub async fn change_status(
    db: &SafeDb,
    logger: &Logger,
    username: &str,
    trip_id: EntityId,
    target: TripStatus,
) -> Result<TripStatus, BackendError> {
    let logger = logger.new(o!("trip" => trip_id.to_string(), "target" => target.as_str()));

    let (_, trip) = load_owned_trip(db, username, trip_id).await?;
    let status = trip.status.transition(target)?;

    debug!(logger, "Updating trip status..."; "from" => trip.status.as_str());
    db.update_trip_status(&trip_id, status).await?;

    let event = TripEvent::now(
        EventKind::StatusChange,
        format!("Status changed from {} to {}", trip.status, status),
    );
    db.append_trip_event(&trip_id, event).await?;

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::TripStatus;

    #[test]
    fn terminal_statuses_are_final() {
        assert_eq!(
            TripStatus::Upcoming.transition(TripStatus::Cancelled).unwrap(),
            TripStatus::Cancelled
        );
        assert_eq!(
            TripStatus::InProgress.transition(TripStatus::Completed).unwrap(),
            TripStatus::Completed
        );
        assert!(TripStatus::Completed.transition(TripStatus::Cancelled).is_err());
        assert!(TripStatus::Cancelled.transition(TripStatus::Upcoming).is_err());
    }

    #[test]
    fn statuses_round_trip() {
        for status in &[
            TripStatus::Upcoming,
            TripStatus::InProgress,
            TripStatus::Completed,
            TripStatus::Cancelled,
        ] {
            assert_eq!(TripStatus::parse(status.as_str()), Some(*status));
        }
    }
}

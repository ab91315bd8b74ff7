//! The per-trip checklist of required documents.
//!
//! Stored requirements are free-form JSON. Reads never fail on them: anything
//! missing or malformed normalizes to an empty checklist, and malformed parts
//! are dropped individually.

use std::collections::BTreeMap;

use log::{debug, warn, Logger};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::SafeDb;
use crate::document::DocumentType;
use crate::errors::BackendError;
use crate::ids::EntityId;
use crate::trip::{EventKind, TripEvent};

/// Who a required line item is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Owner {
    Tutor,
    Pet(EntityId),
}

impl Owner {
    pub fn pet_id(&self) -> Option<EntityId> {
        match self {
            Owner::Tutor => None,
            Owner::Pet(id) => Some(*id),
        }
    }
}

/// One `(owner, document type)` entry of the checklist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineItem {
    pub owner: Owner,
    pub document_type: DocumentType,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredDocuments {
    /// Documents the tutor must supply, without duplicates.
    #[serde(default)]
    pub human_docs: Vec<DocumentType>,

    /// Documents per pet. A pet without a key has nothing to supply.
    #[serde(default)]
    pub pet_docs: BTreeMap<EntityId, Vec<DocumentType>>,
}

impl RequiredDocuments {
    /// Builds a checklist, dropping repeated document types.
    pub fn new(
        human_docs: impl IntoIterator<Item = DocumentType>,
        pet_docs: impl IntoIterator<Item = (EntityId, Vec<DocumentType>)>,
    ) -> Self {
        let mut merged: BTreeMap<EntityId, Vec<DocumentType>> = BTreeMap::new();

        for (pet, docs) in pet_docs {
            let entry = merged.entry(pet).or_default();
            entry.extend(docs);
            dedup_in_order(entry);
        }

        let mut human_docs: Vec<DocumentType> = human_docs.into_iter().collect();
        dedup_in_order(&mut human_docs);

        RequiredDocuments {
            human_docs,
            pet_docs: merged,
        }
    }

    /// Normalizes a stored value. Accepts both `humanDocs`/`petDocs` and the
    /// older `human_docs`/`pet_docs` keys.
    pub fn from_value(value: Option<&Value>) -> Self {
        let object = match value {
            Some(Value::Object(object)) => object,
            _ => return Self::default(),
        };

        let human_docs = field(object, "humanDocs", "human_docs")
            .map(document_types)
            .unwrap_or_default();

        let pet_docs = match field(object, "petDocs", "pet_docs") {
            Some(Value::Object(pets)) => pets
                .iter()
                .filter_map(|(key, docs)| {
                    EntityId::parse(key)
                        .ok()
                        .map(|pet| (pet, document_types(docs)))
                })
                .collect::<Vec<_>>(),
            _ => vec![],
        };

        Self::new(human_docs, pet_docs)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    pub fn is_empty(&self) -> bool {
        self.human_docs.is_empty() && self.pet_docs.values().all(Vec::is_empty)
    }

    pub fn for_pet(&self, pet: &EntityId) -> &[DocumentType] {
        self.pet_docs.get(pet).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `(owner, document type)` is on the checklist.
    pub fn requires(&self, owner: Owner, document_type: &DocumentType) -> bool {
        match owner {
            Owner::Tutor => self.human_docs.contains(document_type),
            Owner::Pet(pet) => self.for_pet(&pet).contains(document_type),
        }
    }

    /// The pets the checklist covers: enrolled pets in trip order, then keys
    /// for pets no longer enrolled.
    pub fn pets(&self, enrolled: &[EntityId]) -> Vec<EntityId> {
        let mut pets = enrolled.to_vec();
        dedup_in_order(&mut pets);

        for pet in self.pet_docs.keys() {
            if !pets.contains(pet) {
                pets.push(*pet);
            }
        }

        pets
    }

    /// Keys that reference pets outside `enrolled`.
    pub fn orphans<'a>(&'a self, enrolled: &'a [EntityId]) -> impl Iterator<Item = &'a EntityId> {
        self.pet_docs.keys().filter(move |pet| !enrolled.contains(pet))
    }

    /// Every line item: the tutor's first, then each pet's.
    pub fn line_items(&self, enrolled: &[EntityId]) -> Vec<LineItem> {
        let human = self.human_docs.iter().map(|t| LineItem {
            owner: Owner::Tutor,
            document_type: t.clone(),
        });

        let pets = self.pets(enrolled).into_iter().flat_map(|pet| {
            self.for_pet(&pet)
                .iter()
                .map(move |t| LineItem {
                    owner: Owner::Pet(pet),
                    document_type: t.clone(),
                })
                .collect::<Vec<_>>()
        });

        human.chain(pets).collect()
    }
}

fn field<'a>(object: &'a Map<String, Value>, key: &str, legacy: &str) -> Option<&'a Value> {
    object.get(key).or_else(|| object.get(legacy))
}

fn document_types(value: &Value) -> Vec<DocumentType> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(DocumentType::from)
            .collect(),
        _ => vec![],
    }
}

fn dedup_in_order<T: PartialEq>(items: &mut Vec<T>) {
    let mut i = 0;

    while i < items.len() {
        if items[..i].contains(&items[i]) {
            items.remove(i);
        } else {
            i += 1;
        }
    }
}

/// Replaces a trip's checklist. Administrator only; nothing is re-evaluated
/// until the next progress read.
pub async fn set_required_documents(
    db: &SafeDb,
    logger: &Logger,
    trip_id: EntityId,
    human_docs: Vec<DocumentType>,
    pet_docs: BTreeMap<EntityId, Vec<DocumentType>>,
) -> Result<RequiredDocuments, BackendError> {
    let trip = db
        .retrieve_trip(&trip_id)
        .await?
        .ok_or(BackendError::TripNotFound { id: trip_id })?;

    if let Some(unknown) = human_docs
        .iter()
        .chain(pet_docs.values().flatten())
        .find(|t| !t.is_known())
    {
        return Err(BackendError::UnknownDocumentType(unknown.to_string()));
    }

    let required = RequiredDocuments::new(human_docs, pet_docs);

    for pet in required.orphans(&trip.pet_ids) {
        warn!(logger, "Requirement references a pet not enrolled in the trip"; "trip" => %trip_id, "pet" => %pet);
    }

    debug!(logger, "Saving required documents..."; "trip" => %trip_id, "human" => required.human_docs.len(), "pets" => required.pet_docs.len());
    db.set_required_documents(&trip_id, &required).await?;

    db.append_trip_event(
        &trip_id,
        TripEvent::now(
            EventKind::RequirementsUpdate,
            "Required documents updated by an administrator",
        ),
    )
    .await?;

    Ok(required)
}

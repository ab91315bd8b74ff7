//! Resolves each required line item of a trip against its documents.
//!
//! Human items match a record of the same type that is not attributed to any
//! pet. Pet items go through three tiers:
//!
//! 1. a record of the same type whose `pet_id` is the pet;
//! 2. failing that, every record of the same type is a candidate;
//! 3. candidates are tested in order against [`HEURISTICS`], and the first
//!    candidate passing any of them wins.
//!
//! Records are always considered in the order given, so the first record in
//! storage order wins ties.

use log::{trace, Logger};
use serde::Serialize;

use crate::document::{DocumentRecord, DocumentType};
use crate::ids::EntityId;
use crate::pet::Pet;
use crate::requirements::{LineItem, Owner, RequiredDocuments};

/// How a line item was satisfied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    /// Type and owner match exactly.
    Exact,
    /// The storage subfolder names the pet.
    Subfolder,
    /// The stored path names the pet.
    Path,
    /// The description mentions the pet by name.
    Description,
}

impl MatchedBy {
    pub fn tier(&self) -> u8 {
        match self {
            MatchedBy::Exact => 1,
            _ => 3,
        }
    }
}

/// Which tiers to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// All three tiers.
    Full,
    /// Tier 1 only.
    ExactOnly,
}

/// What the heuristics know about the pet of a line item.
#[derive(Clone, Copy, Debug)]
pub struct PetHint<'a> {
    pub id: EntityId,

    /// Absent for pets that are not enrolled in the trip.
    pub name: Option<&'a str>,
}

type Heuristic = fn(&DocumentRecord, &PetHint) -> bool;

/// The tier 3 predicates, in priority order.
pub const HEURISTICS: &[(MatchedBy, Heuristic)] = &[
    (MatchedBy::Subfolder, subfolder_names_pet),
    (MatchedBy::Path, path_names_pet),
    (MatchedBy::Description, description_names_pet),
];

fn subfolder_names_pet(record: &DocumentRecord, pet: &PetHint) -> bool {
    let pattern = format!("pets/{}/", pet.id);

    record
        .subfolder
        .as_deref()
        .map_or(false, |s| s.contains(&pattern))
}

fn path_names_pet(record: &DocumentRecord, pet: &PetHint) -> bool {
    record.path.contains(&format!("/pets/{}/", pet.id))
}

fn description_names_pet(record: &DocumentRecord, pet: &PetHint) -> bool {
    match (pet.name.map(str::trim), record.description.as_deref()) {
        (Some(name), Some(description)) if !name.is_empty() => description.contains(name),
        _ => false,
    }
}

/// One line of the sent or missing list.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLine {
    pub label: String,

    pub document_type: DocumentType,

    pub pet_id: Option<EntityId>,

    pub pet_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_by: Option<MatchedBy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<EntityId>,
}

/// The classified line items of one trip.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    pub sent: Vec<DocumentLine>,
    pub missing: Vec<DocumentLine>,
}

impl MatchOutcome {
    pub fn completed(&self) -> usize {
        self.sent.len()
    }

    pub fn total(&self) -> usize {
        self.sent.len() + self.missing.len()
    }
}

/// Finds the record satisfying one line item, if any.
pub fn resolve<'a>(
    item: &LineItem,
    pet_name: Option<&str>,
    documents: &'a [DocumentRecord],
    strategy: Strategy,
) -> Option<(MatchedBy, &'a DocumentRecord)> {
    let of_type = || {
        documents
            .iter()
            .filter(move |d| d.document_type == item.document_type)
    };

    let pet = match item.owner {
        Owner::Tutor => {
            return of_type()
                .find(|d| d.pet_id.is_none())
                .map(|d| (MatchedBy::Exact, d))
        }
        Owner::Pet(pet) => pet,
    };

    if let Some(record) = of_type().find(|d| d.pet_id == Some(pet)) {
        return Some((MatchedBy::Exact, record));
    }

    if strategy == Strategy::ExactOnly {
        return None;
    }

    let hint = PetHint { id: pet, name: pet_name };

    of_type()
        .filter(|d| d.pet_id != Some(pet))
        .find_map(|d| {
            HEURISTICS
                .iter()
                .find(|(_, test)| test(d, &hint))
                .map(|(by, _)| (*by, d))
        })
}

/// Classifies every line item of `required`.
///
/// `pets` are the enrolled pets, used for display names; line items for pets
/// outside that list still evaluate, without a name.
pub fn match_documents(
    logger: &Logger,
    required: &RequiredDocuments,
    enrolled: &[EntityId],
    pets: &[Pet],
    documents: &[DocumentRecord],
    strategy: Strategy,
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    for item in required.line_items(enrolled) {
        let pet_id = item.owner.pet_id();
        let pet_name = pet_id.and_then(|id| {
            pets.iter()
                .find(|p| p.id == id && enrolled.contains(&p.id))
                .map(|p| p.name.as_str())
        });

        let resolution = resolve(&item, pet_name, documents, strategy);

        match resolution {
            Some((by, record)) => {
                trace!(logger, "Line item satisfied"; "type" => %item.document_type, "pet" => ?pet_id.map(|p| p.to_string()), "tier" => by.tier(), "by" => ?by, "document" => %record.id)
            }
            None => {
                trace!(logger, "Line item missing"; "type" => %item.document_type, "pet" => ?pet_id.map(|p| p.to_string()))
            }
        }

        let line = DocumentLine {
            label: item.document_type.label().to_owned(),
            document_type: item.document_type.clone(),
            pet_id,
            pet_name: pet_name.map(str::to_owned),
            matched_by: resolution.map(|(by, _)| by),
            document_id: resolution.map(|(_, record)| record.id),
        };

        if resolution.is_some() {
            outcome.sent.push(line);
        } else {
            outcome.missing.push(line);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::{match_documents, resolve, MatchedBy, Strategy};
    use crate::document::{DocumentRecord, DocumentType, EntityType};
    use crate::ids::EntityId;
    use crate::mime_type::FileKind;
    use crate::pet::Pet;
    use crate::requirements::{LineItem, Owner, RequiredDocuments};
    use crate::times::Times;

    fn record(trip: EntityId, t: DocumentType, pet: Option<EntityId>) -> DocumentRecord {
        DocumentRecord {
            id: EntityId::new(),
            entity_type: EntityType::Travel,
            entity_id: trip,
            pet_id: pet,
            document_type: t,
            filename: "file.pdf".to_owned(),
            path: "ana/travels/file.pdf".to_owned(),
            public_url: None,
            file_kind: FileKind::Pdf,
            size: 1,
            description: None,
            subfolder: None,
            times: Times::now(),
        }
    }

    fn pet_item(pet: EntityId, t: DocumentType) -> LineItem {
        LineItem {
            owner: Owner::Pet(pet),
            document_type: t,
        }
    }

    #[test]
    fn exact_match_is_never_shadowed() {
        let trip = EntityId::new();
        let pet = EntityId::new();

        let mut legacy = record(trip, DocumentType::VaccinationCard, None);
        legacy.subfolder = Some(format!("pets/{}/vaccinationCard", pet));
        let exact = record(trip, DocumentType::VaccinationCard, Some(pet));
        let documents = vec![legacy, exact.clone()];

        let (by, found) = resolve(
            &pet_item(pet, DocumentType::VaccinationCard),
            Some("Rex"),
            &documents,
            Strategy::Full,
        )
        .unwrap();

        assert_eq!(by, MatchedBy::Exact);
        assert_eq!(found.id, exact.id);
    }

    #[test]
    fn legacy_path_falls_back_to_tier_three() {
        let trip = EntityId::new();
        let pet = EntityId::new();

        let mut legacy = record(trip, DocumentType::VaccinationCard, None);
        legacy.path = format!("ana/travels/{}/pets/{}/vaccinationCard/x.pdf", trip, pet);
        let documents = vec![legacy];

        let item = pet_item(pet, DocumentType::VaccinationCard);

        let (by, _) = resolve(&item, None, &documents, Strategy::Full).unwrap();
        assert_eq!(by, MatchedBy::Path);
        assert_eq!(by.tier(), 3);

        assert!(resolve(&item, None, &documents, Strategy::ExactOnly).is_none());
    }

    #[test]
    fn heuristics_run_in_priority_order() {
        let trip = EntityId::new();
        let pet = EntityId::new();

        let mut by_description = record(trip, DocumentType::Cvi, None);
        by_description.description = Some("Travel document: cvi (pet: Rex)".to_owned());
        let mut by_subfolder = record(trip, DocumentType::Cvi, None);
        by_subfolder.subfolder = Some(format!("pets/{}/cvi", pet));

        let documents = vec![by_description.clone(), by_subfolder];

        // the first candidate wins even though a later one matches a stronger heuristic
        let (by, found) = resolve(
            &pet_item(pet, DocumentType::Cvi),
            Some("Rex"),
            &documents,
            Strategy::Full,
        )
        .unwrap();

        assert_eq!(by, MatchedBy::Description);
        assert_eq!(found.id, by_description.id);
    }

    #[test]
    fn legacy_subfolder_matches_on_its_own() {
        let trip = EntityId::new();
        let pet = EntityId::new();

        let mut legacy = record(trip, DocumentType::Cvi, None);
        legacy.subfolder = Some(format!("pets/{}/cvi", pet));
        let documents = vec![legacy.clone()];
        let item = pet_item(pet, DocumentType::Cvi);

        let (by, found) = resolve(&item, Some("Rex"), &documents, Strategy::Full).unwrap();
        assert_eq!(by, MatchedBy::Subfolder);
        assert_eq!(by.tier(), 3);
        assert_eq!(found.id, legacy.id);

        assert!(resolve(&item, Some("Rex"), &documents, Strategy::ExactOnly).is_none());

        // another pet's subfolder does not count
        let other = pet_item(EntityId::new(), DocumentType::Cvi);
        assert!(resolve(&other, None, &documents, Strategy::Full).is_none());
    }

    #[test]
    fn description_needs_a_name() {
        let trip = EntityId::new();
        let pet = EntityId::new();

        let mut described = record(trip, DocumentType::Cvi, None);
        described.description = Some("Travel document: cvi".to_owned());
        let documents = vec![described];
        let item = pet_item(pet, DocumentType::Cvi);

        assert!(resolve(&item, None, &documents, Strategy::Full).is_none());
        assert!(resolve(&item, Some("  "), &documents, Strategy::Full).is_none());
    }

    #[test]
    fn human_items_ignore_pet_documents() {
        let trip = EntityId::new();
        let documents = vec![record(trip, DocumentType::Passport, Some(EntityId::new()))];
        let item = LineItem {
            owner: Owner::Tutor,
            document_type: DocumentType::Passport,
        };

        assert!(resolve(&item, None, &documents, Strategy::Full).is_none());
    }

    #[test]
    fn totals_follow_the_checklist() {
        let logger = log::discard();
        let trip = EntityId::new();
        let owner = EntityId::new();
        let rex = Pet::new(EntityId::new(), owner, "Rex");
        let orphan = EntityId::new();

        let required = RequiredDocuments::new(
            vec![DocumentType::Passport],
            vec![
                (rex.id, vec![DocumentType::VaccinationCard, DocumentType::Cvi]),
                (orphan, vec![DocumentType::Cvi]),
            ],
        );

        let documents = vec![
            record(trip, DocumentType::VaccinationCard, Some(rex.id)),
            record(trip, DocumentType::VaccinationCard, Some(rex.id)),
            record(trip, DocumentType::PetPhoto, None),
        ];

        let outcome = match_documents(
            &logger,
            &required,
            &[rex.id],
            &[rex.clone()],
            &documents,
            Strategy::Full,
        );

        assert_eq!(outcome.total(), 4);
        assert_eq!(outcome.completed(), 1);
        assert_eq!(outcome.sent[0].pet_name.as_deref(), Some("Rex"));
        assert!(outcome
            .missing
            .iter()
            .any(|l| l.pet_id == Some(orphan) && l.pet_name.is_none()));
    }
}

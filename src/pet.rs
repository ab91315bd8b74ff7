use serde::Serialize;

use crate::ids::EntityId;

/// A pet registered by a tutor.
#[derive(Clone, Debug, Serialize)]
pub struct Pet {
    pub id: EntityId,

    /// The tutor who owns it.
    pub owner_id: EntityId,

    /// The display name, used when matching legacy document descriptions.
    pub name: String,

    pub species: Option<String>,

    pub breed: Option<String>,

    pub gender: Option<String>,

    pub weight: Option<String>,

    pub microchip: Option<String>,

    /// The document holding its photo, if any.
    pub photo_id: Option<EntityId>,
}

impl Pet {
    pub fn new(id: EntityId, owner_id: EntityId, name: impl Into<String>) -> Self {
        Pet {
            id,
            owner_id,
            name: name.into(),
            species: None,
            breed: None,
            gender: None,
            weight: None,
            microchip: None,
            photo_id: None,
        }
    }
}

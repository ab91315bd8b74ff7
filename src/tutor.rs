use serde::Serialize;

use crate::ids::EntityId;

/// A human pet owner and account holder.
#[derive(Clone, Debug, Serialize)]
pub struct Tutor {
    pub id: EntityId,

    /// The unique login name, also the root of the tutor's storage keys.
    pub username: String,

    pub name: String,

    pub email: Option<String>,

    pub residential_address_id: Option<EntityId>,

    pub delivery_address_id: Option<EntityId>,
}

impl Tutor {
    pub fn new(id: EntityId, username: impl Into<String>, name: impl Into<String>) -> Self {
        Tutor {
            id,
            username: username.into(),
            name: name.into(),
            email: None,
            residential_address_id: None,
            delivery_address_id: None,
        }
    }
}

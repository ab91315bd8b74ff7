use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::errors::BackendError;

/// The identity of a tutor, pet, trip or document.
///
/// Every comparison between ids goes through this type, and its only string
/// form is the lowercase hyphenated UUID. Requirement keys, stored paths and
/// JSON payloads all use that projection, so an id read back from any of them
/// compares equal to the original.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntityId(Uuid);

impl EntityId {
    pub fn new() -> Self {
        EntityId(Uuid::new_v4())
    }

    /// Parses any accepted UUID spelling, ignoring surrounding whitespace.
    ///
    /// ```
    /// use petransport::ids::EntityId;
    /// let id = EntityId::parse(" 6A2F41A3-C54C-FCE8-32D2-0324E1C32E22 ").unwrap();
    /// assert_eq!(id.to_string(), "6a2f41a3-c54c-fce8-32d2-0324e1c32e22");
    /// ```
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, BackendError> {
        let raw = raw.as_ref();

        Uuid::parse_str(raw.trim())
            .map(EntityId)
            .map_err(|_| BackendError::InvalidId(raw.to_owned()))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        EntityId(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hyphenated())
    }
}

impl FromStr for EntityId {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityId::parse(s)
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: String = Deserialize::deserialize(deserializer)?;

        EntityId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::EntityId;

    #[test]
    fn spellings_compare_equal() {
        let id = EntityId::new();
        let upper = id.to_string().to_uppercase();
        let simple = id.as_uuid().to_simple().to_string();

        assert_eq!(EntityId::parse(&upper).unwrap(), id);
        assert_eq!(EntityId::parse(&simple).unwrap(), id);
        assert_eq!(EntityId::parse(&upper).unwrap().to_string(), id.to_string());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(EntityId::parse("not-an-id").is_err());
        assert!(EntityId::parse("").is_err());
    }

    #[test]
    fn json_uses_string_projection() {
        let id = EntityId::parse("6a2f41a3-c54c-fce8-32d2-0324e1c32e22").unwrap();
        let json = serde_json::to_string(&id).unwrap();

        assert_eq!(json, "\"6a2f41a3-c54c-fce8-32d2-0324e1c32e22\"");
        assert_eq!(serde_json::from_str::<EntityId>(&json).unwrap(), id);
    }
}

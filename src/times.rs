use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Creation and modification times of a stored row.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Times {
    /// The date and time it was created.
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,

    /// The date and time it was last modified.
    #[serde(with = "time::serde::timestamp")]
    pub updated_at: OffsetDateTime,
}

impl Times {
    pub fn now() -> Self {
        let now = OffsetDateTime::now_utc();

        Times {
            created_at: now,
            updated_at: now,
        }
    }
}

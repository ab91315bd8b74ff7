use serde::Serialize;

use crate::ids::EntityId;
use crate::trip::TripStatus;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
    },
    Status {
        trip: EntityId,
        status: TripStatus,
    },
}

use uuid::Uuid;

use crate::model::RoomId;
use crate::store::StoreError;

#[derive(Debug)]
pub enum ServiceError {
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
    NotFound(Uuid),
    Overbooking(RoomId),
    Corrupt(String),
    Storage(StoreError),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Invalid { field, reason } => write!(f, "invalid {field}: {reason}"),
            ServiceError::NotFound(id) => write!(f, "reservation {id} not found"),
            ServiceError::Overbooking(room_type) => write!(
                f,
                "overbooking detected for room type '{room_type}' during the reservation period"
            ),
            ServiceError::Corrupt(e) => {
                write!(f, "failed to parse reservation data from store: {e}")
            }
            ServiceError::Storage(e) => write!(f, "storage failure: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {}

mod availability;
mod error;
#[cfg(test)]
mod tests;

pub use availability::{OccupancyCalendar, build_overlapping_calendar, calculate_availability};
pub use error::ServiceError;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::model::{Inventory, Reservation, ReservationInput, RoomId};
use crate::observability;
use crate::store::{Document, ReservationStore, StoreError};

/// Default deadline for a single store round trip.
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Orchestrates reservation CRUD and availability over the store adapter.
/// Holds no state beyond its collaborators; the store is the only shared
/// mutable resource.
pub struct ReservationService {
    store: Arc<dyn ReservationStore>,
    inventory: Inventory,
    store_timeout: Duration,
}

impl ReservationService {
    pub fn new(store: Arc<dyn ReservationStore>, inventory: Inventory) -> Self {
        Self {
            store,
            inventory,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Validate, persist and return the new reservation.
    pub async fn make_reservation(
        &self,
        input: ReservationInput,
    ) -> Result<Reservation, ServiceError> {
        let (room_id, nights, room_count) = validate(&input)?;

        let reservation_id = Uuid::new_v4();
        let created_at = Utc::now();
        let doc = serde_json::json!({
            "reservation_id": reservation_id,
            "customer_name": input.customer_name,
            "guest_name": input.guest_name,
            "room_type": input.room_type,
            "room_id": room_id,
            "hotel_id": input.hotel_id,
            "arrival_date": input.arrival_date,
            "nights": nights,
            "room_count": room_count,
            "created_at": created_at,
        });

        let stored = self.store_call(self.store.create(doc)).await?;
        let record = parse_document(stored)?;
        metrics::counter!(observability::RESERVATIONS_CREATED_TOTAL).increment(1);
        info!("created reservation {reservation_id}");
        Ok(record)
    }

    /// The reservation with the given id, or NotFound.
    pub async fn get_reservation(&self, id: Uuid) -> Result<Reservation, ServiceError> {
        let doc = self
            .store_call(self.store.find_by_reservation_id(id))
            .await?
            .ok_or(ServiceError::NotFound(id))?;
        parse_document(doc)
    }

    /// Remaining per-room-type inventory over the stay window of the
    /// reservation with the given id. Scans all reservations; the target
    /// itself counts toward occupancy.
    pub async fn get_availability(
        &self,
        id: Uuid,
    ) -> Result<BTreeMap<RoomId, u32>, ServiceError> {
        let target = self.get_reservation(id).await?;
        let docs = self.store_call(self.store.find_all()).await?;

        let mut reservations = Vec::with_capacity(docs.len());
        for doc in docs {
            reservations.push(parse_document(doc)?);
        }

        let window = target.stay_window();
        let calendar = build_overlapping_calendar(&reservations, &window);
        let available = calculate_availability(&window, &calendar, &self.inventory)
            .inspect_err(|_| {
                metrics::counter!(observability::OVERBOOKING_DETECTED_TOTAL).increment(1);
            })?;
        info!("availability for {id}: {available:?}");
        Ok(available)
    }

    /// Delete the reservation with the given id; NotFound if nothing was
    /// deleted.
    pub async fn delete_reservation(&self, id: Uuid) -> Result<(), ServiceError> {
        let deleted = self
            .store_call(self.store.delete_by_reservation_id(id))
            .await?;
        if deleted == 0 {
            warn!("reservation not found for deletion: {id}");
            return Err(ServiceError::NotFound(id));
        }
        metrics::counter!(observability::RESERVATIONS_DELETED_TOTAL).increment(1);
        info!("deleted reservation {id}");
        Ok(())
    }

    /// Run a store round trip under the service deadline.
    async fn store_call<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, ServiceError> {
        match tokio::time::timeout(self.store_timeout, op).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ServiceError::Storage(e)),
            Err(_) => Err(ServiceError::Storage(StoreError::Timeout)),
        }
    }
}

/// Check a reservation request against the data-model constraints.
/// Runs before any store access; the first violated field wins.
fn validate(input: &ReservationInput) -> Result<(RoomId, u32, u32), ServiceError> {
    if input.customer_name.is_empty() {
        return Err(invalid("customer_name", "must not be empty"));
    }
    if input.guest_name.is_empty() {
        return Err(invalid("guest_name", "must not be empty"));
    }
    if input.room_type.is_empty() {
        return Err(invalid("room_type", "must not be empty"));
    }
    let room_id = RoomId::parse(&input.room_id)
        .filter(RoomId::is_bookable)
        .ok_or_else(|| invalid("room_id", "must be one of A, B, C, D"))?;
    if input.hotel_id < 1 {
        return Err(invalid("hotel_id", "must be at least 1"));
    }
    let nights = positive_u32(input.nights).ok_or_else(|| invalid("nights", "must be at least 1"))?;
    let room_count =
        positive_u32(input.room_count).ok_or_else(|| invalid("room_count", "must be at least 1"))?;
    Ok((room_id, nights, room_count))
}

fn invalid(field: &'static str, reason: &'static str) -> ServiceError {
    ServiceError::Invalid { field, reason }
}

fn positive_u32(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| *v >= 1)
}

/// Parse a stored document back into a typed reservation. Only this service
/// writes the collection, so a parse failure means the stored data is
/// corrupt: log the offending raw document, never default it.
fn parse_document(doc: Document) -> Result<Reservation, ServiceError> {
    serde_json::from_value::<Reservation>(doc.clone()).map_err(|e| {
        metrics::counter!(observability::DOCUMENT_PARSE_FAILURES_TOTAL).increment(1);
        error!("failed to parse reservation document: {e}; raw: {doc}");
        ServiceError::Corrupt(e.to_string())
    })
}

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::model::{Inventory, Reservation, RoomId, StayWindow, day_range};

use super::ServiceError;

// ── Availability Algorithm ────────────────────────────────────────

/// Per-room-type, per-day count of rooms already committed by existing
/// reservations. Derived, never persisted.
pub type OccupancyCalendar = HashMap<RoomId, HashMap<NaiveDate, u32>>;

/// Build the occupancy calendar from reservations whose stay windows overlap
/// the target window.
///
/// Overlap is tested on instants; windows that only touch at a boundary do
/// not overlap. An overlapping reservation occupies `room_count` rooms of
/// its `room_id` on every whole calendar date in
/// `[check-in date, check-out date)` — the check-out date itself is free.
pub fn build_overlapping_calendar(
    reservations: &[Reservation],
    target: &StayWindow,
) -> OccupancyCalendar {
    let mut calendar = OccupancyCalendar::new();
    for reservation in reservations {
        let window = reservation.stay_window();
        if !window.overlaps(target) {
            continue;
        }
        let per_day = calendar.entry(reservation.room_id).or_default();
        for day in window.occupied_days() {
            *per_day.entry(day).or_insert(0) += reservation.room_count;
        }
    }
    calendar
}

/// Reduce the calendar to the minimum remaining rooms per room type over
/// the target window.
///
/// Every inventory room type is reported, whether or not it appears in the
/// calendar; a window with no whole dates reduces to the full inventory.
/// The first room type (in inventory order) whose minimum goes negative
/// aborts the whole computation — partial results are never returned.
pub fn calculate_availability(
    target: &StayWindow,
    calendar: &OccupancyCalendar,
    inventory: &Inventory,
) -> Result<BTreeMap<RoomId, u32>, ServiceError> {
    let mut availability = BTreeMap::new();
    for (room_type, total) in inventory.iter() {
        let occupancy = calendar.get(&room_type);
        let mut min_available = i64::from(total);
        for day in day_range(target.check_in.date(), target.check_out.date()) {
            let occupied = occupancy.and_then(|days| days.get(&day)).copied().unwrap_or(0);
            min_available = min_available.min(i64::from(total) - i64::from(occupied));
        }
        if min_available < 0 {
            return Err(ServiceError::Overbooking(room_type));
        }
        availability.insert(room_type, min_available as u32);
    }
    Ok(availability)
}

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Check-in is always at 10:00, check-out at 14:00.
pub const CHECK_IN_HOUR: u32 = 10;
pub const CHECK_OUT_HOUR: u32 = 14;

/// Room category code. Only A–D are accepted as reservation input; E exists
/// in inventory but has no input path, so it is never occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoomId {
    A,
    B,
    C,
    D,
    E,
}

impl RoomId {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            "E" => Some(Self::E),
            _ => None,
        }
    }

    /// Whether this room type can be reserved through the public input.
    pub fn is_bookable(&self) -> bool {
        !matches!(self, Self::E)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
        }
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Total rooms per room type. Injected into the availability calculation,
/// iterated in declaration order.
#[derive(Debug, Clone)]
pub struct Inventory {
    totals: Vec<(RoomId, u32)>,
}

impl Inventory {
    pub fn new(totals: Vec<(RoomId, u32)>) -> Self {
        Self { totals }
    }

    pub fn iter(&self) -> impl Iterator<Item = (RoomId, u32)> + '_ {
        self.totals.iter().copied()
    }

    pub fn total(&self, room_id: RoomId) -> Option<u32> {
        self.totals
            .iter()
            .find(|(r, _)| *r == room_id)
            .map(|(_, n)| *n)
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(vec![
            (RoomId::A, 261),
            (RoomId::B, 137),
            (RoomId::C, 130),
            (RoomId::D, 58),
            (RoomId::E, 4),
        ])
    }
}

/// The check-in-to-check-out instant interval of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StayWindow {
    pub check_in: NaiveDateTime,
    pub check_out: NaiveDateTime,
}

impl StayWindow {
    /// Derive the window from an arrival date and a night count using the
    /// fixed 10:00/14:00 convention.
    pub fn of(arrival_date: NaiveDate, nights: u32) -> Self {
        let check_in_time =
            NaiveTime::from_hms_opt(CHECK_IN_HOUR, 0, 0).expect("valid check-in time");
        let check_out_time =
            NaiveTime::from_hms_opt(CHECK_OUT_HOUR, 0, 0).expect("valid check-out time");
        let checkout_date = arrival_date + Duration::days(i64::from(nights));
        Self {
            check_in: arrival_date.and_time(check_in_time),
            check_out: checkout_date.and_time(check_out_time),
        }
    }

    /// Instant overlap. Windows that only touch at a boundary do not overlap.
    pub fn overlaps(&self, other: &StayWindow) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    /// Calendar dates this stay occupies: `[check-in date, check-out date)`.
    /// The check-out date itself is free.
    pub fn occupied_days(&self) -> impl Iterator<Item = NaiveDate> {
        day_range(self.check_in.date(), self.check_out.date())
    }
}

/// Half-open calendar-date range `[start, end)`. Empty when `end <= start`.
pub fn day_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let days = (end - start).num_days().max(0);
    (0..days).map(move |offset| start + Duration::days(offset))
}

/// Raw reservation request body, validated by the service before any store
/// access. Numeric fields stay wide here so range violations surface as
/// validation errors rather than deserialization failures.
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationInput {
    pub customer_name: String,
    pub guest_name: String,
    pub room_type: String,
    pub room_id: String,
    pub hotel_id: i64,
    pub arrival_date: NaiveDate,
    pub nights: i64,
    pub room_count: i64,
}

/// A persisted reservation, parsed back from its store document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    #[serde(rename = "_id")]
    pub store_id: String,
    pub reservation_id: Uuid,
    pub customer_name: String,
    pub guest_name: String,
    pub room_type: String,
    pub room_id: RoomId,
    pub hotel_id: i64,
    pub arrival_date: NaiveDate,
    pub nights: u32,
    pub room_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn stay_window(&self) -> StayWindow {
        StayWindow::of(self.arrival_date, self.nights)
    }
}

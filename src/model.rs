use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::calendar::DayToken;
use crate::ledger::Ledger;

/// Unix milliseconds, the only instant type.
pub type Ms = i64;

// ── Rooms ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Ulid,
    pub name: String,
    pub description: String,
    /// Nightly price in minor currency units.
    pub price: u64,
    /// Tax rate in whole percent.
    pub gst_percent: u32,
    pub max_guests: u32,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
    pub active: bool,
}

/// Partial update of a room's display and pricing metadata. The ledger is not
/// reachable from here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<u64>,
    pub gst_percent: Option<u32>,
    pub max_guests: Option<u32>,
    pub amenities: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub active: Option<bool>,
}

impl Room {
    pub fn apply_patch(&mut self, patch: RoomPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(gst) = patch.gst_percent {
            self.gst_percent = gst;
        }
        if let Some(max) = patch.max_guests {
            self.max_guests = max;
        }
        if let Some(amenities) = patch.amenities {
            self.amenities = amenities;
        }
        if let Some(images) = patch.images {
            self.images = images;
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
    }
}

/// Everything the engine keeps for one room. Guarded by one lock so that the
/// ledger and the room's reservations always change together.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    pub ledger: Ledger,
    pub reservations: HashMap<Ulid, Reservation>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            ledger: Ledger::new(),
            reservations: HashMap::new(),
        }
    }
}

// ── Reservations ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub name: String,
    pub email: String,
    pub mobile: String,
}

impl Guest {
    /// Trimmed copy with a lowercased email.
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: normalize_email(&self.email),
            mobile: self.mobile.trim().to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.email.is_empty() && !self.mobile.is_empty()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupants {
    #[serde(default)]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
}

impl Occupants {
    pub fn total(&self) -> u32 {
        self.adults.saturating_add(self.children)
    }
}

/// Price snapshot taken when the reservation is created. Never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub nights: u32,
    pub price_per_night: u64,
    pub gst_percent: u32,
    pub tax: u64,
    pub total: u64,
}

impl Pricing {
    /// Quote `nights` at the room's current rate. Tax rounds half up to the
    /// nearest minor unit.
    pub fn quote(room: &Room, nights: u32) -> Self {
        let subtotal = room.price.saturating_mul(u64::from(nights));
        let tax = subtotal.saturating_mul(u64::from(room.gst_percent)).saturating_add(50) / 100;
        Self {
            nights,
            price_per_night: room.price,
            gst_percent: room.gst_percent,
            tax,
            total: subtotal.saturating_add(tax),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Hold,
    Booked,
    CancelRequested,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Hold => "HOLD",
            ReservationStatus::Booked => "BOOKED",
            ReservationStatus::CancelRequested => "CANCEL_REQUESTED",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HOLD" => Ok(ReservationStatus::Hold),
            "BOOKED" => Ok(ReservationStatus::Booked),
            "CANCEL_REQUESTED" => Ok(ReservationStatus::CancelRequested),
            "CANCELLED" => Ok(ReservationStatus::Cancelled),
            "EXPIRED" => Ok(ReservationStatus::Expired),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Ulid,
    /// Human-facing sequence code, `BO000001` or `HO000001`.
    pub code: String,
    /// The `HO` code a confirmed hold was placed under. It keeps resolving.
    pub hold_code: Option<String>,
    pub room_id: Ulid,
    pub guest: Option<Guest>,
    pub check_in: Ms,
    pub check_out: Ms,
    /// Day tokens allocated in the ledger for this stay, fixed at creation.
    pub days: Vec<DayToken>,
    pub occupants: Occupants,
    pub pricing: Pricing,
    pub cancel_reason: Option<String>,
    pub status: ReservationStatus,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Reservation {
    /// Guest name, email and mobile are mandatory from BOOKED onwards. A bare
    /// hold, and whatever it turns into without being booked, may lack them.
    pub fn has_required_fields(&self) -> bool {
        match self.status {
            ReservationStatus::Booked | ReservationStatus::CancelRequested => {
                self.guest.as_ref().is_some_and(Guest::is_complete)
            }
            _ => true,
        }
    }

    pub fn guest_email(&self) -> Option<&str> {
        self.guest.as_ref().map(|g| g.email.as_str())
    }

    pub fn first_day(&self) -> Option<DayToken> {
        self.days.first().copied()
    }
}

// ── Sequences ────────────────────────────────────────────────────

/// Id namespace for the human-facing reservation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    Booking,
    Holding,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Booking, Namespace::Holding];

    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Booking => "BO",
            Namespace::Holding => "HO",
        }
    }

    /// Zero-padded to six digits; wider values keep every digit.
    pub fn format(&self, value: u64) -> String {
        format!("{}{value:06}", self.prefix())
    }
}

// ── Events ───────────────────────────────────────────────────────

/// The event types. This is the WAL record format: one record per state
/// change, so a reservation write and its ledger write are never split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        room: Room,
    },
    RoomUpdated {
        room: Room,
    },
    RoomDeactivated {
        id: Ulid,
    },
    SequenceAdvanced {
        namespace: Namespace,
        value: u64,
    },
    /// Creates a BOOKED reservation and books its days.
    BookingCreated {
        reservation: Reservation,
    },
    /// Creates a HOLD reservation and holds its days.
    HoldPlaced {
        reservation: Reservation,
    },
    HoldCancelled {
        id: Ulid,
        room_id: Ulid,
        at: Ms,
    },
    HoldConfirmed {
        id: Ulid,
        room_id: Ulid,
        code: String,
        guest: Guest,
        at: Ms,
    },
    CancellationRequested {
        id: Ulid,
        room_id: Ulid,
        reason: Option<String>,
        at: Ms,
    },
    CancellationApproved {
        id: Ulid,
        room_id: Ulid,
        at: Ms,
    },
    CancellationRejected {
        id: Ulid,
        room_id: Ulid,
        at: Ms,
    },
    ReservationExpired {
        id: Ulid,
        room_id: Ulid,
        at: Ms,
    },
    PastDaysRetired {
        room_id: Ulid,
        before: DayToken,
    },
    // Snapshot records written by compaction.
    RoomRestored {
        room: Room,
        booked: Vec<DayToken>,
        held: Vec<DayToken>,
    },
    ReservationRestored {
        reservation: Reservation,
    },
    StaysRestored {
        email: String,
        count: u32,
    },
}

impl Event {
    /// Room the event applies to, for events scoped to one room.
    pub fn room_id(&self) -> Option<Ulid> {
        match self {
            Event::RoomUpdated { room } => Some(room.id),
            Event::RoomDeactivated { id } => Some(*id),
            Event::BookingCreated { reservation }
            | Event::HoldPlaced { reservation }
            | Event::ReservationRestored { reservation } => Some(reservation.room_id),
            Event::HoldCancelled { room_id, .. }
            | Event::HoldConfirmed { room_id, .. }
            | Event::CancellationRequested { room_id, .. }
            | Event::CancellationApproved { room_id, .. }
            | Event::CancellationRejected { room_id, .. }
            | Event::ReservationExpired { room_id, .. }
            | Event::PastDaysRetired { room_id, .. } => Some(*room_id),
            Event::RoomCreated { .. }
            | Event::RoomRestored { .. }
            | Event::SequenceAdvanced { .. }
            | Event::StaysRestored { .. } => None,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

/// Room plus its current ledger, as listed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    #[serde(flatten)]
    pub room: Room,
    pub booked_dates: Vec<DayToken>,
    pub hold_dates: Vec<DayToken>,
}

/// Reservation joined with its room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationDetails {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub room: Room,
}

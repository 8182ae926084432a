use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::ledger::{DaySet, Ledger};
use crate::model::*;

use super::SharedRoomState;

/// In-memory state rebuilt from the WAL: rooms (each behind its own lock)
/// plus the lookup indexes and counters that live outside any one room.
pub struct Store {
    rooms: DashMap<Ulid, SharedRoomState>,
    /// reservation id → room id
    reservation_room: DashMap<Ulid, Ulid>,
    /// reservation code → reservation id. A confirmed hold keeps its `HO` code
    /// here next to the new `BO` code.
    codes: DashMap<String, Ulid>,
    booking_seq: AtomicU64,
    holding_seq: AtomicU64,
    /// normalized guest email → completed stays
    guest_stays: DashMap<String, u32>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            reservation_room: DashMap::new(),
            codes: DashMap::new(),
            booking_seq: AtomicU64::new(0),
            holding_seq: AtomicU64::new(0),
            guest_stays: DashMap::new(),
        }
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn get_room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    /// Snapshot of every room handle, sorted by id (creation order).
    pub fn room_handles(&self) -> Vec<(Ulid, SharedRoomState)> {
        let mut handles: Vec<(Ulid, SharedRoomState)> = self
            .rooms
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        handles.sort_by_key(|(id, _)| *id);
        handles
    }

    fn insert_room(&self, state: RoomState) {
        self.rooms.insert(state.room.id, Arc::new(RwLock::new(state)));
    }

    // ── Reservation indexes ──────────────────────────────────

    pub fn room_for_reservation(&self, id: &Ulid) -> Option<Ulid> {
        self.reservation_room.get(id).map(|e| *e.value())
    }

    /// Resolve a ULID string or a reservation code to a reservation id.
    pub fn resolve_key(&self, key: &str) -> Option<Ulid> {
        if let Ok(id) = key.parse::<Ulid>()
            && self.reservation_room.contains_key(&id)
        {
            return Some(id);
        }
        self.codes.get(&key.trim().to_ascii_uppercase()).map(|e| *e.value())
    }

    fn index_reservation(&self, reservation: &Reservation) {
        self.reservation_room.insert(reservation.id, reservation.room_id);
        self.codes.insert(reservation.code.clone(), reservation.id);
        if let Some(alias) = &reservation.hold_code {
            self.codes.insert(alias.clone(), reservation.id);
        }
    }

    // ── Sequences ────────────────────────────────────────────

    fn counter(&self, namespace: Namespace) -> &AtomicU64 {
        match namespace {
            Namespace::Booking => &self.booking_seq,
            Namespace::Holding => &self.holding_seq,
        }
    }

    /// Reserve the next value. Concurrent callers never see the same value.
    pub fn bump_sequence(&self, namespace: Namespace) -> u64 {
        self.counter(namespace).fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn sequence_value(&self, namespace: Namespace) -> u64 {
        self.counter(namespace).load(Ordering::SeqCst)
    }

    // ── Guest stays ──────────────────────────────────────────

    pub fn completed_stays(&self, email: &str) -> u32 {
        self.guest_stays.get(email).map(|e| *e.value()).unwrap_or(0)
    }

    pub fn stay_counts(&self) -> Vec<(String, u32)> {
        self.guest_stays
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }

    // ── Event application ────────────────────────────────────

    /// Apply an event that is not scoped to an existing room.
    /// Returns false if the event needs a room lock instead.
    pub fn apply_global(&self, event: &Event) -> bool {
        match event {
            Event::RoomCreated { room } => {
                self.insert_room(RoomState::new(room.clone()));
            }
            Event::RoomRestored { room, booked, held } => {
                let mut state = RoomState::new(room.clone());
                state.ledger = Ledger::from_parts(booked.iter().copied(), held.iter().copied());
                self.insert_room(state);
            }
            Event::SequenceAdvanced { namespace, value } => {
                self.counter(*namespace).fetch_max(*value, Ordering::SeqCst);
            }
            Event::StaysRestored { email, count } => {
                self.guest_stays.insert(email.clone(), *count);
            }
            _ => return false,
        }
        true
    }

    /// Apply a room-scoped event. Caller holds the room's write lock.
    ///
    /// The engine checks availability and status before persisting, so a
    /// ledger refusal here means the log and memory disagree; it is logged
    /// and the rest of the event still applies.
    pub fn apply_to_room(&self, rs: &mut RoomState, event: &Event) {
        match event {
            Event::RoomUpdated { room } => {
                rs.room = room.clone();
            }
            Event::RoomDeactivated { .. } => {
                rs.room.active = false;
            }
            Event::BookingCreated { reservation } => {
                if let Err(days) = rs.ledger.allocate_booked(&reservation.days) {
                    tracing::warn!("booking {} overlaps booked/held days {days:?}", reservation.code);
                }
                self.index_reservation(reservation);
                rs.reservations.insert(reservation.id, reservation.clone());
            }
            Event::HoldPlaced { reservation } => {
                if let Err(days) = rs.ledger.allocate_hold(&reservation.days) {
                    tracing::warn!("hold {} overlaps booked/held days {days:?}", reservation.code);
                }
                self.index_reservation(reservation);
                rs.reservations.insert(reservation.id, reservation.clone());
            }
            Event::ReservationRestored { reservation } => {
                self.index_reservation(reservation);
                rs.reservations.insert(reservation.id, reservation.clone());
            }
            Event::HoldCancelled { id, at, .. } => {
                if let Some(r) = rs.reservations.get_mut(id) {
                    rs.ledger.release(&r.days, DaySet::Held);
                    r.status = ReservationStatus::Cancelled;
                    r.updated_at = *at;
                }
            }
            Event::HoldConfirmed { id, code, guest, at, .. } => {
                if let Some(r) = rs.reservations.get_mut(id) {
                    if let Err(days) = rs.ledger.promote_hold_to_booked(&r.days) {
                        tracing::warn!("confirming hold {}: days not held {days:?}", r.code);
                    }
                    r.hold_code = Some(std::mem::replace(&mut r.code, code.clone()));
                    r.guest = Some(guest.clone());
                    r.status = ReservationStatus::Booked;
                    r.updated_at = *at;
                    self.codes.insert(code.clone(), *id);
                }
            }
            Event::CancellationRequested { id, reason, at, .. } => {
                if let Some(r) = rs.reservations.get_mut(id) {
                    r.status = ReservationStatus::CancelRequested;
                    r.cancel_reason = reason.clone();
                    r.updated_at = *at;
                }
            }
            Event::CancellationApproved { id, at, .. } => {
                if let Some(r) = rs.reservations.get_mut(id) {
                    rs.ledger.release(&r.days, DaySet::Booked);
                    r.status = ReservationStatus::Cancelled;
                    r.updated_at = *at;
                }
            }
            Event::CancellationRejected { id, at, .. } => {
                if let Some(r) = rs.reservations.get_mut(id) {
                    r.status = ReservationStatus::Booked;
                    r.cancel_reason = None;
                    r.updated_at = *at;
                }
            }
            Event::ReservationExpired { id, at, .. } => {
                if let Some(r) = rs.reservations.get_mut(id) {
                    match r.status {
                        ReservationStatus::Hold => rs.ledger.release(&r.days, DaySet::Held),
                        ReservationStatus::Booked => {
                            rs.ledger.release(&r.days, DaySet::Booked);
                            if let Some(email) = r.guest_email() {
                                *self.guest_stays.entry(email.to_string()).or_insert(0) += 1;
                            }
                        }
                        _ => {}
                    }
                    r.status = ReservationStatus::Expired;
                    r.updated_at = *at;
                }
            }
            Event::PastDaysRetired { before, .. } => {
                rs.ledger.retire_past(*before);
            }
            // Handled by apply_global.
            Event::RoomCreated { .. }
            | Event::RoomRestored { .. }
            | Event::SequenceAdvanced { .. }
            | Event::StaysRestored { .. } => {}
        }
    }

    /// Rebuild state from replayed events. We are the sole owner of every
    /// room lock here, so `try_write` never fails; never use blocking_write
    /// because this runs inside the runtime.
    pub fn replay(&self, events: &[Event]) {
        for event in events {
            if self.apply_global(event) {
                continue;
            }
            let Some(room_id) = event.room_id() else { continue };
            let Some(rs) = self.get_room(&room_id) else {
                tracing::warn!("replay: event for unknown room {room_id}");
                continue;
            };
            match rs.try_write() {
                Ok(mut guard) => self.apply_to_room(&mut guard, event),
                Err(_) => tracing::warn!("replay: room {room_id} unexpectedly locked"),
            }
        }
    }
}

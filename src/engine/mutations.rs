use serde::Deserialize;
use ulid::Ulid;

use crate::calendar::DayToken;
use crate::limits::*;
use crate::model::*;
use crate::notify::Notification;
use crate::observability;

use super::{Engine, EngineError};

/// Customer booking: creates a BOOKED reservation directly.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub room_id: Ulid,
    pub check_in: Ms,
    pub check_out: Ms,
    pub guest: Guest,
    #[serde(default)]
    pub occupants: Occupants,
}

/// Admin hold: blocks dates without a guest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldRequest {
    pub room_id: Ulid,
    pub check_in: Ms,
    pub check_out: Ms,
    #[serde(default)]
    pub occupants: Occupants,
}

fn validate_timestamp(ts: Ms) -> Result<(), EngineError> {
    if !(MIN_VALID_TIMESTAMP_MS..=MAX_VALID_TIMESTAMP_MS).contains(&ts) {
        return Err(EngineError::Validation("timestamp out of range"));
    }
    Ok(())
}

pub(super) fn validate_guest(guest: &Guest) -> Result<Guest, EngineError> {
    let guest = guest.normalized();
    if !guest.is_complete() {
        return Err(EngineError::Validation("guest name, email and mobile are required"));
    }
    if guest.name.len() > MAX_GUEST_FIELD_LEN
        || guest.email.len() > MAX_GUEST_FIELD_LEN
        || guest.mobile.len() > MAX_GUEST_FIELD_LEN
    {
        return Err(EngineError::LimitExceeded("guest field too long"));
    }
    if !guest.email.contains('@') {
        return Err(EngineError::Validation("guest email is malformed"));
    }
    Ok(guest)
}

impl Engine {
    /// Day tokens of `[check_in, check_out)`, rejecting empty, oversized or
    /// already-started stays.
    fn stay_days(&self, check_in: Ms, check_out: Ms) -> Result<Vec<DayToken>, EngineError> {
        validate_timestamp(check_in)?;
        validate_timestamp(check_out)?;
        if check_out <= check_in {
            return Err(EngineError::Validation("check-out must be after check-in"));
        }
        let days = self.calendar.days_between(check_in, check_out);
        let Some(first) = days.first() else {
            return Err(EngineError::Validation("stay must cover at least one night"));
        };
        if days.len() > MAX_STAY_NIGHTS {
            return Err(EngineError::LimitExceeded("stay too long"));
        }
        if let Some(today) = self.calendar.day_of(self.clock.now_ms())
            && *first < today
        {
            return Err(EngineError::Validation("check-in date is in the past"));
        }
        Ok(days)
    }

    pub async fn create_booking(&self, req: BookingRequest) -> Result<Reservation, EngineError> {
        let guest = validate_guest(&req.guest)?;
        let days = self.stay_days(req.check_in, req.check_out)?;
        self.allocate(
            req.room_id,
            req.check_in,
            req.check_out,
            days,
            req.occupants,
            Some(guest),
        )
        .await
    }

    pub async fn hold_dates(&self, req: HoldRequest) -> Result<Reservation, EngineError> {
        let days = self.stay_days(req.check_in, req.check_out)?;
        self.allocate(req.room_id, req.check_in, req.check_out, days, req.occupants, None)
            .await
    }

    /// Check-then-allocate under the room's write lock. A guest means a
    /// booking, no guest means a hold.
    async fn allocate(
        &self,
        room_id: Ulid,
        check_in: Ms,
        check_out: Ms,
        days: Vec<DayToken>,
        occupants: Occupants,
        guest: Option<Guest>,
    ) -> Result<Reservation, EngineError> {
        let (namespace, status, kind) = match guest {
            Some(_) => (Namespace::Booking, ReservationStatus::Booked, "booking"),
            None => (Namespace::Holding, ReservationStatus::Hold, "hold"),
        };
        if occupants.total() == 0 {
            return Err(EngineError::Validation("at least one guest is required"));
        }

        let _gate = self.compaction_gate.read().await;
        let rs = self.room_handle(&room_id)?;
        let mut guard = rs.write().await;
        if !guard.room.active {
            return Err(EngineError::not_found(room_id));
        }
        if occupants.total() > guard.room.max_guests {
            return Err(EngineError::CapacityExceeded {
                max: guard.room.max_guests,
                requested: occupants.total(),
            });
        }
        if !guard.ledger.is_available(&days) {
            metrics::counter!(observability::CONFLICTS_TOTAL, "kind" => kind).increment(1);
            return Err(EngineError::Conflict(guard.ledger.conflicts(&days)));
        }

        let seq = self.allocate_sequence(namespace).await?;
        let now = self.clock.now_ms();
        let nights = u32::try_from(days.len()).map_err(|_| EngineError::LimitExceeded("stay too long"))?;
        let reservation = Reservation {
            id: Ulid::new(),
            code: namespace.format(seq),
            room_id,
            guest,
            check_in,
            check_out,
            days,
            occupants,
            pricing: Pricing::quote(&guard.room, nights),
            cancel_reason: None,
            hold_code: None,
            status,
            created_at: now,
            updated_at: now,
        };
        let event = match status {
            ReservationStatus::Booked => Event::BookingCreated {
                reservation: reservation.clone(),
            },
            _ => Event::HoldPlaced {
                reservation: reservation.clone(),
            },
        };
        self.persist_and_apply(&mut guard, &event).await?;
        let room = guard.room.clone();
        drop(guard);

        metrics::counter!(observability::RESERVATIONS_CREATED_TOTAL, "kind" => kind).increment(1);
        tracing::info!("{kind} {} created for room {room_id}", reservation.code);
        if status == ReservationStatus::Booked {
            self.notify(Notification::BookingConfirmed {
                reservation: reservation.clone(),
                room,
            });
        }
        Ok(reservation)
    }

    /// Compare-and-transition: apply the event built by `make` only if the
    /// reservation is currently `expected`. Any mismatch is NotFound.
    async fn transition<F>(
        &self,
        key: &str,
        expected: ReservationStatus,
        name: &'static str,
        make: F,
    ) -> Result<Reservation, EngineError>
    where
        F: FnOnce(&Reservation, Ms) -> Result<Event, EngineError>,
    {
        let _gate = self.compaction_gate.read().await;
        let (id, mut guard) = self.resolve_reservation_write(key).await?;
        let current = guard
            .reservations
            .get(&id)
            .filter(|r| r.status == expected)
            .ok_or_else(|| EngineError::not_found(key))?;
        let event = make(current, self.clock.now_ms())?;
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::TRANSITIONS_TOTAL, "transition" => name).increment(1);

        let updated = guard
            .reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(key))?;
        tracing::info!("{} {name}: {expected} -> {}", updated.code, updated.status);
        Ok(updated)
    }

    /// HOLD → CANCELLED, releasing the held days.
    pub async fn cancel_hold(&self, key: &str) -> Result<Reservation, EngineError> {
        self.transition(key, ReservationStatus::Hold, "cancel_hold", |r, at| {
            Ok(Event::HoldCancelled {
                id: r.id,
                room_id: r.room_id,
                at,
            })
        })
        .await
    }

    /// BOOKED → CANCEL_REQUESTED. Only the guest who owns the booking may ask;
    /// anyone else gets NotFound.
    pub async fn request_cancellation(
        &self,
        key: &str,
        requester_email: &str,
        reason: Option<String>,
    ) -> Result<Reservation, EngineError> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if reason.as_ref().is_some_and(|r| r.len() > MAX_REASON_LEN) {
            return Err(EngineError::LimitExceeded("cancellation reason too long"));
        }
        let requester = normalize_email(requester_email);

        self.transition(key, ReservationStatus::Booked, "request_cancellation", |r, at| {
            if r.guest_email() != Some(requester.as_str()) {
                return Err(EngineError::not_found(key));
            }
            Ok(Event::CancellationRequested {
                id: r.id,
                room_id: r.room_id,
                reason,
                at,
            })
        })
        .await
    }

    /// CANCEL_REQUESTED → CANCELLED, releasing the booked days.
    pub async fn approve_cancellation(&self, key: &str) -> Result<Reservation, EngineError> {
        self.transition(key, ReservationStatus::CancelRequested, "approve_cancellation", |r, at| {
            Ok(Event::CancellationApproved {
                id: r.id,
                room_id: r.room_id,
                at,
            })
        })
        .await
    }

    /// CANCEL_REQUESTED → BOOKED, clearing the reason.
    pub async fn reject_cancellation(&self, key: &str) -> Result<Reservation, EngineError> {
        self.transition(key, ReservationStatus::CancelRequested, "reject_cancellation", |r, at| {
            Ok(Event::CancellationRejected {
                id: r.id,
                room_id: r.room_id,
                at,
            })
        })
        .await
    }

    /// HOLD → BOOKED: the held days move to booked in one event, the guest is
    /// attached and the reservation gets a fresh `BO` code. The pricing
    /// snapshot from the hold is kept.
    pub async fn confirm_hold(&self, key: &str, guest: &Guest) -> Result<Reservation, EngineError> {
        let guest = validate_guest(guest)?;

        let _gate = self.compaction_gate.read().await;
        let (id, mut guard) = self.resolve_reservation_write(key).await?;
        let current = guard
            .reservations
            .get(&id)
            .filter(|r| r.status == ReservationStatus::Hold)
            .ok_or_else(|| EngineError::not_found(key))?;

        let now = self.clock.now_ms();
        if let Some(first) = current.first_day()
            && self.calendar.is_past_noon(now, first)
        {
            return Err(EngineError::Validation("hold has lapsed"));
        }
        let missing: Vec<DayToken> = current
            .days
            .iter()
            .filter(|d| !guard.ledger.is_held(d))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::Conflict(missing));
        }
        let room_id = current.room_id;

        let seq = self.allocate_sequence(Namespace::Booking).await?;
        let event = Event::HoldConfirmed {
            id,
            room_id,
            code: Namespace::Booking.format(seq),
            guest,
            at: now,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::TRANSITIONS_TOTAL, "transition" => "confirm_hold").increment(1);

        let confirmed = guard
            .reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(key))?;
        let room = guard.room.clone();
        drop(guard);

        tracing::info!("hold confirmed as {}", confirmed.code);
        self.notify(Notification::BookingConfirmed {
            reservation: confirmed.clone(),
            room,
        });
        Ok(confirmed)
    }
}

use std::cmp::Reverse;

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// Reservations matching `keep`, joined with their room, newest first.
    async fn collect_reservations<F>(&self, keep: F) -> Vec<ReservationDetails>
    where
        F: Fn(&Reservation) -> bool,
    {
        let mut out = Vec::new();
        for (_, rs) in self.store.room_handles() {
            let guard = rs.read().await;
            for r in guard.reservations.values().filter(|r| keep(r)) {
                out.push(ReservationDetails {
                    reservation: r.clone(),
                    room: guard.room.clone(),
                });
            }
        }
        out.sort_by_key(|d| Reverse((d.reservation.created_at, d.reservation.id)));
        out
    }

    /// Admin listing. Without a status filter, EXPIRED reservations are left out.
    pub async fn list_reservations(&self, status: Option<ReservationStatus>) -> Vec<ReservationDetails> {
        match status {
            Some(s) => self.collect_reservations(|r| r.status == s).await,
            None => {
                self.collect_reservations(|r| r.status != ReservationStatus::Expired)
                    .await
            }
        }
    }

    /// A guest's reservations, excluding cancelled ones.
    pub async fn reservations_for_guest(&self, email: &str) -> Vec<ReservationDetails> {
        let email = normalize_email(email);
        self.collect_reservations(|r| {
            r.guest_email() == Some(email.as_str()) && r.status != ReservationStatus::Cancelled
        })
        .await
    }

    /// Look up by id or code.
    pub async fn get_reservation(&self, key: &str) -> Result<ReservationDetails, EngineError> {
        let id = self
            .store
            .resolve_key(key)
            .ok_or_else(|| EngineError::not_found(key))?;
        let room_id = self
            .store
            .room_for_reservation(&id)
            .ok_or_else(|| EngineError::not_found(key))?;
        let rs = self.room_handle(&room_id)?;
        let guard = rs.read().await;
        let reservation = guard
            .reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(key))?;
        Ok(ReservationDetails {
            reservation,
            room: guard.room.clone(),
        })
    }

    /// Stays the guest has checked out of.
    pub fn completed_stays(&self, email: &str) -> u32 {
        self.store.completed_stays(&normalize_email(email))
    }
}

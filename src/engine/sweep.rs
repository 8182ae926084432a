use serde::Serialize;
use ulid::Ulid;

use crate::calendar::DayToken;
use crate::model::*;
use crate::notify::Notification;
use crate::observability;

use super::{Engine, EngineError};

/// Outcome of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub holds_expired: u32,
    pub bookings_expired: u32,
    pub days_retired: u32,
    pub failures: u32,
}

impl Engine {
    /// The noon checkpoint after which `r` is due to expire, if it can expire.
    /// HOLD lapses at noon of its check-in day, BOOKED at noon of its
    /// check-out day.
    fn expiry_checkpoint(&self, r: &Reservation) -> Option<Ms> {
        let day = match r.status {
            ReservationStatus::Hold => r.first_day()?,
            ReservationStatus::Booked => self.calendar.day_of(r.check_out)?,
            _ => return None,
        };
        Some(self.calendar.noon_of(day))
    }

    /// (room id, reservation id) of every HOLD or BOOKED reservation whose
    /// checkpoint has passed at `now`.
    pub async fn collect_due_expirations(&self, now: Ms) -> Vec<(Ulid, Ulid)> {
        let mut due = Vec::new();
        for (room_id, rs) in self.store.room_handles() {
            let guard = rs.read().await;
            for r in guard.reservations.values() {
                if self.expiry_checkpoint(r).is_some_and(|noon| now >= noon) {
                    due.push((room_id, r.id));
                }
            }
        }
        due
    }

    /// Expire one reservation. The status and checkpoint are checked again
    /// under the room lock, so a reservation cancelled or confirmed since
    /// collection is left alone (`Ok(None)`). Returns the status it expired from.
    pub async fn expire_reservation(
        &self,
        room_id: Ulid,
        id: Ulid,
        now: Ms,
    ) -> Result<Option<ReservationStatus>, EngineError> {
        let _gate = self.compaction_gate.read().await;
        let rs = self.room_handle(&room_id)?;
        let mut guard = rs.write().await;
        let Some(current) = guard.reservations.get(&id) else {
            return Err(EngineError::not_found(id));
        };
        if !self.expiry_checkpoint(current).is_some_and(|noon| now >= noon) {
            return Ok(None);
        }
        let from = current.status;

        self.persist_and_apply(&mut guard, &Event::ReservationExpired { id, room_id, at: now })
            .await?;
        let expired = guard.reservations.get(&id).cloned();
        let room = guard.room.clone();
        drop(guard);

        if let Some(reservation) = expired {
            tracing::info!("{} expired from {from}", reservation.code);
            self.notify(Notification::ReservationExpired { reservation, room });
        }
        Ok(Some(from))
    }

    /// Drop ledger days strictly before `today` from one room. Returns how
    /// many days were removed.
    pub async fn retire_past_days(&self, room_id: Ulid, today: DayToken) -> Result<u32, EngineError> {
        let _gate = self.compaction_gate.read().await;
        let rs = self.room_handle(&room_id)?;
        let mut guard = rs.write().await;
        if !guard.ledger.has_past_days(today) {
            return Ok(0);
        }
        let stale = guard
            .ledger
            .booked()
            .chain(guard.ledger.held())
            .filter(|d| **d < today)
            .count();
        self.persist_and_apply(&mut guard, &Event::PastDaysRetired { room_id, before: today })
            .await?;
        Ok(u32::try_from(stale).unwrap_or(u32::MAX))
    }

    /// One full pass: expire due reservations, then retire past ledger days
    /// in every room. A failing item is logged and counted; the run itself
    /// never fails.
    pub async fn sweep(&self) -> SweepReport {
        let now = self.clock.now_ms();
        let mut report = SweepReport::default();

        for (room_id, id) in self.collect_due_expirations(now).await {
            match self.expire_reservation(room_id, id, now).await {
                Ok(Some(ReservationStatus::Hold)) => report.holds_expired += 1,
                Ok(Some(_)) => report.bookings_expired += 1,
                Ok(None) => {}
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!("sweep: failed to expire {id}: {e}");
                }
            }
        }

        if let Some(today) = self.calendar.day_of(now) {
            for (room_id, _) in self.store.room_handles() {
                match self.retire_past_days(room_id, today).await {
                    Ok(n) => report.days_retired += n,
                    Err(e) => {
                        report.failures += 1;
                        tracing::warn!("sweep: failed to retire past days of room {room_id}: {e}");
                    }
                }
            }
        }

        metrics::counter!(observability::SWEEP_RUNS_TOTAL).increment(1);
        metrics::counter!(observability::SWEEP_EXPIRED_TOTAL, "status" => "HOLD")
            .increment(u64::from(report.holds_expired));
        metrics::counter!(observability::SWEEP_EXPIRED_TOTAL, "status" => "BOOKED")
            .increment(u64::from(report.bookings_expired));
        metrics::counter!(observability::SWEEP_FAILURES_TOTAL).increment(u64::from(report.failures));
        self.notify(Notification::SweepCompleted(report));
        report
    }
}

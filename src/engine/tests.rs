use super::*;
use crate::calendar::DayToken;
use crate::clock::ManualClock;
use crate::notify::{NotifyResult, Notification};
use chrono::FixedOffset;
use std::sync::Mutex;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const H: Ms = 3_600_000; // 1 hour in ms

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("roomledger_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

/// Property calendar at +05:30 so local days differ from UTC days.
fn cal() -> Calendar {
    Calendar::new(FixedOffset::east_opt(5 * 3600 + 1800).unwrap())
}

fn day(s: &str) -> DayToken {
    s.parse().unwrap()
}

fn days(list: &[&str]) -> Vec<DayToken> {
    list.iter().map(|s| day(s)).collect()
}

fn guest(email: &str) -> Guest {
    Guest {
        name: "Asha Rao".into(),
        email: email.into(),
        mobile: "+91 90000 00000".into(),
    }
}

#[derive(Default)]
struct Recording {
    seen: Mutex<Vec<&'static str>>,
}

#[async_trait::async_trait]
impl Notifier for Recording {
    async fn send(&self, notification: &Notification) -> NotifyResult {
        self.seen.lock().unwrap().push(notification.kind());
        Ok(())
    }
}

struct Harness {
    engine: Arc<Engine>,
    clock: Arc<ManualClock>,
    notes: Arc<Recording>,
    path: PathBuf,
}

impl Harness {
    /// Fresh engine with the clock at 2026-01-01 09:00 local.
    fn new(name: &str) -> Self {
        let path = test_wal_path(name);
        let clock = Arc::new(ManualClock::new(cal().midnight_of(day("2026-01-01")) + 9 * H));
        let notes = Arc::new(Recording::default());
        let engine = Arc::new(Engine::new(path.clone(), cal(), clock.clone(), notes.clone()).unwrap());
        Self {
            engine,
            clock,
            notes,
            path,
        }
    }

    /// A second engine replaying the same WAL.
    fn reopen(&self) -> Arc<Engine> {
        Arc::new(Engine::new(self.path.clone(), cal(), self.clock.clone(), Arc::new(Recording::default())).unwrap())
    }

    fn noon(&self, s: &str) -> Ms {
        cal().noon_of(day(s))
    }

    fn set_local(&self, s: &str, hour: i64) {
        self.clock.set(cal().midnight_of(day(s)) + hour * H);
    }

    async fn room(&self, max_guests: u32) -> Room {
        self.engine
            .create_room(NewRoom {
                name: "Garden Suite".into(),
                description: "Ground floor, faces the lawn".into(),
                price: 4_000,
                gst_percent: 12,
                max_guests,
                amenities: vec!["WiFi".into(), "AC".into()],
                images: vec![],
            })
            .await
            .unwrap()
    }

    async fn book(&self, room: Ulid, from: &str, to: &str) -> Result<Reservation, EngineError> {
        self.book_as(room, from, to, "asha@example.com").await
    }

    async fn book_as(&self, room: Ulid, from: &str, to: &str, email: &str) -> Result<Reservation, EngineError> {
        self.engine
            .create_booking(BookingRequest {
                room_id: room,
                check_in: self.noon(from),
                check_out: self.noon(to),
                guest: guest(email),
                occupants: Occupants { adults: 2, children: 0 },
            })
            .await
    }

    async fn hold(&self, room: Ulid, from: &str, to: &str) -> Result<Reservation, EngineError> {
        self.engine
            .hold_dates(HoldRequest {
                room_id: room,
                check_in: self.noon(from),
                check_out: self.noon(to),
                occupants: Occupants { adults: 1, children: 0 },
            })
            .await
    }

    async fn ledger(&self, room: Ulid) -> (Vec<DayToken>, Vec<DayToken>) {
        let summary = self.engine.get_room(room).await.unwrap();
        (summary.booked_dates, summary.hold_dates)
    }

    async fn status(&self, key: &str) -> ReservationStatus {
        self.engine.get_reservation(key).await.unwrap().reservation.status
    }

    async fn wait_for_note(&self, kind: &str) -> bool {
        for _ in 0..100 {
            if self.notes.seen.lock().unwrap().iter().any(|k| *k == kind) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

// ── Bookings and holds ───────────────────────────────────

#[tokio::test]
async fn scenario_a_booking_fills_ledger() {
    let h = Harness::new("scenario_a.wal");
    let room = h.room(2).await;

    let r = h.book(room.id, "2026-01-10", "2026-01-13").await.unwrap();
    assert_eq!(r.code, "BO000001");
    assert_eq!(r.status, ReservationStatus::Booked);
    assert_eq!(r.days, days(&["2026-01-10", "2026-01-11", "2026-01-12"]));
    assert_eq!(r.pricing.nights, 3);
    assert_eq!(r.pricing.total, 12_000 + 1_440);

    let (booked, held) = h.ledger(room.id).await;
    assert_eq!(booked, days(&["2026-01-10", "2026-01-11", "2026-01-12"]));
    assert!(held.is_empty());
}

#[tokio::test]
async fn scenario_b_overlap_conflicts() {
    let h = Harness::new("scenario_b.wal");
    let room = h.room(2).await;
    h.book(room.id, "2026-01-10", "2026-01-13").await.unwrap();

    match h.book(room.id, "2026-01-12", "2026-01-14").await {
        Err(EngineError::Conflict(d)) => assert_eq!(d, days(&["2026-01-12"])),
        other => panic!("expected conflict, got {other:?}"),
    }
    let (booked, _) = h.ledger(room.id).await;
    assert_eq!(booked.len(), 3);
    // a refused booking consumes no code
    assert_eq!(h.engine.sequence_value(Namespace::Booking), 1);

    // check-out day is free for the next guest
    assert_ok!(h.book(room.id, "2026-01-13", "2026-01-14").await);
}

#[tokio::test]
async fn holds_and_bookings_block_each_other() {
    let h = Harness::new("hold_blocks.wal");
    let room = h.room(2).await;

    let hold = h.hold(room.id, "2026-02-01", "2026-02-03").await.unwrap();
    assert_eq!(hold.code, "HO000001");
    assert_eq!(hold.status, ReservationStatus::Hold);
    assert!(hold.guest.is_none());

    assert!(matches!(
        h.book(room.id, "2026-02-02", "2026-02-04").await,
        Err(EngineError::Conflict(_))
    ));
    h.book(room.id, "2026-02-05", "2026-02-06").await.unwrap();
    assert!(matches!(
        h.hold(room.id, "2026-02-04", "2026-02-06").await,
        Err(EngineError::Conflict(_))
    ));

    let (booked, held) = h.ledger(room.id).await;
    assert_eq!(booked, days(&["2026-02-05"]));
    assert_eq!(held, days(&["2026-02-01", "2026-02-02"]));
}

#[tokio::test]
async fn capacity_is_enforced() {
    let h = Harness::new("capacity.wal");
    let room = h.room(1).await;
    let err = h.book(room.id, "2026-01-10", "2026-01-11").await.unwrap_err();
    assert!(matches!(err, EngineError::CapacityExceeded { max: 1, requested: 2 }));
    let (booked, _) = h.ledger(room.id).await;
    assert!(booked.is_empty());
}

#[tokio::test]
async fn invalid_stays_are_rejected() {
    let h = Harness::new("invalid_stays.wal");
    let room = h.room(2).await;

    // check-out before check-in
    assert!(matches!(
        h.book(room.id, "2026-01-12", "2026-01-10").await,
        Err(EngineError::Validation(_))
    ));
    // same local day: zero nights
    let same_day = h
        .engine
        .create_booking(BookingRequest {
            room_id: room.id,
            check_in: h.noon("2026-01-10") - 2 * H,
            check_out: h.noon("2026-01-10") + 2 * H,
            guest: guest("asha@example.com"),
            occupants: Occupants { adults: 1, children: 0 },
        })
        .await;
    assert!(matches!(same_day, Err(EngineError::Validation(_))));
    // already started
    h.set_local("2026-01-05", 9);
    assert!(matches!(
        h.book(room.id, "2026-01-04", "2026-01-06").await,
        Err(EngineError::Validation(_))
    ));
    // guest fields are mandatory for a booking
    let no_mobile = h
        .engine
        .create_booking(BookingRequest {
            room_id: room.id,
            check_in: h.noon("2026-01-10"),
            check_out: h.noon("2026-01-11"),
            guest: Guest {
                mobile: "  ".into(),
                ..guest("asha@example.com")
            },
            occupants: Occupants { adults: 1, children: 0 },
        })
        .await;
    assert!(matches!(no_mobile, Err(EngineError::Validation(_))));
    // unknown room
    assert!(matches!(
        h.book(Ulid::new(), "2026-01-10", "2026-01-11").await,
        Err(EngineError::NotFound(_))
    ));

    let (booked, held) = h.ledger(room.id).await;
    assert!(booked.is_empty() && held.is_empty());
}

#[tokio::test]
async fn days_follow_property_calendar() {
    let h = Harness::new("local_days.wal");
    let room = h.room(2).await;
    // 2026-01-09T20:00Z is 2026-01-10 01:30 at +05:30
    let utc_evening = Calendar::utc().midnight_of(day("2026-01-09")) + 20 * H;
    let r = h
        .engine
        .create_booking(BookingRequest {
            room_id: room.id,
            check_in: utc_evening,
            check_out: h.noon("2026-01-11"),
            guest: guest("asha@example.com"),
            occupants: Occupants { adults: 1, children: 0 },
        })
        .await
        .unwrap();
    assert_eq!(r.days, days(&["2026-01-10"]));
}

#[tokio::test]
async fn emails_are_normalized() {
    let h = Harness::new("emails.wal");
    let room = h.room(2).await;
    let r = h
        .book_as(room.id, "2026-01-10", "2026-01-11", "  Asha@Example.COM ")
        .await
        .unwrap();
    assert_eq!(r.guest_email(), Some("asha@example.com"));
    assert_eq!(h.engine.reservations_for_guest("ASHA@example.com").await.len(), 1);
}

// ── Transitions ──────────────────────────────────────────

#[tokio::test]
async fn scenario_d_cancellation_flow() {
    let h = Harness::new("scenario_d.wal");
    let room = h.room(2).await;
    let r = h.book(room.id, "2026-01-03", "2026-01-05").await.unwrap();

    let requested = h
        .engine
        .request_cancellation(&r.code, "asha@example.com", Some("  change of plans ".into()))
        .await
        .unwrap();
    assert_eq!(requested.status, ReservationStatus::CancelRequested);
    assert_eq!(requested.cancel_reason.as_deref(), Some("change of plans"));
    // the days stay booked until an admin decides
    assert_eq!(h.ledger(room.id).await.0.len(), 2);

    let cancelled = h.engine.approve_cancellation(&r.code).await.unwrap();
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert!(h.ledger(room.id).await.0.is_empty());

    assert!(matches!(
        h.engine.reject_cancellation(&r.code).await,
        Err(EngineError::NotFound(_))
    ));
    assert_eq!(h.status(&r.code).await, ReservationStatus::Cancelled);
}

#[tokio::test]
async fn reject_restores_booking() {
    let h = Harness::new("reject.wal");
    let room = h.room(2).await;
    let r = h.book(room.id, "2026-01-03", "2026-01-05").await.unwrap();
    h.engine
        .request_cancellation(&r.id.to_string(), "asha@example.com", Some("maybe".into()))
        .await
        .unwrap();

    let back = h.engine.reject_cancellation(&r.id.to_string()).await.unwrap();
    assert_eq!(back.status, ReservationStatus::Booked);
    assert!(back.cancel_reason.is_none());
    assert_eq!(h.ledger(room.id).await.0.len(), 2);
}

#[tokio::test]
async fn only_the_guest_may_request_cancellation() {
    let h = Harness::new("owner_only.wal");
    let room = h.room(2).await;
    let r = h.book(room.id, "2026-01-03", "2026-01-05").await.unwrap();

    let err = h
        .engine
        .request_cancellation(&r.code, "mallory@example.com", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert_eq!(h.status(&r.code).await, ReservationStatus::Booked);

    assert_ok!(
        h.engine
            .request_cancellation(&r.code, "ASHA@example.com", None)
            .await
    );
}

#[tokio::test]
async fn failed_transitions_leave_ledger_unchanged() {
    let h = Harness::new("guarded.wal");
    let room = h.room(2).await;
    let booking = h.book(room.id, "2026-01-10", "2026-01-12").await.unwrap();
    let hold = h.hold(room.id, "2026-01-20", "2026-01-21").await.unwrap();
    let before = h.ledger(room.id).await;

    assert_err!(h.engine.cancel_hold(&booking.code).await);
    assert_err!(h.engine.approve_cancellation(&booking.code).await);
    assert_err!(h.engine.reject_cancellation(&booking.code).await);
    assert_err!(h.engine.request_cancellation(&hold.code, "asha@example.com", None).await);
    assert_err!(h.engine.approve_cancellation(&hold.code).await);
    assert_err!(h.engine.cancel_hold("HO999999").await);

    assert_eq!(h.ledger(room.id).await, before);
    assert_eq!(h.status(&booking.code).await, ReservationStatus::Booked);
    assert_eq!(h.status(&hold.code).await, ReservationStatus::Hold);
}

#[tokio::test]
async fn cancel_hold_releases_days_once() {
    let h = Harness::new("cancel_hold.wal");
    let room = h.room(2).await;
    let hold = h.hold(room.id, "2026-02-01", "2026-02-03").await.unwrap();

    let cancelled = h.engine.cancel_hold(&hold.code).await.unwrap();
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert!(h.ledger(room.id).await.1.is_empty());

    assert!(matches!(h.engine.cancel_hold(&hold.code).await, Err(EngineError::NotFound(_))));
    // the dates are bookable again
    assert_ok!(h.book(room.id, "2026-02-01", "2026-02-03").await);
}

#[tokio::test]
async fn confirming_a_hold_moves_days_to_booked() {
    let h = Harness::new("confirm_hold.wal");
    let room = h.room(2).await;
    h.book(room.id, "2026-01-05", "2026-01-06").await.unwrap();
    let hold = h.hold(room.id, "2026-02-01", "2026-02-03").await.unwrap();

    let confirmed = h
        .engine
        .confirm_hold(&hold.code, &guest("walkin@example.com"))
        .await
        .unwrap();
    assert_eq!(confirmed.id, hold.id);
    assert_eq!(confirmed.code, "BO000002");
    assert_eq!(confirmed.hold_code.as_deref(), Some(hold.code.as_str()));
    assert_eq!(confirmed.status, ReservationStatus::Booked);
    assert_eq!(confirmed.pricing, hold.pricing);
    assert!(confirmed.has_required_fields());

    let (booked, held) = h.ledger(room.id).await;
    assert_eq!(booked, days(&["2026-01-05", "2026-02-01", "2026-02-02"]));
    assert!(held.is_empty());

    // the old hold code still finds the reservation, now booked
    assert_eq!(h.status(&hold.code).await, ReservationStatus::Booked);
    assert!(matches!(h.engine.cancel_hold(&hold.code).await, Err(EngineError::NotFound(_))));
    assert!(h.wait_for_note("booking_confirmed").await);
}

#[tokio::test]
async fn lapsed_hold_cannot_be_confirmed() {
    let h = Harness::new("lapsed_hold.wal");
    let room = h.room(2).await;
    let hold = h.hold(room.id, "2026-01-02", "2026-01-03").await.unwrap();
    h.set_local("2026-01-02", 13);
    assert!(matches!(
        h.engine.confirm_hold(&hold.code, &guest("late@example.com")).await,
        Err(EngineError::Validation(_))
    ));
    assert_eq!(h.status(&hold.code).await, ReservationStatus::Hold);
}

// ── Sweeps ───────────────────────────────────────────────

#[tokio::test]
async fn scenario_c_hold_expires_after_checkin_noon() {
    let h = Harness::new("scenario_c.wal");
    let room = h.room(2).await;
    let hold = h.hold(room.id, "2026-02-01", "2026-02-03").await.unwrap();

    h.set_local("2026-02-01", 11);
    assert_eq!(h.engine.sweep().await.holds_expired, 0);
    assert_eq!(h.status(&hold.code).await, ReservationStatus::Hold);

    h.set_local("2026-02-01", 13);
    let report = h.engine.sweep().await;
    assert_eq!(report.holds_expired, 1);
    assert_eq!(report.failures, 0);
    assert_eq!(h.status(&hold.code).await, ReservationStatus::Expired);
    let (_, held) = h.ledger(room.id).await;
    assert!(!held.contains(&day("2026-02-01")));
    assert!(!held.contains(&day("2026-02-02")));
    assert!(h.wait_for_note("reservation_expired").await);
}

#[tokio::test]
async fn booking_expires_after_checkout_noon_and_counts_stay() {
    let h = Harness::new("booking_expiry.wal");
    let room = h.room(2).await;
    let r = h.book(room.id, "2026-01-02", "2026-01-04").await.unwrap();

    h.set_local("2026-01-04", 11);
    assert_eq!(h.engine.sweep().await.bookings_expired, 0);
    assert_eq!(h.status(&r.code).await, ReservationStatus::Booked);

    h.set_local("2026-01-04", 12);
    let report = h.engine.sweep().await;
    assert_eq!(report.bookings_expired, 1);
    assert_eq!(h.status(&r.code).await, ReservationStatus::Expired);
    assert_eq!(h.engine.completed_stays("Asha@Example.com"), 1);
    assert_eq!(h.ledger(room.id).await, (vec![], vec![]));

    // a second sweep finds nothing left to do
    assert_eq!(h.engine.sweep().await, SweepReport::default());
}

#[tokio::test]
async fn sweep_skips_cancel_requested() {
    let h = Harness::new("sweep_cancel_requested.wal");
    let room = h.room(2).await;
    let r = h.book(room.id, "2026-01-02", "2026-01-03").await.unwrap();
    h.engine
        .request_cancellation(&r.code, "asha@example.com", None)
        .await
        .unwrap();

    h.set_local("2026-01-10", 9);
    let report = h.engine.sweep().await;
    assert_eq!(report.bookings_expired, 0);
    assert_eq!(h.status(&r.code).await, ReservationStatus::CancelRequested);
    // its day is in the past, so hygiene still clears it
    assert_eq!(report.days_retired, 1);
}

#[tokio::test]
async fn sweep_retires_past_days() {
    let h = Harness::new("retire.wal");
    let room = h.room(2).await;
    let r = h.book(room.id, "2026-01-02", "2026-01-05").await.unwrap();

    h.set_local("2026-01-04", 9);
    let report = h.engine.sweep().await;
    assert_eq!(report.days_retired, 2);
    assert_eq!(report.bookings_expired, 0);
    assert_eq!(h.ledger(room.id).await.0, days(&["2026-01-04"]));
    assert_eq!(h.status(&r.code).await, ReservationStatus::Booked);
}

#[tokio::test]
async fn expire_rechecks_under_lock() {
    let h = Harness::new("expire_recheck.wal");
    let room = h.room(2).await;
    let hold = h.hold(room.id, "2026-01-02", "2026-01-03").await.unwrap();
    h.set_local("2026-01-02", 13);
    let due = h.engine.collect_due_expirations(h.engine.now_ms()).await;
    assert_eq!(due, vec![(room.id, hold.id)]);

    // cancelled between collection and expiry
    h.engine.cancel_hold(&hold.code).await.unwrap();
    let outcome = h.engine.expire_reservation(room.id, hold.id, h.engine.now_ms()).await;
    assert!(matches!(outcome, Ok(None)));
    assert_eq!(h.status(&hold.code).await, ReservationStatus::Cancelled);
}

// ── Concurrency and sequences ────────────────────────────

#[tokio::test]
async fn concurrent_overlapping_bookings_exactly_one_wins() {
    let h = Harness::new("concurrent_overlap.wal");
    let room = h.room(2).await;
    let ranges = [
        ("2026-03-01", "2026-03-04"),
        ("2026-03-03", "2026-03-05"),
        ("2026-03-03", "2026-03-04"),
        ("2026-02-28", "2026-03-06"),
    ];

    let room_id = room.id;
    let mut tasks = Vec::new();
    for (i, (from, to)) in ranges.into_iter().enumerate() {
        let engine = h.engine.clone();
        let check_in = h.noon(from);
        let check_out = h.noon(to);
        tasks.push(tokio::spawn(async move {
            engine
                .create_booking(BookingRequest {
                    room_id,
                    check_in,
                    check_out,
                    guest: guest(&format!("guest{i}@example.com")),
                    occupants: Occupants { adults: 1, children: 0 },
                })
                .await
        }));
    }

    let mut won = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => won += 1,
            Err(EngineError::Conflict(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(conflicts, 3);

    let (booked, held) = h.ledger(room.id).await;
    let mut unique = booked.clone();
    unique.dedup();
    assert_eq!(unique, booked);
    assert!(held.is_empty());
}

#[tokio::test]
async fn concurrent_sequences_are_distinct() {
    let h = Harness::new("concurrent_seq.wal");
    let mut tasks = Vec::new();
    for _ in 0..50 {
        let engine = h.engine.clone();
        tasks.push(tokio::spawn(async move { engine.next_sequence(Namespace::Booking).await }));
    }
    let mut values: Vec<u64> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();
    values.sort_unstable();
    assert_eq!(values, (1..=50).collect::<Vec<u64>>());
    assert_eq!(h.engine.sequence_value(Namespace::Holding), 0);
}

// ── Rooms and queries ────────────────────────────────────

#[tokio::test]
async fn room_deactivation_requires_empty_ledger() {
    let h = Harness::new("deactivate.wal");
    let room = h.room(2).await;
    let hold = h.hold(room.id, "2026-01-10", "2026-01-11").await.unwrap();

    assert!(matches!(
        h.engine.deactivate_room(room.id).await,
        Err(EngineError::HasAllocations(_))
    ));
    h.engine.cancel_hold(&hold.code).await.unwrap();

    let retired = h.engine.deactivate_room(room.id).await.unwrap();
    assert!(!retired.active);
    assert!(h.engine.list_rooms(false).await.is_empty());
    assert_eq!(h.engine.list_rooms(true).await.len(), 1);
    assert!(matches!(
        h.book(room.id, "2026-01-10", "2026-01-11").await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn price_change_keeps_snapshot() {
    let h = Harness::new("price_snapshot.wal");
    let room = h.room(2).await;
    let r = h.book(room.id, "2026-01-10", "2026-01-12").await.unwrap();

    let updated = h
        .engine
        .update_room(
            room.id,
            RoomPatch {
                price: Some(9_999),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.price, 9_999);
    assert_eq!(updated.name, room.name);

    let details = h.engine.get_reservation(&r.code).await.unwrap();
    assert_eq!(details.reservation.pricing, r.pricing);
    assert_eq!(details.room.price, 9_999);
}

#[tokio::test]
async fn room_validation() {
    let h = Harness::new("room_validation.wal");
    let blank = h
        .engine
        .create_room(NewRoom {
            name: "   ".into(),
            description: String::new(),
            price: 1,
            gst_percent: 0,
            max_guests: 1,
            amenities: vec![],
            images: vec![],
        })
        .await;
    assert!(matches!(blank, Err(EngineError::Validation(_))));

    let room = h.room(2).await;
    let zero = h
        .engine
        .update_room(
            room.id,
            RoomPatch {
                max_guests: Some(0),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(zero, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn room_price_is_capped() {
    let h = Harness::new("price_cap.wal");
    let pricey = |price| NewRoom {
        name: "Presidential".into(),
        description: String::new(),
        price,
        gst_percent: 100,
        max_guests: 2,
        amenities: vec![],
        images: vec![],
    };
    assert!(matches!(
        h.engine.create_room(pricey(u64::MAX / 2)).await,
        Err(EngineError::LimitExceeded(_))
    ));

    let room = h.engine.create_room(pricey(crate::limits::MAX_PRICE)).await.unwrap();
    let over = h
        .engine
        .update_room(
            room.id,
            RoomPatch {
                price: Some(crate::limits::MAX_PRICE + 1),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(over, Err(EngineError::LimitExceeded(_))));

    // the most expensive allowed stay still prices exactly
    let r = h.book(room.id, "2026-01-10", "2026-01-13").await.unwrap();
    assert_eq!(r.pricing.tax, 3 * crate::limits::MAX_PRICE);
    assert_eq!(r.pricing.total, 6 * crate::limits::MAX_PRICE);
}

#[tokio::test]
async fn listings_filter_by_status() {
    let h = Harness::new("listings.wal");
    let room = h.room(2).await;
    let old = h.book(room.id, "2026-01-02", "2026-01-03").await.unwrap();
    let cancelled = h.book(room.id, "2026-01-10", "2026-01-11").await.unwrap();
    let live = h.book(room.id, "2026-01-20", "2026-01-21").await.unwrap();
    h.hold(room.id, "2026-01-25", "2026-01-26").await.unwrap();

    h.engine
        .request_cancellation(&cancelled.code, "asha@example.com", None)
        .await
        .unwrap();
    h.engine.approve_cancellation(&cancelled.code).await.unwrap();
    h.set_local("2026-01-03", 13);
    h.engine.sweep().await;
    assert_eq!(h.status(&old.code).await, ReservationStatus::Expired);

    let all = h.engine.list_reservations(None).await;
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|d| d.reservation.status != ReservationStatus::Expired));

    let expired = h.engine.list_reservations(Some(ReservationStatus::Expired)).await;
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].reservation.id, old.id);
    assert_eq!(expired[0].room.id, room.id);

    let mine = h.engine.reservations_for_guest("asha@example.com").await;
    let codes: Vec<&str> = mine.iter().map(|d| d.reservation.code.as_str()).collect();
    assert!(codes.contains(&live.code.as_str()));
    assert!(codes.contains(&old.code.as_str()));
    assert!(!codes.contains(&cancelled.code.as_str()));
}

#[tokio::test]
async fn unavailable_days_window() {
    let h = Harness::new("unavailable.wal");
    let room = h.room(2).await;
    h.book(room.id, "2026-01-10", "2026-01-12").await.unwrap();
    h.hold(room.id, "2026-01-15", "2026-01-16").await.unwrap();

    let hits = h
        .engine
        .unavailable_days(room.id, day("2026-01-11"), day("2026-01-16"))
        .await
        .unwrap();
    assert_eq!(hits, days(&["2026-01-11", "2026-01-15"]));

    assert!(matches!(
        h.engine
            .unavailable_days(room.id, day("2026-01-16"), day("2026-01-11"))
            .await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        h.engine
            .unavailable_days(room.id, day("2026-01-01"), day("2029-01-01"))
            .await,
        Err(EngineError::LimitExceeded(_))
    ));
}

// ── Durability ───────────────────────────────────────────

#[tokio::test]
async fn replay_restores_state() {
    let h = Harness::new("replay.wal");
    let room = h.room(2).await;
    let booking = h.book(room.id, "2026-01-10", "2026-01-12").await.unwrap();
    let hold = h.hold(room.id, "2026-01-20", "2026-01-22").await.unwrap();
    h.engine
        .request_cancellation(&booking.code, "asha@example.com", Some("flight moved".into()))
        .await
        .unwrap();

    let reopened = h.reopen();
    let b = reopened.get_reservation(&booking.code).await.unwrap().reservation;
    assert_eq!(b.status, ReservationStatus::CancelRequested);
    assert_eq!(b.cancel_reason.as_deref(), Some("flight moved"));
    assert_eq!(
        reopened.get_reservation(&hold.code).await.unwrap().reservation.status,
        ReservationStatus::Hold
    );
    assert_eq!(reopened.get_room(room.id).await.unwrap(), h.engine.get_room(room.id).await.unwrap());
    assert_eq!(reopened.sequence_value(Namespace::Booking), 1);
    assert_eq!(reopened.sequence_value(Namespace::Holding), 1);
}

#[tokio::test]
async fn sequences_survive_restart() {
    let h = Harness::new("seq_restart.wal");
    let room = h.room(2).await;
    h.book(room.id, "2026-01-10", "2026-01-11").await.unwrap();
    h.engine.next_sequence(Namespace::Booking).await.unwrap();

    let reopened = h.reopen();
    let next = reopened
        .create_booking(BookingRequest {
            room_id: room.id,
            check_in: h.noon("2026-01-12"),
            check_out: h.noon("2026-01-13"),
            guest: guest("asha@example.com"),
            occupants: Occupants { adults: 1, children: 0 },
        })
        .await
        .unwrap();
    assert_eq!(next.code, "BO000003");
}

#[tokio::test]
async fn compaction_preserves_state() {
    let h = Harness::new("compaction.wal");
    let room = h.room(2).await;
    let stay = h.book(room.id, "2026-01-02", "2026-01-03").await.unwrap();
    let live = h.book(room.id, "2026-01-10", "2026-01-12").await.unwrap();
    let hold = h.hold(room.id, "2026-01-20", "2026-01-21").await.unwrap();
    let promoted = h.hold(room.id, "2026-01-25", "2026-01-26").await.unwrap();
    let confirmed = h
        .engine
        .confirm_hold(&promoted.code, &guest("walkin@example.com"))
        .await
        .unwrap();
    assert_eq!(confirmed.hold_code.as_deref(), Some("HO000002"));
    h.set_local("2026-01-03", 13);
    h.engine.sweep().await;
    assert!(h.engine.wal_appends_since_compact().await > 0);

    h.engine.compact_wal().await.unwrap();
    assert_eq!(h.engine.wal_appends_since_compact().await, 0);

    let reopened = h.reopen();
    assert_eq!(reopened.get_room(room.id).await.unwrap(), h.engine.get_room(room.id).await.unwrap());
    for code in [&stay.code, &live.code, &hold.code, &confirmed.code, &promoted.code] {
        assert_eq!(
            reopened.get_reservation(code).await.unwrap(),
            h.engine.get_reservation(code).await.unwrap()
        );
    }
    assert_eq!(reopened.completed_stays("asha@example.com"), 1);
    assert_eq!(reopened.sequence_value(Namespace::Booking), 3);
    assert_eq!(reopened.sequence_value(Namespace::Holding), 2);
    // the confirmed hold still answers to its HO code after the snapshot
    let by_alias = reopened.get_reservation(&promoted.code).await.unwrap().reservation;
    assert_eq!(by_alias.id, promoted.id);
    assert_eq!(by_alias.code, confirmed.code);
    assert_eq!(by_alias.status, ReservationStatus::Booked);

    // appends after compaction land after the snapshot
    h.engine.cancel_hold(&hold.code).await.unwrap();
    let again = h.reopen();
    assert_eq!(
        again.get_reservation(&hold.code).await.unwrap().reservation.status,
        ReservationStatus::Cancelled
    );
}

#[tokio::test]
async fn booking_notifies_but_hold_does_not() {
    let h = Harness::new("notify.wal");
    let room = h.room(2).await;
    h.hold(room.id, "2026-01-10", "2026-01-11").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.notes.seen.lock().unwrap().is_empty());

    h.book(room.id, "2026-01-12", "2026-01-13").await.unwrap();
    assert!(h.wait_for_note("booking_confirmed").await);
}

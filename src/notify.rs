use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::SweepReport;
use crate::model::{Reservation, Room};

pub type NotifyResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Outbound message for the notification collaborator (email/SMS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    BookingConfirmed { reservation: Reservation, room: Room },
    ReservationExpired { reservation: Reservation, room: Room },
    SweepCompleted(SweepReport),
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::BookingConfirmed { .. } => "booking_confirmed",
            Notification::ReservationExpired { .. } => "reservation_expired",
            Notification::SweepCompleted(_) => "sweep_completed",
        }
    }
}

/// Delivery is best effort: failures are logged by the dispatcher and never
/// reach the operation that triggered the message.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, notification: &Notification) -> NotifyResult;
}

/// Default collaborator: writes each notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> NotifyResult {
        match notification {
            Notification::BookingConfirmed { reservation, room } => tracing::info!(
                code = %reservation.code,
                room = %room.name,
                email = reservation.guest_email().unwrap_or(""),
                "booking confirmed"
            ),
            Notification::ReservationExpired { reservation, room } => tracing::info!(
                code = %reservation.code,
                room = %room.name,
                "reservation expired"
            ),
            Notification::SweepCompleted(report) => tracing::info!(
                holds_expired = report.holds_expired,
                bookings_expired = report.bookings_expired,
                days_retired = report.days_retired,
                failures = report.failures,
                "sweep completed"
            ),
        }
        Ok(())
    }
}

/// Fire-and-forget delivery on a separate task.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&notification).await {
            metrics::counter!(
                crate::observability::NOTIFICATION_FAILURES_TOTAL,
                "kind" => notification.kind()
            )
            .increment(1);
            tracing::warn!("{} notification failed: {e}", notification.kind());
        }
    });
}

mod error;
mod mutations;
mod queries;
mod rooms;
mod sequence;
mod store;
mod sweep;
#[cfg(test)]
mod tests;

pub use error::EngineError;
pub use mutations::{BookingRequest, HoldRequest};
pub use rooms::NewRoom;
pub use store::Store;
pub use sweep::SweepReport;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::calendar::Calendar;
use crate::clock::Clock;
use crate::model::*;
use crate::notify::{self, Notification, Notifier};
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal<Event>, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            // Commit what we have before the non-append command.
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal<Event>, batch: &mut Vec<Pending>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("WAL flush failed: {e}");
    }
    respond_batch(batch, &result);
}

fn flush_batch(wal: &mut Wal<Event>, batch: &[Pending]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: &mut Vec<Pending>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal<Event>, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let mut batch = vec![(event, response)];
            commit_batch(wal, &mut batch);
        }
    }
}

/// The reservation engine: rooms, their ledgers and reservations, durable
/// through the WAL.
///
/// Locking order: `compaction_gate` (shared) → one room's write lock. Every
/// mutation holds the shared gate from its first read until its event is
/// applied, so a compaction snapshot never misses an in-flight append.
pub struct Engine {
    pub(super) store: Store,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub(super) compaction_gate: RwLock<()>,
    pub(super) calendar: Calendar,
    pub(super) clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl Engine {
    /// Replay `wal_path` and start the WAL writer task. Must be called from
    /// within a tokio runtime.
    pub fn new(
        wal_path: PathBuf,
        calendar: Calendar,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> io::Result<Self> {
        // open() truncates a torn tail, so replay the file afterwards.
        let wal = Wal::<Event>::open(&wal_path)?;
        let replay = Wal::<Event>::replay(&wal_path)?;
        let store = Store::new();
        store.replay(&replay.records);
        tracing::info!(
            "replayed {} events from {} ({} rooms)",
            replay.records.len(),
            wal_path.display(),
            store.room_count()
        );

        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            store,
            wal_tx,
            compaction_gate: RwLock::new(()),
            calendar,
            clock,
            notifier,
        })
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn now_ms(&self) -> Ms {
        self.clock.now_ms()
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append, then apply. Nothing is applied if the append fails.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_to_room(rs, event);
        Ok(())
    }

    /// WAL-append, then apply an event that is not scoped to a room lock.
    pub(super) async fn persist_and_apply_global(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_global(event);
        Ok(())
    }

    pub(super) fn room_handle(&self, room_id: &Ulid) -> Result<SharedRoomState, EngineError> {
        self.store
            .get_room(room_id)
            .ok_or_else(|| EngineError::not_found(room_id))
    }

    /// Lookup reservation (by id or code) → room, acquire the room's write lock.
    pub(super) async fn resolve_reservation_write(
        &self,
        key: &str,
    ) -> Result<(Ulid, OwnedRwLockWriteGuard<RoomState>), EngineError> {
        let id = self
            .store
            .resolve_key(key)
            .ok_or_else(|| EngineError::not_found(key))?;
        let room_id = self
            .store
            .room_for_reservation(&id)
            .ok_or_else(|| EngineError::not_found(key))?;
        let guard = self.room_handle(&room_id)?.write_owned().await;
        Ok((id, guard))
    }

    /// Hand a notification to the collaborator without waiting for it.
    pub(super) fn notify(&self, notification: Notification) {
        notify::dispatch(self.notifier.clone(), notification);
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.compaction_gate.write().await;
        let mut events = Vec::new();

        for namespace in Namespace::ALL {
            events.push(Event::SequenceAdvanced {
                namespace,
                value: self.store.sequence_value(namespace),
            });
        }
        for (_, rs) in self.store.room_handles() {
            let guard = rs.read().await;
            events.push(Event::RoomRestored {
                room: guard.room.clone(),
                booked: guard.ledger.booked().copied().collect(),
                held: guard.ledger.held().copied().collect(),
            });
            let mut reservations: Vec<&Reservation> = guard.reservations.values().collect();
            reservations.sort_by_key(|r| r.id);
            for reservation in reservations {
                events.push(Event::ReservationRestored {
                    reservation: reservation.clone(),
                });
            }
        }
        for (email, count) in self.store.stay_counts() {
            events.push(Event::StaysRestored { email, count });
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        tracing::info!("compacted WAL to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

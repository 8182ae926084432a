use serde::Deserialize;
use ulid::Ulid;

use crate::calendar::DayToken;
use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoom {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: u64,
    #[serde(default)]
    pub gst_percent: u32,
    pub max_guests: u32,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

fn validate_list(items: &[String], max: usize, what: &'static str) -> Result<(), EngineError> {
    if items.len() > max || items.iter().any(|s| s.len() > MAX_LIST_ITEM_LEN) {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

fn validate_room(room: &Room) -> Result<(), EngineError> {
    if room.name.trim().is_empty() {
        return Err(EngineError::Validation("room name is required"));
    }
    if room.name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("room name too long"));
    }
    if room.description.len() > MAX_DESCRIPTION_LEN {
        return Err(EngineError::LimitExceeded("room description too long"));
    }
    if room.price > MAX_PRICE {
        return Err(EngineError::LimitExceeded("room price too high"));
    }
    if room.max_guests == 0 {
        return Err(EngineError::Validation("room must sleep at least one guest"));
    }
    if room.gst_percent > MAX_GST_PERCENT {
        return Err(EngineError::Validation("tax rate above 100%"));
    }
    validate_list(&room.amenities, MAX_AMENITIES, "too many amenities")?;
    validate_list(&room.images, MAX_IMAGES, "too many images")
}

pub(super) fn summarize(state: &RoomState) -> RoomSummary {
    RoomSummary {
        room: state.room.clone(),
        booked_dates: state.ledger.booked().copied().collect(),
        hold_dates: state.ledger.held().copied().collect(),
    }
}

impl Engine {
    pub async fn create_room(&self, new: NewRoom) -> Result<Room, EngineError> {
        let room = Room {
            id: Ulid::new(),
            name: new.name.trim().to_string(),
            description: new.description,
            price: new.price,
            gst_percent: new.gst_percent,
            max_guests: new.max_guests,
            amenities: new.amenities,
            images: new.images,
            active: true,
        };
        validate_room(&room)?;

        let _gate = self.compaction_gate.read().await;
        if self.store.room_count() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        self.persist_and_apply_global(&Event::RoomCreated { room: room.clone() })
            .await?;
        tracing::info!("room {} created: {}", room.id, room.name);
        Ok(room)
    }

    /// Change display and pricing metadata. Existing reservations keep their
    /// pricing snapshot. Deactivating through a patch follows the same rule
    /// as `deactivate_room`.
    pub async fn update_room(&self, id: Ulid, patch: RoomPatch) -> Result<Room, EngineError> {
        let _gate = self.compaction_gate.read().await;
        let rs = self.room_handle(&id)?;
        let mut guard = rs.write().await;

        let mut room = guard.room.clone();
        room.apply_patch(patch);
        room.name = room.name.trim().to_string();
        validate_room(&room)?;
        if guard.room.active && !room.active && !guard.ledger.is_empty() {
            return Err(EngineError::HasAllocations(id));
        }

        self.persist_and_apply(&mut guard, &Event::RoomUpdated { room: room.clone() })
            .await?;
        Ok(room)
    }

    /// Soft-retire a room. Refused while any day is still booked or held.
    pub async fn deactivate_room(&self, id: Ulid) -> Result<Room, EngineError> {
        let _gate = self.compaction_gate.read().await;
        let rs = self.room_handle(&id)?;
        let mut guard = rs.write().await;
        if !guard.ledger.is_empty() {
            return Err(EngineError::HasAllocations(id));
        }
        if guard.room.active {
            self.persist_and_apply(&mut guard, &Event::RoomDeactivated { id })
                .await?;
            tracing::info!("room {id} deactivated");
        }
        Ok(guard.room.clone())
    }

    pub async fn get_room(&self, id: Ulid) -> Result<RoomSummary, EngineError> {
        let rs = self.room_handle(&id)?;
        let guard = rs.read().await;
        Ok(summarize(&guard))
    }

    /// Rooms in creation order. Inactive rooms only when asked for.
    pub async fn list_rooms(&self, include_inactive: bool) -> Vec<RoomSummary> {
        let mut out = Vec::new();
        for (_, rs) in self.store.room_handles() {
            let guard = rs.read().await;
            if include_inactive || guard.room.active {
                out.push(summarize(&guard));
            }
        }
        out
    }

    /// Booked or held days of a room within `[from, to)`.
    pub async fn unavailable_days(
        &self,
        id: Ulid,
        from: DayToken,
        to: DayToken,
    ) -> Result<Vec<DayToken>, EngineError> {
        if to < from {
            return Err(EngineError::Validation("window end before start"));
        }
        if from.days_until(to) > MAX_UNAVAILABLE_WINDOW_DAYS {
            return Err(EngineError::LimitExceeded("window too wide"));
        }
        let rs = self.room_handle(&id)?;
        let guard = rs.read().await;
        Ok(guard.ledger.unavailable_in(from, to))
    }
}

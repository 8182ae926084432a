use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// Next durable value in `namespace`. Values are unique across concurrent
    /// callers and restarts; a failed append leaves a gap, never a reuse.
    pub async fn next_sequence(&self, namespace: Namespace) -> Result<u64, EngineError> {
        let _gate = self.compaction_gate.read().await;
        self.allocate_sequence(namespace).await
    }

    /// As `next_sequence`, for callers already holding the compaction gate.
    pub(super) async fn allocate_sequence(&self, namespace: Namespace) -> Result<u64, EngineError> {
        let value = self.store.bump_sequence(namespace);
        self.wal_append(&Event::SequenceAdvanced { namespace, value })
            .await?;
        Ok(value)
    }

    /// Last value handed out in `namespace` (0 if none).
    pub fn sequence_value(&self, namespace: Namespace) -> u64 {
        self.store.sequence_value(namespace)
    }
}

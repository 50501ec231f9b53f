//! Per-request state shared by the rows of one bulk mapping upload.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::Mutex;

use crate::filter::{EntityFilter, EntityUpdate};
use crate::ports::EntityStore;
use crate::types::EntityId;

/// Type-flag cache plus the ancestor merge buffer.
///
/// Created per request, flushed once, then dropped. Concurrent rows queue into
/// the same buffer; the mutex makes each merge a read-modify-write.
pub struct BatchContext {
    tenant_id: String,
    flags: Mutex<HashMap<String, bool>>,
    pending: Mutex<BTreeMap<EntityId, EntityUpdate>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub updated: usize,
    pub failed: usize,
}

impl BatchContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            flags: Mutex::new(HashMap::new()),
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub async fn cached_flag(&self, entity_type: &str) -> Option<bool> {
        self.flags.lock().await.get(entity_type).copied()
    }

    pub async fn remember_flag(&self, entity_type: &str, flag: bool) {
        self.flags.lock().await.insert(entity_type.to_string(), flag);
    }

    /// Merge `update` into whatever is already pending for `ancestor`.
    pub async fn queue(&self, ancestor: EntityId, update: EntityUpdate) {
        let mut pending = self.pending.lock().await;
        pending.entry(ancestor).or_default().merge(update);
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Snapshot of the buffered update for one ancestor.
    pub async fn pending_for(&self, ancestor: &EntityId) -> Option<EntityUpdate> {
        self.pending.lock().await.get(ancestor).cloned()
    }

    /// Write every buffered ancestor update, one atomic update per ancestor.
    /// Failures are logged and counted; the rest of the buffer still flushes.
    pub async fn flush(&self, store: &dyn EntityStore) -> FlushSummary {
        let pending = std::mem::take(&mut *self.pending.lock().await);
        let mut summary = FlushSummary::default();
        for (ancestor, update) in pending {
            if update.is_empty() {
                continue;
            }
            let filter = EntityFilter::by_id(self.tenant_id.as_str(), ancestor);
            match store.update_one(&filter, &update).await {
                Ok(_) => summary.updated += 1,
                Err(e) => {
                    tracing::warn!(%ancestor, error = %e, "ancestor flush failed");
                    summary.failed += 1;
                }
            }
        }
        tracing::debug!(
            tenant = %self.tenant_id,
            updated = summary.updated,
            failed = summary.failed,
            "batch flushed"
        );
        summary
    }
}

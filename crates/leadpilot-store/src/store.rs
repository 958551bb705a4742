//! The lead store: CRUD plus atomic field-patch over a JSON file pair.
//!
//! `leads.json` holds the working set; `deleted_leads.json` is the
//! soft-delete archive (leads are never hard-removed, to preserve the
//! audit trail). Both live under the configured data directory.

use crate::persist;
use leadpilot_core::error::{LeadPilotError, Result};
use leadpilot_core::types::{ChannelStatus, ChannelType, Lead, LeadPatch};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Filter for `list` — all criteria are ANDed.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub channel_status: Option<ChannelStatus>,
    pub channel: Option<ChannelType>,
    pub service_tag: Option<String>,
}

impl LeadFilter {
    fn matches(&self, lead: &Lead) -> bool {
        if let Some(s) = self.channel_status
            && lead.channel_status != s
        {
            return false;
        }
        if let Some(c) = self.channel
            && lead.channel != c
        {
            return false;
        }
        if let Some(tag) = &self.service_tag
            && lead.service_tag.as_deref() != Some(tag.as_str())
        {
            return false;
        }
        true
    }
}

struct Inner {
    leads: Vec<Lead>,
    deleted: Vec<Lead>,
}

/// Durable keyed collection of leads.
///
/// Concurrent patches to the same lead (one from the UI, one from the bot)
/// serialize on the inner mutex and are each applied as one merged unit —
/// last-writer-wins per field, durable write before the caller returns.
pub struct LeadStore {
    dir: PathBuf,
    inner: Mutex<Inner>,
}

impl LeadStore {
    /// Open the store at the given data directory, loading existing state.
    pub fn open(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        let leads: Vec<Lead> = persist::read_json_or_default(&dir.join("leads.json"));
        let deleted: Vec<Lead> = persist::read_json_or_default(&dir.join("deleted_leads.json"));
        tracing::debug!(
            "Lead store opened: {} active, {} archived",
            leads.len(),
            deleted.len()
        );
        Self {
            dir: dir.to_path_buf(),
            inner: Mutex::new(Inner { leads, deleted }),
        }
    }

    /// Insert a new lead. The id must be unique across the store.
    pub async fn create(&self, lead: Lead) -> Result<Lead> {
        let mut inner = self.inner.lock().await;
        if inner.leads.iter().any(|l| l.id == lead.id) {
            return Err(LeadPilotError::Validation(format!(
                "lead id already exists: {}",
                lead.id
            )));
        }
        inner.leads.push(lead.clone());
        self.persist_leads(&inner)?;
        Ok(lead)
    }

    /// Fetch a snapshot of one lead.
    pub async fn get(&self, id: &str) -> Result<Lead> {
        let inner = self.inner.lock().await;
        inner
            .leads
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or_else(|| LeadPilotError::unknown_lead(id))
    }

    /// List leads matching the filter. Safe to call concurrently with
    /// patches: the result is a snapshot taken under the lock.
    pub async fn list(&self, filter: &LeadFilter) -> Vec<Lead> {
        let inner = self.inner.lock().await;
        inner
            .leads
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect()
    }

    /// Apply a merged update to one lead as a single unit, then durably
    /// write before returning the post-patch snapshot.
    pub async fn patch(&self, id: &str, patch: &LeadPatch) -> Result<Lead> {
        let mut inner = self.inner.lock().await;
        let lead = inner
            .leads
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| LeadPilotError::unknown_lead(id))?;
        patch.apply(lead);
        lead.last_activity = Some(chrono::Utc::now());
        let snapshot = lead.clone();
        self.persist_leads(&inner)?;
        Ok(snapshot)
    }

    /// Soft-delete: move the lead into the archive collection.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let pos = inner
            .leads
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| LeadPilotError::unknown_lead(id))?;
        let lead = inner.leads.remove(pos);
        inner.deleted.push(lead);
        self.persist_leads(&inner)?;
        persist::write_json(&self.dir.join("deleted_leads.json"), &inner.deleted)?;
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.leads.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of the soft-delete archive.
    pub async fn archived(&self) -> Vec<Lead> {
        self.inner.lock().await.deleted.clone()
    }

    fn persist_leads(&self, inner: &Inner) -> Result<()> {
        persist::write_json(&self.dir.join("leads.json"), &inner.leads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadpilot_core::types::{PhoneStatus, Strategy};

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        dir
    }

    #[tokio::test]
    async fn test_create_get_patch() {
        let dir = scratch("leadpilot-store-crud");
        let store = LeadStore::open(&dir);

        store
            .create(Lead::new("L1", "Corner Cafe", "905551112233"))
            .await
            .unwrap();
        let lead = store.get("L1").await.unwrap();
        assert_eq!(lead.name, "Corner Cafe");
        assert_eq!(lead.phone_status, PhoneStatus::Empty);

        let patch = LeadPatch {
            phone_status: Some(PhoneStatus::Requested),
            strategy: Some(Strategy::C),
            ..Default::default()
        };
        let updated = store.patch("L1", &patch).await.unwrap();
        assert_eq!(updated.phone_status, PhoneStatus::Requested);
        assert_eq!(updated.strategy, Strategy::C);
        assert!(updated.last_activity.is_some());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let dir = scratch("leadpilot-store-dup");
        let store = LeadStore::open(&dir);
        store
            .create(Lead::new("L1", "A", "905551112233"))
            .await
            .unwrap();
        let err = store
            .create(Lead::new("L1", "B", "905559998877"))
            .await
            .unwrap_err();
        assert!(matches!(err, LeadPilotError::Validation(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_patch_unknown_lead_is_validation_error() {
        let dir = scratch("leadpilot-store-unknown");
        let store = LeadStore::open(&dir);
        let err = store.patch("nope", &LeadPatch::default()).await.unwrap_err();
        assert!(matches!(err, LeadPilotError::Validation(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_soft_delete_archives() {
        let dir = scratch("leadpilot-store-delete");
        let store = LeadStore::open(&dir);
        store
            .create(Lead::new("L1", "Corner Cafe", "905551112233"))
            .await
            .unwrap();
        store.delete("L1").await.unwrap();

        assert!(store.get("L1").await.is_err());
        let archived = store.archived().await;
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].id, "L1");

        // Archive survives a reopen.
        drop(store);
        let reopened = LeadStore::open(&dir);
        assert_eq!(reopened.archived().await.len(), 1);
        assert_eq!(reopened.len().await, 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_list_filters() {
        let dir = scratch("leadpilot-store-filter");
        let store = LeadStore::open(&dir);

        let mut a = Lead::new("L1", "A", "905551112233");
        a.channel_status = ChannelStatus::Interested;
        let mut b = Lead::new("L2", "B", "905559998877");
        b.service_tag = Some("needs follow-up".into());
        store.create(a).await.unwrap();
        store.create(b).await.unwrap();

        let interested = store
            .list(&LeadFilter {
                channel_status: Some(ChannelStatus::Interested),
                ..Default::default()
            })
            .await;
        assert_eq!(interested.len(), 1);
        assert_eq!(interested[0].id, "L1");

        let tagged = store
            .list(&LeadFilter {
                service_tag: Some("needs follow-up".into()),
                ..Default::default()
            })
            .await;
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].id, "L2");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = scratch("leadpilot-store-reopen");
        {
            let store = LeadStore::open(&dir);
            store
                .create(Lead::new("L1", "Corner Cafe", "905551112233"))
                .await
                .unwrap();
        }
        let store = LeadStore::open(&dir);
        assert_eq!(store.len().await, 1);
        std::fs::remove_dir_all(&dir).ok();
    }
}

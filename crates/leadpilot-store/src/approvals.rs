//! Pending approval queue.
//!
//! When manual approval is on, proposed messages park here until a human
//! resolves them. Resolution removes the entry in the same operation that
//! hands it back, so an approval can never be acted on twice.

use crate::persist;
use leadpilot_core::error::{LeadPilotError, Result};
use leadpilot_core::types::PendingApproval;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

pub struct ApprovalBook {
    path: PathBuf,
    pending: Mutex<Vec<PendingApproval>>,
}

impl ApprovalBook {
    pub fn open(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        let path = dir.join("pending_approvals.json");
        let pending: Vec<PendingApproval> = persist::read_json_or_default(&path);
        Self {
            path,
            pending: Mutex::new(pending),
        }
    }

    /// Park a proposal. An older unresolved proposal for the same lead is
    /// superseded and dropped.
    pub async fn add(&self, approval: PendingApproval) -> Result<()> {
        let mut pending = self.pending.lock().await;
        pending.retain(|p| p.lead_id != approval.lead_id);
        debug!("📋 Approval queued for lead {}", approval.lead_id);
        pending.push(approval);
        persist::write_json(&self.path, &*pending)
    }

    pub async fn list(&self) -> Vec<PendingApproval> {
        self.pending.lock().await.clone()
    }

    /// Remove and return an approval by id. Any other stale entries for the
    /// same lead go with it.
    pub async fn take(&self, id: &str) -> Result<PendingApproval> {
        let mut pending = self.pending.lock().await;
        let pos = pending
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| LeadPilotError::Invariant(format!("no pending approval with id {id}")))?;
        let taken = pending.remove(pos);
        pending.retain(|p| p.lead_id != taken.lead_id);
        persist::write_json(&self.path, &*pending)?;
        Ok(taken)
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadpilot_core::types::ApprovalKind;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        dir
    }

    #[tokio::test]
    async fn test_take_removes_entry() {
        let dir = scratch("leadpilot-approvals-take");
        let book = ApprovalBook::open(&dir);
        let a = PendingApproval::new("L1", "hello there", ApprovalKind::Outbound, None);
        let id = a.id.clone();
        book.add(a).await.unwrap();
        assert_eq!(book.len().await, 1);

        let taken = book.take(&id).await.unwrap();
        assert_eq!(taken.lead_id, "L1");
        assert!(book.is_empty().await);

        // Taking again is an invariant violation, not a silent no-op.
        assert!(book.take(&id).await.is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_newer_proposal_supersedes_older() {
        let dir = scratch("leadpilot-approvals-supersede");
        let book = ApprovalBook::open(&dir);
        book.add(PendingApproval::new("L1", "v1", ApprovalKind::Outbound, None))
            .await
            .unwrap();
        book.add(PendingApproval::new("L1", "v2", ApprovalKind::Outbound, None))
            .await
            .unwrap();
        let pending = book.list().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].proposed_text, "v2");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = scratch("leadpilot-approvals-reopen");
        {
            let book = ApprovalBook::open(&dir);
            book.add(PendingApproval::new("L1", "hi", ApprovalKind::Reply, Some("who is this?".into())))
                .await
                .unwrap();
        }
        let book = ApprovalBook::open(&dir);
        let pending = book.list().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].last_incoming.as_deref(), Some("who is this?"));
        std::fs::remove_dir_all(&dir).ok();
    }
}

//! # LeadPilot Store
//!
//! File-backed persistence for everything the engine mutates: the lead
//! collection (plus its soft-delete archive), the pending-approval queue,
//! the append-only send journal, and the learning-example log.
//!
//! There is no transactional database underneath, so consistency is
//! engineered at this boundary:
//! - every mutation goes through a single async mutex per collection;
//! - a patch is applied as one merged unit and durably written (temp file +
//!   rename) before the caller is told it succeeded;
//! - readers receive cloned snapshots, never a torn record.

pub mod approvals;
pub mod journal;
pub mod learning;
pub mod persist;
pub mod store;

pub use approvals::ApprovalBook;
pub use journal::SendJournal;
pub use learning::LearningLog;
pub use store::{LeadFilter, LeadStore};

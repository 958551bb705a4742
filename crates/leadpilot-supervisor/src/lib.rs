//! Bot process supervisor.
//!
//! Lifecycle over a pid file: `status` probes liveness, `start` launches
//! the bot detached (idempotent when it already runs), `stop` kills the
//! tracked pid plus any orphans matching the launch command. A stale pid
//! file self-heals on the next status probe.

pub mod supervisor;

pub use supervisor::{BotStatus, BotSupervisor, PidRecord};

//! Pid-file process lifecycle.

use chrono::{DateTime, Utc};
use leadpilot_core::config::BridgeConfig;
use leadpilot_core::error::{LeadPilotError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{info, warn};

/// Contents of `bot.pid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidRecord {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub command: String,
}

/// Snapshot returned by `status()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
}

impl BotStatus {
    fn stopped() -> Self {
        Self {
            running: false,
            pid: None,
            started_at: None,
        }
    }
}

pub struct BotSupervisor {
    data_dir: PathBuf,
    command: String,
    args: Vec<String>,
    /// Substring matched against full command lines when hunting orphans.
    match_pattern: String,
    bridge: Option<BridgeConfig>,
}

impl BotSupervisor {
    pub fn new(data_dir: impl Into<PathBuf>, command: impl Into<String>, args: Vec<String>) -> Self {
        let command = command.into();
        Self {
            data_dir: data_dir.into(),
            match_pattern: command.clone(),
            command,
            args,
            bridge: None,
        }
    }

    /// Override the orphan-hunt pattern (defaults to the launch command).
    pub fn with_match_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.match_pattern = pattern.into();
        self
    }

    /// Enable best-effort bridge container bring-up on `start()`.
    pub fn with_bridge(mut self, bridge: BridgeConfig) -> Self {
        self.bridge = Some(bridge);
        self
    }

    fn pid_path(&self) -> PathBuf {
        self.data_dir.join("bot.pid")
    }

    /// Probe the tracked process. A pid file pointing at a dead process is
    /// removed so the next `start()` proceeds cleanly.
    pub fn status(&self) -> BotStatus {
        let record = match self.read_pid_file() {
            Some(r) => r,
            None => return BotStatus::stopped(),
        };
        if process_alive(record.pid) {
            BotStatus {
                running: true,
                pid: Some(record.pid),
                started_at: Some(record.started_at),
            }
        } else {
            warn!("Stale pid file (pid {} is gone), clearing", record.pid);
            std::fs::remove_file(self.pid_path()).ok();
            BotStatus::stopped()
        }
    }

    /// Launch the bot detached. Returns the existing pid unchanged when the
    /// bot already runs.
    pub fn start(&self) -> Result<u32> {
        if let BotStatus {
            running: true,
            pid: Some(pid),
            ..
        } = self.status()
        {
            info!("Bot already running (pid={pid})");
            return Ok(pid);
        }

        if let Some(bridge) = &self.bridge {
            bring_up_bridge(bridge);
        }

        std::fs::create_dir_all(&self.data_dir)?;
        let child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                LeadPilotError::Dependency(format!("failed to launch {}: {e}", self.command))
            })?;

        let pid = child.id();
        let record = PidRecord {
            pid,
            started_at: Utc::now(),
            command: self.command.clone(),
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| LeadPilotError::Storage(format!("pid record serialize failed: {e}")))?;
        std::fs::write(self.pid_path(), json)?;

        info!("🚀 Bot started (pid={pid})");
        Ok(pid)
    }

    /// Kill the tracked process and any command-line-matched orphans, then
    /// clear the pid file. Succeeds even when nothing was running.
    pub fn stop(&self) -> Result<()> {
        if let Some(record) = self.read_pid_file() {
            Command::new("kill").arg(record.pid.to_string()).output().ok();
            info!("⏹ Bot stopped (pid={})", record.pid);
        }

        for pid in self.matching_orphans() {
            Command::new("kill").arg(pid.to_string()).output().ok();
            info!("⏹ Killed orphan process (pid={pid})");
        }

        std::fs::remove_file(self.pid_path()).ok();
        Ok(())
    }

    fn read_pid_file(&self) -> Option<PidRecord> {
        let content = std::fs::read_to_string(self.pid_path()).ok()?;
        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Unreadable pid file, clearing: {e}");
                std::fs::remove_file(self.pid_path()).ok();
                None
            }
        }
    }

    /// Processes whose command line matches the launch pattern, excluding
    /// ourselves.
    fn matching_orphans(&self) -> Vec<u32> {
        let output = match Command::new("pgrep")
            .args(["-f", &self.match_pattern])
            .output()
        {
            Ok(o) => o,
            Err(_) => return Vec::new(),
        };
        let own = std::process::id();
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| line.trim().parse::<u32>().ok())
            .filter(|pid| *pid != own)
            .collect()
    }
}

/// `kill -0` liveness probe.
fn process_alive(pid: u32) -> bool {
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// `docker start` an existing bridge container, or `docker run` a fresh one,
/// detached. Failures are logged and ignored: the bot degrades to manual
/// send links when the bridge stays down.
fn bring_up_bridge(bridge: &BridgeConfig) {
    let started = Command::new("docker")
        .args(["start", &bridge.container])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if started {
        info!("📱 Bridge container '{}' started", bridge.container);
        return;
    }

    let port = bridge
        .base_url
        .rsplit(':')
        .next()
        .and_then(|p| p.trim_end_matches('/').parse::<u16>().ok())
        .unwrap_or(3000);
    let ran = Command::new("docker")
        .args([
            "run",
            "-d",
            "--name",
            &bridge.container,
            "-p",
            &format!("{port}:3000"),
            "devlikeapro/waha",
        ])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if ran {
        info!("📱 Bridge container '{}' launched", bridge.container);
    } else {
        warn!("Bridge container bring-up failed; continuing without it");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        dir
    }

    fn write_pid(dir: &Path, pid: u32) {
        let record = PidRecord {
            pid,
            started_at: Utc::now(),
            command: "leadpilot-test-nonexistent".into(),
        };
        std::fs::write(
            dir.join("bot.pid"),
            serde_json::to_string(&record).unwrap(),
        )
        .unwrap();
    }

    fn supervisor(dir: &Path) -> BotSupervisor {
        BotSupervisor::new(dir, "leadpilot-test-nonexistent", vec![])
            .with_match_pattern("leadpilot-test-nonexistent-pattern")
    }

    #[test]
    fn test_status_without_pid_file_is_stopped() {
        let dir = scratch("leadpilot-super-none");
        let status = supervisor(&dir).status();
        assert!(!status.running);
        assert!(status.pid.is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_stale_pid_self_heals() {
        let dir = scratch("leadpilot-super-stale");
        // A pid far above any real pid space, guaranteed dead.
        write_pid(&dir, 2_000_000_000);

        let sup = supervisor(&dir);
        let status = sup.status();
        assert!(!status.running);
        assert!(!dir.join("bot.pid").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_stop_after_process_died_still_reports_stopped() {
        let dir = scratch("leadpilot-super-stop");
        write_pid(&dir, 2_000_000_000);

        let sup = supervisor(&dir);
        sup.stop().unwrap();
        assert!(!dir.join("bot.pid").exists());
        assert!(!sup.status().running);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_start_is_idempotent_for_live_pid() {
        let dir = scratch("leadpilot-super-idem");
        // Track the test process itself: definitely alive.
        write_pid(&dir, std::process::id());

        let sup = supervisor(&dir);
        let pid = sup.start().unwrap();
        assert_eq!(pid, std::process::id());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_pid_file_clears() {
        let dir = scratch("leadpilot-super-corrupt");
        std::fs::write(dir.join("bot.pid"), "not json").unwrap();

        let sup = supervisor(&dir);
        assert!(!sup.status().running);
        assert!(!dir.join("bot.pid").exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}

//! # LeadPilot — Lead Outreach Engine
//!
//! Autonomous WhatsApp outreach over a lead funnel: status tracking,
//! strategy-based message composition, throttled dispatch, and an optional
//! human approval gate.
//!
//! Usage:
//!   leadpilot status                 # Bot + bridge + funnel snapshot
//!   leadpilot start                  # Launch the bot detached
//!   leadpilot stop                   # Stop the bot and orphans
//!   leadpilot run                    # Run the outreach loop in foreground
//!   leadpilot settings show          # Print current settings
//!   leadpilot settings set KEY VALUE # Update one setting
//!   leadpilot approvals list         # Show proposals awaiting review
//!   leadpilot approvals approve ID   # Send a proposal as-is
//!   leadpilot approvals edit ID TEXT # Send your rewrite instead
//!   leadpilot approvals skip ID      # Discard without sending

use anyhow::Result;
use clap::{Parser, Subcommand};
use leadpilot_bridge::{BridgeClient, SessionState, TextGenClient};
use leadpilot_core::config::BotSettings;
use leadpilot_core::error::LeadPilotError;
use leadpilot_core::types::{
    ApprovalKind, ChannelStatus, ChannelType, Lead, MessageFlow, PhoneStatus, TwoStepState,
};
use leadpilot_engine::{
    ApprovalGate, Composer, DispatchController, DispatchOutcome, Funnel, StatusEngine, Telemetry,
};
use leadpilot_store::{ApprovalBook, LeadFilter, LeadStore, LearningLog, SendJournal};
use leadpilot_supervisor::BotSupervisor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "leadpilot", version, about = "🎯 LeadPilot — Lead Outreach Engine")]
struct Cli {
    /// Settings file (defaults to ~/.leadpilot/settings.toml)
    #[arg(long)]
    settings: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show bot, bridge, and funnel status
    Status,
    /// Launch the bot process detached
    Start,
    /// Stop the bot process (and matching orphans)
    Stop,
    /// Run the outreach loop in the foreground
    Run,
    /// Inspect or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Review and resolve pending message proposals
    Approvals {
        #[command(subcommand)]
        action: ApprovalsAction,
    },
}

#[derive(Subcommand)]
enum ApprovalsAction {
    /// List proposals awaiting review
    List,
    /// Approve a proposal and send it unchanged
    Approve { id: String },
    /// Rewrite a proposal, send the edit, and record the correction
    Edit {
        id: String,
        text: String,
        /// Why the original needed changing
        #[arg(long, default_value = "")]
        rationale: String,
    },
    /// Discard a proposal without sending anything
    Skip { id: String },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings
    Show,
    /// Update one setting and persist it
    Set { key: String, value: String },
}

fn load_settings(cli: &Cli) -> Result<BotSettings> {
    match &cli.settings {
        Some(path) => {
            let expanded = shellexpand::tilde(path).to_string();
            Ok(BotSettings::load_from(std::path::Path::new(&expanded))?)
        }
        None => Ok(BotSettings::load()?),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "leadpilot=debug"
    } else {
        "leadpilot=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let settings = load_settings(&cli)?;

    match &cli.command {
        Command::Status => status(&settings).await,
        Command::Start => start(&settings),
        Command::Stop => stop(&settings),
        Command::Run => run(settings, &cli).await,
        Command::Settings { action } => settings_cmd(settings, action),
        Command::Approvals { action } => approvals_cmd(&settings, action).await,
    }
}

fn gate_for(settings: &BotSettings) -> ApprovalGate {
    let data_dir = settings.data_path();
    let store = Arc::new(LeadStore::open(&data_dir));
    let book = Arc::new(ApprovalBook::open(&data_dir));
    let learning = Arc::new(LearningLog::open(&data_dir));
    let journal = Arc::new(SendJournal::open(&data_dir));
    let telemetry = Arc::new(Telemetry::open(&data_dir));
    let bridge = Arc::new(BridgeClient::new(settings.bridge.clone()));
    ApprovalGate::new(store, book, learning, journal, telemetry, bridge)
}

async fn approvals_cmd(settings: &BotSettings, action: &ApprovalsAction) -> Result<()> {
    let gate = gate_for(settings);
    match action {
        ApprovalsAction::List => {
            let pending = gate.pending().await;
            if pending.is_empty() {
                println!("📋 No proposals awaiting review");
            }
            for p in pending {
                println!("📋 {} (lead {}, {:?})", p.id, p.lead_id, p.kind);
                if let Some(incoming) = &p.last_incoming {
                    println!("   ⬅️ {incoming}");
                }
                println!("   ➡️ {}", p.proposed_text);
            }
        }
        ApprovalsAction::Approve { id } => {
            let lead = gate.approve(id, settings).await?;
            println!("✅ Sent to {} ({})", lead.name, lead.phone);
        }
        ApprovalsAction::Edit { id, text, rationale } => {
            let lead = gate.edit_approve(id, text, rationale, settings).await?;
            println!("✏️ Sent edited message to {} ({})", lead.name, lead.phone);
        }
        ApprovalsAction::Skip { id } => {
            let lead = gate.skip(id).await?;
            println!("⏭️ Skipped {}", lead.name);
        }
    }
    Ok(())
}

fn supervisor(settings: &BotSettings) -> BotSupervisor {
    let bin = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "leadpilot".into());
    BotSupervisor::new(settings.data_path(), bin, vec!["run".into()])
        .with_match_pattern("leadpilot run")
        .with_bridge(settings.bridge.clone())
}

async fn status(settings: &BotSettings) -> Result<()> {
    let bot = supervisor(settings).status();
    let bridge = BridgeClient::new(settings.bridge.clone());
    let session = bridge.session_status().await;

    let data_dir = settings.data_path();
    let store = LeadStore::open(&data_dir);
    let journal = SendJournal::open(&data_dir);
    let leads = store.list(&LeadFilter::default()).await;
    let funnel = Funnel::compute(&leads);

    println!("🎯 LeadPilot v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "   🤖 Bot:      {}",
        match bot.pid {
            Some(pid) if bot.running => format!("running (pid {pid})"),
            _ => "stopped".into(),
        }
    );
    println!(
        "   📱 Bridge:   {}",
        match session {
            SessionState::Connected => "connected",
            SessionState::AwaitingQr => "awaiting QR pairing",
            SessionState::Down => "down",
        }
    );
    if session == SessionState::AwaitingQr
        && let Ok(Some(qr)) = bridge.qr_fetch().await
    {
        println!("   🔗 QR:       {qr}");
    }
    println!(
        "   📊 Funnel:   {} leads, {} contacted, {} interested, {} converted",
        funnel.total, funnel.contacted, funnel.interested, funnel.converted
    );
    println!(
        "   📤 Today:    {}/{} sends",
        journal.sent_today().await,
        settings.daily_cap
    );
    println!(
        "   🔒 Security: {}",
        if settings.security_lock { "locked to allow-list" } else { "open" }
    );
    Ok(())
}

fn start(settings: &BotSettings) -> Result<()> {
    let mut settings = settings.clone();
    settings.running = true;
    settings.save()?;

    let pid = supervisor(&settings).start()?;
    println!("🚀 Bot running (pid {pid})");
    Ok(())
}

fn stop(settings: &BotSettings) -> Result<()> {
    supervisor(settings).stop()?;
    let mut settings = settings.clone();
    settings.running = false;
    settings.save()?;
    println!("⏹ Bot stopped");
    Ok(())
}

fn settings_cmd(mut settings: BotSettings, action: &SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Set { key, value } => {
            apply_setting(&mut settings, key, value)?;
            settings.save()?;
            println!("✅ {key} = {value}");
        }
    }
    Ok(())
}

fn apply_setting(settings: &mut BotSettings, key: &str, value: &str) -> Result<()> {
    fn parse_bool(v: &str) -> Result<bool> {
        match v {
            "true" | "on" | "1" => Ok(true),
            "false" | "off" | "0" => Ok(false),
            other => anyhow::bail!("expected true/false, got '{other}'"),
        }
    }

    match key {
        "running" => settings.running = parse_bool(value)?,
        "test_mode" => settings.test_mode = parse_bool(value)?,
        "test_phone" => settings.test_phone = value.to_string(),
        "send_interval_secs" => settings.send_interval_secs = value.parse()?,
        "inbound_enabled" => settings.inbound_enabled = parse_bool(value)?,
        "outbound_enabled" => settings.outbound_enabled = parse_bool(value)?,
        "security_lock" => settings.security_lock = parse_bool(value)?,
        "daily_cap" => settings.daily_cap = value.parse()?,
        "per_message_delay_secs" => settings.per_message_delay_secs = value.parse()?,
        "manual_approval" => settings.manual_approval = parse_bool(value)?,
        "allowed_phones" => {
            settings.allowed_phones = value
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }
        other => anyhow::bail!("unknown setting '{other}'"),
    }
    Ok(())
}

/// The next lead eligible for an autonomous outbound message: fresh leads
/// not yet contacted, plus two-step leads waiting on their main message.
/// Leads an operator skipped stay out of the queue.
fn next_candidate(leads: &[Lead]) -> Option<&Lead> {
    leads.iter().find(|lead| {
        if lead.phone.trim().is_empty() || lead.channel != ChannelType::WhatsApp {
            return false;
        }
        if lead.service_tag.as_deref() == Some("no_reply") {
            return false;
        }
        let fresh = matches!(lead.phone_status, PhoneStatus::Empty | PhoneStatus::NotSent)
            && lead.channel_status == ChannelStatus::NotSent;
        let awaiting_main =
            lead.flow == MessageFlow::TwoStep && lead.two_step == TwoStepState::GreetingSent;
        fresh || awaiting_main
    })
}

async fn run(mut settings: BotSettings, cli: &Cli) -> Result<()> {
    let data_dir = settings.data_path();
    std::fs::create_dir_all(&data_dir)?;

    let store = Arc::new(LeadStore::open(&data_dir));
    let journal = Arc::new(SendJournal::open(&data_dir));
    let book = Arc::new(ApprovalBook::open(&data_dir));
    let learning = Arc::new(LearningLog::open(&data_dir));
    let telemetry = Arc::new(Telemetry::open(&data_dir));
    let status_engine = Arc::new(StatusEngine::new(store.clone(), telemetry.clone()));
    let composer = Composer::new(TextGenClient::new(settings.textgen.clone()));
    let bridge = Arc::new(BridgeClient::new(settings.bridge.clone()));

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("🛑 Shutdown requested");
            stop_tx.send(true).ok();
        }
    });

    let controller = DispatchController::new(
        store.clone(),
        journal.clone(),
        status_engine.clone(),
        telemetry.clone(),
        bridge.clone(),
        stop_rx.clone(),
    );
    let gate = ApprovalGate::new(
        store.clone(),
        book.clone(),
        learning.clone(),
        journal.clone(),
        telemetry.clone(),
        bridge.clone(),
    );

    println!("🎯 LeadPilot loop started (interval {}s)", settings.send_interval_secs);
    if bridge.session_status().await == SessionState::Down {
        bridge.session_start().await.ok();
    }

    let mut stop = stop_rx.clone();
    loop {
        if *stop.borrow() {
            break;
        }

        // Settings are the single-writer document; pick up operator changes
        // every cycle.
        settings = load_settings(cli).unwrap_or(settings);

        if settings.running && settings.outbound_enabled {
            let leads = store.list(&LeadFilter::default()).await;
            if let Some(lead) = next_candidate(&leads) {
                let lead_id = lead.id.clone();
                let composed = composer.compose(lead).await;

                if settings.manual_approval {
                    let already_pending =
                        book.list().await.iter().any(|p| p.lead_id == lead_id);
                    if !already_pending {
                        gate.propose(&settings, &lead_id, &composed.text, ApprovalKind::Outbound, None)
                            .await?;
                    }
                } else {
                    match controller.dispatch(&settings, &lead_id, &composed).await {
                        Ok(DispatchOutcome::Sent(event)) => {
                            tracing::info!("📤 Sent to lead {lead_id} ({:?})", event.kind);
                        }
                        Ok(DispatchOutcome::Deferred { open_hour }) => {
                            tracing::info!("⏸️ Waiting for business hours ({open_hour}:00)");
                        }
                        Ok(DispatchOutcome::Cancelled) => break,
                        Err(LeadPilotError::Safety(reason)) => {
                            tracing::info!("🚫 {reason}");
                        }
                        Err(e) if e.is_degradable() => {
                            let lead = store.get(&lead_id).await?;
                            tracing::warn!(
                                "📵 Bridge unavailable; manual link: {}",
                                BridgeClient::manual_link(&lead.phone, &composed.text)
                            );
                        }
                        Err(e) => tracing::error!("Dispatch failed for {lead_id}: {e}"),
                    }
                }
            }

            let leads = store.list(&LeadFilter::default()).await;
            let funnel = Funnel::compute(&leads);
            let stats = serde_json::json!({
                "funnel": funnel,
                "sent_today": journal.sent_today().await,
                "pending_approvals": book.len().await,
            });
            std::fs::write(
                data_dir.join("stats.json"),
                serde_json::to_string_pretty(&stats)?,
            )?;
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(settings.send_interval_secs)) => {}
            _ = stop.changed() => break,
        }
    }

    println!("⏹ LeadPilot loop stopped");
    Ok(())
}

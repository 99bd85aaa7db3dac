//! Run report generation.
//!
//! Every outcome of a convergence run (per-instance start and stop results,
//! both probing rounds, preflight checks, the cleanup summary) lands in a
//! [`RunReport`], rendered as text for the console and optionally as JSON.

use crate::cleanup::CleanupSummary;
use crate::instance::LifecycleState;
use crate::preflight::PreflightCheck;
use crate::probe::ProbeOutcome;
use crate::timing::Phase;
use chrono::{DateTime, Utc};
use color_eyre::eyre::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Everything observed during one orchestrated run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub preflight: Vec<PreflightCheck>,
    pub instances: Vec<InstanceReport>,
    pub rounds: Vec<ProbeRound>,
    pub interrupted: bool,
    /// `None` when the manager had already been cleaned up by its owner
    pub cleanup: Option<CleanupSummary>,
    pub timeline: Vec<TimelineEntry>,
}

/// Per-instance results
#[derive(Debug, Clone, Serialize)]
pub struct InstanceReport {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub config_path: PathBuf,
    pub log_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<String>,
    pub final_state: LifecycleState,
}

/// One snapshot of every instance's status
#[derive(Debug, Clone, Serialize)]
pub struct ProbeRound {
    pub label: String,
    pub results: Vec<ProbeResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub instance: String,
    pub outcome: &'static str,
    pub status: String,
}

impl ProbeResult {
    pub fn new(instance: &str, outcome: &ProbeOutcome) -> Self {
        Self {
            instance: instance.to_string(),
            outcome: outcome.kind(),
            status: outcome.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == "reported"
    }
}

/// Ordered events of the run, used to check sequencing after the fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    InstanceStarted { instance: String },
    InstanceFailed { instance: String, error: String },
    WaitFinished { phase: Phase, interrupted: bool },
    ProbeRoundFinished { label: String },
    InstanceStopped { instance: String },
    CleanupFinished,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub offset_ms: u64,
    #[serde(flatten)]
    pub event: RunEvent,
}

/// Collects [`TimelineEntry`] values relative to a fixed origin
#[derive(Debug)]
pub struct Timeline {
    origin: Instant,
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, event: RunEvent) {
        let offset_ms = self.origin.elapsed().as_millis() as u64;
        self.entries.push(TimelineEntry { offset_ms, event });
    }

    pub fn into_entries(self) -> Vec<TimelineEntry> {
        self.entries
    }
}

impl RunReport {
    /// Offset of the first matching event, in milliseconds
    pub fn offset_of(&self, event: &RunEvent) -> Option<u64> {
        self.timeline.iter().find(|e| &e.event == event).map(|e| e.offset_ms)
    }

    /// Names of instances whose start failed
    pub fn failed_instances(&self) -> Vec<&str> {
        self.instances
            .iter()
            .filter(|i| i.start_error.is_some())
            .map(|i| i.name.as_str())
            .collect()
    }
}

/// Render the human-readable report
pub fn render_text(report: &RunReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push("=".repeat(60));
    lines.push("              RIP ROUTER CONVERGENCE TEST".to_string());
    lines.push("=".repeat(60));
    lines.push(format!("Started: {}", report.started_at.to_rfc3339()));
    lines.push(String::new());

    if !report.preflight.is_empty() {
        lines.push("Preflight:".to_string());
        for check in &report.preflight {
            let mark = if check.passed { "PASS" } else { "FAIL" };
            lines.push(format!("  [{}] {}: {}", mark, check.name, check.detail));
        }
        lines.push(String::new());
    }

    lines.push("Instances:".to_string());
    for instance in &report.instances {
        lines.push(format!(
            "  {} ({}:{}) -> {}",
            instance.name, instance.address, instance.port, instance.final_state
        ));
        if let Some(error) = &instance.start_error {
            lines.push(format!("    start failed: {}", error));
        }
        if let Some(stop) = &instance.stop {
            lines.push(format!("    stop: {}", stop));
        }
    }
    let failed = report.failed_instances();
    if !failed.is_empty() {
        lines.push(format!(
            "  {} of {} routers failed to start: {}",
            failed.len(),
            report.instances.len(),
            failed.join(", ")
        ));
    }
    lines.push(String::new());

    for round in &report.rounds {
        lines.push(format!("Status report ({}):", round.label));
        for result in &round.results {
            lines.push(format!("  {} [{}]", result.instance, result.outcome));
            for text in result.status.lines() {
                lines.push(format!("    {}", text));
            }
        }
        lines.push(String::new());
    }

    if report.interrupted {
        lines.push("Run was interrupted before completion.".to_string());
    }

    match &report.cleanup {
        Some(summary) => {
            lines.push(format!(
                "Cleanup: {} removed, {} already absent, {} failed",
                summary.removed.len(),
                summary.missing.len(),
                summary.failed.len()
            ));
            for failure in &summary.failed {
                lines.push(format!("  could not remove {}: {}", failure.path.display(), failure.reason));
            }
        }
        None => lines.push("Cleanup: already performed before the run finished".to_string()),
    }

    lines.join("\n")
}

/// Write the report as pretty JSON
pub fn write_json_report(report: &RunReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

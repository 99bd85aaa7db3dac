//! # RipHarness - Convergence test harness for RIP router processes
//!
//! This library launches several instances of an external RIP router
//! executable, observes them while the routing protocol converges, and tears
//! everything down again. It never implements routing itself: the router is
//! driven only through its command-line contract (`start`, `status`,
//! `configure`, `test`).
//!
//! ## Overview
//!
//! A run goes through fixed, time-bounded steps on a single control thread:
//!
//! - **Configure**: one JSON config file per router, written atomically
//! - **Start**: routers launched in order, separated by a stagger interval
//! - **Settle**: fixed wait, then a first status round
//! - **Converge**: fixed wait, then a second status round
//! - **Stop**: termination request per router, escalating to a kill
//! - **Cleanup**: every generated config and log removed, exactly once
//!
//! Convergence is observed through the two snapshots, never detected.
//!
//! ## Architecture
//!
//! - `descriptor`: router configuration document and its invariants
//! - `generator`: atomic config file writes
//! - `process`: router command lines, supervised subprocesses, output capture
//! - `probe`: bounded `status` queries with sentinel outcomes
//! - `instance`: per-router lifecycle state machine
//! - `timing`: named timed waits, the interrupt token and its signal hook
//! - `cleanup`: one-shot artifact removal
//! - `orchestrator`: the end-to-end run
//! - `preflight`: one-shot `configure` / `test` checks
//! - `report`: text and JSON run reports
//! - `config`: harness YAML configuration
//! - `utils`: duration parsing, instance set validation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use rip_harness::cleanup::CleanupManager;
//! use rip_harness::config::load_config;
//! use rip_harness::orchestrator::Orchestrator;
//! use rip_harness::report::render_text;
//! use rip_harness::timing::Interrupt;
//!
//! let config = load_config("harness.yaml".as_ref())?;
//! let orchestrator = Orchestrator::new(config, CleanupManager::new(), Interrupt::new())?;
//! let report = orchestrator.run();
//! println!("{}", render_text(&report));
//! # Ok::<(), color_eyre::Report>(())
//! ```
//!
//! ## Error Handling
//!
//! Module errors are `thiserror` enums. Only an invalid instance set is
//! fatal; everything scoped to one router (config write, spawn, status
//! query) is reported in the [`report::RunReport`]. The binary uses
//! `color_eyre` for top-level reporting.

pub mod cleanup;
pub mod config;
pub mod descriptor;
pub mod generator;
pub mod instance;
pub mod orchestrator;
pub mod preflight;
pub mod probe;
pub mod process;
pub mod report;
pub mod timing;
pub mod utils;

//! Convergence run orchestrator.
//!
//! This module coordinates the end-to-end test over a fixed set of router
//! instances, on a single control thread:
//!
//! 1. Build the instance set (fatal on duplicate names/ports or bad timers)
//! 2. Start every instance in declaration order, waiting the stagger interval
//!    between starts
//! 3. Wait the settle interval
//! 4. Probe every instance (initial round)
//! 5. Wait the convergence interval
//! 6. Probe every instance again (post-convergence round)
//! 7. Stop every instance
//! 8. Clean up every scratch artifact
//!
//! Failures of a single instance are recorded and the run moves on. An
//! interrupt skips straight to step 7, so routers are always stopped before
//! their files are removed. Cleanup runs exactly once whatever happens,
//! including panics, through a guard that outlives the router processes.

use crate::cleanup::CleanupManager;
use crate::config::HarnessConfig;
use crate::instance::RouterInstance;
use crate::preflight::run_preflight;
use crate::probe::StatusProbe;
use crate::report::{InstanceReport, ProbeResult, ProbeRound, RunEvent, RunReport, Timeline};
use crate::timing::{Interrupt, Phase, TimedBarrier, WaitOutcome};
use crate::utils::validation::ValidationError;
use chrono::Utc;
use log::{info, warn};
use std::path::PathBuf;

/// Label of the probing round taken after the settle wait
pub const INITIAL_ROUND: &str = "initial";
/// Label of the probing round taken after the convergence wait
pub const CONVERGED_ROUND: &str = "post-convergence";

/// A generated router config, as written by a dry run
#[derive(Debug, Clone)]
pub struct RenderedConfig {
    pub instance: String,
    pub path: PathBuf,
    /// File contents, or the reason it could not be written
    pub contents: Result<String, String>,
}

/// Owns the router instances of one run and sequences them
pub struct Orchestrator {
    config: HarnessConfig,
    instances: Vec<RouterInstance>,
    probe: StatusProbe,
    barrier: TimedBarrier,
    cleanup: CleanupManager,
}

impl Orchestrator {
    /// Validate the configuration and build every instance in the `Created` state.
    ///
    /// Nothing is written or spawned here; a validation failure aborts the run.
    pub fn new(config: HarnessConfig, cleanup: CleanupManager, interrupt: Interrupt) -> Result<Self, ValidationError> {
        config.validate()?;

        let instances = config
            .instances
            .iter()
            .map(|spec| {
                RouterInstance::new(
                    &spec.name,
                    &spec.address,
                    spec.port,
                    spec.dir(&config.general.scratch_dir),
                    spec.participates,
                    &config.defaults,
                    config.timing.stop_grace,
                )
            })
            .collect();

        let probe = StatusProbe::new(
            config.router.clone(),
            config.general.working_dir.clone(),
            config.timing.probe_timeout,
        );
        let barrier = TimedBarrier::new(config.timing.clone(), interrupt);

        Ok(Self {
            config,
            instances,
            probe,
            barrier,
            cleanup,
        })
    }

    /// Run `body` with cleanup guaranteed afterwards, even if it panics.
    ///
    /// The guard is created before `this` takes ownership, so on unwind the
    /// instances (and with them every router process) are dropped first and
    /// the guard cleans up once nothing can write to the scratch files.
    fn guarded<T>(self, body: impl FnOnce(&mut Self) -> T) -> T {
        let _guard = self.cleanup.guard();
        let mut this = self;
        body(&mut this)
    }

    fn interrupted(&self) -> bool {
        self.barrier.interrupt().is_triggered()
    }

    fn wait(&self, phase: Phase, timeline: &mut Timeline) -> WaitOutcome {
        let outcome = self.barrier.wait(phase);
        timeline.record(RunEvent::WaitFinished {
            phase,
            interrupted: outcome == WaitOutcome::Interrupted,
        });
        outcome
    }

    fn probe_round(&mut self, label: &str, timeline: &mut Timeline) -> ProbeRound {
        info!("Probing {} routers ({} round)", self.instances.len(), label);
        let mut results = Vec::with_capacity(self.instances.len());
        for instance in self.instances.iter_mut() {
            let outcome = instance.status(&self.probe);
            if outcome.is_ok() {
                info!("{}: {}", instance.name(), outcome);
            } else {
                warn!("{}: {}", instance.name(), outcome);
            }
            results.push(ProbeResult::new(instance.name(), &outcome));
        }
        timeline.record(RunEvent::ProbeRoundFinished {
            label: label.to_string(),
        });
        ProbeRound {
            label: label.to_string(),
            results,
        }
    }

    /// Start every instance, separated by the stagger interval.
    ///
    /// Returns the start error of each instance, in declaration order.
    fn start_all(&mut self, timeline: &mut Timeline) -> Vec<Option<String>> {
        let count = self.instances.len();
        let mut errors = vec![None; count];

        for index in 0..count {
            if self.interrupted() {
                warn!("Interrupted, not starting the remaining {} routers", count - index);
                break;
            }

            let instance = &mut self.instances[index];
            match instance.start(&self.config.router, &self.config.general.working_dir, &self.cleanup) {
                Ok(_) => timeline.record(RunEvent::InstanceStarted {
                    instance: instance.name().to_string(),
                }),
                Err(e) => {
                    warn!("{}", e);
                    timeline.record(RunEvent::InstanceFailed {
                        instance: instance.name().to_string(),
                        error: e.to_string(),
                    });
                    errors[index] = Some(e.to_string());
                }
            }

            if index + 1 < count && self.wait(Phase::Stagger, timeline) == WaitOutcome::Interrupted {
                break;
            }
        }

        errors
    }

    /// Run the whole convergence test and report on it.
    ///
    /// Per-instance failures are part of the report, not errors.
    pub fn run(self) -> RunReport {
        self.guarded(Self::execute)
    }

    fn execute(&mut self) -> RunReport {
        let started_at = Utc::now();
        let mut timeline = Timeline::start();

        let preflight = run_preflight(
            &self.config.router,
            &self.config.general.working_dir,
            &self.config.preflight,
            self.config.timing.probe_timeout,
        );

        info!("Starting convergence test with {} routers", self.instances.len());
        let start_errors = self.start_all(&mut timeline);

        let mut rounds = Vec::new();
        if !self.interrupted() && self.wait(Phase::Settle, &mut timeline) == WaitOutcome::Elapsed {
            rounds.push(self.probe_round(INITIAL_ROUND, &mut timeline));

            if self.wait(Phase::Convergence, &mut timeline) == WaitOutcome::Elapsed {
                rounds.push(self.probe_round(CONVERGED_ROUND, &mut timeline));
            }
        }

        let mut stops = Vec::with_capacity(self.instances.len());
        for instance in self.instances.iter_mut() {
            let outcome = instance.stop();
            if outcome.is_some() {
                timeline.record(RunEvent::InstanceStopped {
                    instance: instance.name().to_string(),
                });
            }
            stops.push(outcome.map(|o| o.to_string()));
        }

        let cleanup = self.cleanup.run();
        timeline.record(RunEvent::CleanupFinished);

        let instances = self
            .instances
            .iter()
            .zip(start_errors)
            .zip(stops)
            .map(|((instance, start_error), stop)| InstanceReport {
                name: instance.name().to_string(),
                address: instance.address().to_string(),
                port: instance.port(),
                config_path: instance.config_path().to_path_buf(),
                log_path: instance.log_path().to_path_buf(),
                pid: instance.pid(),
                start_error,
                stop,
                final_state: instance.state(),
            })
            .collect();

        RunReport {
            started_at,
            preflight,
            instances,
            rounds,
            interrupted: self.interrupted(),
            cleanup,
            timeline: timeline.into_entries(),
        }
    }

    /// Write every router config without starting anything, then clean up.
    pub fn render_configs(self) -> Vec<RenderedConfig> {
        self.guarded(Self::render)
    }

    fn render(&mut self) -> Vec<RenderedConfig> {
        let mut rendered = Vec::with_capacity(self.instances.len());

        for instance in self.instances.iter_mut() {
            let contents = instance
                .configure(&self.cleanup)
                .map_err(|e| e.to_string())
                .and_then(|_| std::fs::read_to_string(instance.config_path()).map_err(|e| e.to_string()));
            rendered.push(RenderedConfig {
                instance: instance.name().to_string(),
                path: instance.config_path().to_path_buf(),
                contents,
            });
        }

        self.cleanup.run();
        rendered
    }
}

use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use rip_harness::cleanup::CleanupManager;
use rip_harness::config::{load_config, HarnessConfig};
use rip_harness::orchestrator::Orchestrator;
use rip_harness::report::{render_text, write_json_report};
use rip_harness::timing::{install_interrupt_hook, Interrupt};
use rip_harness::utils::duration::parse_duration;
use std::path::PathBuf;
use std::time::Duration;

/// Exit code of a run cut short by SIGINT/SIGTERM
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Multi-instance convergence test harness for RIP router processes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the harness configuration YAML file (built-in three-router topology if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write the run report as JSON to this path
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Router project root, used as working directory of every router command
    #[arg(long)]
    router_dir: Option<PathBuf>,

    /// Directory for generated router configs and logs
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Delay between consecutive router starts (e.g. "2s")
    #[arg(long, value_parser = parse_duration)]
    stagger: Option<Duration>,

    /// Wait after the last start before the first status round
    #[arg(long, value_parser = parse_duration)]
    settle: Option<Duration>,

    /// Wait between the two status rounds
    #[arg(long, value_parser = parse_duration)]
    convergence: Option<Duration>,

    /// Upper bound on a single status query
    #[arg(long, value_parser = parse_duration)]
    probe_timeout: Option<Duration>,

    /// Skip the `configure` / `test` preflight checks
    #[arg(long)]
    skip_preflight: bool,

    /// Write and print the router configs, then clean up without starting anything
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    /// Apply command-line overrides on top of the file configuration
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(dir) = &self.router_dir {
            config.general.working_dir = dir.clone();
        }
        if let Some(dir) = &self.scratch_dir {
            config.general.scratch_dir = dir.clone();
        }
        if let Some(d) = self.stagger {
            config.timing.stagger = d;
        }
        if let Some(d) = self.settle {
            config.timing.settle = d;
        }
        if let Some(d) = self.convergence {
            config.timing.convergence = d;
        }
        if let Some(d) = self.probe_timeout {
            config.timing.probe_timeout = d;
        }
        if self.skip_preflight {
            config.preflight.enabled = false;
        }
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => HarnessConfig::default(),
    };
    args.apply(&mut config);

    // Initialize logging, defaulting to the configured level or "info"
    let default_level = config.general.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    info!("Router working directory: {:?}", config.general.working_dir);
    info!("Scratch directory: {:?}", config.general.scratch_dir);

    let cleanup = CleanupManager::new();
    let interrupt = Interrupt::new();
    install_interrupt_hook(interrupt.clone()).wrap_err("Failed to install interrupt handler")?;

    let orchestrator =
        Orchestrator::new(config, cleanup, interrupt).wrap_err("Invalid router instance set, nothing was started")?;

    if args.dry_run {
        for rendered in orchestrator.render_configs() {
            println!("# {} -> {}", rendered.instance, rendered.path.display());
            match rendered.contents {
                Ok(contents) => println!("{}", contents),
                Err(reason) => println!("(not written: {})", reason),
            }
        }
        return Ok(());
    }

    let report = orchestrator.run();
    println!("{}", render_text(&report));

    if let Some(path) = &args.report {
        write_json_report(&report, path)?;
    }

    if report.interrupted {
        std::process::exit(INTERRUPTED_EXIT_CODE);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["rip-harness", "--config", "harness.yaml"]);

        assert_eq!(args.config, Some(PathBuf::from("harness.yaml")));
        assert!(args.report.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn test_timing_overrides() {
        let args = Args::parse_from([
            "rip-harness",
            "--stagger",
            "500ms",
            "--convergence",
            "1m",
            "--router-dir",
            "/root/rust-route",
            "--skip-preflight",
        ]);

        let mut config = HarnessConfig::default();
        args.apply(&mut config);
        assert_eq!(config.timing.stagger, Duration::from_millis(500));
        assert_eq!(config.timing.convergence, Duration::from_secs(60));
        assert_eq!(config.timing.settle, Duration::from_secs(10));
        assert_eq!(config.general.working_dir, PathBuf::from("/root/rust-route"));
        assert!(!config.preflight.enabled);
    }

    #[test]
    fn test_invalid_duration_rejected() {
        assert!(Args::try_parse_from(["rip-harness", "--settle", "soon"]).is_err());
        assert!(Args::try_parse_from(["rip-harness", "--stagger", "307445734561825861m"]).is_err());
    }
}

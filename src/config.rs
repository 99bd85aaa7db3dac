//! Harness configuration.
//!
//! The harness is driven by a YAML file describing the router executable,
//! the timing of the run, the protocol defaults written into every router
//! config and the instances to launch. Every section is optional; an empty
//! file yields the stock three-router topology.

use crate::descriptor::{ConfigurationDescriptor, RouterDefaults};
use crate::preflight::PreflightConfig;
use crate::process::RouterCommand;
use crate::timing::Timing;
use crate::utils::validation::{validate_instance_set, ValidationError};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration structure that mirrors the YAML configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub general: GeneralConfig,
    pub router: RouterCommand,
    pub timing: Timing,
    pub defaults: RouterDefaults,
    pub preflight: PreflightConfig,
    pub instances: Vec<InstanceSpec>,
}

/// General harness settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log filter used when RUST_LOG is not set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// Directory for generated configs and router logs
    pub scratch_dir: PathBuf,
    /// Working directory of every router command (the router project's root)
    pub working_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            scratch_dir: std::env::temp_dir(),
            working_dir: PathBuf::from("."),
        }
    }
}

/// One router instance to launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    /// Router identifier, also the stem of its config and log file names
    pub name: String,
    /// IPv4 address of the simulated interface
    pub address: String,
    /// Transport port of the simulated interface
    pub port: u16,
    /// Overrides `general.scratch_dir` for this instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<PathBuf>,
    /// Whether the instance takes part in routing exchanges
    #[serde(default = "default_participates")]
    pub participates: bool,
}

fn default_participates() -> bool {
    true
}

impl InstanceSpec {
    pub fn new(name: &str, address: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
            port,
            config_dir: None,
            participates: true,
        }
    }

    /// Directory holding this instance's scratch files
    pub fn dir<'a>(&'a self, scratch_dir: &'a Path) -> &'a Path {
        self.config_dir.as_deref().unwrap_or(scratch_dir)
    }
}

/// The stock topology: three routers on one /24, consecutive ports from 5200
pub fn default_instances() -> Vec<InstanceSpec> {
    vec![
        InstanceSpec::new("router-A", "192.168.1.10", 5200),
        InstanceSpec::new("router-B", "192.168.1.20", 5201),
        InstanceSpec::new("router-C", "192.168.1.30", 5202),
    ]
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            router: RouterCommand::default(),
            timing: Timing::default(),
            defaults: RouterDefaults::default(),
            preflight: PreflightConfig::default(),
            instances: default_instances(),
        }
    }
}

impl HarnessConfig {
    /// Validate the instance set and the descriptor every instance will get.
    ///
    /// Any error here is fatal and must be reported before anything is spawned.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_instance_set(&self.instances)?;

        for spec in &self.instances {
            let dir = spec.dir(&self.general.scratch_dir);
            let descriptor = ConfigurationDescriptor::for_instance(
                &spec.name,
                &spec.address,
                spec.port,
                &dir.join(format!("{}.log", spec.name)),
                spec.participates,
                &self.defaults,
            );
            descriptor.validate(spec.participates)?;
        }

        Ok(())
    }
}

/// Load and validate the harness configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<HarnessConfig> {
    info!("Loading harness configuration from: {:?}", config_path);

    let content = std::fs::read_to_string(config_path)
        .wrap_err_with(|| format!("Failed to read harness config '{}'", config_path.display()))?;

    let config: HarnessConfig = if content.trim().is_empty() {
        HarnessConfig::default()
    } else {
        serde_yaml::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse harness config '{}'", config_path.display()))?
    };

    config.validate()?;
    info!("Configuration declares {} router instances", config.instances.len());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorError;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = HarnessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.instances.len(), 3);
        assert_eq!(config.timing.stagger, Duration::from_secs(2));
        assert_eq!(config.router.args, vec!["run", "--"]);
    }

    #[test]
    fn test_load_full_config() {
        let yaml = r#"
general:
  scratch_dir: /var/tmp/harness
  working_dir: /root/rust-route
router:
  program: rust-route
  args: []
  interval: 5
timing:
  stagger: 100ms
  settle: 1s
  convergence: 2s
defaults:
  update_interval: 5
  holddown_timer: 30
  garbage_collection_timer: 60
preflight:
  enabled: false
instances:
  - name: edge-1
    address: 10.0.0.1
    port: 6000
  - name: edge-2
    address: 10.0.0.2
    port: 6001
    config_dir: /var/tmp/edge-2
    participates: false
"#;
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", yaml).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.general.working_dir, PathBuf::from("/root/rust-route"));
        assert_eq!(config.router.program, "rust-route");
        assert_eq!(config.router.interval, Some(5));
        assert!(config.router.verbose);
        assert_eq!(config.timing.stagger, Duration::from_millis(100));
        assert_eq!(config.timing.probe_timeout, Duration::from_secs(10));
        assert_eq!(config.defaults.holddown_timer, 30);
        assert_eq!(config.defaults.max_hop_count, 15);
        assert!(!config.preflight.enabled);
        assert_eq!(config.instances.len(), 2);
        assert!(config.instances[0].participates);
        assert!(!config.instances[1].participates);
        assert_eq!(
            config.instances[1].dir(&config.general.scratch_dir),
            Path::new("/var/tmp/edge-2")
        );
        assert_eq!(
            config.instances[0].dir(&config.general.scratch_dir),
            Path::new("/var/tmp/harness")
        );
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_duplicate_port_is_fatal() {
        let yaml = r#"
instances:
  - { name: router-A, address: 192.168.1.10, port: 5200 }
  - { name: router-B, address: 192.168.1.20, port: 5200 }
"#;
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", yaml).unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_bad_timers_are_fatal() {
        let mut config = HarnessConfig::default();
        config.defaults.holddown_timer = 1;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Descriptor(DescriptorError::HolddownTooShort { .. }))
        ));
    }
}

//! Router configuration descriptor.
//!
//! This module contains the in-memory form of the configuration file consumed
//! by the external RIP router process: a router block, an interface list and
//! the logging/monitoring sub-blocks. The serialized key names match what the
//! router's own configuration loader expects.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors raised when a descriptor violates one of its timer or topology invariants
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("router '{router}': update_interval must be greater than 0")]
    ZeroUpdateInterval { router: String },

    #[error("router '{router}': holddown_timer ({holddown}) must be >= update_interval ({update})")]
    HolddownTooShort { router: String, holddown: u64, update: u64 },

    #[error("router '{router}': garbage_collection_timer ({gc}) must be >= holddown_timer ({holddown})")]
    GarbageCollectionTooShort { router: String, gc: u64, holddown: u64 },

    #[error("router '{router}': max_hop_count must be at least 1")]
    ZeroHopCount { router: String },

    #[error("router '{router}': at least one interface is required to take part in routing exchanges")]
    NoInterfaces { router: String },
}

/// Complete configuration document for one router instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationDescriptor {
    pub router: RouterSection,
    pub interfaces: Vec<InterfaceSection>,
    pub logging: LoggingSection,
    pub monitoring: MonitoringSection,
}

/// Router-level protocol parameters. Timers are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterSection {
    pub router_id: String,
    pub update_interval: u64,
    pub holddown_timer: u64,
    pub garbage_collection_timer: u64,
    pub max_hop_count: u8,
    pub split_horizon: bool,
    pub poison_reverse: bool,
}

/// One simulated interface of the router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSection {
    pub name: String,
    pub ip_address: String,
    pub subnet_mask: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multicast_address: Option<String>,
    pub port: u16,
    pub mtu: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSection {
    pub level: String,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringSection {
    pub metrics_collection_interval: u64,
    pub enable_performance_monitoring: bool,
}

/// Default router parameters applied to every generated descriptor.
///
/// These are the values the harness configuration's `defaults:` section
/// deserializes into; any field left out of the YAML keeps its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterDefaults {
    pub update_interval: u64,
    pub holddown_timer: u64,
    pub garbage_collection_timer: u64,
    pub max_hop_count: u8,
    pub split_horizon: bool,
    pub poison_reverse: bool,
    pub subnet_mask: String,
    pub multicast_address: Option<String>,
    pub mtu: u16,
    pub log_level: String,
    pub metrics_collection_interval: u64,
    pub enable_performance_monitoring: bool,
}

impl Default for RouterDefaults {
    fn default() -> Self {
        Self {
            update_interval: 10,
            holddown_timer: 60,
            garbage_collection_timer: 120,
            max_hop_count: 15,
            split_horizon: true,
            poison_reverse: false,
            subnet_mask: "255.255.255.0".to_string(),
            multicast_address: Some("224.0.0.9".to_string()),
            mtu: 1500,
            log_level: "info".to_string(),
            metrics_collection_interval: 30,
            enable_performance_monitoring: true,
        }
    }
}

impl ConfigurationDescriptor {
    /// Build the descriptor for one instance.
    ///
    /// # Arguments
    /// * `name` - Router identifier, also used to name the interface (`test-<name>`)
    /// * `address` - IP address of the simulated interface
    /// * `port` - Transport port of the simulated interface
    /// * `log_file` - Where the router should write its log
    /// * `participates` - When false, the descriptor carries no interface
    /// * `defaults` - Protocol timers and interface/logging defaults
    pub fn for_instance(
        name: &str,
        address: &str,
        port: u16,
        log_file: &Path,
        participates: bool,
        defaults: &RouterDefaults,
    ) -> Self {
        let interfaces = if participates {
            vec![InterfaceSection {
                name: format!("test-{}", name),
                ip_address: address.to_string(),
                subnet_mask: defaults.subnet_mask.clone(),
                multicast_address: defaults.multicast_address.clone(),
                port,
                mtu: defaults.mtu,
            }]
        } else {
            Vec::new()
        };

        Self {
            router: RouterSection {
                router_id: name.to_string(),
                update_interval: defaults.update_interval,
                holddown_timer: defaults.holddown_timer,
                garbage_collection_timer: defaults.garbage_collection_timer,
                max_hop_count: defaults.max_hop_count,
                split_horizon: defaults.split_horizon,
                poison_reverse: defaults.poison_reverse,
            },
            interfaces,
            logging: LoggingSection {
                level: defaults.log_level.clone(),
                file: log_file.to_string_lossy().to_string(),
            },
            monitoring: MonitoringSection {
                metrics_collection_interval: defaults.metrics_collection_interval,
                enable_performance_monitoring: defaults.enable_performance_monitoring,
            },
        }
    }

    /// Check the timer ordering and topology invariants.
    ///
    /// `participates` controls whether an empty interface list is an error.
    pub fn validate(&self, participates: bool) -> Result<(), DescriptorError> {
        let router = &self.router;
        let name = || router.router_id.clone();

        if router.update_interval == 0 {
            return Err(DescriptorError::ZeroUpdateInterval { router: name() });
        }
        if router.holddown_timer < router.update_interval {
            return Err(DescriptorError::HolddownTooShort {
                router: name(),
                holddown: router.holddown_timer,
                update: router.update_interval,
            });
        }
        if router.garbage_collection_timer < router.holddown_timer {
            return Err(DescriptorError::GarbageCollectionTooShort {
                router: name(),
                gc: router.garbage_collection_timer,
                holddown: router.holddown_timer,
            });
        }
        if router.max_hop_count < 1 {
            return Err(DescriptorError::ZeroHopCount { router: name() });
        }
        if participates && self.interfaces.is_empty() {
            return Err(DescriptorError::NoInterfaces { router: name() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample() -> ConfigurationDescriptor {
        ConfigurationDescriptor::for_instance(
            "router-A",
            "192.168.1.10",
            5200,
            &PathBuf::from("/tmp/router-A.log"),
            true,
            &RouterDefaults::default(),
        )
    }

    #[test]
    fn test_default_descriptor_is_valid() {
        let descriptor = sample();
        assert!(descriptor.validate(true).is_ok());
        assert_eq!(descriptor.router.router_id, "router-A");
        assert_eq!(descriptor.interfaces.len(), 1);
        assert_eq!(descriptor.interfaces[0].name, "test-router-A");
        assert_eq!(descriptor.interfaces[0].port, 5200);
        assert_eq!(descriptor.logging.file, "/tmp/router-A.log");
    }

    #[test]
    fn test_json_roundtrip_preserves_every_field() {
        let mut descriptor = sample();
        descriptor.router.poison_reverse = true;
        descriptor.interfaces[0].multicast_address = None;

        let json = serde_json::to_string_pretty(&descriptor).unwrap();
        assert!(!json.contains("multicast_address"));
        let parsed: ConfigurationDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn test_serialized_layout_matches_router_loader() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["router"]["holddown_timer"], 60);
        assert_eq!(value["router"]["garbage_collection_timer"], 120);
        assert_eq!(value["interfaces"][0]["multicast_address"], "224.0.0.9");
        assert_eq!(value["logging"]["level"], "info");
        assert_eq!(value["monitoring"]["enable_performance_monitoring"], true);
    }

    #[test]
    fn test_timer_invariants() {
        let mut d = sample();
        d.router.update_interval = 0;
        assert!(matches!(d.validate(true), Err(DescriptorError::ZeroUpdateInterval { .. })));

        let mut d = sample();
        d.router.holddown_timer = 5;
        assert!(matches!(d.validate(true), Err(DescriptorError::HolddownTooShort { .. })));

        let mut d = sample();
        d.router.garbage_collection_timer = 30;
        assert!(matches!(d.validate(true), Err(DescriptorError::GarbageCollectionTooShort { .. })));

        let mut d = sample();
        d.router.max_hop_count = 0;
        assert!(matches!(d.validate(true), Err(DescriptorError::ZeroHopCount { .. })));

        // Equal timers are allowed
        let mut d = sample();
        d.router.holddown_timer = d.router.update_interval;
        d.router.garbage_collection_timer = d.router.update_interval;
        assert!(d.validate(true).is_ok());
    }

    #[test]
    fn test_interfaces_required_only_when_participating() {
        let descriptor = ConfigurationDescriptor::for_instance(
            "router-X",
            "10.0.0.1",
            5300,
            &PathBuf::from("/tmp/router-X.log"),
            false,
            &RouterDefaults::default(),
        );
        assert!(descriptor.interfaces.is_empty());
        assert!(descriptor.validate(false).is_ok());
        assert!(matches!(descriptor.validate(true), Err(DescriptorError::NoInterfaces { .. })));
    }
}

//! Instance set validation.
//!
//! These checks run before any file is written or process spawned; a failure
//! here is the only fatal error of a harness run.

use crate::config::InstanceSpec;
use crate::descriptor::DescriptorError;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Configuration errors that abort the run before anything is spawned
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no router instances configured")]
    NoInstances,

    #[error("instance #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("instance name '{name}' cannot be used as a file name")]
    InvalidName { name: String },

    #[error("duplicate instance name '{name}'")]
    DuplicateName { name: String },

    #[error("port {port} is used by both '{first}' and '{second}'")]
    DuplicatePort { port: u16, first: String, second: String },

    #[error("instance '{name}' has port 0")]
    ZeroPort { name: String },

    #[error("instance '{name}' has invalid IPv4 address '{address}'")]
    InvalidAddress { name: String, address: String },

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// Validate the identity and network parameters of every instance
///
/// Checks for:
/// - At least one instance
/// - Non-empty names that are usable as file names
/// - Unique names and unique ports across the whole set
/// - Non-zero ports and parseable IPv4 addresses
///
/// # Arguments
/// * `instances` - Instance declarations in start order
///
/// # Returns
/// * `Ok(())` if validation succeeds
/// * `Err(ValidationError)` describing the first violation found
///
/// # Examples
/// ```
/// use rip_harness::config::InstanceSpec;
/// use rip_harness::utils::validation::validate_instance_set;
///
/// let a = InstanceSpec::new("router-A", "192.168.1.10", 5200);
/// let b = InstanceSpec::new("router-B", "192.168.1.20", 5200);
/// assert!(validate_instance_set(&[a.clone()]).is_ok());
/// assert!(validate_instance_set(&[a, b]).is_err()); // shared port
/// ```
pub fn validate_instance_set(instances: &[InstanceSpec]) -> Result<(), ValidationError> {
    if instances.is_empty() {
        return Err(ValidationError::NoInstances);
    }

    let mut names: HashMap<&str, usize> = HashMap::new();
    let mut ports: HashMap<u16, &str> = HashMap::new();

    for (index, spec) in instances.iter().enumerate() {
        let name = spec.name.as_str();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName { index });
        }
        if !is_file_safe(name) {
            return Err(ValidationError::InvalidName { name: name.to_string() });
        }
        if names.insert(name, index).is_some() {
            return Err(ValidationError::DuplicateName { name: name.to_string() });
        }

        if spec.port == 0 {
            return Err(ValidationError::ZeroPort { name: name.to_string() });
        }
        if let Some(first) = ports.insert(spec.port, name) {
            return Err(ValidationError::DuplicatePort {
                port: spec.port,
                first: first.to_string(),
                second: name.to_string(),
            });
        }

        if spec.address.parse::<Ipv4Addr>().is_err() {
            return Err(ValidationError::InvalidAddress {
                name: name.to_string(),
                address: spec.address.clone(),
            });
        }
    }

    Ok(())
}

/// Names become `<name>.json` / `<name>.log`, so no separators or dot-only names
fn is_file_safe(name: &str) -> bool {
    name != "." && name != ".." && !name.contains('/') && !name.contains('\\') && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> Vec<InstanceSpec> {
        vec![
            InstanceSpec::new("router-A", "192.168.1.10", 5200),
            InstanceSpec::new("router-B", "192.168.1.20", 5201),
            InstanceSpec::new("router-C", "192.168.1.30", 5202),
        ]
    }

    #[test]
    fn test_distinct_names_and_ports_pass() {
        assert!(validate_instance_set(&topology()).is_ok());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut set = topology();
        set[2].name = "router-A".to_string();
        assert_eq!(
            validate_instance_set(&set),
            Err(ValidationError::DuplicateName { name: "router-A".to_string() })
        );
    }

    #[test]
    fn test_duplicate_port_rejected() {
        let mut set = topology();
        set[1].port = 5202;
        assert_eq!(
            validate_instance_set(&set),
            Err(ValidationError::DuplicatePort {
                port: 5202,
                first: "router-B".to_string(),
                second: "router-C".to_string(),
            })
        );
    }

    #[test]
    fn test_malformed_instances_rejected() {
        assert_eq!(validate_instance_set(&[]), Err(ValidationError::NoInstances));

        let mut set = topology();
        set[0].name = "  ".to_string();
        assert_eq!(validate_instance_set(&set), Err(ValidationError::EmptyName { index: 0 }));

        let mut set = topology();
        set[0].name = "../escape".to_string();
        assert!(matches!(validate_instance_set(&set), Err(ValidationError::InvalidName { .. })));

        let mut set = topology();
        set[1].port = 0;
        assert!(matches!(validate_instance_set(&set), Err(ValidationError::ZeroPort { .. })));

        let mut set = topology();
        set[2].address = "192.168.1.300".to_string();
        assert!(matches!(validate_instance_set(&set), Err(ValidationError::InvalidAddress { .. })));
    }
}

//! Discovery abstraction and device descriptors

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DetectError;

/// Source of the currently attached serial devices
///
/// Discovery holds no connection state; callers combine the mapping with the
/// active connection's path to mark the connected entry.
pub trait DeviceDiscovery: Send + Sync {
    /// Enumerate present devices as a friendly name -> path mapping
    fn list_devices(&self) -> Result<BTreeMap<String, String>, DetectError>;
}

/// One attached device as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Friendly name
    pub name: String,
    /// Device path
    pub path: String,
    /// Whether this is the currently open connection
    pub connected: bool,
}

/// Combine a discovery mapping with the active connection path
pub fn describe_devices(
    devices: &BTreeMap<String, String>,
    connected_path: Option<&str>,
) -> Vec<DeviceDescriptor> {
    devices
        .iter()
        .map(|(name, path)| DeviceDescriptor {
            name: name.clone(),
            path: path.clone(),
            connected: connected_path == Some(path.as_str()),
        })
        .collect()
}

/// Fixed device table
///
/// Used for simulated controllers and for tests that must not depend on the
/// host's serial ports.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    devices: BTreeMap<String, String>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device entry
    pub fn with_device(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.devices.insert(name.into(), path.into());
        self
    }
}

impl DeviceDiscovery for StaticDiscovery {
    fn list_devices(&self) -> Result<BTreeMap<String, String>, DetectError> {
        Ok(self.devices.clone())
    }
}

//! Serial port scanner
//!
//! This module provides serial port enumeration and friendly-name derivation.

use std::collections::BTreeMap;
use std::path::Path;

use serialport::{available_ports, SerialPortType};
use tracing::info;

use crate::discovery::DeviceDiscovery;
use crate::error::DetectError;

/// Information about a serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port path (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB serial number (if available)
    pub serial_number: Option<String>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    /// Create from serialport crate's port info
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                serial_number: usb.serial_number.clone(),
                manufacturer: usb.manufacturer.clone(),
                product: usb.product.clone(),
            },
            _ => Self {
                port: name,
                vid: None,
                pid: None,
                serial_number: None,
                manufacturer: None,
                product: None,
            },
        }
    }

    /// Friendly name shown to callers
    ///
    /// "FT232R USB UART (A12345)" for USB adapters that report a product,
    /// otherwise the last path component ("ttyUSB0", "COM3").
    pub fn friendly_name(&self) -> String {
        match (&self.product, &self.serial_number) {
            (Some(product), Some(serial)) => format!("{} ({})", product, serial),
            (Some(product), None) => product.clone(),
            _ => Path::new(&self.port)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.port.clone()),
        }
    }
}

/// Serial port scanner configuration
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Skip ports matching these patterns
    pub skip_patterns: Vec<String>,
}

/// Serial port scanner
pub struct PortScanner {
    config: ScannerConfig,
}

impl PortScanner {
    /// Create a new scanner with default configuration
    pub fn new() -> Self {
        Self {
            config: ScannerConfig {
                skip_patterns: vec![
                    // Bluetooth ports on macOS
                    "Bluetooth".to_string(),
                    // Debug/logging ports
                    "debug".to_string(),
                ],
            },
        }
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Enumerate all available serial ports
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        info!("Enumerating serial ports...");
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;

        let result: Vec<_> = ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .filter(|p| !self.should_skip_port(p))
            .collect();

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
            for port in &result {
                let desc = port.product.as_deref().unwrap_or("Unknown");
                info!("  {} - {}", port.port, desc);
            }
        }

        Ok(result)
    }

    /// Check if a port should be skipped
    fn should_skip_port(&self, port: &SerialPortInfo) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.port.contains(pattern.as_str()))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDiscovery for PortScanner {
    fn list_devices(&self) -> Result<BTreeMap<String, String>, DetectError> {
        Ok(name_ports(&self.enumerate_ports()?))
    }
}

/// Build the name -> path mapping, disambiguating duplicate names
///
/// Two identical adapters without serial numbers share a product string; the
/// second and later ones get their path appended.
pub(crate) fn name_ports(ports: &[SerialPortInfo]) -> BTreeMap<String, String> {
    let mut devices = BTreeMap::new();
    for port in ports {
        let name = port.friendly_name();
        if devices.contains_key(&name) {
            devices.insert(format!("{} ({})", name, port.port), port.port.clone());
        } else {
            devices.insert(name, port.port.clone());
        }
    }
    devices
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn usb(port: &str, product: Option<&str>, serial: Option<&str>) -> SerialPortInfo {
        let usb_info = SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x0403,
            pid: 0x6001,
            serial_number: serial.map(str::to_string),
            manufacturer: Some("FTDI".to_string()),
            product: product.map(str::to_string),
        });
        SerialPortInfo::from_serialport(port.to_string(), &usb_info)
    }

    #[test]
    fn test_serial_port_info_from_usb() {
        let info = usb("/dev/ttyUSB0", Some("FT232R"), Some("12345"));

        assert_eq!(info.vid, Some(0x0403));
        assert_eq!(info.pid, Some(0x6001));
        assert_eq!(info.product.as_deref(), Some("FT232R"));
    }

    #[test]
    fn test_friendly_names() {
        assert_eq!(
            usb("/dev/ttyUSB0", Some("FT232R"), Some("A1")).friendly_name(),
            "FT232R (A1)"
        );
        assert_eq!(usb("/dev/ttyUSB0", Some("FT232R"), None).friendly_name(), "FT232R");

        let plain = SerialPortInfo::from_serialport("/dev/ttyS0".to_string(), &SerialPortType::Unknown);
        assert_eq!(plain.friendly_name(), "ttyS0");

        let windows = SerialPortInfo::from_serialport("COM3".to_string(), &SerialPortType::Unknown);
        assert_eq!(windows.friendly_name(), "COM3");
    }

    #[test]
    fn test_duplicate_names_are_disambiguated() {
        let ports = vec![
            usb("/dev/ttyUSB0", Some("Pulse Controller"), None),
            usb("/dev/ttyUSB1", Some("Pulse Controller"), None),
        ];
        let devices = name_ports(&ports);

        assert_eq!(devices.len(), 2);
        assert_eq!(devices["Pulse Controller"], "/dev/ttyUSB0");
        assert_eq!(devices["Pulse Controller (/dev/ttyUSB1)"], "/dev/ttyUSB1");
    }

    #[test]
    fn test_skip_patterns() {
        let scanner = PortScanner::new();
        let bt = SerialPortInfo::from_serialport(
            "/dev/cu.Bluetooth-Incoming-Port".to_string(),
            &SerialPortType::Unknown,
        );
        assert!(scanner.should_skip_port(&bt));
        assert!(!scanner.should_skip_port(&usb("/dev/ttyUSB0", None, None)));
    }
}

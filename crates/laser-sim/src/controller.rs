//! Virtual laser/pulse controller
//!
//! Parses command frames from raw bytes, applies them to an in-memory state
//! and queues replies of exactly the length the command registry specifies.

use std::collections::VecDeque;

use laser_protocol::{Command, LaserParameters};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Snapshot of the controller's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControllerState {
    /// Master power
    pub power: bool,
    /// Parameters written but not yet committed
    pub staged: LaserParameters,
    /// Parameters in effect
    pub committed: LaserParameters,
    /// Trigger armed
    pub armed: bool,
}

/// Configuration for creating a virtual controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualControllerConfig {
    /// Display name/identifier
    pub id: String,
    /// Hardware revision reported by GetVersion
    pub hardware_version: u8,
    /// Firmware revision reported by GetVersion
    pub firmware_version: u8,
}

impl Default for VirtualControllerConfig {
    fn default() -> Self {
        Self {
            id: "Virtual Controller".to_string(),
            hardware_version: 1,
            firmware_version: 2,
        }
    }
}

/// A simulated controller speaking the binary command protocol
#[derive(Debug)]
pub struct VirtualController {
    id: String,
    hardware_version: u8,
    firmware_version: u8,
    state: ControllerState,
    /// Bytes of an incomplete frame
    input: Vec<u8>,
    /// Replies not yet taken
    pending_output: VecDeque<Vec<u8>>,
    /// Every command applied, oldest first
    history: Vec<Command>,
}

impl VirtualController {
    /// Create a controller with default versions
    pub fn new(id: impl Into<String>) -> Self {
        Self::from_config(VirtualControllerConfig {
            id: id.into(),
            ..Default::default()
        })
    }

    pub fn from_config(config: VirtualControllerConfig) -> Self {
        Self {
            id: config.id,
            hardware_version: config.hardware_version,
            firmware_version: config.firmware_version,
            state: ControllerState::default(),
            input: Vec::new(),
            pending_output: VecDeque::new(),
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Commands applied so far
    pub fn history(&self) -> &[Command] {
        &self.history
    }

    /// Feed received bytes and apply every complete frame
    ///
    /// Returns the number of frames applied. An unknown opcode drops the
    /// buffered input, since the frame boundary is lost.
    pub fn push_bytes(&mut self, data: &[u8]) -> usize {
        self.input.extend_from_slice(data);
        let mut applied = 0;

        while let Some(&opcode) = self.input.first() {
            let command = match Command::from_opcode(opcode) {
                Ok(command) => command,
                Err(e) => {
                    warn!("Virtual controller {}: {}, dropping {} byte(s)", self.id, e, self.input.len());
                    self.input.clear();
                    break;
                }
            };

            let descriptor = command.descriptor();
            if self.input.len() < descriptor.frame_len() {
                break;
            }
            let frame: Vec<u8> = self.input.drain(..descriptor.frame_len()).collect();
            self.apply(command, &frame[1..]);
            applied += 1;
        }

        applied
    }

    fn apply(&mut self, command: Command, argument: &[u8]) {
        debug!("Virtual controller {} applying {} {:02X?}", self.id, command.name(), argument);
        self.history.push(command);

        let reply = match command {
            Command::GetVersion => Some(vec![self.hardware_version, self.firmware_version]),
            Command::SetPower => {
                self.state.power = argument[0] == 1;
                None
            }
            Command::GetPower => Some(vec![u8::from(self.state.power)]),
            Command::SetExposure => {
                self.state.staged.exposure_ticks = read_u16(argument);
                None
            }
            Command::GetExposure => Some(write_u16(self.state.staged.exposure_ticks)),
            Command::SetFilter => {
                self.state.staged.digital_filter = read_u16(argument);
                None
            }
            Command::GetFilter => Some(write_u16(self.state.staged.digital_filter)),
            Command::SetDelay => {
                self.state.staged.pulse_delay = read_u16(argument);
                None
            }
            Command::GetDelay => Some(write_u16(self.state.staged.pulse_delay)),
            Command::CommitParameters => {
                self.state.committed = self.state.staged;
                None
            }
            Command::ArmTrigger => {
                self.state.armed = true;
                None
            }
            Command::CancelTrigger => {
                self.state.armed = false;
                None
            }
            Command::Reset => {
                self.state = ControllerState::default();
                None
            }
        };

        if let Some(reply) = reply {
            debug_assert_eq!(reply.len(), command.descriptor().response_len);
            self.pending_output.push_back(reply);
        }
    }

    /// Take the next pending reply
    pub fn take_output(&mut self) -> Option<Vec<u8>> {
        self.pending_output.pop_front()
    }

    pub fn has_output(&self) -> bool {
        !self.pending_output.is_empty()
    }
}

fn read_u16(argument: &[u8]) -> u32 {
    u16::from_le_bytes([argument[0], argument[1]]).into()
}

fn write_u16(value: u32) -> Vec<u8> {
    u16::try_from(value).unwrap_or(u16::MAX).to_le_bytes().to_vec()
}

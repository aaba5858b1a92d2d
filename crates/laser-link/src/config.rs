//! Engine configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::LineConfig;

/// What to do with bytes that arrive while no command is waiting
///
/// The controller never sends unsolicited data, so such bytes are either line
/// noise or the tail of a reply nobody is waiting for any more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NoisePolicy {
    /// Drop them immediately
    #[default]
    Discard,
    /// Keep up to `max_bytes`, dropping the oldest on overflow. Kept bytes
    /// answer the next command only if its own reply does not show up.
    Buffer { max_bytes: usize },
}

/// Link engine configuration
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Serial line settings
    pub line: LineConfig,
    /// Handling of unsolicited bytes
    pub noise_policy: NoisePolicy,
    /// How long after a timeout the late reply is still expected and swallowed
    pub stale_window: Duration,
    /// Line quiet time after which a reply that may be preceded by late or
    /// buffered bytes is taken as complete
    pub settle_time: Duration,
    /// Size of the reader task's read buffer
    pub read_buffer_size: usize,
    /// Depth of the command queue in front of the engine
    pub queue_depth: usize,
    /// Capacity of the link event broadcast channel
    pub event_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            line: LineConfig::default(),
            noise_policy: NoisePolicy::Discard,
            stale_window: Duration::from_secs(5),
            settle_time: Duration::from_millis(50),
            read_buffer_size: 256,
            queue_depth: 64,
            event_capacity: 256,
        }
    }
}

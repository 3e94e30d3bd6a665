use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::DEFAULT_EVENT_BUFFER_SIZE;

/// Tuning of the relay between a backend stream and its consumer
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Capacity of the channel between the relay task and `Watcher::next()`
    ///
    /// The relay stops reading the backend stream while the channel is full,
    /// so a slow consumer applies backpressure instead of losing events.
    ///
    /// **Default**: 10
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: default_event_buffer_size(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.event_buffer_size must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_event_buffer_size() -> usize {
    DEFAULT_EVENT_BUFFER_SIZE
}

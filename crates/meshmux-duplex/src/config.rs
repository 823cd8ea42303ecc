use std::time::Duration;

use meshmux_frame::{FrameConfig, MAX_PAYLOAD};

/// Tuning for a [`Duplex`](crate::Duplex).
#[derive(Debug, Clone)]
pub struct DuplexConfig {
    /// Read timeout applied to the physical connection.
    ///
    /// The demultiplex loop treats an expired read as a transport failure,
    /// so this doubles as an idle timeout for the whole connection.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied to the physical connection.
    pub write_timeout: Option<Duration>,
    /// Largest payload an endpoint write accepts. Capped at 65535.
    pub max_payload_size: usize,
    /// Initial capacity of each endpoint's inbound queue.
    pub initial_buffer_capacity: usize,
    /// Name of the thread started by [`Duplex::spawn`](crate::Duplex::spawn).
    pub thread_name: String,
}

impl DuplexConfig {
    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size.min(MAX_PAYLOAD),
        }
    }
}

impl Default for DuplexConfig {
    fn default() -> Self {
        Self {
            read_timeout: None,
            write_timeout: None,
            max_payload_size: MAX_PAYLOAD,
            initial_buffer_capacity: 4 * 1024,
            thread_name: "meshmux-demux".to_string(),
        }
    }
}

use huddle_core::IceServerConfig;
use serde::{Deserialize, Serialize};

/// Connection and event-loop settings shared by every session in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
    pub ice_candidate_pool_size: u8,
    /// Capacity of the room command channel.
    pub command_buffer: usize,
    /// Capacity of the channel carrying connection results back to the room.
    pub event_buffer: usize,
    /// Label of the pre-negotiated data channel every connection opens.
    pub data_channel_label: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::stun([
                "stun:stun1.l.google.com:19302",
                "stun:stun2.l.google.com:19302",
            ])],
            ice_candidate_pool_size: 10,
            command_buffer: 256,
            event_buffer: 256,
            data_channel_label: "huddle".to_owned(),
        }
    }
}

impl TransportConfig {
    /// No ICE servers: host candidates only, for loopback calls and tests.
    pub fn local() -> Self {
        Self {
            ice_servers: Vec::new(),
            ice_candidate_pool_size: 0,
            ..Self::default()
        }
    }
}

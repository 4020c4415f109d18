use async_trait::async_trait;
use huddle_core::{RoomRequest, SignalMessage};

/// Outbound half of the signaling transport, implemented by the embedding
/// application (WebSocket client, socket.io bridge, the loopback hub, ...).
///
/// Delivery must be reliable and ordered per recipient.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Send an offer, answer or candidate to `msg.to`.
    async fn send_message(&self, msg: SignalMessage);

    /// Send a room lifecycle command to the transport.
    async fn send_request(&self, request: RoomRequest);
}

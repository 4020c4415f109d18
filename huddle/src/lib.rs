pub use huddle_core::model::{ParticipantId, RoomId};

pub mod model {
    pub use huddle_core::model::*;
}

#[cfg(feature = "peer")]
pub mod peer {
    pub use huddle_peer::*;
}

mod membership;
mod orchestrator;
mod room_command;
mod room_handle;
mod room_observer;
mod snapshot;

pub use membership::*;
pub use orchestrator::*;
pub use room_command::*;
pub use room_handle::*;
pub use room_observer::*;
pub use snapshot::*;

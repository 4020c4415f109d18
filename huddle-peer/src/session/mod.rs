mod candidate_buffer;
mod negotiation_session;
mod session_driver;
mod session_registry;

pub use candidate_buffer::*;
pub use negotiation_session::*;
pub use session_registry::*;

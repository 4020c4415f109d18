mod error;
mod room;
mod session;
mod signaling;
mod transport;

pub use error::*;
pub use room::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;

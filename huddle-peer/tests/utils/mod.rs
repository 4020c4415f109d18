pub mod fake_connection;

pub use fake_connection::*;
pub use mock_signaling::*;
pub use recording_observer::*;
pub use wait::*;
